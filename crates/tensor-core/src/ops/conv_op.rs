// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Standard and depthwise 2-D convolutions with `same` padding.

use crate::{Shape, Tensor, TensorError};

/// Output size and leading padding for one spatial axis.
fn same_padding(input: usize, kernel: usize, stride: usize) -> (usize, usize) {
    let out = input.div_ceil(stride);
    let needed = (out - 1) * stride + kernel;
    let pad_total = needed.saturating_sub(input);
    (out, pad_total / 2)
}

fn check_stride(op: &'static str, stride: usize) -> Result<(), TensorError> {
    if stride == 0 {
        return Err(TensorError::Numeric {
            op,
            detail: "stride must be positive".into(),
        });
    }
    Ok(())
}

fn image_dims(op: &'static str, input: &Tensor) -> Result<(usize, usize, usize), TensorError> {
    match input.shape().dims() {
        &[h, w, c] => Ok((h, w, c)),
        _ => Err(TensorError::RankMismatch {
            op,
            expected: 3,
            actual: input.shape().clone(),
        }),
    }
}

/// 2-D convolution.
///
/// - `input`: `[H, W, C_in]`
/// - `kernel`: `[K, K, C_in, C_out]`
/// - `bias`: `[C_out]`
///
/// Returns `[ceil(H / stride), ceil(W / stride), C_out]`.
pub fn conv2d(
    input: &Tensor,
    kernel: &Tensor,
    bias: &Tensor,
    stride: usize,
) -> Result<Tensor, TensorError> {
    check_stride("conv2d", stride)?;
    let (h, w, cin) = image_dims("conv2d", input)?;

    let (k, cout) = match kernel.shape().dims() {
        &[kh, kw, kc, co] if kh == kw && kc == cin => (kh, co),
        _ => {
            return Err(TensorError::ShapeMismatch {
                op: "conv2d (kernel)",
                lhs: input.shape().clone(),
                rhs: kernel.shape().clone(),
            })
        }
    };
    if bias.shape() != &Shape::vector(cout) {
        return Err(TensorError::ShapeMismatch {
            op: "conv2d (bias)",
            lhs: Shape::vector(cout),
            rhs: bias.shape().clone(),
        });
    }

    let (out_h, pad_top) = same_padding(h, k, stride);
    let (out_w, pad_left) = same_padding(w, k, stride);

    let src = input.as_slice();
    let weights = kernel.as_slice();
    let mut out = vec![0.0f32; out_h * out_w * cout];

    for oy in 0..out_h {
        for ox in 0..out_w {
            let o_base = (oy * out_w + ox) * cout;
            let acc = &mut out[o_base..o_base + cout];
            acc.copy_from_slice(bias.as_slice());

            for ky in 0..k {
                let iy = (oy * stride + ky) as isize - pad_top as isize;
                if iy < 0 || iy >= h as isize {
                    continue;
                }
                for kx in 0..k {
                    let ix = (ox * stride + kx) as isize - pad_left as isize;
                    if ix < 0 || ix >= w as isize {
                        continue;
                    }
                    let i_base = (iy as usize * w + ix as usize) * cin;
                    let k_base = (ky * k + kx) * cin * cout;
                    for ci in 0..cin {
                        let v = src[i_base + ci];
                        let k_row = &weights[k_base + ci * cout..k_base + (ci + 1) * cout];
                        for (a, &wv) in acc.iter_mut().zip(k_row) {
                            *a += v * wv;
                        }
                    }
                }
            }
        }
    }

    Tensor::from_vec(Shape::image(out_h, out_w, cout), out)
}

/// Depthwise 2-D convolution (one filter per channel).
///
/// - `input`: `[H, W, C]`
/// - `kernel`: `[K, K, C]`
/// - `bias`: `[C]`
pub fn depthwise_conv2d(
    input: &Tensor,
    kernel: &Tensor,
    bias: &Tensor,
    stride: usize,
) -> Result<Tensor, TensorError> {
    check_stride("depthwise_conv2d", stride)?;
    let (h, w, c) = image_dims("depthwise_conv2d", input)?;

    let k = match kernel.shape().dims() {
        &[kh, kw, kc] if kh == kw && kc == c => kh,
        _ => {
            return Err(TensorError::ShapeMismatch {
                op: "depthwise_conv2d (kernel)",
                lhs: input.shape().clone(),
                rhs: kernel.shape().clone(),
            })
        }
    };
    if bias.shape() != &Shape::vector(c) {
        return Err(TensorError::ShapeMismatch {
            op: "depthwise_conv2d (bias)",
            lhs: Shape::vector(c),
            rhs: bias.shape().clone(),
        });
    }

    let (out_h, pad_top) = same_padding(h, k, stride);
    let (out_w, pad_left) = same_padding(w, k, stride);

    let src = input.as_slice();
    let weights = kernel.as_slice();
    let mut out = vec![0.0f32; out_h * out_w * c];

    for oy in 0..out_h {
        for ox in 0..out_w {
            let o_base = (oy * out_w + ox) * c;
            let acc = &mut out[o_base..o_base + c];
            acc.copy_from_slice(bias.as_slice());

            for ky in 0..k {
                let iy = (oy * stride + ky) as isize - pad_top as isize;
                if iy < 0 || iy >= h as isize {
                    continue;
                }
                for kx in 0..k {
                    let ix = (ox * stride + kx) as isize - pad_left as isize;
                    if ix < 0 || ix >= w as isize {
                        continue;
                    }
                    let i_base = (iy as usize * w + ix as usize) * c;
                    let k_base = (ky * k + kx) * c;
                    let pixel = &src[i_base..i_base + c];
                    let k_row = &weights[k_base..k_base + c];
                    for ((a, &v), &wv) in acc.iter_mut().zip(pixel).zip(k_row) {
                        *a += v * wv;
                    }
                }
            }
        }
    }

    Tensor::from_vec(Shape::image(out_h, out_w, c), out)
}
