// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Global average pooling.

use crate::{Shape, Tensor, TensorError};

/// Averages an `[H, W, C]` feature map over its spatial axes, producing `[C]`.
pub fn global_avg_pool(input: &Tensor) -> Result<Tensor, TensorError> {
    let (h, w, c) = match input.shape().dims() {
        &[h, w, c] => (h, w, c),
        _ => {
            return Err(TensorError::RankMismatch {
                op: "global_avg_pool",
                expected: 3,
                actual: input.shape().clone(),
            })
        }
    };
    let area = h * w;
    if area == 0 {
        return Err(TensorError::Numeric {
            op: "global_avg_pool",
            detail: "empty spatial extent".into(),
        });
    }

    let mut out = vec![0.0f32; c];
    for pixel in input.as_slice().chunks_exact(c.max(1)) {
        for (o, &v) in out.iter_mut().zip(pixel) {
            *o += v;
        }
    }
    let inv = 1.0 / area as f32;
    out.iter_mut().for_each(|o| *o *= inv);

    Tensor::from_vec(Shape::vector(c), out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_avg_pool() {
        // 2x1 image, 2 channels: pixels (1, 10) and (3, 20).
        let t = Tensor::from_f32(Shape::image(2, 1, 2), &[1.0, 10.0, 3.0, 20.0]).unwrap();
        let p = global_avg_pool(&t).unwrap();
        assert_eq!(p.shape(), &Shape::vector(2));
        assert_eq!(p.as_slice(), &[2.0, 15.0]);
    }

    #[test]
    fn test_global_avg_pool_rank() {
        let t = Tensor::zeros(Shape::vector(4));
        assert!(matches!(
            global_avg_pool(&t),
            Err(TensorError::RankMismatch { .. })
        ));
    }

    #[test]
    fn test_global_avg_pool_empty() {
        let t = Tensor::zeros(Shape::image(0, 4, 2));
        assert!(global_avg_pool(&t).is_err());
    }
}
