// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! What the target runtime offers for each lowered operator.

use crate::config::{OpSet, Representation};
use crate::lowering::TargetOpKind;
use std::collections::BTreeMap;
use std::fmt;

/// Where a target operator's kernel comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    Builtins,
    SelectOps,
    /// Registered by the application, outside any operator set.
    Custom,
}

impl Provider {
    /// The operator set that provides this kernel, if any.
    pub fn op_set(self) -> Option<OpSet> {
        match self {
            Self::Builtins => Some(OpSet::Builtins),
            Self::SelectOps => Some(OpSet::SelectOps),
            Self::Custom => None,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.op_set() {
            Some(set) => write!(f, "the {set} operator set"),
            None => f.write_str("a custom operator"),
        }
    }
}

/// Target support for one operator kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpSupport {
    pub provider: Provider,
    pub float16: bool,
    pub int8: bool,
}

impl OpSupport {
    /// A builtin kernel with every reduced-precision variant.
    pub fn builtin() -> Self {
        Self {
            provider: Provider::Builtins,
            float16: true,
            int8: true,
        }
    }

    pub fn supports(&self, representation: Representation) -> bool {
        match representation {
            Representation::Float32 => true,
            Representation::Float16 => self.float16,
            Representation::Int8 => self.int8,
        }
    }
}

/// Per-operator support table of the conversion target.
///
/// The default catalog provides every lowered operator as a builtin with
/// float16 and int8 kernels. Operators absent from a catalog cannot be
/// converted at all.
#[derive(Debug, Clone)]
pub struct OperatorCatalog {
    entries: BTreeMap<TargetOpKind, OpSupport>,
}

impl Default for OperatorCatalog {
    fn default() -> Self {
        Self {
            entries: TargetOpKind::ALL
                .iter()
                .map(|kind| (*kind, OpSupport::builtin()))
                .collect(),
        }
    }
}

impl OperatorCatalog {
    /// A catalog that knows no operators.
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Sets (or replaces) the support entry for `kind`.
    pub fn with(mut self, kind: TargetOpKind, support: OpSupport) -> Self {
        self.entries.insert(kind, support);
        self
    }

    pub fn support(&self, kind: TargetOpKind) -> Option<&OpSupport> {
        self.entries.get(&kind)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog_is_complete() {
        let catalog = OperatorCatalog::default();
        assert_eq!(catalog.len(), TargetOpKind::ALL.len());
        for kind in TargetOpKind::ALL {
            let s = catalog.support(kind).unwrap();
            assert_eq!(s.provider, Provider::Builtins);
            assert!(s.supports(Representation::Int8));
        }
    }

    #[test]
    fn test_override_entry() {
        let catalog = OperatorCatalog::default().with(
            TargetOpKind::Mean,
            OpSupport {
                provider: Provider::SelectOps,
                float16: false,
                int8: false,
            },
        );
        let mean = catalog.support(TargetOpKind::Mean).unwrap();
        assert_eq!(mean.provider.op_set(), Some(OpSet::SelectOps));
        assert!(mean.supports(Representation::Float32));
        assert!(!mean.supports(Representation::Float16));
        assert!(OperatorCatalog::empty().support(TargetOpKind::Add).is_none());
    }

    #[test]
    fn test_provider_display() {
        assert_eq!(Provider::SelectOps.to_string(), "the select_ops operator set");
        assert_eq!(Provider::Custom.to_string(), "a custom operator");
    }
}
