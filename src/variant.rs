//! Supported device variants.
//!
//! A variant id selects the `<id>.config` fragment merged on top of the base
//! defconfig. Ids outside this table are rejected before anything runs.

use crate::error::BuildError;

/// A device-specific build configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildVariant {
    /// Codename passed on the command line (e.g. "a73xq").
    pub id: &'static str,
    /// Marketing name shown in the build banner.
    pub device: &'static str,
}

/// All known variants.
pub const VARIANTS: &[BuildVariant] = &[
    BuildVariant {
        id: "a73xq",
        device: "A73",
    },
    BuildVariant {
        id: "a52sxq",
        device: "A52S",
    },
    BuildVariant {
        id: "m52xq",
        device: "M52",
    },
];

impl BuildVariant {
    /// Look up a variant by id.
    pub fn lookup(id: &str) -> Result<&'static BuildVariant, BuildError> {
        VARIANTS
            .iter()
            .find(|v| v.id == id)
            .ok_or_else(|| BuildError::UnknownVariant {
                id: id.to_string(),
                known: known_ids().join(", "),
            })
    }

    /// Config fragment applied after the base defconfig.
    pub fn config_fragment(&self) -> String {
        format!("{}.config", self.id)
    }
}

/// Ids of every known variant, in table order.
pub fn known_ids() -> Vec<&'static str> {
    VARIANTS.iter().map(|v| v.id).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_known() {
        let v = BuildVariant::lookup("a52sxq").unwrap();
        assert_eq!(v.device, "A52S");
        assert_eq!(v.config_fragment(), "a52sxq.config");
    }

    #[test]
    fn test_lookup_unknown() {
        let err = BuildVariant::lookup("beyond1lte").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("beyond1lte"));
        assert!(msg.contains("a73xq, a52sxq, m52xq"));
    }

    #[test]
    fn test_ids_unique() {
        let mut ids = known_ids();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), VARIANTS.len());
    }
}
