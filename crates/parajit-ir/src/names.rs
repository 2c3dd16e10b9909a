//! Global fresh-name supply.
//!
//! Every SSA binding gets a unique identifier of the form `base.N`. The
//! original base name is kept alongside the counter so diagnostics can refer
//! back to the name the programmer actually wrote.

use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

/// A fresh SSA name: `base.version`, e.g. `x.3`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Name {
    pub base: String,
    pub version: u32,
}

impl Name {
    /// Names with version 0 are "original" names -- formal parameters and
    /// names introduced directly by the IR producer, not yet versioned by
    /// a pass.
    pub fn original(base: impl Into<String>) -> Self {
        Name {
            base: base.into(),
            version: 0,
        }
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.version == 0 {
            write!(f, "{}", self.base)
        } else {
            write!(f, "{}.{}", self.base, self.version)
        }
    }
}

/// Process-wide counter of versions handed out per base name.
///
/// Mirrors the `NameSupply` of the untyped-IR producer: every call to
/// [`NameSupply::fresh`] for a given base name returns a strictly
/// increasing version, so no two live bindings ever collide.
#[derive(Debug, Default)]
pub struct NameSupply {
    versions: Mutex<HashMap<String, u32>>,
}

impl NameSupply {
    pub fn new() -> Self {
        NameSupply {
            versions: Mutex::new(HashMap::new()),
        }
    }

    /// Mint a new, never-before-returned name derived from `base`.
    pub fn fresh(&self, base: impl Into<String>) -> Name {
        let base = base.into();
        let mut versions = self.versions.lock().expect("name supply mutex poisoned");
        let version = versions.entry(base.clone()).or_insert(0);
        *version += 1;
        Name {
            base,
            version: *version,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_names_are_distinct_per_base() {
        let supply = NameSupply::new();
        let a = supply.fresh("x");
        let b = supply.fresh("x");
        let c = supply.fresh("y");
        assert_ne!(a, b);
        assert_eq!(a.base, "x");
        assert_eq!(b.version, a.version + 1);
        assert_eq!(c.base, "y");
        assert_eq!(c.version, 1);
    }

    #[test]
    fn display_formats_base_dot_version() {
        let n = Name {
            base: "x".into(),
            version: 3,
        };
        assert_eq!(n.to_string(), "x.3");
    }

    #[test]
    fn original_name_has_no_suffix() {
        let n = Name::original("x");
        assert_eq!(n.to_string(), "x");
        assert_eq!(n.version, 0);
    }
}
