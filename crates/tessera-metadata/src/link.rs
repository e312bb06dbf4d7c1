//! Link metadata: the signed record of one executed step.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::canonical::{CanonicalValue, ToCanonical};

/// Observed inputs, outputs and command of one step execution.
///
/// The artifact and byproduct maps are free-form JSON restricted to what
/// canonical encoding can represent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Link {
    /// Step name this link records.
    pub name: String,
    /// Artifacts consumed, keyed by path.
    pub materials: BTreeMap<String, CanonicalValue>,
    /// Artifacts produced, keyed by path.
    pub products: BTreeMap<String, CanonicalValue>,
    /// Side outputs such as `stdout`, `stderr` and `return-value`.
    pub byproducts: BTreeMap<String, CanonicalValue>,
    /// The executed command line.
    pub command: Vec<String>,
    /// Recorded environment.
    pub environment: BTreeMap<String, CanonicalValue>,
}

impl Link {
    /// Create an empty link for the named step.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

impl ToCanonical for Link {
    fn to_canonical(&self) -> CanonicalValue {
        CanonicalValue::object([
            ("name", CanonicalValue::from(self.name.as_str())),
            ("materials", CanonicalValue::map_of(&self.materials)),
            ("products", CanonicalValue::map_of(&self.products)),
            ("byproducts", CanonicalValue::map_of(&self.byproducts)),
            ("command", CanonicalValue::strings(&self.command)),
            ("environment", CanonicalValue::map_of(&self.environment)),
        ])
    }
}
