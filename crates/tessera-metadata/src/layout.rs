//! Layout metadata: the signed supply-chain plan.
//!
//! Steps and inspections are carried as data only. Evaluating them
//! (threshold counting, artifact rules, running inspections) happens
//! outside this crate.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::canonical::{CanonicalValue, ToCanonical};
use crate::keys::Key;

/// An artifact rule such as `["MATCH", "foo.py", "WITH", "PRODUCTS", "FROM", "write-code"]`.
pub type ArtifactRule = Vec<String>;

/// `_type` tag of a [`Step`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepType {
    #[default]
    Step,
}

/// `_type` tag of an [`Inspection`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InspectionType {
    #[default]
    Inspection,
}

/// A step functionaries must perform and sign a link for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Step {
    #[serde(rename = "_type")]
    pub step_type: StepType,
    pub name: String,
    /// Ids of the keys authorized to sign this step's link.
    pub pubkeys: Vec<String>,
    pub expected_command: Vec<String>,
    /// Minimum number of distinct authorized signers.
    pub threshold: i64,
    pub expected_materials: Vec<ArtifactRule>,
    pub expected_products: Vec<ArtifactRule>,
}

impl ToCanonical for Step {
    fn to_canonical(&self) -> CanonicalValue {
        CanonicalValue::object([
            ("_type", CanonicalValue::from("step")),
            ("name", CanonicalValue::from(self.name.as_str())),
            ("pubkeys", CanonicalValue::strings(&self.pubkeys)),
            ("expected_command", CanonicalValue::strings(&self.expected_command)),
            ("threshold", CanonicalValue::Int(self.threshold)),
            ("expected_materials", self.expected_materials.to_canonical()),
            ("expected_products", self.expected_products.to_canonical()),
        ])
    }
}

/// A command run by the verifier itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Inspection {
    #[serde(rename = "_type")]
    pub inspection_type: InspectionType,
    pub name: String,
    pub run: Vec<String>,
    pub expected_materials: Vec<ArtifactRule>,
    pub expected_products: Vec<ArtifactRule>,
}

impl ToCanonical for Inspection {
    fn to_canonical(&self) -> CanonicalValue {
        CanonicalValue::object([
            ("_type", CanonicalValue::from("inspection")),
            ("name", CanonicalValue::from(self.name.as_str())),
            ("run", CanonicalValue::strings(&self.run)),
            ("expected_materials", self.expected_materials.to_canonical()),
            ("expected_products", self.expected_products.to_canonical()),
        ])
    }
}

/// The authorized plan: steps, inspections and the keys allowed to sign.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Layout {
    pub steps: Vec<Step>,
    pub inspect: Vec<Inspection>,
    /// Functionary keys by key id.
    pub keys: BTreeMap<String, Key>,
    /// RFC 3339 timestamp after which the layout is no longer valid.
    pub expires: String,
    pub readme: String,
}

impl Layout {
    /// Add a functionary key under its own id.
    pub fn add_key(&mut self, key: &Key) {
        self.keys
            .insert(key.key_id().to_owned(), key.public_only());
    }

    /// Look up a step by name.
    #[must_use]
    pub fn step(&self, name: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.name == name)
    }
}

impl ToCanonical for Layout {
    fn to_canonical(&self) -> CanonicalValue {
        CanonicalValue::object([
            ("steps", self.steps.to_canonical()),
            ("inspect", self.inspect.to_canonical()),
            ("keys", CanonicalValue::map_of(&self.keys)),
            ("expires", CanonicalValue::from(self.expires.as_str())),
            ("readme", CanonicalValue::from(self.readme.as_str())),
        ])
    }
}
