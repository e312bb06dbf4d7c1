//! Verification configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tessera_metadata::DEFAULT_KEYID_HASH_ALGORITHMS;

use crate::error::VerificationError;

/// Configuration for a verification run.
///
/// Every field has a default, so `{}` is a valid configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VerifyConfig {
    /// Hash algorithms recorded on keys parsed from files. Part of the key
    /// id, so it must match what the layout author used.
    pub keyid_hash_algorithms: Vec<String>,
    /// Scheme recorded on parsed keys instead of the family default.
    pub scheme: Option<String>,
    /// Worker threads for signature checks. `None` lets rayon decide.
    pub threads: Option<usize>,
    /// Reject layouts whose `expires` lies in the past.
    pub check_expiration: bool,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            keyid_hash_algorithms: DEFAULT_KEYID_HASH_ALGORITHMS.map(str::to_owned).to_vec(),
            scheme: None,
            threads: None,
            check_expiration: true,
        }
    }
}

impl VerifyConfig {
    /// Load a configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, VerificationError> {
        let data = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&data).map_err(|source| {
            VerificationError::InvalidConfig {
                path: path.to_path_buf(),
                source,
            }
        })?;
        tracing::debug!(path = %path.display(), ?config, "loaded verification config");
        Ok(config)
    }
}
