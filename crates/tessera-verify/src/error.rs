//! Error types for the verification subsystem.

use std::path::PathBuf;

use tessera_metadata::MetadataError;

/// Errors from the Tessera verification subsystem.
///
/// Failed checks inside a verification run are reported as outcomes, not
/// errors; these variants mean the run itself could not proceed.
#[derive(Debug, thiserror::Error)]
pub enum VerificationError {
    /// Loading, parsing, signing or verifying metadata failed.
    #[error(transparent)]
    Metadata(#[from] MetadataError),

    /// The configuration file is not valid JSON for [`VerifyConfig`].
    ///
    /// [`VerifyConfig`]: crate::VerifyConfig
    #[error("invalid configuration in `{}`: {source}", path.display())]
    InvalidConfig {
        /// The configuration file.
        path: PathBuf,
        /// The underlying parse error.
        source: serde_json::Error,
    },

    /// I/O error during verification.
    #[error("verification I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// The worker pool could not be started.
    #[error("failed to build verification thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl VerificationError {
    /// Returns `true` if a signature was checked and found invalid.
    #[must_use]
    pub const fn is_signature_failure(&self) -> bool {
        matches!(self, Self::Metadata(e) if e.is_signature_failure())
    }
}
