//! Error types for metadata loading, key parsing and signatures.

/// Errors from the Tessera metadata subsystem.
///
/// Structural problems (malformed documents or keys, unsupported key
/// families) mean a signature check could not run. [`InvalidSignature`]
/// is the only variant meaning the check ran and failed.
///
/// [`InvalidSignature`]: MetadataError::InvalidSignature
#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    /// The metadata document is not valid JSON or lacks required fields.
    #[error("malformed metadata document: {0}")]
    MalformedDocument(String),

    /// `signed._type` is neither `link` nor `layout`.
    #[error("unknown document type `{0}`: expected `link` or `layout`")]
    UnknownDocumentType(String),

    /// The key material has no PEM framing or its DER cannot be parsed.
    #[error("malformed key: {0}")]
    MalformedKey(String),

    /// The key belongs to an algorithm family this crate cannot use.
    #[error("unsupported key type: {0}")]
    UnsupportedKeyType(String),

    /// The declared `keytype` does not match the parsed key material.
    #[error("invalid key type: key declares `{declared}` but its material is `{actual}`")]
    InvalidKeyType {
        /// The `keytype` recorded on the key.
        declared: String,
        /// The family the material actually parsed as.
        actual: String,
    },

    /// A signing operation was attempted with a verification-only key.
    #[error("key {0} has no private component")]
    MissingPrivateKey(String),

    /// The crypto backend refused to produce a signature.
    #[error("signing failed: {0}")]
    SigningFailed(String),

    /// The document carries no signature from the requested key.
    #[error("no signature found for key {0}")]
    NoSignatureForKey(String),

    /// The cryptographic check ran and rejected the signature.
    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    /// Reading a document or key failed.
    #[error("metadata I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MetadataError {
    /// Returns `true` if a signature was checked and found invalid, as
    /// opposed to the check being impossible to perform.
    #[must_use]
    pub const fn is_signature_failure(&self) -> bool {
        matches!(self, Self::InvalidSignature(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_invalid_signature_is_a_signature_failure() {
        assert!(MetadataError::InvalidSignature("rsa".into()).is_signature_failure());
        assert!(!MetadataError::UnsupportedKeyType("dsa".into()).is_signature_failure());
        assert!(!MetadataError::MalformedKey("no PEM block".into()).is_signature_failure());
        assert!(!MetadataError::NoSignatureForKey("abc".into()).is_signature_failure());
    }

    #[test]
    fn invalid_key_type_names_both_sides() {
        let err = MetadataError::InvalidKeyType {
            declared: "ecdsa".into(),
            actual: "rsa".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("`ecdsa`") && msg.contains("`rsa`"), "got: {msg}");
    }

    #[test]
    fn metadata_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<MetadataError>();
    }
}
