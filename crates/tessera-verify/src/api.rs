//! Boundary functions for command-line and orchestration layers.
//!
//! File reads happen here, before any cryptographic work, so the checks in
//! `tessera-metadata` stay free of I/O.

use std::path::Path;

use tessera_metadata::{Key, Metablock, Signature, signing};

use crate::config::VerifyConfig;
use crate::error::VerificationError;

/// Load a link or layout from a file.
pub fn load(path: &Path) -> Result<Metablock, VerificationError> {
    Ok(Metablock::load_file(path)?)
}

/// Verify the signature `key` made over `metablock`.
pub fn verify(metablock: &Metablock, key: &Key) -> Result<(), VerificationError> {
    Ok(metablock.verify_signature(key)?)
}

/// Sign arbitrary payload bytes.
pub fn sign(payload: &[u8], key: &Key) -> Result<Signature, VerificationError> {
    Ok(signing::sign(payload, key)?)
}

/// Read a key file using the scheme and key id hash algorithms from `config`.
pub fn parse_key(path: &Path, config: &VerifyConfig) -> Result<Key, VerificationError> {
    Ok(Key::load(
        path,
        config.scheme.as_deref(),
        &config.keyid_hash_algorithms,
    )?)
}
