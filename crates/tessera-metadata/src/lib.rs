//! Signed supply-chain metadata for Tessera.
//!
//! This crate holds the pieces every verifier builds on:
//!
//! - [`canonical`]: the deterministic JSON encoding signatures and key
//!   ids are computed over.
//! - [`keys`]: parsing RSA, ECDSA and Ed25519 key files into normalized
//!   [`Key`] values with content-derived ids.
//! - [`signing`]: producing and checking [`Signature`]s.
//! - [`link`], [`layout`] and [`metablock`]: the signed document model and
//!   its loading, signing and verification.

pub mod canonical;
pub mod error;
pub mod keys;
pub mod layout;
pub mod link;
pub mod metablock;
pub mod pem;
pub mod signing;

pub use canonical::{CanonicalValue, ToCanonical};
pub use error::MetadataError;
pub use keys::{DEFAULT_KEYID_HASH_ALGORITHMS, Key, KeyType, KeyVal};
pub use layout::{Inspection, Layout, Step};
pub use link::Link;
pub use metablock::{Metablock, SignedDocument};
pub use signing::Signature;
