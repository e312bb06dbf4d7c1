//! Verification of signed Tessera layouts and links.
//!
//! `tessera-verify` sits between a caller (CLI, CI job) and the
//! cryptographic core in `tessera-metadata`:
//!
//! 1. **Boundary** ([`api`]): read documents and keys from disk.
//! 2. **Layout**: every trusted key signed it, it has not expired, and its
//!    key table is consistent.
//! 3. **Links**: signatures by layout keys are checked in parallel.
//!
//! Checks produce a [`VerificationReport`] rather than stopping at the
//! first failure.

pub mod api;
pub mod config;
pub mod error;
pub mod verify;

pub use config::VerifyConfig;
pub use error::VerificationError;
pub use verify::{VerificationOutcome, VerificationReport, Verifier};
