//! Top-level verification orchestrator.
//!
//! The `Verifier` checks a layout against trusted keys and links against
//! the layout's key table. Every check yields a [`VerificationOutcome`];
//! one failing signature does not stop the others from being checked.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use tessera_metadata::{Key, Layout, Metablock, signing};

use crate::api;
use crate::config::VerifyConfig;
use crate::error::VerificationError;

/// Outcome of a single verification check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationOutcome {
    /// The check passed.
    Pass(String),
    /// The check failed.
    Fail(String),
    /// The check was skipped (not enough information).
    Skip(String),
}

impl VerificationOutcome {
    /// Returns `true` if this outcome is a failure.
    pub const fn is_fail(&self) -> bool {
        matches!(self, Self::Fail(_))
    }

    /// Get the message for this outcome.
    pub fn message(&self) -> &str {
        match self {
            Self::Pass(m) | Self::Fail(m) | Self::Skip(m) => m,
        }
    }
}

/// The result of a full verification run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationReport {
    /// Individual check outcomes.
    pub outcomes: Vec<VerificationOutcome>,
    /// Overall pass/fail.
    pub passed: bool,
}

impl VerificationReport {
    fn from_outcomes(outcomes: Vec<VerificationOutcome>) -> Self {
        let passed = !outcomes.is_empty() && !outcomes.iter().any(VerificationOutcome::is_fail);
        Self { outcomes, passed }
    }

    /// Append another report's outcomes.
    #[must_use]
    pub fn merge(mut self, other: Self) -> Self {
        self.outcomes.extend(other.outcomes);
        Self::from_outcomes(self.outcomes)
    }

    /// The failed outcomes.
    pub fn failures(&self) -> impl Iterator<Item = &VerificationOutcome> {
        self.outcomes.iter().filter(|o| o.is_fail())
    }
}

/// Orchestrates layout and link verification.
pub struct Verifier {
    config: VerifyConfig,
    pool: rayon::ThreadPool,
}

impl Verifier {
    /// Create a verifier and its worker pool.
    pub fn new(config: VerifyConfig) -> Result<Self, VerificationError> {
        let mut builder = rayon::ThreadPoolBuilder::new();
        if let Some(threads) = config.threads {
            builder = builder.num_threads(threads);
        }
        let pool = builder.build()?;
        Ok(Self { config, pool })
    }

    /// The configuration this verifier was built with.
    pub const fn config(&self) -> &VerifyConfig {
        &self.config
    }

    /// Verify a layout as of now.
    pub fn verify_layout(&self, metablock: &Metablock, trusted: &[Key]) -> VerificationReport {
        self.verify_layout_at(metablock, trusted, Utc::now())
    }

    /// Verify a layout as of `now`.
    ///
    /// Every trusted key must have signed the layout; it must not have
    /// expired (when expiration checks are enabled); and every entry in
    /// its key table must be stored under its own key id.
    pub fn verify_layout_at(
        &self,
        metablock: &Metablock,
        trusted: &[Key],
        now: DateTime<Utc>,
    ) -> VerificationReport {
        let Some(layout) = metablock.layout() else {
            return VerificationReport::from_outcomes(vec![VerificationOutcome::Fail(format!(
                "expected a layout, got a {}",
                metablock.signed.type_name()
            ))]);
        };

        let mut outcomes = Vec::new();
        if trusted.is_empty() {
            outcomes.push(VerificationOutcome::Fail(
                "no trusted layout keys given".to_owned(),
            ));
        }

        let signature_outcomes: Vec<_> = self.pool.install(|| {
            trusted
                .par_iter()
                .map(|key| match metablock.verify_signature(key) {
                    Ok(()) => VerificationOutcome::Pass(format!(
                        "layout signature by {} verified",
                        key.key_id()
                    )),
                    Err(e) => {
                        tracing::warn!(keyid = %key.key_id(), error = %e, "layout signature check failed");
                        VerificationOutcome::Fail(format!(
                            "layout signature by {}: {e}",
                            key.key_id()
                        ))
                    }
                })
                .collect()
        });
        outcomes.extend(signature_outcomes);

        outcomes.push(self.check_expiration(layout, now));
        outcomes.extend(check_key_table(layout));

        let report = VerificationReport::from_outcomes(outcomes);
        tracing::info!(
            passed = report.passed,
            checks = report.outcomes.len(),
            "layout verification finished"
        );
        report
    }

    /// Verify link signatures against the layout's key table.
    ///
    /// Signatures by keys the layout does not know are skipped. A link
    /// with no signature by a layout key fails.
    pub fn verify_links(&self, layout: &Layout, links: &[Metablock]) -> VerificationReport {
        let per_link: Vec<Vec<VerificationOutcome>> = self.pool.install(|| {
            links
                .par_iter()
                .map(|metablock| verify_link(layout, metablock))
                .collect()
        });

        let report = VerificationReport::from_outcomes(per_link.into_iter().flatten().collect());
        tracing::info!(
            passed = report.passed,
            links = links.len(),
            "link verification finished"
        );
        report
    }

    /// Load a layout, its trusted keys and links from files and verify
    /// all of them.
    ///
    /// Unreadable or unparsable inputs are errors; failed checks are
    /// reported as outcomes.
    pub fn verify_files(
        &self,
        layout_path: &Path,
        key_paths: &[PathBuf],
        link_paths: &[PathBuf],
    ) -> Result<VerificationReport, VerificationError> {
        let layout_block = api::load(layout_path)?;
        let trusted = key_paths
            .iter()
            .map(|path| api::parse_key(path, &self.config))
            .collect::<Result<Vec<_>, _>>()?;
        let links = link_paths
            .iter()
            .map(|path| api::load(path))
            .collect::<Result<Vec<_>, _>>()?;

        let report = self.verify_layout(&layout_block, &trusted);
        Ok(match layout_block.layout() {
            Some(layout) => report.merge(self.verify_links(layout, &links)),
            None => report,
        })
    }

    fn check_expiration(&self, layout: &Layout, now: DateTime<Utc>) -> VerificationOutcome {
        if !self.config.check_expiration {
            return VerificationOutcome::Skip("layout expiration check disabled".to_owned());
        }
        match DateTime::parse_from_rfc3339(&layout.expires) {
            Ok(expires) if expires.with_timezone(&Utc) <= now => {
                tracing::warn!(expires = %layout.expires, "layout has expired");
                VerificationOutcome::Fail(format!("layout expired at {}", layout.expires))
            }
            Ok(_) => VerificationOutcome::Pass(format!("layout valid until {}", layout.expires)),
            Err(e) => VerificationOutcome::Fail(format!(
                "layout expiry `{}` is not an RFC 3339 timestamp: {e}",
                layout.expires
            )),
        }
    }
}

fn check_key_table(layout: &Layout) -> Vec<VerificationOutcome> {
    let mut outcomes: Vec<_> = layout
        .keys
        .iter()
        .filter_map(|(id, key)| {
            if id != key.key_id() {
                Some(format!(
                    "layout key table entry {id} holds key {}",
                    key.key_id()
                ))
            } else if !key.has_consistent_id() {
                Some(format!(
                    "layout key {id} does not match its derived id {}",
                    key.derive_key_id()
                ))
            } else {
                None
            }
        })
        .map(|message| {
            tracing::warn!(%message, "inconsistent layout key");
            VerificationOutcome::Fail(message)
        })
        .collect();

    if outcomes.is_empty() {
        outcomes.push(VerificationOutcome::Pass(format!(
            "{} layout keys have consistent ids",
            layout.keys.len()
        )));
    }
    outcomes
}

fn verify_link(layout: &Layout, metablock: &Metablock) -> Vec<VerificationOutcome> {
    let Some(link) = metablock.link() else {
        return vec![VerificationOutcome::Fail(format!(
            "expected a link, got a {}",
            metablock.signed.type_name()
        ))];
    };

    let payload = metablock.signable_bytes();
    let mut outcomes = Vec::new();
    let mut authorized = false;
    for signature in &metablock.signatures {
        let Some(key) = layout.keys.get(&signature.key_id) else {
            tracing::debug!(link = %link.name, keyid = %signature.key_id, "skipping unknown signer");
            outcomes.push(VerificationOutcome::Skip(format!(
                "link {}: signature by unknown key {} skipped",
                link.name, signature.key_id
            )));
            continue;
        };
        authorized = true;
        outcomes.push(match signing::verify(&payload, key, signature) {
            Ok(()) => VerificationOutcome::Pass(format!(
                "link {} signature by {} verified",
                link.name, signature.key_id
            )),
            Err(e) => {
                tracing::warn!(link = %link.name, keyid = %signature.key_id, error = %e, "link signature check failed");
                VerificationOutcome::Fail(format!(
                    "link {} signature by {}: {e}",
                    link.name, signature.key_id
                ))
            }
        });
    }

    if !authorized {
        outcomes.push(VerificationOutcome::Fail(format!(
            "link {} has no signature by a layout key",
            link.name
        )));
    }
    outcomes
}
