//! Signature creation and verification.
//!
//! Parameters are fixed per key family for interoperability:
//!
//! - RSA: RSASSA-PSS with SHA-256, MGF1-SHA-256 and a 32-byte salt.
//! - ECDSA: SHA-256 digest on every curve, ASN.1 DER `(r, s)` signature.
//! - Ed25519: the raw payload, no pre-hash.
//!
//! Signatures travel as lowercase hex.

use aws_lc_rs::rand::SystemRandom;
use aws_lc_rs::signature::{
    ECDSA_P256_SHA256_ASN1, ECDSA_P384_SHA256_ASN1, ECDSA_P521_SHA256_ASN1, ED25519,
    Ed25519KeyPair, KeyPair, RSA_PSS_2048_8192_SHA256, RSA_PSS_SHA256, UnparsedPublicKey,
    VerificationAlgorithm,
};
use p384::ecdsa::signature::hazmat::PrehashSigner;
use p384::pkcs8::DecodePrivateKey;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::canonical::{CanonicalValue, ToCanonical};
use crate::error::MetadataError;
use crate::keys::{self, EcdsaCurve, Key, KeyMaterial, KeyType};

const RSA_MIN_BITS: usize = 2048;
const RSA_MAX_BITS: usize = 8192;

/// A detached signature over a document's canonical bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Signature {
    /// Id of the key that produced the signature.
    #[serde(rename = "keyid")]
    pub key_id: String,
    /// Lowercase hex signature bytes.
    pub sig: String,
}

impl ToCanonical for Signature {
    fn to_canonical(&self) -> CanonicalValue {
        CanonicalValue::object([
            ("keyid", CanonicalValue::from(self.key_id.as_str())),
            ("sig", CanonicalValue::from(self.sig.as_str())),
        ])
    }
}

/// Sign `payload` with the private component of `key`.
pub fn sign(payload: &[u8], key: &Key) -> Result<Signature, MetadataError> {
    let private = key
        .private()
        .ok_or_else(|| MetadataError::MissingPrivateKey(key.key_id().to_owned()))?;
    let material = decode_for(private, key)?;

    let sig = match material {
        KeyMaterial::RsaPrivate(key_pair) => {
            let rng = SystemRandom::new();
            let mut sig = vec![0; key_pair.public_modulus_len()];
            key_pair
                .sign(&RSA_PSS_SHA256, &rng, payload, &mut sig)
                .map_err(|e| MetadataError::SigningFailed(format!("RSA-PSS: {e}")))?;
            sig
        }
        KeyMaterial::EcdsaPrivate {
            curve: EcdsaCurve::P384,
            pkcs8,
            ..
        } => sign_p384_sha256(&pkcs8, payload)?,
        KeyMaterial::EcdsaPrivate {
            curve, key_pair, ..
        } => {
            let rng = SystemRandom::new();
            key_pair
                .sign(&rng, payload)
                .map_err(|e| MetadataError::SigningFailed(format!("ECDSA {curve}: {e}")))?
                .as_ref()
                .to_vec()
        }
        KeyMaterial::Ed25519Private { seed, public } => {
            Ed25519KeyPair::from_seed_and_public_key(&seed, &public)
                .map_err(|e| MetadataError::MalformedKey(format!("invalid Ed25519 key: {e}")))?
                .sign(payload)
                .as_ref()
                .to_vec()
        }
        KeyMaterial::RsaPublic(_)
        | KeyMaterial::EcdsaPublic { .. }
        | KeyMaterial::Ed25519Public(_) => {
            return Err(MetadataError::MissingPrivateKey(key.key_id().to_owned()));
        }
    };

    tracing::debug!(keyid = %key.key_id(), keytype = %key.key_type(), "signed payload");
    Ok(Signature {
        key_id: key.key_id().to_owned(),
        sig: hex::encode(sig),
    })
}

/// Verify `signature` over `payload` with the public component of `key`.
///
/// Returns [`MetadataError::InvalidSignature`] only when the cryptographic
/// check ran and failed; every other error means it could not run.
pub fn verify(payload: &[u8], key: &Key, signature: &Signature) -> Result<(), MetadataError> {
    let material = decode_for(key.public(), key)?;
    let (algorithm, public): (&'static dyn VerificationAlgorithm, Vec<u8>) = match material {
        KeyMaterial::RsaPrivate(key_pair) => {
            rsa_verifier(key_pair.public_key().as_ref().to_vec())?
        }
        KeyMaterial::RsaPublic(der) => rsa_verifier(der)?,
        KeyMaterial::EcdsaPrivate {
            curve, key_pair, ..
        } => {
            (ecdsa_verifier(curve), key_pair.public_key().as_ref().to_vec())
        }
        KeyMaterial::EcdsaPublic { curve, point } => (ecdsa_verifier(curve), point),
        KeyMaterial::Ed25519Private { public, .. } | KeyMaterial::Ed25519Public(public) => {
            (&ED25519 as &'static dyn VerificationAlgorithm, public)
        }
    };

    let sig = decode_signature(&signature.sig)?;
    UnparsedPublicKey::new(algorithm, public)
        .verify(payload, &sig)
        .map_err(|_| {
            tracing::warn!(keyid = %key.key_id(), keytype = %key.key_type(), "signature rejected");
            MetadataError::InvalidSignature(format!(
                "{} signature by key {} does not match the payload",
                key.key_type(),
                key.key_id()
            ))
        })
}

/// Decode stored key text and check it belongs to the declared family.
fn decode_for(text: &str, key: &Key) -> Result<KeyMaterial, MetadataError> {
    if let KeyType::Other(other) = key.key_type() {
        return Err(MetadataError::UnsupportedKeyType(other.clone()));
    }
    let material = keys::decode_stored(text, key.key_type())?;
    let actual = material.key_type();
    if &actual != key.key_type() {
        return Err(MetadataError::InvalidKeyType {
            declared: key.key_type().to_string(),
            actual: actual.to_string(),
        });
    }
    Ok(material)
}

fn rsa_verifier(
    der: Vec<u8>,
) -> Result<(&'static dyn VerificationAlgorithm, Vec<u8>), MetadataError> {
    let bits = keys::rsa_modulus_bits(&der)?;
    if !(RSA_MIN_BITS..=RSA_MAX_BITS).contains(&bits) {
        return Err(MetadataError::UnsupportedKeyType(format!(
            "{bits}-bit RSA modulus, expected {RSA_MIN_BITS} to {RSA_MAX_BITS} bits"
        )));
    }
    Ok((&RSA_PSS_2048_8192_SHA256, der))
}

fn ecdsa_verifier(curve: EcdsaCurve) -> &'static dyn VerificationAlgorithm {
    match curve {
        EcdsaCurve::P256 => &ECDSA_P256_SHA256_ASN1,
        EcdsaCurve::P384 => &ECDSA_P384_SHA256_ASN1,
        EcdsaCurve::P521 => &ECDSA_P521_SHA256_ASN1,
    }
}

/// ECDSA P-384 over a SHA-256 prehash. aws-lc-rs only pairs P-384 with
/// SHA-384 for signing.
fn sign_p384_sha256(pkcs8: &[u8], payload: &[u8]) -> Result<Vec<u8>, MetadataError> {
    let signing_key = p384::ecdsa::SigningKey::from_pkcs8_der(pkcs8)
        .map_err(|e| MetadataError::MalformedKey(format!("invalid P-384 private key: {e}")))?;
    let signature: p384::ecdsa::Signature = signing_key
        .sign_prehash(Sha256::digest(payload).as_slice())
        .map_err(|e| MetadataError::SigningFailed(format!("ECDSA P-384: {e}")))?;
    Ok(signature.to_der().as_bytes().to_vec())
}

/// Hex that another encoder could also have produced (uppercase, odd
/// length) is never accepted, so any bit flip is an `InvalidSignature`.
fn decode_signature(sig: &str) -> Result<Vec<u8>, MetadataError> {
    let is_lower_hex = sig
        .bytes()
        .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
    if !is_lower_hex || sig.len() % 2 != 0 {
        return Err(MetadataError::InvalidSignature(
            "signature is not lowercase hex".to_owned(),
        ));
    }
    hex::decode(sig).map_err(|e| MetadataError::InvalidSignature(format!("bad hex: {e}")))
}
