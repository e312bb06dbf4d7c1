//! PEM framing helpers.

use base64::Engine;

/// A decoded PEM block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PemBlock {
    /// The label between `-----BEGIN ` and `-----`, e.g. `PUBLIC KEY`.
    pub label: String,
    /// The base64-decoded body.
    pub der: Vec<u8>,
}

/// Wrap DER bytes in PEM with the given label, 64 base64 columns per line.
pub fn der_to_pem(der: &[u8], label: &str) -> String {
    use std::fmt::Write;

    let b64 = base64::engine::general_purpose::STANDARD.encode(der);
    let mut pem = format!("-----BEGIN {label}-----\n");
    let mut rest = b64.as_str();
    while !rest.is_empty() {
        // base64 output is ASCII, so any byte offset is a char boundary
        let (line, tail) = rest.split_at(rest.len().min(64));
        pem.push_str(line);
        pem.push('\n');
        rest = tail;
    }
    let _ = writeln!(pem, "-----END {label}-----");
    pem
}

/// Decode the first PEM block in `text`.
///
/// Returns `None` when there is no `BEGIN`/`END` pair with matching labels
/// or the body is not valid base64. Text before the block is ignored, as
/// are RFC 1421 header lines inside it.
pub fn decode_first_block(text: &str) -> Option<PemBlock> {
    let mut label = None;
    let mut b64 = String::new();

    for line in text.lines() {
        let trimmed = line.trim();
        match &label {
            None => {
                if let Some(l) = trimmed
                    .strip_prefix("-----BEGIN ")
                    .and_then(|rest| rest.strip_suffix("-----"))
                {
                    label = Some(l.to_owned());
                }
            }
            Some(open) => {
                if let Some(close) = trimmed
                    .strip_prefix("-----END ")
                    .and_then(|rest| rest.strip_suffix("-----"))
                {
                    if close != open {
                        return None;
                    }
                    let der = base64::engine::general_purpose::STANDARD
                        .decode(&b64)
                        .ok()?;
                    return Some(PemBlock {
                        label: open.clone(),
                        der,
                    });
                }
                if !trimmed.contains(':') {
                    b64.push_str(trimmed);
                }
            }
        }
    }

    None
}
