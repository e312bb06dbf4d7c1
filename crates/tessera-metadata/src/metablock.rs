//! Signed metadata envelopes.
//!
//! A [`Metablock`] pairs a [`SignedDocument`] with detached signatures over
//! its canonical bytes. The document kind is resolved from `signed._type`
//! while loading, so every consumer works with a typed [`Link`] or
//! [`Layout`].

use std::path::Path;

use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::canonical::{self, CanonicalValue, ToCanonical};
use crate::error::MetadataError;
use crate::keys::Key;
use crate::layout::Layout;
use crate::link::Link;
use crate::signing::{self, Signature};

/// The signed payload of a [`Metablock`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignedDocument {
    Link(Link),
    Layout(Layout),
}

impl SignedDocument {
    /// The `_type` discriminant of this document.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Link(_) => "link",
            Self::Layout(_) => "layout",
        }
    }
}

impl ToCanonical for SignedDocument {
    fn to_canonical(&self) -> CanonicalValue {
        let mut value = match self {
            Self::Link(link) => link.to_canonical(),
            Self::Layout(layout) => layout.to_canonical(),
        };
        if let CanonicalValue::Object(fields) = &mut value {
            fields.insert("_type".to_owned(), CanonicalValue::from(self.type_name()));
        }
        value
    }
}

impl Serialize for SignedDocument {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_canonical().serialize(serializer)
    }
}

impl From<Link> for SignedDocument {
    fn from(link: Link) -> Self {
        Self::Link(link)
    }
}

impl From<Layout> for SignedDocument {
    fn from(layout: Layout) -> Self {
        Self::Layout(layout)
    }
}

/// A signed document with its signatures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Metablock {
    pub signed: SignedDocument,
    pub signatures: Vec<Signature>,
}

impl Metablock {
    /// Wrap an unsigned document.
    #[must_use]
    pub fn new(signed: impl Into<SignedDocument>) -> Self {
        Self {
            signed: signed.into(),
            signatures: Vec::new(),
        }
    }

    /// Parse a metadata document from JSON bytes.
    ///
    /// Fails with [`MetadataError::MalformedDocument`] unless the top level
    /// has `signed` and `signatures`, and with
    /// [`MetadataError::UnknownDocumentType`] when `signed._type` is
    /// neither `link` nor `layout`.
    pub fn load(bytes: &[u8]) -> Result<Self, MetadataError> {
        let raw: Value = serde_json::from_slice(bytes)
            .map_err(|e| MetadataError::MalformedDocument(format!("invalid JSON: {e}")))?;
        let Value::Object(mut envelope) = raw else {
            return Err(MetadataError::MalformedDocument(
                "top level is not a JSON object".to_owned(),
            ));
        };
        let (Some(signed), Some(signatures)) =
            (envelope.remove("signed"), envelope.remove("signatures"))
        else {
            return Err(MetadataError::MalformedDocument(
                "document must have both `signed` and `signatures`".to_owned(),
            ));
        };

        let Value::Object(mut signed) = signed else {
            return Err(MetadataError::MalformedDocument(
                "`signed` is not a JSON object".to_owned(),
            ));
        };
        let doc_type = match signed.remove("_type") {
            Some(Value::String(doc_type)) => doc_type,
            Some(other) => {
                return Err(MetadataError::MalformedDocument(format!(
                    "`_type` must be a string, got {other}"
                )));
            }
            None => {
                return Err(MetadataError::MalformedDocument(
                    "`signed` has no `_type`".to_owned(),
                ));
            }
        };

        let signed = Value::Object(signed);
        let signed = match doc_type.as_str() {
            "link" => SignedDocument::Link(decode(signed, "link")?),
            "layout" => SignedDocument::Layout(decode(signed, "layout")?),
            _ => return Err(MetadataError::UnknownDocumentType(doc_type)),
        };
        let signatures: Vec<Signature> = decode(signatures, "signatures")?;

        tracing::debug!(
            doc_type = signed.type_name(),
            signatures = signatures.len(),
            "decoded metablock"
        );
        Ok(Self { signed, signatures })
    }

    /// Read and parse a metadata file.
    pub fn load_file(path: &Path) -> Result<Self, MetadataError> {
        let bytes = std::fs::read(path)?;
        let metablock = Self::load(&bytes)?;
        tracing::info!(
            path = %path.display(),
            doc_type = metablock.signed.type_name(),
            "loaded metadata"
        );
        Ok(metablock)
    }

    /// Canonical bytes of `signed`, recomputed from the current state.
    #[must_use]
    pub fn signable_bytes(&self) -> Vec<u8> {
        canonical::encode(&self.signed.to_canonical())
    }

    /// Verify the signature made by `key`.
    ///
    /// Fails with [`MetadataError::NoSignatureForKey`] when no signature
    /// carries the key's id. The first matching signature is checked.
    pub fn verify_signature(&self, key: &Key) -> Result<(), MetadataError> {
        let signature = self
            .signatures
            .iter()
            .find(|s| s.key_id == key.key_id())
            .ok_or_else(|| MetadataError::NoSignatureForKey(key.key_id().to_owned()))?;
        tracing::debug!(
            keyid = %key.key_id(),
            doc_type = self.signed.type_name(),
            "verifying signature"
        );
        signing::verify(&self.signable_bytes(), key, signature)
    }

    /// Sign the document with `key`, replacing an earlier signature by
    /// the same key.
    pub fn sign(&mut self, key: &Key) -> Result<(), MetadataError> {
        let signature = signing::sign(&self.signable_bytes(), key)?;
        self.signatures.retain(|s| s.key_id != signature.key_id);
        self.signatures.push(signature);
        Ok(())
    }

    /// The link, if this is a link.
    #[must_use]
    pub const fn link(&self) -> Option<&Link> {
        match &self.signed {
            SignedDocument::Link(link) => Some(link),
            SignedDocument::Layout(_) => None,
        }
    }

    /// The layout, if this is a layout.
    #[must_use]
    pub const fn layout(&self) -> Option<&Layout> {
        match &self.signed {
            SignedDocument::Layout(layout) => Some(layout),
            SignedDocument::Link(_) => None,
        }
    }

    /// Pretty-printed JSON; object keys inside `signed` are sorted.
    pub fn to_json_pretty(&self) -> Result<String, MetadataError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| MetadataError::MalformedDocument(format!("cannot serialize: {e}")))
    }

    /// Write the document to `path` as pretty JSON.
    pub fn dump(&self, path: &Path) -> Result<(), MetadataError> {
        let mut json = self.to_json_pretty()?;
        json.push('\n');
        std::fs::write(path, json)?;
        tracing::info!(
            path = %path.display(),
            doc_type = self.signed.type_name(),
            "wrote metadata"
        );
        Ok(())
    }
}

fn decode<T: serde::de::DeserializeOwned>(value: Value, what: &str) -> Result<T, MetadataError> {
    serde_json::from_value(value)
        .map_err(|e| MetadataError::MalformedDocument(format!("invalid {what}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::DEFAULT_KEYID_HASH_ALGORITHMS;

    const PACKAGE_LINK: &[u8] = include_bytes!("../tests/data/package.link");
    const WRITE_CODE_LINK: &[u8] = include_bytes!("../tests/data/write-code.link");
    const DEMO_LAYOUT: &[u8] = include_bytes!("../tests/data/demo.layout");

    fn key(raw: &[u8]) -> Key {
        let algs = DEFAULT_KEYID_HASH_ALGORITHMS.map(str::to_owned);
        Key::parse(raw, None, &algs).expect("fixture key should parse")
    }

    fn raw_canonical(bytes: &[u8]) -> Vec<u8> {
        let mut raw: Value = serde_json::from_slice(bytes).unwrap();
        let signed = CanonicalValue::try_from(raw["signed"].take()).unwrap();
        canonical::encode(&signed)
    }

    fn step1() -> Link {
        Link {
            command: vec!["echo".into(), "hi".into()],
            ..Link::new("step1")
        }
    }

    #[test]
    fn loads_link_shape() {
        let metablock = Metablock::load(PACKAGE_LINK).expect("load");
        let link = metablock.link().expect("is a link");
        assert_eq!(metablock.signed.type_name(), "link");
        assert_eq!(link.name, "package");
        assert_eq!(link.command, ["tar", "zcvf", "foo.tar.gz", "foo.py"]);
        assert!(link.materials.contains_key("foo.py"));
        assert!(link.products.contains_key("foo.tar.gz"));
        assert!(metablock.layout().is_none());
    }

    #[test]
    fn loads_layout_shape() {
        let metablock = Metablock::load(DEMO_LAYOUT).expect("load");
        let layout = metablock.layout().expect("is a layout");
        assert_eq!(layout.steps.len(), 2);
        assert_eq!(layout.inspect[0].name, "untar");
        assert_eq!(layout.keys.len(), 2);
        assert!(layout.keys.values().all(Key::has_consistent_id));
        assert_eq!(layout.step("package").unwrap().threshold, 1);
    }

    #[test]
    fn signable_bytes_match_the_raw_signed_object() {
        for fixture in [PACKAGE_LINK, WRITE_CODE_LINK, DEMO_LAYOUT] {
            let metablock = Metablock::load(fixture).expect("load");
            assert_eq!(metablock.signable_bytes(), raw_canonical(fixture));
        }
    }

    #[test]
    fn independently_signed_fixtures_verify() {
        let cases: [(&[u8], &[u8]); 3] = [
            (PACKAGE_LINK, include_bytes!("../tests/data/alice.pub")),
            (WRITE_CODE_LINK, include_bytes!("../tests/data/dave.pub")),
            (DEMO_LAYOUT, include_bytes!("../tests/data/carol.pub")),
        ];
        for (document, public) in cases {
            let metablock = Metablock::load(document).expect("load");
            metablock
                .verify_signature(&key(public))
                .expect("fixture signature should verify");
        }
    }

    #[test]
    fn unknown_document_type_is_rejected() {
        let doc = br#"{"signed": {"_type": "widget"}, "signatures": []}"#;
        let err = Metablock::load(doc).unwrap_err();
        assert!(
            matches!(&err, MetadataError::UnknownDocumentType(t) if t == "widget"),
            "got: {err}"
        );
    }

    #[test]
    fn structural_problems_are_malformed() {
        let docs: [&[u8]; 10] = [
            b"not json",
            b"[]",
            br#"{"signed": {"_type": "link"}}"#,
            br#"{"signatures": []}"#,
            br#"{"signed": "link", "signatures": []}"#,
            br#"{"signed": {"name": "x"}, "signatures": []}"#,
            br#"{"signed": {"_type": 7}, "signatures": []}"#,
            br#"{"signed": {"_type": "link", "name": "x"}, "signatures": []}"#,
            br#"{"signed": {"_type": "link", "name": "x", "materials": {}, "products": {},
                "byproducts": {"ratio": 0.5}, "command": [], "environment": {}},
                "signatures": []}"#,
            br#"{"signed": {"_type": "link", "name": "x", "materials": {}, "products": {},
                "byproducts": {}, "command": [], "environment": {}},
                "signatures": [{"keyid": "ab"}]}"#,
        ];
        for doc in docs {
            let err = Metablock::load(doc).unwrap_err();
            assert!(matches!(err, MetadataError::MalformedDocument(_)), "got: {err}");
        }
    }

    #[test]
    fn mutation_is_reflected_in_signable_bytes() {
        let alice = key(include_bytes!("../tests/data/alice.pub"));
        let mut metablock = Metablock::load(PACKAGE_LINK).expect("load");
        let before = metablock.signable_bytes();
        metablock.verify_signature(&alice).expect("untouched");

        if let SignedDocument::Link(link) = &mut metablock.signed {
            link.command.push("bar.py".into());
        }
        assert_ne!(metablock.signable_bytes(), before);
        let err = metablock.verify_signature(&alice).unwrap_err();
        assert!(err.is_signature_failure(), "got: {err}");
    }

    #[test]
    fn missing_signer_is_not_an_invalid_signature() {
        let metablock = Metablock::load(PACKAGE_LINK).expect("load");
        let bob = key(include_bytes!("../tests/data/bob.pub"));
        let err = metablock.verify_signature(&bob).unwrap_err();
        assert!(
            matches!(&err, MetadataError::NoSignatureForKey(id) if id == bob.key_id()),
            "got: {err}"
        );
    }

    #[test]
    fn rsa_link_scenario() {
        let alice = key(include_bytes!("../tests/data/alice.pem"));
        let mallory = key(include_bytes!("../tests/data/mallory.pub"));

        let mut metablock = Metablock::new(step1());
        assert_eq!(
            metablock.signable_bytes(),
            br#"{"_type":"link","byproducts":{},"command":["echo","hi"],"environment":{},"materials":{},"name":"step1","products":{}}"#
        );
        let signature = signing::sign(&metablock.signable_bytes(), &alice).expect("sign");
        metablock.signatures.push(signature.clone());
        metablock
            .verify_signature(&alice.public_only())
            .expect("signer's public key verifies");

        // the same signature presented as mallory's
        metablock.signatures.push(Signature {
            key_id: mallory.key_id().to_owned(),
            sig: signature.sig,
        });
        let err = metablock.verify_signature(&mallory).unwrap_err();
        assert!(matches!(err, MetadataError::InvalidSignature(_)), "got: {err}");
    }

    #[test]
    fn signing_replaces_previous_signature_by_same_key() {
        let carol = key(include_bytes!("../tests/data/carol.hex"));
        let bob = key(include_bytes!("../tests/data/bob.pem"));
        let mut metablock = Metablock::new(step1());

        metablock.sign(&carol).expect("sign");
        metablock.sign(&bob).expect("sign");
        if let SignedDocument::Link(link) = &mut metablock.signed {
            link.name = "step2".into();
        }
        metablock.sign(&carol).expect("re-sign");

        assert_eq!(metablock.signatures.len(), 2);
        metablock.verify_signature(&carol).expect("fresh signature");
        assert!(metablock.verify_signature(&bob).unwrap_err().is_signature_failure());
    }

    #[test]
    fn dump_and_reload() {
        let carol = key(include_bytes!("../tests/data/carol.hex"));
        let mut metablock = Metablock::load(DEMO_LAYOUT).expect("load");
        metablock.sign(&carol).expect("sign");

        let file = tempfile::NamedTempFile::new().expect("tempfile");
        metablock.dump(file.path()).expect("dump");

        let reloaded = Metablock::load_file(file.path()).expect("reload");
        assert_eq!(reloaded, metablock);
        reloaded.verify_signature(&carol.public_only()).expect("verify");

        let text = std::fs::read_to_string(file.path()).unwrap();
        assert!(text.contains("\"_type\": \"layout\""));
        assert!(!text.contains("private"));
    }

    #[test]
    fn load_file_reports_io_errors() {
        let dir = tempfile::tempdir().unwrap();
        let err = Metablock::load_file(&dir.path().join("missing.link")).unwrap_err();
        assert!(matches!(err, MetadataError::Io(_)), "got: {err}");
    }
}
