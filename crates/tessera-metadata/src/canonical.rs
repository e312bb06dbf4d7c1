//! Canonical JSON encoding.
//!
//! Every signature and every key id in the ecosystem is computed over the
//! output of this encoder, so its byte layout is a wire contract:
//!
//! - no insignificant whitespace;
//! - object keys sorted by byte-wise string order;
//! - integers as plain decimal digits, no floats;
//! - strings wrapped in `"`, with `"` and `\` escaped by a leading `\` and
//!   every other character (control characters included) emitted raw.
//!
//! The last rule matches securesystemslib's canonical JSON: a newline
//! inside a string is a single `0x0a` byte, not the two bytes `\n`.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{self, MapAccess, SeqAccess, Visitor};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A JSON-like value restricted to what canonical encoding supports.
///
/// There is no floating-point variant: the scheme never signs non-integer
/// numbers, and leaving them unrepresentable keeps [`encode`] total.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CanonicalValue {
    /// `null`
    #[default]
    Null,
    /// `true` / `false`
    Bool(bool),
    /// A signed integer.
    Int(i64),
    /// A UTF-8 string.
    String(String),
    /// An ordered sequence.
    Array(Vec<CanonicalValue>),
    /// A string-keyed mapping. `BTreeMap` iteration order is the byte-wise
    /// key order the encoding requires.
    Object(BTreeMap<String, CanonicalValue>),
}

/// Types with a canonical representation.
///
/// Implemented by every signed model type; the produced value is what
/// gets hashed and signed.
pub trait ToCanonical {
    /// Build the canonical value for `self`.
    fn to_canonical(&self) -> CanonicalValue;
}

/// Error converting untyped JSON into a [`CanonicalValue`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CanonicalError {
    /// The input contained a float or an integer outside the `i64` range.
    #[error("number `{0}` is not a 64-bit integer and cannot be canonicalized")]
    UnsupportedNumber(String),
}

/// Encode `value` into its canonical byte form.
#[must_use]
pub fn encode(value: &CanonicalValue) -> Vec<u8> {
    let mut out = Vec::new();
    encode_into(value, &mut out);
    out
}

/// Append the canonical encoding of `value` to `out`.
pub fn encode_into(value: &CanonicalValue, out: &mut Vec<u8>) {
    match value {
        CanonicalValue::Null => out.extend_from_slice(b"null"),
        CanonicalValue::Bool(true) => out.extend_from_slice(b"true"),
        CanonicalValue::Bool(false) => out.extend_from_slice(b"false"),
        CanonicalValue::Int(n) => out.extend_from_slice(n.to_string().as_bytes()),
        CanonicalValue::String(s) => encode_string(s, out),
        CanonicalValue::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                encode_into(item, out);
            }
            out.push(b']');
        }
        CanonicalValue::Object(map) => {
            out.push(b'{');
            for (i, (key, item)) in map.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                encode_string(key, out);
                out.push(b':');
                encode_into(item, out);
            }
            out.push(b'}');
        }
    }
}

fn encode_string(s: &str, out: &mut Vec<u8>) {
    out.push(b'"');
    for byte in s.bytes() {
        if byte == b'"' || byte == b'\\' {
            out.push(b'\\');
        }
        out.push(byte);
    }
    out.push(b'"');
}

impl CanonicalValue {
    /// Build an object from `(key, value)` pairs. Later duplicates win.
    pub fn object<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, CanonicalValue)>,
    {
        Self::Object(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Build an array of strings.
    pub fn strings<S: AsRef<str>>(items: &[S]) -> Self {
        Self::Array(items.iter().map(|s| Self::from(s.as_ref())).collect())
    }

    /// Build an object from a string-keyed map of values that have a
    /// canonical form.
    pub fn map_of<V: ToCanonical>(map: &BTreeMap<String, V>) -> Self {
        Self::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), v.to_canonical()))
                .collect(),
        )
    }

    /// Returns the string payload, if this is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the object payload, if this is an object.
    #[must_use]
    pub const fn as_object(&self) -> Option<&BTreeMap<String, Self>> {
        match self {
            Self::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Look up `key` if this is an object.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Self> {
        self.as_object().and_then(|map| map.get(key))
    }
}

impl ToCanonical for CanonicalValue {
    fn to_canonical(&self) -> CanonicalValue {
        self.clone()
    }
}

impl ToCanonical for String {
    fn to_canonical(&self) -> CanonicalValue {
        CanonicalValue::String(self.clone())
    }
}

impl<T: ToCanonical> ToCanonical for Vec<T> {
    fn to_canonical(&self) -> CanonicalValue {
        CanonicalValue::Array(self.iter().map(ToCanonical::to_canonical).collect())
    }
}

impl From<&str> for CanonicalValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<String> for CanonicalValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<bool> for CanonicalValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for CanonicalValue {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl TryFrom<serde_json::Value> for CanonicalValue {
    type Error = CanonicalError;

    fn try_from(value: serde_json::Value) -> Result<Self, Self::Error> {
        use serde_json::Value;

        Ok(match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => return Err(CanonicalError::UnsupportedNumber(n.to_string())),
            },
            Value::String(s) => Self::String(s),
            Value::Array(items) => Self::Array(
                items
                    .into_iter()
                    .map(Self::try_from)
                    .collect::<Result<_, _>>()?,
            ),
            Value::Object(map) => Self::Object(
                map.into_iter()
                    .map(|(k, v)| Ok((k, Self::try_from(v)?)))
                    .collect::<Result<_, CanonicalError>>()?,
            ),
        })
    }
}

impl Serialize for CanonicalValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Int(n) => serializer.serialize_i64(*n),
            Self::String(s) => serializer.serialize_str(s),
            Self::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::Object(map) => {
                let mut m = serializer.serialize_map(Some(map.len()))?;
                for (k, v) in map {
                    m.serialize_entry(k, v)?;
                }
                m.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for CanonicalValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(CanonicalVisitor)
    }
}

struct CanonicalVisitor;

impl<'de> Visitor<'de> for CanonicalVisitor {
    type Value = CanonicalValue;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a JSON value without floating-point numbers")
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(CanonicalValue::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(CanonicalValue::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        CanonicalValue::deserialize(deserializer)
    }

    fn visit_bool<E: de::Error>(self, b: bool) -> Result<Self::Value, E> {
        Ok(CanonicalValue::Bool(b))
    }

    fn visit_i64<E: de::Error>(self, n: i64) -> Result<Self::Value, E> {
        Ok(CanonicalValue::Int(n))
    }

    fn visit_u64<E: de::Error>(self, n: u64) -> Result<Self::Value, E> {
        i64::try_from(n)
            .map(CanonicalValue::Int)
            .map_err(|_| E::custom(format!("integer {n} exceeds the canonical range")))
    }

    fn visit_f64<E: de::Error>(self, n: f64) -> Result<Self::Value, E> {
        Err(E::custom(CanonicalError::UnsupportedNumber(n.to_string())))
    }

    fn visit_str<E: de::Error>(self, s: &str) -> Result<Self::Value, E> {
        Ok(CanonicalValue::String(s.to_owned()))
    }

    fn visit_string<E: de::Error>(self, s: String) -> Result<Self::Value, E> {
        Ok(CanonicalValue::String(s))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(CanonicalValue::Array(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut map = BTreeMap::new();
        while let Some((key, value)) = access.next_entry::<String, CanonicalValue>()? {
            map.insert(key, value);
        }
        Ok(CanonicalValue::Object(map))
    }
}
