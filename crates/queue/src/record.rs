use std::collections::BTreeMap;
use std::fmt;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};

/// MIME type used in the data URL when a file has no declared type.
pub const FALLBACK_MIME: &str = "application/octet-stream";

/// Local identity of a queued record. Assigned by the store, never sent to
/// the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordKey(pub i64);

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An embedded file, fully read and encoded.
///
/// Serializes as `{"name": ..., "type": ..., "data": "data:<mime>;base64,<payload>"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedFile {
    pub name: String,
    #[serde(rename = "type")]
    pub mime: String,
    pub data: String,
}

/// Errors from decoding an [`EncodedFile`] data URL.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DataUrlError {
    #[error("not a data URL")]
    NotDataUrl,
    #[error("data URL is not base64-encoded")]
    NotBase64,
    #[error("invalid base64 payload: {0}")]
    Payload(String),
}

impl EncodedFile {
    /// Encode raw file bytes the way a browser data-URL read does.
    pub fn encode(name: &str, mime: &str, bytes: &[u8]) -> Self {
        let url_mime = if mime.is_empty() { FALLBACK_MIME } else { mime };
        EncodedFile {
            name: name.to_string(),
            mime: mime.to_string(),
            data: format!("data:{};base64,{}", url_mime, BASE64.encode(bytes)),
        }
    }

    /// Decode the data URL back into the original bytes.
    pub fn decode(&self) -> Result<Vec<u8>, DataUrlError> {
        let rest = self
            .data
            .strip_prefix("data:")
            .ok_or(DataUrlError::NotDataUrl)?;
        let (header, payload) = rest.split_once(',').ok_or(DataUrlError::NotDataUrl)?;
        if !header.ends_with(";base64") {
            return Err(DataUrlError::NotBase64);
        }
        BASE64
            .decode(payload)
            .map_err(|e| DataUrlError::Payload(e.to_string()))
    }
}

/// A single field value of a captured form.
///
/// Untagged: a file triple is tried first, then the scalar forms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    File(EncodedFile),
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_file(&self) -> Option<&EncodedFile> {
        match self {
            FieldValue::File(f) => Some(f),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<EncodedFile> for FieldValue {
    fn from(f: EncodedFile) -> Self {
        FieldValue::File(f)
    }
}

/// One captured form submission, keyed by field name.
///
/// Serializes as a flat JSON object, which is also the wire body sent to the
/// sync endpoints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PendingRecord {
    fields: BTreeMap<String, FieldValue>,
}

impl PendingRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    /// Text value of a field, if present and textual.
    pub fn text(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(FieldValue::as_text)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Serialized payload as stored in the queue.
    pub fn to_payload(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_payload(payload: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(payload)
    }
}

impl<K: Into<String>, V: Into<FieldValue>> FromIterator<(K, V)> for PendingRecord {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = PendingRecord::new();
        for (k, v) in iter {
            record.insert(k, v);
        }
        record
    }
}
