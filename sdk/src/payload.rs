//! Encoded payloads
//!
//! Workflow inputs and outputs are JSON values. A value that is not JSON,
//! such as raw bytes, travels as a payload object that names its encoding:
//! `{"metadata": {"encoding": "binary/plain"}, "data": "<base64>"}`.

use crate::error::{CairnError, Result};
use schemars::{JsonSchema, Schema, SchemaGenerator};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::borrow::Cow;
use std::collections::BTreeMap;

pub const ENCODING_KEY: &str = "encoding";
pub const ENCODING_JSON: &str = "json/plain";
pub const ENCODING_BINARY: &str = "binary/plain";

/// Bytes plus the metadata needed to decode them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Payload {
    pub metadata: BTreeMap<String, String>,
    /// Base64 on the wire
    #[serde(with = "base64_data")]
    #[schemars(with = "String")]
    pub data: Vec<u8>,
}

mod base64_data {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(D::Error::custom)
    }
}

impl Payload {
    fn encoded(encoding: &str, data: Vec<u8>) -> Self {
        let mut metadata = BTreeMap::new();
        metadata.insert(ENCODING_KEY.to_string(), encoding.to_string());
        Self { metadata, data }
    }

    pub fn binary(data: impl Into<Vec<u8>>) -> Self {
        Self::encoded(ENCODING_BINARY, data.into())
    }

    pub fn json(value: &Value) -> Result<Self> {
        Ok(Self::encoded(ENCODING_JSON, serde_json::to_vec(value)?))
    }

    pub fn encoding(&self) -> Option<&str> {
        self.metadata.get(ENCODING_KEY).map(String::as_str)
    }

    pub fn is_binary(&self) -> bool {
        self.encoding() == Some(ENCODING_BINARY)
    }

    /// The payload a workflow value carries: an encoded payload object as
    /// is, any other value as JSON.
    pub fn from_value(value: &Value) -> Result<Self> {
        match Self::parse(value) {
            Some(payload) => Ok(payload),
            None => Self::json(value),
        }
    }

    fn parse(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        let names_encoding = object
            .get("metadata")
            .and_then(|m| m.get(ENCODING_KEY))
            .is_some_and(Value::is_string);
        if object.len() != 2 || !names_encoding {
            return None;
        }
        serde_json::from_value(value.clone()).ok()
    }

    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Decode a JSON payload; other encodings are an error
    pub fn decode_json(&self) -> Result<Value> {
        match self.encoding() {
            None | Some(ENCODING_JSON) => Ok(serde_json::from_slice(&self.data)?),
            Some(other) => Err(CairnError::InvalidInput(format!(
                "Payload encoding '{}' is not JSON",
                other
            ))),
        }
    }
}

/// Raw bytes, carried as a `binary/plain` payload.
///
/// Use it as a workflow or task input or output to move bytes that are not
/// JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Binary(pub Vec<u8>);

impl Binary {
    pub fn into_inner(self) -> Vec<u8> {
        self.0
    }
}

impl From<Vec<u8>> for Binary {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Binary {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Serialize for Binary {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        Payload::binary(self.0.clone()).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Binary {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let payload = Payload::deserialize(deserializer)?;
        if !payload.is_binary() {
            return Err(serde::de::Error::custom(format!(
                "expected a {} payload, got {:?}",
                ENCODING_BINARY,
                payload.encoding()
            )));
        }
        Ok(Self(payload.data))
    }
}

impl JsonSchema for Binary {
    fn schema_name() -> Cow<'static, str> {
        "Binary".into()
    }

    fn json_schema(generator: &mut SchemaGenerator) -> Schema {
        Payload::json_schema(generator)
    }
}
