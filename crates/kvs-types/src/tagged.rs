//! Tagged JSON encoding: `{"t": "<type>", "v": <payload>}`.
//!
//! Plain JSON loses the distinction between `i32`, `u64` and `f64`, so every
//! value carries its type tag. Array elements and object members are tagged
//! recursively. This is the on-disk format of the reference backend and the
//! rendering used by datatype trace records.

use std::fmt;

use serde_json::{Map, Value};

use crate::value::{KvsMap, KvsValue};

/// Error returned when a JSON document is not a valid tagged value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedDecodeError {
    pub detail: String,
}

impl TaggedDecodeError {
    fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }
}

impl fmt::Display for TaggedDecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid tagged value: {}", self.detail)
    }
}

impl std::error::Error for TaggedDecodeError {}

/// Encode `value` as tagged JSON.
pub fn to_tagged_json(value: &KvsValue) -> Value {
    let payload = match value {
        KvsValue::Array(items) => Value::Array(items.iter().map(to_tagged_json).collect()),
        KvsValue::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), to_tagged_json(v)))
                .collect(),
        ),
        scalar => scalar.to_raw_json(),
    };
    let mut obj = Map::new();
    obj.insert("t".to_owned(), Value::String(value.type_tag().to_owned()));
    obj.insert("v".to_owned(), payload);
    Value::Object(obj)
}

/// Decode a tagged JSON value.
pub fn from_tagged_json(json: &Value) -> Result<KvsValue, TaggedDecodeError> {
    let obj = json
        .as_object()
        .ok_or_else(|| TaggedDecodeError::new("expected object with \"t\" and \"v\""))?;
    let tag = obj
        .get("t")
        .and_then(Value::as_str)
        .ok_or_else(|| TaggedDecodeError::new("missing string field \"t\""))?;
    let payload = obj
        .get("v")
        .ok_or_else(|| TaggedDecodeError::new("missing field \"v\""))?;

    let mismatch = || TaggedDecodeError::new(format!("payload {payload} does not fit tag {tag:?}"));

    let value = match tag {
        "null" => {
            if !payload.is_null() {
                return Err(mismatch());
            }
            KvsValue::Null
        }
        "bool" => KvsValue::Boolean(payload.as_bool().ok_or_else(mismatch)?),
        "i32" => KvsValue::I32(
            payload
                .as_i64()
                .and_then(|v| i32::try_from(v).ok())
                .ok_or_else(mismatch)?,
        ),
        "u32" => KvsValue::U32(
            payload
                .as_u64()
                .and_then(|v| u32::try_from(v).ok())
                .ok_or_else(mismatch)?,
        ),
        "i64" => KvsValue::I64(payload.as_i64().ok_or_else(mismatch)?),
        "u64" => KvsValue::U64(payload.as_u64().ok_or_else(mismatch)?),
        "f64" => KvsValue::F64(payload.as_f64().ok_or_else(mismatch)?),
        "str" => KvsValue::String(payload.as_str().ok_or_else(mismatch)?.to_owned()),
        "arr" => KvsValue::Array(
            payload
                .as_array()
                .ok_or_else(mismatch)?
                .iter()
                .map(from_tagged_json)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        "obj" => KvsValue::Object(decode_tagged_map(payload.as_object().ok_or_else(mismatch)?)?),
        other => return Err(TaggedDecodeError::new(format!("unknown tag {other:?}"))),
    };
    Ok(value)
}

/// Decode an object whose members are tagged values.
pub fn decode_tagged_map(obj: &Map<String, Value>) -> Result<KvsMap, TaggedDecodeError> {
    obj.iter()
        .map(|(k, v)| from_tagged_json(v).map(|decoded| (k.clone(), decoded)))
        .collect()
}

/// Encode a map so each member is a tagged value.
pub fn encode_tagged_map(map: &KvsMap) -> Value {
    Value::Object(
        map.iter()
            .map(|(k, v)| (k.clone(), to_tagged_json(v)))
            .collect(),
    )
}
