//! Payload decoding: `{"kvs_parameters": {...}}` and its variants.

use std::path::PathBuf;

use kvs_engine::{InstanceId, OpenOptions, SnapshotId};
use kvs_error::{KvsError, Result};
use serde::Deserialize;
use serde_json::{Map, Value};

const PARAMETERS: &str = "kvs_parameters";

/// Decoded per-run parameters for one KVS handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvsParameters {
    pub instance_id: InstanceId,
    /// Tri-state default handling. `need_defaults` wins over `defaults`.
    pub need_defaults: Option<bool>,
    pub need_kvs: Option<bool>,
    pub dir: Option<PathBuf>,
    pub snapshot_max_count: Option<usize>,
}

/// Raw field view of one parameter object. Field types are checked by hand
/// so that errors name the offending field.
#[derive(Debug, Deserialize)]
struct RawParameters {
    instance_id: Option<Value>,
    need_defaults: Option<Value>,
    defaults: Option<Value>,
    need_kvs: Option<Value>,
    dir: Option<Value>,
    snapshot_max_count: Option<Value>,
}

impl KvsParameters {
    /// Decode the `kvs_parameters` member of a payload.
    pub fn from_json(input: &str) -> Result<Self> {
        let root = parse_payload(input)?;
        Self::from_member(&root, PARAMETERS)
    }

    /// Decode the parameter object stored under `member` in `root`.
    pub fn from_member(root: &Map<String, Value>, member: &str) -> Result<Self> {
        let inner = root
            .get(member)
            .ok_or_else(|| KvsError::param(member, "missing"))?;
        if !inner.is_object() {
            return Err(KvsError::param(member, "expected an object"));
        }
        let raw: RawParameters = serde_json::from_value(inner.clone())
            .map_err(|err| KvsError::param(member, err.to_string()))?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawParameters) -> Result<Self> {
        let instance_id = raw
            .instance_id
            .as_ref()
            .ok_or_else(|| KvsError::param("instance_id", "missing"))
            .and_then(|value| uint_field("instance_id", value))?;

        let need_defaults = match (&raw.need_defaults, &raw.defaults) {
            (Some(flag), _) => Some(bool_field("need_defaults", flag)?),
            (None, Some(mode)) => match str_field("defaults", mode)? {
                "required" => Some(true),
                "optional" | "without" => Some(false),
                other => {
                    return Err(KvsError::param(
                        "defaults",
                        format!("unknown mode \"{other}\", expected required|optional|without"),
                    ));
                }
            },
            (None, None) => None,
        };

        let need_kvs = raw
            .need_kvs
            .as_ref()
            .map(|value| bool_field("need_kvs", value))
            .transpose()?;
        let dir = raw
            .dir
            .as_ref()
            .map(|value| str_field("dir", value).map(PathBuf::from))
            .transpose()?;
        let snapshot_max_count = raw
            .snapshot_max_count
            .as_ref()
            .map(|value| usize_field("snapshot_max_count", value))
            .transpose()?;

        Ok(Self {
            instance_id: InstanceId(instance_id),
            need_defaults,
            need_kvs,
            dir,
            snapshot_max_count,
        })
    }

    /// Engine-level options for opening a handle.
    #[must_use]
    pub fn open_options(&self) -> OpenOptions {
        OpenOptions {
            instance_id: self.instance_id,
            need_defaults: self.need_defaults,
            need_kvs: self.need_kvs,
            dir: self.dir.clone(),
            snapshot_max_count: self.snapshot_max_count,
        }
    }
}

/// Parameters of the two handles driven by multi-instance runs.
pub fn instance_pair(input: &str) -> Result<(KvsParameters, KvsParameters)> {
    let root = parse_payload(input)?;
    Ok((
        KvsParameters::from_member(&root, "kvs_parameters_1")?,
        KvsParameters::from_member(&root, "kvs_parameters_2")?,
    ))
}

/// Snapshot-run settings. Each field is read from the top level first, then
/// from inside `kvs_parameters`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotPlan {
    pub params: KvsParameters,
    /// Number of write+flush cycles.
    pub count: u8,
    pub snapshot_id: Option<SnapshotId>,
}

impl SnapshotPlan {
    pub fn from_json(input: &str) -> Result<Self> {
        let root = parse_payload(input)?;
        let params = KvsParameters::from_member(&root, PARAMETERS)?;

        let count = lookup(&root, "count")
            .ok_or_else(|| KvsError::param("count", "missing"))
            .and_then(|value| uint_field("count", value))?;
        let count = u8::try_from(count)
            .map_err(|_| KvsError::param("count", format!("{count} exceeds 255")))?;

        let snapshot_id = lookup(&root, "snapshot_id")
            .map(|value| usize_field("snapshot_id", value).map(SnapshotId))
            .transpose()?;

        Ok(Self {
            params,
            count,
            snapshot_id,
        })
    }

    /// `snapshot_id`, required by restore and path lookups.
    pub fn require_snapshot_id(&self) -> Result<SnapshotId> {
        self.snapshot_id
            .ok_or_else(|| KvsError::param("snapshot_id", "missing"))
    }
}

/// Parse `input` as a JSON object.
pub fn parse_payload(input: &str) -> Result<Map<String, Value>> {
    match serde_json::from_str::<Value>(input).map_err(KvsError::parse)? {
        Value::Object(map) => Ok(map),
        other => Err(KvsError::parse(format!(
            "expected a JSON object, got {}",
            json_kind(&other)
        ))),
    }
}

fn lookup<'a>(root: &'a Map<String, Value>, field: &str) -> Option<&'a Value> {
    root.get(field).or_else(|| {
        root.get(PARAMETERS)
            .and_then(Value::as_object)
            .and_then(|inner| inner.get(field))
    })
}

fn uint_field(field: &str, value: &Value) -> Result<u64> {
    value.as_u64().ok_or_else(|| {
        KvsError::param(
            field,
            format!("expected a non-negative integer, got {}", json_kind(value)),
        )
    })
}

fn usize_field(field: &str, value: &Value) -> Result<usize> {
    let raw = uint_field(field, value)?;
    usize::try_from(raw).map_err(|_| KvsError::param(field, format!("{raw} is out of range")))
}

fn bool_field(field: &str, value: &Value) -> Result<bool> {
    value.as_bool().ok_or_else(|| {
        KvsError::param(field, format!("expected a boolean, got {}", json_kind(value)))
    })
}

fn str_field<'a>(field: &str, value: &'a Value) -> Result<&'a str> {
    value.as_str().ok_or_else(|| {
        KvsError::param(field, format!("expected a string, got {}", json_kind(value)))
    })
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(n) if n.is_i64() && n.as_i64().is_some_and(i64::is_negative) => {
            "negative integer"
        }
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
