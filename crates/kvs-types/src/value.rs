use std::collections::BTreeMap;
use std::fmt;

/// Mapping from key to value, ordered for deterministic serialization.
pub type KvsMap = BTreeMap<String, KvsValue>;

/// A dynamically-typed KVS value.
///
/// Numeric variants keep their width and signedness; a value read back from
/// the store must come back as the same variant it was written as.
#[derive(Clone, Debug, PartialEq)]
pub enum KvsValue {
    Null,
    Boolean(bool),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F64(f64),
    String(String),
    Array(Vec<KvsValue>),
    Object(KvsMap),
}

impl KvsValue {
    /// Short type tag used by the tagged JSON encoding.
    pub const fn type_tag(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Boolean(_) => "bool",
            Self::I32(_) => "i32",
            Self::U32(_) => "u32",
            Self::I64(_) => "i64",
            Self::U64(_) => "u64",
            Self::F64(_) => "f64",
            Self::String(_) => "str",
            Self::Array(_) => "arr",
            Self::Object(_) => "obj",
        }
    }

    /// Numeric view of any integer or float variant.
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::I32(v) => Some(f64::from(*v)),
            Self::U32(v) => Some(f64::from(*v)),
            Self::I64(v) => Some(*v as f64),
            Self::U64(v) => Some(*v as f64),
            Self::F64(v) => Some(*v),
            _ => None,
        }
    }

    /// Signed integer view; fails for floats and out-of-range unsigned values.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::I32(v) => Some(i64::from(*v)),
            Self::U32(v) => Some(i64::from(*v)),
            Self::I64(v) => Some(*v),
            Self::U64(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Untagged JSON rendering (the plain value a reader would expect).
    pub fn to_raw_json(&self) -> serde_json::Value {
        use serde_json::Value;
        match self {
            Self::Null => Value::Null,
            Self::Boolean(b) => Value::Bool(*b),
            Self::I32(v) => Value::from(*v),
            Self::U32(v) => Value::from(*v),
            Self::I64(v) => Value::from(*v),
            Self::U64(v) => Value::from(*v),
            Self::F64(v) => serde_json::Number::from_f64(*v).map_or(Value::Null, Value::Number),
            Self::String(s) => Value::String(s.clone()),
            Self::Array(items) => Value::Array(items.iter().map(Self::to_raw_json).collect()),
            Self::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_raw_json()))
                    .collect(),
            ),
        }
    }
}

impl fmt::Display for KvsValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::I32(v) => write!(f, "{v}"),
            Self::U32(v) => write!(f, "{v}"),
            Self::I64(v) => write!(f, "{v}"),
            Self::U64(v) => write!(f, "{v}"),
            Self::F64(v) => write!(f, "{v:?}"),
            Self::String(s) => write!(f, "{s:?}"),
            Self::Array(_) | Self::Object(_) => write!(f, "{}", self.to_raw_json()),
        }
    }
}

impl From<()> for KvsValue {
    fn from((): ()) -> Self {
        Self::Null
    }
}

impl From<bool> for KvsValue {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<i32> for KvsValue {
    fn from(v: i32) -> Self {
        Self::I32(v)
    }
}

impl From<u32> for KvsValue {
    fn from(v: u32) -> Self {
        Self::U32(v)
    }
}

impl From<i64> for KvsValue {
    fn from(v: i64) -> Self {
        Self::I64(v)
    }
}

impl From<u64> for KvsValue {
    fn from(v: u64) -> Self {
        Self::U64(v)
    }
}

impl From<f64> for KvsValue {
    fn from(v: f64) -> Self {
        Self::F64(v)
    }
}

impl From<String> for KvsValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<&str> for KvsValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<Vec<KvsValue>> for KvsValue {
    fn from(items: Vec<KvsValue>) -> Self {
        Self::Array(items)
    }
}

impl From<KvsMap> for KvsValue {
    fn from(map: KvsMap) -> Self {
        Self::Object(map)
    }
}
