//! Key and value acceptance rules.
//!
//! - Keys: ASCII alphanumerics, `_` and `-` only, 1 to [`MAX_KEY_LENGTH`]
//!   bytes. Anything else (whitespace, punctuation, non-ASCII letters) is
//!   rejected.
//! - Values: any [`KvsValue`] variant whose serialized length is at most
//!   [`MAX_VALUE_LENGTH`] bytes. Strings are measured by UTF-8 byte length;
//!   every other variant by its compact untagged JSON rendering. Floats must
//!   be finite since JSON cannot carry NaN or infinities.
//!
//! Re-setting an existing key is an update, never a rejection, so
//! uniqueness is not checked here.

use std::fmt;

use crate::value::KvsValue;

/// Maximum key length in bytes.
pub const MAX_KEY_LENGTH: usize = 32;

/// Maximum serialized value length in bytes.
pub const MAX_VALUE_LENGTH: usize = 1024;

/// Why a key is not acceptable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyViolation {
    Empty,
    TooLong { len: usize },
    InvalidChar { ch: char },
}

impl fmt::Display for KeyViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("key is empty"),
            Self::TooLong { len } => {
                write!(f, "key is {len} bytes (max {MAX_KEY_LENGTH})")
            }
            Self::InvalidChar { ch } => write!(f, "key contains invalid character {ch:?}"),
        }
    }
}

/// Why a value is not acceptable.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueViolation {
    TooLong { len: usize },
    NonFiniteFloat { value: f64 },
}

impl fmt::Display for ValueViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooLong { len } => {
                write!(f, "value is {len} bytes (max {MAX_VALUE_LENGTH})")
            }
            Self::NonFiniteFloat { value } => write!(f, "non-finite float {value}"),
        }
    }
}

const fn is_key_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'-'
}

/// First rule `key` breaks, if any.
pub fn key_violation(key: &str) -> Option<KeyViolation> {
    if key.is_empty() {
        return Some(KeyViolation::Empty);
    }
    if let Some(ch) = key
        .chars()
        .find(|ch| !u8::try_from(*ch).is_ok_and(is_key_byte))
    {
        return Some(KeyViolation::InvalidChar { ch });
    }
    if key.len() > MAX_KEY_LENGTH {
        return Some(KeyViolation::TooLong { len: key.len() });
    }
    None
}

/// Whether `key` is acceptable.
#[must_use]
pub fn is_valid_key(key: &str) -> bool {
    key_violation(key).is_none()
}

/// Serialized length of `value` as used by the size rule.
#[must_use]
pub fn serialized_len(value: &KvsValue) -> usize {
    match value {
        KvsValue::String(s) => s.len(),
        other => other.to_raw_json().to_string().len(),
    }
}

/// First rule `value` breaks, if any.
pub fn value_violation(value: &KvsValue) -> Option<ValueViolation> {
    if let Some(bad) = first_non_finite(value) {
        return Some(ValueViolation::NonFiniteFloat { value: bad });
    }
    let len = serialized_len(value);
    (len > MAX_VALUE_LENGTH).then_some(ValueViolation::TooLong { len })
}

fn first_non_finite(value: &KvsValue) -> Option<f64> {
    match value {
        KvsValue::F64(v) if !v.is_finite() => Some(*v),
        KvsValue::Array(items) => items.iter().find_map(first_non_finite),
        KvsValue::Object(map) => map.values().find_map(first_non_finite),
        _ => None,
    }
}
