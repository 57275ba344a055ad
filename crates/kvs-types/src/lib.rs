pub mod limits;
pub mod tagged;
pub mod value;

pub use limits::{
    KeyViolation, MAX_KEY_LENGTH, MAX_VALUE_LENGTH, ValueViolation, is_valid_key, key_violation,
    serialized_len, value_violation,
};
pub use tagged::{
    TaggedDecodeError, decode_tagged_map, encode_tagged_map, from_tagged_json, to_tagged_json,
};
pub use value::{KvsMap, KvsValue};
