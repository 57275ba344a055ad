//! Key acceptance and value round-trip scenarios.

use std::sync::Arc;

use kvs_engine::KvsBackend;
use kvs_error::{KvsError, Result};
use kvs_types::{KvsMap, KvsValue, MAX_KEY_LENGTH, MAX_VALUE_LENGTH, to_tagged_json};
use serde_json::{Value, json};
use tracing::info;

use crate::client::KvsSession;
use crate::oracle;
use crate::params::KvsParameters;
use crate::scenario::{Scenario, ScenarioGroup};
use crate::trace::SUPPORTED_DATATYPES;

const VALID_KEYS: [&str; 4] = ["alphaNumeric123", "with_underscore", "with-dash", "A1_b2-C3"];

const UTF8_KEYS: [&str; 5] = [
    "utf8_emoji_valid",
    "utf8_alphaNumeric123",
    "utf8_with_underscore",
    "utf8-with-dash",
    "utf8_A1_b2-C3",
];

const INVALID_KEYS: [&str; 8] = [
    "has$pecial",
    "emoji\u{2705}",
    "too_long_key_abcdefghijklmnopqrstuvwxyz123456",
    "utf8_\u{43a}\u{43b}\u{44e}\u{447}",
    "utf8_\u{6f22}\u{5b57}",
    "utf8_emoji \u{2705}\u{2757}\u{1f600}",
    "utf8_greek \u{3b7}\u{3bc}\u{3b1}",
    "has space",
];

const DUPLICATE_KEY: &str = "unique_key";

/// Accepted keys show up in `all_keys`, rejected ones never do, and
/// re-setting a key overwrites it.
pub struct Keys {
    backend: Arc<dyn KvsBackend>,
}

impl Scenario for Keys {
    fn name(&self) -> &str {
        "keys"
    }

    fn run(&self, input: &str) -> Result<()> {
        let params = KvsParameters::from_json(input)?;
        let mut kvs = KvsSession::open(self.backend.as_ref(), &params)?;

        kvs.set(DUPLICATE_KEY, KvsValue::Null)?;
        let duplicate = kvs.set(DUPLICATE_KEY, KvsValue::Boolean(true));

        let max_length_key = "a".repeat(MAX_KEY_LENGTH);
        let accepted = VALID_KEYS
            .iter()
            .copied()
            .chain(std::iter::once(max_length_key.as_str()))
            .chain(UTF8_KEYS);
        for key in accepted {
            let outcome = kvs.set(key, KvsValue::Null);
            oracle::check_set(key, &KvsValue::Null, &outcome)?;
            outcome?;
        }
        for key in INVALID_KEYS {
            let outcome = kvs.set(key, KvsValue::Null);
            oracle::check_set(key, &KvsValue::Null, &outcome)?;
        }

        let stored = kvs.all_keys()?;
        for key in stored.iter().filter(|key| !INVALID_KEYS.contains(&key.as_str())) {
            info!(target: SUPPORTED_DATATYPES, key = key.as_str());
        }
        if duplicate.is_ok() {
            info!(target: SUPPORTED_DATATYPES, duplicate_key_accepted = DUPLICATE_KEY);
        }
        info!(target: SUPPORTED_DATATYPES, max_length_key = max_length_key.as_str());

        if let Some(leaked) = INVALID_KEYS.iter().find(|key| stored.contains(**key)) {
            return Err(KvsError::mismatch(
                "all_keys after rejected writes",
                "no rejected key",
                leaked,
            ));
        }
        duplicate?;
        oracle::check_value(
            "value after overwrite",
            &KvsValue::Boolean(true),
            &kvs.get(DUPLICATE_KEY)?,
        )
    }
}

/// Write one value under its own type name, read it back and trace it in
/// tagged form.
pub struct Values {
    name: &'static str,
    value: KvsValue,
    backend: Arc<dyn KvsBackend>,
}

impl Values {
    fn new(value: KvsValue, backend: &Arc<dyn KvsBackend>) -> Self {
        Self {
            name: value_scenario_name(&value),
            value,
            backend: Arc::clone(backend),
        }
    }
}

fn value_scenario_name(value: &KvsValue) -> &'static str {
    match value {
        KvsValue::String(s) if s.len() == MAX_VALUE_LENGTH => "str_1024",
        KvsValue::String(s) if s.len() > MAX_VALUE_LENGTH => "str_1025",
        KvsValue::String(_) => "str",
        other => other.type_tag(),
    }
}

/// `{"t":"<name>","v":<payload>}` where the payload keeps nested tags.
fn render_tagged(name: &str, value: &KvsValue) -> String {
    let payload = match to_tagged_json(value) {
        Value::Object(mut tagged) => tagged.remove("v").unwrap_or(Value::Null),
        _ => Value::Null,
    };
    json!({"t": name, "v": payload}).to_string()
}

impl Scenario for Values {
    fn name(&self) -> &str {
        self.name
    }

    fn run(&self, input: &str) -> Result<()> {
        let params = KvsParameters::from_json(input)?;
        let mut kvs = KvsSession::open(self.backend.as_ref(), &params)?;

        let outcome = kvs.set(self.name, self.value.clone());
        oracle::check_set(self.name, &self.value, &outcome)?;
        outcome?;

        let stored = kvs.get(self.name)?;
        let rendered = render_tagged(self.name, &stored);
        info!(target: SUPPORTED_DATATYPES, key = self.name, value = rendered.as_str());

        oracle::check_value(&format!("round trip of {}", self.name), &self.value, &stored)
    }
}

fn nested_object() -> KvsMap {
    KvsMap::from([("sub-number".to_owned(), KvsValue::F64(789.0))])
}

fn value_group(backend: &Arc<dyn KvsBackend>) -> ScenarioGroup {
    let values = [
        KvsValue::I32(-321),
        KvsValue::U32(1234),
        KvsValue::I64(-123_456_789),
        KvsValue::U64(123_456_789),
        KvsValue::F64(-5432.1),
        KvsValue::Boolean(true),
        KvsValue::from("example"),
        KvsValue::String("x".repeat(MAX_VALUE_LENGTH)),
        KvsValue::String("y".repeat(MAX_VALUE_LENGTH + 1)),
        KvsValue::Array(vec![
            KvsValue::F64(321.5),
            KvsValue::Boolean(false),
            KvsValue::from("hello"),
            KvsValue::Null,
            KvsValue::Array(Vec::new()),
            KvsValue::Object(nested_object()),
        ]),
        KvsValue::Object(nested_object()),
    ];
    values
        .into_iter()
        .fold(ScenarioGroup::new("values"), |group, value| {
            group.scenario(Values::new(value, backend))
        })
}

pub fn group(backend: &Arc<dyn KvsBackend>) -> ScenarioGroup {
    ScenarioGroup::new("supported_datatypes")
        .scenario(Keys {
            backend: Arc::clone(backend),
        })
        .group(value_group(backend))
}
