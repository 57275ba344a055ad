mod common;

use std::fs;
use std::path::Path;

use kvs_engine::{FileKvs, InstanceId, KvsHandle, OpenOptions};
use kvs_error::ErrorKind;
use kvs_harness::trace::{DEFAULT_VALUES, MULTIPLE_KVS, SUPPORTED_DATATYPES};
use kvs_types::KvsValue;
use serde_json::json;

use common::{params, run_scenario, values_of};

fn write_defaults(dir: &Path, instance_id: u64, body: &str) {
    fs::write(dir.join(format!("kvs_{instance_id}_default.json")), body).unwrap();
}

// --- dispatcher -------------------------------------------------------------

#[test]
fn unknown_and_group_paths_fail_before_running() {
    let payload = json!({});
    let (result, records) = run_scenario("cit.no_such_group.keys", &payload);
    assert_eq!(result.unwrap_err().kind(), ErrorKind::PathNotFound);
    assert!(records.is_empty());

    let (result, _) = run_scenario("cit/snapshots", &payload);
    assert_eq!(result.unwrap_err().kind(), ErrorKind::AmbiguousTarget);
}

#[test]
fn bad_payloads_map_to_input_errors() {
    let (result, _) = run_scenario("cit.snapshots.max_count", &json!("not an object"));
    assert_eq!(result.unwrap_err().kind(), ErrorKind::ParseError);

    let (result, _) = run_scenario(
        "cit.snapshots.max_count",
        &json!({"kvs_parameters": {"dir": "/tmp"}}),
    );
    assert_eq!(result.unwrap_err().kind(), ErrorKind::ParamError);
}

// --- supported_datatypes ----------------------------------------------------

#[test]
fn keys_scenario_lists_only_accepted_keys() {
    let dir = tempfile::tempdir().unwrap();
    let payload = json!({"kvs_parameters": params(dir.path(), 1)});
    let (result, records) = run_scenario("cit.supported_datatypes.keys", &payload);
    result.unwrap();

    assert!(records.iter().all(|r| r.target == SUPPORTED_DATATYPES));
    let keys = values_of(&records, "key");
    for expected in [
        "alphaNumeric123",
        "with_underscore",
        "with-dash",
        "A1_b2-C3",
        "utf8_emoji_valid",
        "utf8-with-dash",
        "unique_key",
    ] {
        assert!(keys.contains(&expected), "missing {expected}");
    }
    assert!(keys.iter().all(|key| kvs_types::is_valid_key(key)));
    assert_eq!(
        values_of(&records, "duplicate_key_accepted"),
        vec!["unique_key"]
    );
    assert_eq!(values_of(&records, "max_length_key"), vec!["a".repeat(32)]);
}

#[test]
fn value_scenarios_trace_tagged_form() {
    let cases = [
        ("i32", r#"{"t":"i32","v":-321}"#),
        ("u32", r#"{"t":"u32","v":1234}"#),
        ("i64", r#"{"t":"i64","v":-123456789}"#),
        ("u64", r#"{"t":"u64","v":123456789}"#),
        ("f64", r#"{"t":"f64","v":-5432.1}"#),
        ("bool", r#"{"t":"bool","v":true}"#),
        ("str", r#"{"t":"str","v":"example"}"#),
        (
            "obj",
            r#"{"t":"obj","v":{"sub-number":{"t":"f64","v":789.0}}}"#,
        ),
        (
            "arr",
            r#"{"t":"arr","v":[{"t":"f64","v":321.5},{"t":"bool","v":false},{"t":"str","v":"hello"},{"t":"null","v":null},{"t":"arr","v":[]},{"t":"obj","v":{"sub-number":{"t":"f64","v":789.0}}}]}"#,
        ),
    ];
    let dir = tempfile::tempdir().unwrap();
    let payload = json!({"kvs_parameters": params(dir.path(), 1)});
    for (name, expected) in cases {
        let (result, records) =
            run_scenario(&format!("cit.supported_datatypes.values.{name}"), &payload);
        result.unwrap_or_else(|err| panic!("{name}: {err}"));
        assert_eq!(records.len(), 1, "{name}");
        assert_eq!(records[0].field("key"), Some(name));
        assert_eq!(records[0].field("value"), Some(expected), "{name}");
    }
}

#[test]
fn value_size_boundary() {
    let dir = tempfile::tempdir().unwrap();
    let payload = json!({"kvs_parameters": params(dir.path(), 1)});

    let (result, records) = run_scenario("cit.supported_datatypes.values.str_1024", &payload);
    result.unwrap();
    let expected = format!(r#"{{"t":"str_1024","v":"{}"}}"#, "x".repeat(1024));
    assert_eq!(records[0].field("value"), Some(expected.as_str()));

    let (result, records) = run_scenario("cit.supported_datatypes.values.str_1025", &payload);
    assert_eq!(result.unwrap_err().kind(), ErrorKind::ValueRejected);
    assert!(records.is_empty());
}

// --- multiple_kvs -----------------------------------------------------------

#[test]
fn same_identity_sees_flushed_value() {
    let dir = tempfile::tempdir().unwrap();
    let payload = json!({"kvs_parameters": params(dir.path(), 1)});
    let (result, records) = run_scenario("cit.multiple_kvs.same_instance_id_same_value", &payload);
    result.unwrap();

    assert!(records.iter().all(|r| r.target == MULTIPLE_KVS));
    assert_eq!(values_of(&records, "instance"), vec!["kvs1", "kvs2"]);
    assert_eq!(values_of(&records, "key"), vec!["number", "number"]);
    assert_eq!(values_of(&records, "value"), vec!["111.1", "111.1"]);
    assert_eq!(values_of(&records, "value_is_default"), vec!["false", "false"]);
}

#[test]
fn distinct_identities_stay_isolated() {
    let dir = tempfile::tempdir().unwrap();
    let payload = json!({
        "kvs_parameters_1": params(dir.path(), 1),
        "kvs_parameters_2": params(dir.path(), 2),
    });
    let (result, records) = run_scenario("cit.multiple_kvs.multiple_instance_ids", &payload);
    result.unwrap();
    assert_eq!(values_of(&records, "value"), vec!["111.1", "222.2"]);

    for (id, expected) in [(1, 111.1), (2, 222.2)] {
        let kvs = FileKvs::open(&OpenOptions::new(InstanceId(id)).dir(dir.path())).unwrap();
        assert_eq!(kvs.get("number").unwrap(), KvsValue::F64(expected));
        assert!(!kvs.has_default("number").unwrap());
    }
}

#[test]
fn same_identity_in_different_dirs_stays_isolated() {
    let dir_1 = tempfile::tempdir().unwrap();
    let dir_2 = tempfile::tempdir().unwrap();
    let payload = json!({
        "kvs_parameters_1": params(dir_1.path(), 1),
        "kvs_parameters_2": params(dir_2.path(), 1),
    });
    let (result, records) = run_scenario("cit.multiple_kvs.multiple_instance_ids", &payload);
    result.unwrap();
    assert_eq!(values_of(&records, "value"), vec!["111.1", "222.2"]);

    for (dir, expected) in [(&dir_1, 111.1), (&dir_2, 222.2)] {
        let kvs = FileKvs::open(&OpenOptions::new(InstanceId(1)).dir(dir.path())).unwrap();
        assert_eq!(kvs.get("number").unwrap(), KvsValue::F64(expected));
        assert_eq!(kvs.snapshot_count().unwrap(), 1);
    }
}

#[test]
fn last_flush_wins_on_shared_identity() {
    let dir = tempfile::tempdir().unwrap();
    let payload = json!({"kvs_parameters": params(dir.path(), 1)});
    let (result, records) = run_scenario("cit.multiple_kvs.same_instance_id_diff_value", &payload);
    result.unwrap();
    assert_eq!(values_of(&records, "value"), vec!["222.2", "222.2"]);
}

// --- default_values ---------------------------------------------------------

#[test]
fn default_then_explicit_value() {
    let dir = tempfile::tempdir().unwrap();
    write_defaults(dir.path(), 1, r#"{"test_number":{"t":"f64","v":111.1}}"#);
    let payload = json!({"kvs_parameters": params(dir.path(), 1)});
    let (result, records) = run_scenario("cit.default_values.default_values", &payload);
    result.unwrap();

    assert!(records.iter().all(|r| r.target == DEFAULT_VALUES));
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].field("key"), Some("test_number"));
    assert_eq!(records[0].field("value_is_default"), Some("true"));
    assert_eq!(records[0].field("default_value"), Some("Ok(111.1)"));
    assert_eq!(records[0].field("current_value"), Some("Ok(111.1)"));
    assert_eq!(records[1].field("value_is_default"), Some("false"));
    assert_eq!(records[1].field("default_value"), Some("Ok(111.1)"));
    assert_eq!(records[1].field("current_value"), Some("Ok(432.1)"));
}

#[test]
fn required_defaults_missing_fails_open() {
    let dir = tempfile::tempdir().unwrap();
    let mut inner = params(dir.path(), 1);
    inner["defaults"] = json!("required");
    let (result, records) = run_scenario(
        "cit.default_values.default_values",
        &json!({"kvs_parameters": inner}),
    );
    assert_eq!(result.unwrap_err().kind(), ErrorKind::KvsOperationError);
    assert!(records.is_empty());
}

#[test]
fn defaults_without_mode_are_ignored() {
    let dir = tempfile::tempdir().unwrap();
    write_defaults(dir.path(), 1, r#"{"test_number":{"t":"f64","v":111.1}}"#);
    let mut inner = params(dir.path(), 1);
    inner["defaults"] = json!("without");
    let (result, records) = run_scenario(
        "cit.default_values.default_values",
        &json!({"kvs_parameters": inner}),
    );
    result.unwrap();
    assert_eq!(records[0].field("value_is_default"), Some("false"));
    assert_eq!(records[0].field("default_value"), Some("Err(KeyNotFound)"));
    assert_eq!(records[0].field("current_value"), Some("Err(KeyNotFound)"));
}

#[test]
fn removed_key_without_default_is_gone() {
    let dir = tempfile::tempdir().unwrap();
    let payload = json!({"kvs_parameters": params(dir.path(), 1)});
    let (result, records) = run_scenario("cit.default_values.remove_key", &payload);
    result.unwrap();
    assert_eq!(
        values_of(&records, "current_value"),
        vec!["Ok(432.1)", "Err(KeyNotFound)"]
    );
}

#[test]
fn reset_single_key_touches_only_that_key() {
    let dir = tempfile::tempdir().unwrap();
    write_defaults(
        dir.path(),
        1,
        r#"{"test_number_1":{"t":"f64","v":1.5},"test_number_2":{"t":"f64","v":2.5}}"#,
    );
    let payload = json!({"kvs_parameters": params(dir.path(), 1)});
    let (result, records) = run_scenario("cit.default_values.reset_single_key", &payload);
    result.unwrap();

    assert_eq!(records.len(), 5);
    assert_eq!(records[1].field("value_is_default"), Some("false"));
    assert_eq!(records[1].field("current_value"), Some("Ok(864.2)"));
    assert_eq!(records[2].field("key"), Some("test_number_2"));
    assert_eq!(records[2].field("value_is_default"), Some("true"));
    assert_eq!(records[2].field("current_value"), Some("Ok(2.5)"));
}

#[test]
fn reset_single_key_without_default_fails() {
    let dir = tempfile::tempdir().unwrap();
    let payload = json!({"kvs_parameters": params(dir.path(), 1)});
    let (result, _) = run_scenario("cit.default_values.reset_single_key", &payload);
    assert_eq!(result.unwrap_err().kind(), ErrorKind::KeyNotFound);
}

#[test]
fn reset_all_keys_falls_back_everywhere() {
    let dir = tempfile::tempdir().unwrap();
    write_defaults(dir.path(), 1, r#"{"test_number_0":{"t":"f64","v":0.5}}"#);
    let payload = json!({"kvs_parameters": params(dir.path(), 1)});
    let (result, records) = run_scenario("cit.default_values.reset_all_keys", &payload);
    result.unwrap();

    assert_eq!(records.len(), 10);
    let after: Vec<_> = values_of(&records[5..], "current_value");
    assert_eq!(
        after,
        vec![
            "Ok(0.5)",
            "Err(KeyNotFound)",
            "Err(KeyNotFound)",
            "Err(KeyNotFound)",
            "Err(KeyNotFound)"
        ]
    );
}

#[test]
fn checksum_matches_after_flush() {
    let dir = tempfile::tempdir().unwrap();
    let payload = json!({"kvs_parameters": params(dir.path(), 4)});
    let (result, records) = run_scenario("cit.default_values.checksum", &payload);
    result.unwrap();

    let kvs_path = format!("Ok(\"{}\")", dir.path().join("kvs_4_0.json").display());
    let hash_path = format!("Ok(\"{}\")", dir.path().join("kvs_4_0.hash").display());
    assert_eq!(records[0].field("kvs_path"), Some(kvs_path.as_str()));
    assert_eq!(records[0].field("hash_path"), Some(hash_path.as_str()));
    assert_eq!(records[1].field("hash_valid"), Some("true"));
}
