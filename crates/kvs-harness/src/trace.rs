//! Trace record targets and the textual rendering the external verifier
//! compares against.

use std::path::PathBuf;

use kvs_error::Result;
use kvs_types::KvsValue;

pub const SUPPORTED_DATATYPES: &str = "kvs_harness::cit::supported_datatypes";
pub const MULTIPLE_KVS: &str = "kvs_harness::cit::multiple_kvs";
pub const SNAPSHOTS: &str = "kvs_harness::cit::snapshots::count";
pub const DEFAULT_VALUES: &str = "kvs_harness::cit::default_values";

/// `Ok("<path>")` or `Err(<Kind>)`. The path is written verbatim, without
/// escaping.
pub fn render_path(result: &Result<PathBuf>) -> String {
    match result {
        Ok(path) => format!("Ok(\"{}\")", path.display()),
        Err(err) => format!("Err({})", err.kind()),
    }
}

/// `Ok(())` or `Err(<Kind>)`.
pub fn render_unit(result: &Result<()>) -> String {
    match result {
        Ok(()) => "Ok(())".to_owned(),
        Err(err) => format!("Err({})", err.kind()),
    }
}

/// `Ok(<value>)` or `Err(<Kind>)`, values in their `Display` form.
pub fn render_value(result: &Result<KvsValue>) -> String {
    match result {
        Ok(value) => format!("Ok({value})"),
        Err(err) => format!("Err({})", err.kind()),
    }
}
