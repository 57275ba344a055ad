#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, Mutex};

use kvs_engine::{FileBackend, KvsBackend};
use kvs_error::Result;
use kvs_harness::scenario_tree;
use serde_json::{Value, json};
use tracing::Subscriber;
use tracing::field::{Field, Visit};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::prelude::*;

const TRACE_PREFIX: &str = "kvs_harness::cit";

/// One captured trace record, fields in emission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub target: String,
    pub fields: Vec<(String, String)>,
}

impl Record {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

struct FieldVisitor<'a>(&'a mut Vec<(String, String)>);

impl Visit for FieldVisitor<'_> {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.0.push((field.name().to_owned(), value.to_owned()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.0.push((field.name().to_owned(), format!("{value:?}")));
    }
}

struct TraceRecorder {
    records: Arc<Mutex<Vec<Record>>>,
}

impl<S: Subscriber> Layer<S> for TraceRecorder {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let target = event.metadata().target();
        if !target.starts_with(TRACE_PREFIX) {
            return;
        }
        let mut fields = Vec::new();
        event.record(&mut FieldVisitor(&mut fields));
        self.records.lock().unwrap().push(Record {
            target: target.to_owned(),
            fields,
        });
    }
}

/// Run `f` with a recorder installed and return what it captured.
pub fn capture<R>(f: impl FnOnce() -> R) -> (R, Vec<Record>) {
    let records = Arc::new(Mutex::new(Vec::new()));
    let subscriber = tracing_subscriber::registry().with(TraceRecorder {
        records: Arc::clone(&records),
    });
    let result = tracing::subscriber::with_default(subscriber, f);
    let captured = records.lock().unwrap().clone();
    (result, captured)
}

/// Run one scenario path against the file backend.
pub fn run_scenario(path: &str, payload: &Value) -> (Result<()>, Vec<Record>) {
    let backend: Arc<dyn KvsBackend> = Arc::new(FileBackend);
    run_with_backend(&backend, path, payload)
}

pub fn run_with_backend(
    backend: &Arc<dyn KvsBackend>,
    path: &str,
    payload: &Value,
) -> (Result<()>, Vec<Record>) {
    let tree = scenario_tree(backend).expect("scenario tree builds");
    let input = payload.to_string();
    capture(|| tree.run(path, &input))
}

/// `{"instance_id": id, "dir": dir}`.
pub fn params(dir: &Path, instance_id: u64) -> Value {
    json!({"instance_id": instance_id, "dir": dir.to_str().expect("utf-8 temp dir")})
}

/// All values of `field` across `records`, in order.
pub fn values_of<'a>(records: &'a [Record], field: &str) -> Vec<&'a str> {
    records.iter().filter_map(|r| r.field(field)).collect()
}
