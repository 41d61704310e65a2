//! Common test utilities.
//!
//! This module contains shared helpers for integration tests.
//! Import with `mod common;` in test files.

#![allow(dead_code)]

use kvs::core::config::Config;
use kvs::core::runtime::Runtime;
use kvs::kv::processor::{OperationProcessor, Response, WriteOutcome};
use kvs::kv::request::{Method, RawRequest};
use kvs::kv::store::{Entry, Store};
use std::io::Write;
use tempfile::NamedTempFile;

/// Keys used throughout the namespace tests.
pub const SAMPLE_KEYS: [&str; 5] = ["baz", "bar", "foo/sub1", "foo/sub2", "zip"];

/// Create a minimal valid configuration file.
pub fn create_minimal_config() -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(b"[node]\nnode_id = \"test\"\n")
        .expect("Failed to write config");
    file
}

/// Create a configuration file with custom settings.
pub fn create_config_with_settings(
    node_id: &str,
    leader_wait_timeout_ms: u64,
    log_level: &str,
) -> NamedTempFile {
    let config_content = format!(
        r#"
[node]
node_id = "{}"

[replication]
leader_wait_timeout_ms = {}

[telemetry]
log_level = "{}"
"#,
        node_id, leader_wait_timeout_ms, log_level
    );

    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(config_content.as_bytes())
        .expect("Failed to write config");
    file
}

/// Default configuration with a short leader wait.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.node.node_id = "test".to_string();
    config.replication.leader_wait_timeout_ms = 50;
    config
}

/// Store populated with [`SAMPLE_KEYS`], values equal to the key.
pub fn sample_store() -> Store {
    let mut store = Store::new();
    for key in SAMPLE_KEYS {
        store.put(key, key.as_bytes().to_vec(), 0);
    }
    store
}

/// Start a runtime and return it together with a processor.
pub async fn started_runtime(config: Config) -> (Runtime, OperationProcessor) {
    let mut runtime = Runtime::new(config).expect("valid config");
    runtime.start().await.expect("runtime start");
    let processor = runtime.processor().expect("processor");
    (runtime, processor)
}

/// PUT through the request surface.
pub async fn put(processor: &OperationProcessor, target: &str, value: &[u8]) -> WriteOutcome {
    let request = RawRequest::parse(Method::Put, target).with_body(value.to_vec());
    match processor.handle(request).await.expect("put") {
        Response::Write(outcome) => outcome,
        other => panic!("expected write response, got {:?}", other),
    }
}

/// DELETE through the request surface.
pub async fn delete(processor: &OperationProcessor, target: &str) -> WriteOutcome {
    match processor
        .handle(RawRequest::parse(Method::Delete, target))
        .await
        .expect("delete")
    {
        Response::Write(outcome) => outcome,
        other => panic!("expected write response, got {:?}", other),
    }
}

/// GET returning entries (point or recursive).
pub async fn get_entries(processor: &OperationProcessor, target: &str) -> Option<Vec<Entry>> {
    match processor
        .handle(RawRequest::parse(Method::Get, target))
        .await
        .expect("get")
    {
        Response::Entries(read) => read.data,
        other => panic!("expected entries response, got {:?}", other),
    }
}

/// GET ?keys returning folded keys.
pub async fn get_keys(processor: &OperationProcessor, target: &str) -> Vec<String> {
    match processor
        .handle(RawRequest::parse(Method::Get, target))
        .await
        .expect("keys")
    {
        Response::Keys(read) => read.data,
        other => panic!("expected keys response, got {:?}", other),
    }
}

/// Keys of a listing.
pub fn keys_of(entries: &[Entry]) -> Vec<&str> {
    entries.iter().map(|e| e.key.as_str()).collect()
}
