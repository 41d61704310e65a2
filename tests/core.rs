//! Core infrastructure tests.

mod common;

use kvs::core::config::{Config, ConfigOverrides};
use kvs::core::error::{HttpErrorMapping, KvError, UnavailableReason};
use kvs::core::runtime::{ComponentHealth, Runtime};
use kvs::kv::leader::ReadConsistency;
use kvs::kv::request::{Method, RawRequest};
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

// ============================================================================
// Config tests
// ============================================================================

#[test]
fn parse_minimal_config() {
    let file = common::create_minimal_config();

    let config = Config::from_file(file.path()).unwrap();
    assert_eq!(config.node.node_id, "test");
    assert_eq!(config.replication.commit_queue_depth, 1024);
    assert_eq!(config.replication.leader_wait_timeout_ms, 5000);
    assert_eq!(config.reads.default_consistency, ReadConsistency::Consistent);
    assert_eq!(config.telemetry.log_level, "info");
}

#[test]
fn parse_empty_config_uses_defaults() {
    let config = Config::from_toml("").unwrap();
    assert_eq!(config.node.node_id, "local");
    assert_eq!(
        config.replication.leader_wait_timeout(),
        Duration::from_millis(5000)
    );
}

#[test]
fn default_config_is_valid() {
    assert!(Config::default().validate().is_ok());
}

#[test]
fn parse_config_with_settings() {
    let file = common::create_config_with_settings("node-7", 250, "debug");

    let config = Config::from_file(file.path()).unwrap();
    assert_eq!(config.node.node_id, "node-7");
    assert_eq!(config.replication.leader_wait_timeout_ms, 250);
    assert_eq!(config.telemetry.log_level, "debug");
}

#[test]
fn parse_stale_default_consistency() {
    let config = Config::from_toml("[reads]\ndefault_consistency = \"stale\"\n").unwrap();
    assert_eq!(config.reads.default_consistency, ReadConsistency::Stale);
}

#[test]
fn validate_unknown_consistency() {
    let result = Config::from_toml("[reads]\ndefault_consistency = \"eventual\"\n");
    assert!(result.is_err());
}

#[test]
fn validate_empty_node_id() {
    let result = Config::from_toml("[node]\nnode_id = \"  \"\n");
    assert!(result.unwrap_err().to_string().contains("node_id"));
}

#[test]
fn validate_zero_queue_depth() {
    let result = Config::from_toml("[replication]\ncommit_queue_depth = 0\n");
    assert!(result
        .unwrap_err()
        .to_string()
        .contains("commit_queue_depth"));
}

#[test]
fn validate_zero_leader_wait() {
    let result = Config::from_toml("[replication]\nleader_wait_timeout_ms = 0\n");
    assert!(result
        .unwrap_err()
        .to_string()
        .contains("leader_wait_timeout_ms"));
}

#[test]
fn validate_invalid_log_level() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(b"[telemetry]\nlog_level = \"verbose\"\n")
        .unwrap();

    let result = Config::from_file(file.path());
    assert!(result.unwrap_err().to_string().contains("log_level"));
}

#[test]
fn missing_config_file() {
    let result = Config::from_file(std::path::Path::new("/nonexistent/kvs.toml"));
    assert!(result
        .unwrap_err()
        .to_string()
        .contains("failed to read config file"));
}

#[test]
fn apply_overrides() {
    let mut config = Config::default();
    config.apply_overrides(&ConfigOverrides {
        log_level: Some("trace".to_string()),
        node_id: Some("override".to_string()),
        default_consistency: Some(ReadConsistency::Stale),
    });

    assert_eq!(config.telemetry.log_level, "trace");
    assert_eq!(config.node.node_id, "override");
    assert_eq!(config.reads.default_consistency, ReadConsistency::Stale);
}

#[test]
fn empty_overrides_change_nothing() {
    let mut config = Config::default();
    config.apply_overrides(&ConfigOverrides::default());
    assert_eq!(config.node.node_id, "local");
    assert_eq!(config.telemetry.log_level, "info");
}

// ============================================================================
// Error tests
// ============================================================================

#[test]
fn error_status_mapping() {
    assert_eq!(
        HttpErrorMapping::to_status_code(&KvError::validation("bad cas")),
        400
    );
    assert_eq!(
        HttpErrorMapping::to_status_code(&KvError::unavailable(UnavailableReason::NoLeader)),
        503
    );
    assert_eq!(
        HttpErrorMapping::to_status_code(&KvError::replication("commit failed")),
        500
    );
    assert_eq!(
        HttpErrorMapping::to_status_code(&KvError::internal("bug")),
        500
    );
}

#[test]
fn error_messages() {
    assert_eq!(
        HttpErrorMapping::to_error_message(&KvError::unavailable(
            UnavailableReason::LeaderWaitTimeout
        )),
        "No cluster leader"
    );
    assert_eq!(
        HttpErrorMapping::to_error_message(&KvError::unavailable(
            UnavailableReason::ShuttingDown
        )),
        "Agent is shutting down"
    );
    assert_eq!(
        HttpErrorMapping::to_error_message(&KvError::validation("invalid cas value")),
        "invalid cas value"
    );
    assert_eq!(
        KvError::unavailable(UnavailableReason::NoLeader).to_string(),
        "Unavailable: NoLeader"
    );
}

#[test]
fn only_unavailable_is_retriable() {
    assert!(KvError::unavailable(UnavailableReason::NoLeader).is_retriable());
    assert!(!KvError::validation("x").is_retriable());
    assert!(!KvError::replication("x").is_retriable());
    assert!(!KvError::internal("x").is_retriable());
}

#[test]
fn read_consistency_parsing() {
    assert_eq!(
        "stale".parse::<ReadConsistency>().unwrap(),
        ReadConsistency::Stale
    );
    assert!("eventual".parse::<ReadConsistency>().unwrap_err().is_validation());
    assert_eq!(ReadConsistency::Consistent.to_string(), "consistent");
    assert!(ReadConsistency::Consistent.requires_leader());
    assert!(!ReadConsistency::Stale.requires_leader());
}

// ============================================================================
// Runtime tests
// ============================================================================

#[test]
fn runtime_rejects_invalid_config() {
    let mut config = Config::default();
    config.replication.commit_queue_depth = 0;
    assert!(Runtime::new(config).is_err());
}

#[tokio::test]
async fn processor_requires_started_runtime() {
    let runtime = Runtime::new(common::test_config()).unwrap();
    assert!(runtime.processor().is_err());
    assert!(!runtime.is_ready());
}

#[tokio::test]
async fn runtime_lifecycle() {
    let (mut runtime, processor) = common::started_runtime(common::test_config()).await;
    assert!(runtime.is_running());
    assert!(runtime.is_ready());
    assert_eq!(runtime.leader().leader().as_deref(), Some("test"));

    common::put(&processor, "a", b"1").await;
    common::put(&processor, "a?cas=0", b"2").await;
    let stats = runtime.apply_stats().unwrap();
    assert_eq!(stats.applied(), 2);
    assert_eq!(stats.conflicts(), 1);

    runtime.stop().await.unwrap();
    assert!(!runtime.is_running());
    assert_eq!(runtime.health().apply_loop, ComponentHealth::Stopped);
    assert_eq!(runtime.health().replication, ComponentHealth::Stopped);
    assert!(runtime.is_alive());

    // Writes after stop are rejected; the store keeps its last state.
    let err = processor
        .handle(RawRequest::parse(Method::Put, "b").with_body(b"v".to_vec()))
        .await
        .unwrap_err();
    assert!(err.is_retriable());
    assert_eq!(runtime.store_stats().key_count, 1);

    let entries = common::get_entries(&processor, "a?stale").await.unwrap();
    assert_eq!(entries[0].value, b"1");
}

#[tokio::test]
async fn stopped_runtime_rejects_without_waiting_for_leader() {
    let mut config = common::test_config();
    config.replication.leader_wait_timeout_ms = 60_000;
    let (mut runtime, processor) = common::started_runtime(config).await;
    runtime.stop().await.unwrap();
    assert!(runtime.leader().is_shutting_down());

    for request in [
        RawRequest::parse(Method::Put, "b").with_body(b"v".to_vec()),
        RawRequest::parse(Method::Get, "b"),
    ] {
        let err = tokio::time::timeout(Duration::from_secs(1), processor.handle(request))
            .await
            .expect("rejected before the leader wait elapsed")
            .unwrap_err();
        assert!(matches!(
            err,
            KvError::Unavailable {
                reason: UnavailableReason::ShuttingDown
            }
        ));
    }
}

#[tokio::test]
async fn runtime_rejects_invalid_snapshot() {
    let snapshot = kvs::kv::store::StoreSnapshot {
        index: 1,
        entries: vec![kvs::kv::store::Entry::new("k".to_string(), Vec::new(), 0, 2)],
    };
    let Err(err) = Runtime::from_snapshot(common::test_config(), &snapshot) else {
        panic!("snapshot with an entry ahead of its index was accepted");
    };
    assert!(err.to_string().contains("failed to restore snapshot"));
}

#[tokio::test]
async fn runtime_double_start_fails() {
    let (mut runtime, _processor) = common::started_runtime(common::test_config()).await;
    assert!(runtime.start().await.is_err());
    runtime.stop().await.unwrap();
}

#[tokio::test]
async fn runtime_resumes_from_snapshot() {
    let (mut runtime, processor) = common::started_runtime(common::test_config()).await;
    common::put(&processor, "a", b"1").await;
    common::put(&processor, "b", b"2").await;
    runtime.stop().await.unwrap();
    let snapshot = runtime.snapshot();

    let mut restored = Runtime::from_snapshot(common::test_config(), &snapshot).unwrap();
    restored.start().await.unwrap();
    let processor = restored.processor().unwrap();

    let outcome = common::put(&processor, "c", b"3").await;
    assert_eq!(outcome.index, 3);
    assert_eq!(restored.store_stats().key_count, 3);

    restored.stop().await.unwrap();
}

#[tokio::test]
async fn shutdown_signal_is_observable() {
    let runtime = Runtime::new(common::test_config()).unwrap();
    let mut rx = runtime.shutdown_receiver();
    runtime.shutdown();
    rx.changed().await.unwrap();
    assert!(*rx.borrow());
}
