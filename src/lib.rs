//! kvs - versioned key-value core with compare-and-swap and prefix namespaces.
//!
//! kvs defines the semantics of reading, writing, deleting and enumerating
//! keys on top of a replicated commit log. Every mutation is totally ordered
//! by a replication engine, stamped from a single global version clock, and
//! applied exactly once by a single-consumer apply loop. Reads run under a
//! read lock and are either gated on a known leader (consistent) or served
//! from local state immediately (stale).
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                 Transport (HTTP-style requests)                 │
//! │           RawRequest  →  Request::decode  →  Operation          │
//! └─────────────────────────────────────────────────────────────────┘
//!                                  │
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      OperationProcessor                         │
//! │     writes → LeaderGate → ReplicationEngine::submit             │
//! │     reads  → LeaderGate (consistent only) → Store read lock     │
//! └─────────────────────────────────────────────────────────────────┘
//!                 │                                   │
//! ┌───────────────────────────────┐   ┌─────────────────────────────┐
//! │  Replication engine           │   │  Store + PrefixIndex        │
//! │  commit stream (mpsc) ──────────▶ │  ApplyLoop (single writer)  │
//! └───────────────────────────────┘   └─────────────────────────────┘
//! ```
//!
//! # Module Organization
//!
//! ## Core
//! - [`core::config`] - Configuration parsing and validation
//! - [`core::runtime`] - Node lifecycle
//! - [`core::error`] - Error types and HTTP mapping
//!
//! ## Key-value
//! - [`kv::clock`] - Version clock and read fences
//! - [`kv::store`] - Entries, CAS, snapshots
//! - [`kv::prefix`] - Prefix scans and key folding
//! - [`kv::command`] - Replicated mutations
//! - [`kv::apply_loop`] - Commit stream processing
//! - [`kv::leader`] - Leader signal and read consistency
//! - [`kv::replication`] - Replication engine seam
//! - [`kv::request`] - Request decoding
//! - [`kv::processor`] - Operation dispatch
//!
//! ## CLI
//! - [`cli::commands`] - CLI command implementations
//!
//! # Key Invariants
//!
//! - A key's modify index strictly increases on every successful mutation
//! - Clock values are unique across the whole key space
//! - A failed CAS or a rejected request consumes no clock value
//! - Readers never observe a partially applied mutation

// Core infrastructure
pub mod core;

// Key-value core
pub mod kv;

// CLI
pub mod cli;

// Re-exports for convenience
pub use self::core::{config, error, runtime};
pub use kv::{apply_loop, clock, command, leader, prefix, processor, replication, request, store};
