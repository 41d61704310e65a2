//! Key-value core.
//!
//! Leaves first:
//! - [`clock`] - Global version clock and read fences
//! - [`store`] - Versioned entries, CAS, snapshots
//! - [`prefix`] - Prefix scans and key folding
//! - [`command`] - Replicated mutations
//! - [`apply_loop`] - Single consumer of the commit stream
//! - [`leader`] - Leader signal and read consistency
//! - [`replication`] - Replication engine seam
//! - [`request`] - Request decoding and validation
//! - [`processor`] - Operation dispatch

pub mod apply_loop;
pub mod clock;
pub mod command;
pub mod leader;
pub mod prefix;
pub mod processor;
pub mod replication;
pub mod request;
pub mod store;
