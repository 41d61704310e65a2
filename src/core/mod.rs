//! Core runtime infrastructure.
//!
//! This module contains the node-level plumbing around the key-value core:
//! - [`config`] - Configuration parsing and validation
//! - [`runtime`] - Main runtime orchestration
//! - [`error`] - Error types and HTTP status mapping

pub mod config;
pub mod error;
pub mod runtime;
