//! CLI command implementations.

mod config;
mod run;

pub use config::{run_config, ConfigArgs};
pub use run::{parse_line, render, run_run, run_script, RenderedResponse, RunArgs, ScriptLine};
