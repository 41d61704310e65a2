//! Run command implementation.
//!
//! Executes request lines against an in-process single-node runtime and
//! prints one JSON response per line. Line format:
//!
//! ```text
//! PUT foo/bar?flags=5 value
//! GET ?recurse
//! GET ?keys&separator=/
//! DELETE foo?cas=3
//! ```

use crate::core::config::Config;
use crate::core::error::{HttpErrorMapping, KvError, KvResult};
use crate::core::runtime::Runtime;
use crate::kv::leader::ReadConsistency;
use crate::kv::processor::{OperationProcessor, Response};
use crate::kv::request::{Method, RawRequest};
use crate::kv::store::Entry;
use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

/// Execute a request script.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Script file; reads stdin when omitted.
    #[arg(short, long)]
    pub script: Option<PathBuf>,

    /// Serve reads from local state without waiting for a leader.
    #[arg(long)]
    pub stale: bool,
}

/// One parsed script line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptLine {
    pub method: Method,
    pub target: String,
    pub body: Option<Vec<u8>>,
}

impl ScriptLine {
    fn into_request(self) -> RawRequest {
        let request = RawRequest::parse(self.method, &self.target);
        match self.body {
            Some(body) => request.with_body(body),
            None => request,
        }
    }
}

/// Parse a script line; blank lines and `#` comments yield `None`.
pub fn parse_line(line: &str) -> KvResult<Option<ScriptLine>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let (method, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = rest.trim_start();
    let (target, body) = match rest.split_once(char::is_whitespace) {
        Some((target, body)) => (target, Some(body.trim_start().as_bytes().to_vec())),
        None => (rest, None),
    };

    Ok(Some(ScriptLine {
        method: method.parse()?,
        target: target.to_string(),
        body,
    }))
}

/// Entry as shown to clients.
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct JsonEntry<'a> {
    key: &'a str,
    value: String,
    flags: u64,
    create_index: u64,
    modify_index: u64,
}

impl<'a> From<&'a Entry> for JsonEntry<'a> {
    fn from(entry: &'a Entry) -> Self {
        Self {
            key: &entry.key,
            value: BASE64.encode(&entry.value),
            flags: entry.flags,
            create_index: entry.create_index,
            modify_index: entry.modify_index,
        }
    }
}

/// A rendered response line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedResponse {
    /// HTTP status the transport would send.
    pub status: u16,
    /// Index header, present on reads.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<u64>,
    /// Response body.
    pub body: serde_json::Value,
}

/// Render a processor result the way the HTTP surface presents it.
pub fn render(result: &KvResult<Response>) -> Result<RenderedResponse> {
    let rendered = match result {
        Ok(Response::Write(outcome)) => RenderedResponse {
            status: 200,
            index: None,
            body: serde_json::Value::Bool(outcome.success),
        },
        Ok(Response::Entries(read)) => match &read.data {
            Some(entries) => RenderedResponse {
                status: 200,
                index: Some(read.meta.index),
                body: serde_json::to_value(
                    entries.iter().map(JsonEntry::from).collect::<Vec<_>>(),
                )?,
            },
            None => RenderedResponse {
                status: 404,
                index: Some(read.meta.index),
                body: serde_json::Value::Null,
            },
        },
        Ok(Response::Keys(read)) => RenderedResponse {
            status: 200,
            index: Some(read.meta.index),
            body: serde_json::to_value(&read.data)?,
        },
        Err(e) => render_error(e),
    };
    Ok(rendered)
}

fn render_error(error: &KvError) -> RenderedResponse {
    RenderedResponse {
        status: HttpErrorMapping::to_status_code(error),
        index: None,
        body: serde_json::Value::String(HttpErrorMapping::to_error_message(error)),
    }
}

/// Execute every line of `input`, writing one JSON document per request.
///
/// Returns the number of requests executed.
pub async fn run_script<R, W>(
    processor: &OperationProcessor,
    input: R,
    output: &mut W,
) -> Result<usize>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    let mut executed = 0;

    while let Some(line) = lines.next_line().await.context("failed to read script")? {
        let rendered = match parse_line(&line) {
            Ok(None) => continue,
            Ok(Some(script_line)) => {
                let result = processor.handle(script_line.into_request()).await;
                render(&result)?
            }
            Err(e) => render_error(&e),
        };
        executed += 1;

        let mut json = serde_json::to_vec(&rendered)?;
        json.push(b'\n');
        output.write_all(&json).await?;
    }

    output.flush().await?;
    Ok(executed)
}

/// Run the run command.
pub async fn run_run(config: Config, args: RunArgs) -> Result<()> {
    let mut config = config;
    if args.stale {
        config.reads.default_consistency = ReadConsistency::Stale;
    }

    let mut runtime = Runtime::new(config)?;
    runtime.start().await?;
    let processor = runtime.processor()?;

    let mut stdout = tokio::io::stdout();
    let executed = match args.script {
        Some(ref path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("failed to open script: {}", path.display()))?;
            run_script(&processor, BufReader::new(file), &mut stdout).await
        }
        None => run_script(&processor, BufReader::new(tokio::io::stdin()), &mut stdout).await,
    };

    // Stop even when the script failed midway.
    let stopped = runtime.stop().await;
    let executed = executed?;
    stopped?;

    tracing::info!(executed, "script complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_line_with_body() {
        let line = parse_line("PUT foo/bar?flags=5 some value").unwrap().unwrap();
        assert_eq!(line.method, Method::Put);
        assert_eq!(line.target, "foo/bar?flags=5");
        assert_eq!(line.body.as_deref(), Some(&b"some value"[..]));
    }

    #[test]
    fn test_parse_line_skips_blank_and_comments() {
        assert!(parse_line("").unwrap().is_none());
        assert!(parse_line("   ").unwrap().is_none());
        assert!(parse_line("# setup").unwrap().is_none());
    }

    #[test]
    fn test_parse_line_bare_method() {
        let line = parse_line("get").unwrap().unwrap();
        assert_eq!(line.method, Method::Get);
        assert_eq!(line.target, "");
        assert!(line.body.is_none());
    }

    #[test]
    fn test_parse_line_unknown_method() {
        let err = parse_line("POST foo").unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_render_error_status() {
        let err = KvError::unavailable(crate::core::error::UnavailableReason::NoLeader);
        let rendered = render(&Err(err)).unwrap();
        assert_eq!(rendered.status, 503);
        assert_eq!(rendered.body, serde_json::json!("No cluster leader"));
    }

    #[tokio::test]
    async fn test_run_script_end_to_end() {
        let mut runtime = Runtime::new(Config::default()).unwrap();
        runtime.start().await.unwrap();
        let processor = runtime.processor().unwrap();

        let script = b"PUT foo/bar?flags=5 hello\nGET foo/bar\nGET missing\nGET ?keys&separator=/\n";
        let mut out = Vec::new();
        let executed = run_script(&processor, &script[..], &mut out).await.unwrap();
        assert_eq!(executed, 4);

        let lines: Vec<serde_json::Value> = out
            .split(|b| *b == b'\n')
            .filter(|l| !l.is_empty())
            .map(|l| serde_json::from_slice(l).unwrap())
            .collect();

        assert_eq!(lines[0]["body"], serde_json::json!(true));
        assert_eq!(lines[1]["status"], 200);
        assert_eq!(lines[1]["body"][0]["Key"], "foo/bar");
        assert_eq!(lines[1]["body"][0]["Value"], BASE64.encode(b"hello"));
        assert_eq!(lines[1]["body"][0]["Flags"], 5);
        assert_eq!(lines[1]["index"], 1);
        assert_eq!(lines[2]["status"], 404);
        assert_eq!(lines[3]["body"], serde_json::json!(["foo/"]));

        runtime.stop().await.unwrap();
    }
}
