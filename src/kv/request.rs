//! Request decoding.
//!
//! The transport layer hands over an HTTP-shaped request: a method, the key
//! path, raw query parameters and an optional body. Decoding validates the
//! parameter combination and produces a typed [`Operation`]:
//!
//! | Request                             | Operation         |
//! |-------------------------------------|-------------------|
//! | `PUT key [flags=F] [cas=I]`         | `Put` / `CasPut`  |
//! | `GET key`                           | `Get`             |
//! | `GET prefix?recurse`                | `RecursiveGet`    |
//! | `GET prefix?keys[&separator=S]`     | `ListKeys`        |
//! | `DELETE key [cas=I]`                | `Delete` / `CasDelete` |
//! | `DELETE prefix?recurse`             | `RecursiveDelete` |

use super::command::Mutation;
use super::leader::ReadConsistency;
use crate::core::error::{KvError, KvResult};
use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};

/// HTTP method of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Method {
    Get,
    Put,
    Delete,
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Get => write!(f, "GET"),
            Self::Put => write!(f, "PUT"),
            Self::Delete => write!(f, "DELETE"),
        }
    }
}

impl std::str::FromStr for Method {
    type Err = KvError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "PUT" => Ok(Self::Put),
            "DELETE" => Ok(Self::Delete),
            other => Err(KvError::validation(format!(
                "method {} not allowed",
                other
            ))),
        }
    }
}

/// An undecoded request as received from the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRequest {
    /// Request method.
    pub method: Method,
    /// Key or prefix (path after the KV root).
    pub key: String,
    /// Query parameters in arrival order; flag parameters have no value.
    pub query: Vec<(String, Option<String>)>,
    /// Request body.
    pub body: Option<Vec<u8>>,
}

impl RawRequest {
    /// Create a request with no parameters or body.
    pub fn new(method: Method, key: impl Into<String>) -> Self {
        Self {
            method,
            key: key.into(),
            query: Vec::new(),
            body: None,
        }
    }

    /// Split a `key?name=value&flag` target into key and parameters.
    ///
    /// The key path, parameter names and values are percent-decoded.
    pub fn parse(method: Method, target: &str) -> Self {
        let (key, query) = match target.split_once('?') {
            Some((key, query)) => (key, query),
            None => (target, ""),
        };

        let mut request = Self::new(method, unescape(key.trim_start_matches('/')));
        for pair in query.split('&').filter(|pair| !pair.is_empty()) {
            request.query.push(match pair.split_once('=') {
                Some((name, value)) => (unescape(name), Some(unescape(value))),
                None => (unescape(pair), None),
            });
        }
        request
    }

    /// Add a valued parameter.
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), Some(value.into())));
        self
    }

    /// Add a flag parameter.
    pub fn with_flag(mut self, name: impl Into<String>) -> Self {
        self.query.push((name.into(), None));
        self
    }

    /// Set the request body.
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Check if a parameter is present (valued or not).
    fn has(&self, name: &str) -> bool {
        self.query.iter().any(|(n, _)| n == name)
    }

    /// First value of a parameter; `Some(None)` when present without a value.
    fn param(&self, name: &str) -> Option<Option<&str>> {
        self.query
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, value)| value.as_deref())
    }

    /// Decode into a validated request.
    pub fn decode(self) -> KvResult<Request> {
        Request::decode(self)
    }
}

/// A decoded operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Read one key.
    Get { key: String },
    /// Unconditional write.
    Put {
        key: String,
        value: Vec<u8>,
        flags: u64,
    },
    /// Write guarded by a modify index.
    CasPut {
        key: String,
        value: Vec<u8>,
        flags: u64,
        index: u64,
    },
    /// Unconditional delete of one key.
    Delete { key: String },
    /// Delete guarded by a modify index.
    CasDelete { key: String, index: u64 },
    /// Read every entry under a prefix.
    RecursiveGet { prefix: String },
    /// Delete every entry under a prefix.
    RecursiveDelete { prefix: String },
    /// List keys under a prefix, folded at a separator.
    ListKeys {
        prefix: String,
        separator: Option<String>,
    },
}

impl Operation {
    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Get { .. } => "get",
            Self::Put { .. } => "put",
            Self::CasPut { .. } => "cas_put",
            Self::Delete { .. } => "delete",
            Self::CasDelete { .. } => "cas_delete",
            Self::RecursiveGet { .. } => "recursive_get",
            Self::RecursiveDelete { .. } => "recursive_delete",
            Self::ListKeys { .. } => "list_keys",
        }
    }

    /// Check if this operation changes the store.
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Self::Put { .. }
                | Self::CasPut { .. }
                | Self::Delete { .. }
                | Self::CasDelete { .. }
                | Self::RecursiveDelete { .. }
        )
    }

    /// Convert a mutating operation into its commit log form.
    pub fn into_mutation(self) -> Option<Mutation> {
        match self {
            Self::Put { key, value, flags } => Some(Mutation::Put { key, value, flags }),
            Self::CasPut {
                key,
                value,
                flags,
                index,
            } => Some(Mutation::CasPut {
                key,
                value,
                flags,
                index,
            }),
            Self::Delete { key } => Some(Mutation::Delete { key }),
            Self::CasDelete { key, index } => Some(Mutation::CasDelete { key, index }),
            Self::RecursiveDelete { prefix } => Some(Mutation::DeleteTree { prefix }),
            Self::Get { .. } | Self::RecursiveGet { .. } | Self::ListKeys { .. } => None,
        }
    }
}

/// A decoded request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// The operation to run.
    pub operation: Operation,
    /// Requested read consistency; `None` uses the node default.
    pub consistency: Option<ReadConsistency>,
}

impl Request {
    /// Wrap an operation with the node's default consistency.
    pub fn new(operation: Operation) -> Self {
        Self {
            operation,
            consistency: None,
        }
    }

    /// Override the read consistency.
    pub fn with_consistency(mut self, consistency: ReadConsistency) -> Self {
        self.consistency = Some(consistency);
        self
    }

    /// Validate and decode a raw request.
    pub fn decode(raw: RawRequest) -> KvResult<Self> {
        let consistency = decode_consistency(&raw)?;

        let recurse = raw.has("recurse");
        let keys = raw.has("keys");
        if recurse && keys {
            return Err(KvError::validation("recurse and keys are mutually exclusive"));
        }

        let separator = raw
            .param("separator")
            .or_else(|| raw.param("seperator"))
            .map(|value| value.unwrap_or_default().to_string());
        if separator.is_some() && !keys {
            return Err(KvError::validation("separator is only valid with keys"));
        }

        let operation = match raw.method {
            Method::Get => {
                reject(&raw, "flags", "flags are only valid on PUT")?;
                reject(&raw, "cas", "cas is not valid on GET")?;
                if keys {
                    Operation::ListKeys {
                        prefix: raw.key,
                        separator: separator.filter(|sep| !sep.is_empty()),
                    }
                } else if recurse {
                    Operation::RecursiveGet { prefix: raw.key }
                } else {
                    Operation::Get {
                        key: require_key(raw.key)?,
                    }
                }
            }
            Method::Put => {
                reject_write_read_params(&raw, recurse, keys, consistency)?;
                let flags = parse_u64(&raw, "flags")?.unwrap_or(0);
                let index = parse_u64(&raw, "cas")?;
                let key = require_key(raw.key)?;
                let value = raw.body.unwrap_or_default();
                match index {
                    Some(index) => Operation::CasPut {
                        key,
                        value,
                        flags,
                        index,
                    },
                    None => Operation::Put { key, value, flags },
                }
            }
            Method::Delete => {
                reject(&raw, "flags", "flags are only valid on PUT")?;
                reject_write_read_params(&raw, false, keys, consistency)?;
                let index = parse_u64(&raw, "cas")?;
                if recurse {
                    if index.is_some() {
                        return Err(KvError::validation("cas is not valid with recurse"));
                    }
                    Operation::RecursiveDelete { prefix: raw.key }
                } else {
                    let key = require_key(raw.key)?;
                    match index {
                        Some(index) => Operation::CasDelete { key, index },
                        None => Operation::Delete { key },
                    }
                }
            }
        };

        Ok(Self {
            operation,
            consistency,
        })
    }
}

fn unescape(text: &str) -> String {
    percent_decode_str(text).decode_utf8_lossy().into_owned()
}

fn decode_consistency(raw: &RawRequest) -> KvResult<Option<ReadConsistency>> {
    match (raw.has("consistent"), raw.has("stale")) {
        (true, true) => Err(KvError::validation(
            "consistent and stale are mutually exclusive",
        )),
        (true, false) => Ok(Some(ReadConsistency::Consistent)),
        (false, true) => Ok(Some(ReadConsistency::Stale)),
        (false, false) => Ok(None),
    }
}

fn reject(raw: &RawRequest, name: &str, message: &str) -> KvResult<()> {
    if raw.has(name) {
        return Err(KvError::validation(message));
    }
    Ok(())
}

fn reject_write_read_params(
    raw: &RawRequest,
    recurse: bool,
    keys: bool,
    consistency: Option<ReadConsistency>,
) -> KvResult<()> {
    if recurse {
        return Err(KvError::validation(format!(
            "recurse is not valid on {}",
            raw.method
        )));
    }
    if keys {
        return Err(KvError::validation(format!(
            "keys is not valid on {}",
            raw.method
        )));
    }
    if consistency == Some(ReadConsistency::Stale) {
        return Err(KvError::validation("writes cannot be stale"));
    }
    Ok(())
}

fn require_key(key: String) -> KvResult<String> {
    if key.is_empty() {
        return Err(KvError::validation("missing key name"));
    }
    Ok(key)
}

fn parse_u64(raw: &RawRequest, name: &str) -> KvResult<Option<u64>> {
    match raw.param(name) {
        None => Ok(None),
        Some(value) => {
            let value = value.unwrap_or_default();
            value.parse::<u64>().map(Some).map_err(|_| {
                KvError::validation(format!("invalid {} value: {:?}", name, value))
            })
        }
    }
}
