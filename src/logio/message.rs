//! Wire messages exchanged with the `log.io` endpoint.
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Severity of a streamed log line.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    #[serde(rename = "DBUG", alias = "DEBUG")]
    Debug,
    #[serde(rename = "INFO")]
    Info,
    #[serde(rename = "WARN")]
    Warn,
    #[serde(rename = "ERRO", alias = "ERROR")]
    Error,
}

impl LogLevel {
    /// The name used on the wire.
    pub fn as_wire(self) -> &'static str {
        match self {
            LogLevel::Debug => "DBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERRO",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DBUG" | "DEBUG" => Ok(LogLevel::Debug),
            "INFO" => Ok(LogLevel::Info),
            "WARN" | "WARNING" => Ok(LogLevel::Warn),
            "ERRO" | "ERROR" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level '{}'", other)),
        }
    }
}

/// One log line emitted by the server.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct LogRecord {
    /// Unix timestamp in milliseconds.
    pub time: i64,
    #[serde(rename = "lvl")]
    pub level: LogLevel,
    #[serde(rename = "log")]
    pub message: String,
}

/// A message received from the server, classified by its `type` field.
#[derive(Clone, Debug, PartialEq)]
pub enum Inbound {
    /// Keepalive. `data` is `None` when the field is absent, which is not the
    /// same as `Some(Value::Null)`.
    Ping { data: Option<Value> },
    Error { message: String },
    Log(LogRecord),
    Ready,
    /// Any other `type`, kept for logging.
    Other(String),
}

impl Inbound {
    /// Classifies a single JSON object.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let inbound = match kind.as_str() {
            "ping" => Inbound::Ping {
                data: value.get("data").cloned(),
            },
            "error" => Inbound::Error {
                message: value
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            },
            "log" => Inbound::Log(serde_json::from_value(value)?),
            "ready" => Inbound::Ready,
            _ => Inbound::Other(kind),
        };
        Ok(inbound)
    }
}

/// Splits a text frame into its messages. A frame carries either a single
/// object or an array of them.
pub fn parse_frame(text: &str) -> Result<Vec<Value>, serde_json::Error> {
    match serde_json::from_str(text)? {
        Value::Array(items) => Ok(items),
        single => Ok(vec![single]),
    }
}

/// Messages the client sends.
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Outbound {
    Pong {
        #[serde(skip_serializing_if = "Option::is_none")]
        data: Option<Value>,
    },
    SetLevel {
        level: LogLevel,
    },
}

/// The first message sent after the socket opens.
#[derive(Serialize, Debug)]
pub struct Auth<'a> {
    pub token: &'a str,
}
