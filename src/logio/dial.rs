//! Opening and authenticating a `log.io` connection.
use super::client::{LogIo, Shared};
use super::message::{Auth, Inbound};
use super::runtime::Connection;
use super::transport::{self, WsMessage, WsReader};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite;
use tracing::{debug, info};

/// Default bound on both the socket open and the auth reply.
pub const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(15);

/// How the connection treats inbound frames that are not valid JSON.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JsonMode {
    /// Log a warning and drop the frame.
    #[default]
    Lenient,
    /// Close the connection with [`super::CloseReason::Malformed`].
    Strict,
}

/// Parameters for [`dial`].
#[derive(Clone, Debug)]
pub struct DialOptions {
    /// Dashboard origin, e.g. `https://host:4000`.
    pub origin: String,
    pub connect_timeout: Duration,
    pub auth_timeout: Duration,
    pub json_mode: JsonMode,
}

impl DialOptions {
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            connect_timeout: DEFAULT_DIAL_TIMEOUT,
            auth_timeout: DEFAULT_DIAL_TIMEOUT,
            json_mode: JsonMode::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum DialError {
    #[error("invalid dashboard origin '{0}'")]
    InvalidOrigin(String),
    #[error("WebSocket dial timeout")]
    Timeout,
    #[error("WebSocket connect failed: {0}")]
    Connect(#[source] tungstenite::Error),
    #[error("log.io rejected the token: {0}")]
    Rejected(String),
    #[error("unreadable log.io auth reply: {0}")]
    Handshake(String),
    #[error("log.io closed the connection during the handshake")]
    Closed,
}

/// Connects to the `log.io` endpoint of `options.origin` and authenticates
/// with `token`.
///
/// Must be called from within a Tokio runtime; the returned client's
/// connection runs on a spawned task.
///
/// # Arguments
///
/// * `options` - The dashboard origin, timeouts and JSON handling.
/// * `token` - The access token sent as the first message.
///
/// # Errors
///
/// This function will return an error if the origin has no host, the socket
/// cannot be opened (including TLS failures), the server rejects the token
/// or closes the connection, its reply is not a valid message, or either
/// step exceeds its timeout. A socket that was opened is closed again
/// before the error is returned.
pub async fn dial(options: &DialOptions, token: &str) -> Result<LogIo, DialError> {
    let url = transport::endpoint_for(&options.origin)
        .ok_or_else(|| DialError::InvalidOrigin(options.origin.clone()))?;
    debug!("Dialing {}", url);

    let (mut writer, mut reader) = timeout(options.connect_timeout, transport::connect(&url))
        .await
        .map_err(|_| DialError::Timeout)?
        .map_err(DialError::Connect)?;

    let auth = serde_json::to_string(&Auth { token })
        .map_err(|e| DialError::Handshake(e.to_string()))?;
    writer.send_text(auth).await.map_err(DialError::Connect)?;

    let reply = timeout(options.auth_timeout, await_ready(&mut reader)).await;
    match reply {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            let _ = writer.close().await;
            return Err(e);
        }
        Err(_) => {
            let _ = writer.close().await;
            return Err(DialError::Timeout);
        }
    }
    info!("log.io connection ready at {}", url);

    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let shared = Arc::new(Shared::new(command_tx));
    let connection = Connection {
        shared: shared.clone(),
        writer,
        reader,
        commands: command_rx,
        json_mode: options.json_mode,
    };
    tokio::spawn(connection.run());

    Ok(LogIo::new(shared))
}

/// Waits for the server's answer to the auth message.
async fn await_ready(reader: &mut WsReader) -> Result<(), DialError> {
    loop {
        let text = match reader.recv().await {
            Some(Ok(WsMessage::Text(text))) => text,
            Some(Ok(WsMessage::Binary(_))) => continue,
            Some(Ok(WsMessage::Close { .. })) | None => return Err(DialError::Closed),
            Some(Err(e)) => return Err(DialError::Connect(e)),
        };
        debug!("log.io auth result: {}", text);

        let value = serde_json::from_str(&text).map_err(|e| DialError::Handshake(e.to_string()))?;
        match Inbound::from_value(value) {
            Ok(Inbound::Ready) => return Ok(()),
            Ok(Inbound::Error { message }) => return Err(DialError::Rejected(message)),
            Ok(_) => continue,
            Err(e) => return Err(DialError::Handshake(e.to_string())),
        }
    }
}
