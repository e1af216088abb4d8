//! WebSocket transport for the `log.io` stream.
//!
//! Wraps `tokio-tungstenite` into a writer/reader pair so the connection
//! task can drive both halves from one `tokio::select!` loop.
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::sync::Once;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

/// Path of the log stream relative to the dashboard origin.
pub const LOG_IO_PATH: &str = "/api/v0/log.io";

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A received frame, with raw frames already filtered out.
#[derive(Debug)]
pub enum WsMessage {
    Text(String),
    Binary(Vec<u8>),
    Close { code: u16, reason: String },
}

/// Write half of the connection.
pub struct WsWriter {
    sink: SplitSink<WsStream, Message>,
}

impl WsWriter {
    /// Sends a UTF-8 text frame.
    pub async fn send_text(&mut self, text: String) -> tungstenite::Result<()> {
        self.sink.send(Message::Text(text)).await
    }

    /// Sends a close frame and closes the sink.
    pub async fn close(&mut self) -> tungstenite::Result<()> {
        match self.sink.send(Message::Close(None)).await {
            Ok(()) | Err(tungstenite::Error::ConnectionClosed) => {}
            Err(e) => return Err(e),
        }
        self.sink.close().await
    }
}

/// Read half of the connection.
pub struct WsReader {
    stream: SplitStream<WsStream>,
}

impl WsReader {
    /// Receives the next frame, returning `None` once the stream ends.
    ///
    /// Ping and pong frames are answered by tungstenite itself and skipped.
    pub async fn recv(&mut self) -> Option<tungstenite::Result<WsMessage>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(WsMessage::Text(text))),
                Ok(Message::Binary(data)) => return Some(Ok(WsMessage::Binary(data))),
                Ok(Message::Close(frame)) => {
                    let (code, reason) = frame
                        .map(|cf| (cf.code.into(), cf.reason.to_string()))
                        .unwrap_or((1005, String::new()));
                    return Some(Ok(WsMessage::Close { code, reason }));
                }
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) | Ok(Message::Frame(_)) => continue,
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

/// Installs the rustls crypto provider that `wss` connections need.
///
/// A provider installed earlier by the process is left in place.
fn install_crypto_provider() {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

/// Performs the WebSocket upgrade against `url`.
pub async fn connect(url: &str) -> tungstenite::Result<(WsWriter, WsReader)> {
    install_crypto_provider();
    let (ws_stream, _response) = tokio_tungstenite::connect_async(url).await?;
    let (sink, stream) = ws_stream.split();
    Ok((WsWriter { sink }, WsReader { stream }))
}

/// Builds the `log.io` endpoint for a dashboard origin.
///
/// `http` origins map to `ws`, every other scheme to `wss`. Only the host
/// (and port) of the origin is kept.
pub fn endpoint_for(origin: &str) -> Option<String> {
    let (scheme, rest) = origin.trim().split_once("://")?;
    let host = rest.split(['/', '?', '#']).next().unwrap_or_default();
    if host.is_empty() {
        return None;
    }

    let ws_scheme = match scheme.to_ascii_lowercase().as_str() {
        "http" | "ws" => "ws",
        _ => "wss",
    };
    Some(format!("{}://{}{}", ws_scheme, host, LOG_IO_PATH))
}
