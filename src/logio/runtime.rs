//! The connection task: owns the socket, dispatches inbound messages and
//! executes commands from the `LogIo` handle.
use super::client::{CloseReason, Command, Shared};
use super::dial::JsonMode;
use super::message::{parse_frame, Inbound, Outbound};
use super::transport::{WsMessage, WsReader, WsWriter};
use std::ops::ControlFlow;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

pub(super) struct Connection {
    pub(super) shared: Arc<Shared>,
    pub(super) writer: WsWriter,
    pub(super) reader: WsReader,
    pub(super) commands: mpsc::UnboundedReceiver<Command>,
    pub(super) json_mode: JsonMode,
}

impl Connection {
    /// Runs until the connection is closed from either side, then closes
    /// the socket.
    pub(super) async fn run(mut self) {
        loop {
            tokio::select! {
                command = self.commands.recv() => {
                    match command {
                        Some(Command::Send(msg)) => {
                            if let Err(e) = self.send(&msg).await {
                                self.fail(CloseReason::Transport(e));
                                break;
                            }
                        }
                        Some(Command::Close) | None => break,
                    }
                }
                frame = self.reader.recv() => {
                    match frame {
                        Some(Ok(WsMessage::Text(text))) => {
                            if self.on_text(&text).await.is_break() {
                                break;
                            }
                        }
                        Some(Ok(WsMessage::Binary(data))) => {
                            debug!("Ignoring {} byte binary frame", data.len());
                        }
                        Some(Ok(WsMessage::Close { code, reason })) => {
                            info!("log.io closed by server ({}): {}", code, reason);
                            self.shared.terminate(None);
                            break;
                        }
                        Some(Err(e)) => {
                            warn!("log.io read error: {}", e);
                            self.shared.terminate(Some(CloseReason::Transport(e.to_string())));
                            break;
                        }
                        None => {
                            info!("log.io stream ended");
                            self.shared.terminate(None);
                            break;
                        }
                    }
                }
            }
        }

        self.flush_commands().await;
        if let Err(e) = self.writer.close().await {
            debug!("log.io close: {}", e);
        }
        self.shared.finish();
        debug!("log.io connection task finished");
    }

    /// Sends messages that were queued before the connection ended.
    async fn flush_commands(&mut self) {
        while let Ok(command) = self.commands.try_recv() {
            if let Command::Send(msg) = command {
                if self.send(&msg).await.is_err() {
                    break;
                }
            }
        }
    }

    async fn on_text(&mut self, text: &str) -> ControlFlow<()> {
        let items = match parse_frame(text) {
            Ok(items) => items,
            Err(e) => return self.on_malformed(e),
        };

        for item in items {
            if !self.shared.is_connected() {
                return ControlFlow::Break(());
            }
            let inbound = match Inbound::from_value(item) {
                Ok(inbound) => inbound,
                Err(e) => {
                    self.on_malformed(e)?;
                    continue;
                }
            };
            self.dispatch(inbound).await?;
        }

        if self.shared.is_connected() {
            ControlFlow::Continue(())
        } else {
            ControlFlow::Break(())
        }
    }

    async fn dispatch(&mut self, inbound: Inbound) -> ControlFlow<()> {
        match inbound {
            Inbound::Ping { data } => {
                if let Err(e) = self.send(&Outbound::Pong { data }).await {
                    self.fail(CloseReason::Transport(e));
                    return ControlFlow::Break(());
                }
            }
            Inbound::Error { message } => {
                warn!("log.io server error: {}", message);
                self.fail(CloseReason::Server(message));
                return ControlFlow::Break(());
            }
            Inbound::Log(record) => self.shared.deliver(record),
            Inbound::Ready => debug!("Ignoring late ready message"),
            Inbound::Other(kind) => debug!("Ignoring log.io message of type '{}'", kind),
        }
        ControlFlow::Continue(())
    }

    fn on_malformed(&self, err: serde_json::Error) -> ControlFlow<()> {
        match self.json_mode {
            JsonMode::Lenient => {
                warn!("Dropping malformed log.io message: {}", err);
                ControlFlow::Continue(())
            }
            JsonMode::Strict => {
                self.fail(CloseReason::Malformed(err.to_string()));
                ControlFlow::Break(())
            }
        }
    }

    async fn send(&mut self, msg: &Outbound) -> Result<(), String> {
        let text = serde_json::to_string(msg).map_err(|e| e.to_string())?;
        debug!("log.io send: {}", text);
        self.writer.send_text(text).await.map_err(|e| e.to_string())
    }

    /// Ends the connection after a terminal error. The socket is closed
    /// once the run loop exits.
    fn fail(&self, reason: CloseReason) {
        self.shared.terminate(Some(reason));
    }
}
