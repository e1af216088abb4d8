//! This module defines `LogIo`, the handle callers use to interact with a
//! live `log.io` connection.
use super::listeners::{Listeners, Subscription};
use super::message::{LogLevel, LogRecord, Outbound};
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{mpsc, watch};
use tracing::debug;

/// Why a connection ended, as seen by close listeners.
///
/// Close listeners receive `None` for a local [`LogIo::close`] or a clean
/// close from the server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CloseReason {
    /// The server sent an `error` message.
    Server(String),
    /// An inbound frame was not valid JSON and the client runs in strict mode.
    Malformed(String),
    /// Reading from or writing to the socket failed.
    Transport(String),
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::Server(msg) => write!(f, "server error: {}", msg),
            CloseReason::Malformed(detail) => write!(f, "malformed message: {}", detail),
            CloseReason::Transport(detail) => write!(f, "transport failure: {}", detail),
        }
    }
}

/// Commands sent from the handle to the connection task.
#[derive(Debug)]
pub(super) enum Command {
    Send(Outbound),
    Close,
}

/// A notification waiting to be handed to listeners.
enum Event {
    Log(LogRecord),
    Closed(Option<CloseReason>),
}

struct State {
    /// `None` once the connection has ended.
    commands: Option<mpsc::UnboundedSender<Command>>,
    started: bool,
    draining: bool,
    pending: VecDeque<Event>,
}

/// State shared between the handles and the connection task.
///
/// Listener notifications go through one queue, delivered by whichever
/// thread gets to drain it first, so listeners see events in arrival order
/// and never concurrently.
pub(super) struct Shared {
    state: Mutex<State>,
    finished: watch::Sender<bool>,
    log_listeners: Listeners<LogRecord>,
    close_listeners: Listeners<Option<CloseReason>>,
}

impl Shared {
    pub(super) fn new(commands: mpsc::UnboundedSender<Command>) -> Self {
        Self {
            state: Mutex::new(State {
                commands: Some(commands),
                started: false,
                draining: false,
                pending: VecDeque::new(),
            }),
            finished: watch::channel(false).0,
            log_listeners: Listeners::new(),
            close_listeners: Listeners::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(super) fn is_connected(&self) -> bool {
        self.lock().commands.is_some()
    }

    fn sender(&self) -> Option<mpsc::UnboundedSender<Command>> {
        self.lock().commands.clone()
    }

    /// Hands a log record to the log listeners. Records arriving after the
    /// connection ended are dropped.
    pub(super) fn deliver(&self, record: LogRecord) {
        {
            let mut state = self.lock();
            if state.commands.is_none() {
                return;
            }
            state.pending.push_back(Event::Log(record));
        }
        self.drain();
    }

    /// Clears the connection and notifies close listeners.
    ///
    /// Only the first caller gets the sender back; every later call is a
    /// no-op, so close listeners fire at most once.
    pub(super) fn terminate(
        &self,
        reason: Option<CloseReason>,
    ) -> Option<mpsc::UnboundedSender<Command>> {
        let sender = {
            let mut state = self.lock();
            let sender = state.commands.take()?;
            debug!("log.io connection terminated: {:?}", reason);
            state.pending.push_back(Event::Closed(reason));
            sender
        };
        self.drain();
        Some(sender)
    }

    /// Terminates without a reason and tells the connection task to close
    /// the socket. Returns whether the connection was still open.
    fn close(&self) -> bool {
        match self.terminate(None) {
            Some(sender) => {
                let _ = sender.send(Command::Close);
                true
            }
            None => false,
        }
    }

    fn start(&self) {
        self.lock().started = true;
        self.drain();
    }

    /// Marks the connection task as done with the socket.
    pub(super) fn finish(&self) {
        self.finished.send_replace(true);
    }

    fn drain(&self) {
        {
            let mut state = self.lock();
            if !state.started || state.draining {
                return;
            }
            state.draining = true;
        }

        loop {
            let event = {
                let mut state = self.lock();
                match state.pending.pop_front() {
                    Some(event) => event,
                    None => {
                        state.draining = false;
                        return;
                    }
                }
            };
            match event {
                Event::Log(record) => self.log_listeners.emit(&record),
                Event::Closed(reason) => self.close_listeners.emit(&reason),
            }
        }
    }
}

/// Closes the connection once the last `LogIo` clone is gone.
struct Handle {
    shared: Arc<Shared>,
}

impl Drop for Handle {
    fn drop(&mut self) {
        if self.shared.close() {
            debug!("Last log.io handle dropped; closing the connection");
        }
    }
}

/// A connected, authenticated `log.io` client.
///
/// Obtained from [`super::dial`]. The connection answers pings right away,
/// but listener notifications are held back until [`LogIo::start`] is
/// called, so listeners registered in between see every message. Cloning
/// yields another handle to the same connection; dropping the last one
/// closes it.
#[derive(Clone)]
pub struct LogIo {
    handle: Arc<Handle>,
}

impl LogIo {
    pub(super) fn new(shared: Arc<Shared>) -> Self {
        Self {
            handle: Arc::new(Handle { shared }),
        }
    }

    fn shared(&self) -> &Shared {
        &self.handle.shared
    }

    /// Whether the connection is still open.
    pub fn is_active(&self) -> bool {
        self.shared()
            .sender()
            .map(|sender| !sender.is_closed())
            .unwrap_or(false)
    }

    /// Begins delivering messages to the registered listeners, starting
    /// with any that arrived since the dial.
    ///
    /// Calling it more than once has no further effect.
    pub fn start(&self) {
        self.shared().start();
    }

    /// Asks the server to change the minimum level streamed to this client.
    ///
    /// No acknowledgement is awaited. Does nothing when not connected.
    pub fn set_level(&self, level: LogLevel) {
        if let Some(sender) = self.shared().sender() {
            let _ = sender.send(Command::Send(Outbound::SetLevel { level }));
        }
    }

    /// Registers a callback for every received log record.
    pub fn add_log_listener<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&LogRecord) + Send + Sync + 'static,
    {
        self.shared().log_listeners.add(listener)
    }

    /// Registers a callback for the end of the connection.
    pub fn add_close_listener<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&Option<CloseReason>) + Send + Sync + 'static,
    {
        self.shared().close_listeners.add(listener)
    }

    /// Closes the connection. Calling it again is a no-op.
    ///
    /// Close listeners run before this returns, unless called from inside
    /// a listener, in which case they run right after it.
    pub fn close(&self) {
        if self.shared().close() {
            self.start();
        }
    }

    /// Waits until the connection task has closed the socket.
    pub async fn closed(&self) {
        let mut finished = self.shared().finished.subscribe();
        let _ = finished.wait_for(|done| *done).await;
    }
}

impl fmt::Debug for LogIo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogIo")
            .field("active", &self.is_active())
            .field("log_listeners", &self.shared().log_listeners.len())
            .field("close_listeners", &self.shared().close_listeners.len())
            .finish()
    }
}
