//! Client for the dashboard's `log.io` WebSocket log stream.
//!
//! [`dial`] opens the socket and performs the token handshake. The returned
//! [`LogIo`] answers keepalive pings, fans log records out to listeners and
//! reports the end of the connection to close listeners.
pub mod client;
pub mod dial;
pub mod listeners;
pub mod message;
mod runtime;
pub mod transport;

#[cfg(test)]
mod tests;

pub use client::{CloseReason, LogIo};
pub use dial::{dial, DialError, DialOptions, JsonMode};
pub use listeners::Subscription;
pub use message::{LogLevel, LogRecord};
