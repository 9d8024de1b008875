//! Portal bus connection, request correlation and transports.
//!
//! - [`token`]: unique request/session handle tokens
//! - [`transport`]: the send/receive split every bus backend implements
//! - [`connection`]: the correlator matching `Response` signals to requests
//! - [`fake_transport`]: in-memory transport for tests
//! - `dbus` (feature `dbus`): the zbus session-bus transport

pub mod connection;
#[cfg(feature = "dbus")]
pub mod dbus;
pub mod error;
pub mod fake_transport;
pub mod token;
pub mod transport;

pub use connection::{Connection, DEFAULT_TOKEN_PREFIX, Request};
#[cfg(feature = "dbus")]
pub use dbus::DbusConnector;
pub use error::{Error, Result};
pub use token::{Token, TokenGenerator};
pub use transport::{BoxFuture, Connector, Transport, TransportParts, TransportReceiver};
