//! Error types for the portal runtime.

use std::time::Duration;

use portal_protocol::ResponseStatus;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the connection and the transports beneath it.
///
/// Cloneable so a single failure can settle every waiter that shares it.
#[derive(Debug, Clone, Error)]
pub enum Error {
	/// The session bus could not be reached.
	#[error("bus connection failed: {0}")]
	Connection(String),

	/// The bus connection ended while the operation was outstanding.
	#[error("bus connection closed")]
	ConnectionClosed,

	/// The portal answered the request with a non-zero status.
	#[error("portal request denied: {status}")]
	RequestDenied { status: ResponseStatus },

	/// No response arrived within the configured request timeout.
	#[error("portal request timed out after {0:?}")]
	Timeout(Duration),

	/// A response or reply did not have the expected shape.
	#[error("protocol error: {0}")]
	Protocol(String),

	/// The transport failed to deliver a call.
	#[error("transport error: {0}")]
	Transport(String),
}

impl Error {
	pub fn is_connection(&self) -> bool {
		matches!(self, Self::Connection(_) | Self::ConnectionClosed)
	}

	pub fn is_denied(&self) -> bool {
		matches!(self, Self::RequestDenied { .. })
	}

	pub fn is_timeout(&self) -> bool {
		matches!(self, Self::Timeout(_))
	}
}

#[cfg(feature = "dbus")]
impl From<zbus::Error> for Error {
	fn from(err: zbus::Error) -> Self {
		match err {
			zbus::Error::InputOutput(io) => Self::Connection(io.to_string()),
			other => Self::Transport(other.to_string()),
		}
	}
}

#[cfg(feature = "dbus")]
impl From<zbus::zvariant::Error> for Error {
	fn from(err: zbus::zvariant::Error) -> Self {
		Self::Protocol(err.to_string())
	}
}
