//! Transport abstraction between the correlator and the message bus.
//!
//! A transport is split in two halves so the receive loop can run on its own
//! task while calls are sent from anywhere:
//! - [`Transport`] delivers outbound [`MethodCall`]s
//! - [`TransportReceiver`] pumps inbound [`Signal`]s into an mpsc channel
//!   and returns when the bus connection ends
//!
//! [`Connector`] is how a client obtains both halves lazily, the first time
//! it needs the bus.

use std::future::Future;
use std::pin::Pin;

use portal_protocol::{MethodCall, Signal};
use tokio::sync::mpsc;

use crate::error::Result;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Sending half of a transport.
pub trait Transport: Send {
	/// Delivers `call` to the bus.
	///
	/// For calls without `no_reply` the future resolves once the method
	/// return has been received; a D-Bus error reply is an `Err`.
	fn send(&mut self, call: MethodCall) -> BoxFuture<'_, Result<()>>;
}

/// Receiving half of a transport.
pub trait TransportReceiver: Send {
	/// Forwards signals until the bus connection ends.
	fn run(self: Box<Self>) -> BoxFuture<'static, Result<()>>;
}

/// Everything a [`Connection`](crate::Connection) needs from a transport.
pub struct TransportParts {
	/// Unique bus name of the local connection (e.g. `:1.42`).
	pub unique_name: String,
	pub sender: Box<dyn Transport>,
	pub receiver: Box<dyn TransportReceiver>,
	pub signal_rx: mpsc::UnboundedReceiver<Signal>,
}

impl std::fmt::Debug for TransportParts {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("TransportParts").field("unique_name", &self.unique_name).finish_non_exhaustive()
	}
}

/// Opens a transport on demand.
pub trait Connector: Send + Sync {
	fn connect(&self) -> BoxFuture<'_, Result<TransportParts>>;
}
