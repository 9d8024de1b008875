//! Fake transport for unit testing request correlation and session setup.
//!
//! Provides an in-memory transport for testing the protocol layer without a
//! session bus or a running portal.
//!
//! # Example
//!
//! ```ignore
//! let (parts, controller) = FakeTransportBuilder::new().build();
//! let connection = Arc::new(Connection::new(parts));
//!
//! tokio::spawn({
//!     let conn = Arc::clone(&connection);
//!     async move { conn.run().await }
//! });
//!
//! let fut = connection.make_request(|r| MethodCall::create_session(r.token.as_str(), "s"));
//! let call = controller.next_call().await.unwrap();
//! controller.respond_to(&call, 0, Options::new());
//! let response = fut.await?;
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use portal_protocol::{MethodCall, Options, Signal, request_path};
use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::transport::{BoxFuture, Connector, Transport, TransportParts, TransportReceiver};

/// Unique name reported by fake transports unless overridden.
pub const FAKE_UNIQUE_NAME: &str = ":1.42";

/// Scripted reply: the signals the fake portal emits in reaction to a call.
pub type Responder = Arc<dyn Fn(&MethodCall, &str) -> Option<Vec<Signal>> + Send + Sync>;

/// Builder for creating fake transport instances.
pub struct FakeTransportBuilder {
	unique_name: String,
	responder: Option<Responder>,
}

impl FakeTransportBuilder {
	pub fn new() -> Self {
		Self {
			unique_name: FAKE_UNIQUE_NAME.to_string(),
			responder: None,
		}
	}

	pub fn unique_name(mut self, name: impl Into<String>) -> Self {
		self.unique_name = name.into();
		self
	}

	/// Answers calls from inside `send`, before the caller gets control back.
	///
	/// The closure receives the call and the transport's unique name.
	pub fn responder<F>(mut self, responder: F) -> Self
	where
		F: Fn(&MethodCall, &str) -> Option<Vec<Signal>> + Send + Sync + 'static,
	{
		self.responder = Some(Arc::new(responder));
		self
	}

	/// Build the fake transport and return both parts and a controller.
	///
	/// Returns [`TransportParts`] for creating a [`Connection`] and a
	/// [`FakeTransportController`] for injecting signals and inspecting sent calls.
	///
	/// [`Connection`]: crate::connection::Connection
	pub fn build(self) -> (TransportParts, FakeTransportController) {
		let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
		let (signal_tx, signal_rx) = mpsc::unbounded_channel();
		let (calls_tx, calls_rx) = mpsc::unbounded_channel();
		let state = Arc::new(SharedState::default());

		let sender = FakeTransportSender {
			unique_name: self.unique_name.clone(),
			state: Arc::clone(&state),
			calls_tx,
			inbound_tx: inbound_tx.downgrade(),
			responder: self.responder,
		};

		let receiver = FakeTransportReceiver { inbound_rx, signal_tx };

		let controller = FakeTransportController {
			unique_name: self.unique_name.clone(),
			inbound_tx: Mutex::new(Some(inbound_tx)),
			state,
			calls_rx: tokio::sync::Mutex::new(calls_rx),
		};

		let parts = TransportParts {
			unique_name: self.unique_name,
			sender: Box::new(sender),
			receiver: Box::new(receiver),
			signal_rx,
		};

		(parts, controller)
	}
}

impl Default for FakeTransportBuilder {
	fn default() -> Self {
		Self::new()
	}
}

#[derive(Default)]
struct SharedState {
	sent: Mutex<Vec<MethodCall>>,
	disconnected: Mutex<bool>,
	send_failure: Mutex<Option<String>>,
}

/// Controller for injecting signals and inspecting sent calls.
pub struct FakeTransportController {
	unique_name: String,
	inbound_tx: Mutex<Option<mpsc::UnboundedSender<Signal>>>,
	state: Arc<SharedState>,
	calls_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<MethodCall>>,
}

impl FakeTransportController {
	pub fn unique_name(&self) -> &str {
		&self.unique_name
	}

	/// Inject a raw signal as if the portal had emitted it.
	pub fn inject(&self, signal: Signal) {
		if let Some(tx) = self.inbound_tx.lock().as_ref() {
			let _ = tx.send(signal);
		}
	}

	/// Inject the `Response` for the request whose token is `token`.
	pub fn respond(&self, token: &str, status: u32, results: Options) {
		self.inject(Signal::response(request_path(&self.unique_name, token), status, results));
	}

	/// Inject the `Response` for a previously sent call.
	///
	/// # Panics
	///
	/// Panics if the call carries no `handle_token`.
	pub fn respond_to(&self, call: &MethodCall, status: u32, results: Options) {
		let token = call
			.handle_token()
			.unwrap_or_else(|| panic!("{} carries no handle_token", call.member));
		self.respond(token, status, results);
	}

	/// Inject `Session::Closed` for `session_path`.
	pub fn close_session(&self, session_path: &str) {
		self.inject(Signal::session_closed(session_path));
	}

	/// Wait for the next call the connection sends.
	pub async fn next_call(&self) -> Option<MethodCall> {
		self.calls_rx.lock().await.recv().await
	}

	/// Next already-sent call, without waiting.
	pub fn try_next_call(&self) -> Option<MethodCall> {
		self.calls_rx.try_lock().ok()?.try_recv().ok()
	}

	/// Take all sent calls, clearing the buffer.
	pub fn take_sent(&self) -> Vec<MethodCall> {
		std::mem::take(&mut *self.state.sent.lock())
	}

	/// Snapshot of the sent calls' member names, in send order.
	pub fn sent_members(&self) -> Vec<String> {
		self.state.sent.lock().iter().map(|call| call.member.clone()).collect()
	}

	/// Make every following send fail with a transport error.
	pub fn fail_sends(&self, message: &str) {
		*self.state.send_failure.lock() = Some(message.to_string());
	}

	/// Simulate the bus connection dropping.
	///
	/// The receive loop ends and further sends fail with `ConnectionClosed`.
	pub fn disconnect(&self) {
		*self.state.disconnected.lock() = true;
		self.inbound_tx.lock().take();
	}
}

struct FakeTransportSender {
	unique_name: String,
	state: Arc<SharedState>,
	calls_tx: mpsc::UnboundedSender<MethodCall>,
	inbound_tx: mpsc::WeakUnboundedSender<Signal>,
	responder: Option<Responder>,
}

impl Transport for FakeTransportSender {
	fn send(&mut self, call: MethodCall) -> BoxFuture<'_, Result<()>> {
		Box::pin(async move {
			if *self.state.disconnected.lock() {
				return Err(Error::ConnectionClosed);
			}
			if let Some(message) = self.state.send_failure.lock().clone() {
				return Err(Error::Transport(message));
			}

			self.state.sent.lock().push(call.clone());

			let replies = self
				.responder
				.as_ref()
				.and_then(|responder| responder(&call, &self.unique_name));
			if let (Some(replies), Some(inbound)) = (replies, self.inbound_tx.upgrade()) {
				for signal in replies {
					let _ = inbound.send(signal);
				}
			}

			let _ = self.calls_tx.send(call);
			Ok(())
		})
	}
}

struct FakeTransportReceiver {
	inbound_rx: mpsc::UnboundedReceiver<Signal>,
	signal_tx: mpsc::UnboundedSender<Signal>,
}

impl TransportReceiver for FakeTransportReceiver {
	fn run(mut self: Box<Self>) -> BoxFuture<'static, Result<()>> {
		Box::pin(async move {
			while let Some(signal) = self.inbound_rx.recv().await {
				if self.signal_tx.send(signal).is_err() {
					break;
				}
			}
			Ok(())
		})
	}
}

/// Connector handing out one prebuilt fake transport.
pub struct FakeConnector {
	parts: Mutex<Option<TransportParts>>,
	failure: Option<String>,
	attempts: AtomicUsize,
}

impl FakeConnector {
	pub fn new(parts: TransportParts) -> Self {
		Self {
			parts: Mutex::new(Some(parts)),
			failure: None,
			attempts: AtomicUsize::new(0),
		}
	}

	/// Connector whose every attempt fails as an unreachable bus would.
	pub fn failing(message: &str) -> Self {
		Self {
			parts: Mutex::new(None),
			failure: Some(message.to_string()),
			attempts: AtomicUsize::new(0),
		}
	}

	/// How many times `connect` has been called.
	pub fn attempts(&self) -> usize {
		self.attempts.load(Ordering::SeqCst)
	}
}

impl Connector for FakeConnector {
	fn connect(&self) -> BoxFuture<'_, Result<TransportParts>> {
		Box::pin(async move {
			self.attempts.fetch_add(1, Ordering::SeqCst);
			// Yield once so concurrent callers can pile up behind the first attempt.
			tokio::task::yield_now().await;

			if let Some(message) = &self.failure {
				return Err(Error::Connection(message.clone()));
			}
			self.parts
				.lock()
				.take()
				.ok_or_else(|| Error::Connection("fake transport already handed out".to_string()))
		})
	}
}
