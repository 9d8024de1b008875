//! Request/response correlation on top of the transport.
//!
//! Portal methods do not return their result. They return immediately and
//! the portal later emits `org.freedesktop.portal.Request::Response` on a
//! request object whose path is derived from the caller's unique bus name
//! and the `handle_token` it chose. This module handles:
//! - Generating unique request tokens
//! - Registering the response subscription before the call leaves
//! - Correlating inbound signals with pending requests by object path
//! - Settling every pending request when the bus connection ends
//!
//! # Message Flow
//!
//! 1. Client calls `make_request()` with a closure building the call
//! 2. Connection generates a token, derives the response path and stores a oneshot sender
//! 3. The closure embeds the token as `handle_token`; the call is sent via transport
//! 4. Client awaits the oneshot receiver
//! 5. Signal loop receives `Response` from the transport
//! 6. Signal is matched by path and sent through the oneshot channel
//! 7. Client receives the decoded [`Response`], or `RequestDenied` for a non-zero status
//!
//! # Example
//!
//! ```ignore
//! let connection = Arc::new(Connection::new(parts));
//! tokio::spawn({
//!     let conn = Arc::clone(&connection);
//!     async move { conn.run().await }
//! });
//!
//! let response = connection
//!     .make_request(|request| MethodCall::create_session(request.token.as_str(), "session_1"))
//!     .await?;
//! ```

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use portal_protocol::{MethodCall, Response, Signal, SignalKey, request_path};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, trace, warn};

use crate::error::{Error, Result};
use crate::token::{Token, TokenGenerator};
use crate::transport::{Transport, TransportParts, TransportReceiver};

/// Prefix of request tokens unless overridden.
pub const DEFAULT_TOKEN_PREFIX: &str = "pie_portal";

/// A request in flight: its token and the path its response will arrive on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
	pub token: Token,
	pub response_path: String,
}

type Waiter = oneshot::Sender<Result<Signal>>;

#[derive(Default)]
struct Subscriptions {
	closed: bool,
	waiters: HashMap<SignalKey, Waiter>,
}

/// Removes a request's waiter when its `make_request` future ends.
///
/// A settled request was already removed by dispatch; removing it again is a no-op.
struct PendingGuard<'a> {
	subscriptions: &'a Mutex<Subscriptions>,
	key: SignalKey,
}

impl Drop for PendingGuard<'_> {
	fn drop(&mut self) {
		if self.subscriptions.lock().waiters.remove(&self.key).is_some() {
			trace!(target = "portal.request", path = %self.key.path, "pending request removed");
		}
	}
}

/// Correlating connection to the portal service.
///
/// # Thread Safety
///
/// Connection is shared across tasks behind an `Arc`. Any number of requests
/// may be in flight; each is matched to its own response purely by object
/// path, so no ordering between distinct requests is assumed.
///
/// Rust implementation uses:
/// - a process-wide counter in [`TokenGenerator`] for token uniqueness
/// - `parking_lot::Mutex<HashMap>` for the waiter table, never held across an await
/// - `tokio::sync::oneshot` for settlement, so each waiter fires at most once
pub struct Connection {
	unique_name: String,
	tokens: TokenGenerator,
	token_prefix: String,
	request_timeout: Option<Duration>,
	subscriptions: Mutex<Subscriptions>,
	sender: tokio::sync::Mutex<Box<dyn Transport>>,
	receiver: Mutex<Option<(Box<dyn TransportReceiver>, mpsc::UnboundedReceiver<Signal>)>>,
}

impl Connection {
	pub fn new(parts: TransportParts) -> Self {
		let TransportParts {
			unique_name,
			sender,
			receiver,
			signal_rx,
		} = parts;

		Self {
			unique_name,
			tokens: TokenGenerator::new(),
			token_prefix: DEFAULT_TOKEN_PREFIX.to_string(),
			request_timeout: None,
			subscriptions: Mutex::new(Subscriptions::default()),
			sender: tokio::sync::Mutex::new(sender),
			receiver: Mutex::new(Some((receiver, signal_rx))),
		}
	}

	/// Fails requests that get no response within `timeout`.
	///
	/// `None` waits for as long as the connection stays open.
	pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
		self.request_timeout = timeout;
		self
	}

	pub fn with_token_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.token_prefix = prefix.into();
		self
	}

	/// Unique bus name of the local end, e.g. `:1.42`.
	pub fn unique_name(&self) -> &str {
		&self.unique_name
	}

	pub fn is_closed(&self) -> bool {
		self.subscriptions.lock().closed
	}

	/// Number of requests and watches still waiting for a signal.
	pub fn pending_count(&self) -> usize {
		self.subscriptions.lock().waiters.len()
	}

	pub fn generate_token(&self, prefix: &str) -> Token {
		self.tokens.generate(prefix)
	}

	/// Sends a portal request and awaits its correlated `Response`.
	///
	/// `build` receives the [`Request`] and must embed `request.token` as the
	/// call's `handle_token`, so the portal replies on `request.response_path`.
	/// The subscription exists before the call is sent.
	///
	/// # Errors
	///
	/// - [`Error::RequestDenied`] when the response status is non-zero
	/// - [`Error::ConnectionClosed`] when the connection ends first
	/// - [`Error::Timeout`] when a request timeout is configured and expires
	/// - [`Error::Protocol`] when the response body is malformed
	pub async fn make_request<F>(&self, build: F) -> Result<Response>
	where
		F: FnOnce(&Request) -> MethodCall,
	{
		self.try_make_request(|request| Ok(build(request))).await
	}

	/// [`make_request`](Self::make_request) with a fallible builder.
	///
	/// A builder error is returned as-is and nothing is sent.
	pub async fn try_make_request<F>(&self, build: F) -> Result<Response>
	where
		F: FnOnce(&Request) -> Result<MethodCall>,
	{
		let (request, rx) = self.register_request()?;
		// Dropped on every exit, including cancellation of this future.
		let _pending = PendingGuard {
			subscriptions: &self.subscriptions,
			key: SignalKey::response(request.response_path.clone()),
		};
		let call = build(&request)?;

		debug!(
			target = "portal.request",
			token = %request.token,
			member = %call.member,
			path = %request.response_path,
			"sending request"
		);

		if let Err(err) = self.send(call).await {
			warn!(target = "portal.request", token = %request.token, error = %err, "request send failed");
			return Err(err);
		}

		let settled = match self.request_timeout {
			Some(limit) => match tokio::time::timeout(limit, rx).await {
				Ok(settled) => settled,
				Err(_) => {
					warn!(target = "portal.request", token = %request.token, ?limit, "request timed out");
					return Err(Error::Timeout(limit));
				}
			},
			None => rx.await,
		};

		let signal = settled.map_err(|_| Error::ConnectionClosed)??;
		let response = Response::from_signal(&signal)
			.ok_or_else(|| Error::Protocol(format!("malformed Response on {}: {:?}", signal.path, signal.args)))?;

		debug!(
			target = "portal.request",
			token = %request.token,
			status = response.status.code(),
			"request settled"
		);

		if response.status.is_success() {
			Ok(response)
		} else {
			Err(Error::RequestDenied { status: response.status })
		}
	}

	/// Sends a call without correlating any response.
	pub async fn send(&self, call: MethodCall) -> Result<()> {
		if self.is_closed() {
			return Err(Error::ConnectionClosed);
		}
		self.sender.lock().await.send(call).await
	}

	/// Subscribes once to the next signal matching `key`.
	///
	/// The receiver yields `Err(ConnectionClosed)` if the connection ends first.
	pub fn watch(&self, key: SignalKey) -> Result<oneshot::Receiver<Result<Signal>>> {
		let mut subscriptions = self.subscriptions.lock();
		if subscriptions.closed {
			return Err(Error::ConnectionClosed);
		}
		if subscriptions.waiters.contains_key(&key) {
			return Err(Error::Protocol(format!("{}::{} on {} is already watched", key.interface, key.member, key.path)));
		}

		let (tx, rx) = oneshot::channel();
		subscriptions.waiters.insert(key, tx);
		Ok(rx)
	}

	/// Runs the signal dispatch loop until the transport closes.
	///
	/// Spawn this once per connection. On exit every pending request and watch
	/// is settled with [`Error::ConnectionClosed`].
	pub async fn run(&self) {
		let Some((receiver, mut signal_rx)) = self.receiver.lock().take() else {
			warn!(target = "portal.connection", "signal loop already started");
			return;
		};

		let receiver_handle = tokio::spawn(async move {
			if let Err(err) = receiver.run().await {
				error!(target = "portal.connection", error = %err, "transport receive failed");
			}
		});

		while let Some(signal) = signal_rx.recv().await {
			self.dispatch(signal);
		}

		debug!(target = "portal.connection", "signal loop ended (transport closed)");
		self.close();

		let _ = receiver_handle.await;
	}

	/// Marks the connection closed and fails everything still pending.
	pub fn close(&self) {
		let drained: Vec<Waiter> = {
			let mut subscriptions = self.subscriptions.lock();
			if subscriptions.closed {
				return;
			}
			subscriptions.closed = true;
			subscriptions.waiters.drain().map(|(_, waiter)| waiter).collect()
		};

		if !drained.is_empty() {
			warn!(target = "portal.connection", pending = drained.len(), "connection closed with pending requests");
		}
		for waiter in drained {
			let _ = waiter.send(Err(Error::ConnectionClosed));
		}
	}

	fn register_request(&self) -> Result<(Request, oneshot::Receiver<Result<Signal>>)> {
		let mut subscriptions = self.subscriptions.lock();
		if subscriptions.closed {
			return Err(Error::ConnectionClosed);
		}

		loop {
			let token = self.tokens.generate(&self.token_prefix);
			let response_path = request_path(&self.unique_name, token.as_str());
			let key = SignalKey::response(response_path.clone());
			if subscriptions.waiters.contains_key(&key) {
				warn!(target = "portal.request", token = %token, "token collides with a pending request; regenerating");
				continue;
			}

			let (tx, rx) = oneshot::channel();
			subscriptions.waiters.insert(key, tx);
			return Ok((Request { token, response_path }, rx));
		}
	}

	fn dispatch(&self, signal: Signal) {
		let key = signal.key();
		// Removed before settling: a second signal for the same key finds nothing.
		let waiter = self.subscriptions.lock().waiters.remove(&key);

		match waiter {
			Some(waiter) => {
				trace!(target = "portal.connection", path = %key.path, member = %key.member, "signal matched");
				let _ = waiter.send(Ok(signal));
			}
			None => {
				trace!(
					target = "portal.connection",
					path = %key.path,
					interface = %key.interface,
					member = %key.member,
					"no subscriber for signal; dropped"
				);
			}
		}
	}
}
