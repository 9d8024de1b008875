//! Portal client base: the bus connection shared by every session type.
//!
//! The connection is opened lazily and at most once. The first caller of
//! [`PortalClient::connection`] creates the connect future and stores it;
//! every other caller, concurrent or later, awaits a clone of that same
//! future. A failed connect stays failed until a new client is built.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use portal_protocol::{MethodCall, Response, Signal, SignalKey};
use portal_runtime::{Connection, Connector, Request, Token, TokenGenerator};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::options::SessionOptions;

type SharedConnect = Shared<BoxFuture<'static, portal_runtime::Result<Arc<Connection>>>>;

/// Owner of the bus connection and the request machinery.
pub struct PortalClient {
	connector: Arc<dyn Connector>,
	options: SessionOptions,
	tokens: TokenGenerator,
	connecting: Mutex<Option<SharedConnect>>,
	connected: Arc<AtomicBool>,
}

impl PortalClient {
	pub fn new(connector: Arc<dyn Connector>, options: SessionOptions) -> Self {
		Self {
			connector,
			options,
			tokens: TokenGenerator::new(),
			connecting: Mutex::new(None),
			connected: Arc::new(AtomicBool::new(false)),
		}
	}

	pub fn options(&self) -> &SessionOptions {
		&self.options
	}

	/// `true` once a connection has been established.
	pub fn is_connected(&self) -> bool {
		self.connected.load(Ordering::Acquire)
	}

	/// Returns the connection, opening it on first use.
	pub async fn connection(&self) -> portal_runtime::Result<Arc<Connection>> {
		let connect = {
			let mut slot = self.connecting.lock();
			slot.get_or_insert_with(|| self.connect_future()).clone()
		};
		connect.await
	}

	/// Handle for calls on the portal interface `name`.
	pub async fn interface(&self, name: &'static str) -> portal_runtime::Result<Interface> {
		let connection = self.connection().await?;
		Ok(Interface { connection, name })
	}

	pub fn generate_token(&self, prefix: &str) -> Token {
		self.tokens.generate(prefix)
	}

	/// Sends a correlated request over the shared connection.
	pub async fn make_request<F>(&self, build: F) -> portal_runtime::Result<Response>
	where
		F: FnOnce(&Request) -> MethodCall,
	{
		self.connection().await?.make_request(build).await
	}

	fn connect_future(&self) -> SharedConnect {
		let connector = Arc::clone(&self.connector);
		let connected = Arc::clone(&self.connected);
		let timeout = self.options.request_timeout();
		let prefix = self.options.token_prefix.clone();

		async move {
			debug!(target = "portal.connection", "connecting to portal bus");
			let parts = match connector.connect().await {
				Ok(parts) => parts,
				Err(err) => {
					warn!(target = "portal.connection", error = %err, "portal bus unavailable");
					return Err(err);
				}
			};

			let connection = Arc::new(Connection::new(parts).with_request_timeout(timeout).with_token_prefix(prefix));
			tokio::spawn({
				let conn = Arc::clone(&connection);
				async move { conn.run().await }
			});

			connected.store(true, Ordering::Release);
			info!(target = "portal.connection", unique_name = %connection.unique_name(), "portal bus connected");
			Ok(connection)
		}
		.boxed()
		.shared()
	}
}

/// Calls on one interface of the portal object.
#[derive(Clone)]
pub struct Interface {
	connection: Arc<Connection>,
	name: &'static str,
}

impl Interface {
	pub fn name(&self) -> &'static str {
		self.name
	}

	/// Unique bus name of the connection, used to predict portal object paths.
	pub fn unique_name(&self) -> &str {
		self.connection.unique_name()
	}

	/// Sends a correlated request and awaits its `Response`.
	///
	/// Calls built for another interface are rejected before anything is sent.
	pub async fn request<F>(&self, build: F) -> portal_runtime::Result<Response>
	where
		F: FnOnce(&Request) -> MethodCall,
	{
		self.connection
			.try_make_request(|request| {
				let call = build(request);
				self.check(&call)?;
				Ok(call)
			})
			.await
	}

	/// Sends a call without waiting for any reply or response.
	pub async fn notify(&self, call: MethodCall) -> portal_runtime::Result<()> {
		self.check(&call)?;
		self.connection.send(call).await
	}

	/// One-shot subscription to a signal on this connection.
	pub fn watch(&self, key: SignalKey) -> portal_runtime::Result<oneshot::Receiver<portal_runtime::Result<Signal>>> {
		self.connection.watch(key)
	}

	fn check(&self, call: &MethodCall) -> portal_runtime::Result<()> {
		if call.interface == self.name {
			return Ok(());
		}
		warn!(target = "portal.request", interface = self.name, call_interface = %call.interface, member = %call.member, "call rejected");
		Err(portal_runtime::Error::Protocol(format!(
			"{}.{} sent through the {} handle",
			call.interface, call.member, self.name
		)))
	}
}
