//! RemoteDesktop session handshake.
//!
//! A session becomes usable after three portal requests, each sent only
//! once the previous one's `Response` has been observed:
//!
//! ```text
//! Uninitialized --connect--> Connecting --CreateSession--> Created
//!     --SelectDevices--> DevicesSelected --Start--> Started
//! ```
//!
//! Any failure moves the session to `Failed` and every waiter, current and
//! future, receives the same error. Nothing is retried; build a new client
//! to try again.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use portal_protocol::{DeviceTypes, MethodCall, REMOTE_DESKTOP_INTERFACE, SESSION_INTERFACE, SignalKey, session_path};
use portal_runtime::Token;
use tracing::{debug, info, warn};

use crate::client::PortalClient;
use crate::error::{Error, Result, SetupStep};

/// Lifecycle of the single session owned by a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SessionState {
	Uninitialized = 0,
	Connecting = 1,
	Created = 2,
	DevicesSelected = 3,
	Started = 4,
	Failed = 5,
	Closed = 6,
}

impl SessionState {
	fn from_u8(value: u8) -> Self {
		match value {
			0 => Self::Uninitialized,
			1 => Self::Connecting,
			2 => Self::Created,
			3 => Self::DevicesSelected,
			4 => Self::Started,
			5 => Self::Failed,
			_ => Self::Closed,
		}
	}
}

impl fmt::Display for SessionState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fmt::Debug::fmt(self, f)
	}
}

/// An established session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHandle {
	/// `session_handle_token` chosen for `CreateSession`.
	pub token: Token,
	/// Session object path assigned by the portal.
	pub path: String,
	/// Devices the portal actually granted in `Start`.
	pub devices: DeviceTypes,
	/// Token for restoring the grant later, when persistence was requested.
	pub restore_token: Option<String>,
}

/// State written only by the setup future and the close paths.
#[derive(Debug)]
struct SessionCell {
	state: AtomicU8,
	handle: Mutex<Option<SessionHandle>>,
	/// `close()` arrived while the handshake was still running.
	close_requested: AtomicBool,
}

// State and `close_requested` use SeqCst: `close()` stores the flag then
// reads the state, setup stores the state then reads the flag, and at least
// one side must see the other.
impl SessionCell {
	fn state(&self) -> SessionState {
		SessionState::from_u8(self.state.load(Ordering::SeqCst))
	}

	fn enter(&self, next: SessionState) {
		let previous = SessionState::from_u8(self.state.swap(next as u8, Ordering::SeqCst));
		info!(target = "portal.session", from = %previous, to = %next, "session state changed");
	}

	/// Moves `Started` to `Closed`; `false` if the session was not started.
	fn close_started(&self) -> bool {
		self.state
			.compare_exchange(
				SessionState::Started as u8,
				SessionState::Closed as u8,
				Ordering::SeqCst,
				Ordering::SeqCst,
			)
			.is_ok()
	}
}

type SharedSetup = Shared<BoxFuture<'static, Result<SessionHandle>>>;

/// Connect-once session setup guard.
pub struct SessionMachine {
	client: Arc<PortalClient>,
	cell: Arc<SessionCell>,
	setup: Mutex<Option<SharedSetup>>,
}

impl SessionMachine {
	pub fn new(client: Arc<PortalClient>) -> Self {
		Self {
			client,
			cell: Arc::new(SessionCell {
				state: AtomicU8::new(SessionState::Uninitialized as u8),
				handle: Mutex::new(None),
				close_requested: AtomicBool::new(false),
			}),
			setup: Mutex::new(None),
		}
	}

	pub fn state(&self) -> SessionState {
		self.cell.state()
	}

	/// The established session, once `Started`.
	pub fn handle(&self) -> Option<SessionHandle> {
		self.cell.handle.lock().clone()
	}

	/// Runs the handshake once and returns the started session.
	///
	/// Concurrent and repeated callers share the first caller's in-flight
	/// setup; none of them triggers a second `CreateSession`.
	///
	/// # Errors
	///
	/// - [`Error::SetupSequence`] when any step failed (now or earlier)
	/// - [`Error::SessionClosed`] when the session has since been closed
	pub async fn ensure_session(&self) -> Result<SessionHandle> {
		let setup = {
			let mut slot = self.setup.lock();
			slot.get_or_insert_with(|| {
				let client = Arc::clone(&self.client);
				let cell = Arc::clone(&self.cell);
				async move { establish(client, cell).await }.boxed().shared()
			})
			.clone()
		};

		let handle = setup.await?;
		if self.state() == SessionState::Closed {
			return Err(Error::SessionClosed);
		}
		Ok(handle)
	}

	/// Closes the session.
	///
	/// Sends `Session.Close` without waiting for a reply. A close during the
	/// handshake is remembered: the session is closed as soon as `Start`
	/// succeeds and waiters get [`Error::SessionClosed`]. Before any setup,
	/// or after a failed one, there is nothing to close.
	pub async fn close(&self) -> Result<()> {
		if matches!(
			self.state(),
			SessionState::Connecting | SessionState::Created | SessionState::DevicesSelected
		) {
			debug!(target = "portal.session", "close requested during setup");
			self.cell.close_requested.store(true, Ordering::SeqCst);
		}
		if !self.cell.close_started() {
			return Ok(());
		}
		let Some(handle) = self.handle() else {
			return Ok(());
		};
		send_close(&self.client, &handle.path).await
	}
}

async fn send_close(client: &PortalClient, path: &str) -> Result<()> {
	info!(target = "portal.session", path = %path, "closing session");
	let session = client.interface(SESSION_INTERFACE).await?;
	session.notify(MethodCall::close_session(path)).await?;
	Ok(())
}

async fn establish(client: Arc<PortalClient>, cell: Arc<SessionCell>) -> Result<SessionHandle> {
	let result = run_setup(&client, &cell).await;
	if let Err(err) = &result {
		cell.enter(SessionState::Failed);
		warn!(target = "portal.session", error = %err, "session setup failed");
	}
	result
}

async fn run_setup(client: &PortalClient, cell: &Arc<SessionCell>) -> Result<SessionHandle> {
	cell.enter(SessionState::Connecting);
	let remote = client
		.interface(REMOTE_DESKTOP_INTERFACE)
		.await
		.map_err(|err| Error::setup(SetupStep::Connect, err))?;
	let options = client.options();

	let session_token = client.generate_token(&format!("{}_session", options.token_prefix));
	let created = remote
		.request(|request| MethodCall::create_session(request.token.as_str(), session_token.as_str()))
		.await
		.map_err(|err| Error::setup(SetupStep::CreateSession, err))?;
	let path = created.session_handle().map(str::to_string).ok_or_else(|| {
		Error::setup(
			SetupStep::CreateSession,
			portal_runtime::Error::Protocol("CreateSession response carries no session_handle".to_string()),
		)
	})?;
	debug!(target = "portal.session", token = %session_token, path = %path, "session created");
	let predicted = session_path(remote.unique_name(), session_token.as_str());
	if path != predicted {
		debug!(target = "portal.session", predicted = %predicted, path = %path, "portal chose its own session path");
	}
	cell.enter(SessionState::Created);

	remote
		.request(|request| {
			MethodCall::select_devices(
				&path,
				request.token.as_str(),
				options.device_types,
				options.persist_mode,
				options.restore_token.as_deref(),
			)
		})
		.await
		.map_err(|err| Error::setup(SetupStep::SelectDevices, err))?;
	cell.enter(SessionState::DevicesSelected);

	let started = remote
		.request(|request| MethodCall::start(&path, &options.parent_window, request.token.as_str()))
		.await
		.map_err(|err| Error::setup(SetupStep::Start, err))?;

	let handle = SessionHandle {
		token: session_token,
		path,
		devices: started.devices().unwrap_or(options.device_types),
		restore_token: started.restore_token().map(str::to_string),
	};

	// Registered before the state flips, with no await in between.
	let closed = remote
		.watch(SignalKey::session_closed(handle.path.clone()))
		.map_err(|err| Error::setup(SetupStep::Start, err))?;
	*cell.handle.lock() = Some(handle.clone());
	cell.enter(SessionState::Started);
	info!(
		target = "portal.session",
		path = %handle.path,
		devices = handle.devices.bits(),
		"session started"
	);

	let watched = Arc::clone(cell);
	tokio::spawn(async move {
		if let Ok(Ok(_)) = closed.await {
			if watched.close_started() {
				info!(target = "portal.session", "portal closed the session");
			}
		}
	});

	if cell.close_requested.load(Ordering::SeqCst) && cell.close_started() {
		if let Err(err) = send_close(client, &handle.path).await {
			warn!(target = "portal.session", error = %err, "failed to close session after setup");
		}
	}

	Ok(handle)
}
