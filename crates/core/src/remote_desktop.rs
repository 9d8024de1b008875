//! RemoteDesktop portal: input injection through a started session.

use std::sync::Arc;

use portal_protocol::{BTN_LEFT, DeviceTypes, KeyState, MethodCall, REMOTE_DESKTOP_INTERFACE, ScrollAxis};
use portal_runtime::Connector;
use tracing::{debug, trace};

use crate::client::PortalClient;
use crate::error::{Error, Result};
use crate::options::SessionOptions;
use crate::session::{SessionHandle, SessionMachine, SessionState};

/// RemoteDesktop client.
///
/// Cheap to clone; clones share one connection and one session. Every input
/// operation waits for the session handshake, so callers may fire input
/// before setup has finished.
#[derive(Clone)]
pub struct RemoteDesktop {
	inner: Arc<Inner>,
}

struct Inner {
	client: Arc<PortalClient>,
	session: SessionMachine,
}

impl RemoteDesktop {
	pub fn new(connector: Arc<dyn Connector>, options: SessionOptions) -> Self {
		let client = Arc::new(PortalClient::new(connector, options));
		Self {
			inner: Arc::new(Inner {
				session: SessionMachine::new(Arc::clone(&client)),
				client,
			}),
		}
	}

	/// Client on the user's session bus.
	#[cfg(feature = "dbus")]
	pub fn session_bus(options: SessionOptions) -> Self {
		Self::new(Arc::new(portal_runtime::DbusConnector::new()), options)
	}

	pub fn client(&self) -> &Arc<PortalClient> {
		&self.inner.client
	}

	pub fn state(&self) -> SessionState {
		self.inner.session.state()
	}

	/// Runs the session handshake if it has not run yet.
	pub async fn ensure_session(&self) -> Result<SessionHandle> {
		self.inner.session.ensure_session().await
	}

	/// Restore token handed out by `Start`, when persistence was requested.
	pub fn restore_token(&self) -> Option<String> {
		self.inner.session.handle().and_then(|handle| handle.restore_token)
	}

	/// Moves the pointer by `(dx, dy)` logical pixels.
	pub async fn move_pointer(&self, dx: f64, dy: f64) -> Result<()> {
		trace!(target = "portal.session", dx, dy, "pointer motion");
		self.notify(DeviceTypes::POINTER, |path| MethodCall::notify_pointer_motion(path, dx, dy))
			.await
	}

	/// Presses or releases an evdev button code (`BTN_LEFT` is 0x110).
	pub async fn pointer_button(&self, button: i32, state: KeyState) -> Result<()> {
		self.notify(DeviceTypes::POINTER, |path| {
			MethodCall::notify_pointer_button(path, button, state)
		})
		.await
	}

	/// Press and release of `button`; left button when `None`.
	pub async fn click(&self, button: Option<i32>) -> Result<()> {
		let button = button.unwrap_or(BTN_LEFT);
		self.pointer_button(button, KeyState::Pressed).await?;
		self.pointer_button(button, KeyState::Released).await
	}

	/// Discrete scroll by `steps` notches.
	pub async fn scroll(&self, axis: ScrollAxis, steps: i32) -> Result<()> {
		self.notify(DeviceTypes::POINTER, |path| {
			MethodCall::notify_pointer_axis_discrete(path, axis, steps)
		})
		.await
	}

	/// Presses or releases an evdev keycode.
	pub async fn key(&self, keycode: i32, state: KeyState) -> Result<()> {
		self.notify(DeviceTypes::KEYBOARD, |path| {
			MethodCall::notify_keyboard_keycode(path, keycode, state)
		})
		.await
	}

	pub async fn tap_key(&self, keycode: i32) -> Result<()> {
		self.key(keycode, KeyState::Pressed).await?;
		self.key(keycode, KeyState::Released).await
	}

	/// Closes the session. Input after this fails with [`Error::SessionClosed`].
	pub async fn close(&self) -> Result<()> {
		self.inner.session.close().await
	}

	async fn notify<F>(&self, required: DeviceTypes, build: F) -> Result<()>
	where
		F: FnOnce(&str) -> MethodCall,
	{
		let handle = self.ensure_session().await?;
		if !handle.devices.contains(required) {
			return Err(Error::DeviceNotGranted(required));
		}

		let call = build(&handle.path);
		debug!(target = "portal.session", member = %call.member, "sending input");
		let remote = self.inner.client.interface(REMOTE_DESKTOP_INTERFACE).await?;
		remote.notify(call).await?;
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use portal_protocol::{Options, Signal, Variant, request_path};
	use portal_runtime::fake_transport::{FakeConnector, FakeTransportBuilder, FakeTransportController};

	/// Portal that grants `devices` and answers every request at once.
	fn granting(devices: u32) -> (RemoteDesktop, FakeTransportController) {
		let (parts, controller) = FakeTransportBuilder::new()
			.responder(move |call, unique_name| {
				let token = call.handle_token()?;
				let mut results = Options::new();
				match call.member.as_str() {
					"CreateSession" => {
						results.insert("session_handle".into(), Variant::ObjectPath("/session/rd".into()));
					}
					"Start" => {
						results.insert("devices".into(), Variant::U32(devices));
					}
					_ => {}
				}
				Some(vec![Signal::response(request_path(unique_name, token), 0, results)])
			})
			.build();
		let desktop = RemoteDesktop::new(Arc::new(FakeConnector::new(parts)), SessionOptions::default());
		(desktop, controller)
	}

	#[tokio::test]
	async fn click_presses_and_releases_left_button() {
		let (desktop, controller) = granting(3);
		desktop.click(None).await.unwrap();

		let sent = controller.take_sent();
		let buttons: Vec<_> = sent
			.iter()
			.filter(|call| call.member == "NotifyPointerButton")
			.map(|call| (call.args[2].clone(), call.args[3].clone()))
			.collect();
		assert_eq!(
			buttons,
			vec![
				(Variant::I32(0x110), Variant::U32(1)),
				(Variant::I32(0x110), Variant::U32(0)),
			]
		);
		assert!(sent.iter().filter(|call| call.member.starts_with("Notify")).all(|call| call.no_reply));
	}

	#[tokio::test]
	async fn keyboard_input_requires_keyboard_grant() {
		let (desktop, controller) = granting(DeviceTypes::POINTER.bits());

		let err = desktop.tap_key(30).await.unwrap_err();
		assert!(matches!(err, Error::DeviceNotGranted(types) if types == DeviceTypes::KEYBOARD));

		desktop.scroll(ScrollAxis::Vertical, -2).await.unwrap();
		let members = controller.sent_members();
		assert_eq!(members.last().map(String::as_str), Some("NotifyPointerAxisDiscrete"));
		assert!(!members.iter().any(|member| member == "NotifyKeyboardKeycode"));
	}

	#[tokio::test]
	async fn clones_share_one_session() {
		let (desktop, controller) = granting(3);
		let other = desktop.clone();

		let (a, b) = tokio::join!(desktop.move_pointer(1.0, 0.0), other.tap_key(28));
		a.unwrap();
		b.unwrap();

		let creates = controller.sent_members().iter().filter(|m| *m == "CreateSession").count();
		assert_eq!(creates, 1);
		assert_eq!(desktop.state(), SessionState::Started);
	}
}
