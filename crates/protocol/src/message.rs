//! Method calls sent to the portal and signals received from it.

use serde::{Deserialize, Serialize};

use crate::devices::{DeviceTypes, KeyState, PersistMode, ScrollAxis};
use crate::names::{
	CLOSED_SIGNAL, PORTAL_BUS_NAME, PORTAL_OBJECT_PATH, REMOTE_DESKTOP_INTERFACE, REQUEST_INTERFACE, RESPONSE_SIGNAL, SESSION_INTERFACE,
};
use crate::variant::{Options, Variant};

/// Option key carrying the request token of a call.
pub const HANDLE_TOKEN: &str = "handle_token";

/// Option key carrying the session token of `CreateSession`.
pub const SESSION_HANDLE_TOKEN: &str = "session_handle_token";

/// Outbound method call.
///
/// ```json
/// {
///   "destination": "org.freedesktop.portal.Desktop",
///   "path": "/org/freedesktop/portal/desktop",
///   "interface": "org.freedesktop.portal.RemoteDesktop",
///   "member": "CreateSession",
///   "args": [{"type": "dict", "value": {"handle_token": {"type": "str", "value": "pie_portal_0_1a2b3c4d"}}}],
///   "no_reply": false
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodCall {
	pub destination: String,
	pub path: String,
	pub interface: String,
	pub member: String,
	pub args: Vec<Variant>,
	/// Sent with `NO_REPLY_EXPECTED`; the transport does not wait for a method return.
	#[serde(default)]
	pub no_reply: bool,
}

impl MethodCall {
	/// Call on the portal's main object.
	pub fn portal(interface: &str, member: &str, args: Vec<Variant>) -> Self {
		Self {
			destination: PORTAL_BUS_NAME.to_string(),
			path: PORTAL_OBJECT_PATH.to_string(),
			interface: interface.to_string(),
			member: member.to_string(),
			args,
			no_reply: false,
		}
	}

	/// `RemoteDesktop.CreateSession(a{sv} options)`
	pub fn create_session(request_token: &str, session_token: &str) -> Self {
		let mut options = Options::new();
		options.insert(HANDLE_TOKEN.into(), request_token.into());
		options.insert(SESSION_HANDLE_TOKEN.into(), session_token.into());
		Self::portal(REMOTE_DESKTOP_INTERFACE, "CreateSession", vec![Variant::Dict(options)])
	}

	/// `RemoteDesktop.SelectDevices(o session_handle, a{sv} options)`
	pub fn select_devices(
		session_path: &str,
		request_token: &str,
		types: DeviceTypes,
		persist_mode: PersistMode,
		restore_token: Option<&str>,
	) -> Self {
		let mut options = Options::new();
		options.insert(HANDLE_TOKEN.into(), request_token.into());
		options.insert("types".into(), types.bits().into());
		if persist_mode != PersistMode::Transient {
			options.insert("persist_mode".into(), persist_mode.as_u32().into());
		}
		if let Some(restore_token) = restore_token {
			options.insert("restore_token".into(), restore_token.into());
		}
		Self::portal(
			REMOTE_DESKTOP_INTERFACE,
			"SelectDevices",
			vec![Variant::ObjectPath(session_path.to_string()), Variant::Dict(options)],
		)
	}

	/// `RemoteDesktop.Start(o session_handle, s parent_window, a{sv} options)`
	pub fn start(session_path: &str, parent_window: &str, request_token: &str) -> Self {
		let mut options = Options::new();
		options.insert(HANDLE_TOKEN.into(), request_token.into());
		Self::portal(
			REMOTE_DESKTOP_INTERFACE,
			"Start",
			vec![
				Variant::ObjectPath(session_path.to_string()),
				parent_window.into(),
				Variant::Dict(options),
			],
		)
	}

	/// `RemoteDesktop.NotifyPointerMotion(o session_handle, a{sv} options, d dx, d dy)`
	pub fn notify_pointer_motion(session_path: &str, dx: f64, dy: f64) -> Self {
		Self::session_input(
			"NotifyPointerMotion",
			session_path,
			vec![Variant::F64(dx), Variant::F64(dy)],
		)
	}

	/// `RemoteDesktop.NotifyPointerButton(o session_handle, a{sv} options, i button, u state)`
	pub fn notify_pointer_button(session_path: &str, button: i32, state: KeyState) -> Self {
		Self::session_input(
			"NotifyPointerButton",
			session_path,
			vec![Variant::I32(button), Variant::U32(state.as_u32())],
		)
	}

	/// `RemoteDesktop.NotifyPointerAxisDiscrete(o session_handle, a{sv} options, u axis, i steps)`
	pub fn notify_pointer_axis_discrete(session_path: &str, axis: ScrollAxis, steps: i32) -> Self {
		Self::session_input(
			"NotifyPointerAxisDiscrete",
			session_path,
			vec![Variant::U32(axis.as_u32()), Variant::I32(steps)],
		)
	}

	/// `RemoteDesktop.NotifyKeyboardKeycode(o session_handle, a{sv} options, i keycode, u state)`
	pub fn notify_keyboard_keycode(session_path: &str, keycode: i32, state: KeyState) -> Self {
		Self::session_input(
			"NotifyKeyboardKeycode",
			session_path,
			vec![Variant::I32(keycode), Variant::U32(state.as_u32())],
		)
	}

	/// `Session.Close()` on the session object itself.
	pub fn close_session(session_path: &str) -> Self {
		Self {
			destination: PORTAL_BUS_NAME.to_string(),
			path: session_path.to_string(),
			interface: SESSION_INTERFACE.to_string(),
			member: "Close".to_string(),
			args: Vec::new(),
			no_reply: true,
		}
	}

	fn session_input(member: &str, session_path: &str, values: Vec<Variant>) -> Self {
		let mut args = vec![Variant::ObjectPath(session_path.to_string()), Variant::Dict(Options::new())];
		args.extend(values);
		let mut call = Self::portal(REMOTE_DESKTOP_INTERFACE, member, args);
		call.no_reply = true;
		call
	}

	/// Returns the `handle_token` option embedded in the call, if any.
	pub fn handle_token(&self) -> Option<&str> {
		self.args
			.iter()
			.filter_map(Variant::as_dict)
			.find_map(|options| options.get(HANDLE_TOKEN))
			.and_then(Variant::as_str)
	}

	/// Returns the `session_handle_token` option embedded in the call, if any.
	pub fn session_handle_token(&self) -> Option<&str> {
		self.args
			.iter()
			.filter_map(Variant::as_dict)
			.find_map(|options| options.get(SESSION_HANDLE_TOKEN))
			.and_then(Variant::as_str)
	}

	/// Session object path passed as the first argument of session-scoped calls.
	pub fn session_arg(&self) -> Option<&str> {
		match self.args.first() {
			Some(Variant::ObjectPath(path)) => Some(path),
			_ => None,
		}
	}
}

/// Routing key of a signal: the emitting object plus the signal's name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SignalKey {
	pub path: String,
	pub interface: String,
	pub member: String,
}

impl SignalKey {
	pub fn new(path: impl Into<String>, interface: &str, member: &str) -> Self {
		Self {
			path: path.into(),
			interface: interface.to_string(),
			member: member.to_string(),
		}
	}

	/// Key of the `Request::Response` signal emitted on `request_path`.
	pub fn response(request_path: impl Into<String>) -> Self {
		Self::new(request_path, REQUEST_INTERFACE, RESPONSE_SIGNAL)
	}

	/// Key of the `Session::Closed` signal emitted on `session_path`.
	pub fn session_closed(session_path: impl Into<String>) -> Self {
		Self::new(session_path, SESSION_INTERFACE, CLOSED_SIGNAL)
	}
}

/// Inbound signal from the portal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
	pub path: String,
	pub interface: String,
	pub member: String,
	pub args: Vec<Variant>,
}

impl Signal {
	/// `Request::Response(u status, a{sv} results)`
	pub fn response(request_path: impl Into<String>, status: u32, results: Options) -> Self {
		Self {
			path: request_path.into(),
			interface: REQUEST_INTERFACE.to_string(),
			member: RESPONSE_SIGNAL.to_string(),
			args: vec![Variant::U32(status), Variant::Dict(results)],
		}
	}

	/// `Session::Closed(a{sv} details)`
	pub fn session_closed(session_path: impl Into<String>) -> Self {
		Self {
			path: session_path.into(),
			interface: SESSION_INTERFACE.to_string(),
			member: CLOSED_SIGNAL.to_string(),
			args: vec![Variant::Dict(Options::new())],
		}
	}

	pub fn key(&self) -> SignalKey {
		SignalKey::new(self.path.clone(), &self.interface, &self.member)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn create_session_embeds_both_tokens() {
		let call = MethodCall::create_session("req_1", "sess_1");
		assert_eq!(call.member, "CreateSession");
		assert_eq!(call.interface, REMOTE_DESKTOP_INTERFACE);
		assert_eq!(call.handle_token(), Some("req_1"));
		assert_eq!(call.session_handle_token(), Some("sess_1"));
		assert!(!call.no_reply);
	}

	#[test]
	fn select_devices_omits_default_persistence() {
		let call = MethodCall::select_devices("/s", "req", DeviceTypes::POINTER, PersistMode::Transient, None);
		let options = call.args[1].as_dict().unwrap();
		assert_eq!(options.get("types"), Some(&Variant::U32(2)));
		assert!(!options.contains_key("persist_mode"));
		assert!(!options.contains_key("restore_token"));
		assert_eq!(call.session_arg(), Some("/s"));
	}

	#[test]
	fn select_devices_with_restore_token() {
		let call = MethodCall::select_devices("/s", "req", DeviceTypes::default(), PersistMode::Permanent, Some("abc"));
		let options = call.args[1].as_dict().unwrap();
		assert_eq!(options.get("persist_mode"), Some(&Variant::U32(2)));
		assert_eq!(options.get("restore_token"), Some(&Variant::Str("abc".into())));
	}

	#[test]
	fn pointer_motion_is_fire_and_forget() {
		let call = MethodCall::notify_pointer_motion("/s", 10.0, 20.0);
		assert!(call.no_reply);
		assert_eq!(call.handle_token(), None);
		assert_eq!(&call.args[2..], &[Variant::F64(10.0), Variant::F64(20.0)]);
	}

	#[test]
	fn close_targets_the_session_object() {
		let call = MethodCall::close_session("/org/freedesktop/portal/desktop/session/1_1/s");
		assert_eq!(call.path, "/org/freedesktop/portal/desktop/session/1_1/s");
		assert_eq!(call.interface, SESSION_INTERFACE);
	}

	#[test]
	fn signal_key_matches_constructor_key() {
		let signal = Signal::response("/r", 0, Options::new());
		assert_eq!(signal.key(), SignalKey::response("/r"));
		assert_ne!(signal.key(), SignalKey::session_closed("/r"));
	}
}
