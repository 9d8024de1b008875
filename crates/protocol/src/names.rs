//! Well-known bus names, object paths and interfaces of the portal.
//!
//! See: <https://flatpak.github.io/xdg-desktop-portal/docs/doc-org.freedesktop.portal.Request.html>

/// Bus name owned by the portal frontend.
pub const PORTAL_BUS_NAME: &str = "org.freedesktop.portal.Desktop";

/// Object path exporting every portal interface.
pub const PORTAL_OBJECT_PATH: &str = "/org/freedesktop/portal/desktop";

pub const REMOTE_DESKTOP_INTERFACE: &str = "org.freedesktop.portal.RemoteDesktop";
pub const REQUEST_INTERFACE: &str = "org.freedesktop.portal.Request";
pub const SESSION_INTERFACE: &str = "org.freedesktop.portal.Session";

/// Signal carrying `(u32 status, a{sv} results)` on a request object.
pub const RESPONSE_SIGNAL: &str = "Response";

/// Signal emitted on a session object when the service ends the session.
pub const CLOSED_SIGNAL: &str = "Closed";

/// Converts a unique bus name into the sender segment of portal object paths.
///
/// `:1.42` becomes `1_42`.
pub fn sender_segment(unique_name: &str) -> String {
	unique_name.trim_start_matches(':').replace('.', "_")
}

/// Object path on which the portal emits the `Response` for `token`.
///
/// The path is fully determined by the caller's unique name and the
/// `handle_token` it passed, so it can be subscribed to before the call is sent.
pub fn request_path(unique_name: &str, token: &str) -> String {
	format!("{PORTAL_OBJECT_PATH}/request/{}/{token}", sender_segment(unique_name))
}

/// Object path the portal assigns to a session created with `token`.
pub fn session_path(unique_name: &str, token: &str) -> String {
	format!("{PORTAL_OBJECT_PATH}/session/{}/{token}", sender_segment(unique_name))
}

/// Returns `true` when `element` is a valid D-Bus object path element.
pub fn is_valid_path_element(element: &str) -> bool {
	!element.is_empty() && element.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}
