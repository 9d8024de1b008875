//! Per-backend session configuration.
//!
//! Backends differ only in a few values (the parent-window identifier, which
//! devices they need, whether the grant should persist), so those are chosen
//! when the client is built instead of overriding client behavior.

use std::time::Duration;

use portal_protocol::{DeviceTypes, PersistMode};
use portal_runtime::DEFAULT_TOKEN_PREFIX;
use serde::{Deserialize, Serialize};

/// Options applied to the RemoteDesktop session handshake.
///
/// Deserializes from partial JSON; missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionOptions {
	/// Devices requested in `SelectDevices`.
	pub device_types: DeviceTypes,
	/// Parent window identifier passed to `Start` (`""`, `x11:XID` or `wayland:HANDLE`).
	pub parent_window: String,
	/// How long the portal should remember the grant.
	pub persist_mode: PersistMode,
	/// Token from an earlier persisted session, to skip the permission dialog.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub restore_token: Option<String>,
	/// Fail portal requests that get no response in time; `None` waits forever.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub request_timeout_ms: Option<u64>,
	/// Prefix of generated request and session tokens.
	pub token_prefix: String,
}

impl Default for SessionOptions {
	fn default() -> Self {
		Self {
			device_types: DeviceTypes::default(),
			parent_window: String::new(),
			persist_mode: PersistMode::default(),
			restore_token: None,
			request_timeout_ms: None,
			token_prefix: DEFAULT_TOKEN_PREFIX.to_string(),
		}
	}
}

impl SessionOptions {
	pub fn request_timeout(&self) -> Option<Duration> {
		self.request_timeout_ms.map(Duration::from_millis)
	}

	pub fn with_device_types(mut self, types: DeviceTypes) -> Self {
		self.device_types = types;
		self
	}

	pub fn with_parent_window(mut self, parent_window: impl Into<String>) -> Self {
		self.parent_window = parent_window.into();
		self
	}

	pub fn with_persist_mode(mut self, mode: PersistMode) -> Self {
		self.persist_mode = mode;
		self
	}

	pub fn with_restore_token(mut self, token: Option<String>) -> Self {
		self.restore_token = token;
		self
	}

	pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
		self.request_timeout_ms = timeout.map(|t| u64::try_from(t.as_millis()).unwrap_or(u64::MAX));
		self
	}

	pub fn with_token_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.token_prefix = prefix.into();
		self
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn partial_json_keeps_defaults() {
		let options: SessionOptions = serde_json::from_str(r#"{"parent_window": "wayland:abc"}"#).unwrap();
		assert_eq!(options.parent_window, "wayland:abc");
		assert_eq!(options.device_types, DeviceTypes::KEYBOARD | DeviceTypes::POINTER);
		assert_eq!(options.persist_mode, PersistMode::Transient);
		assert_eq!(options.request_timeout(), None);
		assert_eq!(options.token_prefix, "pie_portal");
	}

	#[test]
	fn full_json() {
		let options: SessionOptions = serde_json::from_str(
			r#"{
				"device_types": 2,
				"persist_mode": "permanent",
				"restore_token": "abc",
				"request_timeout_ms": 1500
			}"#,
		)
		.unwrap();
		assert_eq!(options.device_types, DeviceTypes::POINTER);
		assert_eq!(options.persist_mode, PersistMode::Permanent);
		assert_eq!(options.restore_token.as_deref(), Some("abc"));
		assert_eq!(options.request_timeout(), Some(Duration::from_millis(1500)));
	}

	#[test]
	fn builders_override_fields() {
		let options = SessionOptions::default()
			.with_parent_window("x11:1a")
			.with_request_timeout(Some(Duration::from_secs(2)));
		assert_eq!(options.parent_window, "x11:1a");
		assert_eq!(options.request_timeout_ms, Some(2000));
	}

	#[test]
	fn oversized_timeout_saturates() {
		let options = SessionOptions::default().with_request_timeout(Some(Duration::MAX));
		assert_eq!(options.request_timeout_ms, Some(u64::MAX));
	}
}
