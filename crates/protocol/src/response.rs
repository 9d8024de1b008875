//! Payload of the `org.freedesktop.portal.Request::Response` signal.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::devices::DeviceTypes;
use crate::message::Signal;
use crate::variant::{Options, Variant};

/// Status code of a portal response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "u32", into = "u32")]
pub enum ResponseStatus {
	/// The request was carried out.
	Success,
	/// The user cancelled the interaction.
	Cancelled,
	/// The interaction ended some other way (denied, error, ...).
	Other(u32),
}

impl From<u32> for ResponseStatus {
	fn from(code: u32) -> Self {
		match code {
			0 => Self::Success,
			1 => Self::Cancelled,
			other => Self::Other(other),
		}
	}
}

impl From<ResponseStatus> for u32 {
	fn from(status: ResponseStatus) -> Self {
		status.code()
	}
}

impl ResponseStatus {
	pub fn code(self) -> u32 {
		match self {
			Self::Success => 0,
			Self::Cancelled => 1,
			Self::Other(code) => code,
		}
	}

	pub fn is_success(self) -> bool {
		matches!(self, Self::Success)
	}
}

impl fmt::Display for ResponseStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Success => write!(f, "success (0)"),
			Self::Cancelled => write!(f, "cancelled by user (1)"),
			Self::Other(code) => write!(f, "ended with status {code}"),
		}
	}
}

/// Decoded `(u32 status, a{sv} results)` body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
	pub status: ResponseStatus,
	pub results: Options,
}

impl Response {
	/// Decodes the body of a `Response` signal.
	///
	/// Returns `None` when the arguments do not have the `(u, a{sv})` shape.
	pub fn from_signal(signal: &Signal) -> Option<Self> {
		match signal.args.as_slice() {
			[Variant::U32(status), Variant::Dict(results)] => Some(Self {
				status: ResponseStatus::from(*status),
				results: results.clone(),
			}),
			[Variant::U32(status)] => Some(Self {
				status: ResponseStatus::from(*status),
				results: Options::new(),
			}),
			_ => None,
		}
	}

	/// `session_handle` result of `CreateSession`.
	///
	/// Older portal versions send it as a string rather than an object path.
	pub fn session_handle(&self) -> Option<&str> {
		self.results.get("session_handle").and_then(Variant::as_str)
	}

	/// `devices` result of `Start`.
	pub fn devices(&self) -> Option<DeviceTypes> {
		self.results
			.get("devices")
			.and_then(Variant::as_u32)
			.map(DeviceTypes::from_bits_truncate)
	}

	/// `restore_token` result of `Start` when persistence was requested.
	pub fn restore_token(&self) -> Option<&str> {
		self.results.get("restore_token").and_then(Variant::as_str)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn status_codes_round_trip_through_u32() {
		assert_eq!(ResponseStatus::from(0), ResponseStatus::Success);
		assert_eq!(ResponseStatus::from(1), ResponseStatus::Cancelled);
		assert_eq!(ResponseStatus::from(2).code(), 2);
	}

	#[test]
	fn decodes_create_session_response() {
		let mut results = Options::new();
		results.insert("session_handle".into(), Variant::Str("/session/1_1/s".into()));
		let signal = Signal::response("/r", 0, results);

		let response = Response::from_signal(&signal).unwrap();
		assert!(response.status.is_success());
		assert_eq!(response.session_handle(), Some("/session/1_1/s"));
	}

	#[test]
	fn decodes_granted_devices() {
		let mut results = Options::new();
		results.insert("devices".into(), Variant::U32(2));
		results.insert("restore_token".into(), Variant::Str("tok".into()));
		let response = Response::from_signal(&Signal::response("/r", 0, results)).unwrap();
		assert_eq!(response.devices(), Some(DeviceTypes::POINTER));
		assert_eq!(response.restore_token(), Some("tok"));
	}

	#[test]
	fn rejects_malformed_body() {
		let mut signal = Signal::response("/r", 0, Options::new());
		signal.args = vec![Variant::Str("nope".into())];
		assert!(Response::from_signal(&signal).is_none());
	}
}
