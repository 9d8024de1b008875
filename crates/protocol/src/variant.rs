//! Subset of D-Bus values used by the portal interfaces.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A vardict (`a{sv}`), the options/results map of every portal method.
pub type Options = BTreeMap<String, Variant>;

/// A single D-Bus value.
///
/// Only the types that appear in RemoteDesktop calls and responses are
/// modelled; transports drop anything else when decoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Variant {
	Bool(bool),
	U32(u32),
	I32(i32),
	U64(u64),
	F64(f64),
	Str(String),
	ObjectPath(String),
	Dict(Options),
}

impl Variant {
	pub fn as_u32(&self) -> Option<u32> {
		match self {
			Self::U32(value) => Some(*value),
			_ => None,
		}
	}

	/// Returns the string content of `Str` and `ObjectPath` values.
	pub fn as_str(&self) -> Option<&str> {
		match self {
			Self::Str(value) | Self::ObjectPath(value) => Some(value),
			_ => None,
		}
	}

	pub fn as_dict(&self) -> Option<&Options> {
		match self {
			Self::Dict(value) => Some(value),
			_ => None,
		}
	}
}

impl From<bool> for Variant {
	fn from(value: bool) -> Self {
		Self::Bool(value)
	}
}

impl From<u32> for Variant {
	fn from(value: u32) -> Self {
		Self::U32(value)
	}
}

impl From<i32> for Variant {
	fn from(value: i32) -> Self {
		Self::I32(value)
	}
}

impl From<f64> for Variant {
	fn from(value: f64) -> Self {
		Self::F64(value)
	}
}

impl From<&str> for Variant {
	fn from(value: &str) -> Self {
		Self::Str(value.to_string())
	}
}

impl From<String> for Variant {
	fn from(value: String) -> Self {
		Self::Str(value)
	}
}

impl From<Options> for Variant {
	fn from(value: Options) -> Self {
		Self::Dict(value)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn object_path_reads_as_str() {
		let path = Variant::ObjectPath("/org/freedesktop/portal/desktop/session/1_42/t".into());
		assert_eq!(path.as_str(), Some("/org/freedesktop/portal/desktop/session/1_42/t"));
		assert_eq!(path.as_u32(), None);
	}

	#[test]
	fn serde_uses_tagged_representation() {
		let json = serde_json::to_value(Variant::U32(3)).unwrap();
		assert_eq!(json, serde_json::json!({"type": "u32", "value": 3}));

		let parsed: Variant = serde_json::from_value(serde_json::json!({"type": "str", "value": "x"})).unwrap();
		assert_eq!(parsed, Variant::Str("x".into()));
	}
}
