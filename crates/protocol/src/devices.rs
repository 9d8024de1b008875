//! Enumerations and bitmasks defined by the RemoteDesktop interface.

use bitflags::bitflags;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

bitflags! {
	/// Input device types a session may control (`types` / `devices`).
	#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
	pub struct DeviceTypes: u32 {
		const KEYBOARD = 1;
		const POINTER = 2;
		const TOUCHSCREEN = 4;
	}
}

impl Default for DeviceTypes {
	fn default() -> Self {
		Self::KEYBOARD | Self::POINTER
	}
}

// Serialized as the raw wire bitmask; unknown bits are dropped on input.
impl Serialize for DeviceTypes {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_u32(self.bits())
	}
}

impl<'de> Deserialize<'de> for DeviceTypes {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		u32::deserialize(deserializer).map(Self::from_bits_truncate)
	}
}

/// How long the portal should remember a granted permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistMode {
	/// Forget the grant when the session ends.
	#[default]
	Transient,
	/// Remember while the application is running.
	Application,
	/// Remember until explicitly revoked.
	Permanent,
}

impl PersistMode {
	pub fn as_u32(self) -> u32 {
		match self {
			Self::Transient => 0,
			Self::Application => 1,
			Self::Permanent => 2,
		}
	}
}

/// Pressed/released state shared by pointer buttons and keyboard keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyState {
	Released,
	Pressed,
}

impl KeyState {
	pub fn as_u32(self) -> u32 {
		match self {
			Self::Released => 0,
			Self::Pressed => 1,
		}
	}
}

/// Axis for discrete scroll steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrollAxis {
	Vertical,
	Horizontal,
}

impl ScrollAxis {
	pub fn as_u32(self) -> u32 {
		match self {
			Self::Vertical => 0,
			Self::Horizontal => 1,
		}
	}
}

/// Linux evdev code of the primary pointer button (`BTN_LEFT`).
pub const BTN_LEFT: i32 = 0x110;
