//! Error types for portal sessions.

use std::fmt;

use portal_protocol::DeviceTypes;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Setup call that was in progress when a session failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupStep {
	Connect,
	CreateSession,
	SelectDevices,
	Start,
}

impl fmt::Display for SetupStep {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			Self::Connect => "connect",
			Self::CreateSession => "CreateSession",
			Self::SelectDevices => "SelectDevices",
			Self::Start => "Start",
		})
	}
}

/// Errors surfaced to callers of session operations.
///
/// Cloneable: a failed setup hands the same error to every waiter.
#[derive(Debug, Clone, Error)]
pub enum Error {
	#[error(transparent)]
	Runtime(#[from] portal_runtime::Error),

	/// A step of the session handshake failed; the session is `Failed` for good.
	#[error("portal session setup failed at {step}: {source}")]
	SetupSequence {
		step: SetupStep,
		#[source]
		source: portal_runtime::Error,
	},

	#[error("portal session is closed")]
	SessionClosed,

	#[error("portal did not grant {0:?} access")]
	DeviceNotGranted(DeviceTypes),

	#[error("current pointer position is unknown")]
	PositionUnknown,
}

impl Error {
	pub(crate) fn setup(step: SetupStep, source: portal_runtime::Error) -> Self {
		Self::SetupSequence { step, source }
	}

	/// Underlying runtime error, if any.
	pub fn runtime(&self) -> Option<&portal_runtime::Error> {
		match self {
			Self::Runtime(err) | Self::SetupSequence { source: err, .. } => Some(err),
			_ => None,
		}
	}

	/// `true` when the portal (or the user) refused a request.
	pub fn is_denied(&self) -> bool {
		self.runtime().is_some_and(portal_runtime::Error::is_denied)
	}

	/// `true` when the bus was unreachable or dropped.
	pub fn is_connection(&self) -> bool {
		self.runtime().is_some_and(portal_runtime::Error::is_connection)
	}

	/// Setup step that failed, for `SetupSequence` errors.
	pub fn failed_step(&self) -> Option<SetupStep> {
		match self {
			Self::SetupSequence { step, .. } => Some(*step),
			_ => None,
		}
	}
}
