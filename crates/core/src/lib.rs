//! RemoteDesktop portal client.
//!
//! Injects pointer and keyboard input on Wayland desktops through
//! `org.freedesktop.portal.RemoteDesktop`. A [`RemoteDesktop`] lazily opens
//! one bus connection, runs the session handshake once, then forwards input
//! calls on the started session.
//!
//! ```ignore
//! let desktop = RemoteDesktop::session_bus(SessionOptions::default());
//! desktop.move_pointer(10.0, 20.0).await?;
//! desktop.click(None).await?;
//! ```

pub mod client;
pub mod error;
pub mod options;
pub mod pointer;
pub mod remote_desktop;
pub mod session;

pub use client::{Interface, PortalClient};
pub use error::{Error, Result, SetupStep};
pub use options::SessionOptions;
pub use pointer::{PointerLocator, PointerMover, PointerTarget, TrackedPointer};
pub use portal_protocol::{BTN_LEFT, DeviceTypes, KeyState, PersistMode, ScrollAxis};
pub use remote_desktop::RemoteDesktop;
pub use session::{SessionHandle, SessionMachine, SessionState};

/// Transports and test doubles re-exported for callers wiring their own bus.
pub mod transport {
	pub use portal_runtime::fake_transport::{FakeConnector, FakeTransportBuilder, FakeTransportController};
	pub use portal_runtime::{Connector, TransportParts};
	#[cfg(feature = "dbus")]
	pub use portal_runtime::DbusConnector;
}
