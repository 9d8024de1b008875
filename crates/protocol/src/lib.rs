//! Wire types for the xdg-desktop-portal RemoteDesktop protocol.
//!
//! This crate contains the data shapes exchanged with the portal service
//! over the session bus: method calls, signals, response payloads and the
//! well-known names and object paths of the portal.
//!
//! # Design Philosophy
//!
//! Types in this crate are:
//! * Pure data: No behavior beyond construction, inspection and serde
//! * 1:1 with protocol: Match the `org.freedesktop.portal.*` D-Bus interfaces
//! * Transport-agnostic: No bus library appears in any signature
//!
//! Request correlation and session sequencing are built on top of these types
//! in `portal-runtime` and `pie-portal`.

pub mod devices;
pub mod message;
pub mod names;
pub mod response;
pub mod variant;

pub use devices::*;
pub use message::*;
pub use names::*;
pub use response::*;
pub use variant::*;
