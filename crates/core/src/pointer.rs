//! "Set pointer position" on top of relative portal motion.
//!
//! The portal only moves the pointer by deltas and never reports where it
//! is. Absolute targets therefore need a [`PointerLocator`] that knows the
//! current position.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Mutex as AsyncMutex;

use crate::error::{Error, Result};
use crate::remote_desktop::RemoteDesktop;

/// Where the pointer should go.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerTarget {
	Absolute { x: f64, y: f64 },
	Relative { dx: f64, dy: f64 },
}

/// Source of the current pointer position.
pub trait PointerLocator: Send + Sync {
	/// Current position in logical pixels, if known.
	fn position(&self) -> Option<(f64, f64)>;

	/// Called after the pointer was moved to `(x, y)`.
	fn moved_to(&self, x: f64, y: f64);
}

/// Locator that remembers the last position it was told about.
#[derive(Debug, Default)]
pub struct TrackedPointer {
	position: Mutex<Option<(f64, f64)>>,
}

impl TrackedPointer {
	pub fn new() -> Self {
		Self::default()
	}

	/// Locator starting at a known position.
	pub fn at(x: f64, y: f64) -> Self {
		Self {
			position: Mutex::new(Some((x, y))),
		}
	}
}

impl PointerLocator for TrackedPointer {
	fn position(&self) -> Option<(f64, f64)> {
		*self.position.lock()
	}

	fn moved_to(&self, x: f64, y: f64) {
		*self.position.lock() = Some((x, y));
	}
}

/// Moves the pointer to a [`PointerTarget`].
///
/// Moves through one mover (and its clones) run one at a time, so each move
/// starts from the position the previous one left.
#[derive(Clone)]
pub struct PointerMover {
	desktop: RemoteDesktop,
	locator: Option<Arc<dyn PointerLocator>>,
	moving: Arc<AsyncMutex<()>>,
}

impl PointerMover {
	pub fn new(desktop: RemoteDesktop) -> Self {
		Self {
			desktop,
			locator: None,
			moving: Arc::new(AsyncMutex::new(())),
		}
	}

	pub fn with_locator(mut self, locator: Arc<dyn PointerLocator>) -> Self {
		self.locator = Some(locator);
		self
	}

	pub fn desktop(&self) -> &RemoteDesktop {
		&self.desktop
	}

	pub async fn set_pointer(&self, target: PointerTarget) -> Result<()> {
		// Held from the position read until the locator learns the new one.
		let _moving = self.moving.lock().await;

		let (dx, dy, landed) = match target {
			PointerTarget::Relative { dx, dy } => {
				let landed = self.position().map(|(x, y)| (x + dx, y + dy));
				(dx, dy, landed)
			}
			PointerTarget::Absolute { x, y } => {
				let (cx, cy) = self.position().ok_or(Error::PositionUnknown)?;
				(x - cx, y - cy, Some((x, y)))
			}
		};

		self.desktop.move_pointer(dx, dy).await?;

		if let (Some(locator), Some((x, y))) = (&self.locator, landed) {
			locator.moved_to(x, y);
		}
		Ok(())
	}

	fn position(&self) -> Option<(f64, f64)> {
		self.locator.as_ref().and_then(|locator| locator.position())
	}
}
