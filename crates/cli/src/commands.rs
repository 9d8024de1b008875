use std::sync::Arc;

use anyhow::{Context, Result};
use portal::{PointerMover, PointerTarget, RemoteDesktop, ScrollAxis, SessionOptions, TrackedPointer};
use tracing::{info, warn};

use crate::cli::{Cli, Commands, ConfigAction};
use crate::config;

/// One input action performed on a session.
#[derive(Debug, Clone, PartialEq)]
pub enum InputAction {
	MoveBy { dx: f64, dy: f64 },
	MoveTo { x: f64, y: f64, from: (f64, f64) },
	Click { button: Option<i32> },
	Scroll { steps: i32, axis: ScrollAxis },
	Key { code: i32 },
}

pub async fn dispatch(cli: Cli) -> Result<()> {
	let options = config::resolve(&cli)?;

	let action = match cli.command {
		Commands::Config {
			action: ConfigAction::Show,
		} => {
			println!("{}", serde_json::to_string_pretty(&options)?);
			return Ok(());
		}
		Commands::MoveBy { dx, dy } => InputAction::MoveBy { dx, dy },
		Commands::MoveTo { x, y, from } => InputAction::MoveTo {
			x,
			y,
			from: (from[0], from[1]),
		},
		Commands::Click { button } => InputAction::Click { button },
		Commands::Scroll { steps, horizontal } => InputAction::Scroll {
			steps,
			axis: if horizontal { ScrollAxis::Horizontal } else { ScrollAxis::Vertical },
		},
		Commands::Key { code } => InputAction::Key { code },
	};

	let desktop = session_bus(options)?;
	let result = perform(&desktop, &action).await;

	if result.is_ok() {
		if let Some(token) = desktop.restore_token() {
			println!("restore_token: {token}");
		}
	}
	if let Err(err) = desktop.close().await {
		warn!(target = "portal.cli", error = %err, "failed to close portal session");
	}
	result
}

/// Runs `action` through `desktop`, setting up the session first if needed.
pub async fn perform(desktop: &RemoteDesktop, action: &InputAction) -> Result<()> {
	info!(target = "portal.cli", ?action, "performing input");
	match *action {
		InputAction::MoveBy { dx, dy } => PointerMover::new(desktop.clone())
			.set_pointer(PointerTarget::Relative { dx, dy })
			.await
			.context("pointer motion failed"),
		InputAction::MoveTo { x, y, from: (cx, cy) } => PointerMover::new(desktop.clone())
			.with_locator(Arc::new(TrackedPointer::at(cx, cy)))
			.set_pointer(PointerTarget::Absolute { x, y })
			.await
			.context("pointer motion failed"),
		InputAction::Click { button } => desktop.click(button).await.context("click failed"),
		InputAction::Scroll { steps, axis } => desktop.scroll(axis, steps).await.context("scroll failed"),
		InputAction::Key { code } => desktop.tap_key(code).await.context("key press failed"),
	}
}

#[cfg(feature = "dbus")]
fn session_bus(options: SessionOptions) -> Result<RemoteDesktop> {
	Ok(RemoteDesktop::session_bus(options))
}

#[cfg(not(feature = "dbus"))]
fn session_bus(_options: SessionOptions) -> Result<RemoteDesktop> {
	anyhow::bail!("pie-portal was built without the `dbus` feature")
}

#[cfg(test)]
mod tests {
	use super::*;
	use portal::transport::{FakeConnector, FakeTransportBuilder, FakeTransportController};
	use portal_protocol::{Options, Signal, Variant, request_path};

	fn fake_desktop(devices: u32) -> (RemoteDesktop, FakeTransportController) {
		let (parts, controller) = FakeTransportBuilder::new()
			.responder(move |call, unique_name| {
				let token = call.handle_token()?;
				let mut results = Options::new();
				match call.member.as_str() {
					"CreateSession" => {
						results.insert("session_handle".into(), Variant::ObjectPath("/session/cli".into()));
					}
					"Start" => {
						results.insert("devices".into(), Variant::U32(devices));
					}
					_ => {}
				}
				Some(vec![Signal::response(request_path(unique_name, token), 0, results)])
			})
			.build();
		let desktop = RemoteDesktop::new(Arc::new(FakeConnector::new(parts)), SessionOptions::default());
		(desktop, controller)
	}

	#[tokio::test]
	async fn move_to_sends_offset_from_given_position() {
		let (desktop, controller) = fake_desktop(3);
		perform(
			&desktop,
			&InputAction::MoveTo {
				x: 50.0,
				y: 40.0,
				from: (20.0, 60.0),
			},
		)
		.await
		.unwrap();

		let motion = controller
			.take_sent()
			.into_iter()
			.find(|call| call.member == "NotifyPointerMotion")
			.unwrap();
		assert_eq!(motion.args[2], Variant::F64(30.0));
		assert_eq!(motion.args[3], Variant::F64(-20.0));
	}

	#[tokio::test]
	async fn errors_carry_context() {
		let (desktop, _controller) = fake_desktop(2);
		let err = perform(&desktop, &InputAction::Key { code: 30 }).await.unwrap_err();
		assert_eq!(err.to_string(), "key press failed");
		assert!(format!("{err:#}").contains("did not grant"));
	}
}
