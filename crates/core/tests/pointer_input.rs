//! Pointer and keyboard input on top of the session handshake.

mod support;

use std::sync::Arc;

use portal::{DeviceTypes, Error, KeyState, PointerMover, PointerTarget, ScrollAxis, SessionOptions, TrackedPointer};
use portal_protocol::{MethodCall, Variant};
use support::{SESSION_PATH, Script, scripted};

fn motions(sent: &[MethodCall]) -> Vec<(Variant, Variant)> {
	sent.iter()
		.filter(|call| call.member == "NotifyPointerMotion")
		.map(|call| (call.args[2].clone(), call.args[3].clone()))
		.collect()
}

#[tokio::test]
async fn input_before_setup_waits_for_the_session() {
	let harness = scripted(SessionOptions::default(), Script::default());
	let mover = PointerMover::new(harness.desktop.clone());

	let target = PointerTarget::Relative { dx: 10.0, dy: 20.0 };
	let (first, second) = tokio::join!(mover.set_pointer(target), mover.set_pointer(target));
	first.unwrap();
	second.unwrap();

	assert_eq!(
		harness.controller.sent_members(),
		vec![
			"CreateSession",
			"SelectDevices",
			"Start",
			"NotifyPointerMotion",
			"NotifyPointerMotion"
		]
	);

	let sent = harness.controller.take_sent();
	let motion = (Variant::F64(10.0), Variant::F64(20.0));
	assert_eq!(motions(&sent), vec![motion.clone(), motion]);
	assert!(
		sent.iter()
			.filter(|call| call.member == "NotifyPointerMotion")
			.all(|call| call.session_arg() == Some(SESSION_PATH) && call.no_reply)
	);
}

#[tokio::test]
async fn absolute_targets_become_deltas_from_the_tracked_position() {
	let harness = scripted(SessionOptions::default(), Script::default());
	let tracked = Arc::new(TrackedPointer::at(100.0, 100.0));
	let mover = PointerMover::new(harness.desktop.clone()).with_locator(tracked.clone());

	mover.set_pointer(PointerTarget::Absolute { x: 110.0, y: 80.0 }).await.unwrap();
	mover.set_pointer(PointerTarget::Absolute { x: 110.0, y: 80.0 }).await.unwrap();
	mover.set_pointer(PointerTarget::Relative { dx: 5.0, dy: 5.0 }).await.unwrap();

	assert_eq!(
		motions(&harness.controller.take_sent()),
		vec![
			(Variant::F64(10.0), Variant::F64(-20.0)),
			(Variant::F64(0.0), Variant::F64(0.0)),
			(Variant::F64(5.0), Variant::F64(5.0)),
		]
	);
	assert_eq!(portal::PointerLocator::position(tracked.as_ref()), Some((115.0, 85.0)));
}

#[tokio::test]
async fn concurrent_absolute_moves_do_not_overshoot() {
	let harness = scripted(SessionOptions::default(), Script::default());
	let tracked = Arc::new(TrackedPointer::at(0.0, 0.0));
	let mover = PointerMover::new(harness.desktop.clone()).with_locator(tracked.clone());
	let other = mover.clone();

	let target = PointerTarget::Absolute { x: 10.0, y: 20.0 };
	let (first, second) = tokio::join!(mover.set_pointer(target), other.set_pointer(target));
	first.unwrap();
	second.unwrap();

	let sent = motions(&harness.controller.take_sent());
	assert_eq!(
		sent,
		vec![
			(Variant::F64(10.0), Variant::F64(20.0)),
			(Variant::F64(0.0), Variant::F64(0.0)),
		]
	);
	let end = sent.iter().fold((0.0_f64, 0.0_f64), |(x, y), motion| match motion {
		(Variant::F64(dx), Variant::F64(dy)) => (x + *dx, y + *dy),
		_ => (x, y),
	});
	assert_eq!(end, (10.0, 20.0));
	assert_eq!(portal::PointerLocator::position(tracked.as_ref()), Some((10.0, 20.0)));
}

#[tokio::test]
async fn concurrent_relative_moves_keep_tracked_position() {
	let harness = scripted(SessionOptions::default(), Script::default());
	let tracked = Arc::new(TrackedPointer::at(5.0, 5.0));
	let mover = PointerMover::new(harness.desktop.clone()).with_locator(tracked.clone());

	let step = PointerTarget::Relative { dx: 1.0, dy: 2.0 };
	let (a, b, c) = tokio::join!(mover.set_pointer(step), mover.set_pointer(step), mover.set_pointer(step));
	a.unwrap();
	b.unwrap();
	c.unwrap();

	assert_eq!(motions(&harness.controller.take_sent()).len(), 3);
	assert_eq!(portal::PointerLocator::position(tracked.as_ref()), Some((8.0, 11.0)));
}

#[tokio::test]
async fn absolute_target_without_position_sends_nothing() {
	let harness = scripted(SessionOptions::default(), Script::default());
	let mover = PointerMover::new(harness.desktop.clone());

	let err = mover.set_pointer(PointerTarget::Absolute { x: 1.0, y: 1.0 }).await.unwrap_err();
	assert!(matches!(err, Error::PositionUnknown));

	let untracked = PointerMover::new(harness.desktop.clone()).with_locator(Arc::new(TrackedPointer::new()));
	let err = untracked
		.set_pointer(PointerTarget::Absolute { x: 1.0, y: 1.0 })
		.await
		.unwrap_err();
	assert!(matches!(err, Error::PositionUnknown));
	assert!(harness.controller.sent_members().is_empty());
}

#[tokio::test]
async fn buttons_scroll_and_keys_map_to_notify_calls() {
	let harness = scripted(SessionOptions::default(), Script::default());
	let desktop = &harness.desktop;

	desktop.pointer_button(0x111, KeyState::Pressed).await.unwrap();
	desktop.scroll(ScrollAxis::Horizontal, 3).await.unwrap();
	desktop.key(30, KeyState::Released).await.unwrap();

	let sent: Vec<_> = harness
		.controller
		.take_sent()
		.into_iter()
		.filter(|call| call.member.starts_with("Notify"))
		.map(|call| (call.member, call.args[2].clone(), call.args[3].clone()))
		.collect();
	assert_eq!(
		sent,
		vec![
			("NotifyPointerButton".to_string(), Variant::I32(0x111), Variant::U32(1)),
			("NotifyPointerAxisDiscrete".to_string(), Variant::U32(1), Variant::I32(3)),
			("NotifyKeyboardKeycode".to_string(), Variant::I32(30), Variant::U32(0)),
		]
	);
}

#[tokio::test]
async fn pointer_input_requires_pointer_grant() {
	let harness = scripted(
		SessionOptions::default(),
		Script {
			devices: DeviceTypes::KEYBOARD.bits(),
			..Script::default()
		},
	);

	let err = harness.desktop.click(None).await.unwrap_err();
	assert!(matches!(err, Error::DeviceNotGranted(types) if types == DeviceTypes::POINTER));
	harness.desktop.tap_key(57).await.unwrap();

	let members = harness.controller.sent_members();
	assert_eq!(members.iter().filter(|m| *m == "NotifyKeyboardKeycode").count(), 2);
	assert!(!members.iter().any(|m| m.starts_with("NotifyPointer")));
}

#[tokio::test]
async fn failed_send_surfaces_as_transport_error() {
	let harness = scripted(SessionOptions::default(), Script::default());
	harness.desktop.ensure_session().await.unwrap();

	harness.controller.fail_sends("broken pipe");
	let err = harness.desktop.move_pointer(1.0, 1.0).await.unwrap_err();
	assert!(matches!(err, Error::Runtime(portal_runtime::Error::Transport(_))));
}
