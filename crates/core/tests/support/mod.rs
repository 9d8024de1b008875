#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use portal::transport::{FakeConnector, FakeTransportBuilder, FakeTransportController};
use portal::{RemoteDesktop, SessionOptions, SessionState};
use portal_protocol::{Options, Signal, Variant, request_path};

pub const SESSION_PATH: &str = "/org/freedesktop/portal/desktop/session/1_42/pie";

pub fn init_tracing() {
	let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// What the scripted portal answers with.
#[derive(Clone)]
pub struct Script {
	pub devices: u32,
	pub restore_token: Option<String>,
	/// Member whose request gets a non-zero status.
	pub deny: Option<(&'static str, u32)>,
}

impl Default for Script {
	fn default() -> Self {
		Self {
			devices: 3,
			restore_token: None,
			deny: None,
		}
	}
}

pub struct Harness {
	pub desktop: RemoteDesktop,
	pub connector: Arc<FakeConnector>,
	pub controller: FakeTransportController,
}

/// Portal that answers every request as soon as it is sent.
pub fn scripted(options: SessionOptions, script: Script) -> Harness {
	init_tracing();
	let (parts, controller) = FakeTransportBuilder::new()
		.responder(move |call, unique_name| {
			let token = call.handle_token()?;
			let path = request_path(unique_name, token);
			if let Some((member, status)) = script.deny {
				if call.member == member {
					return Some(vec![Signal::response(path, status, Options::new())]);
				}
			}

			let mut results = Options::new();
			match call.member.as_str() {
				"CreateSession" => {
					results.insert("session_handle".into(), Variant::ObjectPath(SESSION_PATH.into()));
				}
				"Start" => {
					results.insert("devices".into(), Variant::U32(script.devices));
					if let Some(restore) = &script.restore_token {
						results.insert("restore_token".into(), Variant::Str(restore.clone()));
					}
				}
				_ => {}
			}
			Some(vec![Signal::response(path, 0, results)])
		})
		.build();
	harness(parts_connector(parts), options, controller)
}

/// Portal that answers only when the test says so.
pub fn manual(options: SessionOptions) -> Harness {
	init_tracing();
	let (parts, controller) = FakeTransportBuilder::new().build();
	harness(parts_connector(parts), options, controller)
}

fn parts_connector(parts: portal::transport::TransportParts) -> Arc<FakeConnector> {
	Arc::new(FakeConnector::new(parts))
}

fn harness(connector: Arc<FakeConnector>, options: SessionOptions, controller: FakeTransportController) -> Harness {
	let desktop = RemoteDesktop::new(connector.clone(), options);
	Harness {
		desktop,
		connector,
		controller,
	}
}

pub fn session_created() -> Options {
	let mut results = Options::new();
	results.insert("session_handle".into(), Variant::ObjectPath(SESSION_PATH.into()));
	results
}

pub fn devices_granted(devices: u32) -> Options {
	let mut results = Options::new();
	results.insert("devices".into(), Variant::U32(devices));
	results
}

/// Gives spawned tasks time to run and asserts nothing new was sent.
pub async fn assert_quiet(controller: &FakeTransportController) {
	tokio::time::sleep(Duration::from_millis(20)).await;
	if let Some(call) = controller.try_next_call() {
		panic!("unexpected {} sent before the previous response", call.member);
	}
}

pub async fn wait_for_state(desktop: &RemoteDesktop, state: SessionState) {
	tokio::time::timeout(Duration::from_secs(2), async {
		while desktop.state() != state {
			tokio::time::sleep(Duration::from_millis(5)).await;
		}
	})
	.await
	.unwrap_or_else(|_| panic!("session never reached {state}, stuck at {}", desktop.state()));
}
