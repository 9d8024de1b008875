//! Session-bus transport backed by zbus.
//!
//! Calls are encoded from [`Variant`]s into `zvariant` values on the way out;
//! inbound `Request::Response` and `Session::Closed` signals under the portal
//! object path are decoded back into [`Signal`]s. Everything else the bus
//! delivers is dropped.

use std::collections::HashMap;

use futures::StreamExt;
use portal_protocol::{
	CLOSED_SIGNAL, MethodCall, Options, PORTAL_OBJECT_PATH, REQUEST_INTERFACE, RESPONSE_SIGNAL, SESSION_INTERFACE, Signal, Variant,
	request_path,
};
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};
use zbus::zvariant::{Dict, ObjectPath, OwnedObjectPath, OwnedValue, Structure, StructureBuilder, Type, Value};
use zbus::{MatchRule, MessageStream, message};

use crate::error::{Error, Result};
use crate::transport::{BoxFuture, Connector, Transport, TransportParts, TransportReceiver};

/// Connects to the user's session bus.
#[derive(Debug, Clone, Default)]
pub struct DbusConnector;

impl DbusConnector {
	pub fn new() -> Self {
		Self
	}
}

impl Connector for DbusConnector {
	fn connect(&self) -> BoxFuture<'_, Result<TransportParts>> {
		Box::pin(async move {
			let connection = zbus::Connection::session()
				.await
				.map_err(|err| Error::Connection(err.to_string()))?;
			let unique_name = connection
				.unique_name()
				.map(|name| name.to_string())
				.ok_or_else(|| Error::Connection("bus assigned no unique name".to_string()))?;

			let rule = MatchRule::builder()
				.msg_type(message::Type::Signal)
				.path_namespace(PORTAL_OBJECT_PATH)?
				.build();
			let stream = MessageStream::for_match_rule(rule, &connection, None).await?;

			info!(target = "portal.dbus", unique_name = %unique_name, "connected to session bus");

			let (signal_tx, signal_rx) = mpsc::unbounded_channel();
			Ok(TransportParts {
				unique_name: unique_name.clone(),
				sender: Box::new(DbusSender { connection, unique_name }),
				receiver: Box::new(DbusReceiver { stream, signal_tx }),
				signal_rx,
			})
		})
	}
}

struct DbusSender {
	connection: zbus::Connection,
	unique_name: String,
}

impl Transport for DbusSender {
	fn send(&mut self, call: MethodCall) -> BoxFuture<'_, Result<()>> {
		Box::pin(async move {
			let body = encode_body(&call.args)?;

			if call.no_reply {
				let builder = zbus::Message::method(call.path.as_str(), call.member.as_str())?
					.destination(call.destination.as_str())?
					.interface(call.interface.as_str())?
					.with_flags(message::Flags::NoReplyExpected)?;
				let message = match &body {
					Some(body) => builder.build(body)?,
					None => builder.build(&())?,
				};
				self.connection.send(&message).await?;
				trace!(target = "portal.dbus", member = %call.member, "sent without reply");
				return Ok(());
			}

			let destination = Some(call.destination.as_str());
			let interface = Some(call.interface.as_str());
			let reply = match &body {
				Some(body) => {
					self.connection
						.call_method(destination, call.path.as_str(), interface, call.member.as_str(), body)
						.await?
				}
				None => {
					self.connection
						.call_method(destination, call.path.as_str(), interface, call.member.as_str(), &())
						.await?
				}
			};

			// Portal frontends before 0.9 pick their own request path.
			if let (Some(token), Ok(handle)) = (call.handle_token(), reply.body().deserialize::<OwnedObjectPath>()) {
				let expected = request_path(&self.unique_name, token);
				if handle.as_str() != expected {
					warn!(
						target = "portal.dbus",
						member = %call.member,
						expected = %expected,
						actual = %handle.as_str(),
						"portal returned an unexpected request handle"
					);
				}
			}
			Ok(())
		})
	}
}

struct DbusReceiver {
	stream: MessageStream,
	signal_tx: mpsc::UnboundedSender<Signal>,
}

impl TransportReceiver for DbusReceiver {
	fn run(mut self: Box<Self>) -> BoxFuture<'static, Result<()>> {
		Box::pin(async move {
			while let Some(message) = self.stream.next().await {
				let message = match message {
					Ok(message) => message,
					Err(err) => {
						warn!(target = "portal.dbus", error = %err, "failed to read bus message");
						continue;
					}
				};

				match decode_signal(&message) {
					Some(signal) => {
						if self.signal_tx.send(signal).is_err() {
							break;
						}
					}
					None => trace!(target = "portal.dbus", "ignored unrelated signal"),
				}
			}

			debug!(target = "portal.dbus", "bus message stream ended");
			Ok(())
		})
	}
}

fn decode_signal(message: &zbus::Message) -> Option<Signal> {
	let header = message.header();
	let path = header.path()?.to_string();
	let interface = header.interface()?.to_string();
	let member = header.member()?.to_string();

	let args = match (interface.as_str(), member.as_str()) {
		(REQUEST_INTERFACE, RESPONSE_SIGNAL) => {
			let (status, results): (u32, HashMap<String, OwnedValue>) = message.body().deserialize().ok()?;
			vec![Variant::U32(status), Variant::Dict(decode_options(&results))]
		}
		(SESSION_INTERFACE, CLOSED_SIGNAL) => {
			let details: HashMap<String, OwnedValue> = message.body().deserialize().unwrap_or_default();
			vec![Variant::Dict(decode_options(&details))]
		}
		_ => return None,
	};

	Some(Signal {
		path,
		interface,
		member,
		args,
	})
}

fn decode_options(map: &HashMap<String, OwnedValue>) -> Options {
	map.iter()
		.filter_map(|(key, value)| decode_value(value).map(|variant| (key.clone(), variant)))
		.collect()
}

// Nested containers are not used by RemoteDesktop results and are skipped.
fn decode_value(value: &Value<'_>) -> Option<Variant> {
	Some(match value {
		Value::Bool(v) => Variant::Bool(*v),
		Value::U32(v) => Variant::U32(*v),
		Value::I32(v) => Variant::I32(*v),
		Value::U64(v) => Variant::U64(*v),
		Value::F64(v) => Variant::F64(*v),
		Value::Str(v) => Variant::Str(v.to_string()),
		Value::ObjectPath(v) => Variant::ObjectPath(v.to_string()),
		Value::Value(inner) => return decode_value(inner),
		_ => return None,
	})
}

fn encode_body(args: &[Variant]) -> Result<Option<Structure<'static>>> {
	if args.is_empty() {
		return Ok(None);
	}
	let mut builder = StructureBuilder::new();
	for arg in args {
		builder = builder.append_field(encode_value(arg)?);
	}
	Ok(Some(builder.build()))
}

fn encode_value(variant: &Variant) -> Result<Value<'static>> {
	Ok(match variant {
		Variant::Bool(v) => Value::from(*v),
		Variant::U32(v) => Value::from(*v),
		Variant::I32(v) => Value::from(*v),
		Variant::U64(v) => Value::from(*v),
		Variant::F64(v) => Value::from(*v),
		Variant::Str(v) => Value::from(v.clone()),
		Variant::ObjectPath(v) => Value::from(ObjectPath::try_from(v.clone())?),
		Variant::Dict(options) => {
			let mut dict = Dict::new(<String as Type>::signature(), <Value<'_> as Type>::signature());
			for (key, value) in options {
				dict.append(Value::from(key.clone()), Value::Value(Box::new(encode_value(value)?)))?;
			}
			Value::Dict(dict)
		}
	})
}
