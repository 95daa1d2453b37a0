//! Auth notifications broadcast by the gateway to identity-state holders.

// crates.io
use tokio::sync::broadcast::{self, Receiver, Sender};
// self
use crate::_prelude::*;

/// Notifications published by the gateway.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AuthEvent {
	/// Credentials could not be refreshed; cached identity state is stale.
	Logout,
}
impl AuthEvent {
	/// Returns the stable signal name.
	pub const fn as_str(self) -> &'static str {
		match self {
			AuthEvent::Logout => "auth:logout",
		}
	}
}
impl Display for AuthEvent {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Fire-and-forget broadcast bus for [`AuthEvent`]s.
///
/// Cloning the bus shares the underlying channel.
#[derive(Clone, Debug)]
pub struct AuthEvents(Sender<AuthEvent>);
impl AuthEvents {
	/// Creates a bus retaining up to `capacity` undelivered events per receiver.
	///
	/// `capacity` must be non-zero; [`GatewayConfig`](crate::config::GatewayConfig) validation
	/// guarantees that for gateway-owned buses.
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity);

		Self(sender)
	}

	/// Registers a new listener that observes every event published after this call.
	pub fn subscribe(&self) -> Receiver<AuthEvent> {
		self.0.subscribe()
	}

	/// Publishes `event`, returning how many listeners received it.
	pub fn publish(&self, event: AuthEvent) -> usize {
		self.0.send(event).unwrap_or(0)
	}

	/// Returns the number of active listeners.
	pub fn listener_count(&self) -> usize {
		self.0.receiver_count()
	}
}
impl Default for AuthEvents {
	fn default() -> Self {
		Self::new(crate::config::GatewayConfig::DEFAULT_EVENT_CAPACITY)
	}
}
