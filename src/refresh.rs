//! Single-flight coordination for credential refreshes.
//!
//! The first caller that needs a refresh installs a shared [`OnceCell`] and spawns the refresh as
//! its own task; every caller, including the first, only awaits the cell. Dropping a waiting
//! caller therefore never cancels the refresh. Once the refresh settles the same task sleeps
//! through the cooldown and then removes the cell, so a burst of near-simultaneous failures
//! collapses into one refresh while a later, independent failure starts a new one.

// std
use std::{sync::Weak, time::Duration};
// crates.io
use async_lock::OnceCell;
use tokio::{task::JoinHandle, time};
// self
use crate::_prelude::*;

type FlightCell = Arc<OnceCell<bool>>;

#[derive(Debug, Default)]
struct FlightSlot {
	cell: Option<FlightCell>,
	task: Option<JoinHandle<()>>,
}

/// Shared slot holding the in-flight (or recently settled) refresh outcome.
///
/// Refreshes run as spawned Tokio tasks, so [`join`](Self::join) must be awaited inside a Tokio
/// runtime. Dropping the flight aborts a pending cooldown.
#[derive(Debug)]
pub struct RefreshFlight {
	cooldown: Duration,
	slot: Arc<Mutex<FlightSlot>>,
}
impl RefreshFlight {
	/// Creates an empty flight whose settled outcomes are forgotten after `cooldown`.
	pub fn new(cooldown: Duration) -> Self {
		Self { cooldown, slot: Default::default() }
	}

	/// Returns the shared refresh outcome, spawning `refresh` only if no flight is installed.
	///
	/// The spawned refresh runs to completion even if every caller stops waiting for it.
	pub async fn join<F, Fut>(&self, refresh: F) -> bool
	where
		F: FnOnce() -> Fut,
		Fut: 'static + Send + Future<Output = bool>,
	{
		let cell = {
			let mut slot = self.slot.lock();

			match slot.cell.clone() {
				Some(cell) => cell,
				None => {
					let cell = FlightCell::default();

					slot.cell = Some(cell.clone());
					slot.task = Some(tokio::spawn(Self::drive(
						Arc::downgrade(&self.slot),
						cell.clone(),
						refresh(),
						self.cooldown,
					)));

					cell
				},
			}
		};

		*cell.wait().await
	}

	/// Whether a refresh outcome is currently shared (in flight or cooling down).
	pub fn is_installed(&self) -> bool {
		self.slot.lock().cell.is_some()
	}

	async fn drive<Fut>(
		slot: Weak<Mutex<FlightSlot>>,
		cell: FlightCell,
		refresh: Fut,
		cooldown: Duration,
	) where
		Fut: Future<Output = bool>,
	{
		cell.get_or_init(|| refresh).await;
		time::sleep(cooldown).await;

		let Some(slot) = slot.upgrade() else {
			return;
		};
		let mut slot = slot.lock();

		if slot.cell.as_ref().is_some_and(|current| Arc::ptr_eq(current, &cell)) {
			slot.cell = None;
			slot.task = None;
		}
	}
}
impl Drop for RefreshFlight {
	fn drop(&mut self) {
		if let Some(task) = self.slot.lock().task.take() {
			task.abort();
		}
	}
}
