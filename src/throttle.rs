//! Per-path throttling that spaces permitted calls by a minimum interval.
//!
//! A call arriving before the interval has elapsed is deferred, never dropped. Each path owns at
//! most one pending timer: a newer deferral aborts the previous timer and re-arms it, and every
//! caller deferred on that path is released together when the surviving timer fires.

// std
use std::{
	sync::{
		Weak,
		atomic::{AtomicU64, Ordering},
	},
	time::Duration,
};
// crates.io
use tokio::{
	sync::watch,
	task::JoinHandle,
	time::{self, Instant},
};
// self
use crate::{_prelude::*, obs};

type SharedEntries = Mutex<Entries>;

/// Decision taken for a single call.
#[derive(Debug)]
pub enum Admission {
	/// The call may proceed now.
	Immediate,
	/// The call must wait for the path's release signal.
	Deferred {
		/// Time until the pending timer fires.
		delay: Duration,
		/// Release signal shared by every caller deferred on the path.
		release: watch::Receiver<bool>,
	},
}

#[derive(Debug)]
struct Entries {
	paths: HashMap<String, ThrottleEntry>,
	swept_at: Instant,
}
impl Entries {
	/// Forgets idle paths, at most once per `interval`.
	fn prune(&mut self, now: Instant, interval: Duration) {
		if now.saturating_duration_since(self.swept_at) < interval {
			return;
		}

		self.paths.retain(|_, entry| {
			entry.pending.is_some() || now.saturating_duration_since(entry.last_call) < interval
		});
		self.swept_at = now;
	}
}

#[derive(Debug)]
struct ThrottleEntry {
	last_call: Instant,
	pending: Option<PendingRelease>,
}

#[derive(Debug)]
struct PendingRelease {
	generation: u64,
	timer: JoinHandle<()>,
	release: watch::Sender<bool>,
}

/// Registry of last-permitted call instants keyed by normalized path.
///
/// Timers run as spawned Tokio tasks, so [`admit`](Self::admit) must be called from within a
/// Tokio runtime. Paths idle for longer than the interval are forgotten lazily. Dropping the
/// registry aborts every timer it still owns.
#[derive(Debug)]
pub struct ThrottleRegistry {
	interval: Duration,
	entries: Arc<SharedEntries>,
	generation: AtomicU64,
}
impl ThrottleRegistry {
	/// Creates an empty registry spacing calls by `interval`.
	pub fn new(interval: Duration) -> Self {
		let entries = Entries { paths: HashMap::new(), swept_at: Instant::now() };

		Self { interval, entries: Arc::new(Mutex::new(entries)), generation: AtomicU64::new(0) }
	}

	/// Minimum spacing between permitted calls on one path.
	pub fn interval(&self) -> Duration {
		self.interval
	}

	/// Waits until a call on `path` is permitted.
	///
	/// Returns the deferral that was applied, if any.
	pub async fn acquire(&self, path: &str) -> Option<Duration> {
		match self.admit(path) {
			Admission::Immediate => None,
			Admission::Deferred { delay, mut release } => {
				obs::throttle_deferred(path, delay);

				// A closed channel means the registry is gone; nothing is left to wait for.
				let _ = release.wait_for(|released| *released).await;

				Some(delay)
			},
		}
	}

	/// Decides whether a call on `path` may proceed now, arming the path's timer otherwise.
	pub fn admit(&self, path: &str) -> Admission {
		let now = Instant::now();
		let mut entries = self.entries.lock();

		entries.prune(now, self.interval);

		let Some(entry) = entries.paths.get_mut(path) else {
			entries.paths.insert(path.to_owned(), ThrottleEntry { last_call: now, pending: None });

			return Admission::Immediate;
		};
		let elapsed = now.saturating_duration_since(entry.last_call);

		if elapsed >= self.interval {
			entry.last_call = now;

			return Admission::Immediate;
		}

		let delay = self.interval - elapsed;
		let release = match entry.pending.take() {
			Some(previous) => {
				previous.timer.abort();

				previous.release
			},
			None => watch::channel(false).0,
		};
		let receiver = release.subscribe();
		let generation = self.generation.fetch_add(1, Ordering::Relaxed);
		let timer = tokio::spawn(Self::fire_after(
			Arc::downgrade(&self.entries),
			path.to_owned(),
			generation,
			delay,
		));

		entry.pending = Some(PendingRelease { generation, timer, release });

		Admission::Deferred { delay, release: receiver }
	}

	/// Number of paths that currently have a deferred release armed.
	pub fn pending_len(&self) -> usize {
		self.entries.lock().paths.values().filter(|entry| entry.pending.is_some()).count()
	}

	/// Number of paths whose last call is still remembered.
	pub fn tracked_len(&self) -> usize {
		self.entries.lock().paths.len()
	}

	async fn fire_after(
		entries: Weak<SharedEntries>,
		path: String,
		generation: u64,
		delay: Duration,
	) {
		time::sleep(delay).await;

		let Some(entries) = entries.upgrade() else {
			return;
		};
		let mut entries = entries.lock();
		let Some(entry) = entries.paths.get_mut(&path) else {
			return;
		};

		// An aborted timer may already be past its last await; only the armed one may release.
		if entry.pending.as_ref().is_none_or(|pending| pending.generation != generation) {
			return;
		}

		entry.last_call = Instant::now();

		if let Some(pending) = entry.pending.take() {
			let _ = pending.release.send(true);
		}
	}
}
impl Drop for ThrottleRegistry {
	fn drop(&mut self) {
		for entry in self.entries.lock().paths.values_mut() {
			if let Some(pending) = entry.pending.take() {
				pending.timer.abort();
			}
		}
	}
}
