// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for gateway activity.
#[derive(Debug, Default)]
pub struct GatewayMetrics {
	dispatches: AtomicU64,
	retries: AtomicU64,
	throttled: AtomicU64,
	refresh_attempts: AtomicU64,
	refresh_success: AtomicU64,
	refresh_failure: AtomicU64,
}
impl GatewayMetrics {
	/// Returns the number of dispatched caller requests.
	pub fn dispatches(&self) -> u64 {
		self.dispatches.load(Ordering::Relaxed)
	}

	/// Returns the number of requests resent after a successful refresh.
	pub fn retries(&self) -> u64 {
		self.retries.load(Ordering::Relaxed)
	}

	/// Returns the number of requests deferred by the throttle.
	pub fn throttled(&self) -> u64 {
		self.throttled.load(Ordering::Relaxed)
	}

	/// Returns the number of refresh calls actually sent.
	pub fn refresh_attempts(&self) -> u64 {
		self.refresh_attempts.load(Ordering::Relaxed)
	}

	/// Returns the number of refresh calls answered with a 2xx status.
	pub fn refresh_successes(&self) -> u64 {
		self.refresh_success.load(Ordering::Relaxed)
	}

	/// Returns the number of refresh calls that failed (status or transport).
	pub fn refresh_failures(&self) -> u64 {
		self.refresh_failure.load(Ordering::Relaxed)
	}

	pub(crate) fn record_dispatch(&self) {
		self.dispatches.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_retry(&self) {
		self.retries.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_throttled(&self) {
		self.throttled.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_refresh_attempt(&self) {
		self.refresh_attempts.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_refresh_success(&self) {
		self.refresh_success.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_refresh_failure(&self) {
		self.refresh_failure.fetch_add(1, Ordering::Relaxed);
	}
}
