// std
use std::time::Duration;
// self
use crate::{_prelude::*, obs::GatewayOp};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedOp<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedOp<F> = F;

/// A span builder used by gateway operations.
#[derive(Clone, Debug)]
pub struct OpSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl OpSpan {
	/// Creates a new span tagged with the provided operation + request path.
	pub fn new(op: GatewayOp, path: &str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!("auth_gateway.op", op = op.as_str(), path);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (op, path);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedOp<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Logs a refresh call that did not succeed.
pub fn refresh_failed(path: &str, reason: &dyn Display) {
	#[cfg(feature = "tracing")]
	tracing::warn!(path, %reason, "credential refresh failed; publishing logout");
	#[cfg(not(feature = "tracing"))]
	let _ = (path, reason);
}

/// Logs a call deferred by the throttle registry.
pub fn throttle_deferred(path: &str, delay: Duration) {
	let delay_ms = saturating_millis(delay);

	#[cfg(feature = "tracing")]
	tracing::debug!(path, delay_ms, "request deferred by throttle");
	#[cfg(not(feature = "tracing"))]
	let _ = (path, delay_ms);
}

fn saturating_millis(delay: Duration) -> u64 {
	u64::try_from(delay.as_millis()).unwrap_or(u64::MAX)
}
