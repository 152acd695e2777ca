// self
use crate::{_prelude::*, error::RefreshError, obs::FlowKind, store::StoreError};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedFlow<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedFlow<F> = F;

/// A span builder used by session flows.
#[derive(Clone, Debug)]
pub struct FlowSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl FlowSpan {
	/// Creates a new span tagged with the provided flow kind + stage.
	pub fn new(kind: FlowKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!("bearer_session.flow", flow = kind.as_str(), stage);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage);

			Self {}
		}
	}

	/// Enters the span for synchronous sections.
	pub fn entered(self) -> FlowSpanGuard {
		#[cfg(feature = "tracing")]
		{
			FlowSpanGuard { guard: self.span.entered() }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = self;

			FlowSpanGuard {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedFlow<Fut>
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

/// RAII guard returned by [`FlowSpan::entered`].
pub struct FlowSpanGuard {
	#[cfg(feature = "tracing")]
	#[allow(dead_code)]
	guard: tracing::span::EnteredSpan,
}
impl Debug for FlowSpanGuard {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("FlowSpanGuard(..)")
	}
}

pub(crate) fn log_auth_missing(target: &str) {
	#[cfg(feature = "tracing")]
	tracing::debug!(
		request_target = target,
		"No access token stored; sending request without a bearer."
	);
	#[cfg(not(feature = "tracing"))]
	let _ = target;
}

pub(crate) fn log_cycle_started(cycle: u64) {
	#[cfg(feature = "tracing")]
	tracing::debug!(cycle, "Refresh cycle started.");
	#[cfg(not(feature = "tracing"))]
	let _ = cycle;
}

pub(crate) fn log_cycle_abandoned() {
	#[cfg(feature = "tracing")]
	tracing::debug!("Refresh leader went away; rejoining as a new cycle.");
}

pub(crate) fn log_cycle_settled(cycle: u64, waiters: usize, succeeded: bool) {
	#[cfg(feature = "tracing")]
	tracing::debug!(cycle, waiters, succeeded, "Refresh cycle settled.");
	#[cfg(not(feature = "tracing"))]
	let _ = (cycle, waiters, succeeded);
}

pub(crate) fn log_store_failure(operation: &'static str, err: &StoreError) {
	#[cfg(feature = "tracing")]
	tracing::warn!(operation, error = %err, "Credential store operation failed.");
	#[cfg(not(feature = "tracing"))]
	let _ = (operation, err);
}

pub(crate) fn log_escalation(route: &str, reason: &RefreshError) {
	#[cfg(feature = "tracing")]
	tracing::warn!(route, reason = %reason, "Session invalidated; re-authentication required.");
	#[cfg(not(feature = "tracing"))]
	let _ = (route, reason);
}
