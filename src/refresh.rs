//! Single-flight credential refresh.
//!
//! [`RefreshCoordinator`] owns an explicit `Idle`/`Refreshing` state machine. The first caller that
//! needs new credentials while the coordinator is idle becomes the cycle's leader and performs the
//! refresh call; everyone arriving while that call is in flight is queued as a waiter instead of
//! issuing a second call. When the call settles the queue is drained in one step under the state
//! lock and every waiter receives the leader's outcome: the same access token, or clones of the
//! same [`RefreshError`] after the store has been cleared and the navigator notified.

mod client;
mod metrics;

pub use client::*;
pub use metrics::RefreshMetrics;

// crates.io
use futures::channel::oneshot;
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	error::RefreshError,
	escalation::FailureEscalation,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	store::CredentialStore,
};

type RefreshOutcome = Result<TokenSecret, RefreshError>;

/// Observable phase of a [`RefreshCoordinator`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CoordinatorPhase {
	/// No refresh in flight.
	Idle,
	/// A refresh call is in flight; new callers are queued.
	Refreshing,
	/// [`RefreshCoordinator::shutdown`] was called.
	Closed,
}

/// Coordinates refresh cycles so at most one refresh call is ever in flight.
pub struct RefreshCoordinator {
	store: Arc<dyn CredentialStore>,
	client: Arc<dyn RefreshClient>,
	escalation: FailureEscalation,
	max_waiters: Option<usize>,
	metrics: Arc<RefreshMetrics>,
	state: Mutex<CoordinatorState>,
}
impl RefreshCoordinator {
	/// Creates an idle coordinator.
	pub fn new(
		store: Arc<dyn CredentialStore>,
		client: Arc<dyn RefreshClient>,
		escalation: FailureEscalation,
	) -> Self {
		Self {
			store,
			client,
			escalation,
			max_waiters: None,
			metrics: Default::default(),
			state: Mutex::new(CoordinatorState::default()),
		}
	}

	/// Rejects callers with [`RefreshError::QueueFull`] once `limit` are already waiting.
	pub fn with_max_waiters(mut self, limit: Option<usize>) -> Self {
		self.max_waiters = limit;

		self
	}

	/// Shared counters for this coordinator.
	pub fn metrics(&self) -> &Arc<RefreshMetrics> {
		&self.metrics
	}

	/// Current phase.
	pub fn phase(&self) -> CoordinatorPhase {
		match &self.state.lock().phase {
			Phase::Idle => CoordinatorPhase::Idle,
			Phase::Refreshing { .. } => CoordinatorPhase::Refreshing,
			Phase::Closed => CoordinatorPhase::Closed,
		}
	}

	/// Number of callers queued behind the in-flight refresh.
	pub fn pending_waiters(&self) -> usize {
		match &self.state.lock().phase {
			Phase::Refreshing { waiters, .. } => waiters.len(),
			_ => 0,
		}
	}

	/// Starts a refresh cycle, or joins the one already in flight.
	pub async fn refresh(&self) -> Result<TokenSecret, RefreshError> {
		self.run(Admission::Always).await
	}

	/// Like [`refresh`](Self::refresh), for a caller whose request was rejected while carrying
	/// `attached` (or no token at all).
	///
	/// If the coordinator is idle and the store already holds a different access token, another
	/// cycle or an external sign-in replaced the credential while the request was in flight; that
	/// token is returned without starting a new cycle.
	pub async fn refresh_after(
		&self,
		attached: Option<&TokenSecret>,
	) -> Result<TokenSecret, RefreshError> {
		self.run(Admission::UnlessRotated(attached)).await
	}

	/// Rejects every queued waiter with [`RefreshError::Shutdown`] and refuses new callers.
	///
	/// A cycle leader that is still running finishes its own call and returns its own outcome.
	pub fn shutdown(&self) {
		let waiters = {
			let mut state = self.state.lock();

			match std::mem::replace(&mut state.phase, Phase::Closed) {
				Phase::Refreshing { waiters, .. } => waiters,
				_ => Vec::new(),
			}
		};

		deliver(waiters, &Err(RefreshError::Shutdown));
	}

	async fn run(&self, admission: Admission<'_>) -> RefreshOutcome {
		let span = FlowSpan::new(FlowKind::Refresh, "refresh");

		span.instrument(async move {
			loop {
				match self.admit(admission) {
					Role::Ready(outcome) => return outcome,
					Role::Waiter(receiver) => match receiver.await {
						Ok(outcome) => return outcome,
						// The leader was dropped before settling; take part in the next cycle.
						Err(oneshot::Canceled) => obs::log_cycle_abandoned(),
					},
					Role::Leader(cycle) => {
						let guard = CycleGuard { coordinator: self, cycle, settled: false };
						let outcome = self.perform(cycle).await;

						guard.settle(&outcome);

						return outcome;
					},
				}
			}
		})
		.await
	}

	/// Decides start-vs-join under the state lock so two callers can never both lead a cycle.
	fn admit(&self, admission: Admission<'_>) -> Role {
		let mut state = self.state.lock();
		let CoordinatorState { phase, next_cycle } = &mut *state;

		match phase {
			Phase::Closed => Role::Ready(Err(RefreshError::Shutdown)),
			Phase::Refreshing { waiters, .. } => {
				if let Some(limit) = self.max_waiters.filter(|limit| waiters.len() >= *limit) {
					return Role::Ready(Err(RefreshError::QueueFull { limit }));
				}

				let (sender, receiver) = oneshot::channel();

				waiters.push(sender);
				self.metrics.record_joined();
				obs::record_flow_outcome(FlowKind::Refresh, FlowOutcome::Joined);

				Role::Waiter(receiver)
			},
			Phase::Idle => {
				if let Admission::UnlessRotated(attached) = admission {
					let current = self.store.get().map(|pair| pair.access_token().clone());

					if let Some(current) = current.filter(|token| Some(token) != attached) {
						return Role::Ready(Ok(current));
					}
				}

				let cycle = *next_cycle;

				*next_cycle += 1;
				*phase = Phase::Refreshing { cycle, waiters: Vec::new() };

				Role::Leader(cycle)
			},
		}
	}

	async fn perform(&self, cycle: u64) -> RefreshOutcome {
		const KIND: FlowKind = FlowKind::Refresh;

		self.metrics.record_attempt();
		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);
		obs::log_cycle_started(cycle);

		let outcome = match self.store.get() {
			None => Err(RefreshError::MissingRefreshToken),
			Some(current) => match self.client.refresh(current.refresh_token()).await {
				Ok(pair) => {
					let access = pair.access_token().clone();

					self.store.set(pair).map(|()| access).map_err(RefreshError::Persist)
				},
				Err(err) => Err(err),
			},
		};

		match &outcome {
			Ok(_) => {
				self.metrics.record_success();
				obs::record_flow_outcome(KIND, FlowOutcome::Success);
			},
			Err(err) => {
				self.escalation.escalate(err);
				self.metrics.record_failure();
				obs::record_flow_outcome(KIND, FlowOutcome::Failure);
			},
		}

		outcome
	}

	/// Returns to `Idle` and hands `outcome` to every waiter queued during `cycle`.
	fn settle(&self, cycle: u64, outcome: &RefreshOutcome) {
		let waiters = self.drain(cycle);

		obs::log_cycle_settled(cycle, waiters.len(), outcome.is_ok());
		deliver(waiters, outcome);
	}

	/// Returns to `Idle` without an outcome. Dropping the senders wakes every waiter, and each
	/// one goes back through [`admit`](Self::admit) so the first becomes the next leader.
	fn abandon(&self, cycle: u64) {
		let waiters = self.drain(cycle);

		obs::log_cycle_settled(cycle, waiters.len(), false);
		drop(waiters);
	}

	fn drain(&self, cycle: u64) -> Vec<oneshot::Sender<RefreshOutcome>> {
		let mut state = self.state.lock();

		match &mut state.phase {
			Phase::Refreshing { cycle: current, waiters } if *current == cycle => {
				let drained = std::mem::take(waiters);

				state.phase = Phase::Idle;

				drained
			},
			_ => Vec::new(),
		}
	}
}
impl Debug for RefreshCoordinator {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RefreshCoordinator")
			.field("phase", &self.phase())
			.field("max_waiters", &self.max_waiters)
			.field("escalation", &self.escalation)
			.finish()
	}
}

#[derive(Default)]
struct CoordinatorState {
	phase: Phase,
	next_cycle: u64,
}

#[derive(Default)]
enum Phase {
	#[default]
	Idle,
	Refreshing {
		cycle: u64,
		waiters: Vec<oneshot::Sender<RefreshOutcome>>,
	},
	Closed,
}

#[derive(Clone, Copy)]
enum Admission<'a> {
	Always,
	UnlessRotated(Option<&'a TokenSecret>),
}

enum Role {
	Leader(u64),
	Waiter(oneshot::Receiver<RefreshOutcome>),
	Ready(RefreshOutcome),
}

/// Abandons the leader's cycle if the leader's future is dropped mid-refresh, so queued waiters
/// never hang and one of them takes over.
struct CycleGuard<'a> {
	coordinator: &'a RefreshCoordinator,
	cycle: u64,
	settled: bool,
}
impl CycleGuard<'_> {
	fn settle(mut self, outcome: &RefreshOutcome) {
		self.settled = true;
		self.coordinator.settle(self.cycle, outcome);
	}
}
impl Drop for CycleGuard<'_> {
	fn drop(&mut self) {
		if !self.settled {
			self.coordinator.abandon(self.cycle);
		}
	}
}

fn deliver(waiters: Vec<oneshot::Sender<RefreshOutcome>>, outcome: &RefreshOutcome) {
	for waiter in waiters {
		// A waiter whose caller went away has dropped its receiver.
		let _ = waiter.send(outcome.clone());
	}
}
