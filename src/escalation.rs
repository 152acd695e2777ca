//! Terminal path for unrecoverable refresh failures.
//!
//! The session never redirects anything itself. It clears the credential store and hands a
//! [`ReauthEvent`] to the caller-supplied [`Navigator`], which decides what "go to the login
//! screen" means for the host application.

// self
use crate::{
	_prelude::*,
	error::RefreshError,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	store::CredentialStore,
};

/// Notification that the session is invalid and the user must sign in again.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReauthEvent {
	/// Route of the re-authentication entry point.
	pub route: String,
	/// Rendered refresh failure that caused the event.
	pub reason: String,
}

/// Routing collaborator that receives re-authentication events.
pub trait Navigator
where
	Self: Send + Sync,
{
	/// Handles one re-authentication event.
	fn reauthenticate(&self, event: ReauthEvent);
}
impl<F> Navigator for F
where
	F: Fn(ReauthEvent) + Send + Sync,
{
	fn reauthenticate(&self, event: ReauthEvent) {
		self(event)
	}
}

/// Clears the store and emits exactly one [`ReauthEvent`] per invocation.
#[derive(Clone)]
pub struct FailureEscalation {
	store: Arc<dyn CredentialStore>,
	navigator: Arc<dyn Navigator>,
	route: String,
}
impl FailureEscalation {
	/// Creates an escalation bound to `store` that points `navigator` at `route`.
	pub fn new(
		store: Arc<dyn CredentialStore>,
		navigator: Arc<dyn Navigator>,
		route: impl Into<String>,
	) -> Self {
		Self { store, navigator, route: route.into() }
	}

	/// Route handed to the navigator.
	pub fn route(&self) -> &str {
		&self.route
	}

	/// Clears both credentials, then notifies the navigator.
	///
	/// A store failure is logged and does not suppress the notification; the user has to sign in
	/// again either way.
	pub fn escalate(&self, reason: &RefreshError) {
		const KIND: FlowKind = FlowKind::Escalation;

		let _span = FlowSpan::new(KIND, "escalate").entered();

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let cleared = self.store.clear();

		if let Err(err) = &cleared {
			obs::log_store_failure("clear", err);
		}

		obs::log_escalation(&self.route, reason);
		self.navigator
			.reauthenticate(ReauthEvent { route: self.route.clone(), reason: reason.to_string() });

		match cleared {
			Ok(()) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}
	}
}
impl Debug for FailureEscalation {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("FailureEscalation").field("route", &self.route).finish()
	}
}
