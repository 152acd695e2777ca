//! Outbound call execution with bearer injection and a single replay after refresh.

// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	http::{self, ApiResponse, ApiTransport, OutboundRequest},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	refresh::RefreshCoordinator,
	store::CredentialStore,
};

/// Executes outbound calls on behalf of application code.
///
/// The dispatcher only ever reads the credential store. On a 401 it asks the shared
/// [`RefreshCoordinator`] for a token and replays the request exactly once; every other response is
/// handed back unchanged. Clones share the transport, store, and coordinator.
pub struct RequestDispatcher<T>
where
	T: ?Sized + ApiTransport,
{
	transport: Arc<T>,
	store: Arc<dyn CredentialStore>,
	coordinator: Arc<RefreshCoordinator>,
	base_url: Url,
}
impl<T> RequestDispatcher<T>
where
	T: ?Sized + ApiTransport,
{
	/// Creates a dispatcher resolving relative targets against `base_url`.
	pub fn new(
		transport: impl Into<Arc<T>>,
		store: Arc<dyn CredentialStore>,
		coordinator: Arc<RefreshCoordinator>,
		base_url: Url,
	) -> Self {
		Self { transport: transport.into(), store, coordinator, base_url }
	}

	/// Coordinator shared by this dispatcher.
	pub fn coordinator(&self) -> &Arc<RefreshCoordinator> {
		&self.coordinator
	}

	/// Sends `request`, replaying it once with a refreshed credential if it is rejected with 401.
	///
	/// # Errors
	///
	/// - [`Error::Transport`] when the call (or its replay) cannot be executed.
	/// - [`Error::RefreshFailure`] when the coordinator could not produce a credential.
	/// - [`Error::RetryExhausted`] when a request already marked as retried, or the replay itself,
	///   is rejected with 401.
	///
	/// Any other status, including error statuses, is returned as `Ok`.
	pub async fn send(&self, request: OutboundRequest) -> Result<ApiResponse> {
		const KIND: FlowKind = FlowKind::Dispatch;

		let span = FlowSpan::new(KIND, "send");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span.instrument(self.dispatch(request)).await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}

	async fn dispatch(&self, request: OutboundRequest) -> Result<ApiResponse> {
		let url = http::resolve_target(&self.base_url, &request.target)?;
		let attached = self.store.get().map(|pair| pair.access_token().clone());
		let response = self.execute(url.clone(), request.clone(), attached.as_ref()).await?;

		if !response.is_unauthorized() {
			return Ok(response);
		}
		if request.is_retried() {
			return Err(Error::RetryExhausted { response: Box::new(response) });
		}

		let token = self.coordinator.refresh_after(attached.as_ref()).await?;
		let mut replay = request;

		replay.mark_retried();
		obs::record_flow_outcome(FlowKind::Dispatch, FlowOutcome::Retry);

		let response = self.execute(url, replay, Some(&token)).await?;

		if response.is_unauthorized() {
			return Err(Error::RetryExhausted { response: Box::new(response) });
		}

		Ok(response)
	}

	async fn execute(
		&self,
		url: Url,
		mut request: OutboundRequest,
		token: Option<&TokenSecret>,
	) -> Result<ApiResponse> {
		match token {
			Some(token) => request.set_bearer(token)?,
			None => obs::log_auth_missing(&request.target),
		}

		Ok(self.transport.execute(url, request).await?)
	}
}
impl<T> Clone for RequestDispatcher<T>
where
	T: ?Sized + ApiTransport,
{
	fn clone(&self) -> Self {
		Self {
			transport: self.transport.clone(),
			store: self.store.clone(),
			coordinator: self.coordinator.clone(),
			base_url: self.base_url.clone(),
		}
	}
}
impl<T> Debug for RequestDispatcher<T>
where
	T: ?Sized + ApiTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RequestDispatcher")
			.field("base_url", &self.base_url.as_str())
			.field("coordinator", &self.coordinator)
			.finish()
	}
}
