//! Session facade wiring the store, coordinator, escalation, and dispatcher together.

// std
use std::path::PathBuf;
// self
use crate::{
	_prelude::*,
	auth::CredentialPair,
	config::SessionConfig,
	dispatch::RequestDispatcher,
	error::ConfigError,
	escalation::{FailureEscalation, Navigator},
	http::{ApiResponse, ApiTransport, OutboundRequest, ReqwestTransport},
	refresh::{RefreshClient, RefreshCoordinator, ReqwestRefreshClient},
	store::{CredentialStore, FileStore},
};

/// One authenticated client session against a single API.
///
/// Every clone of the inner dispatcher shares one [`RefreshCoordinator`], so all call sites that
/// go through the same session take part in the same refresh cycles.
pub struct Session<T = ReqwestTransport>
where
	T: ?Sized + ApiTransport,
{
	config: SessionConfig,
	store: Arc<dyn CredentialStore>,
	dispatcher: RequestDispatcher<T>,
}
impl Session<ReqwestTransport> {
	/// Builds a session that talks to the API with a default reqwest client.
	pub fn new(
		config: SessionConfig,
		store: Arc<dyn CredentialStore>,
		navigator: Arc<dyn Navigator>,
	) -> Result<Self> {
		let client = ReqwestClient::builder().build().map_err(ConfigError::from)?;

		Self::with_client(config, store, navigator, client)
	}

	/// Builds a session persisted in a [`FileStore`] at `path`, keyed by
	/// [`SessionConfig::storage_keys`].
	pub fn with_file_store(
		config: SessionConfig,
		path: impl Into<PathBuf>,
		navigator: Arc<dyn Navigator>,
	) -> Result<Self> {
		config.validate()?;

		let store = FileStore::from_config(path, &config)?;

		Self::new(config, Arc::new(store), navigator)
	}

	/// Builds a session on top of a caller-provided reqwest client.
	pub fn with_client(
		config: SessionConfig,
		store: Arc<dyn CredentialStore>,
		navigator: Arc<dyn Navigator>,
		client: ReqwestClient,
	) -> Result<Self> {
		config.validate()?;

		let refresh_client = ReqwestRefreshClient::new(client.clone(), config.refresh_endpoint()?)
			.with_timeout(config.refresh_timeout);

		Ok(Self::with_parts(
			config,
			store,
			ReqwestTransport::with_client(client),
			Arc::new(refresh_client),
			navigator,
		))
	}
}
impl<T> Session<T>
where
	T: ?Sized + ApiTransport,
{
	/// Assembles a session from custom transport and refresh implementations.
	pub fn with_parts(
		config: SessionConfig,
		store: Arc<dyn CredentialStore>,
		transport: impl Into<Arc<T>>,
		refresh_client: Arc<dyn RefreshClient>,
		navigator: Arc<dyn Navigator>,
	) -> Self {
		let escalation = FailureEscalation::new(store.clone(), navigator, &config.reauth_route);
		let coordinator = RefreshCoordinator::new(store.clone(), refresh_client, escalation)
			.with_max_waiters(config.max_waiters);
		let dispatcher = RequestDispatcher::new(
			transport,
			store.clone(),
			Arc::new(coordinator),
			config.base_url.clone(),
		);

		Self { config, store, dispatcher }
	}

	/// Validated configuration.
	pub fn config(&self) -> &SessionConfig {
		&self.config
	}

	/// Dispatcher handle; clone it freely to share the session across tasks.
	pub fn dispatcher(&self) -> &RequestDispatcher<T> {
		&self.dispatcher
	}

	/// Coordinator shared by every dispatcher clone.
	pub fn coordinator(&self) -> &Arc<RefreshCoordinator> {
		self.dispatcher.coordinator()
	}

	/// Sends one request through the dispatcher.
	pub async fn send(&self, request: OutboundRequest) -> Result<ApiResponse> {
		self.dispatcher.send(request).await
	}

	/// Stores credentials obtained outside the session (sign-in, registration).
	pub fn establish(&self, pair: CredentialPair) -> Result<()> {
		self.store.set(pair)?;

		Ok(())
	}

	/// Forgets the stored credentials without notifying the navigator.
	pub fn sign_out(&self) -> Result<()> {
		self.store.clear()?;

		Ok(())
	}

	/// Returns `true` while a credential pair is stored.
	pub fn is_authenticated(&self) -> bool {
		self.store.get().is_some()
	}

	/// Current credential pair, if any.
	pub fn credentials(&self) -> Option<CredentialPair> {
		self.store.get()
	}

	/// Checks persisted credentials on startup by sending `probe` (for example `GET /auth/me`).
	///
	/// Returns `Ok(false)` without any network call when nothing is stored. Any outcome other than
	/// a 2xx response clears the store and returns `Ok(false)`; only a failure to clear the store
	/// is reported as an error.
	pub async fn restore(&self, probe: OutboundRequest) -> Result<bool> {
		if !self.is_authenticated() {
			return Ok(false);
		}

		match self.send(probe).await {
			Ok(response) if response.is_success() => Ok(true),
			_ => {
				self.sign_out()?;

				Ok(false)
			},
		}
	}

	/// Rejects callers still queued behind a refresh and refuses future refreshes.
	pub fn shutdown(&self) {
		self.coordinator().shutdown();
	}
}
impl<T> Debug for Session<T>
where
	T: ?Sized + ApiTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Session")
			.field("config", &self.config)
			.field("authenticated", &self.is_authenticated())
			.finish()
	}
}
