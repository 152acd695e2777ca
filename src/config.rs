//! Session configuration: where the API lives, where refreshes go, where re-authentication
//! points, and the optional hardening knobs.

// crates.io
use url::Host;
// self
use crate::{_prelude::*, error::ConfigError, http, store::StorageKeys};

/// Validated configuration consumed by [`Session`](crate::session::Session).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
	/// API base URL; relative request targets are appended to its path.
	pub base_url: Url,
	/// Refresh endpoint path relative to the base URL.
	#[serde(default = "default_refresh_path")]
	pub refresh_path: String,
	/// Route handed to the navigator when re-authentication is required.
	#[serde(default = "default_reauth_route")]
	pub reauth_route: String,
	/// Keys used by durable stores.
	#[serde(default)]
	pub storage_keys: StorageKeys,
	/// Per-call timeout for the refresh request. `None` leaves the call unbounded.
	#[serde(default)]
	pub refresh_timeout: Option<StdDuration>,
	/// Upper bound on callers queued behind one refresh. `None` leaves the queue unbounded.
	#[serde(default)]
	pub max_waiters: Option<usize>,
	/// Accept a plain-HTTP base URL on a non-loopback host.
	#[serde(default)]
	pub allow_insecure_http: bool,
}
impl SessionConfig {
	/// Default refresh endpoint path.
	pub const DEFAULT_REFRESH_PATH: &'static str = "/auth/refresh";
	/// Default re-authentication route.
	pub const DEFAULT_REAUTH_ROUTE: &'static str = "/login";

	/// Creates a new builder for the provided base URL.
	pub fn builder(base_url: Url) -> SessionConfigBuilder {
		SessionConfigBuilder::new(base_url)
	}

	/// Absolute URL of the refresh endpoint.
	pub fn refresh_endpoint(&self) -> Result<Url, ConfigError> {
		http::resolve_target(&self.base_url, &self.refresh_path).map_err(|err| match err {
			crate::error::TransportError::InvalidTarget { source, .. } => source.into(),
			_ => ConfigError::InvalidRefreshPath { path: self.refresh_path.clone() },
		})
	}

	/// Validates invariants; deserialized configs should be checked with this before use.
	pub fn validate(&self) -> Result<(), ConfigError> {
		validate_base_url(&self.base_url, self.allow_insecure_http)?;

		if !self.refresh_path.starts_with('/') {
			return Err(ConfigError::InvalidRefreshPath { path: self.refresh_path.clone() });
		}
		if self.reauth_route.trim().is_empty() {
			return Err(ConfigError::EmptyReauthRoute);
		}
		if self.storage_keys.access.is_empty() {
			return Err(ConfigError::EmptyStorageKey { which: "access" });
		}
		if self.storage_keys.refresh.is_empty() {
			return Err(ConfigError::EmptyStorageKey { which: "refresh" });
		}
		if self.storage_keys.access == self.storage_keys.refresh {
			return Err(ConfigError::DuplicateStorageKeys { key: self.storage_keys.access.clone() });
		}

		self.refresh_endpoint()?;

		Ok(())
	}
}

/// Builder for [`SessionConfig`] values.
#[derive(Debug)]
pub struct SessionConfigBuilder {
	config: SessionConfig,
}
impl SessionConfigBuilder {
	/// Creates a new builder seeded with defaults and the provided base URL.
	pub fn new(base_url: Url) -> Self {
		Self {
			config: SessionConfig {
				base_url,
				refresh_path: SessionConfig::DEFAULT_REFRESH_PATH.into(),
				reauth_route: SessionConfig::DEFAULT_REAUTH_ROUTE.into(),
				storage_keys: StorageKeys::default(),
				refresh_timeout: None,
				max_waiters: None,
				allow_insecure_http: false,
			},
		}
	}

	/// Overrides the refresh endpoint path.
	pub fn refresh_path(mut self, path: impl Into<String>) -> Self {
		self.config.refresh_path = path.into();

		self
	}

	/// Overrides the re-authentication route.
	pub fn reauth_route(mut self, route: impl Into<String>) -> Self {
		self.config.reauth_route = route.into();

		self
	}

	/// Overrides the persisted storage keys.
	pub fn storage_keys(mut self, keys: StorageKeys) -> Self {
		self.config.storage_keys = keys;

		self
	}

	/// Bounds each refresh call; an elapsed timeout counts as a refresh failure.
	pub fn refresh_timeout(mut self, timeout: StdDuration) -> Self {
		self.config.refresh_timeout = Some(timeout);

		self
	}

	/// Bounds how many callers may queue behind one refresh.
	pub fn max_waiters(mut self, limit: usize) -> Self {
		self.config.max_waiters = Some(limit);

		self
	}

	/// Allows a plain-HTTP base URL on any host.
	pub fn allow_insecure_http(mut self, allow: bool) -> Self {
		self.config.allow_insecure_http = allow;

		self
	}

	/// Consumes the builder and validates the resulting configuration.
	pub fn build(self) -> Result<SessionConfig, ConfigError> {
		let config = self.config;

		config.validate()?;

		Ok(config)
	}
}

fn default_refresh_path() -> String {
	SessionConfig::DEFAULT_REFRESH_PATH.into()
}

fn default_reauth_route() -> String {
	SessionConfig::DEFAULT_REAUTH_ROUTE.into()
}

fn validate_base_url(url: &Url, allow_insecure_http: bool) -> Result<(), ConfigError> {
	if url.cannot_be_a_base() {
		return Err(ConfigError::UnsupportedBaseUrl { url: url.to_string() });
	}

	match url.scheme() {
		"https" => Ok(()),
		"http" if allow_insecure_http || is_loopback(url) => Ok(()),
		"http" => Err(ConfigError::InsecureBaseUrl { url: url.to_string() }),
		_ => Err(ConfigError::UnsupportedBaseUrl { url: url.to_string() }),
	}
}

fn is_loopback(url: &Url) -> bool {
	match url.host() {
		Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
		Some(Host::Ipv4(addr)) => addr.is_loopback(),
		Some(Host::Ipv6(addr)) => addr.is_loopback(),
		None => false,
	}
}
