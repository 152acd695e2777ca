//! Session-level error types shared across the dispatcher, coordinator, and stores.

// self
use crate::{_prelude::*, http::ApiResponse};

/// Session-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;
type SharedError = Arc<dyn std::error::Error + Send + Sync>;

/// Canonical error returned by [`RequestDispatcher::send`](crate::dispatch::RequestDispatcher::send)
/// and the session facade.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS, request construction).
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// Credential refresh failed; the store has been cleared and re-authentication signalled
	/// unless the error says otherwise (see [`RefreshError::escalates`]).
	#[error("Credential refresh failed: {0}")]
	RefreshFailure(#[from] RefreshError),
	/// A request that was already replayed once was rejected with 401 again.
	#[error("Request was rejected with 401 after its single replay.")]
	RetryExhausted {
		/// The final 401 response.
		response: Box<ApiResponse>,
	},
}

/// Outcome of a failed refresh cycle.
///
/// Every caller that waited on the same cycle receives a clone of the same value; sources are
/// reference counted so clones share the underlying error.
#[derive(Clone, Debug, ThisError)]
pub enum RefreshError {
	/// No refresh token was stored when the cycle started.
	#[error("No refresh token is stored.")]
	MissingRefreshToken,
	/// Refresh endpoint answered with a non-2xx status.
	#[error("Refresh endpoint rejected the request with status {status}: {message}.")]
	Rejected {
		/// HTTP status code returned by the endpoint.
		status: u16,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
		/// Response body preview or canonical reason.
		message: String,
	},
	/// Refresh endpoint returned a body without a usable credential pair.
	#[error("Refresh endpoint returned a malformed response.")]
	Malformed {
		/// Structured decoding failure.
		#[source]
		source: SharedError,
	},
	/// Network failure (including an elapsed refresh timeout) while calling the endpoint.
	#[error("Network error occurred while calling the refresh endpoint.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: SharedError,
	},
	/// The new credential pair could not be written to the store.
	#[error("Refreshed credentials could not be persisted.")]
	Persist(#[source] crate::store::StoreError),

	/// The coordinator was shut down.
	#[error("Refresh coordinator has shut down.")]
	Shutdown,
	/// The waiter queue reached its configured bound.
	#[error("Refresh waiter queue is full ({limit} waiters).")]
	QueueFull {
		/// Configured bound.
		limit: usize,
	},
}
impl RefreshError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Arc::new(src) }
	}

	/// Wraps a decoding or validation failure of the refresh response.
	pub fn malformed(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Malformed { source: Arc::new(src) }
	}

	/// Returns `true` when this failure cleared the store and emitted a re-authentication event.
	pub fn escalates(&self) -> bool {
		!matches!(self, Self::Shutdown | Self::QueueFull { .. })
	}
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Base URL is not HTTPS and does not point at a loopback host.
	#[error("The base URL must use HTTPS: {url}.")]
	InsecureBaseUrl {
		/// Base URL that failed validation.
		url: String,
	},
	/// Base URL uses a scheme other than HTTP(S) or cannot carry paths.
	#[error("The base URL scheme is not supported: {url}.")]
	UnsupportedBaseUrl {
		/// Base URL that failed validation.
		url: String,
	},
	/// Refresh path must be absolute relative to the base URL.
	#[error("The refresh path must start with `/`: {path}.")]
	InvalidRefreshPath {
		/// Offending path.
		path: String,
	},
	/// A URL derived from the configuration could not be parsed.
	#[error("Configured URL is invalid.")]
	InvalidUrl(#[from] url::ParseError),
	/// Re-authentication route is empty.
	#[error("The re-authentication route must not be empty.")]
	EmptyReauthRoute,
	/// A storage key is empty.
	#[error("Storage key `{which}` must not be empty.")]
	EmptyStorageKey {
		/// Which key failed validation.
		which: &'static str,
	},
	/// Both credential values would be stored under the same key.
	#[error("Access and refresh storage keys must differ (both are `{key}`).")]
	DuplicateStorageKeys {
		/// Shared key.
		key: String,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures of outbound API calls.
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the API.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the API.")]
	Io(#[from] std::io::Error),
	/// Request target cannot be resolved against the base URL.
	#[error("Request target `{target}` is not a valid URL.")]
	InvalidTarget {
		/// Target as supplied by the caller.
		target: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Access token contains bytes that are not valid in an HTTP header.
	#[error("Access token cannot be encoded as an Authorization header.")]
	InvalidBearer(#[from] reqwest::header::InvalidHeaderValue),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}
