//! Transport primitives for outbound API calls.
//!
//! [`ApiTransport`] is the dispatcher's only dependency on an HTTP stack. It receives a fully
//! resolved [`Url`] plus an [`OutboundRequest`] whose headers already carry the bearer credential,
//! and returns the raw [`ApiResponse`]. Status handling (401 detection, replay) stays in the
//! dispatcher so custom transports only have to move bytes.

// std
use std::{borrow::Cow, ops::Deref};
// crates.io
use reqwest::{
	Method, StatusCode,
	header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue, RETRY_AFTER},
};
use serde::de::DeserializeOwned;
use time::format_description::well_known::Rfc2822;
// self
use crate::{_prelude::*, auth::TokenSecret, error::TransportError};

/// Boxed future returned by [`ApiTransport::execute`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<ApiResponse, TransportError>> + 'a + Send>>;

/// Abstraction over HTTP clients capable of executing one outbound API call.
///
/// Implementations must be `Send + Sync + 'static` so a single transport can be shared by every
/// dispatcher clone, and the returned future must be `Send` so requests can hop executors.
pub trait ApiTransport
where
	Self: 'static + Send + Sync,
{
	/// Executes `request` against `url` and buffers the whole response.
	fn execute(&self, url: Url, request: OutboundRequest) -> TransportFuture<'_>;
}

/// One logical API call issued by application code.
///
/// The request is cloned for its single replay, so bodies are kept as owned bytes.
#[derive(Clone, Debug)]
pub struct OutboundRequest {
	/// HTTP method.
	pub method: Method,
	/// Path relative to the API base URL, or an absolute `http(s)://` URL.
	pub target: String,
	/// Caller-supplied headers. `Authorization` is overwritten when a credential is attached.
	pub headers: HeaderMap,
	/// Query pairs appended to the resolved URL.
	pub query: Vec<(String, String)>,
	/// Optional request body.
	pub body: Option<Vec<u8>>,
	retried: bool,
}
impl OutboundRequest {
	/// Creates a request with no headers, query, or body.
	pub fn new(method: Method, target: impl Into<String>) -> Self {
		Self {
			method,
			target: target.into(),
			headers: HeaderMap::new(),
			query: Vec::new(),
			body: None,
			retried: false,
		}
	}

	/// Shorthand for a `GET` request.
	pub fn get(target: impl Into<String>) -> Self {
		Self::new(Method::GET, target)
	}

	/// Shorthand for a `POST` request.
	pub fn post(target: impl Into<String>) -> Self {
		Self::new(Method::POST, target)
	}

	/// Shorthand for a `PUT` request.
	pub fn put(target: impl Into<String>) -> Self {
		Self::new(Method::PUT, target)
	}

	/// Shorthand for a `PATCH` request.
	pub fn patch(target: impl Into<String>) -> Self {
		Self::new(Method::PATCH, target)
	}

	/// Shorthand for a `DELETE` request.
	pub fn delete(target: impl Into<String>) -> Self {
		Self::new(Method::DELETE, target)
	}

	/// Adds or replaces a header.
	pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
		self.headers.insert(name, value);

		self
	}

	/// Appends a query pair.
	pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.query.push((key.into(), value.into()));

		self
	}

	/// Sets a raw body.
	pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
		self.body = Some(body.into());

		self
	}

	/// Serializes `payload` as the JSON body and sets `Content-Type: application/json`.
	pub fn json<T>(mut self, payload: &T) -> Result<Self, serde_json::Error>
	where
		T: ?Sized + Serialize,
	{
		self.body = Some(serde_json::to_vec(payload)?);
		self.headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

		Ok(self)
	}

	/// Whether this request has already been replayed after a credential refresh.
	pub fn is_retried(&self) -> bool {
		self.retried
	}

	/// Marks the request as replayed. Returns `false` if it already was, leaving it unchanged.
	pub fn mark_retried(&mut self) -> bool {
		if self.retried {
			return false;
		}

		self.retried = true;

		true
	}

	/// Attaches `token` as `Authorization: Bearer <token>`, replacing any previous value.
	pub fn set_bearer(&mut self, token: &TokenSecret) -> Result<(), TransportError> {
		let mut value = HeaderValue::from_str(&format!("Bearer {}", token.expose()))?;

		value.set_sensitive(true);
		self.headers.insert(AUTHORIZATION, value);

		Ok(())
	}
}

/// Fully buffered response of an outbound call.
#[derive(Clone, Debug)]
pub struct ApiResponse {
	/// HTTP status code.
	pub status: StatusCode,
	/// Response headers.
	pub headers: HeaderMap,
	/// Raw response body.
	pub body: Vec<u8>,
}
impl ApiResponse {
	/// Builds a response from its parts.
	pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Vec<u8>>) -> Self {
		Self { status, headers, body: body.into() }
	}

	/// Returns `true` for `401 Unauthorized`, the only status that triggers a refresh.
	pub fn is_unauthorized(&self) -> bool {
		self.status == StatusCode::UNAUTHORIZED
	}

	/// Returns `true` for 2xx statuses.
	pub fn is_success(&self) -> bool {
		self.status.is_success()
	}

	/// Decodes the body as JSON, reporting the failing field path on error.
	pub fn json<T>(&self) -> Result<T, serde_path_to_error::Error<serde_json::Error>>
	where
		T: DeserializeOwned,
	{
		let mut de = serde_json::Deserializer::from_slice(&self.body);

		serde_path_to_error::deserialize(&mut de)
	}

	/// Returns the body as text, replacing invalid UTF-8.
	pub fn text(&self) -> Cow<'_, str> {
		String::from_utf8_lossy(&self.body)
	}

	/// Retry-After hint expressed as a relative duration.
	pub fn retry_after(&self) -> Option<Duration> {
		parse_retry_after(&self.headers)
	}
}

/// Resolves a request target against the API base URL.
///
/// Absolute `http://`/`https://` targets are used as-is. Anything else is appended to the base
/// path, so `/decks` under `https://api.example.com/v1/` becomes
/// `https://api.example.com/v1/decks`.
pub fn resolve_target(base: &Url, target: &str) -> Result<Url, TransportError> {
	let invalid = |source| TransportError::InvalidTarget { target: target.to_owned(), source };

	if target.starts_with("http://") || target.starts_with("https://") {
		return Url::parse(target).map_err(invalid);
	}

	let mut base = base.clone();

	if !base.path().ends_with('/') {
		let path = format!("{}/", base.path());

		base.set_path(&path);
	}

	base.join(target.trim_start_matches('/')).map_err(invalid)
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
#[derive(Clone, Default)]
pub struct ReqwestTransport(pub ReqwestClient);
impl ReqwestTransport {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
impl AsRef<ReqwestClient> for ReqwestTransport {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
impl Deref for ReqwestTransport {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
impl ApiTransport for ReqwestTransport {
	fn execute(&self, url: Url, request: OutboundRequest) -> TransportFuture<'_> {
		Box::pin(async move {
			let OutboundRequest { method, headers, query, body, .. } = request;
			let mut builder = self.0.request(method, url).headers(headers);

			if !query.is_empty() {
				builder = builder.query(&query);
			}
			if let Some(body) = body {
				builder = builder.body(body);
			}

			let response = builder.send().await?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let body = response.bytes().await?.to_vec();

			Ok(ApiResponse { status, headers, body })
		})
	}
}

pub(crate) fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
	let value = headers.get(RETRY_AFTER)?;
	let raw = value.to_str().ok()?.trim();

	if let Ok(secs) = raw.parse::<u32>() {
		return Some(Duration::seconds(secs.into()));
	}
	if let Ok(moment) = OffsetDateTime::parse(raw, &Rfc2822) {
		let delta = moment - OffsetDateTime::now_utc();

		if delta.is_positive() {
			return Some(delta);
		}
	}

	None
}
