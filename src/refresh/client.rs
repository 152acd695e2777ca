//! The refresh wire call: exchange a refresh token for a new credential pair.

// crates.io
use reqwest::header::{ACCEPT, CONTENT_TYPE};
// self
use crate::{
	_prelude::*,
	auth::{CredentialPair, TokenSecret},
	error::RefreshError,
	http,
};

const MESSAGE_PREVIEW_LEN: usize = 256;

/// Boxed future returned by [`RefreshClient::refresh`].
pub type RefreshFuture<'a> =
	Pin<Box<dyn Future<Output = Result<CredentialPair, RefreshError>> + 'a + Send>>;

/// Performs the refresh call on behalf of the coordinator.
pub trait RefreshClient
where
	Self: Send + Sync,
{
	/// Exchanges `refresh_token` for a new pair. Any failure ends the cycle.
	fn refresh<'a>(&'a self, refresh_token: &'a TokenSecret) -> RefreshFuture<'a>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequestBody<'a> {
	refresh_token: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponseBody {
	access_token: String,
	refresh_token: String,
}

/// POSTs `{"refreshToken": ..}` as JSON and expects `{"accessToken": .., "refreshToken": ..}`.
#[derive(Clone, Debug)]
pub struct ReqwestRefreshClient {
	client: ReqwestClient,
	endpoint: Url,
	timeout: Option<StdDuration>,
}
impl ReqwestRefreshClient {
	/// Creates a client that refreshes against `endpoint`.
	pub fn new(client: ReqwestClient, endpoint: Url) -> Self {
		Self { client, endpoint, timeout: None }
	}

	/// Bounds each refresh call; an elapsed timeout surfaces as [`RefreshError::Network`].
	pub fn with_timeout(mut self, timeout: Option<StdDuration>) -> Self {
		self.timeout = timeout;

		self
	}

	/// Refresh endpoint URL.
	pub fn endpoint(&self) -> &Url {
		&self.endpoint
	}
}
impl RefreshClient for ReqwestRefreshClient {
	fn refresh<'a>(&'a self, refresh_token: &'a TokenSecret) -> RefreshFuture<'a> {
		Box::pin(async move {
			let body =
				serde_json::to_vec(&RefreshRequestBody { refresh_token: refresh_token.expose() })
					.map_err(RefreshError::malformed)?;
			let mut request = self
				.client
				.post(self.endpoint.clone())
				.header(CONTENT_TYPE, "application/json")
				.header(ACCEPT, "application/json")
				.body(body);

			if let Some(timeout) = self.timeout {
				request = request.timeout(timeout);
			}

			let response = request.send().await.map_err(RefreshError::network)?;
			let status = response.status();

			if !status.is_success() {
				let retry_after = http::parse_retry_after(response.headers());
				let text = response.text().await.unwrap_or_default();
				let message = match text.trim() {
					"" => status.canonical_reason().unwrap_or("no reason given").to_owned(),
					trimmed => trimmed.chars().take(MESSAGE_PREVIEW_LEN).collect(),
				};

				return Err(RefreshError::Rejected { status: status.as_u16(), retry_after, message });
			}

			let bytes = response.bytes().await.map_err(RefreshError::network)?;

			parse_refresh_response(&bytes)
		})
	}
}

/// Decodes a refresh response; missing or empty tokens make the response malformed.
pub(crate) fn parse_refresh_response(bytes: &[u8]) -> Result<CredentialPair, RefreshError> {
	let mut de = serde_json::Deserializer::from_slice(bytes);
	let body: RefreshResponseBody =
		serde_path_to_error::deserialize(&mut de).map_err(RefreshError::malformed)?;

	CredentialPair::new(body.access_token, body.refresh_token).map_err(RefreshError::malformed)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn request_body_uses_camel_case() {
		let body = serde_json::to_string(&RefreshRequestBody { refresh_token: "r-1" })
			.expect("Refresh request body should serialize.");

		assert_eq!(body, r#"{"refreshToken":"r-1"}"#);
	}

	#[test]
	fn response_with_both_tokens_parses() {
		let pair = parse_refresh_response(br#"{"accessToken":"a-2","refreshToken":"r-2"}"#)
			.expect("Complete response should parse.");

		assert_eq!(pair.access_token().expose(), "a-2");
		assert_eq!(pair.refresh_token().expose(), "r-2");
	}

	#[test]
	fn response_missing_a_field_is_malformed() {
		let err = parse_refresh_response(br#"{"accessToken":"a-2"}"#)
			.expect_err("Response without refreshToken should be rejected.");

		assert!(matches!(err, RefreshError::Malformed { .. }));
	}

	#[test]
	fn response_with_empty_token_is_malformed() {
		let err = parse_refresh_response(br#"{"accessToken":"","refreshToken":"r-2"}"#)
			.expect_err("Empty access token should be rejected.");

		assert!(matches!(err, RefreshError::Malformed { .. }));
	}

	#[test]
	fn non_json_response_is_malformed() {
		let err = parse_refresh_response(b"<html>gateway</html>")
			.expect_err("HTML body should be rejected.");

		assert!(matches!(err, RefreshError::Malformed { .. }));
	}
}
