//! The access/refresh credential pair held by a session.

// self
use crate::{_prelude::*, auth::TokenSecret};

/// Errors raised while validating a [`CredentialPair`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, ThisError)]
pub enum CredentialError {
	/// Access token was empty.
	#[error("Access token must not be empty.")]
	EmptyAccessToken,
	/// Refresh token was empty.
	#[error("Refresh token must not be empty.")]
	EmptyRefreshToken,
}

/// Access and refresh tokens that are always stored, replaced, and cleared together.
///
/// Fields are private so a pair can only be built through [`CredentialPair::new`], which rejects
/// empty tokens. Stores hold the pair as a single value, so readers never see an access token from
/// one pair next to the refresh token of another.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CredentialPair {
	access_token: TokenSecret,
	refresh_token: TokenSecret,
}
impl CredentialPair {
	/// Builds a pair after checking that neither token is empty.
	pub fn new(
		access_token: impl Into<String>,
		refresh_token: impl Into<String>,
	) -> Result<Self, CredentialError> {
		let access_token = TokenSecret::new(access_token);
		let refresh_token = TokenSecret::new(refresh_token);

		if access_token.is_empty() {
			return Err(CredentialError::EmptyAccessToken);
		}
		if refresh_token.is_empty() {
			return Err(CredentialError::EmptyRefreshToken);
		}

		Ok(Self { access_token, refresh_token })
	}

	/// Short-lived credential attached to each outbound request.
	pub fn access_token(&self) -> &TokenSecret {
		&self.access_token
	}

	/// Longer-lived credential exchanged for a new pair.
	pub fn refresh_token(&self) -> &TokenSecret {
		&self.refresh_token
	}

	/// Splits the pair into `(access, refresh)`.
	pub fn into_parts(self) -> (TokenSecret, TokenSecret) {
		(self.access_token, self.refresh_token)
	}
}
