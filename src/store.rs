//! Storage contract and built-in stores for the session's credential pair.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::{_prelude::*, auth::CredentialPair};

/// Synchronous persistence of the current [`CredentialPair`].
///
/// Reads and writes are immediately visible to later calls. Stores perform no expiry tracking or
/// validation; whether a credential is still good is decided solely by how the API responds.
pub trait CredentialStore
where
	Self: Send + Sync,
{
	/// Returns the current pair, if any.
	fn get(&self) -> Option<CredentialPair>;

	/// Replaces the current pair in one step.
	fn set(&self, pair: CredentialPair) -> Result<(), StoreError>;

	/// Removes both credentials.
	fn clear(&self) -> Result<(), StoreError>;
}

/// Error type produced by [`CredentialStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

/// Fixed keys under which the two credential values are persisted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageKeys {
	/// Key holding the access token.
	pub access: String,
	/// Key holding the refresh token.
	pub refresh: String,
}
impl StorageKeys {
	/// Creates a key set from the provided names.
	pub fn new(access: impl Into<String>, refresh: impl Into<String>) -> Self {
		Self { access: access.into(), refresh: refresh.into() }
	}
}
impl Default for StorageKeys {
	fn default() -> Self {
		Self::new("session_access_token", "session_refresh_token")
	}
}
