//! Thread-safe in-memory [`CredentialStore`] for tests and short-lived clients.

// self
use crate::{
	_prelude::*,
	auth::CredentialPair,
	store::{CredentialStore, StoreError},
};

/// Keeps the credential pair in-process; nothing survives a restart.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(Arc<RwLock<Option<CredentialPair>>>);
impl MemoryStore {
	/// Creates a store that already holds `pair`.
	pub fn with_credentials(pair: CredentialPair) -> Self {
		Self(Arc::new(RwLock::new(Some(pair))))
	}
}
impl CredentialStore for MemoryStore {
	fn get(&self) -> Option<CredentialPair> {
		self.0.read().clone()
	}

	fn set(&self, pair: CredentialPair) -> Result<(), StoreError> {
		*self.0.write() = Some(pair);

		Ok(())
	}

	fn clear(&self) -> Result<(), StoreError> {
		self.0.write().take();

		Ok(())
	}
}
