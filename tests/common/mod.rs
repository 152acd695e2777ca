//! Shared fixtures for the integration tests.

#![allow(dead_code)]

// std
use std::sync::Arc;
// crates.io
use parking_lot::Mutex;
// self
use bearer_session::{
	auth::CredentialPair,
	config::SessionConfig,
	escalation::{Navigator, ReauthEvent},
	session::Session,
	store::{CredentialStore, MemoryStore},
	url::Url,
};

/// Navigator that keeps every re-authentication event for later assertions.
#[derive(Clone, Debug, Default)]
pub struct RecordingNavigator(Arc<Mutex<Vec<ReauthEvent>>>);
impl RecordingNavigator {
	pub fn events(&self) -> Vec<ReauthEvent> {
		self.0.lock().clone()
	}

	pub fn count(&self) -> usize {
		self.0.lock().len()
	}
}
impl Navigator for RecordingNavigator {
	fn reauthenticate(&self, event: ReauthEvent) {
		self.0.lock().push(event);
	}
}

pub fn pair(access: &str, refresh: &str) -> CredentialPair {
	CredentialPair::new(access, refresh).expect("Credential pair fixture should be valid.")
}

/// Loopback configuration rooted at the mock server.
pub fn test_config(base_url: &str) -> SessionConfig {
	let base = Url::parse(base_url).expect("Mock server URL should parse.");

	SessionConfig::builder(base).build().expect("Test session config should validate.")
}

/// Builds a reqwest-backed session over an in-memory store, optionally seeded with credentials.
pub fn build_test_session(
	config: SessionConfig,
	seed: Option<CredentialPair>,
) -> (Session, Arc<MemoryStore>, RecordingNavigator) {
	let store_backend = Arc::new(MemoryStore::default());

	if let Some(pair) = seed {
		store_backend.set(pair).expect("Seeding the memory store should succeed.");
	}

	let store: Arc<dyn CredentialStore> = store_backend.clone();
	let navigator = RecordingNavigator::default();
	let session = Session::new(config, store, Arc::new(navigator.clone()))
		.expect("Test session should build.");

	(session, store_backend, navigator)
}
