//! File-backed [`CredentialStore`] that survives process restarts.

// std
#[cfg(unix)] use std::os::unix::fs::OpenOptionsExt;
use std::{
	fs::{self, OpenOptions},
	io::Write,
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	auth::CredentialPair,
	config::SessionConfig,
	store::{CredentialStore, StorageKeys, StoreError},
};

type Snapshot = BTreeMap<String, String>;

/// Persists the pair as a JSON object with one string per [`StorageKeys`] entry.
///
/// Every mutation is written to a sibling temp file, synced, and renamed over the target, so both
/// keys change together on disk.
#[derive(Clone, Debug)]
pub struct FileStore {
	path: PathBuf,
	keys: StorageKeys,
	inner: Arc<RwLock<Option<CredentialPair>>>,
}
impl FileStore {
	/// Opens (or creates) a store at the provided path, eagerly loading existing data.
	pub fn open(path: impl Into<PathBuf>, keys: StorageKeys) -> Result<Self, StoreError> {
		let path = path.into();

		Self::ensure_parent_exists(&path)?;

		let current = Self::load_snapshot(&path, &keys)?;

		Ok(Self { path, keys, inner: Arc::new(RwLock::new(current)) })
	}

	/// Opens a store at `path` using the keys configured for the session.
	pub fn from_config(
		path: impl Into<PathBuf>,
		config: &SessionConfig,
	) -> Result<Self, StoreError> {
		Self::open(path, config.storage_keys.clone())
	}

	/// Location of the backing file.
	pub fn path(&self) -> &Path {
		&self.path
	}

	fn load_snapshot(path: &Path, keys: &StorageKeys) -> Result<Option<CredentialPair>, StoreError> {
		if !path.exists() {
			return Ok(None);
		}

		let metadata = path.metadata().map_err(|e| StoreError::Backend {
			message: format!("Failed to inspect {}: {e}", path.display()),
		})?;

		if metadata.len() == 0 {
			return Ok(None);
		}

		let bytes = fs::read(path).map_err(|e| StoreError::Backend {
			message: format!("Failed to read {}: {e}", path.display()),
		})?;
		let snapshot: Snapshot =
			serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
				message: format!("Failed to parse {}: {e}", path.display()),
			})?;

		// A half-written layout (one key only) is treated as signed out.
		match (snapshot.get(&keys.access), snapshot.get(&keys.refresh)) {
			(Some(access), Some(refresh)) =>
				Ok(CredentialPair::new(access.as_str(), refresh.as_str()).ok()),
			_ => Ok(None),
		}
	}

	fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| StoreError::Backend {
				message: format!("Failed to create store directory {}: {e}", parent.display()),
			})?;
		}
		Ok(())
	}

	fn snapshot_of(&self, pair: Option<&CredentialPair>) -> Snapshot {
		let mut snapshot = Snapshot::new();

		if let Some(pair) = pair {
			snapshot.insert(self.keys.access.clone(), pair.access_token().expose().to_owned());
			snapshot.insert(self.keys.refresh.clone(), pair.refresh_token().expose().to_owned());
		}

		snapshot
	}

	fn persist(&self, pair: Option<&CredentialPair>) -> Result<(), StoreError> {
		Self::ensure_parent_exists(&self.path)?;

		let serialized = serde_json::to_vec_pretty(&self.snapshot_of(pair)).map_err(|e| {
			StoreError::Serialization { message: format!("Failed to serialize credentials: {e}") }
		})?;
		let mut tmp_path = self.path.clone();

		tmp_path.set_extension("tmp");

		let replaced = Self::write_synced(&tmp_path, &serialized).and_then(|()| {
			fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::Backend {
				message: format!("Failed to replace {}: {e}", self.path.display()),
			})
		});

		if replaced.is_err() {
			let _ = fs::remove_file(&tmp_path);
		}

		replaced
	}

	fn write_synced(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
		let mut options = OpenOptions::new();

		options.write(true).create(true).truncate(true);

		// Tokens are bearer secrets; keep them owner-only.
		#[cfg(unix)]
		options.mode(0o600);

		let mut file = options.open(path).map_err(|e| StoreError::Backend {
			message: format!("Failed to create {}: {e}", path.display()),
		})?;

		file.write_all(bytes).map_err(|e| StoreError::Backend {
			message: format!("Failed to write {}: {e}", path.display()),
		})?;
		file.sync_all().map_err(|e| StoreError::Backend {
			message: format!("Failed to sync {}: {e}", path.display()),
		})
	}
}
impl CredentialStore for FileStore {
	fn get(&self) -> Option<CredentialPair> {
		self.inner.read().clone()
	}

	fn set(&self, pair: CredentialPair) -> Result<(), StoreError> {
		let mut guard = self.inner.write();

		self.persist(Some(&pair))?;
		*guard = Some(pair);

		Ok(())
	}

	fn clear(&self) -> Result<(), StoreError> {
		let mut guard = self.inner.write();

		self.persist(None)?;
		*guard = None;

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::{env, process};
	// self
	use super::*;

	fn temp_path(label: &str) -> PathBuf {
		let unique = format!(
			"bearer_session_file_store_{label}_{}_{}.json",
			process::id(),
			OffsetDateTime::now_utc().unix_timestamp_nanos(),
		);

		env::temp_dir().join(unique)
	}

	fn pair(access: &str, refresh: &str) -> CredentialPair {
		CredentialPair::new(access, refresh).expect("Credential pair fixture should be valid.")
	}

	#[test]
	fn set_and_reload_round_trip() {
		let path = temp_path("reload");
		let store = FileStore::open(&path, StorageKeys::default())
			.expect("Failed to open file store snapshot.");

		store.set(pair("access-1", "refresh-1")).expect("Failed to persist credentials.");
		drop(store);

		let reopened = FileStore::open(&path, StorageKeys::default())
			.expect("Failed to reopen file store snapshot.");

		assert_eq!(reopened.get(), Some(pair("access-1", "refresh-1")));

		fs::remove_file(&path).unwrap_or_else(|e| {
			panic!("Failed to remove temporary file store snapshot {}: {e}", path.display())
		});
	}

	#[test]
	fn persisted_layout_uses_configured_keys() {
		let path = temp_path("layout");
		let keys = StorageKeys::new("app_access_token", "app_refresh_token");
		let store = FileStore::open(&path, keys).expect("Failed to open file store snapshot.");

		store.set(pair("access-2", "refresh-2")).expect("Failed to persist credentials.");

		let raw: Snapshot = serde_json::from_slice(
			&fs::read(&path).expect("Persisted snapshot should be readable."),
		)
		.expect("Persisted snapshot should be a JSON object of strings.");

		assert_eq!(raw.len(), 2);
		assert_eq!(raw.get("app_access_token").map(String::as_str), Some("access-2"));
		assert_eq!(raw.get("app_refresh_token").map(String::as_str), Some("refresh-2"));

		store.clear().expect("Failed to clear credentials.");

		let raw: Snapshot = serde_json::from_slice(
			&fs::read(&path).expect("Cleared snapshot should be readable."),
		)
		.expect("Cleared snapshot should still be a JSON object.");

		assert!(raw.is_empty());
		assert_eq!(store.get(), None);

		fs::remove_file(&path).unwrap_or_else(|e| {
			panic!("Failed to remove temporary file store snapshot {}: {e}", path.display())
		});
	}

	#[test]
	fn partial_layout_loads_as_signed_out() {
		let path = temp_path("partial");

		fs::write(&path, br#"{"session_access_token":"orphan"}"#)
			.expect("Failed to write partial snapshot fixture.");

		let store = FileStore::open(&path, StorageKeys::default())
			.expect("Partial snapshot should still open.");

		assert_eq!(store.get(), None);

		fs::remove_file(&path).unwrap_or_else(|e| {
			panic!("Failed to remove temporary file store snapshot {}: {e}", path.display())
		});
	}

	#[test]
	fn failed_replace_leaves_no_temp_file() {
		let path = temp_path("failed_replace");
		let store = FileStore::open(&path, StorageKeys::default())
			.expect("Failed to open file store snapshot.");

		// A directory at the target path makes the final rename fail.
		fs::create_dir(&path).expect("Failed to create blocking directory.");

		let err = store
			.set(pair("access-3", "refresh-3"))
			.expect_err("Replacing a directory should fail.");

		assert!(matches!(err, StoreError::Backend { .. }));
		assert!(!path.with_extension("tmp").exists());
		assert_eq!(store.get(), None);

		fs::remove_dir(&path).unwrap_or_else(|e| {
			panic!("Failed to remove blocking directory {}: {e}", path.display())
		});
	}

	#[cfg(unix)]
	#[test]
	fn snapshot_is_private_to_the_owner() {
		// std
		use std::os::unix::fs::PermissionsExt;

		let path = temp_path("mode");
		let store = FileStore::open(&path, StorageKeys::default())
			.expect("Failed to open file store snapshot.");

		store.set(pair("access-4", "refresh-4")).expect("Failed to persist credentials.");

		let mode = fs::metadata(&path).expect("Snapshot should exist.").permissions().mode();

		assert_eq!(mode & 0o777, 0o600);

		fs::remove_file(&path).unwrap_or_else(|e| {
			panic!("Failed to remove temporary file store snapshot {}: {e}", path.display())
		});
	}
}
