use serde::Deserialize;
use std::env;

/// Configuration for a [`crate::BlobDatastore`]
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatastoreConfig {
    /// Container (bucket) holding the datastore
    pub container: String,

    /// Path inside the container under which every key is stored
    pub root_path: String,

    /// Create the container on open when it does not exist yet
    pub create_container_if_missing: bool,

    /// Name of the lock object placed under a lock scope
    pub lock_file: String,
}

impl Default for DatastoreConfig {
    fn default() -> Self {
        Self {
            container: "ipfs".to_string(),
            root_path: ".ipfs/datastore".to_string(),
            create_container_if_missing: true,
            lock_file: "repo.lock".to_string(),
        }
    }
}

impl DatastoreConfig {
    /// Create a config for a container with defaults
    pub fn new<S: Into<String>>(container: S) -> Self {
        Self {
            container: container.into(),
            ..Self::default()
        }
    }

    /// Read `DOG_DATASTORE_CONTAINER`, `DOG_DATASTORE_ROOT` and
    /// `DOG_DATASTORE_LOCK_FILE`, falling back to defaults
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(container) = env::var("DOG_DATASTORE_CONTAINER") {
            config.container = container;
        }
        if let Ok(root_path) = env::var("DOG_DATASTORE_ROOT") {
            config.root_path = root_path;
        }
        if let Ok(lock_file) = env::var("DOG_DATASTORE_LOCK_FILE") {
            config.lock_file = lock_file;
        }
        config
    }

    /// Set the root path
    pub fn with_root_path<S: Into<String>>(mut self, root_path: S) -> Self {
        self.root_path = root_path.into();
        self
    }

    /// Set the lock object name
    pub fn with_lock_file<S: Into<String>>(mut self, lock_file: S) -> Self {
        self.lock_file = lock_file.into();
        self
    }

    /// Require the container to exist already
    pub fn without_container_creation(mut self) -> Self {
        self.create_container_if_missing = false;
        self
    }
}
