//! In-memory storage backend. Nothing survives the process; used by tests
//! and by deployments that accept losing in-flight state on restart.

use crate::{StorageError, StorageInterface};
use async_trait::async_trait;
use cashout_types::{ConfigSchema, Schema, ValidationError};
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct MemoryStorage {
	entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStorage {
	pub fn new() -> Self {
		Self::default()
	}
}

pub struct MemoryStorageSchema;

impl ConfigSchema for MemoryStorageSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		Schema::new(vec![], vec![]).validate(config)
	}
}

#[async_trait]
impl StorageInterface for MemoryStorage {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(MemoryStorageSchema)
	}

	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		self.entries
			.read()
			.await
			.get(key)
			.cloned()
			.ok_or(StorageError::NotFound)
	}

	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
		self.entries.write().await.insert(key.to_string(), value);
		Ok(())
	}

	async fn delete(&self, key: &str) -> Result<(), StorageError> {
		self.entries.write().await.remove(key);
		Ok(())
	}

	async fn exists(&self, key: &str) -> Result<bool, StorageError> {
		Ok(self.entries.read().await.contains_key(key))
	}
}

/// Factory for the `memory` backend. Takes no options.
pub fn create_storage(_config: &toml::Value) -> Box<dyn StorageInterface> {
	Box::new(MemoryStorage::new())
}
