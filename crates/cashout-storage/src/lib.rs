//! Durable entity storage for the transfer-out engine.
//!
//! Backends implement a small byte-oriented key-value interface; the
//! orchestrator talks to the typed [`StorageService`] on top of it, which
//! serializes entities as JSON under `namespace:id` keys.

use async_trait::async_trait;
use cashout_types::ConfigSchema;
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

pub mod implementations {
	pub mod file;
	pub mod memory;
}

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
	#[error("Not found")]
	NotFound,
	#[error("Serialization error: {0}")]
	Serialization(String),
	#[error("Backend error: {0}")]
	Backend(String),
	#[error("Unknown storage backend: {0}")]
	UnknownBackend(String),
	#[error("Invalid storage configuration: {0}")]
	Config(String),
}

/// Low-level interface every storage backend implements.
///
/// `set_bytes` must only return once the value is durable.
#[async_trait]
pub trait StorageInterface: Send + Sync {
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError>;

	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError>;

	/// Deleting a missing key is not an error.
	async fn delete(&self, key: &str) -> Result<(), StorageError>;

	async fn exists(&self, key: &str) -> Result<bool, StorageError>;
}

/// Typed storage operations over a backend.
pub struct StorageService {
	backend: Box<dyn StorageInterface>,
}

impl StorageService {
	pub fn new(backend: Box<dyn StorageInterface>) -> Self {
		Self { backend }
	}

	fn key(namespace: &str, id: &str) -> String {
		format!("{}:{}", namespace, id)
	}

	/// Serializes `data` and stores it under `namespace:id`.
	pub async fn store<T: Serialize>(
		&self,
		namespace: &str,
		id: &str,
		data: &T,
	) -> Result<(), StorageError> {
		let bytes =
			serde_json::to_vec(data).map_err(|e| StorageError::Serialization(e.to_string()))?;
		self.backend
			.set_bytes(&Self::key(namespace, id), bytes)
			.await
	}

	/// Reads and deserializes the entity stored under `namespace:id`.
	pub async fn retrieve<T: DeserializeOwned>(
		&self,
		namespace: &str,
		id: &str,
	) -> Result<T, StorageError> {
		let bytes = self.backend.get_bytes(&Self::key(namespace, id)).await?;
		serde_json::from_slice(&bytes).map_err(|e| StorageError::Serialization(e.to_string()))
	}

	/// Like [`retrieve`](Self::retrieve) but maps a missing key to `None`.
	pub async fn retrieve_optional<T: DeserializeOwned>(
		&self,
		namespace: &str,
		id: &str,
	) -> Result<Option<T>, StorageError> {
		match self.retrieve(namespace, id).await {
			Ok(value) => Ok(Some(value)),
			Err(StorageError::NotFound) => Ok(None),
			Err(e) => Err(e),
		}
	}

	pub async fn remove(&self, namespace: &str, id: &str) -> Result<(), StorageError> {
		self.backend.delete(&Self::key(namespace, id)).await
	}

	pub async fn exists(&self, namespace: &str, id: &str) -> Result<bool, StorageError> {
		self.backend.exists(&Self::key(namespace, id)).await
	}
}

/// Builds the backend named in configuration.
pub fn create_storage(
	backend: &str,
	config: &toml::Value,
) -> Result<Box<dyn StorageInterface>, StorageError> {
	match backend {
		"file" => implementations::file::create_storage(config),
		"memory" => Ok(implementations::memory::create_storage(config)),
		other => Err(StorageError::UnknownBackend(other.to_string())),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde::Deserialize;

	#[derive(Debug, PartialEq, Serialize, Deserialize)]
	struct Entity {
		name: String,
		value: u64,
	}

	fn service() -> StorageService {
		StorageService::new(Box::new(implementations::memory::MemoryStorage::new()))
	}

	#[tokio::test]
	async fn test_typed_round_trip_and_remove() {
		let storage = service();
		let entity = Entity {
			name: "current".to_string(),
			value: 42,
		};

		storage.store("transfer", "current", &entity).await.unwrap();
		assert!(storage.exists("transfer", "current").await.unwrap());

		let loaded: Entity = storage.retrieve("transfer", "current").await.unwrap();
		assert_eq!(loaded, entity);

		storage.remove("transfer", "current").await.unwrap();
		let missing: Option<Entity> = storage
			.retrieve_optional("transfer", "current")
			.await
			.unwrap();
		assert!(missing.is_none());
	}

	#[tokio::test]
	async fn test_corrupt_value_is_serialization_error() {
		let backend = implementations::memory::MemoryStorage::new();
		backend
			.set_bytes("transfer:current", b"not json".to_vec())
			.await
			.unwrap();
		let storage = StorageService::new(Box::new(backend));

		let result: Result<Option<Entity>, _> =
			storage.retrieve_optional("transfer", "current").await;
		assert!(matches!(result, Err(StorageError::Serialization(_))));
	}

	#[test]
	fn test_unknown_backend() {
		let config = toml::Value::Table(Default::default());
		assert!(matches!(
			create_storage("redis", &config),
			Err(StorageError::UnknownBackend(name)) if name == "redis"
		));
	}
}
