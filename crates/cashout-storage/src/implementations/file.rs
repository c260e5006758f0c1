//! File-based storage backend.
//!
//! Each key is one file under the configured directory. Writes go to a
//! temporary file that is flushed to disk and then renamed over the target,
//! so a crash leaves either the old or the new value, never a torn one.

use crate::{StorageError, StorageInterface};
use async_trait::async_trait;
use cashout_types::{ConfigSchema, Field, FieldType, Schema, ValidationError};
use std::path::PathBuf;
use tokio::fs;
use tokio::io::AsyncWriteExt;

const DEFAULT_STORAGE_PATH: &str = "./data/cashout";

/// One file per key under a base directory.
pub struct FileStorage {
	base_path: PathBuf,
}

impl FileStorage {
	pub fn new(base_path: PathBuf) -> Self {
		Self { base_path }
	}

	fn get_file_path(&self, key: &str) -> PathBuf {
		let safe_key = key.replace(['/', '\\', ':'], "_");
		self.base_path.join(format!("{}.json", safe_key))
	}
}

pub struct FileStorageSchema;

impl ConfigSchema for FileStorageSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		Schema::new(
			vec![],
			vec![Field::new("storage_path", FieldType::String).with_validator(|value| {
				match value.as_str() {
					Some(path) if !path.trim().is_empty() => Ok(()),
					_ => Err("storage_path must not be empty".to_string()),
				}
			})],
		)
		.validate(config)
	}
}

#[async_trait]
impl StorageInterface for FileStorage {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(FileStorageSchema)
	}

	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		match fs::read(self.get_file_path(key)).await {
			Ok(data) => Ok(data),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::NotFound),
			Err(e) => Err(StorageError::Backend(e.to_string())),
		}
	}

	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
		let path = self.get_file_path(key);

		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent)
				.await
				.map_err(|e| StorageError::Backend(e.to_string()))?;
		}

		let temp_path = path.with_extension("tmp");
		let mut file = fs::File::create(&temp_path)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;
		file.write_all(&value)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;
		file.sync_all()
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;
		drop(file);

		fs::rename(&temp_path, &path)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;

		tracing::trace!(key, path = %path.display(), "persisted entity");
		Ok(())
	}

	async fn delete(&self, key: &str) -> Result<(), StorageError> {
		match fs::remove_file(self.get_file_path(key)).await {
			Ok(_) => Ok(()),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
			Err(e) => Err(StorageError::Backend(e.to_string())),
		}
	}

	async fn exists(&self, key: &str) -> Result<bool, StorageError> {
		fs::try_exists(self.get_file_path(key))
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))
	}
}

/// Configuration parameters:
/// - `storage_path`: base directory (default: `./data/cashout`)
pub fn create_storage(config: &toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> {
	FileStorageSchema
		.validate(config)
		.map_err(|e| StorageError::Config(e.to_string()))?;

	let storage_path = config
		.get("storage_path")
		.and_then(|v| v.as_str())
		.unwrap_or(DEFAULT_STORAGE_PATH);

	Ok(Box::new(FileStorage::new(PathBuf::from(storage_path))))
}
