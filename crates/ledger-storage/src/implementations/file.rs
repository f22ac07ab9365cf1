//! File-based storage backend implementation for the ledger service.
//!
//! This module stores each key as a JSON file beneath a base directory,
//! mapping the colon-separated key segments to sub-directories so that
//! prefix listing is a directory walk. Writes go to a temporary file that is
//! renamed into place; batches stage every temporary file before publishing
//! any of them.

use crate::{StorageError, StorageInterface, WriteOp};
use async_trait::async_trait;
use ledger_types::{ConfigSchema, Field, FieldType, Schema, ValidationError};
use std::path::{Path, PathBuf};
use tokio::fs;

/// File-based storage implementation.
///
/// This implementation provides simple persistence without requiring
/// external dependencies. Data survives restarts; sequences and audit
/// history are reloaded from the same files they were written to.
pub struct FileStorage {
	/// Base directory path for storing files.
	base_path: PathBuf,
}

impl FileStorage {
	/// Creates a new FileStorage instance with the specified base path.
	pub fn new(base_path: PathBuf) -> Self {
		Self { base_path }
	}

	/// Converts a storage key to a filesystem path.
	///
	/// Key segments (split on ':') become directory levels, with the last
	/// segment naming a .json file. Segments are sanitized so a key can
	/// never escape the base directory.
	fn key_path(&self, key: &str) -> PathBuf {
		let mut path = self.base_path.clone();
		let segments: Vec<&str> = key.split(':').collect();
		for (i, segment) in segments.iter().enumerate() {
			let safe = sanitize_segment(segment);
			if i == segments.len() - 1 {
				path.push(format!("{}.json", safe));
			} else {
				path.push(safe);
			}
		}
		path
	}

	/// Reconstructs the storage key for a file below the base directory.
	fn path_key(&self, path: &Path) -> Option<String> {
		let rel = path.strip_prefix(&self.base_path).ok()?;
		let mut segments = Vec::new();
		for component in rel.components() {
			segments.push(component.as_os_str().to_str()?.to_string());
		}
		let last = segments.pop()?;
		segments.push(last.strip_suffix(".json")?.to_string());
		Some(segments.join(":"))
	}

	/// Walks the base directory and returns every stored key.
	async fn walk_keys(&self) -> Result<Vec<String>, StorageError> {
		let mut keys = Vec::new();
		let mut pending = vec![self.base_path.clone()];

		while let Some(dir) = pending.pop() {
			let mut entries = match fs::read_dir(&dir).await {
				Ok(entries) => entries,
				Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
				Err(e) => return Err(StorageError::Backend(e.to_string())),
			};

			while let Some(entry) = entries
				.next_entry()
				.await
				.map_err(|e| StorageError::Backend(e.to_string()))?
			{
				let path = entry.path();
				if path.is_dir() {
					pending.push(path);
				} else if path.extension() == Some(std::ffi::OsStr::new("json")) {
					if let Some(key) = self.path_key(&path) {
						keys.push(key);
					}
				}
			}
		}

		Ok(keys)
	}

	/// Writes bytes to a temporary file next to the target path.
	async fn stage(&self, path: &Path, value: &[u8]) -> Result<PathBuf, StorageError> {
		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent)
				.await
				.map_err(|e| StorageError::Backend(e.to_string()))?;
		}

		let temp_path = path.with_extension("tmp");
		fs::write(&temp_path, value)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;
		Ok(temp_path)
	}
}

/// Replaces characters that carry filesystem meaning inside a key segment.
fn sanitize_segment(segment: &str) -> String {
	segment.replace(['/', '\\', '.'], "_")
}

#[async_trait]
impl StorageInterface for FileStorage {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		let path = self.key_path(key);

		match fs::read(&path).await {
			Ok(data) => Ok(data),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::NotFound),
			Err(e) => Err(StorageError::Backend(e.to_string())),
		}
	}

	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
		let path = self.key_path(key);
		let temp_path = self.stage(&path, &value).await?;

		fs::rename(&temp_path, &path)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;

		Ok(())
	}

	async fn delete(&self, key: &str) -> Result<(), StorageError> {
		let path = self.key_path(key);

		match fs::remove_file(&path).await {
			Ok(_) => Ok(()),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
			Err(e) => Err(StorageError::Backend(e.to_string())),
		}
	}

	async fn exists(&self, key: &str) -> Result<bool, StorageError> {
		let path = self.key_path(key);
		Ok(path.exists())
	}

	async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
		let keys = self.walk_keys().await?;
		Ok(keys.into_iter().filter(|k| k.starts_with(prefix)).collect())
	}

	async fn apply_batch(&self, ops: Vec<WriteOp>) -> Result<(), StorageError> {
		for op in &ops {
			if op.key().is_empty() {
				return Err(StorageError::Backend("Empty key in batch".into()));
			}
		}

		// Stage every put first; a failure here publishes nothing.
		let mut staged: Vec<(PathBuf, PathBuf)> = Vec::new();
		for op in &ops {
			if let WriteOp::Put { key, value } = op {
				let path = self.key_path(key);
				match self.stage(&path, value).await {
					Ok(temp_path) => staged.push((temp_path, path)),
					Err(e) => {
						for (temp_path, _) in &staged {
							if let Err(cleanup) = fs::remove_file(temp_path).await {
								tracing::warn!(
									"Failed to remove staged file {:?}: {}",
									temp_path,
									cleanup
								);
							}
						}
						return Err(e);
					}
				}
			}
		}

		// Publish the staged puts, then apply deletes.
		for (temp_path, path) in staged {
			fs::rename(&temp_path, &path)
				.await
				.map_err(|e| StorageError::Backend(e.to_string()))?;
		}
		for op in ops {
			if let WriteOp::Delete { key } = op {
				self.delete(&key).await?;
			}
		}

		Ok(())
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(FileStorageSchema)
	}
}

/// Configuration schema for FileStorage.
pub struct FileStorageSchema;

impl ConfigSchema for FileStorageSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![], // No required fields
			vec![Field::new("storage_path", FieldType::String)],
		);
		schema.validate(config)
	}
}

/// Registry entry for the file backend.
pub struct Registry;

impl ledger_types::ImplementationRegistry for Registry {
	const NAME: &'static str = "file";
	type Factory = crate::StorageFactory;

	fn factory() -> Self::Factory {
		create_storage
	}
}

impl crate::StorageRegistry for Registry {}

/// Factory function to create a file storage backend from configuration.
///
/// Configuration parameters:
/// - `storage_path`: Base directory for file storage (default: "./data/ledger")
pub fn create_storage(config: &toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> {
	let storage_path = config
		.get("storage_path")
		.and_then(|v| v.as_str())
		.unwrap_or("./data/ledger")
		.to_string();

	Ok(Box::new(FileStorage::new(PathBuf::from(storage_path))))
}
