//! Storage module for the order ledger system.
//!
//! This module provides abstractions for persistent storage of ledger data,
//! supporting different backend implementations such as in-memory or
//! file-based storage. Two capabilities beyond plain key-value access carry
//! the correctness properties of the transition core:
//!
//! - atomic write batches (`apply_batch`): every operation in a batch
//!   becomes visible together or not at all, which is what lets a status
//!   write and its audit log append commit as one unit;
//! - per-row locks (`lock_row`): same-row operations are serialized the way
//!   a relational engine serializes writers on a row, so a reader inside the
//!   critical section always observes the last committed value.

use async_trait::async_trait;
use dashmap::DashMap;
use ledger_types::{ConfigSchema, ImplementationRegistry};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Re-export implementations
pub mod implementations {
	pub mod file;
	pub mod memory;
}

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
	/// Error that occurs when a requested item is not found.
	#[error("Not found")]
	NotFound,
	/// Error that occurs during serialization/deserialization.
	#[error("Serialization error: {0}")]
	Serialization(String),
	/// Error that occurs in the storage backend.
	#[error("Backend error: {0}")]
	Backend(String),
	/// Error that occurs during configuration validation.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// One operation inside an atomic write batch.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
	/// Store the value under the key, creating or overwriting it.
	Put { key: String, value: Vec<u8> },
	/// Remove the key. Removing an absent key is not an error.
	Delete { key: String },
}

impl WriteOp {
	/// The key this operation touches.
	pub fn key(&self) -> &str {
		match self {
			WriteOp::Put { key, .. } => key,
			WriteOp::Delete { key } => key,
		}
	}
}

/// Trait defining the low-level interface for storage backends.
///
/// This trait must be implemented by any storage backend that wants to
/// integrate with the ledger system. It provides basic key-value operations
/// plus prefix listing and all-or-nothing batches.
#[async_trait]
pub trait StorageInterface: Send + Sync {
	/// Retrieves raw bytes for the given key.
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError>;

	/// Stores raw bytes under the given key.
	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError>;

	/// Deletes the value associated with the given key.
	async fn delete(&self, key: &str) -> Result<(), StorageError>;

	/// Checks if a key exists in storage.
	async fn exists(&self, key: &str) -> Result<bool, StorageError>;

	/// Returns all keys starting with the given prefix, in no particular order.
	async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError>;

	/// Applies every operation in the batch, or none of them.
	///
	/// When this method returns an error, no operation from the batch may be
	/// observable through any other method.
	async fn apply_batch(&self, ops: Vec<WriteOp>) -> Result<(), StorageError>;

	/// Returns the configuration schema for validation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;
}

/// Type alias for storage factory functions.
///
/// This is the function signature that all storage implementations must provide
/// to create instances of their storage interface.
pub type StorageFactory = fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>;

/// Registry trait for storage implementations.
pub trait StorageRegistry: ImplementationRegistry<Factory = StorageFactory> {}

/// Get all registered storage implementations.
///
/// Returns a vector of (name, factory) tuples for all available storage
/// implementations, used by wiring code to select the configured backend.
pub fn get_all_implementations() -> Vec<(&'static str, StorageFactory)> {
	use implementations::{file, memory};

	vec![
		(file::Registry::NAME, file::Registry::factory()),
		(memory::Registry::NAME, memory::Registry::factory()),
	]
}

/// Guard for an acquired row lock. The row stays locked until dropped.
pub struct RowGuard {
	_guard: OwnedMutexGuard<()>,
}

/// High-level storage service that provides typed operations.
///
/// The StorageService wraps a low-level storage backend and provides
/// convenient methods for storing and retrieving typed data with automatic
/// serialization/deserialization, plus persisted sequences and the row-lock
/// registry that serializes same-entity mutations.
pub struct StorageService {
	/// The underlying storage backend implementation.
	backend: Box<dyn StorageInterface>,
	/// Per-key async mutexes, created on first use.
	row_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl StorageService {
	/// Creates a new StorageService with the specified backend.
	pub fn new(backend: Box<dyn StorageInterface>) -> Self {
		Self {
			backend,
			row_locks: DashMap::new(),
		}
	}

	fn compose_key(namespace: &str, id: &str) -> String {
		format!("{}:{}", namespace, id)
	}

	/// Acquires the lock for a single row, waiting if another caller holds it.
	///
	/// All reads and writes that must observe a consistent row value belong
	/// inside the scope of the returned guard.
	pub async fn lock_row(&self, namespace: &str, id: &str) -> RowGuard {
		let key = Self::compose_key(namespace, id);
		let lock = self
			.row_locks
			.entry(key)
			.or_insert_with(|| Arc::new(Mutex::new(())))
			.value()
			.clone();
		RowGuard {
			_guard: lock.lock_owned().await,
		}
	}

	/// Stores a serializable value.
	///
	/// The namespace and id are combined to form a unique key.
	/// The data is serialized to JSON before storage.
	pub async fn store<T: Serialize>(
		&self,
		namespace: &str,
		id: &str,
		data: &T,
	) -> Result<(), StorageError> {
		let key = Self::compose_key(namespace, id);
		let bytes =
			serde_json::to_vec(data).map_err(|e| StorageError::Serialization(e.to_string()))?;
		self.backend.set_bytes(&key, bytes).await
	}

	/// Retrieves and deserializes a value from storage.
	pub async fn retrieve<T: DeserializeOwned>(
		&self,
		namespace: &str,
		id: &str,
	) -> Result<T, StorageError> {
		let key = Self::compose_key(namespace, id);
		let bytes = self.backend.get_bytes(&key).await?;
		serde_json::from_slice(&bytes).map_err(|e| StorageError::Serialization(e.to_string()))
	}

	/// Removes a value from storage.
	pub async fn remove(&self, namespace: &str, id: &str) -> Result<(), StorageError> {
		let key = Self::compose_key(namespace, id);
		self.backend.delete(&key).await
	}

	/// Updates an existing value in storage.
	///
	/// Returns an error if the key doesn't exist, making it semantically
	/// different from store() which will create or overwrite.
	pub async fn update<T: Serialize>(
		&self,
		namespace: &str,
		id: &str,
		data: &T,
	) -> Result<(), StorageError> {
		let key = Self::compose_key(namespace, id);

		if !self.backend.exists(&key).await? {
			return Err(StorageError::NotFound);
		}

		let bytes =
			serde_json::to_vec(data).map_err(|e| StorageError::Serialization(e.to_string()))?;
		self.backend.set_bytes(&key, bytes).await
	}

	/// Checks if a value exists in storage.
	pub async fn exists(&self, namespace: &str, id: &str) -> Result<bool, StorageError> {
		let key = Self::compose_key(namespace, id);
		self.backend.exists(&key).await
	}

	/// Retrieves and deserializes every value whose id starts with the prefix.
	///
	/// A key that disappears between listing and retrieval is skipped rather
	/// than reported, so concurrent deletions do not fail readers.
	pub async fn list_prefix<T: DeserializeOwned>(
		&self,
		namespace: &str,
		prefix: &str,
	) -> Result<Vec<T>, StorageError> {
		let keys = self.keys_with_prefix(namespace, prefix).await?;
		let mut items = Vec::with_capacity(keys.len());
		for key in keys {
			match self.backend.get_bytes(&key).await {
				Ok(bytes) => items.push(
					serde_json::from_slice(&bytes)
						.map_err(|e| StorageError::Serialization(e.to_string()))?,
				),
				Err(StorageError::NotFound) => continue,
				Err(e) => return Err(e),
			}
		}
		Ok(items)
	}

	/// Returns the full keys of every entry whose id starts with the prefix.
	pub async fn keys_with_prefix(
		&self,
		namespace: &str,
		prefix: &str,
	) -> Result<Vec<String>, StorageError> {
		let full_prefix = Self::compose_key(namespace, prefix);
		self.backend.list_keys(&full_prefix).await
	}

	/// Builds a batch put operation for a serializable value.
	pub fn put_op<T: Serialize>(
		&self,
		namespace: &str,
		id: &str,
		data: &T,
	) -> Result<WriteOp, StorageError> {
		Ok(WriteOp::Put {
			key: Self::compose_key(namespace, id),
			value: serde_json::to_vec(data)
				.map_err(|e| StorageError::Serialization(e.to_string()))?,
		})
	}

	/// Builds a batch delete operation.
	pub fn delete_op(&self, namespace: &str, id: &str) -> WriteOp {
		WriteOp::Delete {
			key: Self::compose_key(namespace, id),
		}
	}

	/// Builds a batch delete operation from an already-composed key, as
	/// returned by [`keys_with_prefix`](Self::keys_with_prefix).
	pub fn delete_key_op(&self, key: String) -> WriteOp {
		WriteOp::Delete { key }
	}

	/// Applies every operation in the batch atomically.
	pub async fn apply_batch(&self, ops: Vec<WriteOp>) -> Result<(), StorageError> {
		self.backend.apply_batch(ops).await
	}

	/// Reserves the next value of a persisted auto-increment sequence.
	///
	/// The first reservation returns 1. The counter is advanced before the
	/// caller commits whatever the value is used for, so a caller that rolls
	/// back leaves a gap, the same observable behavior as a SQL sequence.
	pub async fn reserve_sequence(
		&self,
		namespace: &str,
		name: &str,
	) -> Result<u64, StorageError> {
		let _guard = self.lock_row(namespace, name).await;
		let key = Self::compose_key(namespace, name);

		let next = match self.backend.get_bytes(&key).await {
			Ok(bytes) => {
				let current: u64 = serde_json::from_slice(&bytes)
					.map_err(|e| StorageError::Serialization(e.to_string()))?;
				current + 1
			}
			Err(StorageError::NotFound) => 1,
			Err(e) => return Err(e),
		};

		let bytes =
			serde_json::to_vec(&next).map_err(|e| StorageError::Serialization(e.to_string()))?;
		self.backend.set_bytes(&key, bytes).await?;
		Ok(next)
	}
}
