//! Append-only transition logger.
//!
//! Every status change is recorded as a `StatusLogEntry` written in the same
//! atomic batch as the state write. Entries are never modified once written;
//! the only deletion path is the cascading removal of the parent entity.

use crate::TransitionError;
use ledger_storage::{StorageService, WriteOp};
use ledger_types::{EntityRef, StatusLogEntry, StorageKey};
use std::sync::Arc;

/// Name of the persisted sequence that allocates log entry ids.
const LOG_SEQUENCE: &str = "status_log";

/// Storage-backed append-only history of status changes.
pub struct TransitionLogger {
	storage: Arc<StorageService>,
}

impl TransitionLogger {
	pub fn new(storage: Arc<StorageService>) -> Self {
		Self { storage }
	}

	/// Reserves the next log entry id.
	///
	/// Ids are allocated from one persisted sequence shared by both entity
	/// kinds, so they are strictly increasing in commit order across the
	/// whole ledger. A transition that later rolls back leaves a gap.
	pub(crate) async fn next_entry_id(&self) -> Result<u64, TransitionError> {
		Ok(self
			.storage
			.reserve_sequence(StorageKey::Sequences.as_str(), LOG_SEQUENCE)
			.await?)
	}

	/// Builds the staged append for a log entry.
	///
	/// Crate-private: an entry is only ever committed by the orchestrator,
	/// in the same batch as the state write it describes. The logger does
	/// not check `old_status` against the live value; the orchestrator reads
	/// both under one row lock so they cannot diverge.
	pub(crate) fn append_op(&self, entry: &StatusLogEntry) -> Result<WriteOp, TransitionError> {
		let id = Self::entry_key(entry.entity, entry.log_id);
		Ok(self
			.storage
			.put_op(StorageKey::StatusLog.as_str(), &id, entry)?)
	}

	/// Storage id for one entry: zero-padded so lexicographic order follows
	/// numeric order in file listings.
	fn entry_key(entity: EntityRef, log_id: u64) -> String {
		format!("{}:{}:{:020}", entity.kind.as_str(), entity.id, log_id)
	}

	/// Prefix covering every entry of one entity.
	fn entity_prefix(entity: EntityRef) -> String {
		format!("{}:{}:", entity.kind.as_str(), entity.id)
	}

	/// Returns the transition history of an entity, newest first.
	///
	/// Ordered by creation time descending with the entry id as tiebreak;
	/// ids follow commit order, so the ordering is strict even when
	/// timestamps collide.
	pub async fn list_for(&self, entity: EntityRef) -> Result<Vec<StatusLogEntry>, TransitionError> {
		let mut entries: Vec<StatusLogEntry> = self
			.storage
			.list_prefix(StorageKey::StatusLog.as_str(), &Self::entity_prefix(entity))
			.await?;
		entries.sort_by(|a, b| {
			b.created_at
				.cmp(&a.created_at)
				.then(b.log_id.cmp(&a.log_id))
		});
		Ok(entries)
	}

	/// Returns the raw storage keys of an entity's history, for cascade
	/// deletion.
	pub(crate) async fn keys_for(&self, entity: EntityRef) -> Result<Vec<String>, TransitionError> {
		Ok(self
			.storage
			.keys_with_prefix(StorageKey::StatusLog.as_str(), &Self::entity_prefix(entity))
			.await?)
	}
}
