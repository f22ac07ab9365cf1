//! Audit log entry types for status transitions.
//!
//! A `StatusLogEntry` is written as a side effect of every transition and is
//! never modified afterwards. The only way an entry disappears is the
//! cascading deletion of its parent entity.

use crate::{EntityRef, Status};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One immutable record of a status change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusLogEntry {
	/// Sequence-allocated identifier, strictly increasing in commit order.
	pub log_id: u64,
	/// The order or payment this entry describes.
	pub entity: EntityRef,
	/// The administrative actor who made the change.
	pub actor_id: u64,
	/// Status before the transition.
	pub old_status: Status,
	/// Status after the transition.
	pub new_status: Status,
	/// Free-text note supplied by the actor.
	pub notes: String,
	/// Timestamp when the entry was written.
	pub created_at: DateTime<Utc>,
}

/// Result of a successful transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionOutcome {
	/// Status the entity held before the transition.
	pub previous_status: Status,
	/// Status the entity holds now.
	pub new_status: Status,
	/// Identifier of the log entry recording the change.
	pub log_entry_id: u64,
}
