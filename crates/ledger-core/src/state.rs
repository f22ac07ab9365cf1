//! State store for orders and payments.
//!
//! Holds the current, overwritable status of each entity together with the
//! rest of its record. Reads are keyed by identifier; the status write
//! primitive is crate-private so the only path that can change a status is
//! the transition orchestrator, which pairs it with an audit log append.

use crate::TransitionError;
use chrono::{DateTime, Utc};
use ledger_storage::{StorageError, StorageService, WriteOp};
use ledger_types::{EntityKind, EntityRef, Order, Payment, Status, StorageKey};
use std::sync::Arc;

/// Maps a storage-level missing key onto the entity that was being read.
fn map_missing(entity: EntityRef) -> impl FnOnce(StorageError) -> TransitionError {
	move |e| match e {
		StorageError::NotFound => TransitionError::NotFound(entity),
		other => TransitionError::Storage(other),
	}
}

/// Storage-backed store of current entity state.
pub struct StateStore {
	storage: Arc<StorageService>,
}

impl StateStore {
	pub fn new(storage: Arc<StorageService>) -> Self {
		Self { storage }
	}

	/// Gets an order by id.
	pub async fn get_order(&self, id: u64) -> Result<Order, TransitionError> {
		self.storage
			.retrieve(StorageKey::Orders.as_str(), &id.to_string())
			.await
			.map_err(map_missing(EntityRef::order(id)))
	}

	/// Gets a payment by id.
	pub async fn get_payment(&self, id: u64) -> Result<Payment, TransitionError> {
		self.storage
			.retrieve(StorageKey::Payments.as_str(), &id.to_string())
			.await
			.map_err(map_missing(EntityRef::payment(id)))
	}

	/// Gets the payment belonging to an order.
	///
	/// The back office addresses payments through their order, so the store
	/// keeps an order-to-payment index alongside the payment records.
	pub async fn get_payment_for_order(&self, order_id: u64) -> Result<Payment, TransitionError> {
		let payment_id: u64 = self
			.storage
			.retrieve(StorageKey::PaymentByOrder.as_str(), &order_id.to_string())
			.await
			.map_err(map_missing(EntityRef::order(order_id)))?;
		self.get_payment(payment_id).await
	}

	/// Returns the live status of an entity.
	pub async fn current_status(&self, entity: EntityRef) -> Result<Status, TransitionError> {
		match entity.kind {
			EntityKind::Order => Ok(Status::Order(self.get_order(entity.id).await?.status)),
			EntityKind::Payment => Ok(Status::Payment(self.get_payment(entity.id).await?.status)),
		}
	}

	/// Creates a new order at its initial status.
	pub async fn create_order(
		&self,
		id: u64,
		total_amount: rust_decimal::Decimal,
	) -> Result<Order, TransitionError> {
		if self
			.storage
			.exists(StorageKey::Orders.as_str(), &id.to_string())
			.await?
		{
			return Err(TransitionError::Validation(format!(
				"order #{} already exists",
				id
			)));
		}

		let order = Order::new(id, total_amount, Utc::now());
		self.storage
			.store(StorageKey::Orders.as_str(), &id.to_string(), &order)
			.await?;
		tracing::info!(order_id = id, "Created order");
		Ok(order)
	}

	/// Creates a new payment for an order at its initial status.
	///
	/// The order must exist and must not already have a payment; the payment
	/// record and the order-to-payment index entry are written together.
	pub async fn create_payment(
		&self,
		id: u64,
		order_id: u64,
		transaction_ref: Option<String>,
	) -> Result<Payment, TransitionError> {
		if !self
			.storage
			.exists(StorageKey::Orders.as_str(), &order_id.to_string())
			.await?
		{
			return Err(TransitionError::NotFound(EntityRef::order(order_id)));
		}
		if self
			.storage
			.exists(StorageKey::Payments.as_str(), &id.to_string())
			.await?
		{
			return Err(TransitionError::Validation(format!(
				"payment #{} already exists",
				id
			)));
		}
		if self
			.storage
			.exists(StorageKey::PaymentByOrder.as_str(), &order_id.to_string())
			.await?
		{
			return Err(TransitionError::Validation(format!(
				"order #{} already has a payment",
				order_id
			)));
		}

		let payment = Payment::new(id, order_id, transaction_ref, Utc::now());
		let ops = vec![
			self.storage
				.put_op(StorageKey::Payments.as_str(), &id.to_string(), &payment)?,
			self.storage.put_op(
				StorageKey::PaymentByOrder.as_str(),
				&order_id.to_string(),
				&id,
			)?,
		];
		self.storage.apply_batch(ops).await?;
		tracing::info!(payment_id = id, order_id, "Created payment");
		Ok(payment)
	}

	/// Reads an entity's record, applies the new status, and returns the
	/// previous status together with the staged write.
	///
	/// Crate-private: a status write must never be committed on its own,
	/// only inside the orchestrator's batch next to its log append.
	pub(crate) async fn stage_status_write(
		&self,
		entity: EntityRef,
		new_status: Status,
		transaction_ref: Option<String>,
		now: DateTime<Utc>,
	) -> Result<(Status, WriteOp), TransitionError> {
		match (entity.kind, new_status) {
			(EntityKind::Order, Status::Order(next)) => {
				let mut order = self.get_order(entity.id).await?;
				let previous = Status::Order(order.status);
				order.status = next;
				order.updated_at = now;
				let op = self.storage.put_op(
					StorageKey::Orders.as_str(),
					&entity.id.to_string(),
					&order,
				)?;
				Ok((previous, op))
			}
			(EntityKind::Payment, Status::Payment(next)) => {
				let mut payment = self.get_payment(entity.id).await?;
				let previous = Status::Payment(payment.status);
				payment.status = next;
				if let Some(reference) = transaction_ref {
					payment.transaction_ref = Some(reference);
				}
				payment.updated_at = now;
				let op = self.storage.put_op(
					StorageKey::Payments.as_str(),
					&entity.id.to_string(),
					&payment,
				)?;
				Ok((previous, op))
			}
			(kind, status) => Err(TransitionError::Validation(format!(
				"status '{}' does not belong to entity kind '{}'",
				status, kind
			))),
		}
	}

	/// Builds the delete operations for an order's record, its payment
	/// record, and the order-to-payment index entry. Returns the payment id
	/// when one exists so the caller can also clear its history; the caller
	/// commits everything as one batch.
	pub(crate) async fn stage_cascade_delete(
		&self,
		order_id: u64,
	) -> Result<(Vec<WriteOp>, Option<u64>), TransitionError> {
		if !self
			.storage
			.exists(StorageKey::Orders.as_str(), &order_id.to_string())
			.await?
		{
			return Err(TransitionError::NotFound(EntityRef::order(order_id)));
		}

		let mut ops = vec![self
			.storage
			.delete_op(StorageKey::Orders.as_str(), &order_id.to_string())];

		let payment_id: Option<u64> = match self
			.storage
			.retrieve(StorageKey::PaymentByOrder.as_str(), &order_id.to_string())
			.await
		{
			Ok(id) => Some(id),
			Err(StorageError::NotFound) => None,
			Err(e) => return Err(TransitionError::Storage(e)),
		};
		if let Some(payment_id) = payment_id {
			ops.push(
				self.storage
					.delete_op(StorageKey::Payments.as_str(), &payment_id.to_string()),
			);
			ops.push(
				self.storage
					.delete_op(StorageKey::PaymentByOrder.as_str(), &order_id.to_string()),
			);
		}

		Ok((ops, payment_id))
	}
}
