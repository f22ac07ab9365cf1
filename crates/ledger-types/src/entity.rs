//! Entity records and status domains for the order ledger.
//!
//! Orders and payments are the two kinds of entity subject to status
//! transitions. Their status domains are closed enums so that an invalid
//! value is rejected at the boundary instead of silently persisted, and the
//! current status field is only ever written through the transition
//! orchestrator in `ledger-core`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The two kinds of entity that carry an auditable status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
	/// A customer order.
	Order,
	/// The payment associated with an order.
	Payment,
}

impl EntityKind {
	/// Returns the string representation used in keys and API paths.
	pub fn as_str(&self) -> &'static str {
		match self {
			EntityKind::Order => "order",
			EntityKind::Payment => "payment",
		}
	}
}

impl fmt::Display for EntityKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for EntityKind {
	type Err = ();

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"order" => Ok(Self::Order),
			"payment" => Ok(Self::Payment),
			_ => Err(()),
		}
	}
}

/// Reference to a single order or payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
	/// Which kind of entity is referenced.
	pub kind: EntityKind,
	/// The entity's identifier within its kind.
	pub id: u64,
}

impl EntityRef {
	/// Creates a reference to an order.
	pub fn order(id: u64) -> Self {
		Self {
			kind: EntityKind::Order,
			id,
		}
	}

	/// Creates a reference to a payment.
	pub fn payment(id: u64) -> Self {
		Self {
			kind: EntityKind::Payment,
			id,
		}
	}
}

impl fmt::Display for EntityRef {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} #{}", self.kind, self.id)
	}
}

/// Lifecycle status of an order.
///
/// The set mirrors the values the back office persists; no ordering or
/// transition graph is imposed on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
	/// Order has been placed but not yet confirmed.
	Pending,
	/// Order has been confirmed by staff.
	Confirmed,
	/// Order is being prepared.
	Processing,
	/// Order has been handed to delivery.
	Shipped,
	/// Order has reached the customer.
	Delivered,
	/// Order was cancelled.
	Cancelled,
	/// Order was refunded after cancellation or return.
	Refunded,
}

impl fmt::Display for OrderStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			OrderStatus::Pending => "pending",
			OrderStatus::Confirmed => "confirmed",
			OrderStatus::Processing => "processing",
			OrderStatus::Shipped => "shipped",
			OrderStatus::Delivered => "delivered",
			OrderStatus::Cancelled => "cancelled",
			OrderStatus::Refunded => "refunded",
		};
		f.write_str(s)
	}
}

impl FromStr for OrderStatus {
	type Err = ();

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"pending" => Ok(Self::Pending),
			"confirmed" => Ok(Self::Confirmed),
			"processing" => Ok(Self::Processing),
			"shipped" => Ok(Self::Shipped),
			"delivered" => Ok(Self::Delivered),
			"cancelled" => Ok(Self::Cancelled),
			"refunded" => Ok(Self::Refunded),
			_ => Err(()),
		}
	}
}

/// Settlement status of a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
	/// Payment has been initiated but not settled.
	Pending,
	/// Payment settled successfully.
	Completed,
	/// Payment attempt failed.
	Failed,
	/// Payment was returned to the customer.
	Refunded,
}

impl fmt::Display for PaymentStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			PaymentStatus::Pending => "pending",
			PaymentStatus::Completed => "completed",
			PaymentStatus::Failed => "failed",
			PaymentStatus::Refunded => "refunded",
		};
		f.write_str(s)
	}
}

impl FromStr for PaymentStatus {
	type Err = ();

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"pending" => Ok(Self::Pending),
			"completed" => Ok(Self::Completed),
			"failed" => Ok(Self::Failed),
			"refunded" => Ok(Self::Refunded),
			_ => Err(()),
		}
	}
}

/// A status value tagged with the entity kind it belongs to.
///
/// Used wherever an operation is generic over orders and payments, such as
/// audit log entries and transition outcomes. The adjacent tagging keeps the
/// serialized form unambiguous even though both domains contain "pending"
/// and "refunded".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Status {
	/// An order status.
	Order(OrderStatus),
	/// A payment status.
	Payment(PaymentStatus),
}

impl Status {
	/// Returns the entity kind this status belongs to.
	pub fn kind(&self) -> EntityKind {
		match self {
			Status::Order(_) => EntityKind::Order,
			Status::Payment(_) => EntityKind::Payment,
		}
	}

	/// Parses a status string against the domain of the given entity kind.
	///
	/// Returns `None` when the string is not a member of that kind's status
	/// set, including when it belongs only to the other kind.
	pub fn parse(kind: EntityKind, s: &str) -> Option<Self> {
		match kind {
			EntityKind::Order => s.parse::<OrderStatus>().ok().map(Status::Order),
			EntityKind::Payment => s.parse::<PaymentStatus>().ok().map(Status::Payment),
		}
	}
}

impl fmt::Display for Status {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Status::Order(s) => s.fmt(f),
			Status::Payment(s) => s.fmt(f),
		}
	}
}

/// A customer order as held by the state store.
///
/// The `status` field is owned exclusively by the state store and mutated
/// only through a transition; callers read it but never assign it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
	/// Unique identifier for this order.
	pub id: u64,
	/// Current status of the order.
	pub status: OrderStatus,
	/// Total amount charged for the order.
	pub total_amount: Decimal,
	/// Timestamp when this order was created.
	pub created_at: DateTime<Utc>,
	/// Timestamp when this order was last updated.
	pub updated_at: DateTime<Utc>,
}

impl Order {
	/// Creates a new order at its initial status.
	pub fn new(id: u64, total_amount: Decimal, now: DateTime<Utc>) -> Self {
		Self {
			id,
			status: OrderStatus::Pending,
			total_amount,
			created_at: now,
			updated_at: now,
		}
	}
}

/// The payment backing an order. One payment exists per order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
	/// Unique identifier for this payment.
	pub id: u64,
	/// Identifier of the order this payment belongs to.
	pub order_id: u64,
	/// Current settlement status.
	pub status: PaymentStatus,
	/// External transaction reference, when the gateway supplied one.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub transaction_ref: Option<String>,
	/// Timestamp when this payment was created.
	pub created_at: DateTime<Utc>,
	/// Timestamp when this payment was last updated.
	pub updated_at: DateTime<Utc>,
}

impl Payment {
	/// Creates a new payment at its initial status.
	pub fn new(id: u64, order_id: u64, transaction_ref: Option<String>, now: DateTime<Utc>) -> Self {
		Self {
			id,
			order_id,
			status: PaymentStatus::Pending,
			transaction_ref,
			created_at: now,
			updated_at: now,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn status_parse_is_kind_checked() {
		assert_eq!(
			Status::parse(EntityKind::Order, "shipped"),
			Some(Status::Order(OrderStatus::Shipped))
		);
		assert_eq!(
			Status::parse(EntityKind::Payment, "completed"),
			Some(Status::Payment(PaymentStatus::Completed))
		);
		// "completed" is a payment status only
		assert_eq!(Status::parse(EntityKind::Order, "completed"), None);
		// "shipped" is an order status only
		assert_eq!(Status::parse(EntityKind::Payment, "shipped"), None);
		assert_eq!(Status::parse(EntityKind::Order, "bogus"), None);
	}

	#[test]
	fn status_serializes_with_kind_tag() {
		let order_pending = Status::Order(OrderStatus::Pending);
		let payment_pending = Status::Payment(PaymentStatus::Pending);

		let a = serde_json::to_string(&order_pending).unwrap();
		let b = serde_json::to_string(&payment_pending).unwrap();
		assert_ne!(a, b);

		let back: Status = serde_json::from_str(&b).unwrap();
		assert_eq!(back, payment_pending);
	}

	#[test]
	fn display_matches_persisted_strings() {
		assert_eq!(OrderStatus::Processing.to_string(), "processing");
		assert_eq!(PaymentStatus::Failed.to_string(), "failed");
		assert_eq!(Status::Order(OrderStatus::Cancelled).to_string(), "cancelled");
	}
}
