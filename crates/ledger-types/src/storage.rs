//! Storage-related types for the ledger system.

use std::str::FromStr;

/// Storage namespaces for the different data collections.
///
/// This enum provides type safety for storage operations by replacing
/// string literals with strongly typed variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
	/// Namespace for order records.
	Orders,
	/// Namespace for payment records.
	Payments,
	/// Namespace mapping order ids to their payment id.
	PaymentByOrder,
	/// Namespace for status log entries.
	StatusLog,
	/// Namespace for persisted auto-increment counters.
	Sequences,
}

impl StorageKey {
	/// Returns the string representation of the storage namespace.
	pub fn as_str(&self) -> &'static str {
		match self {
			StorageKey::Orders => "orders",
			StorageKey::Payments => "payments",
			StorageKey::PaymentByOrder => "payment_by_order",
			StorageKey::StatusLog => "status_log",
			StorageKey::Sequences => "sequences",
		}
	}

	/// Returns an iterator over all StorageKey variants.
	pub fn all() -> impl Iterator<Item = Self> {
		[
			Self::Orders,
			Self::Payments,
			Self::PaymentByOrder,
			Self::StatusLog,
			Self::Sequences,
		]
		.into_iter()
	}
}

impl FromStr for StorageKey {
	type Err = ();

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"orders" => Ok(Self::Orders),
			"payments" => Ok(Self::Payments),
			"payment_by_order" => Ok(Self::PaymentByOrder),
			"status_log" => Ok(Self::StatusLog),
			"sequences" => Ok(Self::Sequences),
			_ => Err(()),
		}
	}
}

impl From<StorageKey> for &'static str {
	fn from(key: StorageKey) -> Self {
		key.as_str()
	}
}
