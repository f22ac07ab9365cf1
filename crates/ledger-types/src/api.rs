//! API types for HTTP endpoints and request/response structures.
//!
//! These are the JSON payloads exchanged with the admin front end. Statuses
//! cross the API boundary as plain lower-case strings and are parsed against
//! the entity kind's closed domain before any storage access happens.

use crate::{Order, Payment, StatusLogEntry};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

fn default_notes() -> String {
	String::new()
}

/// Request body for a status transition on an order or payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRequest {
	/// The status to move the entity to.
	pub status: String,
	/// The administrative actor performing the change.
	pub actor_id: u64,
	/// Free-text note stored with the log entry.
	#[serde(default = "default_notes")]
	pub notes: String,
	/// External transaction reference; only meaningful for payments, where
	/// it is persisted in the same atomic unit as the status change.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub transaction_ref: Option<String>,
}

/// Response body for a successful transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionResponse {
	/// Status the entity held before the transition.
	pub previous_status: String,
	/// Status the entity holds now.
	pub new_status: String,
	/// Identifier of the log entry recording the change.
	pub log_entry_id: u64,
}

/// One audit log entry as presented to the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntryView {
	/// Identifier of the log entry.
	pub log_entry_id: u64,
	/// The administrative actor who made the change.
	pub actor_id: u64,
	/// Status before the transition.
	pub old_status: String,
	/// Status after the transition.
	pub new_status: String,
	/// Free-text note supplied by the actor.
	pub notes: String,
	/// Timestamp when the entry was written.
	pub created_at: DateTime<Utc>,
}

impl From<StatusLogEntry> for LogEntryView {
	fn from(entry: StatusLogEntry) -> Self {
		Self {
			log_entry_id: entry.log_id,
			actor_id: entry.actor_id,
			old_status: entry.old_status.to_string(),
			new_status: entry.new_status.to_string(),
			notes: entry.notes,
			created_at: entry.created_at,
		}
	}
}

/// Order record together with its transition history, newest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderDetailResponse {
	/// The order record.
	pub order: Order,
	/// Transition history, newest first.
	pub transitions: Vec<LogEntryView>,
}

/// Payment record together with its transition history, newest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentDetailResponse {
	/// The payment record.
	pub payment: Payment,
	/// Transition history, newest first.
	pub transitions: Vec<LogEntryView>,
}

/// Request body for seeding a new order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderRequest {
	/// Identifier for the new order.
	pub id: u64,
	/// Total amount charged for the order.
	pub total_amount: Decimal,
}

/// Request body for seeding a new payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePaymentRequest {
	/// Identifier for the new payment.
	pub id: u64,
	/// Identifier of the order this payment belongs to.
	pub order_id: u64,
	/// External transaction reference, if already known.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub transaction_ref: Option<String>,
}

/// Response body for the health endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
	/// Overall service health: "healthy" or "degraded".
	pub status: String,
	/// Service identifier from configuration.
	pub service: String,
	/// Storage round-trip result: "connected" or "disconnected".
	pub storage: String,
	/// Timestamp of the probe.
	pub timestamp: DateTime<Utc>,
}

/// API error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
	/// Error type/code
	pub error: String,
	/// Human-readable description
	pub message: String,
	/// Additional error context
	pub details: Option<serde_json::Value>,
}

/// Structured API error type with appropriate HTTP status mapping.
#[derive(Debug)]
pub enum ApiError {
	/// Bad request with validation errors (400)
	BadRequest {
		error_type: String,
		message: String,
		details: Option<serde_json::Value>,
	},
	/// Referenced entity does not exist (404)
	NotFound { error_type: String, message: String },
	/// Storage backend unavailable or failing (503)
	ServiceUnavailable { error_type: String, message: String },
	/// Internal server error (500)
	InternalServerError { error_type: String, message: String },
}

impl ApiError {
	/// Get the HTTP status code for this error.
	pub fn status_code(&self) -> u16 {
		match self {
			ApiError::BadRequest { .. } => 400,
			ApiError::NotFound { .. } => 404,
			ApiError::ServiceUnavailable { .. } => 503,
			ApiError::InternalServerError { .. } => 500,
		}
	}

	/// Convert to ErrorResponse for JSON serialization.
	pub fn to_error_response(&self) -> ErrorResponse {
		match self {
			ApiError::BadRequest {
				error_type,
				message,
				details,
			} => ErrorResponse {
				error: error_type.clone(),
				message: message.clone(),
				details: details.clone(),
			},
			ApiError::NotFound {
				error_type,
				message,
			} => ErrorResponse {
				error: error_type.clone(),
				message: message.clone(),
				details: None,
			},
			ApiError::ServiceUnavailable {
				error_type,
				message,
			} => ErrorResponse {
				error: error_type.clone(),
				message: message.clone(),
				details: None,
			},
			ApiError::InternalServerError {
				error_type,
				message,
			} => ErrorResponse {
				error: error_type.clone(),
				message: message.clone(),
				details: None,
			},
		}
	}
}

impl fmt::Display for ApiError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ApiError::BadRequest { message, .. } => write!(f, "Bad Request: {}", message),
			ApiError::NotFound { message, .. } => write!(f, "Not Found: {}", message),
			ApiError::ServiceUnavailable { message, .. } => {
				write!(f, "Service Unavailable: {}", message)
			}
			ApiError::InternalServerError { message, .. } => {
				write!(f, "Internal Server Error: {}", message)
			}
		}
	}
}

impl std::error::Error for ApiError {}

impl axum::response::IntoResponse for ApiError {
	fn into_response(self) -> axum::response::Response {
		use axum::{http::StatusCode, response::Json};

		let status = match self.status_code() {
			400 => StatusCode::BAD_REQUEST,
			404 => StatusCode::NOT_FOUND,
			503 => StatusCode::SERVICE_UNAVAILABLE,
			_ => StatusCode::INTERNAL_SERVER_ERROR,
		};

		let error_response = self.to_error_response();
		(status, Json(error_response)).into_response()
	}
}
