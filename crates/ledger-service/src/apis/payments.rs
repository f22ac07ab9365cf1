//! Payment endpoints for the ledger API.
//!
//! Payments are addressed by their owning order, matching how the back
//! office works: staff open an order and act on its payment from there. A
//! transaction reference supplied with a status change is persisted in the
//! same atomic unit as the status write and the log append.

use crate::apis::into_api_error;
use ledger_core::{Ledger, TransitionCommand};
use ledger_types::{
	ApiError, CreatePaymentRequest, EntityKind, EntityRef, LogEntryView, Payment,
	PaymentDetailResponse, Status, TransitionRequest, TransitionResponse,
};
use tracing::{info, warn};

/// Parses a status string against the payment status domain.
fn parse_payment_status(raw: &str) -> Result<Status, ApiError> {
	Status::parse(EntityKind::Payment, raw).ok_or_else(|| ApiError::BadRequest {
		error_type: "INVALID_STATUS".to_string(),
		message: format!("'{}' is not a payment status", raw),
		details: None,
	})
}

/// Applies a status transition to the payment of the given order.
pub async fn update_status_for_order(
	ledger: &Ledger,
	order_id: u64,
	request: TransitionRequest,
) -> Result<TransitionResponse, ApiError> {
	let new_status = parse_payment_status(&request.status)?;

	let payment = ledger
		.state()
		.get_payment_for_order(order_id)
		.await
		.map_err(into_api_error)?;

	let mut command =
		TransitionCommand::new(EntityRef::payment(payment.id), new_status, request.actor_id);
	command.notes = request.notes;
	command.transaction_ref = request.transaction_ref;

	let outcome = ledger.transition(command).await.map_err(|e| {
		warn!(order_id, payment_id = payment.id, "Payment transition failed: {}", e);
		into_api_error(e)
	})?;

	Ok(TransitionResponse {
		previous_status: outcome.previous_status.to_string(),
		new_status: outcome.new_status.to_string(),
		log_entry_id: outcome.log_entry_id,
	})
}

/// Returns the payment of an order together with its transition history.
pub async fn get_detail_for_order(
	ledger: &Ledger,
	order_id: u64,
) -> Result<PaymentDetailResponse, ApiError> {
	let payment = ledger
		.state()
		.get_payment_for_order(order_id)
		.await
		.map_err(into_api_error)?;
	let transitions = list_transitions(ledger, payment.id).await?;
	Ok(PaymentDetailResponse {
		payment,
		transitions,
	})
}

/// Returns a payment's transition history by payment id, newest first.
pub async fn list_transitions(
	ledger: &Ledger,
	payment_id: u64,
) -> Result<Vec<LogEntryView>, ApiError> {
	let entries = ledger
		.list_transitions(EntityRef::payment(payment_id))
		.await
		.map_err(into_api_error)?;
	Ok(entries.into_iter().map(LogEntryView::from).collect())
}

/// Seeds a new payment at its initial status.
pub async fn create(ledger: &Ledger, request: CreatePaymentRequest) -> Result<Payment, ApiError> {
	let payment = ledger
		.state()
		.create_payment(request.id, request.order_id, request.transaction_ref)
		.await
		.map_err(into_api_error)?;
	info!(payment_id = payment.id, order_id = payment.order_id, "Payment created via API");
	Ok(payment)
}
