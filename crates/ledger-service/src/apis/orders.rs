//! Order endpoints for the ledger API.
//!
//! Status mutation and history retrieval for orders. All mutations go
//! through the transition orchestrator; there is no direct status write
//! anywhere in the API surface.

use crate::apis::into_api_error;
use ledger_core::{Ledger, TransitionCommand};
use ledger_types::{
	ApiError, CreateOrderRequest, EntityKind, EntityRef, LogEntryView, Order, OrderDetailResponse,
	Status, TransitionRequest, TransitionResponse,
};
use tracing::{info, warn};

/// Parses a status string against the order status domain.
fn parse_order_status(raw: &str) -> Result<Status, ApiError> {
	Status::parse(EntityKind::Order, raw).ok_or_else(|| ApiError::BadRequest {
		error_type: "INVALID_STATUS".to_string(),
		message: format!("'{}' is not an order status", raw),
		details: None,
	})
}

/// Applies a status transition to an order.
pub async fn update_status(
	ledger: &Ledger,
	order_id: u64,
	request: TransitionRequest,
) -> Result<TransitionResponse, ApiError> {
	let new_status = parse_order_status(&request.status)?;

	let mut command = TransitionCommand::new(EntityRef::order(order_id), new_status, request.actor_id);
	command.notes = request.notes;
	command.transaction_ref = request.transaction_ref;

	let outcome = ledger.transition(command).await.map_err(|e| {
		warn!(order_id, "Order transition failed: {}", e);
		into_api_error(e)
	})?;

	Ok(TransitionResponse {
		previous_status: outcome.previous_status.to_string(),
		new_status: outcome.new_status.to_string(),
		log_entry_id: outcome.log_entry_id,
	})
}

/// Returns an order together with its transition history.
pub async fn get_detail(ledger: &Ledger, order_id: u64) -> Result<OrderDetailResponse, ApiError> {
	let order = ledger
		.state()
		.get_order(order_id)
		.await
		.map_err(into_api_error)?;
	let transitions = list_transitions(ledger, order_id).await?;
	Ok(OrderDetailResponse { order, transitions })
}

/// Returns an order's transition history, newest first.
pub async fn list_transitions(
	ledger: &Ledger,
	order_id: u64,
) -> Result<Vec<LogEntryView>, ApiError> {
	let entries = ledger
		.list_transitions(EntityRef::order(order_id))
		.await
		.map_err(into_api_error)?;
	Ok(entries.into_iter().map(LogEntryView::from).collect())
}

/// Seeds a new order at its initial status.
///
/// Stands in for the order-placement system that owns entity creation in
/// production; creation writes no log entry.
pub async fn create(ledger: &Ledger, request: CreateOrderRequest) -> Result<Order, ApiError> {
	let order = ledger
		.state()
		.create_order(request.id, request.total_amount)
		.await
		.map_err(into_api_error)?;
	info!(order_id = order.id, "Order created via API");
	Ok(order)
}

/// Deletes an order, its payment, and both audit histories.
pub async fn delete(ledger: &Ledger, order_id: u64) -> Result<(), ApiError> {
	ledger.delete_order(order_id).await.map_err(|e| {
		warn!(order_id, "Order deletion failed: {}", e);
		into_api_error(e)
	})
}
