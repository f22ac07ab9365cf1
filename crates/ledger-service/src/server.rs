//! HTTP server for the ledger API.
//!
//! This module provides the HTTP surface consumed by the admin front end:
//! status mutation and audit history for orders and payments, entity
//! seeding, cascading deletion, and a health probe.

use axum::{
	extract::{Path, State},
	http::StatusCode,
	response::{IntoResponse, Json},
	routing::{get, post},
	Router,
};
use chrono::Utc;
use ledger_config::ApiConfig;
use ledger_core::Ledger;
use ledger_storage::StorageService;
use ledger_types::{
	ApiError, CreateOrderRequest, CreatePaymentRequest, HealthResponse, LogEntryView, Order,
	OrderDetailResponse, Payment, PaymentDetailResponse, StorageKey, TransitionRequest,
	TransitionResponse,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

/// Shared application state for the API server.
#[derive(Clone)]
pub struct AppState {
	/// The transition ledger behind every endpoint.
	pub ledger: Arc<Ledger>,
	/// Storage service, used by the health probe.
	pub storage: Arc<StorageService>,
	/// Service identifier from configuration, echoed by the health probe.
	pub service_id: String,
}

/// Builds the API router over the given state.
pub fn router(state: AppState) -> Router {
	Router::new()
		.nest(
			"/api",
			Router::new()
				.route("/orders", post(handle_create_order))
				.route(
					"/orders/{id}",
					get(handle_get_order).delete(handle_delete_order),
				)
				.route("/orders/{id}/status", post(handle_order_status))
				.route("/orders/{id}/transitions", get(handle_order_transitions))
				.route("/payments", post(handle_create_payment))
				.route("/payments/{order_id}", get(handle_get_payment))
				.route("/payments/{order_id}/status", post(handle_payment_status))
				.route(
					"/payments/{id}/transitions",
					get(handle_payment_transitions),
				),
		)
		.route("/health", get(handle_health))
		.layer(ServiceBuilder::new().layer(CorsLayer::permissive()))
		.with_state(state)
}

/// Starts the HTTP server for the API.
pub async fn start_server(
	api_config: ApiConfig,
	service_id: String,
	ledger: Arc<Ledger>,
	storage: Arc<StorageService>,
) -> Result<(), Box<dyn std::error::Error>> {
	let app = router(AppState {
		ledger,
		storage,
		service_id,
	});

	let bind_address = format!("{}:{}", api_config.host, api_config.port);
	let listener = TcpListener::bind(&bind_address).await?;

	tracing::info!("Ledger API server starting on {}", bind_address);

	axum::serve(listener, app).await?;

	Ok(())
}

/// Handles POST /api/orders requests.
async fn handle_create_order(
	State(state): State<AppState>,
	Json(request): Json<CreateOrderRequest>,
) -> Result<Json<Order>, ApiError> {
	crate::apis::orders::create(&state.ledger, request).await.map(Json)
}

/// Handles GET /api/orders/{id} requests.
async fn handle_get_order(
	State(state): State<AppState>,
	Path(id): Path<u64>,
) -> Result<Json<OrderDetailResponse>, ApiError> {
	crate::apis::orders::get_detail(&state.ledger, id).await.map(Json)
}

/// Handles DELETE /api/orders/{id} requests.
async fn handle_delete_order(
	State(state): State<AppState>,
	Path(id): Path<u64>,
) -> Result<StatusCode, ApiError> {
	crate::apis::orders::delete(&state.ledger, id).await?;
	Ok(StatusCode::NO_CONTENT)
}

/// Handles POST /api/orders/{id}/status requests.
async fn handle_order_status(
	State(state): State<AppState>,
	Path(id): Path<u64>,
	Json(request): Json<TransitionRequest>,
) -> Result<Json<TransitionResponse>, ApiError> {
	crate::apis::orders::update_status(&state.ledger, id, request)
		.await
		.map(Json)
}

/// Handles GET /api/orders/{id}/transitions requests.
async fn handle_order_transitions(
	State(state): State<AppState>,
	Path(id): Path<u64>,
) -> Result<Json<Vec<LogEntryView>>, ApiError> {
	crate::apis::orders::list_transitions(&state.ledger, id)
		.await
		.map(Json)
}

/// Handles POST /api/payments requests.
async fn handle_create_payment(
	State(state): State<AppState>,
	Json(request): Json<CreatePaymentRequest>,
) -> Result<Json<Payment>, ApiError> {
	crate::apis::payments::create(&state.ledger, request).await.map(Json)
}

/// Handles GET /api/payments/{order_id} requests.
///
/// The payment is addressed by its owning order, the way back-office staff
/// reach it.
async fn handle_get_payment(
	State(state): State<AppState>,
	Path(order_id): Path<u64>,
) -> Result<Json<PaymentDetailResponse>, ApiError> {
	crate::apis::payments::get_detail_for_order(&state.ledger, order_id)
		.await
		.map(Json)
}

/// Handles POST /api/payments/{order_id}/status requests.
async fn handle_payment_status(
	State(state): State<AppState>,
	Path(order_id): Path<u64>,
	Json(request): Json<TransitionRequest>,
) -> Result<Json<TransitionResponse>, ApiError> {
	crate::apis::payments::update_status_for_order(&state.ledger, order_id, request)
		.await
		.map(Json)
}

/// Handles GET /api/payments/{id}/transitions requests.
async fn handle_payment_transitions(
	State(state): State<AppState>,
	Path(id): Path<u64>,
) -> Result<Json<Vec<LogEntryView>>, ApiError> {
	crate::apis::payments::list_transitions(&state.ledger, id)
		.await
		.map(Json)
}

/// Handles GET /health requests.
///
/// Reports liveness plus a storage round trip, so a dead backend turns the
/// probe degraded instead of silently serving errors later.
async fn handle_health(State(state): State<AppState>) -> impl IntoResponse {
	let storage_ok = state
		.storage
		.exists(StorageKey::Orders.as_str(), "0")
		.await
		.is_ok();

	let response = HealthResponse {
		status: if storage_ok { "healthy" } else { "degraded" }.to_string(),
		service: state.service_id.clone(),
		storage: if storage_ok {
			"connected"
		} else {
			"disconnected"
		}
		.to_string(),
		timestamp: Utc::now(),
	};

	let code = if storage_ok {
		StatusCode::OK
	} else {
		StatusCode::SERVICE_UNAVAILABLE
	};
	(code, Json(response))
}

#[cfg(test)]
mod tests {
	use super::*;
	use axum::body::Body;
	use axum::http::Request;
	use ledger_storage::implementations::memory::MemoryStorage;
	use serde_json::{json, Value};
	use tower::ServiceExt;

	fn test_router() -> Router {
		let storage = Arc::new(StorageService::new(Box::new(MemoryStorage::new())));
		let ledger = Arc::new(Ledger::new(Arc::clone(&storage)));
		router(AppState {
			ledger,
			storage,
			service_id: "ledger-test".to_string(),
		})
	}

	async fn send(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
		let request = match body {
			Some(body) => Request::builder()
				.method(method)
				.uri(uri)
				.header("content-type", "application/json")
				.body(Body::from(body.to_string()))
				.unwrap(),
			None => Request::builder()
				.method(method)
				.uri(uri)
				.body(Body::empty())
				.unwrap(),
		};

		let response = router.clone().oneshot(request).await.unwrap();
		let status = response.status();
		let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
			.await
			.unwrap();
		let value = if bytes.is_empty() {
			Value::Null
		} else {
			serde_json::from_slice(&bytes).unwrap()
		};
		(status, value)
	}

	#[tokio::test]
	async fn health_reports_connected_storage() {
		let router = test_router();
		let (status, body) = send(&router, "GET", "/health", None).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["status"], "healthy");
		assert_eq!(body["service"], "ledger-test");
		assert_eq!(body["storage"], "connected");
	}

	#[tokio::test]
	async fn order_status_flow_over_http() {
		let router = test_router();

		let (status, _) = send(
			&router,
			"POST",
			"/api/orders",
			Some(json!({"id": 101, "total_amount": "1299.00"})),
		)
		.await;
		assert_eq!(status, StatusCode::OK);

		let (status, body) = send(
			&router,
			"POST",
			"/api/orders/101/status",
			Some(json!({"status": "confirmed", "actor_id": 5, "notes": "phone confirmation"})),
		)
		.await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["previous_status"], "pending");
		assert_eq!(body["new_status"], "confirmed");

		let (status, body) = send(&router, "GET", "/api/orders/101", None).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["order"]["status"], "confirmed");
		let transitions = body["transitions"].as_array().unwrap();
		assert_eq!(transitions.len(), 1);
		assert_eq!(transitions[0]["old_status"], "pending");
		assert_eq!(transitions[0]["new_status"], "confirmed");
		assert_eq!(transitions[0]["notes"], "phone confirmation");
	}

	#[tokio::test]
	async fn missing_order_and_invalid_status_map_to_http_errors() {
		let router = test_router();

		let (status, body) = send(
			&router,
			"POST",
			"/api/orders/9999/status",
			Some(json!({"status": "confirmed", "actor_id": 5})),
		)
		.await;
		assert_eq!(status, StatusCode::NOT_FOUND);
		assert_eq!(body["error"], "NOT_FOUND");

		let (status, body) = send(
			&router,
			"POST",
			"/api/orders/9999/status",
			Some(json!({"status": "totally-bogus", "actor_id": 5})),
		)
		.await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
		assert_eq!(body["error"], "INVALID_STATUS");
	}

	#[tokio::test]
	async fn payment_flow_is_addressed_by_order() {
		let router = test_router();

		send(
			&router,
			"POST",
			"/api/orders",
			Some(json!({"id": 7, "total_amount": "450.00"})),
		)
		.await;
		let (status, _) = send(
			&router,
			"POST",
			"/api/payments",
			Some(json!({"id": 70, "order_id": 7})),
		)
		.await;
		assert_eq!(status, StatusCode::OK);

		let (status, body) = send(
			&router,
			"POST",
			"/api/payments/7/status",
			Some(json!({
				"status": "completed",
				"actor_id": 5,
				"transaction_ref": "TXN-77"
			})),
		)
		.await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["new_status"], "completed");

		let (status, body) = send(&router, "GET", "/api/payments/7", None).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["payment"]["status"], "completed");
		assert_eq!(body["payment"]["transaction_ref"], "TXN-77");
		assert_eq!(body["transitions"].as_array().unwrap().len(), 1);

		// An order status is not accepted for a payment
		let (status, _) = send(
			&router,
			"POST",
			"/api/payments/7/status",
			Some(json!({"status": "shipped", "actor_id": 5})),
		)
		.await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
	}

	#[tokio::test]
	async fn delete_order_cascades_over_http() {
		let router = test_router();

		send(
			&router,
			"POST",
			"/api/orders",
			Some(json!({"id": 8, "total_amount": "100.00"})),
		)
		.await;
		send(
			&router,
			"POST",
			"/api/payments",
			Some(json!({"id": 80, "order_id": 8})),
		)
		.await;
		send(
			&router,
			"POST",
			"/api/orders/8/status",
			Some(json!({"status": "cancelled", "actor_id": 2})),
		)
		.await;

		let (status, _) = send(&router, "DELETE", "/api/orders/8", None).await;
		assert_eq!(status, StatusCode::NO_CONTENT);

		let (status, _) = send(&router, "GET", "/api/orders/8", None).await;
		assert_eq!(status, StatusCode::NOT_FOUND);
		let (status, _) = send(&router, "GET", "/api/payments/8", None).await;
		assert_eq!(status, StatusCode::NOT_FOUND);
	}
}
