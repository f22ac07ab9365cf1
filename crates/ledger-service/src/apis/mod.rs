//! HTTP handler implementations for the ledger API.

use ledger_core::TransitionError;
use ledger_types::ApiError;

pub mod orders;
pub mod payments;

/// Maps a core transition error onto the API error taxonomy.
pub(crate) fn into_api_error(err: TransitionError) -> ApiError {
	match err {
		TransitionError::NotFound(entity) => ApiError::NotFound {
			error_type: "NOT_FOUND".to_string(),
			message: format!("{} not found", entity),
		},
		TransitionError::Validation(message) => ApiError::BadRequest {
			error_type: "INVALID_REQUEST".to_string(),
			message,
			details: None,
		},
		TransitionError::Storage(e) => ApiError::ServiceUnavailable {
			error_type: "STORAGE_UNAVAILABLE".to_string(),
			message: e.to_string(),
		},
	}
}
