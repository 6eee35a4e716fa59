//! Ingest endpoint

use std::sync::Arc;

use axum::{body::Bytes, extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::Value;

use super::{Ack, ApiError, ApiResponse};
use crate::api::state::AppState;
use crate::validation::{validate_ingest, Validation};

/// POST /ingest - Validate, stamp and append one event
///
/// The body is parsed leniently: anything that is not a JSON object is
/// treated as an empty object and rejected for its missing `valueHash`.
pub async fn ingest(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);

    let event = match validate_ingest(&body, state.timestamps.next()) {
        Validation::Valid(event) => event,
        Validation::Invalid(reason) => {
            tracing::debug!(%reason, "rejected ingest body");
            return Err(ApiError::bad_request(reason.to_string()));
        }
    };

    if let Err(e) = state.store.insert(&event).await {
        tracing::error!(
            component = %event.component_name,
            key = %event.key,
            error = %e,
            "failed to store event"
        );
        return Err(ApiError::internal("ingest failed"));
    }

    tracing::debug!(
        component = %event.component_name,
        key = %event.key,
        is_error = event.is_error,
        "stored event"
    );
    state.dispatch_alert(&event);

    Ok((StatusCode::CREATED, Json(ApiResponse::new(Ack {}))))
}
