//! Latest-state endpoint

use std::sync::Arc;

use axum::{extract::State, response::IntoResponse, Json};
use serde::Serialize;

use super::{ApiError, ApiResponse};
use crate::api::state::AppState;
use crate::types::LatestComponentStates;

/// Payload of `GET /states`
#[derive(Debug, Serialize)]
pub struct StatesPayload {
    pub components: Vec<LatestComponentStates>,
}

/// GET /states - Latest value per (component, key) within the read window
pub async fn get_states(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    match state.store.latest_by_component().await {
        Ok(components) => Ok(Json(ApiResponse::new(StatesPayload { components }))),
        Err(e) => {
            tracing::error!(error = %e, "failed to read latest states");
            Err(ApiError::internal("states failed"))
        }
    }
}
