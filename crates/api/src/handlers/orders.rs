use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::{AppError, AppState};

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StartResponse {
    pub message: String,
    pub execution_arn: String,
}

/// Start the order workflow with the request body as its input.
///
/// The body is taken raw so a malformed payload is answered with the JSON
/// error envelope instead of axum's plain-text rejection. The execution runs
/// in the background; only its id is returned.
pub async fn start_order(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<StartResponse>, AppError> {
    let input: Value = serde_json::from_slice(&body)
        .map_err(|e| AppError::Validation(format!("invalid JSON body: {e}")))?;
    if !input.is_object() {
        return Err(AppError::Validation(
            "request body must be a JSON object".into(),
        ));
    }

    let handle = state.executor.start(state.definition.clone(), input);
    info!(execution = %handle.id(), "execution started");

    Ok(Json(StartResponse {
        message: "Execution started".into(),
        execution_arn: handle.id().to_string(),
    }))
}
