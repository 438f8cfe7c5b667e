use axum::extract::{Path, State};
use axum::Json;

use engine::ExecutionRecord;

use crate::{AppError, AppState};

/// Stored record of a finished execution. Running executions are not
/// stored yet and answer 404.
pub async fn get_execution(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<ExecutionRecord>, AppError> {
    match state.store().get(&id).await? {
        Some(record) => Ok(Json(record)),
        None => Err(AppError::NotFound(format!("execution '{id}' not found"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::orders::start_order;
    use crate::test_support;
    use axum::body::Bytes;
    use engine::ExecutionStatus;

    #[tokio::test]
    async fn finished_execution_can_be_fetched() {
        let (state, _) = test_support::state();
        let record = state
            .executor
            .run(&state.definition, serde_json::json!({ "orderId": "1" }))
            .await;

        let Json(found) = get_execution(Path(record.id.to_string()), State(state))
            .await
            .unwrap();

        assert_eq!(found.status, ExecutionStatus::Succeeded);
        assert_eq!(found.output["error"]["message"], "Missing amount");
    }

    #[tokio::test]
    async fn started_execution_is_stored_once_finished() {
        let (state, store) = test_support::state();
        let Json(started) = start_order(
            State(state.clone()),
            Bytes::from_static(br#"{ "orderId": "2", "amount": 100 }"#),
        )
        .await
        .unwrap();

        while store.is_empty() {
            tokio::task::yield_now().await;
        }

        let Json(found) = get_execution(Path(started.execution_arn), State(state))
            .await
            .unwrap();
        assert_eq!(found.output["saved"], true);
    }

    #[tokio::test]
    async fn unknown_execution_is_not_found() {
        let (state, _) = test_support::state();
        let err = get_execution(Path("arn:local:states:execution:x:y".into()), State(state))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
