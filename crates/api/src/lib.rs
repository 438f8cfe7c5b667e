//! `api` crate — HTTP layer for starting and inspecting executions.
//!
//! Exposes:
//!   POST /orders            start the order workflow with the JSON body
//!   GET  /executions/{id}   stored record of a finished execution
//!   GET  /health

pub mod error;
pub mod handlers;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use engine::{Definition, ExecutionStore, WorkflowExecutor};

pub use error::AppError;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub executor: WorkflowExecutor,
    /// The definition started by `POST /orders`.
    pub definition: Arc<Definition>,
}

impl AppState {
    pub fn new(executor: WorkflowExecutor, definition: Arc<Definition>) -> Self {
        Self {
            executor,
            definition,
        }
    }

    pub fn store(&self) -> &Arc<dyn ExecutionStore> {
        self.executor.store()
    }
}

/// Build the router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/orders", post(handlers::orders::start_order))
        .route("/executions/{id}", get(handlers::executions::get_execution))
        .route("/health", get(handlers::health::health))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Bind `addr` and serve until the process is stopped.
pub async fn serve(addr: &str, state: AppState) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, build_router(state)).await
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use engine::{ExecutorConfig, MemoryExecutionStore};
    use steps::{
        MemoryOrderTable, MemoryPublisher, NotifyOrder, ProcessOrder, SaveOrder, ValidateOrder,
    };

    pub fn state() -> (AppState, Arc<MemoryExecutionStore>) {
        let store = Arc::new(MemoryExecutionStore::new());
        let executor = WorkflowExecutor::new(store.clone(), ExecutorConfig::default());

        let mut builder = Definition::builder("order-workflow");
        builder.add_step(Arc::new(ValidateOrder::new())).unwrap();
        builder.add_step(Arc::new(ProcessOrder::new())).unwrap();
        builder
            .add_step(Arc::new(SaveOrder::new(Arc::new(MemoryOrderTable::new()))))
            .unwrap();
        builder
            .add_step(Arc::new(NotifyOrder::new(Arc::new(MemoryPublisher::new()))))
            .unwrap();
        builder.add_catch("validate", "notify").unwrap();

        (
            AppState::new(executor, Arc::new(builder.build().unwrap())),
            store,
        )
    }
}
