//! `order-workflow` CLI entry-point.
//!
//! Available sub-commands:
//! - `serve`    — start the HTTP server (`POST /orders`).
//! - `run`      — run one execution in-process and print its record.
//! - `validate` — validate a workflow JSON document.
//! - `migrate`  — run pending database migrations.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use engine::sinks::{FanoutPublisher, OutboxPublisher, SqliteOrderTable};
use engine::{
    Definition, ExecutionStatus, ExecutionStore, ExecutorConfig, MemoryExecutionStore,
    SqliteExecutionStore, StepRegistry, WorkflowDocument, WorkflowExecutor,
};
use steps::{BroadcastTopic, MemoryOrderTable, MemoryPublisher, OrderTable, Publisher};

const NOTIFICATION_TOPIC: &str = "order-notifications";
const DEFAULT_DATABASE_URL: &str = "sqlite://order-workflow.db?mode=rwc";

#[derive(Parser)]
#[command(
    name = "order-workflow",
    about = "Sequential order workflow engine",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct EngineArgs {
    /// Workflow document to execute. Defaults to the bundled order workflow.
    #[arg(long)]
    workflow: Option<PathBuf>,

    /// Executor timeout. A `timeoutSeconds` in the workflow document wins.
    #[arg(long, env = "EXECUTION_TIMEOUT_SECS", default_value_t = 120)]
    timeout_secs: u64,
}

#[derive(Subcommand)]
enum Command {
    /// Start the HTTP server.
    Serve {
        #[arg(long, env = "ORDER_WORKFLOW_BIND", default_value = "0.0.0.0:8080")]
        bind: String,
        #[arg(long, env = "DATABASE_URL", default_value = DEFAULT_DATABASE_URL)]
        database_url: String,
        #[command(flatten)]
        engine: EngineArgs,
    },
    /// Run one execution in-process with in-memory sinks.
    Run {
        /// Initial payload as a JSON object.
        input: String,
        #[command(flatten)]
        engine: EngineArgs,
    },
    /// Validate a workflow document.
    Validate {
        /// Path to the workflow JSON file.
        path: PathBuf,
    },
    /// Run pending database migrations.
    Migrate {
        #[arg(long, env = "DATABASE_URL", default_value = DEFAULT_DATABASE_URL)]
        database_url: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve {
            bind,
            database_url,
            engine,
        } => serve(&bind, &database_url, &engine).await,
        Command::Run { input, engine } => run(&input, &engine).await,
        Command::Validate { path } => validate(&path),
        Command::Migrate { database_url } => {
            info!("Running migrations against {database_url}");
            let pool = db::pool::create_pool(&database_url, 2)
                .await
                .context("failed to connect to database")?;
            db::pool::run_migrations(&pool)
                .await
                .context("migration failed")?;
            info!("Migrations applied successfully");
            Ok(())
        }
    }
}

fn load_document(path: Option<&PathBuf>) -> Result<WorkflowDocument> {
    let doc = match path {
        Some(path) => WorkflowDocument::from_path(path)?,
        None => WorkflowDocument::order()?,
    };
    Ok(doc)
}

fn executor_config(args: &EngineArgs) -> ExecutorConfig {
    ExecutorConfig {
        timeout: Duration::from_secs(args.timeout_secs),
    }
}

async fn serve(bind: &str, database_url: &str, args: &EngineArgs) -> Result<()> {
    let pool = db::pool::create_pool(database_url, 10)
        .await
        .context("failed to connect to database")?;
    db::pool::run_migrations(&pool)
        .await
        .context("migration failed")?;

    let topic = BroadcastTopic::new(NOTIFICATION_TOPIC, 256);
    let mut subscriber = topic.subscribe();
    tokio::spawn(async move {
        loop {
            match subscriber.recv().await {
                Ok(n) => info!(
                    subject = %n.subject,
                    failure = n.is_failure(),
                    "notification delivered"
                ),
                Err(RecvError::Lagged(missed)) => {
                    warn!("notification subscriber lagged, {missed} dropped")
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    let targets: Vec<Arc<dyn Publisher>> = vec![
        Arc::new(OutboxPublisher::new(pool.clone(), NOTIFICATION_TOPIC)),
        Arc::new(topic),
    ];
    let registry = StepRegistry::orders(
        Arc::new(SqliteOrderTable::new(pool.clone())),
        Arc::new(FanoutPublisher::new(targets)),
    );
    let document = load_document(args.workflow.as_ref())?;
    let definition = Definition::from_document(&document, &registry)?;
    info!("Loaded workflow {:?}", definition);

    let store: Arc<dyn ExecutionStore> = Arc::new(SqliteExecutionStore::new(pool));
    let executor = WorkflowExecutor::new(store, executor_config(args));
    let state = api::AppState::new(executor, Arc::new(definition));

    info!("Starting API server on {bind}");
    api::serve(bind, state).await.context("server error")?;
    Ok(())
}

async fn run(input: &str, args: &EngineArgs) -> Result<()> {
    let input: Value = serde_json::from_str(input).context("input is not valid JSON")?;
    if !input.is_object() {
        bail!("input must be a JSON object");
    }

    let table: Arc<dyn OrderTable> = Arc::new(MemoryOrderTable::new());
    let publisher: Arc<dyn Publisher> = Arc::new(MemoryPublisher::new());
    let registry = StepRegistry::orders(table, publisher);
    let document = load_document(args.workflow.as_ref())?;
    let definition = Definition::from_document(&document, &registry)?;

    let executor = WorkflowExecutor::new(
        Arc::new(MemoryExecutionStore::new()),
        executor_config(args),
    );
    let record = executor.run(&definition, input).await;
    println!("{}", serde_json::to_string_pretty(&record)?);

    if record.status != ExecutionStatus::Succeeded {
        bail!("execution ended {}", record.status);
    }
    Ok(())
}

fn validate(path: &Path) -> Result<()> {
    let doc = WorkflowDocument::from_path(path)?;
    let registry = StepRegistry::orders(
        Arc::new(MemoryOrderTable::new()),
        Arc::new(MemoryPublisher::new()),
    );

    match Definition::from_document(&doc, &registry) {
        Ok(definition) => {
            println!(
                "✅ Workflow '{}' is valid. Execution order: {:?}",
                definition.name(),
                definition.chain_names()
            );
            Ok(())
        }
        Err(e) => {
            eprintln!("❌ Validation failed: {e}");
            std::process::exit(1);
        }
    }
}
