use std::sync::Arc;

use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bhasha_config::Settings;
use bhasha_db::{connect, indexes::ensure_indexes};
use bhasha_services::jobs::dispatcher::RedisBroker;
use bhasha_worker::{WorkerContext, consume_queue};

#[derive(Debug, Parser)]
#[command(name = "bhasha-worker", about = "Background task worker")]
struct Args {
    /// Queue names to consume; repeatable. Defaults to the configured
    /// queue set.
    #[arg(long = "queue")]
    queues: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file (silently ignore if missing)
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "bhasha_worker=debug,bhasha_services=debug,bhasha_db=debug".into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    // Load config
    let settings = Settings::load()?;
    let queues = if args.queues.is_empty() {
        settings.worker.queues.clone()
    } else {
        args.queues
    };
    info!(?queues, "Starting Bhasha worker");

    // Connect to MongoDB
    let db = connect(&settings).await?;
    ensure_indexes(&db).await?;

    // Connect to the task broker
    let broker = Arc::new(RedisBroker::connect(&settings.broker.url).await?);

    let ctx = Arc::new(WorkerContext::new(&db, settings, broker)?);

    let mut consumers = Vec::new();
    for queue in queues {
        consumers.push(tokio::spawn(consume_queue(ctx.clone(), queue)));
    }

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, stopping consumers");
    for consumer in &consumers {
        consumer.abort();
    }

    Ok(())
}
