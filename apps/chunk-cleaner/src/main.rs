mod config;

use anyhow::Result;
use clap::Parser;
use job_queue::observability::init_tracing;
use job_queue::shutdown::cancel_on_signal;
use job_queue::{CleanupHandler, RedisBroker, Stage, StageService};
use std::time::Duration;
use tracing::info;

use config::Config;

const REDIS_MAX_RETRIES: u32 = 5;
const REDIS_INITIAL_BACKOFF_MS: u64 = 500;

#[tokio::main]
async fn main() -> Result<()> {
	dotenvy::dotenv().ok();

	let config = Config::parse();
	config.validate().map_err(anyhow::Error::msg)?;

	init_tracing("info,chunk_cleaner=debug,job_queue=debug");

	info!(
		workers = config.worker.workers,
		transcribed = %config.queues.transcribed,
		completed = %config.queues.completed,
		"🧹 Starting cleaner service"
	);

	let broker = RedisBroker::connect_with_retry(&config.broker.url(), REDIS_MAX_RETRIES, Duration::from_millis(REDIS_INITIAL_BACKOFF_MS)).await?;
	let cancel = cancel_on_signal();

	StageService::new(Stage::cleanup(&config.queues), CleanupHandler, config.worker.clone())
		.watch([config.queues.pending.clone(), config.queues.processing.clone()])
		.requeue_stranded(config.requeue_stranded)
		.run(broker, cancel)
		.await?;

	info!("✅ Cleaner stopped");
	Ok(())
}
