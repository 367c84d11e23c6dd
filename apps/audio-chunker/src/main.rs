mod config;

use anyhow::{bail, Result};
use clap::Parser;
use job_queue::observability::init_tracing;
use job_queue::shutdown::wait_for_shutdown_signal;
use job_queue::{AudioSource, Producer, RedisBroker, WavSource};
use std::sync::Arc;
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

	init_tracing("info,audio_chunker=debug,job_queue=debug");

	let media = config.media();
	info!(input = %config.input.display(), media = %media, chunk_secs = config.chunk_duration_secs, "✂️ Starting chunker");

	let input = config.input.clone();
	let source = Arc::new(tokio::task::spawn_blocking(move || WavSource::open(input)).await??);
	info!(duration_ms = source.duration_ms(), "📂 Loaded source");

	let broker = RedisBroker::connect_with_retry(&config.broker.url(), REDIS_MAX_RETRIES, Duration::from_millis(REDIS_INITIAL_BACKOFF_MS)).await?;
	let producer = Producer::new(
		broker,
		&config.queues.pending,
		&config.output_dir,
		Duration::from_secs(config.chunk_duration_secs),
		config.max_concurrent_exports,
	);

	tokio::select! {
		result = producer.enqueue_source(source, &media) => {
			let jobs = result?;
			info!(jobs = jobs.len(), queue = %config.queues.pending, "✅ Chunking finished");
			Ok(())
		}
		() = wait_for_shutdown_signal() => {
			bail!("interrupted before every chunk was enqueued");
		}
	}
}
