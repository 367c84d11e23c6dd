mod config;
mod engine;

use anyhow::Result;
use clap::Parser;
use job_queue::observability::init_tracing;
use job_queue::shutdown::cancel_on_signal;
use job_queue::{HttpSink, RedisBroker, RetryPolicy, Stage, StageService, TranscriptSink, TranscriptionHandler};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use config::Config;
use engine::{CommandEngine, Engine};

const REDIS_MAX_RETRIES: u32 = 5;
const REDIS_INITIAL_BACKOFF_MS: u64 = 500;

#[tokio::main]
async fn main() -> Result<()> {
	// Load environment variables
	dotenvy::dotenv().ok();

	let config = Config::parse();
	config.validate().map_err(anyhow::Error::msg)?;

	init_tracing("info,audio_transcriber=debug,job_queue=debug");

	info!(
		workers = config.worker.workers,
		pending = %config.queues.pending,
		transcribed = %config.queues.transcribed,
		"🎯 Starting transcriber service"
	);

	let engine = build_engine(&config)?;
	let mut handler = TranscriptionHandler::new(engine);
	if let Some(url) = &config.api_url {
		info!(url = %url, "📡 Publishing transcripts");
		let sink: Arc<dyn TranscriptSink> = Arc::new(HttpSink::new(url.clone(), Duration::from_secs(config.api_timeout_secs))?);
		handler = handler.with_sink(sink);
	}

	let broker = RedisBroker::connect_with_retry(&config.broker.url(), REDIS_MAX_RETRIES, Duration::from_millis(REDIS_INITIAL_BACKOFF_MS)).await?;
	let cancel = cancel_on_signal();

	let stage = Stage::transcription(&config.queues, RetryPolicy {
		max_attempts: config.worker.max_attempts(),
	});
	StageService::new(stage, handler, config.worker.clone())
		.watch([config.queues.cleanup_processing.clone(), config.queues.completed.clone()])
		.requeue_stranded(config.requeue_stranded)
		.run(broker, cancel)
		.await?;

	info!("✅ Transcriber stopped");
	Ok(())
}

#[cfg_attr(not(feature = "whisper"), allow(clippy::unnecessary_wraps))]
fn build_engine(config: &Config) -> Result<Engine> {
	#[cfg(feature = "whisper")]
	if let Some(model_path) = &config.whisper_model_path {
		let engine = engine::WhisperEngine::load(model_path, config.whisper_threads, &config.whisper_language)?;
		return Ok(Engine::Whisper(engine));
	}

	info!(command = %config.command, args = ?config.command_args, "🔧 Using external transcribe command");
	Ok(Engine::Command(CommandEngine::new(config.command.clone(), config.command_args.clone())))
}
