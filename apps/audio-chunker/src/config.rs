use clap::Parser;
use job_queue::{BrokerArgs, QueueNames};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(name = "chunker")]
#[command(about = "Splits a WAV recording into fixed-length chunks and enqueues them for transcription", long_about = None)]
pub struct Config {
	/// WAV file to split
	pub input: PathBuf,

	#[command(flatten)]
	pub broker: BrokerArgs,

	#[command(flatten)]
	pub queues: QueueNames,

	/// Label of the source carried by every job, defaults to the input file name
	#[arg(long, env = "MEDIA")]
	pub media: Option<String>,

	/// Chunk length in seconds
	#[arg(long, env = "CHUNK_DURATION", default_value = "15")]
	pub chunk_duration_secs: u64,

	/// Directory receiving the chunk files
	#[arg(long, env = "CHUNKS_DIR", default_value = "audios")]
	pub output_dir: PathBuf,

	/// Chunks exported at the same time
	#[arg(long, env = "MAX_CONCURRENT_EXPORTS", default_value = "4")]
	pub max_concurrent_exports: usize,
}

impl Config {
	/// Validate configuration values
	pub fn validate(&self) -> Result<(), String> {
		self.queues.validate().map_err(|e| e.to_string())?;

		if self.chunk_duration_secs == 0 {
			return Err("chunk_duration_secs must be greater than 0".to_string());
		}

		if self.max_concurrent_exports == 0 {
			return Err("max_concurrent_exports must be at least 1".to_string());
		}

		Ok(())
	}

	pub fn media(&self) -> String {
		self.media
			.clone()
			.or_else(|| self.input.file_stem().map(|stem| stem.to_string_lossy().into_owned()))
			.unwrap_or_else(|| self.input.display().to_string())
	}
}
