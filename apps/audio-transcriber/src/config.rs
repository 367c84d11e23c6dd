use clap::Parser;
use job_queue::{BrokerArgs, QueueNames, WorkerConfig};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(name = "transcriber")]
#[command(about = "Transcribes audio chunks claimed from the pending queue", long_about = None)]
pub struct Config {
	#[command(flatten)]
	pub broker: BrokerArgs,

	#[command(flatten)]
	pub queues: QueueNames,

	#[command(flatten)]
	pub worker: WorkerConfig,

	/// Program run once per chunk; the chunk path is appended as its last argument and stdout is the transcript
	#[arg(long, env = "TRANSCRIBE_COMMAND", default_value = "whisper-cli")]
	pub command: String,

	/// Extra arguments placed before the chunk path
	#[arg(long = "command-arg", env = "TRANSCRIBE_COMMAND_ARGS", value_delimiter = ' ', allow_hyphen_values = true)]
	pub command_args: Vec<String>,

	/// Whisper model path, transcribes in-process instead of running a command
	#[arg(long, env = "WHISPER_MODELS_PATH")]
	pub whisper_model_path: Option<PathBuf>,

	/// Number of threads for Whisper processing
	#[arg(long, env = "WHISPER_THREADS", default_value = "2")]
	pub whisper_threads: i32,

	/// Spoken language hint for Whisper, empty for auto-detect
	#[arg(long, env = "WHISPER_LANGUAGE", default_value = "es")]
	pub whisper_language: String,

	/// Search API endpoint receiving each transcript
	#[arg(long, env = "TRANSCRIPTS_API_URL")]
	pub api_url: Option<String>,

	/// Request timeout for the search API in seconds
	#[arg(long, env = "TRANSCRIPTS_API_TIMEOUT_SECS", default_value = "10")]
	pub api_timeout_secs: u64,

	/// Move jobs left in the processing queue by a previous run back to pending before starting
	#[arg(long, env = "REQUEUE_STRANDED")]
	pub requeue_stranded: bool,
}

impl Config {
	/// Validate configuration values
	pub fn validate(&self) -> Result<(), String> {
		self.queues.validate().map_err(|e| e.to_string())?;
		self.worker.validate().map_err(|e| e.to_string())?;

		if self.whisper_model_path.is_none() && self.command.trim().is_empty() {
			return Err("either a transcribe command or a whisper model path is required".to_string());
		}

		if self.whisper_model_path.is_some() && !cfg!(feature = "whisper") {
			return Err("whisper_model_path requires building with the `whisper` feature".to_string());
		}

		if self.whisper_threads < 1 {
			return Err("whisper_threads must be at least 1".to_string());
		}

		if self.api_timeout_secs == 0 {
			return Err("api_timeout_secs must be greater than 0".to_string());
		}

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_defaults() {
		let config = Config::try_parse_from(["transcriber"]).unwrap();
		assert_eq!(config.command, "whisper-cli");
		assert!(config.command_args.is_empty());
		assert_eq!(config.worker.workers, 3);
		assert_eq!(config.queues.pending, "transcription_jobs");
		assert!(!config.requeue_stranded);
		assert!(config.validate().is_ok());
	}

	#[test]
	fn test_command_args_split_on_spaces() {
		let config = Config::try_parse_from(["transcriber", "--command", "whisper-cli", "--command-arg", "-m models/base.bin -nt"]).unwrap();
		assert_eq!(config.command_args, vec!["-m", "models/base.bin", "-nt"]);
	}

	#[test]
	fn test_shared_queue_rejected() {
		let config = Config::try_parse_from(["transcriber", "--pending-queue", "jobs", "--transcribed-queue", "jobs"]).unwrap();
		assert!(config.validate().is_err());
	}

	#[test]
	fn test_zero_workers_rejected() {
		let config = Config::try_parse_from(["transcriber", "--workers", "0"]).unwrap();
		assert!(config.validate().is_err());
	}
}
