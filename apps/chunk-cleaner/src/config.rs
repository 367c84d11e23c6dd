use clap::Parser;
use job_queue::{BrokerArgs, QueueNames, WorkerConfig};

#[derive(Parser, Debug, Clone)]
#[command(name = "cleaner")]
#[command(about = "Deletes transcribed chunk files and marks their jobs completed", long_about = None)]
pub struct Config {
	#[command(flatten)]
	pub broker: BrokerArgs,

	#[command(flatten)]
	pub queues: QueueNames,

	#[command(flatten)]
	pub worker: WorkerConfig,

	/// Move jobs left in the cleanup processing queue by a previous run back before starting
	#[arg(long, env = "REQUEUE_STRANDED")]
	pub requeue_stranded: bool,
}

impl Config {
	/// Validate configuration values
	pub fn validate(&self) -> Result<(), String> {
		self.queues.validate().map_err(|e| e.to_string())?;
		self.worker.validate().map_err(|e| e.to_string())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_defaults() {
		let config = Config::try_parse_from(["cleaner"]).unwrap();
		assert_eq!(config.queues.transcribed, "transcribed_not_deleted");
		assert_eq!(config.queues.cleanup_processing, "deletion_in_process");
		assert_eq!(config.queues.completed, "transcribed_deleted");
		assert!(config.validate().is_ok());
	}

	#[test]
	fn test_overrides() {
		let config = Config::try_parse_from(["cleaner", "--workers", "1", "--requeue-stranded", "--metrics-addr", "127.0.0.1:9100"]).unwrap();
		assert_eq!(config.worker.workers, 1);
		assert!(config.requeue_stranded);
		assert_eq!(config.worker.metrics_addr.map(|addr| addr.port()), Some(9100));
	}

	#[test]
	fn test_same_processing_queue_rejected() {
		let config = Config::try_parse_from(["cleaner", "--cleanup-processing-queue", "transcription_in_process"]).unwrap();
		assert!(config.validate().is_err());
	}
}
