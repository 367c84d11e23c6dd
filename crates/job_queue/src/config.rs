use crate::error::{QueueError, Result};
use clap::Args;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::time::Duration;

/// Where the broker lives.
#[derive(Args, Clone, Debug, Serialize, Deserialize)]
pub struct BrokerArgs {
	#[arg(long, env = "REDIS_URL", help = "Full redis URL, overrides host and port")]
	pub redis_url: Option<String>,

	#[arg(long, env = "REDIS_HOST", default_value = "localhost")]
	pub redis_host: String,

	#[arg(long, env = "REDIS_PORT", default_value = "6379")]
	pub redis_port: u16,
}

impl BrokerArgs {
	#[must_use]
	pub fn url(&self) -> String {
		self.redis_url.clone().unwrap_or_else(|| format!("redis://{}:{}", self.redis_host, self.redis_port))
	}
}

/// Names of the pipeline queues. Every stage reads the same set so producers and
/// consumers agree on the topology.
#[derive(Args, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueNames {
	#[arg(long = "pending-queue", env = "REDIS_QUEUE_TRANSCRIPTION_JOB", default_value = "transcription_jobs")]
	pub pending: String,

	#[arg(long = "processing-queue", env = "REDIS_QUEUE_IN_TRANSCRIPTION_PROCESS", default_value = "transcription_in_process")]
	pub processing: String,

	#[arg(long = "transcribed-queue", env = "REDIS_QUEUE_TRANSCRIBED_FILES_NOT_DELETED_JOB", default_value = "transcribed_not_deleted")]
	pub transcribed: String,

	#[arg(long = "cleanup-processing-queue", env = "REDIS_QUEUE_IN_DELETION_PROCESS", default_value = "deletion_in_process")]
	pub cleanup_processing: String,

	#[arg(long = "completed-queue", env = "REDIS_QUEUE_TRANSCRIBED_DELETED", default_value = "transcribed_deleted")]
	pub completed: String,

	#[arg(long = "dead-letter-queue", env = "REDIS_QUEUE_DEAD_LETTER", default_value = "dead_letter_jobs")]
	pub dead_letter: String,
}

impl Default for QueueNames {
	fn default() -> Self {
		Self {
			pending: "transcription_jobs".to_string(),
			processing: "transcription_in_process".to_string(),
			transcribed: "transcribed_not_deleted".to_string(),
			cleanup_processing: "deletion_in_process".to_string(),
			completed: "transcribed_deleted".to_string(),
			dead_letter: "dead_letter_jobs".to_string(),
		}
	}
}

impl QueueNames {
	#[must_use]
	pub fn all(&self) -> [&str; 6] {
		[&self.pending, &self.processing, &self.transcribed, &self.cleanup_processing, &self.completed, &self.dead_letter]
	}

	///
	/// # Errors
	/// Returns an error if a name is empty or two roles share a queue
	pub fn validate(&self) -> Result<()> {
		let mut seen = HashSet::new();
		for name in self.all() {
			if name.trim().is_empty() {
				return Err(QueueError::Config("queue names must not be empty".to_string()));
			}
			if !seen.insert(name) {
				return Err(QueueError::Config(format!("queue '{name}' is configured for more than one role")));
			}
		}
		Ok(())
	}
}

/// Worker loop tuning shared by every consuming stage.
#[derive(Args, Clone, Debug, Serialize, Deserialize)]
pub struct WorkerConfig {
	#[arg(long, env = "WORKERS", default_value = "3", help = "Number of concurrent workers")]
	pub workers: usize,

	#[arg(
		long = "claim-timeout-secs",
		env = "CLAIM_TIMEOUT_SECS",
		default_value = "0",
		help = "Seconds a claim waits for work before looping, 0 blocks indefinitely"
	)]
	pub claim_timeout_secs: u64,

	#[arg(
		long = "error-pause-ms",
		env = "ERROR_PAUSE_MS",
		default_value = "1000",
		value_parser = parse_millis,
		help = "Pause after a loop error before claiming again"
	)]
	pub error_pause: Duration,

	#[arg(
		long = "processing-timeout-secs",
		env = "PROCESSING_TIMEOUT_SECS",
		default_value = "300",
		value_parser = parse_duration,
		help = "Processing step timeout in seconds, exceeding it counts as a failure"
	)]
	pub processing_timeout: Duration,

	#[arg(long, env = "MAX_ATTEMPTS", default_value = "5", help = "Failed attempts before a job is dead-lettered, 0 retries forever")]
	pub max_attempts: u32,

	#[arg(
		long = "heartbeat-interval-secs",
		env = "HEARTBEAT_INTERVAL_SECS",
		default_value = "30",
		value_parser = parse_duration,
		help = "Queue depth sampling and heartbeat interval in seconds"
	)]
	pub heartbeat_interval: Duration,

	#[arg(long, env = "METRICS_ADDR", help = "Serve prometheus metrics on this address")]
	pub metrics_addr: Option<SocketAddr>,
}

impl Default for WorkerConfig {
	fn default() -> Self {
		Self {
			workers: 3,
			claim_timeout_secs: 0,
			error_pause: Duration::from_secs(1),
			processing_timeout: Duration::from_secs(300),
			max_attempts: 5,
			heartbeat_interval: Duration::from_secs(30),
			metrics_addr: None,
		}
	}
}

impl WorkerConfig {
	#[must_use]
	pub const fn claim_timeout(&self) -> Option<Duration> {
		match self.claim_timeout_secs {
			0 => None,
			secs => Some(Duration::from_secs(secs)),
		}
	}

	#[must_use]
	pub const fn max_attempts(&self) -> Option<u32> {
		match self.max_attempts {
			0 => None,
			max => Some(max),
		}
	}

	///
	/// # Errors
	/// Returns an error if a value would stall or disable the workers
	pub fn validate(&self) -> Result<()> {
		if self.workers == 0 {
			return Err(QueueError::Config("workers must be at least 1".to_string()));
		}
		if self.processing_timeout.is_zero() {
			return Err(QueueError::Config("processing timeout must be greater than 0".to_string()));
		}
		if self.heartbeat_interval.is_zero() {
			return Err(QueueError::Config("heartbeat interval must be greater than 0".to_string()));
		}
		Ok(())
	}
}

fn parse_duration(s: &str) -> std::result::Result<Duration, std::num::ParseIntError> {
	s.parse::<u64>().map(Duration::from_secs)
}

fn parse_millis(s: &str) -> std::result::Result<Duration, std::num::ParseIntError> {
	s.parse::<u64>().map(Duration::from_millis)
}
