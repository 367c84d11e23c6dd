use std::num::TryFromIntError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, QueueError>;

#[derive(Error, Debug)]
pub enum QueueError {
	#[error("Job execution failed: {0}")]
	Execution(String),
	#[error("Job timed out after {0:?}")]
	TimedOut(std::time::Duration),
	#[error("Invalid chunk: {0}")]
	InvalidChunk(String),
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Redis error: {0}")]
	Redis(#[from] redis::RedisError),
	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),
	#[error("WAV error: {0}")]
	Wav(#[from] hound::Error),
	#[error("HTTP error: {0}")]
	Http(#[from] reqwest::Error),
	#[error("Prometheus error: {0}")]
	Prometheus(#[from] prometheus::Error),
	#[error("Background task failed: {0}")]
	Join(#[from] tokio::task::JoinError),
	#[error("Conversion error: {0}")]
	Conversion(String),
}

impl From<TryFromIntError> for QueueError {
	fn from(error: TryFromIntError) -> Self {
		Self::Conversion(error.to_string())
	}
}
