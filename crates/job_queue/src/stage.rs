use crate::config::QueueNames;
use crate::error::Result;
use crate::job::JobRecord;
use async_trait::async_trait;

pub const TRANSCRIPTION_STAGE: &str = "transcription";
pub const CLEANUP_STAGE: &str = "cleanup";

/// Queues a stage reads from and resolves into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageQueues {
	pub source: String,
	pub processing: String,
	pub success: String,
	pub dead_letter: String,
}

/// Caps how many failed attempts a job may accumulate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RetryPolicy {
	pub max_attempts: Option<u32>,
}

impl RetryPolicy {
	#[must_use]
	pub const fn unbounded() -> Self {
		Self { max_attempts: None }
	}

	#[must_use]
	pub const fn bounded(max_attempts: u32) -> Self {
		Self {
			max_attempts: Some(max_attempts),
		}
	}

	/// Whether a job that has now failed `attempts` times goes to the dead-letter queue.
	#[must_use]
	pub fn is_exhausted(&self, attempts: u32) -> bool {
		self.max_attempts.is_some_and(|max| attempts >= max)
	}
}

/// What a stage does with a job whose processing step failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
	/// Increment `attempts` and re-queue at the tail of the source, or dead-letter it once exhausted.
	CountAttempts(RetryPolicy),
	/// Put the original payload back on the source untouched.
	Release,
}

#[derive(Debug, Clone)]
pub struct Stage {
	pub name: String,
	pub queues: StageQueues,
	pub failure: FailurePolicy,
}

impl Stage {
	/// pending -> processing -> transcribed, failures re-queued to pending.
	#[must_use]
	pub fn transcription(queues: &QueueNames, retry: RetryPolicy) -> Self {
		Self {
			name: TRANSCRIPTION_STAGE.to_string(),
			queues: StageQueues {
				source: queues.pending.clone(),
				processing: queues.processing.clone(),
				success: queues.transcribed.clone(),
				dead_letter: queues.dead_letter.clone(),
			},
			failure: FailurePolicy::CountAttempts(retry),
		}
	}

	/// transcribed -> cleanup processing -> completed, failures released to transcribed.
	#[must_use]
	pub fn cleanup(queues: &QueueNames) -> Self {
		Self {
			name: CLEANUP_STAGE.to_string(),
			queues: StageQueues {
				source: queues.transcribed.clone(),
				processing: queues.cleanup_processing.clone(),
				success: queues.completed.clone(),
				dead_letter: queues.dead_letter.clone(),
			},
			failure: FailurePolicy::Release,
		}
	}
}

/// The stage-specific work performed on a claimed job.
#[async_trait]
pub trait JobHandler: Send + Sync + 'static {
	/// Runs the external step. An error sends the job down the stage's failure path.
	async fn process(&self, job: &JobRecord) -> Result<()>;

	/// Stamps the job before it moves to the success queue.
	fn complete(&self, job: &mut JobRecord);
}
