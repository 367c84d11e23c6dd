use crate::broker::Broker;
use crate::config::WorkerConfig;
use crate::error::{QueueError, Result};
use crate::job::JobRecord;
use crate::metrics::StageMetrics;
use crate::stage::{FailurePolicy, JobHandler, Stage};
use std::sync::Arc;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// How one claim/process/resolve cycle ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
	/// The claim timed out with nothing to do.
	Idle,
	/// Cancellation fired while waiting for work.
	Cancelled,
	Completed { job_id: String },
	Retried { job_id: String, attempts: u32 },
	Released { job_id: String },
	DeadLettered { job_id: Option<String> },
}

/// A single consumer of one stage. Workers share nothing in-process: the
/// broker's atomic claim is what partitions work between them.
pub struct Worker<B, H> {
	id: usize,
	stage: Arc<Stage>,
	broker: B,
	handler: Arc<H>,
	config: Arc<WorkerConfig>,
	metrics: StageMetrics,
	cancel: CancellationToken,
}

impl<B, H> Worker<B, H>
where
	B: Broker,
	H: JobHandler,
{
	#[must_use]
	pub fn new(id: usize, stage: Arc<Stage>, broker: B, handler: Arc<H>, config: Arc<WorkerConfig>, metrics: StageMetrics, cancel: CancellationToken) -> Self {
		Self {
			id,
			stage,
			broker,
			handler,
			config,
			metrics,
			cancel,
		}
	}

	/// Claims and resolves jobs until cancelled. Errors escaping a cycle are
	/// logged and followed by a fixed pause; the worker itself never exits on them.
	pub async fn run(&self) {
		info!(worker = self.id, stage = %self.stage.name, source = %self.stage.queues.source, "Worker started");

		while !self.cancel.is_cancelled() {
			match self.run_once().await {
				Ok(Resolution::Cancelled) => break,
				Ok(resolution) => debug!(worker = self.id, ?resolution, "Cycle finished"),
				Err(e) => {
					self.metrics.loop_errors.inc();
					error!(worker = self.id, stage = %self.stage.name, error = %e, "Error in worker loop");
					tokio::select! {
						() = self.cancel.cancelled() => break,
						() = sleep(self.config.error_pause) => {}
					}
				}
			}
		}

		info!(worker = self.id, stage = %self.stage.name, "Worker stopped");
	}

	/// Performs one claim/process/resolve cycle.
	///
	/// # Errors
	/// Returns an error if a broker operation fails or a job cannot be re-encoded
	pub async fn run_once(&self) -> Result<Resolution> {
		let queues = &self.stage.queues;

		let claimed = tokio::select! {
			() = self.cancel.cancelled() => return Ok(Resolution::Cancelled),
			claimed = self.broker.claim(&queues.source, &queues.processing, self.config.claim_timeout()) => claimed?,
		};
		let Some(payload) = claimed else {
			return Ok(Resolution::Idle);
		};
		self.metrics.claimed.inc();

		let job = match JobRecord::decode(&payload) {
			Ok(job) => job,
			Err(e) => {
				warn!(worker = self.id, error = %e, payload = %payload, dead_letter = %queues.dead_letter, "Undecodable payload, dead-lettering");
				self.broker.resolve(&queues.processing, &payload, &queues.dead_letter, &payload).await?;
				self.metrics.dead_lettered.inc();
				return Ok(Resolution::DeadLettered { job_id: None });
			}
		};
		info!(worker = self.id, stage = %self.stage.name, job_id = %job.id, attempts = job.attempts, "Claimed job");

		let outcome = tokio::select! {
			() = sleep(self.config.processing_timeout) => Err(QueueError::TimedOut(self.config.processing_timeout)),
			result = self.handler.process(&job) => result,
		};

		match outcome {
			Ok(()) => self.complete(&payload, job).await,
			Err(e) => self.fail(&payload, job, &e).await,
		}
	}

	async fn complete(&self, payload: &str, mut job: JobRecord) -> Result<Resolution> {
		let queues = &self.stage.queues;
		self.handler.complete(&mut job);
		let updated = job.encode()?;

		self.broker.resolve(&queues.processing, payload, &queues.success, &updated).await?;
		self.metrics.succeeded.inc();
		info!(worker = self.id, job_id = %job.id, queue = %queues.success, "Job advanced");

		Ok(Resolution::Completed { job_id: job.id })
	}

	async fn fail(&self, payload: &str, mut job: JobRecord, error: &QueueError) -> Result<Resolution> {
		let queues = &self.stage.queues;

		match self.stage.failure {
			FailurePolicy::Release => {
				self.broker.resolve(&queues.processing, payload, &queues.source, payload).await?;
				self.metrics.released.inc();
				warn!(worker = self.id, job_id = %job.id, queue = %queues.source, error = %error, "Processing failed, released for retry");
				Ok(Resolution::Released { job_id: job.id })
			}
			FailurePolicy::CountAttempts(retry) => {
				job.record_failure(error.to_string());
				let updated = job.encode()?;

				if retry.is_exhausted(job.attempts) {
					self.broker.resolve(&queues.processing, payload, &queues.dead_letter, &updated).await?;
					self.metrics.dead_lettered.inc();
					error!(worker = self.id, job_id = %job.id, attempts = job.attempts, queue = %queues.dead_letter, error = %error, "Retries exhausted, dead-lettering");
					return Ok(Resolution::DeadLettered { job_id: Some(job.id) });
				}

				self.broker.resolve(&queues.processing, payload, &queues.source, &updated).await?;
				self.metrics.retried.inc();
				warn!(worker = self.id, job_id = %job.id, attempts = job.attempts, error = %error, "Processing failed, re-queued");
				Ok(Resolution::Retried {
					job_id: job.id,
					attempts: job.attempts,
				})
			}
		}
	}
}
