use crate::broker::Broker;
use crate::config::WorkerConfig;
use crate::error::Result;
use crate::metrics::StageMetrics;
use crate::stage::{JobHandler, Stage};
use crate::worker::Worker;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// N independent workers consuming one stage.
pub struct WorkerPool<H> {
	stage: Arc<Stage>,
	handler: Arc<H>,
	config: Arc<WorkerConfig>,
	metrics: StageMetrics,
}

impl<H: JobHandler> WorkerPool<H> {
	#[must_use]
	pub fn new(stage: Stage, handler: H, config: WorkerConfig, metrics: StageMetrics) -> Self {
		Self {
			stage: Arc::new(stage),
			handler: Arc::new(handler),
			config: Arc::new(config),
			metrics,
		}
	}

	/// Opens one broker session per worker, runs them until `cancel` fires and
	/// waits for all of them to stop.
	///
	/// # Errors
	/// Returns an error if a broker session cannot be opened
	pub async fn run<B: Broker>(&self, broker: &B, cancel: CancellationToken) -> Result<()> {
		let mut workers = JoinSet::new();

		for id in 1..=self.config.workers {
			let session = match broker.session().await {
				Ok(session) => session,
				Err(e) => {
					cancel.cancel();
					while workers.join_next().await.is_some() {}
					return Err(e);
				}
			};

			let worker = Worker::new(
				id,
				Arc::clone(&self.stage),
				session,
				Arc::clone(&self.handler),
				Arc::clone(&self.config),
				self.metrics.clone(),
				cancel.clone(),
			);
			workers.spawn(async move { worker.run().await });
		}

		info!(stage = %self.stage.name, workers = self.config.workers, "Worker pool started");

		while let Some(joined) = workers.join_next().await {
			if let Err(e) = joined {
				error!(stage = %self.stage.name, error = %e, "Worker task aborted");
			}
		}

		info!(stage = %self.stage.name, "Worker pool stopped");
		Ok(())
	}
}
