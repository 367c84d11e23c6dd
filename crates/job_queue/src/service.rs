use crate::broker::Broker;
use crate::config::WorkerConfig;
use crate::error::Result;
use crate::metrics::{self, PipelineMetrics};
use crate::pool::WorkerPool;
use crate::recovery::requeue_stranded;
use crate::stage::{JobHandler, Stage};
use crate::supervisor::Supervisor;
use prometheus::Registry;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Everything a consuming binary runs: the worker pool for one stage plus
/// queue-depth supervision and the optional metrics endpoint.
pub struct StageService<H> {
	stage: Stage,
	handler: H,
	config: WorkerConfig,
	watched: Vec<String>,
	requeue_stranded: bool,
}

impl<H: JobHandler> StageService<H> {
	#[must_use]
	pub fn new(stage: Stage, handler: H, config: WorkerConfig) -> Self {
		let watched = vec![stage.queues.source.clone(), stage.queues.processing.clone(), stage.queues.success.clone(), stage.queues.dead_letter.clone()];
		Self {
			stage,
			handler,
			config,
			watched,
			requeue_stranded: false,
		}
	}

	/// Queues sampled by the supervisor, in addition to the stage's own.
	#[must_use]
	pub fn watch(mut self, queues: impl IntoIterator<Item = String>) -> Self {
		for queue in queues {
			if !self.watched.contains(&queue) {
				self.watched.push(queue);
			}
		}
		self
	}

	/// Moves leftovers of a previous run out of the processing queue before the workers start.
	#[must_use]
	pub const fn requeue_stranded(mut self, enabled: bool) -> Self {
		self.requeue_stranded = enabled;
		self
	}

	///
	/// # Errors
	/// Returns an error if stranded jobs cannot be re-queued, metrics cannot be
	/// registered, the metrics address cannot be bound or a worker session
	/// cannot be opened
	pub async fn run<B: Broker>(self, broker: B, cancel: CancellationToken) -> Result<()> {
		let queues = &self.stage.queues;
		if self.requeue_stranded {
			requeue_stranded(&broker, &queues.processing, &queues.source).await?;
		}

		let registry = Registry::new();
		let pipeline_metrics = PipelineMetrics::new(&registry)?;
		let listener = match self.config.metrics_addr {
			Some(addr) => Some(metrics::bind(addr).await?),
			None => None,
		};

		let mut background = JoinSet::new();
		if let Some(listener) = listener {
			background.spawn(metrics::serve(listener, registry.clone(), cancel.clone()));
		}

		let supervisor = Supervisor::new(broker.clone(), self.watched, pipeline_metrics.clone(), self.config.heartbeat_interval);
		let supervisor_cancel = cancel.clone();
		background.spawn(async move {
			supervisor.run(supervisor_cancel).await;
			Ok(())
		});

		info!(stage = %self.stage.name, workers = self.config.workers, source = %queues.source, success = %queues.success, "🚀 Starting stage");
		let stage_metrics = pipeline_metrics.stage(&self.stage.name);
		let pool = WorkerPool::new(self.stage, self.handler, self.config, stage_metrics);
		let result = pool.run(&broker, cancel.clone()).await;

		cancel.cancel();
		while let Some(joined) = background.join_next().await {
			match joined {
				Ok(Ok(())) => {}
				Ok(Err(e)) => error!(error = %e, "Background task failed"),
				Err(e) => error!(error = %e, "Background task aborted"),
			}
		}

		result
	}
}
