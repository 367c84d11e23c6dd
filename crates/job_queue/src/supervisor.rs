use crate::broker::Broker;
use crate::metrics::PipelineMetrics;
use crate::observability::Heartbeat;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Samples queue depths into the metrics and logs a periodic heartbeat.
pub struct Supervisor<B> {
	broker: B,
	queues: Vec<String>,
	metrics: PipelineMetrics,
	interval: Duration,
}

impl<B: Broker> Supervisor<B> {
	#[must_use]
	pub fn new(broker: B, queues: Vec<String>, metrics: PipelineMetrics, interval: Duration) -> Self {
		Self {
			broker,
			queues,
			metrics,
			interval,
		}
	}

	pub async fn run(&self, cancel: CancellationToken) {
		let mut heartbeat = Heartbeat::new(self.interval);

		loop {
			let depths = self.update_metrics().await;
			heartbeat.maybe_log(&depths);

			tokio::select! {
				() = cancel.cancelled() => break,
				() = sleep(self.interval) => {}
			}
		}
	}

	/// Reads the current depth of every watched queue. Queues that cannot be read are skipped.
	pub async fn update_metrics(&self) -> Vec<(String, usize)> {
		let mut depths = Vec::with_capacity(self.queues.len());

		for queue in &self.queues {
			match self.broker.len(queue).await {
				Ok(len) => {
					self.metrics.set_queue_depth(queue, len);
					depths.push((queue.clone(), len));
				}
				Err(e) => warn!(queue = %queue, error = %e, "Failed to read queue depth"),
			}
		}

		depths
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::Result;
	use crate::inmem::InMemBroker;
	use crate::metrics::render;
	use prometheus::Registry;

	#[tokio::test]
	async fn test_update_metrics_reports_depths() -> Result<()> {
		let broker = InMemBroker::new();
		broker.push("pending", "a").await?;
		broker.push("pending", "b").await?;

		let registry = Registry::new();
		let metrics = PipelineMetrics::new(&registry)?;
		let supervisor = Supervisor::new(broker, vec!["pending".to_string(), "done".to_string()], metrics, Duration::from_secs(1));

		let depths = supervisor.update_metrics().await;
		assert_eq!(depths, vec![("pending".to_string(), 2), ("done".to_string(), 0)]);
		assert!(render(&registry)?.contains(r#"job_queue_depth{queue="pending"} 2"#));
		Ok(())
	}

	#[tokio::test]
	async fn test_run_stops_on_cancel() -> Result<()> {
		let supervisor = Supervisor::new(InMemBroker::new(), vec!["pending".to_string()], PipelineMetrics::unregistered()?, Duration::from_secs(60));
		let cancel = CancellationToken::new();
		cancel.cancel();
		tokio::time::timeout(Duration::from_secs(1), supervisor.run(cancel)).await.map_err(|_| crate::error::QueueError::TimedOut(Duration::from_secs(1)))?;
		Ok(())
	}
}
