use crate::error::{QueueError, Result};
use axum::{extract::State, http::StatusCode, routing::get, Router};
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Pipeline-wide metric families, labelled by stage or queue.
#[derive(Clone)]
pub struct PipelineMetrics {
	claimed: IntCounterVec,
	succeeded: IntCounterVec,
	retried: IntCounterVec,
	released: IntCounterVec,
	dead_lettered: IntCounterVec,
	loop_errors: IntCounterVec,
	queue_depth: IntGaugeVec,
}

/// Counters for a single stage, handed to each of its workers.
#[derive(Clone)]
pub struct StageMetrics {
	pub claimed: IntCounter,
	pub succeeded: IntCounter,
	pub retried: IntCounter,
	pub released: IntCounter,
	pub dead_lettered: IntCounter,
	pub loop_errors: IntCounter,
}

impl PipelineMetrics {
	///
	/// # Errors
	/// Returns an error if a metric with the same name is already registered
	pub fn new(registry: &Registry) -> Result<Self> {
		let counter = |name: &str, help: &str| -> Result<IntCounterVec> {
			let vec = IntCounterVec::new(Opts::new(name, help), &["stage"])?;
			registry.register(Box::new(vec.clone()))?;
			Ok(vec)
		};

		let queue_depth = IntGaugeVec::new(Opts::new("job_queue_depth", "Entries currently in each queue"), &["queue"])?;
		registry.register(Box::new(queue_depth.clone()))?;

		Ok(Self {
			claimed: counter("jobs_claimed_total", "Jobs claimed from a source queue")?,
			succeeded: counter("jobs_succeeded_total", "Jobs advanced to the success queue")?,
			retried: counter("jobs_retried_total", "Jobs re-queued with an incremented attempt counter")?,
			released: counter("jobs_released_total", "Jobs released unchanged back to their source")?,
			dead_lettered: counter("jobs_dead_lettered_total", "Jobs routed to the dead-letter queue")?,
			loop_errors: counter("worker_loop_errors_total", "Errors escaping a worker cycle")?,
			queue_depth,
		})
	}

	/// Metrics backed by a private registry, for callers that do not export them.
	///
	/// # Errors
	/// Returns an error if a metric definition is invalid
	pub fn unregistered() -> Result<Self> {
		Self::new(&Registry::new())
	}

	#[must_use]
	pub fn stage(&self, stage: &str) -> StageMetrics {
		StageMetrics {
			claimed: self.claimed.with_label_values(&[stage]),
			succeeded: self.succeeded.with_label_values(&[stage]),
			retried: self.retried.with_label_values(&[stage]),
			released: self.released.with_label_values(&[stage]),
			dead_lettered: self.dead_lettered.with_label_values(&[stage]),
			loop_errors: self.loop_errors.with_label_values(&[stage]),
		}
	}

	pub fn set_queue_depth(&self, queue: &str, depth: usize) {
		self.queue_depth.with_label_values(&[queue]).set(i64::try_from(depth).unwrap_or(i64::MAX));
	}
}

///
/// # Errors
/// Returns an error if encoding fails
pub fn render(registry: &Registry) -> Result<String> {
	let mut buffer = Vec::new();
	TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
	String::from_utf8(buffer).map_err(|e| QueueError::Conversion(e.to_string()))
}

async fn metrics_handler(State(registry): State<Registry>) -> std::result::Result<String, StatusCode> {
	render(&registry).map_err(|e| {
		error!(error = %e, "Failed to render metrics");
		StatusCode::INTERNAL_SERVER_ERROR
	})
}

/// Binds the metrics listener up front so a taken port fails start-up.
///
/// # Errors
/// Returns an error if the address cannot be bound
pub async fn bind(addr: SocketAddr) -> Result<TcpListener> {
	let listener = TcpListener::bind(addr).await?;
	info!(%addr, "📈 Serving metrics");
	Ok(listener)
}

/// Serves `GET /metrics` on `listener` until `cancel` fires.
///
/// # Errors
/// Returns an error if the server fails while running
pub async fn serve(listener: TcpListener, registry: Registry, cancel: CancellationToken) -> Result<()> {
	let app = Router::new().route("/metrics", get(metrics_handler)).with_state(registry);
	axum::serve(listener, app).with_graceful_shutdown(async move { cancel.cancelled().await }).await?;
	Ok(())
}
