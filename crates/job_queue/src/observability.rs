use std::time::{Duration, Instant};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Installs the global tracing subscriber. `RUST_LOG` wins over `default_filter`.
pub fn init_tracing(default_filter: &str) {
	let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

	tracing_subscriber::registry().with(env_filter).with(tracing_subscriber::fmt::layer().with_target(true)).init();
}

/// Heartbeat logger - call this periodically to track service health
pub struct Heartbeat {
	last_heartbeat: Instant,
	interval: Duration,
}

impl Heartbeat {
	#[must_use]
	pub fn new(interval: Duration) -> Self {
		Self {
			last_heartbeat: Instant::now(),
			interval,
		}
	}

	/// Check if it's time for a heartbeat and log queue depths if so
	pub fn maybe_log(&mut self, depths: &[(String, usize)]) -> bool {
		if self.last_heartbeat.elapsed() < self.interval {
			return false;
		}

		let summary = depths.iter().map(|(queue, len)| format!("{queue}={len}")).collect::<Vec<_>>().join(" ");
		info!(queues = %summary, "💓 Heartbeat");
		self.last_heartbeat = Instant::now();
		true
	}
}
