use crate::broker::Broker;
use crate::error::Result;
use tracing::{info, warn};

/// Moves every entry of `processing` back to the tail of `source`.
///
/// Only safe while no worker of that stage is running: a live worker's
/// in-flight job would be handed out a second time.
///
/// # Errors
/// Returns an error if a broker operation fails; entries moved before the failure stay moved
pub async fn requeue_stranded<B: Broker>(broker: &B, processing: &str, source: &str) -> Result<usize> {
	let mut moved = 0;
	while broker.move_one(processing, source).await?.is_some() {
		moved += 1;
	}

	if moved > 0 {
		warn!(processing, source, moved, "♻️ Re-queued stranded jobs");
	} else {
		info!(processing, "No stranded jobs");
	}
	Ok(moved)
}
