use crate::broker::Broker;
use crate::error::Result;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

/// Process-local [`Broker`].
///
/// All clones and sessions see the same lists. Every operation takes one lock,
/// so `claim` and `resolve` are atomic with respect to each other. Useful for
/// tests and single-process runs.
#[derive(Clone, Default)]
pub struct InMemBroker {
	inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
	lists: Mutex<HashMap<String, VecDeque<String>>>,
	pushed: Notify,
}

impl InMemBroker {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	fn lists(&self) -> MutexGuard<'_, HashMap<String, VecDeque<String>>> {
		// lists stay consistent even if a holder panicked: every mutation is a single call
		self.inner.lists.lock().unwrap_or_else(PoisonError::into_inner)
	}

	fn try_move(&self, source: &str, dest: &str) -> Option<String> {
		let mut lists = self.lists();
		let payload = lists.get_mut(source)?.pop_front()?;
		lists.entry(dest.to_string()).or_default().push_back(payload.clone());
		drop(lists);
		self.inner.pushed.notify_waiters();
		Some(payload)
	}

	fn remove_from(lists: &mut HashMap<String, VecDeque<String>>, queue: &str, payload: &str) -> bool {
		let Some(list) = lists.get_mut(queue) else {
			return false;
		};
		list.iter().position(|entry| entry == payload).and_then(|idx| list.remove(idx)).is_some()
	}
}

#[async_trait]
impl Broker for InMemBroker {
	async fn session(&self) -> Result<Self> {
		Ok(self.clone())
	}

	async fn push(&self, queue: &str, payload: &str) -> Result<()> {
		self.lists().entry(queue.to_string()).or_default().push_back(payload.to_string());
		self.inner.pushed.notify_waiters();
		Ok(())
	}

	async fn push_front(&self, queue: &str, payload: &str) -> Result<()> {
		self.lists().entry(queue.to_string()).or_default().push_front(payload.to_string());
		self.inner.pushed.notify_waiters();
		Ok(())
	}

	async fn claim(&self, source: &str, dest: &str, timeout: Option<Duration>) -> Result<Option<String>> {
		let deadline = timeout.map(|t| Instant::now() + t);

		loop {
			// register interest before checking so a push between the check and the await is not missed
			let notified = self.inner.pushed.notified();
			tokio::pin!(notified);
			notified.as_mut().enable();

			if let Some(payload) = self.try_move(source, dest) {
				return Ok(Some(payload));
			}

			match deadline {
				None => notified.await,
				Some(deadline) => {
					if tokio::time::timeout_at(deadline, notified).await.is_err() {
						return Ok(None);
					}
				}
			}
		}
	}

	async fn move_one(&self, source: &str, dest: &str) -> Result<Option<String>> {
		Ok(self.try_move(source, dest))
	}

	async fn remove_one(&self, queue: &str, payload: &str) -> Result<bool> {
		Ok(Self::remove_from(&mut self.lists(), queue, payload))
	}

	async fn resolve(&self, processing: &str, original: &str, dest: &str, payload: &str) -> Result<bool> {
		let removed = {
			let mut lists = self.lists();
			let removed = Self::remove_from(&mut lists, processing, original);
			lists.entry(dest.to_string()).or_default().push_back(payload.to_string());
			removed
		};
		self.inner.pushed.notify_waiters();
		Ok(removed)
	}

	async fn len(&self, queue: &str) -> Result<usize> {
		Ok(self.lists().get(queue).map_or(0, VecDeque::len))
	}

	async fn list(&self, queue: &str) -> Result<Vec<String>> {
		Ok(self.lists().get(queue).map(|list| list.iter().cloned().collect()).unwrap_or_default())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn test_claim_is_fifo() -> Result<()> {
		let broker = InMemBroker::new();
		broker.push("pending", "a").await?;
		broker.push("pending", "b").await?;

		assert_eq!(broker.claim("pending", "processing", None).await?.as_deref(), Some("a"));
		assert_eq!(broker.list("pending").await?, vec!["b".to_string()]);
		assert_eq!(broker.list("processing").await?, vec!["a".to_string()]);
		Ok(())
	}

	#[tokio::test]
	async fn test_claim_times_out_on_empty_queue() -> Result<()> {
		let broker = InMemBroker::new();
		let claimed = broker.claim("pending", "processing", Some(Duration::from_millis(50))).await?;
		assert!(claimed.is_none());
		assert_eq!(broker.len("processing").await?, 0);
		Ok(())
	}

	#[tokio::test]
	async fn test_blocked_claim_wakes_on_push() -> Result<()> {
		let broker = InMemBroker::new();
		let claimer = broker.session().await?;
		let handle = tokio::spawn(async move { claimer.claim("pending", "processing", Some(Duration::from_secs(5))).await });

		tokio::time::sleep(Duration::from_millis(20)).await;
		broker.push("pending", "late").await?;

		let claimed = handle.await??;
		assert_eq!(claimed.as_deref(), Some("late"));
		Ok(())
	}

	#[tokio::test]
	async fn test_remove_one_is_noop_when_absent() -> Result<()> {
		let broker = InMemBroker::new();
		broker.push("processing", "x").await?;
		broker.push("processing", "x").await?;

		assert!(broker.remove_one("processing", "x").await?);
		assert!(!broker.remove_one("processing", "y").await?);
		assert!(!broker.remove_one("missing", "x").await?);
		assert_eq!(broker.len("processing").await?, 1);
		Ok(())
	}

	#[tokio::test]
	async fn test_push_front_goes_to_head() -> Result<()> {
		let broker = InMemBroker::new();
		broker.push("pending", "new").await?;
		broker.push_front("pending", "retry").await?;
		assert_eq!(broker.list("pending").await?, vec!["retry".to_string(), "new".to_string()]);
		Ok(())
	}

	#[tokio::test]
	async fn test_resolve_moves_and_replaces_payload() -> Result<()> {
		let broker = InMemBroker::new();
		broker.push("pending", "v1").await?;
		broker.claim("pending", "processing", None).await?;

		assert!(broker.resolve("processing", "v1", "done", "v2").await?);
		assert_eq!(broker.len("processing").await?, 0);
		assert_eq!(broker.list("done").await?, vec!["v2".to_string()]);
		Ok(())
	}

	#[tokio::test]
	async fn test_racing_claims_deliver_once() -> Result<()> {
		let broker = InMemBroker::new();
		broker.push("pending", "only").await?;

		let a = broker.session().await?;
		let b = broker.session().await?;
		let (ra, rb) = tokio::join!(
			a.claim("pending", "processing", Some(Duration::from_millis(100))),
			b.claim("pending", "processing", Some(Duration::from_millis(100)))
		);

		let delivered: Vec<String> = [ra?, rb?].into_iter().flatten().collect();
		assert_eq!(delivered, vec!["only".to_string()]);
		assert_eq!(broker.len("processing").await?, 1);
		Ok(())
	}
}
