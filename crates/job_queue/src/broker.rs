use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Narrow interface over a shared list store.
///
/// Lists are FIFO: `push` appends to the tail and `claim` takes from the head.
/// Implementations are cheap to clone; clones share the same underlying
/// connection, while [`Broker::session`] opens an independent one.
#[async_trait]
pub trait Broker: Clone + Send + Sync + 'static {
	/// Opens an independent session so a blocking claim only stalls its caller.
	async fn session(&self) -> Result<Self>;

	/// Appends `payload` to the tail of `queue`.
	async fn push(&self, queue: &str, payload: &str) -> Result<()>;

	/// Prepends `payload` to the head of `queue`.
	async fn push_front(&self, queue: &str, payload: &str) -> Result<()>;

	/// Atomically moves the head of `source` to the tail of `dest` and returns it.
	///
	/// Blocks while `source` is empty: indefinitely when `timeout` is `None`,
	/// otherwise up to `timeout`, returning `None` when it elapses.
	async fn claim(&self, source: &str, dest: &str, timeout: Option<Duration>) -> Result<Option<String>>;

	/// Non-blocking form of [`Broker::claim`].
	async fn move_one(&self, source: &str, dest: &str) -> Result<Option<String>>;

	/// Removes the first entry of `queue` equal to `payload`.
	/// Returns whether an entry was removed; a missing payload is not an error.
	async fn remove_one(&self, queue: &str, payload: &str) -> Result<bool>;

	/// `remove_one(processing, original)` then `push(dest, payload)` as a single
	/// atomic broker operation.
	async fn resolve(&self, processing: &str, original: &str, dest: &str, payload: &str) -> Result<bool>;

	async fn len(&self, queue: &str) -> Result<usize>;

	/// Every entry of `queue`, head first.
	async fn list(&self, queue: &str) -> Result<Vec<String>>;
}
