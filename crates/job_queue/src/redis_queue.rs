use crate::broker::Broker;
use crate::error::Result;
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{cmd, AsyncCommands, Client, Direction};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// [`Broker`] backed by Redis lists.
///
/// Clones share one multiplexed connection. Blocking commands hold that
/// connection for their whole wait, so every worker claims through its own
/// [`Broker::session`].
#[derive(Clone)]
pub struct RedisBroker {
	client: Client,
	conn: MultiplexedConnection,
}

impl RedisBroker {
	///
	/// # Errors
	/// This function returns an error if:
	/// - The URL is invalid
	/// - Redis connection fails
	pub async fn connect(redis_url: &str) -> Result<Self> {
		let client = Client::open(redis_url)?;
		let conn = client.get_multiplexed_async_connection().await?;
		debug!(url = redis_url, "Connected to redis");
		Ok(Self { client, conn })
	}

	/// [`RedisBroker::connect`] with exponential backoff, for start-up while redis may still be coming up.
	///
	/// # Errors
	/// Returns the last connection error once `max_retries` attempts have failed
	pub async fn connect_with_retry(redis_url: &str, max_retries: u32, initial_backoff: Duration) -> Result<Self> {
		let mut attempt = 1;
		loop {
			match Self::connect(redis_url).await {
				Ok(broker) => {
					info!(url = redis_url, "✅ Connected to redis");
					return Ok(broker);
				}
				Err(e) if attempt >= max_retries => {
					error!(error = %e, url = redis_url, attempts = attempt, "❌ Failed to connect to redis - service cannot continue");
					return Err(e);
				}
				Err(e) => {
					let backoff = initial_backoff.saturating_mul(2_u32.saturating_pow(attempt - 1));
					warn!(attempt, max_retries, backoff_ms = backoff.as_millis(), error = %e, "⚠️ Redis connection failed, retrying...");
					tokio::time::sleep(backoff).await;
					attempt += 1;
				}
			}
		}
	}
}

#[async_trait]
impl Broker for RedisBroker {
	async fn session(&self) -> Result<Self> {
		let conn = self.client.get_multiplexed_async_connection().await?;
		Ok(Self {
			client: self.client.clone(),
			conn,
		})
	}

	async fn push(&self, queue: &str, payload: &str) -> Result<()> {
		let mut conn = self.conn.clone();
		let _: () = conn.rpush(queue, payload).await?;
		Ok(())
	}

	async fn push_front(&self, queue: &str, payload: &str) -> Result<()> {
		let mut conn = self.conn.clone();
		let _: () = conn.lpush(queue, payload).await?;
		Ok(())
	}

	async fn claim(&self, source: &str, dest: &str, timeout: Option<Duration>) -> Result<Option<String>> {
		// BLMOVE reads a zero timeout as "forever"
		let timeout_secs = match timeout {
			Some(t) if t.is_zero() => return self.move_one(source, dest).await,
			Some(t) => t.as_secs_f64(),
			None => 0.0,
		};

		let mut conn = self.conn.clone();
		let moved: Option<String> = cmd("BLMOVE").arg(source).arg(dest).arg("LEFT").arg("RIGHT").arg(timeout_secs).query_async(&mut conn).await?;
		Ok(moved)
	}

	async fn move_one(&self, source: &str, dest: &str) -> Result<Option<String>> {
		let mut conn = self.conn.clone();
		let moved: Option<String> = conn.lmove(source, dest, Direction::Left, Direction::Right).await?;
		Ok(moved)
	}

	async fn remove_one(&self, queue: &str, payload: &str) -> Result<bool> {
		let mut conn = self.conn.clone();
		let removed: usize = conn.lrem(queue, 1, payload).await?;
		Ok(removed > 0)
	}

	async fn resolve(&self, processing: &str, original: &str, dest: &str, payload: &str) -> Result<bool> {
		let mut conn = self.conn.clone();
		let (removed, _): (usize, usize) = redis::pipe().atomic().lrem(processing, 1, original).rpush(dest, payload).query_async(&mut conn).await?;
		Ok(removed > 0)
	}

	async fn len(&self, queue: &str) -> Result<usize> {
		let mut conn = self.conn.clone();
		let len: usize = conn.llen(queue).await?;
		Ok(len)
	}

	async fn list(&self, queue: &str) -> Result<Vec<String>> {
		let mut conn = self.conn.clone();
		let entries: Vec<String> = conn.lrange(queue, 0, -1).await?;
		Ok(entries)
	}
}
