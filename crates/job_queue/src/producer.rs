use crate::broker::Broker;
use crate::error::{QueueError, Result};
use crate::job::JobRecord;
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// A half-open `[start_ms, end_ms)` slice of the source stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSpan {
	pub index: u64,
	pub start_ms: u64,
	pub end_ms: u64,
}

impl ChunkSpan {
	#[must_use]
	pub const fn len_ms(&self) -> u64 {
		self.end_ms - self.start_ms
	}
}

/// Splits `[0, total_ms)` into consecutive spans of `chunk_ms`; the last one may be shorter.
///
/// # Errors
/// Returns an error if `chunk_ms` is zero
pub fn plan_chunks(total_ms: u64, chunk_ms: u64) -> Result<Vec<ChunkSpan>> {
	if chunk_ms == 0 {
		return Err(QueueError::InvalidChunk("chunk duration must be greater than 0".to_string()));
	}

	let count = total_ms.div_ceil(chunk_ms);
	Ok((0..count)
		.map(|index| {
			let start_ms = index * chunk_ms;
			ChunkSpan {
				index,
				start_ms,
				end_ms: (start_ms + chunk_ms).min(total_ms),
			}
		})
		.collect())
}

/// Decoded audio the producer can cut into independently playable segments.
pub trait AudioSource: Send + Sync + 'static {
	fn duration_ms(&self) -> u64;

	/// File extension of exported segments.
	fn extension(&self) -> &'static str;

	/// Writes `span` to `dest` and makes it durable before returning. Blocking.
	///
	/// # Errors
	/// Returns an error if the span is out of range or the file cannot be written
	fn export_segment(&self, span: ChunkSpan, dest: &Path) -> Result<()>;
}

/// Cuts a source into chunk files and announces one job per chunk on the pending queue.
pub struct Producer<B> {
	broker: B,
	queue: String,
	output_dir: PathBuf,
	chunk: Duration,
	max_concurrent_exports: usize,
}

impl<B: Broker> Producer<B> {
	#[must_use]
	pub fn new(broker: B, queue: impl Into<String>, output_dir: impl Into<PathBuf>, chunk: Duration, max_concurrent_exports: usize) -> Self {
		Self {
			broker,
			queue: queue.into(),
			output_dir: output_dir.into(),
			chunk,
			max_concurrent_exports: max_concurrent_exports.max(1),
		}
	}

	/// Exports and enqueues every chunk of `source`.
	///
	/// Chunks are written concurrently and each job is pushed only after its file
	/// is on disk, so queue order need not follow chunk order. Returns the
	/// records that were enqueued.
	///
	/// # Errors
	/// Returns the first export or broker error once all chunk tasks have finished
	pub async fn enqueue_source<S: AudioSource>(&self, source: Arc<S>, media: &str) -> Result<Vec<JobRecord>> {
		let chunk_ms = u64::try_from(self.chunk.as_millis())?;
		let spans = plan_chunks(source.duration_ms(), chunk_ms)?;
		tokio::fs::create_dir_all(&self.output_dir).await?;

		info!(media, chunks = spans.len(), chunk_ms, output_dir = %self.output_dir.display(), "Producing chunks");

		let permits = Arc::new(Semaphore::new(self.max_concurrent_exports));
		let date = Utc::now().format("%Y-%m-%d").to_string();
		let slug = sanitize(media);
		let mut tasks = JoinSet::new();

		for span in spans {
			let id = Uuid::new_v4().to_string();
			let file_name = format!("{date}-{slug}-{id}-{}-{}.{}", self.chunk.as_secs(), span.index + 1, source.extension());
			let job = JobRecord::with_id(id, self.output_dir.join(file_name), media, span);

			let source = Arc::clone(&source);
			let broker = self.broker.clone();
			let queue = self.queue.clone();
			let permits = Arc::clone(&permits);

			tasks.spawn(async move {
				let _permit = permits.acquire_owned().await.map_err(|e| QueueError::Execution(e.to_string()))?;
				handle_chunk(source, broker, &queue, span, job).await
			});
		}

		let mut enqueued = Vec::new();
		let mut first_error = None;
		while let Some(joined) = tasks.join_next().await {
			match joined.map_err(QueueError::from).and_then(|result| result) {
				Ok(job) => enqueued.push(job),
				Err(e) => {
					error!(error = %e, "Failed to produce chunk");
					first_error.get_or_insert(e);
				}
			}
		}

		match first_error {
			Some(e) => Err(e),
			None => {
				info!(media, enqueued = enqueued.len(), queue = %self.queue, "All chunks enqueued");
				Ok(enqueued)
			}
		}
	}
}

/// Writes one chunk, then announces it. The job is never visible before its file exists.
///
/// A chunk that fails to export or enqueue has its file removed so no file is left without a job.
async fn handle_chunk<S: AudioSource, B: Broker>(source: Arc<S>, broker: B, queue: &str, span: ChunkSpan, job: JobRecord) -> Result<JobRecord> {
	match export_and_push(source, &broker, queue, span, &job).await {
		Ok(()) => Ok(job),
		Err(e) => {
			discard_chunk_file(job.file_path()).await;
			Err(e)
		}
	}
}

async fn export_and_push<S: AudioSource, B: Broker>(source: Arc<S>, broker: &B, queue: &str, span: ChunkSpan, job: &JobRecord) -> Result<()> {
	let dest = job.file_path.clone();
	tokio::task::spawn_blocking(move || source.export_segment(span, &dest)).await??;
	debug!(job_id = %job.id, chunk = span.index + 1, file = %job.file_path.display(), "Chunk written");

	broker.push(queue, &job.encode()?).await?;
	debug!(job_id = %job.id, queue, "Job enqueued");
	Ok(())
}

async fn discard_chunk_file(path: &Path) {
	match tokio::fs::remove_file(path).await {
		Ok(()) => debug!(file = %path.display(), "Removed chunk file of failed job"),
		Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
		Err(e) => warn!(file = %path.display(), error = %e, "Failed to remove chunk file of failed job"),
	}
}

/// Collapses every run of non-alphanumeric characters into `_`.
#[must_use]
pub fn sanitize(label: &str) -> String {
	let mut out = String::with_capacity(label.len());
	let mut in_run = false;
	for c in label.chars() {
		if c.is_ascii_alphanumeric() {
			out.push(c);
			in_run = false;
		} else if !in_run {
			out.push('_');
			in_run = true;
		}
	}
	out
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::inmem::InMemBroker;

	/// Writes a partial file for chunks at or after `fail_from`, then fails.
	struct PartialExport {
		duration_ms: u64,
		fail_from: u64,
	}

	impl AudioSource for PartialExport {
		fn duration_ms(&self) -> u64 {
			self.duration_ms
		}

		fn extension(&self) -> &'static str {
			"wav"
		}

		fn export_segment(&self, span: ChunkSpan, dest: &Path) -> Result<()> {
			std::fs::write(dest, b"RIFF")?;
			if span.index >= self.fail_from {
				return Err(QueueError::Execution(format!("export of chunk {} failed", span.index)));
			}
			Ok(())
		}
	}

	#[tokio::test]
	async fn test_failed_export_leaves_no_orphan_file() -> Result<()> {
		let dir = tempfile::tempdir()?;
		let broker = InMemBroker::new();
		let producer = Producer::new(broker.clone(), "pending", dir.path(), Duration::from_secs(1), 2);
		let source = Arc::new(PartialExport { duration_ms: 3_000, fail_from: 2 });

		assert!(producer.enqueue_source(source, "radio").await.is_err());

		let queued = broker.list("pending").await?;
		assert_eq!(queued.len(), 2);
		let mut files: Vec<PathBuf> = std::fs::read_dir(dir.path())?.map(|entry| entry.map(|e| e.path())).collect::<std::io::Result<_>>()?;
		files.sort();
		let mut announced: Vec<PathBuf> = queued.iter().map(|payload| JobRecord::decode(payload).map(|job| job.file_path)).collect::<Result<_>>()?;
		announced.sort();
		assert_eq!(files, announced);
		Ok(())
	}

	#[test]
	fn test_chunks_partition_stream() -> Result<()> {
		for total_ms in [1, 999, 1_000, 1_001, 14_999, 15_000, 15_001, 123_456] {
			for chunk_ms in [1, 7, 1_000, 15_000, 200_000] {
				let spans = plan_chunks(total_ms, chunk_ms)?;
				assert_eq!(spans.len() as u64, total_ms.div_ceil(chunk_ms), "count for L={total_ms} d={chunk_ms}");
				assert_eq!(spans.first().map(|s| s.start_ms), Some(0));
				assert_eq!(spans.last().map(|s| s.end_ms), Some(total_ms));

				for pair in spans.windows(2) {
					assert_eq!(pair[0].end_ms, pair[1].start_ms, "gap or overlap for L={total_ms} d={chunk_ms}");
				}
				for (i, span) in spans.iter().enumerate() {
					assert_eq!(span.index, i as u64);
					assert!(span.len_ms() > 0 && span.len_ms() <= chunk_ms);
				}
			}
		}
		Ok(())
	}

	#[test]
	fn test_last_chunk_is_shorter() -> Result<()> {
		let spans = plan_chunks(40_000, 15_000)?;
		let bounds: Vec<(u64, u64)> = spans.iter().map(|s| (s.start_ms, s.end_ms)).collect();
		assert_eq!(bounds, vec![(0, 15_000), (15_000, 30_000), (30_000, 40_000)]);
		Ok(())
	}

	#[test]
	fn test_empty_stream_has_no_chunks() -> Result<()> {
		assert!(plan_chunks(0, 15_000)?.is_empty());
		Ok(())
	}

	#[test]
	fn test_zero_chunk_rejected() {
		assert!(matches!(plan_chunks(10_000, 0), Err(QueueError::InvalidChunk(_))));
	}

	#[test]
	fn test_sanitize() {
		assert_eq!(sanitize("https://www.youtube.com/watch?v=LWRr4MEECcQ"), "https_www_youtube_com_watch_v_LWRr4MEECcQ");
		assert_eq!(sanitize("radio-1"), "radio_1");
		assert_eq!(sanitize("plain"), "plain");
	}
}
