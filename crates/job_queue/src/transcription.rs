use crate::error::{QueueError, Result};
use crate::job::JobRecord;
use crate::sink::{Transcript, TranscriptSink};
use crate::stage::JobHandler;
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// A speech-to-text engine.
#[async_trait]
pub trait Transcribe: Send + Sync + 'static {
	///
	/// # Errors
	/// Returns an error if the engine cannot process the file
	async fn transcribe(&self, path: &Path) -> Result<String>;
}

/// Transcription-stage handler: runs the engine on the chunk file and
/// publishes the text if a sink is configured.
pub struct TranscriptionHandler<T> {
	engine: T,
	sink: Option<Arc<dyn TranscriptSink>>,
}

impl<T: Transcribe> TranscriptionHandler<T> {
	#[must_use]
	pub const fn new(engine: T) -> Self {
		Self { engine, sink: None }
	}

	#[must_use]
	pub fn with_sink(mut self, sink: Arc<dyn TranscriptSink>) -> Self {
		self.sink = Some(sink);
		self
	}
}

/// Places a job's chunk offsets on the wall clock, anchored at the producer's timestamp.
///
/// # Errors
/// Returns an error if an offset does not fit in a chrono duration
pub fn transcript_for(job: &JobRecord, text: String) -> Result<Transcript> {
	let anchor = job.created_at.unwrap_or_else(Utc::now);
	let offset = |ms: u64| -> Result<ChronoDuration> { Ok(ChronoDuration::milliseconds(i64::try_from(ms)?)) };

	Ok(Transcript {
		source: job.media.clone(),
		start_time: anchor + offset(job.start_ms)?,
		end_time: anchor + offset(job.end_ms)?,
		text,
	})
}

#[async_trait]
impl<T: Transcribe> JobHandler for TranscriptionHandler<T> {
	async fn process(&self, job: &JobRecord) -> Result<()> {
		let path = job.file_path();
		if !tokio::fs::try_exists(path).await? {
			return Err(QueueError::Execution(format!("chunk file {} does not exist", path.display())));
		}

		let text = self.engine.transcribe(path).await?;
		let text = text.trim().to_string();
		info!(job_id = %job.id, chars = text.chars().count(), "📝 Transcribed chunk");

		if let Some(sink) = &self.sink {
			let transcript = transcript_for(job, text)?;
			if let Err(e) = sink.publish(&transcript).await {
				warn!(job_id = %job.id, error = %e, "Failed to publish transcript");
			}
		}

		Ok(())
	}

	fn complete(&self, job: &mut JobRecord) {
		job.mark_transcribed(Utc::now());
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::producer::ChunkSpan;
	use std::sync::Mutex;

	struct EchoEngine;

	#[async_trait]
	impl Transcribe for EchoEngine {
		async fn transcribe(&self, path: &Path) -> Result<String> {
			Ok(format!("  {}\n", path.display()))
		}
	}

	#[derive(Default)]
	struct Collect(Mutex<Vec<Transcript>>);

	#[async_trait]
	impl TranscriptSink for Collect {
		async fn publish(&self, transcript: &Transcript) -> Result<()> {
			if let Ok(mut list) = self.0.lock() {
				list.push(transcript.clone());
			}
			Ok(())
		}
	}

	struct Broken;

	#[async_trait]
	impl TranscriptSink for Broken {
		async fn publish(&self, _transcript: &Transcript) -> Result<()> {
			Err(QueueError::Execution("api down".to_string()))
		}
	}

	fn span() -> ChunkSpan {
		ChunkSpan {
			index: 1,
			start_ms: 15_000,
			end_ms: 30_000,
		}
	}

	#[tokio::test]
	async fn test_missing_file_fails() {
		let handler = TranscriptionHandler::new(EchoEngine);
		let job = JobRecord::new("/nonexistent/chunk.wav", "radio", span());
		assert!(matches!(handler.process(&job).await, Err(QueueError::Execution(_))));
	}

	#[tokio::test]
	async fn test_publishes_trimmed_text() -> Result<()> {
		let dir = tempfile::tempdir()?;
		let path = dir.path().join("chunk.wav");
		std::fs::write(&path, b"riff")?;

		let sink = Arc::new(Collect::default());
		let handler = TranscriptionHandler::new(EchoEngine).with_sink(Arc::clone(&sink) as Arc<dyn TranscriptSink>);
		let job = JobRecord::new(&path, "radio", span());
		handler.process(&job).await?;

		let published = sink.0.lock().map(|list| list.clone()).unwrap_or_default();
		assert_eq!(published.len(), 1);
		assert_eq!(published[0].text, path.display().to_string());
		assert_eq!(published[0].source, "radio");
		assert_eq!((published[0].end_time - published[0].start_time).num_milliseconds(), 15_000);
		Ok(())
	}

	#[tokio::test]
	async fn test_sink_failure_does_not_fail_job() -> Result<()> {
		let dir = tempfile::tempdir()?;
		let path = dir.path().join("chunk.wav");
		std::fs::write(&path, b"riff")?;

		let handler = TranscriptionHandler::new(EchoEngine).with_sink(Arc::new(Broken));
		handler.process(&JobRecord::new(&path, "radio", span())).await
	}

	#[test]
	fn test_transcript_anchored_at_creation() -> Result<()> {
		let job = JobRecord::new("/tmp/a.wav", "radio", span());
		let created = job.created_at.unwrap_or_default();
		let transcript = transcript_for(&job, "hola".to_string())?;
		assert_eq!(transcript.start_time, created + ChronoDuration::seconds(15));
		assert_eq!(transcript.end_time, created + ChronoDuration::seconds(30));
		Ok(())
	}
}
