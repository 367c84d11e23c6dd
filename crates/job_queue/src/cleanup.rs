use crate::error::Result;
use crate::job::JobRecord;
use crate::stage::JobHandler;
use async_trait::async_trait;
use chrono::Utc;
use std::io::ErrorKind;
use tracing::{debug, info};

/// Cleanup-stage handler: deletes the transcribed chunk file.
#[derive(Debug, Clone, Copy, Default)]
pub struct CleanupHandler;

#[async_trait]
impl JobHandler for CleanupHandler {
	async fn process(&self, job: &JobRecord) -> Result<()> {
		match tokio::fs::remove_file(job.file_path()).await {
			Ok(()) => {
				info!(job_id = %job.id, file = %job.file_path().display(), "🗑️ Deleted chunk file");
				Ok(())
			}
			// Already gone, a previous claim got this far before crashing.
			Err(e) if e.kind() == ErrorKind::NotFound => {
				debug!(job_id = %job.id, file = %job.file_path().display(), "Chunk file already deleted");
				Ok(())
			}
			Err(e) => Err(e.into()),
		}
	}

	fn complete(&self, job: &mut JobRecord) {
		job.mark_file_deleted(Utc::now());
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::QueueError;
	use crate::producer::ChunkSpan;

	const SPAN: ChunkSpan = ChunkSpan {
		index: 0,
		start_ms: 0,
		end_ms: 15_000,
	};

	#[tokio::test]
	async fn test_deletes_file() -> Result<()> {
		let dir = tempfile::tempdir()?;
		let path = dir.path().join("chunk.wav");
		std::fs::write(&path, b"riff")?;

		CleanupHandler.process(&JobRecord::new(&path, "radio", SPAN)).await?;
		assert!(!path.exists());
		Ok(())
	}

	#[tokio::test]
	async fn test_missing_file_is_success() -> Result<()> {
		let dir = tempfile::tempdir()?;
		let job = JobRecord::new(dir.path().join("gone.wav"), "radio", SPAN);
		CleanupHandler.process(&job).await?;
		CleanupHandler.process(&job).await
	}

	#[tokio::test]
	async fn test_directory_is_failure() -> Result<()> {
		let dir = tempfile::tempdir()?;
		let result = CleanupHandler.process(&JobRecord::new(dir.path(), "radio", SPAN)).await;
		assert!(matches!(result, Err(QueueError::Io(_))));
		Ok(())
	}

	#[test]
	fn test_complete_stamps_deletion() {
		let mut job = JobRecord::new("/tmp/a.wav", "radio", SPAN);
		CleanupHandler.complete(&mut job);
		assert!(job.file_deleted_date.is_some());
	}
}
