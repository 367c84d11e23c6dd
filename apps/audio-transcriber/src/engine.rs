#[cfg(feature = "whisper")]
mod whisper;

#[cfg(feature = "whisper")]
pub use whisper::WhisperEngine;

use async_trait::async_trait;
use job_queue::{QueueError, Result, Transcribe};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Runs an external speech-to-text program per chunk.
pub struct CommandEngine {
	program: String,
	args: Vec<String>,
}

impl CommandEngine {
	pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
		Self { program: program.into(), args }
	}
}

#[async_trait]
impl Transcribe for CommandEngine {
	async fn transcribe(&self, path: &Path) -> Result<String> {
		debug!(program = %self.program, file = %path.display(), "Running transcribe command");

		let output = Command::new(&self.program)
			.args(&self.args)
			.arg(path)
			.stdin(Stdio::null())
			.kill_on_drop(true)
			.output()
			.await?;

		if !output.status.success() {
			let stderr = String::from_utf8_lossy(&output.stderr);
			return Err(QueueError::Execution(format!("{} exited with {}: {}", self.program, output.status, stderr.trim())));
		}

		Ok(String::from_utf8_lossy(&output.stdout).into_owned())
	}
}

/// The engine selected at start-up.
pub enum Engine {
	Command(CommandEngine),
	#[cfg(feature = "whisper")]
	Whisper(WhisperEngine),
}

#[async_trait]
impl Transcribe for Engine {
	async fn transcribe(&self, path: &Path) -> Result<String> {
		match self {
			Self::Command(engine) => engine.transcribe(path).await,
			#[cfg(feature = "whisper")]
			Self::Whisper(engine) => engine.transcribe(path).await,
		}
	}
}
