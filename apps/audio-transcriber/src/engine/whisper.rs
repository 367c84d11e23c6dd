use async_trait::async_trait;
use hound::{SampleFormat, WavReader};
use job_queue::{QueueError, Result, Transcribe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

const WHISPER_SAMPLE_RATE: u32 = 16_000;

/// In-process whisper.cpp. Each chunk gets its own state on a blocking thread.
pub struct WhisperEngine {
	ctx: Arc<WhisperContext>,
	threads: i32,
	language: Arc<str>,
}

impl WhisperEngine {
	/// Load Whisper model from disk
	pub fn load(model_path: &Path, threads: i32, language: &str) -> Result<Self> {
		info!("🔄 Loading Whisper model from {}...", model_path.display());
		let start = Instant::now();

		let path = model_path.to_str().ok_or_else(|| QueueError::Config(format!("model path {} is not valid UTF-8", model_path.display())))?;
		let ctx = WhisperContext::new_with_params(path, WhisperContextParameters::default()).map_err(|e| QueueError::Config(format!("failed to load whisper model: {e}")))?;

		info!(load_time_ms = start.elapsed().as_millis(), threads, language, "✅ Whisper model loaded");
		Ok(Self {
			ctx: Arc::new(ctx),
			threads,
			language: Arc::from(language),
		})
	}
}

#[async_trait]
impl Transcribe for WhisperEngine {
	async fn transcribe(&self, path: &Path) -> Result<String> {
		let ctx = Arc::clone(&self.ctx);
		let language = Arc::clone(&self.language);
		let threads = self.threads;
		let path: PathBuf = path.to_path_buf();

		tokio::task::spawn_blocking(move || {
			let audio = load_mono_16k(&path)?;
			run_whisper(&ctx, &audio, threads, &language)
		})
		.await?
	}
}

fn run_whisper(ctx: &WhisperContext, audio: &[f32], threads: i32, language: &str) -> Result<String> {
	let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
	params.set_n_threads(threads);
	params.set_translate(false);
	params.set_print_special(false);
	params.set_print_progress(false);
	params.set_print_realtime(false);
	params.set_print_timestamps(false);
	params.set_language(if language.is_empty() { None } else { Some(language) });

	let mut state = ctx.create_state().map_err(|e| QueueError::Execution(format!("failed to create whisper state: {e}")))?;
	state.full(params, audio).map_err(|e| QueueError::Execution(format!("transcription failed: {e}")))?;

	let num_segments = state.full_n_segments();
	if num_segments == 0 {
		warn!("⚠️ No segments extracted - audio may be silence");
		return Ok(String::new());
	}

	let mut segments = Vec::new();
	for i in 0..num_segments {
		if let Some(segment) = state.get_segment(i) {
			if let Ok(text) = segment.to_str() {
				let trimmed = text.trim();
				if !trimmed.is_empty() {
					segments.push(trimmed.to_string());
				}
			}
		}
	}

	Ok(segments.join(" "))
}

/// Decodes a WAV chunk into the 16 kHz mono f32 samples whisper expects.
#[allow(clippy::cast_precision_loss)]
fn load_mono_16k(path: &Path) -> Result<Vec<f32>> {
	let mut reader = WavReader::open(path)?;
	let spec = reader.spec();

	let samples: Vec<f32> = match spec.sample_format {
		SampleFormat::Float => reader.samples::<f32>().collect::<std::result::Result<_, _>>()?,
		SampleFormat::Int => {
			let scale = 2_f32.powi(i32::from(spec.bits_per_sample) - 1);
			reader.samples::<i32>().map(|s| s.map(|sample| sample as f32 / scale)).collect::<std::result::Result<_, _>>()?
		}
	};

	let channels = usize::from(spec.channels.max(1));
	let mono: Vec<f32> = if channels == 1 {
		samples
	} else {
		samples.chunks_exact(channels).map(|frame| frame.iter().sum::<f32>() / channels as f32).collect()
	};

	Ok(resample_simple(&mono, spec.sample_rate, WHISPER_SAMPLE_RATE))
}

#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn resample_simple(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
	if from_rate == to_rate {
		return samples.to_vec();
	}

	let ratio = from_rate as f32 / to_rate as f32;
	let output_len = (samples.len() as f32 / ratio) as usize;

	(0..output_len)
		.map(|i| {
			let src_idx = (i as f32 * ratio) as usize;
			samples.get(src_idx).copied().unwrap_or(0.0)
		})
		.collect()
}
