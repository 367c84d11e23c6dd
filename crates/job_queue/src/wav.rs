use crate::error::{QueueError, Result};
use crate::producer::{AudioSource, ChunkSpan};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::fs::File;
use std::path::Path;

enum Samples {
	Int(Vec<i32>),
	Float(Vec<f32>),
}

/// A fully decoded WAV file. Segments keep the source's sample format and channel layout.
pub struct WavSource {
	spec: WavSpec,
	samples: Samples,
	frames: u64,
}

impl WavSource {
	///
	/// # Errors
	/// Returns an error if the file cannot be read or decoded
	pub fn open(path: impl AsRef<Path>) -> Result<Self> {
		let mut reader = WavReader::open(path.as_ref())?;
		let spec = reader.spec();
		if spec.channels == 0 || spec.sample_rate == 0 {
			return Err(QueueError::InvalidChunk(format!("{} has no channels or a zero sample rate", path.as_ref().display())));
		}

		let samples = match spec.sample_format {
			SampleFormat::Int => Samples::Int(reader.samples::<i32>().collect::<std::result::Result<_, _>>()?),
			SampleFormat::Float => Samples::Float(reader.samples::<f32>().collect::<std::result::Result<_, _>>()?),
		};
		let total = match &samples {
			Samples::Int(s) => s.len(),
			Samples::Float(s) => s.len(),
		};
		let frames = u64::try_from(total / usize::from(spec.channels))?;

		Ok(Self { spec, samples, frames })
	}

	#[must_use]
	pub const fn spec(&self) -> WavSpec {
		self.spec
	}

	fn frame_at(&self, ms: u64) -> u64 {
		if ms >= self.duration_ms() {
			return self.frames;
		}
		ms * u64::from(self.spec.sample_rate) / 1000
	}
}

impl AudioSource for WavSource {
	fn duration_ms(&self) -> u64 {
		self.frames * 1000 / u64::from(self.spec.sample_rate)
	}

	fn extension(&self) -> &'static str {
		"wav"
	}

	fn export_segment(&self, span: ChunkSpan, dest: &Path) -> Result<()> {
		if span.start_ms >= span.end_ms || span.end_ms > self.duration_ms() {
			return Err(QueueError::InvalidChunk(format!("span {}..{} ms outside 0..{} ms", span.start_ms, span.end_ms, self.duration_ms())));
		}

		let channels = usize::from(self.spec.channels);
		let start = usize::try_from(self.frame_at(span.start_ms))? * channels;
		let end = usize::try_from(self.frame_at(span.end_ms))? * channels;

		let mut writer = WavWriter::create(dest, self.spec)?;
		match &self.samples {
			Samples::Int(samples) => {
				for &sample in &samples[start..end] {
					writer.write_sample(sample)?;
				}
			}
			Samples::Float(samples) => {
				for &sample in &samples[start..end] {
					writer.write_sample(sample)?;
				}
			}
		}
		writer.finalize()?;

		File::open(dest)?.sync_all()?;
		Ok(())
	}
}
