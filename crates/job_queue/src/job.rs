use crate::error::Result;
use crate::producer::ChunkSpan;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use uuid::Uuid;

const FILE_PATH_KEY: &str = "file_path";
const LEGACY_FILE_KEYS: [&str; 3] = ["file_name", "file-path", "file-name"];
const DEFAULTED_KEYS: [&str; 4] = ["media", "start_ms", "end_ms", "attempts"];

/// One unit of work moving through the pipeline queues.
///
/// The record travels as a JSON object. Stages never re-serialize a record they
/// do not mutate: the broker removes claimed entries by exact payload match, so
/// the bytes that were claimed are the bytes that get released.
///
/// Re-encoding keeps the shape of the decoded payload: fields this type does
/// not know survive in `extra`, a legacy file key keeps its name and defaulted
/// counters that were absent stay absent until they change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
	pub id: String,
	#[serde(alias = "file_name", alias = "file-path", alias = "file-name")]
	pub file_path: PathBuf,
	#[serde(default)]
	pub media: String,
	#[serde(default)]
	pub start_ms: u64,
	#[serde(default)]
	pub end_ms: u64,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub created_at: Option<DateTime<Utc>>,
	#[serde(default)]
	pub attempts: u32,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub last_error: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub transcription_date: Option<DateTime<Utc>>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub file_deleted_date: Option<DateTime<Utc>>,
	#[serde(flatten)]
	pub extra: Map<String, Value>,
	#[serde(skip)]
	shape: WireShape,
}

/// How a decoded payload deviated from the canonical field set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct WireShape {
	file_key: Option<&'static str>,
	absent: Vec<&'static str>,
}

impl WireShape {
	fn of(map: &Map<String, Value>) -> Self {
		let file_key = if map.contains_key(FILE_PATH_KEY) {
			None
		} else {
			LEGACY_FILE_KEYS.into_iter().find(|key| map.contains_key(*key))
		};
		let absent = DEFAULTED_KEYS.into_iter().filter(|key| !map.contains_key(*key)).collect();
		Self { file_key, absent }
	}

	const fn is_canonical(&self) -> bool {
		self.file_key.is_none() && self.absent.is_empty()
	}

	fn restore(&self, map: Map<String, Value>) -> Map<String, Value> {
		map.into_iter()
			.filter(|(key, value)| !(self.absent.iter().any(|absent| *absent == key.as_str()) && is_default(value)))
			.map(|(key, value)| match self.file_key {
				Some(legacy) if key == FILE_PATH_KEY => (legacy.to_string(), value),
				_ => (key, value),
			})
			.collect()
	}
}

fn is_default(value: &Value) -> bool {
	value.as_u64() == Some(0) || value.as_str() == Some("")
}

impl JobRecord {
	/// Creates a fresh record with a new id and `attempts = 0`.
	#[must_use]
	pub fn new(file_path: impl Into<PathBuf>, media: impl Into<String>, span: ChunkSpan) -> Self {
		Self::with_id(Uuid::new_v4().to_string(), file_path, media, span)
	}

	#[must_use]
	pub fn with_id(id: impl Into<String>, file_path: impl Into<PathBuf>, media: impl Into<String>, span: ChunkSpan) -> Self {
		Self {
			id: id.into(),
			file_path: file_path.into(),
			media: media.into(),
			start_ms: span.start_ms,
			end_ms: span.end_ms,
			created_at: Some(Utc::now()),
			attempts: 0,
			last_error: None,
			transcription_date: None,
			file_deleted_date: None,
			extra: Map::new(),
			shape: WireShape::default(),
		}
	}

	///
	/// # Errors
	/// Returns an error if the payload is not a JSON job record
	pub fn decode(payload: &str) -> Result<Self> {
		let map: Map<String, Value> = serde_json::from_str(payload)?;
		let shape = WireShape::of(&map);
		let mut job: Self = serde_json::from_value(Value::Object(map))?;
		job.shape = shape;
		Ok(job)
	}

	///
	/// # Errors
	/// Returns an error if serialization fails
	pub fn encode(&self) -> Result<String> {
		if self.shape.is_canonical() {
			return Ok(serde_json::to_string(self)?);
		}
		match serde_json::to_value(self)? {
			Value::Object(map) => Ok(serde_json::to_string(&self.shape.restore(map))?),
			other => Ok(serde_json::to_string(&other)?),
		}
	}

	#[must_use]
	pub fn file_path(&self) -> &Path {
		&self.file_path
	}

	/// Counts one failed processing cycle. `attempts` never decreases.
	pub fn record_failure(&mut self, error: impl Into<String>) {
		self.attempts = self.attempts.saturating_add(1);
		self.last_error = Some(error.into());
	}

	/// Stamps the first successful transcription; later stamps are ignored.
	pub fn mark_transcribed(&mut self, at: DateTime<Utc>) {
		self.transcription_date.get_or_insert(at);
	}

	pub fn mark_file_deleted(&mut self, at: DateTime<Utc>) {
		self.file_deleted_date = Some(at);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::QueueError;

	fn span() -> ChunkSpan {
		ChunkSpan {
			index: 2,
			start_ms: 30_000,
			end_ms: 45_000,
		}
	}

	#[test]
	fn test_new_job_defaults() {
		let job = JobRecord::new("/tmp/a.wav", "radio", span());
		assert_eq!(job.attempts, 0);
		assert_eq!(job.start_ms, 30_000);
		assert_eq!(job.end_ms, 45_000);
		assert!(job.transcription_date.is_none());
		assert!(job.file_deleted_date.is_none());
		assert!(Uuid::parse_str(&job.id).is_ok());
	}

	#[test]
	fn test_ids_are_unique() {
		let a = JobRecord::new("/tmp/a.wav", "radio", span());
		let b = JobRecord::new("/tmp/a.wav", "radio", span());
		assert_ne!(a.id, b.id);
	}

	#[test]
	fn test_encoding_is_stable() -> Result<()> {
		let job = JobRecord::new("/tmp/a.wav", "radio", span());
		let payload = job.encode()?;
		let decoded = JobRecord::decode(&payload)?;
		assert_eq!(decoded, job);
		assert_eq!(decoded.encode()?, payload);
		assert!(!payload.contains("last_error"));
		Ok(())
	}

	#[test]
	fn test_decode_legacy_payload_without_attempts() -> Result<()> {
		let job = JobRecord::decode(r#"{"id":"abc","file-name":"chunk.mp3","transcribed":"false"}"#)?;
		assert_eq!(job.id, "abc");
		assert_eq!(job.file_path, PathBuf::from("chunk.mp3"));
		assert_eq!(job.attempts, 0);
		assert!(job.created_at.is_none());
		assert_eq!(job.extra.get("transcribed"), Some(&Value::from("false")));
		Ok(())
	}

	#[test]
	fn test_legacy_payload_keeps_its_shape() -> Result<()> {
		let payload = r#"{"id":"abc","file-name":"chunk.mp3","transcribed":"false","media":"radio"}"#;
		let job = JobRecord::decode(payload)?;
		let value: Value = serde_json::from_str(&job.encode()?)?;
		assert_eq!(value, serde_json::from_str::<Value>(payload)?);
		Ok(())
	}

	#[test]
	fn test_legacy_payload_only_gains_mutated_fields() -> Result<()> {
		let mut job = JobRecord::decode(r#"{"id":"abc","file-name":"chunk.mp3","transcribed":"false"}"#)?;
		job.record_failure("boom");
		let value: Value = serde_json::from_str(&job.encode()?)?;

		assert_eq!(value["file-name"], "chunk.mp3");
		assert_eq!(value["transcribed"], "false");
		assert_eq!(value["attempts"], 1);
		assert_eq!(value["last_error"], "boom");
		assert!(value.get("file_path").is_none());
		assert!(value.get("start_ms").is_none());
		assert!(value.get("end_ms").is_none());
		Ok(())
	}

	#[test]
	fn test_decode_rejects_garbage() {
		assert!(matches!(JobRecord::decode("not json"), Err(QueueError::Json(_))));
		assert!(matches!(JobRecord::decode(r#"{"file_path":"x"}"#), Err(QueueError::Json(_))));
	}

	#[test]
	fn test_record_failure_only_increases() {
		let mut job = JobRecord::new("/tmp/a.wav", "radio", span());
		job.record_failure("boom");
		job.record_failure("boom again");
		assert_eq!(job.attempts, 2);
		assert_eq!(job.last_error.as_deref(), Some("boom again"));
	}

	#[test]
	fn test_transcription_date_set_once() {
		let mut job = JobRecord::new("/tmp/a.wav", "radio", span());
		let first = Utc::now();
		job.mark_transcribed(first);
		job.mark_transcribed(first + chrono::Duration::seconds(10));
		assert_eq!(job.transcription_date, Some(first));
	}
}
