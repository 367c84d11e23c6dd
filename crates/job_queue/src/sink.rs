use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Text recognized for one chunk, positioned in wall-clock time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcript {
	#[serde(rename = "fuente")]
	pub source: String,
	#[serde(rename = "timestamp_inicio")]
	pub start_time: DateTime<Utc>,
	#[serde(rename = "timestamp_fin")]
	pub end_time: DateTime<Utc>,
	#[serde(rename = "texto")]
	pub text: String,
}

/// Where finished transcripts are published.
#[async_trait]
pub trait TranscriptSink: Send + Sync + 'static {
	async fn publish(&self, transcript: &Transcript) -> Result<()>;
}

/// Posts each transcript as JSON to a search API.
pub struct HttpSink {
	client: reqwest::Client,
	url: String,
}

impl HttpSink {
	///
	/// # Errors
	/// Returns an error if the HTTP client cannot be built
	pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
		Ok(Self {
			client: reqwest::Client::builder().timeout(timeout).build()?,
			url: url.into(),
		})
	}
}

#[async_trait]
impl TranscriptSink for HttpSink {
	async fn publish(&self, transcript: &Transcript) -> Result<()> {
		let response = self.client.post(&self.url).json(transcript).send().await?;
		response.error_for_status()?;
		debug!(url = %self.url, source = %transcript.source, "Transcript published");
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use axum::{extract::State, routing::post, Json, Router};
	use std::sync::{Arc, Mutex};

	type Received = Arc<Mutex<Vec<Transcript>>>;

	async fn accept(State(received): State<Received>, Json(transcript): Json<Transcript>) -> Json<serde_json::Value> {
		if let Ok(mut list) = received.lock() {
			list.push(transcript);
		}
		Json(serde_json::json!({ "ok": true }))
	}

	#[tokio::test]
	async fn test_http_sink_posts_json() -> Result<()> {
		let received = Received::default();
		let app = Router::new().route("/transcripciones/", post(accept)).with_state(Arc::clone(&received));
		let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
		let addr = listener.local_addr()?;
		tokio::spawn(async move { axum::serve(listener, app).await });

		let now = Utc::now();
		let transcript = Transcript {
			source: "Radio Test".to_string(),
			start_time: now,
			end_time: now + chrono::Duration::seconds(15),
			text: "hola".to_string(),
		};

		let sink = HttpSink::new(format!("http://{addr}/transcripciones/"), Duration::from_secs(5))?;
		sink.publish(&transcript).await?;

		let got = received.lock().map(|list| list.clone()).unwrap_or_default();
		assert_eq!(got, vec![transcript]);
		Ok(())
	}

	#[test]
	fn test_wire_field_names() -> Result<()> {
		let now = Utc::now();
		let value = serde_json::to_value(Transcript {
			source: "a".to_string(),
			start_time: now,
			end_time: now,
			text: "b".to_string(),
		})?;
		assert!(value.get("fuente").is_some());
		assert!(value.get("timestamp_inicio").is_some());
		assert!(value.get("timestamp_fin").is_some());
		assert!(value.get("texto").is_some());
		Ok(())
	}
}
