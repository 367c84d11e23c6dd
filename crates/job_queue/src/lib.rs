//! Job hand-off pipeline for chunked audio transcription.
//!
//! Jobs move between named FIFO lists in a shared broker. A stage claims a job by
//! atomically moving it to its processing list, runs its step and then resolves
//! the job into the next list, back into its source for a retry, or into the
//! dead-letter list. Delivery is at-least-once.

pub mod broker;
pub mod cleanup;
pub mod config;
pub mod error;
pub mod inmem;
pub mod job;
pub mod metrics;
pub mod observability;
pub mod pool;
pub mod producer;
pub mod recovery;
pub mod redis_queue;
pub mod service;
pub mod shutdown;
pub mod sink;
pub mod stage;
pub mod supervisor;
pub mod transcription;
pub mod wav;
pub mod worker;

pub use broker::Broker;
pub use cleanup::CleanupHandler;
pub use config::{BrokerArgs, QueueNames, WorkerConfig};
pub use error::{QueueError, Result};
pub use inmem::InMemBroker;
pub use job::JobRecord;
pub use metrics::{PipelineMetrics, StageMetrics};
pub use pool::WorkerPool;
pub use producer::{plan_chunks, AudioSource, ChunkSpan, Producer};
pub use redis_queue::RedisBroker;
pub use service::StageService;
pub use sink::{HttpSink, Transcript, TranscriptSink};
pub use stage::{FailurePolicy, JobHandler, RetryPolicy, Stage, StageQueues};
pub use supervisor::Supervisor;
pub use transcription::{Transcribe, TranscriptionHandler};
pub use wav::WavSource;
pub use worker::{Resolution, Worker};
