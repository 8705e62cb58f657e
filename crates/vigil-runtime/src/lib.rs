//! Pipeline assembly.
//!
//! Wires capture, detection, identification, fusion and alerting into a
//! task graph with bounded channels. Latency beats throughput: the
//! frame channel holds two frames and drops the oldest on overflow; the
//! alert sink holds a hundred events with the same policy. A watch
//! channel cancels every task at its next suspension point.

pub mod channels;
pub mod config;
pub mod counters;
pub mod pipeline;
pub mod sink;
pub mod tagger;

pub use channels::{ring_channel, RingReceiver, RingSender};
pub use config::RuntimeConfig;
pub use counters::PipelineCounters;
pub use pipeline::{spawn_pipeline, EventSource, PipelineHandle};
pub use sink::AlertLogSink;
pub use tagger::{FixedTagger, RegistryTagger, SubjectTagger};
