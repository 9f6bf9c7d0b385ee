//! Event sinks for run observability.
//!
//! The executor reports every lifecycle transition (stage start and finish,
//! resource acquire and release, gate polls, archival, notification) as a
//! [`PipelineEvent`](crate::core::PipelineEvent) through an [`EventSink`].

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
