//! Observability: subscriber setup and wide event payloads.

mod logging;
mod wide_events;

pub use logging::init_tracing;
pub use wide_events::WideEventEmitter;
