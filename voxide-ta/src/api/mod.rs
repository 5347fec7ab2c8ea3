//! HTTP API handlers for voxide-ta
//!
//! The fabric delivers pipeline trigger events as webhooks; operators get
//! a status API and an SSE stream.

pub mod analyses;
pub mod events;
pub mod health;
pub mod sse;

pub use analyses::analysis_routes;
pub use events::event_routes;
pub use health::health_routes;
pub use sse::event_stream;
