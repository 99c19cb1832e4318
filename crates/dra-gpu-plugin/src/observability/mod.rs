//! Observability Module
//!
//! - `events`: Structured event logging with consistent fields
//! - `tracing`: Subscriber setup (text or JSON)

pub mod events;
pub mod tracing;

pub use events::*;
pub use self::tracing::{init_tracing, TracingConfig};
