//! Logging setup and timing helpers.

mod logging;
mod timing;

pub use logging::{init_tracing, TracingConfig};
pub use timing::SpanTimer;
