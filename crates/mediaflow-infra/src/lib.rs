//! Mediaflow Infrastructure Library
//!
//! Shared pieces used by both binaries:
//! - Telemetry initialization (`tracing` subscriber)
//! - HTTP middleware (request ID)

#[cfg(feature = "middleware")]
pub mod middleware;

pub mod telemetry;

#[cfg(feature = "middleware")]
pub use middleware::{get_request_id, request_id_middleware, RequestId, REQUEST_ID_HEADER};

pub use telemetry::{init_telemetry, LogFormat, DEFAULT_LOG_FILTER};
