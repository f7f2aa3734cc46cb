//! Mediaflow API Library
//!
//! HTTP surface for the asset lifecycle: upload initiation and completion,
//! asset reads and deletion, the HLS manifest proxy and the signed image proxy.
//! Exposed as a library so integration tests can build the router directly.

pub mod error;
pub mod handlers;
pub mod imgproxy;
pub mod setup;
pub mod state;
pub mod urls;

pub use error::{ErrorResponse, HttpAppError, ValidatedJson};
pub use imgproxy::{ImgproxySigner, Operations};
pub use state::AppState;
