//! The HTTP ingress: chunked-upload assembly, task status/report reads, and
//! the request-id/auth middleware shared across them.

pub mod error;
pub mod middlewares;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use routes::router;
pub use state::AppState;
