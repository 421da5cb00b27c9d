//! HTTP adapters for the control API.

pub mod execution_api;

pub use execution_api::{build_router, ExecutionHttpServer};
