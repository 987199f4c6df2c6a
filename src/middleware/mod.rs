// ABOUTME: HTTP middleware for CORS and request tracing
// ABOUTME: Provides the layers wrapped around the query API router

pub mod cors;
pub mod tracing;

// CORS configuration
pub use cors::setup_cors;

// Request tracing and correlation
pub use tracing::{create_request_span, MakeRequestUuid, REQUEST_ID_HEADER};
