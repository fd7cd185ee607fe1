//! HTTP chat surface
//!
//! `POST /api/chat` takes the prior transcript plus a new user message and
//! answers with one assistant message, streamed as SSE frames or returned
//! whole as JSON.

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod stream;
pub mod types;

pub use middleware::AppState;
pub use router::create_router;
