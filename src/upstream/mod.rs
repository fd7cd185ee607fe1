//! OpenAI-compatible model server client
//!
//! Turns a streamed chat completion into transcript events.

pub mod converter;
pub mod errors;
pub mod provider;
pub mod sse;
pub mod types;

pub use provider::ChatProvider;
