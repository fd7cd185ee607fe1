//! Server-sent events parser
//!
//! Splits an upstream byte stream into `event:` / `data:` frames

pub mod decoder;
pub mod error;
pub mod frame;

pub use decoder::SseDecoder;
pub use frame::SseFrame;
