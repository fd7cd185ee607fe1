//! Streaming transcript core
//!
//! Folds a sequence of generation events (text deltas, reasoning deltas,
//! tool-call lifecycle events) into an ordered, replayable message.
//!
//! # Usage example
//! ```rust,ignore
//! let mut builder = TranscriptBuilder::new();
//! builder.apply(Event::reasoning("think"));
//! builder.apply(Event::text("answer"));
//! let message = builder.into_message();
//! assert_eq!(message.parts.len(), 2);
//! ```

pub mod builder;
pub mod driver;
pub mod error;
pub mod event;
pub mod part;
pub mod segment;
pub mod tool_call;

pub use builder::{TranscriptBuilder, TranscriptUpdate};
pub use error::ProtocolViolation;
pub use event::{Event, SourceItem};
pub use part::{
    FinishReason, Message, Part, Role, SegmentKind, ToolCallPart, ToolCallState, Transcript,
};
