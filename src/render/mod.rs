//! Presentation adapters
//!
//! Both consume the same `TranscriptUpdate` stream.

pub mod panel;
pub mod terminal;

pub use panel::PanelRenderer;
pub use terminal::{TerminalOptions, TerminalRenderer};
