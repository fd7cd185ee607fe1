//! Segment accumulator
//!
//! Folds consecutive same-kind deltas into one growing segment.
//!
//! ```text
//!            open(kind)                 open(other) / close()
//! NoneOpen ─────────────▶ Open(kind) ──────────────────────────▶ (closed Part)
//!                          │    ▲
//!                          └────┘ append(kind, text)
//! ```

use super::error::SegmentError;
use super::part::{Part, SegmentKind};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
enum SegmentState {
    #[default]
    NoneOpen,
    Open { kind: SegmentKind, text: String },
}

/// At most one open segment of any kind
#[derive(Debug, Default)]
pub struct SegmentAccumulator {
    state: SegmentState,
}

impl SegmentAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a new segment of `kind`
    ///
    /// Whatever segment is currently open is closed first and returned.
    pub fn open(&mut self, kind: SegmentKind) -> Option<Part> {
        let closed = self.close();
        self.state = SegmentState::Open {
            kind,
            text: String::new(),
        };
        closed
    }

    /// Append onto the open segment, which must be of the same kind
    pub fn append(&mut self, kind: SegmentKind, delta: &str) -> Result<(), SegmentError> {
        match &mut self.state {
            SegmentState::Open { kind: open, text } if *open == kind => {
                text.push_str(delta);
                Ok(())
            }
            _ => Err(SegmentError::NotOpen { kind }),
        }
    }

    /// Freeze the open segment into a part
    pub fn close(&mut self) -> Option<Part> {
        match std::mem::take(&mut self.state) {
            SegmentState::NoneOpen => None,
            SegmentState::Open { kind, text } => Some(Part::segment(kind, text)),
        }
    }

    pub fn open_kind(&self) -> Option<SegmentKind> {
        match &self.state {
            SegmentState::NoneOpen => None,
            SegmentState::Open { kind, .. } => Some(*kind),
        }
    }

    /// Copy of the open segment for live rendering
    pub fn peek(&self) -> Option<Part> {
        match &self.state {
            SegmentState::NoneOpen => None,
            SegmentState::Open { kind, text } => Some(Part::segment(*kind, text.clone())),
        }
    }
}
