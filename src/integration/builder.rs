//! Builder for assembling transition tables by hand.

use super::{TableCorrespondence, Transition};
use crate::error::Result;
use crate::tracker::{Frame, LocalLabel};

/// Builder for creating a [`TableCorrespondence`] link by link.
#[derive(Debug, Clone, Default)]
pub struct TransitionTableBuilder {
    frame: Frame,
    transitions: Vec<Transition>,
}

impl TransitionTableBuilder {
    /// Create a new, empty builder positioned at frame 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the mother frame for the following links.
    pub fn frame(mut self, frame: Frame) -> Self {
        self.frame = frame;
        self
    }

    /// Link `child` of the next frame to `mother` of the current frame.
    pub fn link(mut self, mother: LocalLabel, child: LocalLabel) -> Self {
        self.transitions.push(Transition {
            frame: self.frame,
            mother,
            child,
        });
        self
    }

    /// Link `mother` to two children at once.
    pub fn split(self, mother: LocalLabel, first: LocalLabel, second: LocalLabel) -> Self {
        self.link(mother, first).link(mother, second)
    }

    /// Links collected so far.
    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    /// Build the final `TableCorrespondence`.
    pub fn build(self) -> Result<TableCorrespondence> {
        TableCorrespondence::from_transitions(self.transitions)
    }
}
