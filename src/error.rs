//! Error types for lineage reconstruction.

use thiserror::Error;

use crate::tracker::{Frame, LocalLabel};

/// Errors raised while building or exporting lineages.
///
/// All variants are fatal for the current build: the correspondence data is
/// deterministic input, so retrying with the same data fails the same way.
#[derive(Debug, Error)]
pub enum LineageError {
    /// A correspondence disagrees with the segmentation: more than two
    /// daughters, a daughter missing from the next frame, or an object
    /// claimed by two mothers.
    #[error("inconsistent correspondence at frame {frame}, label {label}: {reason}")]
    InconsistentCorrespondence {
        frame: Frame,
        label: LocalLabel,
        reason: String,
    },

    /// A daughter mask covers more than one label of the next frame.
    #[error("daughter mask {mask} of frame {frame}, label {label} overlaps labels {found:?}")]
    AmbiguousMask {
        frame: Frame,
        label: LocalLabel,
        mask: u8,
        found: Vec<LocalLabel>,
    },

    /// A mother is listed with more than two children in a transition table.
    #[error("mother {mother} at frame {frame} has {count} daughters")]
    TooManyDaughters {
        frame: Frame,
        mother: LocalLabel,
        count: usize,
    },

    /// The relabel kernel found a label with no matching occurrence.
    #[error("label {label} at frame {frame} has no occurrence")]
    CoverageError { frame: Frame, label: LocalLabel },

    /// Two arrays that must share a frame shape do not.
    #[error("shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        got: (usize, usize),
    },

    /// A finished track table breaks one of its structural invariants.
    #[error("track table invariant violated: {0}")]
    InvariantViolation(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

impl LineageError {
    pub(crate) fn inconsistent(frame: Frame, label: LocalLabel, reason: impl Into<String>) -> Self {
        Self::InconsistentCorrespondence {
            frame,
            label,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LineageError>;
