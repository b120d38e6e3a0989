//! Trait for frame-to-frame correspondence providers.

use crate::error::{LineageError, Result};
use crate::tracker::{Frame, LocalLabel};

/// Trait for sources of frame-to-frame correspondences.
///
/// Implement this trait to connect the output of any upstream tracker to the
/// lineage builder.
///
/// # Example
///
/// ```ignore
/// use lineage_rs::{CorrespondenceSource, Frame, LocalLabel, Result};
///
/// struct Identity;
///
/// impl CorrespondenceSource for Identity {
///     fn daughters(&self, _frame: Frame, label: LocalLabel) -> Result<Vec<LocalLabel>> {
///         Ok(vec![label])
///     }
/// }
/// ```
pub trait CorrespondenceSource {
    /// Labels of `frame + 1` that continue `label` of `frame`.
    ///
    /// Must be a pure function of the source's data: the builder may ask for
    /// the same object more than once. Zero, one or two labels are valid;
    /// anything else is rejected by the builder.
    fn daughters(&self, frame: Frame, label: LocalLabel) -> Result<Vec<LocalLabel>>;
}

impl<T: CorrespondenceSource + ?Sized> CorrespondenceSource for &T {
    fn daughters(&self, frame: Frame, label: LocalLabel) -> Result<Vec<LocalLabel>> {
        (**self).daughters(frame, label)
    }
}

impl<T: CorrespondenceSource + ?Sized> CorrespondenceSource for Box<T> {
    fn daughters(&self, frame: Frame, label: LocalLabel) -> Result<Vec<LocalLabel>> {
        (**self).daughters(frame, label)
    }
}

/// Validated continuation of one object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Daughters {
    None,
    One(LocalLabel),
    Two(LocalLabel, LocalLabel),
}

impl Daughters {
    /// Classify the raw answer of a source for (`frame`, `label`).
    pub fn classify(frame: Frame, label: LocalLabel, daughters: &[LocalLabel]) -> Result<Self> {
        match *daughters {
            [] => Ok(Daughters::None),
            [a] => Ok(Daughters::One(a)),
            [a, b] if a != b => Ok(Daughters::Two(a, b)),
            [a, _] => Err(LineageError::inconsistent(
                frame,
                label,
                format!("daughter {a} listed twice"),
            )),
            _ => Err(LineageError::inconsistent(
                frame,
                label,
                format!("{} daughters", daughters.len()),
            )),
        }
    }

    /// The daughter labels in order.
    pub fn labels(&self) -> Vec<LocalLabel> {
        match *self {
            Daughters::None => Vec::new(),
            Daughters::One(a) => vec![a],
            Daughters::Two(a, b) => vec![a, b],
        }
    }
}
