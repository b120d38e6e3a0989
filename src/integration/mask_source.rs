//! Correspondences from dense daughter masks.
//!
//! Frame-to-frame trackers of the mother-machine kind predict, for every cell
//! of frame t, two binary masks over frame t+1: where the cell itself (or its
//! first daughter) went, and where a second daughter appeared. The daughters
//! are the labels of frame t+1 under each mask's footprint.

use std::collections::{BTreeSet, HashMap};

use ndarray::{Array2, ArrayView2, Zip};
use serde::Deserialize;

use super::CorrespondenceSource;
use crate::error::{LineageError, Result};
use crate::tracker::{Frame, LocalLabel, SegmentationStack};

/// The two predicted footprints of one cell over the next frame.
#[derive(Debug, Clone, Deserialize)]
pub struct DaughterMasks {
    pub daughter_1: Array2<bool>,
    pub daughter_2: Array2<bool>,
}

/// Serialized form of one cell's daughter masks.
#[derive(Debug, Clone, Deserialize)]
pub struct MaskRecord {
    pub frame: Frame,
    pub label: LocalLabel,
    #[serde(flatten)]
    pub masks: DaughterMasks,
}

/// Correspondence source reading daughters off predicted masks.
#[derive(Debug, Clone)]
pub struct MaskCorrespondence<'a> {
    stack: &'a SegmentationStack,
    masks: HashMap<(Frame, LocalLabel), DaughterMasks>,
}

impl<'a> MaskCorrespondence<'a> {
    /// Create an empty source over `stack`.
    pub fn new(stack: &'a SegmentationStack) -> Self {
        Self {
            stack,
            masks: HashMap::new(),
        }
    }

    /// Build a source from serialized records.
    pub fn from_records(
        stack: &'a SegmentationStack,
        records: impl IntoIterator<Item = MaskRecord>,
    ) -> Result<Self> {
        let mut source = Self::new(stack);
        for record in records {
            source.insert(record.frame, record.label, record.masks)?;
        }
        Ok(source)
    }

    /// Register the masks predicted for `label` of `frame`.
    pub fn insert(&mut self, frame: Frame, label: LocalLabel, masks: DaughterMasks) -> Result<()> {
        let expected = self.stack.frame_shape();
        for mask in [&masks.daughter_1, &masks.daughter_2] {
            if mask.dim() != expected {
                return Err(LineageError::ShapeMismatch {
                    expected,
                    got: mask.dim(),
                });
            }
        }
        self.masks.insert((frame, label), masks);
        Ok(())
    }

    /// Number of cells with registered masks.
    pub fn len(&self) -> usize {
        self.masks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.masks.is_empty()
    }
}

impl CorrespondenceSource for MaskCorrespondence<'_> {
    fn daughters(&self, frame: Frame, label: LocalLabel) -> Result<Vec<LocalLabel>> {
        if frame + 1 >= self.stack.num_frames() {
            return Ok(Vec::new());
        }
        let Some(masks) = self.masks.get(&(frame, label)) else {
            return Ok(Vec::new());
        };

        let next = self.stack.frame(frame + 1);
        let mut daughters = Vec::with_capacity(2);
        for (index, mask) in [(1, &masks.daughter_1), (2, &masks.daughter_2)] {
            let found = labels_under(next, mask);
            let mut found = found.into_iter();
            match (found.next(), found.len()) {
                (None, _) => {}
                (Some(daughter), 0) => {
                    if !daughters.contains(&daughter) {
                        daughters.push(daughter);
                    }
                }
                (Some(first), _) => {
                    return Err(LineageError::AmbiguousMask {
                        frame,
                        label,
                        mask: index,
                        found: std::iter::once(first).chain(found).collect(),
                    });
                }
            }
        }
        Ok(daughters)
    }
}

/// Distinct non-zero labels of `frame` inside `mask`.
fn labels_under(frame: ArrayView2<'_, LocalLabel>, mask: &Array2<bool>) -> BTreeSet<LocalLabel> {
    let mut found = BTreeSet::new();
    Zip::from(frame).and(mask).for_each(|&label, &inside| {
        if inside && label != 0 {
            found.insert(label);
        }
    });
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn stack() -> SegmentationStack {
        SegmentationStack::from_frames(vec![
            array![[1, 1, 0], [0, 0, 0]],
            array![[3, 0, 5], [3, 0, 5]],
        ])
        .unwrap()
    }

    fn masks(d1: Array2<bool>, d2: Array2<bool>) -> DaughterMasks {
        DaughterMasks {
            daughter_1: d1,
            daughter_2: d2,
        }
    }

    #[test]
    fn test_single_and_split_footprints() {
        let stack = stack();
        let mut source = MaskCorrespondence::new(&stack);
        let empty = Array2::from_elem((2, 3), false);

        source
            .insert(0, 1, masks(array![[true, false, false], [true, false, false]], empty.clone()))
            .unwrap();
        assert_eq!(source.daughters(0, 1).unwrap(), vec![3]);

        source
            .insert(
                0,
                1,
                masks(
                    array![[false, false, true], [false, false, false]],
                    array![[true, true, false], [false, false, false]],
                ),
            )
            .unwrap();
        assert_eq!(source.daughters(0, 1).unwrap(), vec![5, 3]);
    }

    #[test]
    fn test_background_only_and_missing_entries() {
        let stack = stack();
        let mut source = MaskCorrespondence::new(&stack);
        let background = array![[false, true, false], [false, true, false]];
        source
            .insert(0, 1, masks(background.clone(), background))
            .unwrap();

        assert!(source.daughters(0, 1).unwrap().is_empty());
        assert!(source.daughters(0, 2).unwrap().is_empty());
        assert!(source.daughters(1, 3).unwrap().is_empty());
    }

    #[test]
    fn test_both_masks_on_same_label() {
        let stack = stack();
        let mut source = MaskCorrespondence::new(&stack);
        let on_three = array![[true, false, false], [false, false, false]];
        source
            .insert(0, 1, masks(on_three.clone(), on_three))
            .unwrap();
        assert_eq!(source.daughters(0, 1).unwrap(), vec![3]);
    }

    #[test]
    fn test_ambiguous_mask() {
        let stack = stack();
        let mut source = MaskCorrespondence::new(&stack);
        source
            .insert(
                0,
                1,
                masks(
                    Array2::from_elem((2, 3), false),
                    array![[true, true, true], [false, false, false]],
                ),
            )
            .unwrap();

        let err = source.daughters(0, 1).unwrap_err();
        match err {
            LineageError::AmbiguousMask { frame, label, mask, found } => {
                assert_eq!((frame, label, mask), (0, 1, 2));
                assert_eq!(found, vec![3, 5]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_mask_shape_checked() {
        let stack = stack();
        let mut source = MaskCorrespondence::new(&stack);
        let wrong = Array2::from_elem((3, 3), false);
        assert!(matches!(
            source.insert(0, 1, masks(wrong.clone(), wrong)),
            Err(LineageError::ShapeMismatch { .. })
        ));
        assert!(source.is_empty());
    }
}
