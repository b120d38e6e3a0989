//! Segmentation stack: T dense label images of the same H×W.

use std::collections::BTreeMap;

use ndarray::{Array2, Array3, ArrayView2, Axis};

use crate::error::{LineageError, Result};
use crate::tracker::occurrence::{Frame, LocalLabel};

/// Per-object geometry measured from the segmentation.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RegionProps {
    /// Number of pixels
    pub area: usize,
    /// Mean row coordinate
    pub centroid_row: f64,
    /// Mean column coordinate
    pub centroid_col: f64,
}

/// Stack of per-frame label images, indexed once on construction.
#[derive(Debug, Clone)]
pub struct SegmentationStack {
    labels: Array3<LocalLabel>,
    /// Sorted labels of each frame with their geometry
    index: Vec<BTreeMap<LocalLabel, RegionProps>>,
}

impl SegmentationStack {
    /// Create a stack from a T×H×W label volume.
    pub fn new(labels: Array3<LocalLabel>) -> Self {
        let index = labels.axis_iter(Axis(0)).map(index_frame).collect();
        Self { labels, index }
    }

    /// Create a stack from individual frames, which must share one shape.
    pub fn from_frames(frames: Vec<Array2<LocalLabel>>) -> Result<Self> {
        let Some(first) = frames.first() else {
            return Ok(Self::new(Array3::zeros((0, 0, 0))));
        };
        let expected = first.dim();
        if let Some(bad) = frames.iter().find(|f| f.dim() != expected) {
            return Err(LineageError::ShapeMismatch {
                expected,
                got: bad.dim(),
            });
        }
        let views: Vec<ArrayView2<LocalLabel>> = frames.iter().map(|f| f.view()).collect();
        let labels = ndarray::stack(Axis(0), &views).map_err(|_| LineageError::ShapeMismatch {
            expected,
            got: expected,
        })?;
        Ok(Self::new(labels))
    }

    pub fn num_frames(&self) -> usize {
        self.labels.len_of(Axis(0))
    }

    /// (H, W) of every frame.
    pub fn frame_shape(&self) -> (usize, usize) {
        let (_, h, w) = self.labels.dim();
        (h, w)
    }

    pub fn labels(&self) -> &Array3<LocalLabel> {
        &self.labels
    }

    pub fn frame(&self, frame: Frame) -> ArrayView2<'_, LocalLabel> {
        self.labels.index_axis(Axis(0), frame)
    }

    /// Labels present in `frame`, ascending.
    pub fn labels_in(&self, frame: Frame) -> impl Iterator<Item = LocalLabel> + '_ {
        self.index
            .get(frame)
            .into_iter()
            .flat_map(|labels| labels.keys().copied())
    }

    pub fn contains(&self, frame: Frame, label: LocalLabel) -> bool {
        self.index
            .get(frame)
            .is_some_and(|labels| labels.contains_key(&label))
    }

    pub fn region(&self, frame: Frame, label: LocalLabel) -> Option<RegionProps> {
        self.index.get(frame)?.get(&label).copied()
    }

    /// Largest label present in `frame`, or 0 for an empty frame.
    pub fn max_label(&self, frame: Frame) -> LocalLabel {
        self.index
            .get(frame)
            .and_then(|labels| labels.keys().next_back().copied())
            .unwrap_or(0)
    }

    /// Total number of segmented objects over all frames.
    pub fn num_objects(&self) -> usize {
        self.index.iter().map(BTreeMap::len).sum()
    }
}

fn index_frame(frame: ArrayView2<'_, LocalLabel>) -> BTreeMap<LocalLabel, RegionProps> {
    let mut sums: BTreeMap<LocalLabel, (usize, f64, f64)> = BTreeMap::new();
    for ((row, col), &label) in frame.indexed_iter() {
        if label == 0 {
            continue;
        }
        let entry = sums.entry(label).or_insert((0, 0.0, 0.0));
        entry.0 += 1;
        entry.1 += row as f64;
        entry.2 += col as f64;
    }
    sums.into_iter()
        .map(|(label, (area, rows, cols))| {
            let props = RegionProps {
                area,
                centroid_row: rows / area as f64,
                centroid_col: cols / area as f64,
            };
            (label, props)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_index_labels_and_regions() {
        let stack = SegmentationStack::from_frames(vec![
            array![[0, 1, 1], [0, 0, 3]],
            array![[2, 0, 0], [2, 0, 0]],
        ])
        .unwrap();

        assert_eq!(stack.num_frames(), 2);
        assert_eq!(stack.frame_shape(), (2, 3));
        assert_eq!(stack.labels_in(0).collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(stack.labels_in(1).collect::<Vec<_>>(), vec![2]);
        assert!(stack.contains(0, 3));
        assert!(!stack.contains(1, 1));
        assert_eq!(stack.max_label(0), 3);
        assert_eq!(stack.num_objects(), 3);

        let one = stack.region(0, 1).unwrap();
        assert_eq!(one.area, 2);
        assert!((one.centroid_row - 0.0).abs() < 1e-12);
        assert!((one.centroid_col - 1.5).abs() < 1e-12);

        let two = stack.region(1, 2).unwrap();
        assert!((two.centroid_row - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_from_frames_rejects_mixed_shapes() {
        let result = SegmentationStack::from_frames(vec![
            Array2::zeros((2, 2)),
            Array2::zeros((3, 2)),
        ]);
        assert!(matches!(
            result,
            Err(LineageError::ShapeMismatch {
                expected: (2, 2),
                got: (3, 2)
            })
        ));
    }

    #[test]
    fn test_empty_stack() {
        let stack = SegmentationStack::from_frames(Vec::new()).unwrap();
        assert_eq!(stack.num_frames(), 0);
        assert_eq!(stack.labels_in(0).count(), 0);
        assert_eq!(stack.max_label(0), 0);
    }
}
