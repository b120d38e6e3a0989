//! Rewrite a label stack through per-frame (old label → new id) substitutions.

use std::collections::HashMap;

use ndarray::{Array3, Axis};

use crate::error::{LineageError, Result};
use crate::tracker::occurrence::{Frame, LocalLabel, TrackId};
use crate::tracker::stack::SegmentationStack;
use crate::tracker::track_table::TrackTable;

/// Label stack rewritten so that pixel values are track ids; background stays 0.
pub type RelabeledVolume = Array3<TrackId>;

/// Per-frame substitution table. New ids must be positive.
#[derive(Debug, Clone, Default)]
pub struct Substitutions {
    frames: Vec<HashMap<LocalLabel, TrackId>>,
}

impl Substitutions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, frame: Frame, old: LocalLabel, new: TrackId) {
        if self.frames.len() <= frame {
            self.frames.resize_with(frame + 1, HashMap::new);
        }
        self.frames[frame].insert(old, new);
    }

    pub fn get(&self, frame: Frame, old: LocalLabel) -> Option<TrackId> {
        self.frames.get(frame)?.get(&old).copied()
    }

    /// Number of substitutions over all frames.
    pub fn len(&self) -> usize {
        self.frames.iter().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// (frame, local label) → track id for every occurrence of `table`.
    pub fn from_table(table: &TrackTable) -> Self {
        let mut subs = Self::new();
        for occ in table {
            subs.insert(occ.frame, occ.local_label, occ.track_id);
        }
        subs
    }
}

/// Relabeling kernel.
pub struct RelabelKernel;

impl RelabelKernel {
    /// Apply `subs` to every frame of `stack`.
    ///
    /// Each frame is rewritten through one lookup built from its label set, so
    /// memory stays bounded by the frame size whatever the label values. A
    /// non-zero pixel whose label has no substitution fails with
    /// [`LineageError::CoverageError`].
    pub fn apply(stack: &SegmentationStack, subs: &Substitutions) -> Result<RelabeledVolume> {
        let labels = stack.labels();
        let mut volume = RelabeledVolume::zeros(labels.raw_dim());

        for (frame, (source, mut target)) in labels
            .axis_iter(Axis(0))
            .zip(volume.axis_iter_mut(Axis(0)))
            .enumerate()
        {
            let lookup = FrameLookup::new(stack, subs, frame, source.len());
            for (out, &label) in target.iter_mut().zip(source.iter()) {
                if label == 0 {
                    continue;
                }
                match lookup.get(label) {
                    0 => return Err(LineageError::CoverageError { frame, label }),
                    id => *out = id,
                }
            }
        }
        Ok(volume)
    }
}

/// Per-frame label → id lookup; 0 marks labels without a substitution.
enum FrameLookup {
    /// Indexed by label value, used while the largest label fits the frame.
    Dense(Vec<TrackId>),
    /// Indexed by rank in the frame's ascending label set.
    Ranked {
        labels: Vec<LocalLabel>,
        ids: Vec<TrackId>,
    },
}

impl FrameLookup {
    fn new(stack: &SegmentationStack, subs: &Substitutions, frame: Frame, pixels: usize) -> Self {
        let max_label = stack.max_label(frame) as usize;
        if max_label <= pixels {
            let mut lookup = vec![0; max_label + 1];
            for label in stack.labels_in(frame) {
                if let Some(id) = subs.get(frame, label) {
                    lookup[label as usize] = id;
                }
            }
            Self::Dense(lookup)
        } else {
            let labels: Vec<LocalLabel> = stack.labels_in(frame).collect();
            let ids = labels
                .iter()
                .map(|&label| subs.get(frame, label).unwrap_or(0))
                .collect();
            Self::Ranked { labels, ids }
        }
    }

    fn get(&self, label: LocalLabel) -> TrackId {
        match self {
            Self::Dense(lookup) => lookup.get(label as usize).copied().unwrap_or(0),
            Self::Ranked { labels, ids } => labels
                .binary_search(&label)
                .map_or(0, |rank| ids[rank]),
        }
    }
}

/// Relabel `stack` with the track ids recorded in `table`.
pub fn relabel(stack: &SegmentationStack, table: &TrackTable) -> Result<RelabeledVolume> {
    RelabelKernel::apply(stack, &Substitutions::from_table(table))
}
