//! Lineage reconstruction: walk every object forward in time, assigning
//! track ids, detecting divisions and recording ancestry.

use std::collections::HashSet;

use rayon::prelude::*;
use serde::Deserialize;
use tracing::{debug, info, trace};

use crate::error::{LineageError, Result};
use crate::integration::{CorrespondenceSource, Daughters};
use crate::tracker::occurrence::{
    Frame, IdAllocator, LineageId, LocalLabel, Occurrence, TrackId,
};
use crate::tracker::relabel::{RelabeledVolume, relabel};
use crate::tracker::stack::SegmentationStack;
use crate::tracker::track_state::TrackState;
use crate::tracker::track_table::TrackTable;

/// Configuration for the LineageBuilder.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BuilderConfig {
    /// Walk independent lineage trees on the rayon pool. Ids are identical
    /// to the sequential build.
    pub parallel: bool,
    /// Check the table invariants before relabeling.
    pub verify: bool,
}

/// Result of a successful build.
#[derive(Debug, Clone)]
pub struct LineageOutput {
    pub table: TrackTable,
    pub volume: RelabeledVolume,
}

/// A pending walk step: the object to record and the segment it belongs to.
#[derive(Debug, Clone, Copy)]
struct Continuation {
    frame: Frame,
    label: LocalLabel,
    track_id: TrackId,
    lineage_id: LineageId,
    first_frame: Frame,
    mother: Option<TrackId>,
}

impl Continuation {
    /// Entry point of a new lineage tree.
    fn root(frame: Frame, label: LocalLabel, ids: &mut IdAllocator) -> Self {
        let track_id = ids.next_track_id();
        Self {
            frame,
            label,
            track_id,
            lineage_id: track_id,
            first_frame: frame,
            mother: None,
        }
    }

    /// Same segment, one frame later.
    fn continued(&self, label: LocalLabel) -> Self {
        Self {
            frame: self.frame + 1,
            label,
            ..*self
        }
    }

    /// First step of a daughter segment born in the next frame.
    fn daughter(&self, label: LocalLabel, track_id: TrackId) -> Self {
        Self {
            frame: self.frame + 1,
            label,
            track_id,
            lineage_id: self.lineage_id,
            first_frame: self.frame + 1,
            mother: Some(self.track_id),
        }
    }

    fn occurrence(&self, global_id: u64, stack: &SegmentationStack) -> Occurrence {
        Occurrence {
            global_id,
            frame: self.frame,
            local_label: self.label,
            track_id: self.track_id,
            lineage_id: self.lineage_id,
            first_frame: self.first_frame,
            last_frame: None,
            state: TrackState::Continued,
            mother_track_id: self.mother,
            daughter_track_ids: None,
            region: stack.region(self.frame, self.label).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LineageBuilder {
    config: BuilderConfig,
}

impl LineageBuilder {
    pub fn new(config: BuilderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BuilderConfig {
        &self.config
    }

    /// Reconstruct lineages and relabel the stack with track ids.
    ///
    /// Any inconsistency in the correspondences aborts the whole build and
    /// nothing is returned.
    pub fn build<S>(&self, stack: &SegmentationStack, source: &S) -> Result<LineageOutput>
    where
        S: CorrespondenceSource + Sync + ?Sized,
    {
        let table = self.build_table(stack, source)?;
        let volume = relabel(stack, &table)?;
        Ok(LineageOutput { table, volume })
    }

    /// Reconstruct lineages without producing the relabeled volume.
    pub fn build_table<S>(&self, stack: &SegmentationStack, source: &S) -> Result<TrackTable>
    where
        S: CorrespondenceSource + Sync + ?Sized,
    {
        info!(
            frames = stack.num_frames(),
            objects = stack.num_objects(),
            parallel = self.config.parallel,
            "building lineages"
        );

        let table = if self.config.parallel {
            build_parallel(stack, source)?
        } else {
            build_sequential(stack, source)?
        };
        if self.config.verify {
            table.verify(stack)?;
        }

        info!(
            occurrences = table.len(),
            tracks = table.num_tracks(),
            lineages = table.num_lineages(),
            "lineages built"
        );
        Ok(table)
    }
}

/// Visit frames forward and labels ascending; every object not yet reached by
/// an earlier walk becomes the root of a new lineage.
fn build_sequential<S>(stack: &SegmentationStack, source: &S) -> Result<TrackTable>
where
    S: CorrespondenceSource + ?Sized,
{
    let mut ids = IdAllocator::new();
    let mut table = TrackTable::new();
    for frame in 0..stack.num_frames() {
        for label in stack.labels_in(frame) {
            if table.contains(frame, label) {
                continue;
            }
            let root = Continuation::root(frame, label, &mut ids);
            walk(stack, source, root, &mut ids, &mut table)?;
        }
    }
    Ok(table)
}

/// Walk each lineage tree on its own allocator, then splice the trees
/// together in root order so the ids match the sequential build.
fn build_parallel<S>(stack: &SegmentationStack, source: &S) -> Result<TrackTable>
where
    S: CorrespondenceSource + Sync + ?Sized,
{
    let roots = find_roots(stack, source)?;
    debug!(roots = roots.len(), "walking lineage trees in parallel");

    let trees = roots
        .par_iter()
        .map(|&(frame, label)| -> Result<(TrackTable, IdAllocator)> {
            let mut ids = IdAllocator::new();
            let mut tree = TrackTable::new();
            let root = Continuation::root(frame, label, &mut ids);
            walk(stack, source, root, &mut ids, &mut tree)?;
            Ok((tree, ids))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut table = TrackTable::new();
    let mut track_offset = 0;
    let mut global_offset = 0;
    for (tree, ids) in trees {
        table.absorb(tree, track_offset, global_offset)?;
        track_offset += ids.allocated_tracks();
        global_offset += ids.allocated_globals();
    }
    Ok(table)
}

/// Objects that no mother claims, in (frame, label) order.
fn find_roots<S>(stack: &SegmentationStack, source: &S) -> Result<Vec<(Frame, LocalLabel)>>
where
    S: CorrespondenceSource + Sync + ?Sized,
{
    let frames = stack.num_frames();
    let claims = (0..frames.saturating_sub(1))
        .into_par_iter()
        .map(|frame| -> Result<Vec<(LocalLabel, LocalLabel)>> {
            let mut claimed = Vec::new();
            for label in stack.labels_in(frame) {
                let raw = source.daughters(frame, label)?;
                for daughter in Daughters::classify(frame, label, &raw)?.labels() {
                    check_exists(stack, frame, label, daughter)?;
                    claimed.push((label, daughter));
                }
            }
            Ok(claimed)
        })
        .collect::<Result<Vec<_>>>()?;

    let mut claimed_in: Vec<HashSet<LocalLabel>> = vec![HashSet::new(); frames];
    for (frame, links) in claims.into_iter().enumerate() {
        for (mother, daughter) in links {
            if !claimed_in[frame + 1].insert(daughter) {
                return Err(already_tracked(frame, mother, daughter));
            }
        }
    }

    let mut roots = Vec::new();
    for (frame, claimed) in claimed_in.iter().enumerate() {
        roots.extend(
            stack
                .labels_in(frame)
                .filter(|label| !claimed.contains(label))
                .map(|label| (frame, label)),
        );
    }
    Ok(roots)
}

/// Follow one lineage tree from its root. Uses an explicit work-list; daughter
/// 1 and all its descendants are resolved before daughter 2.
fn walk<S>(
    stack: &SegmentationStack,
    source: &S,
    root: Continuation,
    ids: &mut IdAllocator,
    table: &mut TrackTable,
) -> Result<()>
where
    S: CorrespondenceSource + ?Sized,
{
    let last = stack.num_frames() - 1;
    let mut pending = vec![root];

    while let Some(step) = pending.pop() {
        trace!(frame = step.frame, label = step.label, track_id = step.track_id, "walk step");
        table.push(step.occurrence(ids.next_global_id(), stack))?;

        if step.frame == last {
            table.finalize_track(step.track_id, step.frame, TrackState::LastFrame)?;
            continue;
        }

        let raw = source.daughters(step.frame, step.label)?;
        match Daughters::classify(step.frame, step.label, &raw)? {
            Daughters::None => {
                debug!(frame = step.frame, track_id = step.track_id, "segment lost");
                table.finalize_track(step.track_id, step.frame, TrackState::Lost)?;
            }
            Daughters::One(next) => {
                check_unclaimed(stack, table, &step, next)?;
                pending.push(step.continued(next));
            }
            Daughters::Two(first, second) => {
                check_unclaimed(stack, table, &step, first)?;
                check_unclaimed(stack, table, &step, second)?;
                table.finalize_track(step.track_id, step.frame, TrackState::Divided)?;

                let first_id = ids.next_track_id();
                let second_id = ids.next_track_id();
                table.set_daughters(step.track_id, [first_id, second_id])?;
                debug!(
                    frame = step.frame,
                    track_id = step.track_id,
                    daughters = ?[first_id, second_id],
                    "segment divided"
                );

                pending.push(step.daughter(second, second_id));
                pending.push(step.daughter(first, first_id));
            }
        }
    }
    Ok(())
}

fn check_exists(
    stack: &SegmentationStack,
    frame: Frame,
    label: LocalLabel,
    daughter: LocalLabel,
) -> Result<()> {
    if stack.contains(frame + 1, daughter) {
        Ok(())
    } else {
        Err(LineageError::inconsistent(
            frame,
            label,
            format!("daughter {daughter} does not exist in frame {}", frame + 1),
        ))
    }
}

fn check_unclaimed(
    stack: &SegmentationStack,
    table: &TrackTable,
    step: &Continuation,
    daughter: LocalLabel,
) -> Result<()> {
    check_exists(stack, step.frame, step.label, daughter)?;
    if table.contains(step.frame + 1, daughter) {
        return Err(already_tracked(step.frame, step.label, daughter));
    }
    Ok(())
}

fn already_tracked(frame: Frame, mother: LocalLabel, daughter: LocalLabel) -> LineageError {
    LineageError::inconsistent(
        frame,
        mother,
        format!("daughter {daughter} of frame {} is claimed twice", frame + 1),
    )
}
