//! In-memory lineage ledger with lookups by object, track and lineage.

use std::collections::{HashMap, HashSet};

use crate::error::{LineageError, Result};
use crate::tracker::occurrence::{Frame, LineageId, LocalLabel, Occurrence, TrackId};
use crate::tracker::stack::SegmentationStack;
use crate::tracker::track_state::TrackState;

/// Occurrences in recording order plus the indexes used for retroactive writes.
#[derive(Debug, Clone, Default)]
pub struct TrackTable {
    occurrences: Vec<Occurrence>,
    by_key: HashMap<(Frame, LocalLabel), usize>,
    by_track: HashMap<TrackId, Vec<usize>>,
    by_lineage: HashMap<LineageId, Vec<usize>>,
}

impl TrackTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an occurrence, returning its row.
    pub fn push(&mut self, occurrence: Occurrence) -> Result<usize> {
        let key = (occurrence.frame, occurrence.local_label);
        if self.by_key.contains_key(&key) {
            return Err(LineageError::inconsistent(
                key.0,
                key.1,
                "object recorded twice",
            ));
        }
        let row = self.occurrences.len();
        self.by_key.insert(key, row);
        self.by_track
            .entry(occurrence.track_id)
            .or_default()
            .push(row);
        self.by_lineage
            .entry(occurrence.lineage_id)
            .or_default()
            .push(row);
        self.occurrences.push(occurrence);
        Ok(row)
    }

    /// Close a segment: every occurrence of `track_id` learns its last frame,
    /// and the occurrence at `last_frame` takes the terminating state.
    pub fn finalize_track(
        &mut self,
        track_id: TrackId,
        last_frame: Frame,
        state: TrackState,
    ) -> Result<()> {
        let rows = self
            .by_track
            .get(&track_id)
            .ok_or_else(|| missing_track(track_id))?;
        for &row in rows {
            let occ = &mut self.occurrences[row];
            occ.last_frame = Some(last_frame);
            if occ.frame == last_frame {
                occ.state = state;
            }
        }
        Ok(())
    }

    /// Record the two daughter segments on the mother's terminating occurrence.
    pub fn set_daughters(&mut self, track_id: TrackId, daughters: [TrackId; 2]) -> Result<()> {
        let row = *self
            .rows_of(track_id)?
            .last()
            .ok_or_else(|| missing_track(track_id))?;
        self.occurrences[row].daughter_track_ids = Some(daughters);
        Ok(())
    }

    fn rows_of(&self, track_id: TrackId) -> Result<&Vec<usize>> {
        self.by_track
            .get(&track_id)
            .ok_or_else(|| missing_track(track_id))
    }

    pub fn len(&self) -> usize {
        self.occurrences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.occurrences.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Occurrence> {
        self.occurrences.iter()
    }

    pub fn get(&self, frame: Frame, label: LocalLabel) -> Option<&Occurrence> {
        self.by_key
            .get(&(frame, label))
            .map(|&row| &self.occurrences[row])
    }

    pub fn contains(&self, frame: Frame, label: LocalLabel) -> bool {
        self.by_key.contains_key(&(frame, label))
    }

    /// Occurrences of one segment, in frame order.
    pub fn track(&self, track_id: TrackId) -> impl Iterator<Item = &Occurrence> + '_ {
        self.by_track
            .get(&track_id)
            .into_iter()
            .flatten()
            .map(|&row| &self.occurrences[row])
    }

    /// All occurrences of a descent tree, in recording order.
    pub fn lineage(&self, lineage_id: LineageId) -> impl Iterator<Item = &Occurrence> + '_ {
        self.by_lineage
            .get(&lineage_id)
            .into_iter()
            .flatten()
            .map(|&row| &self.occurrences[row])
    }

    /// Occurrences recorded at `frame`.
    pub fn in_frame(&self, frame: Frame) -> impl Iterator<Item = &Occurrence> + '_ {
        self.occurrences.iter().filter(move |occ| occ.frame == frame)
    }

    /// Distinct track ids, ascending.
    pub fn track_ids(&self) -> Vec<TrackId> {
        let mut ids: Vec<TrackId> = self.by_track.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn num_tracks(&self) -> usize {
        self.by_track.len()
    }

    pub fn num_lineages(&self) -> usize {
        self.by_lineage.len()
    }

    /// Append `other`, shifting its track ids by `track_offset` and its
    /// global ids by `global_offset`.
    pub fn absorb(
        &mut self,
        other: TrackTable,
        track_offset: u64,
        global_offset: u64,
    ) -> Result<()> {
        for mut occ in other.occurrences {
            occ.shift(track_offset, global_offset);
            self.push(occ)?;
        }
        Ok(())
    }

    /// Check the structural invariants of a finished table against the
    /// stack it was built from.
    pub fn verify(&self, stack: &SegmentationStack) -> Result<()> {
        // every object exactly once
        if self.len() != stack.num_objects() {
            return violation(format!(
                "{} occurrences for {} segmented objects",
                self.len(),
                stack.num_objects()
            ));
        }
        for occ in &self.occurrences {
            if !stack.contains(occ.frame, occ.local_label) {
                return violation(format!(
                    "occurrence {} refers to missing label {} at frame {}",
                    occ.global_id, occ.local_label, occ.frame
                ));
            }
        }

        for (&track_id, rows) in &self.by_track {
            self.verify_track(track_id, rows)?;
        }
        Ok(())
    }

    fn verify_track(&self, track_id: TrackId, rows: &[usize]) -> Result<()> {
        let first = &self.occurrences[rows[0]];
        let Some(last_frame) = first.last_frame else {
            return violation(format!("track {track_id} was never finalized"));
        };

        if first.is_root() && first.lineage_id != track_id {
            return violation(format!(
                "root track {track_id} has lineage {}",
                first.lineage_id
            ));
        }

        let mut frames = HashSet::new();
        for &row in rows {
            let occ = &self.occurrences[row];
            if !frames.insert(occ.frame) {
                return violation(format!("track {track_id} appears twice at frame {}", occ.frame));
            }
            if occ.first_frame != first.first_frame
                || occ.last_frame != Some(last_frame)
                || occ.lineage_id != first.lineage_id
                || occ.mother_track_id != first.mother_track_id
            {
                return violation(format!("track {track_id} has inconsistent segment fields"));
            }
            let terminal = occ.frame == last_frame;
            if occ.state.is_terminal() != terminal {
                return violation(format!(
                    "track {track_id} has state {:?} at frame {}",
                    occ.state, occ.frame
                ));
            }
            if !terminal && occ.daughter_track_ids.is_some() {
                return violation(format!("track {track_id} has daughters before its end"));
            }
        }
        if last_frame < first.first_frame
            || frames.len() != last_frame + 1 - first.first_frame
            || frames.iter().any(|&f| f < first.first_frame || f > last_frame)
        {
            return violation(format!("track {track_id} does not cover its frame interval"));
        }

        let terminal = self
            .track(track_id)
            .find(|occ| occ.frame == last_frame)
            .ok_or_else(|| missing_track(track_id))?;
        match (terminal.split(), terminal.daughter_track_ids) {
            (true, Some(daughters)) => {
                for daughter in daughters {
                    let head = self.track(daughter).next().ok_or_else(|| {
                        LineageError::InvariantViolation(format!(
                            "daughter {daughter} of track {track_id} has no occurrences"
                        ))
                    })?;
                    if head.first_frame != last_frame + 1 || head.mother_track_id != Some(track_id)
                    {
                        return violation(format!(
                            "daughter {daughter} of track {track_id} is not born after its mother"
                        ));
                    }
                }
            }
            (false, None) => {}
            _ => return violation(format!("track {track_id} split flag disagrees with daughters")),
        }

        // follow mothers back to the root
        let mut head = first;
        let mut steps = 0;
        while let Some(mother) = head.mother_track_id {
            steps += 1;
            if steps > self.by_track.len() {
                return violation(format!("track {track_id} has a cyclic ancestry"));
            }
            head = self.track(mother).next().ok_or_else(|| missing_track(mother))?;
        }
        if first.lineage_id != head.track_id {
            return violation(format!(
                "track {track_id} has lineage {} but root {}",
                first.lineage_id, head.track_id
            ));
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a TrackTable {
    type Item = &'a Occurrence;
    type IntoIter = std::slice::Iter<'a, Occurrence>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

fn missing_track(track_id: TrackId) -> LineageError {
    LineageError::InvariantViolation(format!("unknown track {track_id}"))
}

fn violation(message: String) -> Result<()> {
    Err(LineageError::InvariantViolation(message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::stack::RegionProps;

    fn occ(global_id: u64, frame: Frame, label: LocalLabel, track_id: TrackId) -> Occurrence {
        Occurrence {
            global_id,
            frame,
            local_label: label,
            track_id,
            lineage_id: 1,
            first_frame: 0,
            last_frame: None,
            state: TrackState::Continued,
            mother_track_id: None,
            daughter_track_ids: None,
            region: RegionProps::default(),
        }
    }

    #[test]
    fn test_finalize_writes_every_occurrence() {
        let mut table = TrackTable::new();
        table.push(occ(1, 0, 5, 1)).unwrap();
        table.push(occ(2, 1, 2, 1)).unwrap();
        table.push(occ(3, 2, 9, 1)).unwrap();
        table.finalize_track(1, 2, TrackState::Lost).unwrap();

        assert!(table.track(1).all(|o| o.last_frame == Some(2)));
        let states: Vec<TrackState> = table.track(1).map(|o| o.state).collect();
        assert_eq!(
            states,
            vec![TrackState::Continued, TrackState::Continued, TrackState::Lost]
        );
    }

    #[test]
    fn test_daughters_land_on_terminating_occurrence() {
        let mut table = TrackTable::new();
        table.push(occ(1, 0, 1, 1)).unwrap();
        table.push(occ(2, 1, 1, 1)).unwrap();
        table.finalize_track(1, 1, TrackState::Divided).unwrap();
        table.set_daughters(1, [2, 3]).unwrap();

        assert_eq!(table.get(0, 1).unwrap().daughter_track_ids, None);
        assert_eq!(table.get(1, 1).unwrap().daughter_track_ids, Some([2, 3]));
        assert!(table.get(1, 1).unwrap().split());
    }

    #[test]
    fn test_duplicate_object_rejected() {
        let mut table = TrackTable::new();
        table.push(occ(1, 0, 1, 1)).unwrap();
        let err = table.push(occ(2, 0, 1, 2)).unwrap_err();
        assert!(matches!(
            err,
            LineageError::InconsistentCorrespondence { frame: 0, label: 1, .. }
        ));
    }

    #[test]
    fn test_unknown_track() {
        let mut table = TrackTable::new();
        assert!(table.finalize_track(7, 0, TrackState::Lost).is_err());
        assert!(table.set_daughters(7, [1, 2]).is_err());
        assert_eq!(table.track(7).count(), 0);
    }

    #[test]
    fn test_absorb_shifts_ids() {
        let mut left = TrackTable::new();
        left.push(occ(1, 0, 1, 1)).unwrap();

        let mut right = TrackTable::new();
        right.push(occ(1, 0, 2, 1)).unwrap();

        left.absorb(right, 1, 1).unwrap();
        let moved = left.get(0, 2).unwrap();
        assert_eq!((moved.global_id, moved.track_id, moved.lineage_id), (2, 2, 2));
        assert_eq!(left.num_tracks(), 2);
        assert_eq!(left.num_lineages(), 2);
        assert_eq!(left.track_ids(), vec![1, 2]);
    }

    fn stack(frames: usize) -> SegmentationStack {
        let labels: Vec<_> = (0..frames).map(|_| ndarray::array![[1, 2]]).collect();
        SegmentationStack::from_frames(labels).unwrap()
    }

    /// Track 1 (label 1) divides at frame 0 into tracks 2 and 3; label 2 of
    /// frame 0 is a separate lineage continuing as track 4.
    fn divided_table() -> TrackTable {
        let mut table = TrackTable::new();
        table.push(occ(1, 0, 1, 1)).unwrap();
        table.finalize_track(1, 0, TrackState::Divided).unwrap();
        table.set_daughters(1, [2, 3]).unwrap();
        for (global_id, label, track_id) in [(2, 1, 2), (3, 2, 3)] {
            let mut daughter = occ(global_id, 1, label, track_id);
            daughter.first_frame = 1;
            daughter.mother_track_id = Some(1);
            table.push(daughter).unwrap();
            table.finalize_track(track_id, 1, TrackState::LastFrame).unwrap();
        }
        let mut other = occ(4, 0, 2, 4);
        other.lineage_id = 4;
        table.push(other).unwrap();
        table.finalize_track(4, 0, TrackState::Lost).unwrap();
        table
    }

    #[test]
    fn test_verify_accepts_consistent_table() {
        let table = divided_table();
        table.verify(&stack(2)).unwrap();
        assert_eq!(table.in_frame(1).count(), 2);
        assert!(table.in_frame(1).all(|o| !o.is_root()));
    }

    #[test]
    fn test_verify_rejects_split_without_daughters() {
        let mut table = divided_table();
        table.occurrences[0].daughter_track_ids = None;
        let err = table.verify(&stack(2)).unwrap_err();
        assert!(matches!(
            err,
            LineageError::InvariantViolation(msg) if msg.contains("split flag")
        ));
    }

    #[test]
    fn test_verify_rejects_wrong_root_lineage() {
        let mut table = divided_table();
        table.occurrences[3].lineage_id = 1;
        let err = table.verify(&stack(2)).unwrap_err();
        assert!(matches!(
            err,
            LineageError::InvariantViolation(msg) if msg.contains("root track 4")
        ));
    }

    #[test]
    fn test_verify_rejects_daughter_outside_lineage() {
        let mut table = divided_table();
        table.occurrences[2].lineage_id = 9;
        let err = table.verify(&stack(2)).unwrap_err();
        assert!(matches!(err, LineageError::InvariantViolation(_)));
    }

    #[test]
    fn test_verify_rejects_missing_object() {
        let table = divided_table();
        let err = table.verify(&stack(3)).unwrap_err();
        assert!(matches!(
            err,
            LineageError::InvariantViolation(msg) if msg.contains("segmented objects")
        ));
    }
}
