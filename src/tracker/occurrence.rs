//! One recorded (frame, label) object and the id allocator that numbers it.

use crate::tracker::stack::RegionProps;
use crate::tracker::track_state::TrackState;

/// Frame index in `[0, T)`.
pub type Frame = usize;
/// Per-frame object label; 0 is background.
pub type LocalLabel = u32;
/// Identifier of one lineage segment (a cell between birth/division and its end).
pub type TrackId = u64;
/// Identifier of a whole descent tree, equal to the root segment's track id.
pub type LineageId = u64;
/// Row key of an occurrence, strictly increasing in recording order.
pub type GlobalId = u64;

/// Hands out track ids and global ids, both starting at 1.
#[derive(Debug, Clone)]
pub struct IdAllocator {
    next_track_id: TrackId,
    next_global_id: GlobalId,
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdAllocator {
    pub fn new() -> Self {
        Self {
            next_track_id: 1,
            next_global_id: 1,
        }
    }

    pub fn next_track_id(&mut self) -> TrackId {
        let id = self.next_track_id;
        self.next_track_id += 1;
        id
    }

    pub fn next_global_id(&mut self) -> GlobalId {
        let id = self.next_global_id;
        self.next_global_id += 1;
        id
    }

    /// Number of track ids handed out so far.
    pub fn allocated_tracks(&self) -> u64 {
        self.next_track_id - 1
    }

    /// Number of global ids handed out so far.
    pub fn allocated_globals(&self) -> u64 {
        self.next_global_id - 1
    }
}

/// A single segmented object tied to its track and lineage.
#[derive(Debug, Clone, PartialEq)]
pub struct Occurrence {
    /// Row key
    pub global_id: GlobalId,
    pub frame: Frame,
    pub local_label: LocalLabel,
    pub track_id: TrackId,
    pub lineage_id: LineageId,
    /// First frame of the segment this occurrence belongs to
    pub first_frame: Frame,
    /// Last frame of the segment, known once the segment terminates
    pub last_frame: Option<Frame>,
    pub state: TrackState,
    pub mother_track_id: Option<TrackId>,
    /// Set on the terminating occurrence of a divided segment
    pub daughter_track_ids: Option<[TrackId; 2]>,
    pub region: RegionProps,
}

impl Occurrence {
    /// Whether this is the terminating record of a segment that divided.
    pub fn split(&self) -> bool {
        self.state == TrackState::Divided
    }

    /// Whether the segment has no mother, i.e. this belongs to a lineage root.
    pub fn is_root(&self) -> bool {
        self.mother_track_id.is_none()
    }

    /// Shift every id by the given offsets.
    pub(crate) fn shift(&mut self, track_offset: u64, global_offset: u64) {
        self.global_id += global_offset;
        self.track_id += track_offset;
        self.lineage_id += track_offset;
        if let Some(mother) = self.mother_track_id.as_mut() {
            *mother += track_offset;
        }
        if let Some(daughters) = self.daughter_track_ids.as_mut() {
            daughters[0] += track_offset;
            daughters[1] += track_offset;
        }
    }
}
