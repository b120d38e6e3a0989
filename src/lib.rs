//! Cell lineage reconstruction.
//!
//! Given per-frame instance segmentations and a source of frame-to-frame
//! correspondences, [`LineageBuilder`] assigns persistent track identities,
//! detects divisions, records ancestry and produces a [`TrackTable`] together
//! with a relabeled volume in which every pixel carries its track id.

pub mod error;
pub mod integration;
pub mod tracker;

pub use error::{LineageError, Result};
pub use integration::{
    CellMarker, CorrespondenceSource, DaughterMasks, Daughters, LedgerOptions, LedgerWriter,
    LineagePipeline, MaskCorrespondence, MaskRecord, TableCorrespondence, TrackRow, Transition,
    TransitionTableBuilder, read_ledger,
};
pub use tracker::{
    BuilderConfig, Frame, GlobalId, IdAllocator, LineageBuilder, LineageId, LineageOutput,
    LocalLabel, Occurrence, RegionProps, RelabelKernel, RelabeledVolume, SegmentationStack,
    Substitutions, TrackId, TrackState, TrackTable, relabel,
};
