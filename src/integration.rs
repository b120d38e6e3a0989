//! Integration module for connecting upstream trackers with the lineage builder.
//!
//! This module provides the correspondence trait, adapters for the two
//! upstream formats (dense daughter masks and explicit mother/daughter
//! tables), and the ledger writer for exporting results.

mod builder;
mod correspondence;
mod ledger;
mod mask_source;
mod pipeline;
mod table_source;

pub use builder::TransitionTableBuilder;
pub use correspondence::{CorrespondenceSource, Daughters};
pub use ledger::{CellMarker, LedgerOptions, LedgerWriter, TrackRow, read_ledger};
pub use mask_source::{DaughterMasks, MaskCorrespondence, MaskRecord};
pub use pipeline::LineagePipeline;
pub use table_source::{TableCorrespondence, Transition};
