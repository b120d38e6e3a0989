mod lineage_builder;
mod occurrence;
mod relabel;
mod stack;
mod track_state;
mod track_table;

pub use lineage_builder::{BuilderConfig, LineageBuilder, LineageOutput};
pub use occurrence::{Frame, GlobalId, IdAllocator, LineageId, LocalLabel, Occurrence, TrackId};
pub use relabel::{RelabelKernel, RelabeledVolume, Substitutions, relabel};
pub use stack::{RegionProps, SegmentationStack};
pub use track_state::TrackState;
pub use track_table::TrackTable;
