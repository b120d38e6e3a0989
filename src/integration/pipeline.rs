//! LineagePipeline for combining a correspondence source with the builder.

use crate::error::Result;
use crate::tracker::{BuilderConfig, LineageBuilder, LineageOutput, SegmentationStack};

use super::CorrespondenceSource;

/// Bundles a `CorrespondenceSource` with a `LineageBuilder`.
///
/// The surrounding pipeline picks the source matching whichever upstream
/// tracker produced the raw data; everything downstream is the same.
pub struct LineagePipeline<S: CorrespondenceSource> {
    source: S,
    builder: LineageBuilder,
}

impl<S: CorrespondenceSource + Sync> LineagePipeline<S> {
    /// Create a new pipeline with the given source and builder config.
    pub fn new(source: S, config: BuilderConfig) -> Self {
        Self {
            source,
            builder: LineageBuilder::new(config),
        }
    }

    /// Create a new pipeline with default builder configuration.
    pub fn with_default_config(source: S) -> Self {
        Self::new(source, BuilderConfig::default())
    }

    /// Reconstruct the lineages of `stack`.
    pub fn run(&self, stack: &SegmentationStack) -> Result<LineageOutput> {
        self.builder.build(stack, &self.source)
    }

    /// Get a reference to the underlying source.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Get a reference to the underlying builder.
    pub fn builder(&self) -> &LineageBuilder {
        &self.builder
    }

    /// Consume the pipeline, returning the source.
    pub fn into_source(self) -> S {
        self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integration::TransitionTableBuilder;
    use crate::tracker::{Frame, LocalLabel};
    use ndarray::array;

    struct Nothing;

    impl CorrespondenceSource for Nothing {
        fn daughters(&self, _frame: Frame, _label: LocalLabel) -> Result<Vec<LocalLabel>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_every_object_is_a_birth_without_links() {
        let stack = SegmentationStack::from_frames(vec![array![[1, 2]], array![[1, 2]]]).unwrap();
        let out = LineagePipeline::with_default_config(Nothing).run(&stack).unwrap();

        assert_eq!(out.table.num_tracks(), 4);
        assert_eq!(out.table.num_lineages(), 4);
        assert_eq!(out.volume, array![[[1, 2]], [[3, 4]]]);
    }

    #[test]
    fn test_pipeline_with_boxed_source() {
        let stack = SegmentationStack::from_frames(vec![array![[1, 2]], array![[2, 1]]]).unwrap();
        let table = TransitionTableBuilder::new()
            .link(1, 2)
            .link(2, 1)
            .build()
            .unwrap();
        let source: Box<dyn CorrespondenceSource + Sync> = Box::new(table);
        let pipeline = LineagePipeline::new(source, BuilderConfig::default());

        // labels swapped between frames but the cells stayed in place
        let out = pipeline.run(&stack).unwrap();
        assert_eq!(out.volume, array![[[1, 2]], [[1, 2]]]);
        assert!(!pipeline.builder().config().parallel);

        let source = pipeline.into_source();
        assert_eq!(source.daughters(0, 1).unwrap(), vec![2]);
    }
}
