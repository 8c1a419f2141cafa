//! Stage Pipelines
//!
//! Two execution models over the same stage instances:
//!
//! - [`StreamingPipeline`] wraps a point iterator and pulls one upstream
//!   point per output, threading it through every stage. Memory use does
//!   not grow with the series.
//! - [`MaterializedPipeline`] hands the whole buffer to each stage in turn.
//!   Window aggregations only exist here.
//!
//! For chains that both can run, the two produce identical output.

use crate::query::QueryResult;
use crate::stage::{ExecutionMode, Stage, StageChain, StreamStage};
use crate::storage::DataPoint;

impl Stage {
    fn into_streaming(self) -> Option<StreamStage> {
        match self {
            Stage::Streaming(stage) => Some(stage),
            Stage::Materialized(_) => None,
        }
    }
}

/// Lazy point-at-a-time pipeline
///
/// Fused: once the source is exhausted, `next` keeps returning `None`.
pub struct StreamingPipeline<I> {
    source: I,
    stages: Vec<StreamStage>,
    exhausted: bool,
}

impl<I> StreamingPipeline<I>
where
    I: Iterator<Item = DataPoint>,
{
    pub fn new(source: I, stages: Vec<StreamStage>) -> Self {
        Self {
            source,
            stages,
            exhausted: false,
        }
    }
}

impl<I> Iterator for StreamingPipeline<I>
where
    I: Iterator<Item = DataPoint>,
{
    type Item = DataPoint;

    fn next(&mut self) -> Option<DataPoint> {
        if self.exhausted {
            return None;
        }

        'pull: loop {
            let Some(mut point) = self.source.next() else {
                self.exhausted = true;
                return None;
            };

            for stage in &mut self.stages {
                match stage.apply(point) {
                    Some(next) => point = next,
                    // A stage swallowed the point; pull the next one
                    None => continue 'pull,
                }
            }

            return Some(point);
        }
    }
}

impl<I> std::iter::FusedIterator for StreamingPipeline<I> where I: Iterator<Item = DataPoint> {}

/// Whole-buffer pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct MaterializedPipeline {
    stages: Vec<Stage>,
}

impl MaterializedPipeline {
    pub fn new(stages: Vec<Stage>) -> Self {
        Self { stages }
    }

    /// Pass the buffer through every stage in order
    pub fn run(&mut self, points: Vec<DataPoint>) -> Vec<DataPoint> {
        self.stages
            .iter_mut()
            .fold(points, |buffer, stage| stage.apply_batch(buffer))
    }
}

/// A pipeline chosen for one series
#[derive(Debug, Clone, PartialEq)]
pub enum Pipeline {
    Streaming(Vec<StreamStage>),
    Materialized(MaterializedPipeline),
}

impl Pipeline {
    /// Instantiate fresh stages for a chain
    ///
    /// A streaming request for a chain containing window stages falls back
    /// to the materialized model.
    pub fn build(chain: &StageChain, mode: ExecutionMode) -> QueryResult<Self> {
        let stages = chain.instantiate()?;

        if mode == ExecutionMode::Streaming && stages.iter().all(Stage::supports_streaming) {
            return Ok(Pipeline::Streaming(
                stages.into_iter().filter_map(Stage::into_streaming).collect(),
            ));
        }

        if mode == ExecutionMode::Streaming {
            tracing::debug!(stages = chain.len(), "Chain needs materialized execution");
        }
        Ok(Pipeline::Materialized(MaterializedPipeline::new(stages)))
    }

    pub fn mode(&self) -> ExecutionMode {
        match self {
            Pipeline::Streaming(_) => ExecutionMode::Streaming,
            Pipeline::Materialized(_) => ExecutionMode::Materialized,
        }
    }

    /// Run over one series' points
    pub fn run(self, points: Vec<DataPoint>) -> Vec<DataPoint> {
        match self {
            Pipeline::Streaming(stages) => StreamingPipeline::new(points.into_iter(), stages).collect(),
            Pipeline::Materialized(mut pipeline) => pipeline.run(points),
        }
    }
}
