//! Stage Registry
//!
//! Stages are the `=>name,arg,...` segments of a query. Each registered
//! name resolves to a [`StageKind`], which knows its arity, whether it can
//! run point-at-a-time, and how to build a fresh [`Stage`] from arguments:
//!
//! - **args**: lexical coercion of raw argument tokens
//! - **transform**: constant arithmetic and derivative (streaming)
//! - **window**: fixed-window aggregations (materialized only)
//! - **pipeline**: the streaming and materialized executors
//!
//! # Registered stages
//!
//! ```text
//! add | sub, subtract | mult, multi | div, divide      constant     streaming
//! derivative, rate                                     -            streaming
//! mean, avg | sum | min | max | count | first | last   window secs  materialized
//! ```
//!
//! A compiled query keeps [`StageTemplate`]s (kind + arguments) and builds
//! new stage instances for every execution and series, since some stages
//! carry state between points.

mod args;
mod pipeline;
mod transform;
mod window;

pub use args::{coerce_argument, coerce_arguments, StageArg};
pub use pipeline::{MaterializedPipeline, Pipeline, StreamingPipeline};
pub use transform::{ArithmeticOp, ConstantTransform, Derivative};
pub use window::{AggregationFunc, WindowAggregate};

use crate::query::{QueryError, QueryResult};
use crate::storage::DataPoint;
use serde::{Serialize, Serializer};

/// Every registered stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    /// Constant arithmetic
    Constant(ArithmeticOp),
    /// Per-second rate of change
    Derivative,
    /// Fixed-window aggregation
    Window(AggregationFunc),
}

/// Registered names, primary name first for each kind
const REGISTRY: &[(&str, StageKind)] = &[
    ("add", StageKind::Constant(ArithmeticOp::Add)),
    ("sub", StageKind::Constant(ArithmeticOp::Subtract)),
    ("subtract", StageKind::Constant(ArithmeticOp::Subtract)),
    ("mult", StageKind::Constant(ArithmeticOp::Multiply)),
    ("multi", StageKind::Constant(ArithmeticOp::Multiply)),
    ("div", StageKind::Constant(ArithmeticOp::Divide)),
    ("divide", StageKind::Constant(ArithmeticOp::Divide)),
    ("derivative", StageKind::Derivative),
    ("rate", StageKind::Derivative),
    ("mean", StageKind::Window(AggregationFunc::Avg)),
    ("avg", StageKind::Window(AggregationFunc::Avg)),
    ("sum", StageKind::Window(AggregationFunc::Sum)),
    ("min", StageKind::Window(AggregationFunc::Min)),
    ("max", StageKind::Window(AggregationFunc::Max)),
    ("count", StageKind::Window(AggregationFunc::Count)),
    ("first", StageKind::Window(AggregationFunc::First)),
    ("last", StageKind::Window(AggregationFunc::Last)),
];

impl StageKind {
    /// Resolve a stage name (exact, case-sensitive)
    pub fn lookup(name: &str) -> QueryResult<Self> {
        REGISTRY
            .iter()
            .find(|(registered, _)| *registered == name)
            .map(|(_, kind)| *kind)
            .ok_or_else(|| QueryError::UnknownStage(name.to_string()))
    }

    /// Every distinct kind, in registry order
    pub fn all() -> Vec<StageKind> {
        let mut kinds: Vec<StageKind> = Vec::new();
        for (_, kind) in REGISTRY {
            if !kinds.contains(kind) {
                kinds.push(*kind);
            }
        }
        kinds
    }

    /// Primary registered name
    pub fn name(&self) -> &'static str {
        self.names().first().copied().unwrap_or("")
    }

    /// All names that resolve to this kind
    pub fn names(&self) -> Vec<&'static str> {
        REGISTRY
            .iter()
            .filter(|(_, kind)| kind == self)
            .map(|(name, _)| *name)
            .collect()
    }

    /// Number of required arguments
    pub fn arity(&self) -> usize {
        match self {
            StageKind::Constant(_) | StageKind::Window(_) => 1,
            StageKind::Derivative => 0,
        }
    }

    /// Whether the stage can run point-at-a-time
    pub fn supports_streaming(&self) -> bool {
        !matches!(self, StageKind::Window(_))
    }

    pub fn description(&self) -> &'static str {
        match self {
            StageKind::Constant(ArithmeticOp::Add) => "Adds a constant to each value in the series",
            StageKind::Constant(ArithmeticOp::Subtract) => {
                "Subtracts a constant from each value in the series"
            }
            StageKind::Constant(ArithmeticOp::Multiply) => {
                "Multiplies each value in the series by a constant"
            }
            StageKind::Constant(ArithmeticOp::Divide) => {
                "Divides each value in the series by a constant"
            }
            StageKind::Derivative => "Per-second rate of change between consecutive points",
            StageKind::Window(AggregationFunc::Avg) => "Mean of each window of N seconds",
            StageKind::Window(AggregationFunc::Sum) => "Sum of each window of N seconds",
            StageKind::Window(AggregationFunc::Min) => "Minimum of each window of N seconds",
            StageKind::Window(AggregationFunc::Max) => "Maximum of each window of N seconds",
            StageKind::Window(AggregationFunc::Count) => "Point count of each window of N seconds",
            StageKind::Window(AggregationFunc::First) => "First point of each window of N seconds",
            StageKind::Window(AggregationFunc::Last) => "Last point of each window of N seconds",
        }
    }

    /// Build a fresh stage instance, validating the arguments
    pub fn instantiate(&self, args: &[StageArg]) -> QueryResult<Stage> {
        let needed = self.arity();
        if args.len() < needed {
            return Err(QueryError::InsufficientArguments {
                stage: self.name().to_string(),
                needed,
                found: args.len(),
            });
        }

        let stage = match self {
            StageKind::Constant(op) => Stage::Streaming(StreamStage::Transform(
                ConstantTransform::new(self.name(), *op, &args[0])?,
            )),
            StageKind::Derivative => Stage::Streaming(StreamStage::Derivative(Derivative::new())),
            StageKind::Window(func) => {
                Stage::Materialized(WindowAggregate::new(self.name(), *func, &args[0])?)
            }
        };
        Ok(stage)
    }
}

impl std::fmt::Display for StageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for StageKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

/// Execution model of a stage chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Lazy, point-at-a-time
    Streaming,
    /// Whole buffer per stage
    Materialized,
}

/// A validated stage kind with its arguments
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageTemplate {
    pub kind: StageKind,
    pub args: Vec<StageArg>,
}

impl StageTemplate {
    /// Resolve and validate a stage by name
    pub fn new(name: &str, args: Vec<StageArg>) -> QueryResult<Self> {
        let kind = StageKind::lookup(name)?;
        kind.instantiate(&args)?;
        Ok(Self { kind, args })
    }

    /// Build a fresh instance
    pub fn instantiate(&self) -> QueryResult<Stage> {
        self.kind.instantiate(&self.args)
    }
}

/// Ordered stage templates of a compiled query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageChain {
    pub templates: Vec<StageTemplate>,
    pub mode: ExecutionMode,
}

impl StageChain {
    /// Build a chain; streaming only if every stage supports it
    pub fn new(templates: Vec<StageTemplate>) -> Self {
        let mode = if templates.iter().all(|t| t.kind.supports_streaming()) {
            ExecutionMode::Streaming
        } else {
            ExecutionMode::Materialized
        };
        Self { templates, mode }
    }

    /// Fresh stage instances, in order
    pub fn instantiate(&self) -> QueryResult<Vec<Stage>> {
        self.templates.iter().map(StageTemplate::instantiate).collect()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

/// A stage that consumes and yields single points
#[derive(Debug, Clone, PartialEq)]
pub enum StreamStage {
    Transform(ConstantTransform),
    Derivative(Derivative),
}

impl StreamStage {
    /// Feed one point; `None` drops it
    pub fn apply(&mut self, point: DataPoint) -> Option<DataPoint> {
        match self {
            StreamStage::Transform(transform) => Some(transform.apply(point)),
            StreamStage::Derivative(derivative) => derivative.apply(point),
        }
    }
}

/// A live stage instance
#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    Streaming(StreamStage),
    Materialized(WindowAggregate),
}

impl Stage {
    /// Run the stage over a whole buffer
    pub fn apply_batch(&mut self, points: Vec<DataPoint>) -> Vec<DataPoint> {
        match self {
            Stage::Streaming(stage) => points.into_iter().filter_map(|p| stage.apply(p)).collect(),
            Stage::Materialized(window) => window.apply(points),
        }
    }

    pub fn supports_streaming(&self) -> bool {
        matches!(self, Stage::Streaming(_))
    }
}
