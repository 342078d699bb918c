//! The recalc pipeline: a finite set of typed strategies and a transition
//! table, rather than a re-entrant solver. See .

pub mod pipeline;
pub mod strategies;

pub use pipeline::{build_pipeline, OPTIMIZE_RECALCS};
pub use strategies::{PipelineContext, PipelineTrigger, Strategy};
