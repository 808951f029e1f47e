// Extraction pipeline: per-stage processing and the run orchestrator

pub mod orchestrator;
pub mod processing;

pub use orchestrator::{Pipeline, PipelineOutput};
pub use processing::parser;
