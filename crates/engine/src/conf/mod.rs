//! Conf module — pipeline configuration model.

pub mod model;

pub use model::PipelineConfig;
