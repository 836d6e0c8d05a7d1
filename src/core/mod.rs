//! Preprocessing chain: operator calls, band transitions, steps and the pipeline

pub mod operators;
pub mod band_model;
pub mod steps;
pub mod pipeline;

// Re-export main types
pub use operators::{Operator, OperatorCall, OrbitType};
pub use steps::CorrectionStep;
pub use pipeline::{
    detect_polarizations, output_target, PipelineConfig, PipelineReport, PipelineRequest,
    PolarizationOutput, ProductPipeline,
};
