//! Core delay-Doppler processing stages

pub mod sampler;
pub mod stacking;
pub mod geometry;
pub mod masking;
pub mod sigma0;
pub mod pipeline;

// Re-export main types
pub use sampler::SurfaceLocationSampler;
pub use stacking::StackAssembler;
pub use geometry::GeometryCorrector;
pub use masking::StackMasker;
pub use sigma0::Sigma0ScalingEstimator;
pub use pipeline::Processor;
