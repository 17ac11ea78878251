//! altiproc: A Fast, Modular Delay-Doppler Radar Altimeter Processor Core
//!
//! This library turns a time-ordered stream of radar-altimeter burst
//! measurements into geolocated, multi-looked surface location records ready
//! for waveform retracking: along-track sampling, beam-stack assembly,
//! geometry correction, stack masking and sigma-0 scaling.
//!
//! Instrument-specific decoding, calibration pre-correction, file handling
//! and retracking live outside this crate; bursts arrive normalized and
//! calibration-corrected, surface locations leave ready for multilooking.

pub mod config;
pub mod core;
pub mod geo;
pub mod types;

// Re-export main types for easier access
pub use config::{
    AzimuthWindow, InstrumentCharacteristics, PhysicalConstants, ProcessorConfig,
    RegionOfInterest,
};
pub use core::{
    GeometryCorrector, Processor, Sigma0ScalingEstimator, StackAssembler, StackMasker,
    SurfaceLocationSampler,
};
pub use geo::{Lla, Vector3};
pub use types::{
    AltComplex, AltError, AltResult, Attitude, BeamContribution, BeamMatrix, BeamRow, Burst,
    BurstArena, BurstHandle, Stack, StackMask, SurfaceLocation,
};
