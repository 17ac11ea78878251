//! End-to-end orchestration of the five processing stages.
//!
//! The [`Processor`] owns the burst arena and the open surface locations.
//! Geometry and stack-underflow failures drop the affected surface location;
//! order violations and bad configuration abort the run.

use crate::config::{InstrumentCharacteristics, PhysicalConstants, ProcessorConfig};
use crate::core::geometry::GeometryCorrector;
use crate::core::masking::StackMasker;
use crate::core::sampler::SurfaceLocationSampler;
use crate::core::sigma0::Sigma0ScalingEstimator;
use crate::core::stacking::StackAssembler;
use crate::types::{AltError, AltResult, Burst, BurstArena, BurstHandle, SurfaceLocation};

/// Drives bursts through sampling, stacking, correction, masking and
/// sigma-0 scaling, emitting finalized surface locations.
pub struct Processor {
    config: ProcessorConfig,
    arena: BurstArena,
    sampler: SurfaceLocationSampler,
    assembler: StackAssembler,
    corrector: GeometryCorrector,
    masker: StackMasker,
    estimator: Sigma0ScalingEstimator,
    open: Vec<SurfaceLocation>,
}

impl Processor {
    /// Build a processor; all configuration is validated here, before any
    /// burst is accepted.
    pub fn new(
        constants: PhysicalConstants,
        characteristics: InstrumentCharacteristics,
        config: ProcessorConfig,
    ) -> AltResult<Self> {
        Ok(Self {
            sampler: SurfaceLocationSampler::new(
                constants.clone(),
                characteristics.clone(),
                config.clone(),
            )?,
            assembler: StackAssembler::new(config.clone())?,
            corrector: GeometryCorrector::new(
                constants.clone(),
                characteristics.clone(),
                config.clone(),
            )?,
            masker: StackMasker::new(config.clone())?,
            estimator: Sigma0ScalingEstimator::new(constants, characteristics, config.clone())?,
            config,
            arena: BurstArena::new(),
            open: Vec::new(),
        })
    }

    /// Consume one burst; returns the surface locations finalized by it.
    pub fn ingest(&mut self, burst: Burst) -> AltResult<Vec<SurfaceLocation>> {
        let now = burst.time;
        let handle = self.arena.push(burst)?;

        // Offer the burst to every open location, dropping locations whose
        // geometry has gone degenerate.
        let mut kept = Vec::with_capacity(self.open.len());
        for mut location in std::mem::take(&mut self.open) {
            match self.assembler.contribute(&mut location, handle, &self.arena) {
                Ok(()) => kept.push(location),
                Err(AltError::Geometry(msg)) => {
                    log::warn!("dropping surface #{}: {}", location.counter, msg);
                }
                Err(e) => return Err(e),
            }
        }
        self.open = kept;

        match self.sampler.process(&mut self.open, handle, &self.arena) {
            Ok(Some(mut location)) => {
                // Backfill the new location from every burst still inside
                // its contributing window, the crossing burst included.
                match self.backfill(&mut location) {
                    Ok(()) => self.open.push(location),
                    Err(AltError::Geometry(msg)) => {
                        log::warn!("dropping surface #{}: {}", location.counter, msg);
                    }
                    Err(e) => return Err(e),
                }
            }
            Ok(None) => {}
            Err(AltError::Geometry(msg)) => {
                log::warn!("surface location rejected: {}", msg);
            }
            Err(e) => return Err(e),
        }

        let emitted = self.finalize_aged(now)?;

        // Every location a retired burst could have contributed to is closed
        // by now, so only the oldest open location bounds retention.
        let horizon =
            self.open.first().map_or(now, |loc| loc.time) - self.config.stack_duration_s;
        self.arena.retire_before(horizon);

        Ok(emitted)
    }

    /// Offer every burst inside the contributing window to a newly created
    /// surface location.
    fn backfill(&self, location: &mut SurfaceLocation) -> AltResult<()> {
        let earliest = location.time - self.config.stack_duration_s;
        for (h, burst) in self.arena.iter() {
            if burst.time >= earliest {
                self.assembler.contribute(location, h, &self.arena)?;
            }
        }
        Ok(())
    }

    /// Flush all still-open surface locations at end of stream.
    pub fn finish(&mut self) -> AltResult<Vec<SurfaceLocation>> {
        let mut emitted = Vec::new();
        for location in std::mem::take(&mut self.open) {
            if let Some(done) = self.close(location)? {
                emitted.push(done);
            }
        }
        Ok(emitted)
    }

    /// Finalize locations whose contributing-burst window has passed.
    fn finalize_aged(&mut self, now: f64) -> AltResult<Vec<SurfaceLocation>> {
        let mut emitted = Vec::new();
        let mut still_open = Vec::with_capacity(self.open.len());
        for location in std::mem::take(&mut self.open) {
            if now - location.time > self.config.stack_duration_s {
                if let Some(done) = self.close(location)? {
                    emitted.push(done);
                }
            } else {
                still_open.push(location);
            }
        }
        self.open = still_open;
        Ok(emitted)
    }

    /// Run the downstream stages on one location. Geometry and underflow
    /// failures drop the location; everything else is fatal.
    fn close(&self, mut location: SurfaceLocation) -> AltResult<Option<SurfaceLocation>> {
        let result = (|| {
            self.assembler.finalize(&mut location)?;
            self.corrector.correct(&mut location, &self.arena)?;
            self.masker.mask(&mut location)?;
            self.estimator.estimate(&mut location, &self.arena)
        })();

        match result {
            Ok(()) => {
                if let Some(roi) = &self.config.roi {
                    if !roi.contains(location.lat, location.lon) {
                        log::debug!(
                            "surface #{} outside region of interest, not emitted",
                            location.counter
                        );
                        return Ok(None);
                    }
                }
                log::info!(
                    "emitting surface #{} with {} looks, sigma-0 scaling {:.3} dB",
                    location.counter,
                    location.stack.as_ref().map_or(0, |s| s.len()),
                    location.sigma0_scaling
                );
                Ok(Some(location))
            }
            Err(AltError::Geometry(msg)) | Err(AltError::StackUnderflow(msg)) => {
                log::warn!("dropping surface #{}: {}", location.counter, msg);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Bursts consumed so far, retired ones included
    pub fn burst_count(&self) -> usize {
        self.arena.len()
    }

    /// Bursts still held in memory
    pub fn retained_bursts(&self) -> usize {
        self.arena.retained()
    }

    /// Surface locations currently under construction
    pub fn open_count(&self) -> usize {
        self.open.len()
    }

    /// Handle of the most recently ingested burst
    pub fn last_burst(&self) -> Option<BurstHandle> {
        self.arena.last_handle()
    }
}
