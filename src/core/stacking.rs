//! Beam-stack assembly.
//!
//! Collects beam contributions from successive bursts into a bounded look
//! stack per surface location, pruning to a contiguous chronological run
//! around the smallest look angles on finalize.

use crate::config::ProcessorConfig;
use crate::types::{
    AltError, AltResult, BeamContribution, BurstArena, BurstHandle, Stack, SurfaceLocation,
};
use ndarray::Array2;
use std::f64::consts::FRAC_PI_2;

/// Collects looks into per-surface stacks and finalizes them.
pub struct StackAssembler {
    config: ProcessorConfig,
}

impl StackAssembler {
    pub fn new(config: ProcessorConfig) -> AltResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Offer one burst to an open surface location; appends at most one
    /// contribution, for the pulse whose beam-pointing angle is nearest the
    /// burst-to-surface Doppler cone angle.
    pub fn contribute(
        &self,
        surface: &mut SurfaceLocation,
        handle: BurstHandle,
        arena: &BurstArena,
    ) -> AltResult<()> {
        let burst = arena.get(handle).ok_or_else(|| {
            AltError::Geometry(format!("burst #{} no longer retained", handle.0))
        })?;
        if burst.beam_angles.is_empty() {
            return Ok(());
        }

        let los = surface.position - burst.position;
        let velocity_los_angle = burst.velocity.angle_to(&los)?;
        // Doppler angle is zero at broadside, positive while approaching
        let doppler_angle = FRAC_PI_2 - velocity_los_angle;

        let (pulse, beam_angle) = burst
            .beam_angles
            .iter()
            .copied()
            .enumerate()
            .min_by(|a, b| {
                (a.1 - velocity_los_angle)
                    .abs()
                    .total_cmp(&(b.1 - velocity_los_angle).abs())
            })
            .ok_or_else(|| AltError::Geometry("empty beam fan".to_string()))?;

        // Skip bursts whose fan does not cover the surface: more than half
        // a beam step beyond the nearest pointing angle.
        if burst.beam_angles.len() > 1 {
            let step = (burst.beam_angles[1] - burst.beam_angles[0]).abs();
            if (beam_angle - velocity_los_angle).abs() > step / 2.0 {
                return Ok(());
            }
        }

        let look_angle = FRAC_PI_2 + doppler_angle - beam_angle;
        surface.stack_all.push(BeamContribution {
            burst: handle,
            pulse,
            beam: burst.beams.row(pulse).to_owned(),
            beam_angle,
            t0: burst.t0,
            doppler_angle,
            look_angle,
            pointing_angle: look_angle - burst.attitude.pitch,
        });
        Ok(())
    }

    /// Close a surface location's stack: prune the candidate list to the
    /// bounded contiguous run and populate the parallel per-look arrays.
    pub fn finalize(&self, surface: &mut SurfaceLocation) -> AltResult<()> {
        let all = std::mem::take(&mut surface.stack_all);
        if all.len() < self.config.min_num_contributing_looks {
            return Err(AltError::StackUnderflow(format!(
                "surface #{}: {} contributing looks, {} required",
                surface.counter,
                all.len(),
                self.config.min_num_contributing_looks
            )));
        }

        let n_keep = self.config.n_looks_stack.min(all.len());
        let start = if all.len() <= self.config.n_looks_stack {
            0
        } else {
            // Rank candidates by |look angle|; the kept run starts at the
            // smallest original index among the n_looks_stack best. The
            // contiguous slice re-admits neighbors over pure ranking.
            let mut ranked: Vec<usize> = (0..all.len()).collect();
            ranked.sort_by(|&a, &b| all[a].look_angle.abs().total_cmp(&all[b].look_angle.abs()));
            ranked[..n_keep]
                .iter()
                .copied()
                .min()
                .unwrap_or(0)
        };
        let kept = &all[start..start + n_keep];

        let n_samples = kept[0].beam.len();
        if kept.iter().any(|c| c.beam.len() != n_samples) {
            return Err(AltError::Geometry(format!(
                "surface #{}: inconsistent range sample count across looks",
                surface.counter
            )));
        }

        let mut data = Array2::zeros((n_keep, n_samples));
        for (i, contribution) in kept.iter().enumerate() {
            data.row_mut(i).assign(&contribution.beam);
        }

        surface.stack = Some(Stack {
            data,
            bursts: kept.iter().map(|c| c.burst).collect(),
            beam_angles: kept.iter().map(|c| c.beam_angle).collect(),
            t0s: kept.iter().map(|c| c.t0).collect(),
            doppler_angles: kept.iter().map(|c| c.doppler_angle).collect(),
            look_angles: kept.iter().map(|c| c.look_angle).collect(),
            pointing_angles: kept.iter().map(|c| c.pointing_angle).collect(),
            shifts: vec![0.0; n_keep],
            mask: None,
        });
        log::debug!(
            "surface #{}: finalized stack with {} of {} candidate looks (start {})",
            surface.counter,
            n_keep,
            all.len(),
            start
        );
        Ok(())
    }
}
