//! Per-look geometry corrections.
//!
//! Computes Doppler, slant-range and window-delay range-bin shifts for each
//! look of a finalized stack and applies their sum as a fractional-sample
//! phase ramp over the padded range axis.

use crate::config::{InstrumentCharacteristics, PhysicalConstants, ProcessorConfig};
use crate::types::{AltComplex, AltError, AltResult, BurstArena, SurfaceLocation};
use std::f64::consts::TAU;

/// Applies the three per-look sub-sample range corrections.
pub struct GeometryCorrector {
    constants: PhysicalConstants,
    characteristics: InstrumentCharacteristics,
    config: ProcessorConfig,
}

impl GeometryCorrector {
    pub fn new(
        constants: PhysicalConstants,
        characteristics: InstrumentCharacteristics,
        config: ProcessorConfig,
    ) -> AltResult<Self> {
        constants.validate()?;
        characteristics.validate()?;
        config.validate()?;
        Ok(Self {
            constants,
            characteristics,
            config,
        })
    }

    /// Compute and apply the net range-bin shift of every look. The shifts
    /// are kept on the stack in unpadded sample units for the masker.
    pub fn correct(&self, surface: &mut SurfaceLocation, arena: &BurstArena) -> AltResult<()> {
        let window_delay_ref = surface.window_delay;
        let position = surface.position;
        let stack = surface.stack.as_mut().ok_or_else(|| {
            AltError::Geometry(format!(
                "surface #{}: geometry correction before stack finalize",
                surface.counter
            ))
        })?;

        let c = self.constants.speed_of_light;
        for i in 0..stack.len() {
            let burst = arena.get(stack.bursts[i]).ok_or_else(|| {
                AltError::Geometry(format!(
                    "surface #{}: burst for look {} no longer retained",
                    surface.counter, i
                ))
            })?;
            let t0 = stack.t0s[i];
            if !(t0 > 0.0) {
                return Err(AltError::Geometry(format!(
                    "surface #{}: non-positive range sample interval {} in look {}",
                    surface.counter, t0, i
                )));
            }

            let mut shift = 0.0;

            if self.config.flag_doppler_correction {
                let doppler_range = -(c / self.characteristics.wavelength)
                    * burst.velocity.norm()
                    * stack.beam_angles[i].cos()
                    * (self.characteristics.pulse_length / self.characteristics.bandwidth);
                shift += doppler_range * 2.0 / c / t0;
            }

            if self.config.flag_slant_range_correction {
                let range_actual = (burst.position - position).norm();
                let range_ref = c * window_delay_ref / 2.0;
                shift += (range_actual - range_ref) * 2.0 / c / t0;
            }

            if self.config.flag_window_delay_correction {
                shift += -(window_delay_ref - burst.window_delay) / t0;
            }

            stack.shifts[i] = shift;
            if shift != 0.0 {
                apply_phase_ramp(
                    stack.data.row_mut(i).as_slice_mut().ok_or_else(|| {
                        AltError::Geometry("stack row is not contiguous".to_string())
                    })?,
                    shift * self.config.zp_fact_range as f64,
                );
            }
        }
        log::debug!(
            "surface #{}: applied geometry corrections to {} looks",
            surface.counter,
            stack.len()
        );
        Ok(())
    }
}

/// Multiply a complex range line by `exp(i 2 pi / n * shift * k)`, realizing
/// a fractional circular shift in the frequency-equivalent representation.
/// `shift` is in samples of the line's own axis.
fn apply_phase_ramp(row: &mut [AltComplex], shift: f64) {
    let n = row.len() as f64;
    for (k, sample) in row.iter_mut().enumerate() {
        let phase = TAU / n * shift * k as f64;
        *sample *= AltComplex::from_polar(1.0, phase);
    }
}
