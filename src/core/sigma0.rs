//! Sigma-0 scaling estimation.
//!
//! Computes the per-look radar-equation scaling factor converting stack
//! power to calibrated sigma-0, and its aggregate over the stack.

use crate::config::{InstrumentCharacteristics, PhysicalConstants, ProcessorConfig};
use crate::types::{AltError, AltResult, BurstArena, SurfaceLocation};
use std::f64::consts::PI;

/// Azimuth resolution broadening applied by the multilook averaging
const PULSE_LIMITED_FACTOR: f64 = 0.886;

/// Computes per-look and aggregate sigma-0 scaling factors.
pub struct Sigma0ScalingEstimator {
    constants: PhysicalConstants,
    characteristics: InstrumentCharacteristics,
    config: ProcessorConfig,
}

impl Sigma0ScalingEstimator {
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

    /// Fill in the surface location's per-look scaling vector and its
    /// aggregate mean, both in dB.
    pub fn estimate(&self, surface: &mut SurfaceLocation, arena: &BurstArena) -> AltResult<()> {
        let stack = surface.stack.as_ref().ok_or_else(|| {
            AltError::Geometry(format!(
                "surface #{}: sigma-0 estimation before stack finalize",
                surface.counter
            ))
        })?;
        if stack.is_empty() {
            return Err(AltError::StackUnderflow(format!(
                "surface #{}: sigma-0 estimation on empty stack",
                surface.counter
            )));
        }

        let mut vector = Vec::with_capacity(stack.len());
        for i in 0..stack.len() {
            let burst = arena.get(stack.bursts[i]).ok_or_else(|| {
                AltError::Geometry(format!(
                    "surface #{}: burst for look {} no longer retained",
                    surface.counter, i
                ))
            })?;
            let range = (burst.position - surface.position).norm();
            let speed = burst.velocity.norm();
            if !(range > 0.0) {
                return Err(AltError::Geometry(format!(
                    "surface #{}: zero slant range in look {}",
                    surface.counter, i
                )));
            }
            if !(speed > 0.0) {
                return Err(AltError::Geometry(format!(
                    "surface #{}: zero satellite speed in look {}",
                    surface.counter, i
                )));
            }
            if !(burst.pri > 0.0) {
                return Err(AltError::Geometry(format!(
                    "surface #{}: non-positive PRI in look {}",
                    surface.counter, i
                )));
            }
            vector.push(self.scaling_db(range, speed, burst.pri));
        }

        let aggregate = vector.iter().sum::<f64>() / vector.len() as f64;
        log::debug!(
            "surface #{}: sigma-0 scaling {:.3} dB over {} looks",
            surface.counter,
            aggregate,
            vector.len()
        );
        surface.sigma0_scaling_vector = vector;
        surface.sigma0_scaling = aggregate;
        Ok(())
    }

    /// Scaling factor in dB for one look.
    fn scaling_db(&self, range: f64, speed: f64, pri: f64) -> f64 {
        let cst = &self.constants;
        let chd = &self.characteristics;

        let azimuth_distance = (1.0 + range / cst.earth_radius) * chd.wavelength * range
            / (pri * 2.0 * speed * chd.pulses_per_burst as f64);
        let range_distance = 2.0
            * (cst.speed_of_light * range / (chd.pulse_length * chd.chirp_slope())
                * cst.earth_radius
                / (cst.earth_radius + range))
                .sqrt();
        let surface_area = self.config.azimuth_window.widening_factor()
            * azimuth_distance
            * range_distance
            * PULSE_LIMITED_FACTOR;

        radar_equation_offset(chd.tx_power, chd.antenna_gain_db) + 40.0 * range.log10()
            - 20.0 * chd.wavelength.log10()
            - 10.0 * surface_area.log10()
    }
}

/// Fixed combination of radar-equation constants.
fn radar_equation_offset(tx_power: f64, antenna_gain_db: f64) -> f64 {
    10.0 * 64.0_f64.log10() + 30.0 * PI.log10() - 10.0 * tx_power.log10()
        - 2.0 * antenna_gain_db
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AzimuthWindow;
    use crate::geo::Vector3;
    use crate::types::{AltComplex, Attitude, BeamMatrix, Burst, Stack};
    use approx::assert_relative_eq;
    use ndarray::Array2;
    use std::f64::consts::FRAC_PI_2;

    fn fixture(n_looks: usize) -> (SurfaceLocation, BurstArena) {
        let cst = PhysicalConstants::default();
        let surface_pos = Vector3::new(cst.semi_major_axis, 0.0, 0.0);
        let mut arena = BurstArena::new();
        let mut bursts = Vec::new();
        for i in 0..n_looks {
            // Slant range grows slightly across looks
            let sat = Vector3::new(
                cst.semi_major_axis + 717_000.0 + 500.0 * i as f64,
                0.0,
                0.0,
            );
            let handle = arena
                .push(Burst {
                    time: i as f64 * 0.02,
                    position: sat,
                    velocity: Vector3::new(0.0, 0.0, 7500.0),
                    attitude: Attitude::default(),
                    window_delay: 4.78e-3,
                    beam_angles: vec![FRAC_PI_2],
                    t0: 1.0 / 320e6,
                    pri: 55e-6,
                    beams: BeamMatrix::zeros((1, 4)),
                })
                .unwrap();
            bursts.push(handle);
        }

        let stack = Stack {
            data: Array2::from_elem((n_looks, 4), AltComplex::new(1.0, 0.0)),
            bursts,
            beam_angles: vec![FRAC_PI_2; n_looks],
            t0s: vec![1.0 / 320e6; n_looks],
            doppler_angles: vec![FRAC_PI_2; n_looks],
            look_angles: vec![0.0; n_looks],
            pointing_angles: vec![0.0; n_looks],
            shifts: vec![0.0; n_looks],
            mask: None,
        };
        let surface = SurfaceLocation {
            counter: 0,
            time: 0.0,
            position: surface_pos,
            lat: 0.0,
            lon: 0.0,
            alt: 0.0,
            sat_position: Vector3::new(cst.semi_major_axis + 717_000.0, 0.0, 0.0),
            sat_velocity: Vector3::new(0.0, 0.0, 7500.0),
            attitude: Attitude::default(),
            window_delay: 4.78e-3,
            stack_all: Vec::new(),
            stack: Some(stack),
            sigma0_scaling: 0.0,
            sigma0_scaling_vector: Vec::new(),
            focused: false,
        };
        (surface, arena)
    }

    fn estimator(window: AzimuthWindow) -> Sigma0ScalingEstimator {
        Sigma0ScalingEstimator::new(
            PhysicalConstants::default(),
            InstrumentCharacteristics::default(),
            ProcessorConfig {
                azimuth_window: window,
                ..ProcessorConfig::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn test_aggregate_is_mean_of_vector() {
        for n in [1, 3, 7] {
            let (mut surface, arena) = fixture(n);
            estimator(AzimuthWindow::Disabled)
                .estimate(&mut surface, &arena)
                .unwrap();
            assert_eq!(surface.sigma0_scaling_vector.len(), n);
            let mean = surface.sigma0_scaling_vector.iter().sum::<f64>() / n as f64;
            assert_relative_eq!(surface.sigma0_scaling, mean, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_hamming_widening_shifts_scaling() {
        let (mut boxcar_surface, arena) = fixture(2);
        estimator(AzimuthWindow::Boxcar)
            .estimate(&mut boxcar_surface, &arena)
            .unwrap();

        let (mut hamming_surface, arena) = fixture(2);
        estimator(AzimuthWindow::Hamming)
            .estimate(&mut hamming_surface, &arena)
            .unwrap();

        // Wider resolved area lowers the scaling by 10 log10 of the factor
        let delta = boxcar_surface.sigma0_scaling - hamming_surface.sigma0_scaling;
        assert_relative_eq!(delta, 10.0 * (1.486_f64 * 0.92).log10(), epsilon = 1e-12);
    }

    #[test]
    fn test_empty_stack_rejected() {
        let (mut surface, arena) = fixture(1);
        surface.stack.as_mut().unwrap().bursts.clear();
        assert!(matches!(
            estimator(AzimuthWindow::Disabled).estimate(&mut surface, &arena),
            Err(AltError::StackUnderflow(_))
        ));
    }
}
