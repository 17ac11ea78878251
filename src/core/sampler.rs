//! Along-track surface sampling.
//!
//! Decides when a new surface location is due and geolocates it by linear
//! interpolation between the two bursts bracketing the angular-threshold
//! crossing.

use crate::config::{InstrumentCharacteristics, PhysicalConstants, ProcessorConfig};
use crate::geo::{self, ecef_to_lla, lla_to_ecef, Lla, Vector3};
use crate::types::{
    AltError, AltResult, Attitude, Burst, BurstArena, BurstHandle, SurfaceLocation,
};
use std::collections::HashMap;

/// Sampler state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SamplerState {
    /// No surface location has been produced yet
    AwaitingFirst,
    /// Steady state, thresholding against the last produced location
    Tracking,
}

/// Geometry of the most recently produced surface location.
///
/// Kept inside the sampler so thresholding keeps working after the caller
/// finalizes or drops that location.
#[derive(Debug, Clone, Copy)]
struct TrackedSurface {
    position: Vector3,
    sat_position: Vector3,
    sat_velocity: Vector3,
}

/// Decides when a surface location is due and computes its geolocation.
pub struct SurfaceLocationSampler {
    constants: PhysicalConstants,
    characteristics: InstrumentCharacteristics,
    config: ProcessorConfig,
    state: SamplerState,
    prev_burst: Option<BurstHandle>,
    last_surface: Option<TrackedSurface>,
    counter: usize,
    /// Write-once distance-to-target memo keyed by location counter
    focus_distances: HashMap<usize, f64>,
    /// The focusing relocation happens at most once per run
    focused_once: bool,
    focus_target_ecef: Option<Vector3>,
}

impl SurfaceLocationSampler {
    /// Create a new sampler; configuration is validated eagerly.
    pub fn new(
        constants: PhysicalConstants,
        characteristics: InstrumentCharacteristics,
        config: ProcessorConfig,
    ) -> AltResult<Self> {
        constants.validate()?;
        characteristics.validate()?;
        config.validate()?;

        let focus_target_ecef = config
            .focus_target
            .as_ref()
            .map(|lla| lla_to_ecef(lla, &constants));

        Ok(Self {
            constants,
            characteristics,
            config,
            state: SamplerState::AwaitingFirst,
            prev_burst: None,
            last_surface: None,
            counter: 0,
            focus_distances: HashMap::new(),
            focused_once: false,
            focus_target_ecef,
        })
    }

    /// Consume one burst; returns the new surface location when the angular
    /// threshold is crossed. `history` holds the locations still open at the
    /// caller; it feeds the focusing step only, so thresholding is unaffected
    /// by locations the caller has already finalized or dropped.
    pub fn process(
        &mut self,
        history: &mut Vec<SurfaceLocation>,
        handle: BurstHandle,
        arena: &BurstArena,
    ) -> AltResult<Option<SurfaceLocation>> {
        let result = match self.state {
            SamplerState::AwaitingFirst => {
                let burst = arena.get(handle).ok_or_else(|| {
                    AltError::Geometry("burst no longer retained".to_string())
                })?;
                let location = self.location_from_state(
                    burst.time,
                    burst.position,
                    burst.velocity,
                    burst.attitude,
                    burst.window_delay,
                )?;
                log::info!(
                    "first surface location #{} at lat={:.6} lon={:.6}",
                    location.counter,
                    location.lat.to_degrees(),
                    location.lon.to_degrees()
                );
                self.state = SamplerState::Tracking;
                Some(location)
            }
            SamplerState::Tracking => self.track(history, handle, arena)?,
        };

        if let Some(location) = &result {
            self.last_surface = Some(TrackedSurface {
                position: location.position,
                sat_position: location.sat_position,
                sat_velocity: location.sat_velocity,
            });
        }
        self.prev_burst = Some(handle);
        Ok(result)
    }

    fn track(
        &mut self,
        history: &mut Vec<SurfaceLocation>,
        handle: BurstHandle,
        arena: &BurstArena,
    ) -> AltResult<Option<SurfaceLocation>> {
        let prev_handle = self.prev_burst.ok_or_else(|| {
            AltError::Geometry("tracking state entered without a previous burst".to_string())
        })?;
        let last = self.last_surface.ok_or_else(|| {
            AltError::Geometry("tracking state entered without a prior surface location".to_string())
        })?;

        let curr = arena.get(handle).ok_or_else(|| {
            AltError::Geometry("current burst no longer retained".to_string())
        })?;
        let prev = arena.get(prev_handle).ok_or_else(|| {
            AltError::Geometry("previous burst no longer retained".to_string())
        })?;

        let threshold = self.azimuth_beam_resolution(last.sat_velocity.norm())?;
        let angle_curr = self.angle_to_burst(&last, curr)?;
        let angle_prev = self.angle_to_burst(&last, prev)?;

        if angle_curr == angle_prev {
            // Zero angular progress between adjacent bursts, alpha undefined
            return Err(AltError::Geometry(
                "degenerate geometry: equal nadir angles for adjacent bursts".to_string(),
            ));
        }
        if !(angle_curr >= threshold && angle_prev < threshold) {
            return Ok(None);
        }

        let alpha = (threshold - angle_prev) / (angle_curr - angle_prev);
        log::debug!(
            "threshold crossing between t={} and t={}, alpha={:.6}",
            prev.time,
            curr.time,
            alpha
        );

        let (time, position, velocity, attitude, window_delay) =
            interpolate_between(prev, curr, alpha);
        let location =
            self.location_from_state(time, position, velocity, attitude, window_delay)?;

        if self.config.flag_surface_focusing {
            self.apply_focusing(history, &location)?;
        }

        Ok(Some(location))
    }

    /// Build a surface location at nadir beneath the given satellite state,
    /// projected to the surface along the window delay.
    fn location_from_state(
        &mut self,
        time: f64,
        sat_position: Vector3,
        sat_velocity: Vector3,
        attitude: Attitude,
        window_delay: f64,
    ) -> AltResult<SurfaceLocation> {
        let (position, lla) = self.ground_projection(&sat_position, window_delay)?;
        let counter = self.counter;
        self.counter += 1;

        Ok(SurfaceLocation {
            counter,
            time,
            position,
            lat: lla.lat,
            lon: lla.lon,
            alt: lla.alt,
            sat_position,
            sat_velocity,
            attitude,
            window_delay,
            stack_all: Vec::new(),
            stack: None,
            sigma0_scaling: 0.0,
            sigma0_scaling_vector: Vec::new(),
            focused: false,
        })
    }

    /// Project a satellite position onto the surface along its window delay.
    fn ground_projection(
        &self,
        sat_position: &Vector3,
        window_delay: f64,
    ) -> AltResult<(Vector3, Lla)> {
        let sat_lla = ecef_to_lla(sat_position, &self.constants)?;
        let surface = Lla {
            lat: sat_lla.lat,
            lon: sat_lla.lon,
            alt: sat_lla.alt - self.constants.speed_of_light * window_delay / 2.0,
        };
        Ok((lla_to_ecef(&surface, &self.constants), surface))
    }

    /// Azimuth beam angular resolution for a given satellite speed.
    fn azimuth_beam_resolution(&self, speed: f64) -> AltResult<f64> {
        if speed == 0.0 {
            return Err(AltError::Geometry(
                "azimuth beam resolution undefined for zero satellite speed".to_string(),
            ));
        }
        let arg = self.characteristics.wavelength
            / (2.0
                * speed
                * self.characteristics.pri
                * self.characteristics.pulses_per_burst as f64);
        if !(-1.0..=1.0).contains(&arg) {
            return Err(AltError::Geometry(format!(
                "azimuth beam resolution argument {} outside [-1, 1]",
                arg
            )));
        }
        Ok(arg.asin())
    }

    /// Angle at the last surface location's satellite position between its
    /// nadir vector and the direction to a burst's ground-projected point.
    fn angle_to_burst(&self, last: &TrackedSurface, burst: &Burst) -> AltResult<f64> {
        let (ground, _) = self.ground_projection(&burst.position, burst.window_delay)?;
        let to_ground = ground - last.sat_position;
        let nadir = last.position - last.sat_position;
        to_ground.angle_to(&nadir)
    }

    /// Single-step surface-focusing relocation.
    ///
    /// When the new location moved away from the target while the previous
    /// one was still approaching, the previous location is pulled to the
    /// closest point of approach on the along-track segment of the two
    /// locations before the new one. Runs at most once per run.
    fn apply_focusing(
        &mut self,
        history: &mut Vec<SurfaceLocation>,
        new_location: &SurfaceLocation,
    ) -> AltResult<()> {
        if self.focused_once || history.len() < 2 {
            return Ok(());
        }
        let target = match self.focus_target_ecef {
            Some(t) => t,
            None => return Ok(()),
        };

        let d_new = self.distance_to_target(new_location, &target);
        let d_prev = self.distance_to_target(&history[history.len() - 1], &target);
        // Older entries can never be compared again; evicting them is safe
        // since the distance is a pure function of the stored position.
        self.focus_distances
            .retain(|&counter, _| counter + 2 > new_location.counter);
        if d_new <= d_prev {
            return Ok(());
        }

        let anchor = history[history.len() - 2].position;
        let prev = history.last_mut().ok_or_else(|| {
            AltError::Geometry("focusing requires at least two prior locations".to_string())
        })?;
        let along = (prev.position - anchor).normalized()?;
        let projected = anchor + along * (target - anchor).dot(&along);

        let lla = ecef_to_lla(&projected, &self.constants)?;
        prev.position = projected;
        prev.lat = lla.lat;
        prev.lon = lla.lon;
        prev.alt = lla.alt;
        prev.window_delay =
            2.0 * (prev.sat_position - projected).norm() / self.constants.speed_of_light;
        prev.focused = true;
        self.focused_once = true;
        self.focus_distances.clear();
        log::info!(
            "focused surface location #{} onto closest point of approach",
            prev.counter
        );
        Ok(())
    }

    /// Memoized distance from a location to the focus target; values are
    /// write-once while held, and only the two most recent locations are
    /// retained.
    fn distance_to_target(&mut self, location: &SurfaceLocation, target: &Vector3) -> f64 {
        *self
            .focus_distances
            .entry(location.counter)
            .or_insert_with(|| (location.position - *target).norm())
    }
}

/// Linearly interpolate the full satellite state between two bursts.
fn interpolate_between(
    prev: &Burst,
    curr: &Burst,
    alpha: f64,
) -> (f64, Vector3, Vector3, Attitude, f64) {
    let attitude = Attitude {
        roll: geo::lerp(prev.attitude.roll, curr.attitude.roll, alpha),
        pitch: geo::lerp(prev.attitude.pitch, curr.attitude.pitch, alpha),
        yaw: geo::lerp(prev.attitude.yaw, curr.attitude.yaw, alpha),
    };
    (
        geo::lerp(prev.time, curr.time, alpha),
        prev.position.lerp(&curr.position, alpha),
        prev.velocity.lerp(&curr.velocity, alpha),
        attitude,
        geo::lerp(prev.window_delay, curr.window_delay, alpha),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BeamMatrix;
    use approx::assert_relative_eq;

    fn test_burst(time: f64, position: Vector3, velocity: Vector3, window_delay: f64) -> Burst {
        Burst {
            time,
            position,
            velocity,
            attitude: Attitude::default(),
            window_delay,
            beam_angles: vec![0.0],
            t0: 1.0 / 320e6,
            pri: 55e-6,
            beams: BeamMatrix::zeros((1, 4)),
        }
    }

    fn sampler() -> SurfaceLocationSampler {
        SurfaceLocationSampler::new(
            PhysicalConstants::default(),
            InstrumentCharacteristics::default(),
            ProcessorConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_first_surface_at_nadir() {
        let cst = PhysicalConstants::default();
        let mut sampler = sampler();
        let mut arena = BurstArena::new();
        let mut history = Vec::new();

        // Satellite 717 km above the equator, window delay closing 716 km
        let sat_alt = 717_000.0;
        let wd = 2.0 * 716_000.0 / cst.speed_of_light;
        let burst = test_burst(
            10.0,
            Vector3::new(cst.semi_major_axis + sat_alt, 0.0, 0.0),
            Vector3::new(0.0, 0.0, 7500.0),
            wd,
        );
        let handle = arena.push(burst).unwrap();

        let location = sampler
            .process(&mut history, handle, &arena)
            .unwrap()
            .expect("first burst must produce a location");

        assert_eq!(location.counter, 0);
        assert_relative_eq!(location.lat, 0.0, epsilon = 1e-9);
        assert_relative_eq!(location.lon, 0.0, epsilon = 1e-9);
        assert_relative_eq!(location.alt, 1000.0, epsilon = 1e-3);
        assert!(location.stack_all.is_empty());
    }

    #[test]
    fn test_no_location_before_threshold() {
        let cst = PhysicalConstants::default();
        let mut sampler = sampler();
        let mut arena = BurstArena::new();
        let mut history = Vec::new();

        let r = cst.semi_major_axis + 717_000.0;
        let wd = 2.0 * 717_000.0 / cst.speed_of_light;
        let b0 = test_burst(0.0, Vector3::new(r, 0.0, 0.0), Vector3::new(0.0, 0.0, 7500.0), wd);
        let h0 = arena.push(b0).unwrap();
        let first = sampler.process(&mut history, h0, &arena).unwrap().unwrap();
        history.push(first);

        // A burst a few centimeters along track stays below the threshold
        let b1 = test_burst(
            0.01,
            Vector3::new(r, 0.0, 0.05),
            Vector3::new(0.0, 0.0, 7500.0),
            wd,
        );
        let h1 = arena.push(b1).unwrap();
        assert!(sampler.process(&mut history, h1, &arena).unwrap().is_none());
    }

    #[test]
    fn test_interpolated_state_midpoint() {
        let cst = PhysicalConstants::default();
        let r = cst.semi_major_axis + 717_000.0;
        let wd = 2.0 * 717_000.0 / cst.speed_of_light;
        let prev = test_burst(0.0, Vector3::new(r, 0.0, 0.0), Vector3::new(0.0, 0.0, 7500.0), wd);
        let curr = test_burst(
            0.04,
            Vector3::new(r, 0.0, 300.0),
            Vector3::new(0.0, 0.0, 7500.0),
            wd * 1.000_001,
        );

        let (time, position, velocity, _, window_delay) =
            interpolate_between(&prev, &curr, 0.5);
        assert_relative_eq!(time, 0.02, epsilon = 1e-12);
        assert_relative_eq!(position.z, 150.0, epsilon = 1e-9);
        assert_relative_eq!(velocity.z, 7500.0, epsilon = 1e-12);
        assert_relative_eq!(window_delay, wd * 1.000_000_5, epsilon = 1e-15);

        // The midpoint state projects to the midpoint of the two bursts'
        // ground projections to within 1e-9 relative tolerance.
        let sampler = sampler();
        let (g_prev, _) = sampler.ground_projection(&prev.position, prev.window_delay).unwrap();
        let (g_curr, _) = sampler.ground_projection(&curr.position, curr.window_delay).unwrap();
        let (g_mid, _) = sampler.ground_projection(&position, window_delay).unwrap();
        let expected = g_prev.lerp(&g_curr, 0.5);
        assert_relative_eq!(g_mid.x, expected.x, max_relative = 1e-9);
        assert_relative_eq!(g_mid.y, expected.y, max_relative = 1e-9);
        assert_relative_eq!(g_mid.z + 1.0, expected.z + 1.0, max_relative = 1e-9);
    }

    #[test]
    fn test_sampling_survives_dropped_history() {
        let cst = PhysicalConstants::default();
        let mut sampler = sampler();
        let mut arena = BurstArena::new();
        // The caller finalizes every location immediately, so the open list
        // handed back to the sampler stays empty for the whole stream.
        let mut history = Vec::new();

        let r = cst.semi_major_axis + 717_000.0;
        let wd = 2.0 * 717_000.0 / cst.speed_of_light;
        let mut produced = 0;
        for i in 0..12 {
            let burst = test_burst(
                i as f64 * 0.02,
                Vector3::new(r, 0.0, 150.0 * i as f64),
                Vector3::new(0.0, 0.0, 7500.0),
                wd,
            );
            let handle = arena.push(burst).unwrap();
            if sampler.process(&mut history, handle, &arena).unwrap().is_some() {
                produced += 1;
            }
        }
        assert!(
            produced >= 2,
            "sampling stalled after the first location: {} produced",
            produced
        );
    }

    #[test]
    fn test_equal_nadir_angles_rejected() {
        let cst = PhysicalConstants::default();
        let mut sampler = sampler();
        let mut arena = BurstArena::new();
        let mut history = Vec::new();

        let r = cst.semi_major_axis + 717_000.0;
        let wd = 2.0 * 717_000.0 / cst.speed_of_light;
        let velocity = Vector3::new(0.0, 0.0, 7500.0);
        let h0 = arena
            .push(test_burst(0.0, Vector3::new(r, 0.0, 0.0), velocity, wd))
            .unwrap();
        sampler.process(&mut history, h0, &arena).unwrap().unwrap();

        let h1 = arena
            .push(test_burst(0.02, Vector3::new(r, 0.0, 100.0), velocity, wd))
            .unwrap();
        assert!(sampler.process(&mut history, h1, &arena).unwrap().is_none());

        // Same position again: no angular progress, alpha is undefined
        let h2 = arena
            .push(test_burst(0.04, Vector3::new(r, 0.0, 100.0), velocity, wd))
            .unwrap();
        let result = sampler.process(&mut history, h2, &arena);
        assert!(matches!(result, Err(AltError::Geometry(_))));
    }

    #[test]
    fn test_beam_resolution_guards() {
        let sampler = sampler();
        assert!(sampler.azimuth_beam_resolution(0.0).is_err());
        assert!(sampler.azimuth_beam_resolution(1e-9).is_err());
        assert!(sampler.azimuth_beam_resolution(7500.0).is_ok());
    }
}
