//! Static per-run configuration: physical constants, instrument
//! characteristics and processing flags. All three structs validate eagerly
//! so a bad parameter aborts the run at start-up instead of surfacing as a
//! NaN deep inside a stack.

use crate::geo::Lla;
use crate::types::{AltError, AltResult};
use serde::{Deserialize, Serialize};

/// Physical constants, read-only for a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhysicalConstants {
    /// Speed of light (m/s)
    pub speed_of_light: f64,
    /// Mean earth radius (m)
    pub earth_radius: f64,
    /// WGS84 semi-major axis (m)
    pub semi_major_axis: f64,
    /// WGS84 semi-minor axis (m)
    pub semi_minor_axis: f64,
    /// WGS84 flattening
    pub flattening: f64,
    /// Seconds per day
    pub seconds_per_day: f64,
}

impl Default for PhysicalConstants {
    fn default() -> Self {
        Self {
            speed_of_light: 299_792_458.0,
            earth_radius: 6_371_000.0,
            semi_major_axis: 6_378_137.0,        // WGS84
            semi_minor_axis: 6_356_752.314_245,  // WGS84
            flattening: 1.0 / 298.257_223_563,   // WGS84
            seconds_per_day: 86_400.0,
        }
    }
}

impl PhysicalConstants {
    pub fn validate(&self) -> AltResult<()> {
        let positive = [
            ("speed_of_light", self.speed_of_light),
            ("earth_radius", self.earth_radius),
            ("semi_major_axis", self.semi_major_axis),
            ("semi_minor_axis", self.semi_minor_axis),
            ("seconds_per_day", self.seconds_per_day),
        ];
        for (name, value) in positive {
            if !(value > 0.0) {
                return Err(AltError::Configuration(format!(
                    "{} must be positive, got {}",
                    name, value
                )));
            }
        }
        if !(self.flattening > 0.0 && self.flattening < 1.0) {
            return Err(AltError::Configuration(format!(
                "flattening must be in (0, 1), got {}",
                self.flattening
            )));
        }
        Ok(())
    }
}

/// Instrument characteristics, read-only for a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentCharacteristics {
    /// Carrier wavelength (m)
    pub wavelength: f64,
    /// Pulses per burst
    pub pulses_per_burst: usize,
    /// Range samples per pulse, before zero padding
    pub samples_per_pulse: usize,
    /// Transmitted pulse length (s)
    pub pulse_length: f64,
    /// Chirp bandwidth (Hz)
    pub bandwidth: f64,
    /// One-way antenna gain (dB)
    pub antenna_gain_db: f64,
    /// Transmitted peak power (W)
    pub tx_power: f64,
    /// Nominal pulse repetition interval (s)
    pub pri: f64,
}

impl Default for InstrumentCharacteristics {
    fn default() -> Self {
        Self {
            wavelength: 0.022,        // Ku-band, ~13.6 GHz
            pulses_per_burst: 64,
            samples_per_pulse: 128,
            pulse_length: 44.8e-6,
            bandwidth: 320e6,
            antenna_gain_db: 42.6,
            tx_power: 7.0,
            pri: 55e-6,
        }
    }
}

impl InstrumentCharacteristics {
    pub fn validate(&self) -> AltResult<()> {
        let positive = [
            ("wavelength", self.wavelength),
            ("pulse_length", self.pulse_length),
            ("bandwidth", self.bandwidth),
            ("tx_power", self.tx_power),
            ("pri", self.pri),
        ];
        for (name, value) in positive {
            if !(value > 0.0) {
                return Err(AltError::Configuration(format!(
                    "{} must be positive, got {}",
                    name, value
                )));
            }
        }
        if self.pulses_per_burst == 0 {
            return Err(AltError::Configuration(
                "pulses_per_burst must be at least 1".to_string(),
            ));
        }
        if self.samples_per_pulse == 0 {
            return Err(AltError::Configuration(
                "samples_per_pulse must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Chirp rate (Hz/s)
    pub fn chirp_slope(&self) -> f64 {
        self.bandwidth / self.pulse_length
    }
}

/// Azimuth weighting window applied upstream of stacking; only its
/// resolution-widening factor matters to sigma-0 scaling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AzimuthWindow {
    Disabled,
    Boxcar,
    Hanning,
    Hamming,
}

impl AzimuthWindow {
    /// Main-lobe widening factor of the window
    pub fn widening_factor(&self) -> f64 {
        match self {
            AzimuthWindow::Disabled => 1.0,
            AzimuthWindow::Boxcar => 1.0,
            AzimuthWindow::Hanning => 1.0,
            AzimuthWindow::Hamming => 1.486 * 0.92,
        }
    }
}

/// Geographic region of interest; locations outside are not emitted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RegionOfInterest {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,
}

impl RegionOfInterest {
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        lat >= self.lat_min && lat <= self.lat_max && lon >= self.lon_min && lon <= self.lon_max
    }
}

/// Processing flags and thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorConfig {
    /// Enable the Doppler range correction
    pub flag_doppler_correction: bool,
    /// Enable the slant-range correction
    pub flag_slant_range_correction: bool,
    /// Enable the window-delay misalignment correction
    pub flag_window_delay_correction: bool,
    /// Enable stack masking; disabled yields a trivial all-enabled mask
    pub flag_stack_masking: bool,
    /// Maximum number of looks kept per stack
    pub n_looks_stack: usize,
    /// Stacks shorter than this after finalize are dropped
    pub min_num_contributing_looks: usize,
    /// Zero-padding factor of the range axis
    pub zp_fact_range: usize,
    /// Azimuth weighting window
    pub azimuth_window: AzimuthWindow,
    /// Optional strict look-angle bounds (min, max), radians
    pub look_angle_bounds: Option<(f64, f64)>,
    /// Enable the surface-focusing relocation step
    pub flag_surface_focusing: bool,
    /// Focusing target, required when focusing is enabled
    pub focus_target: Option<Lla>,
    /// Optional geographic region of interest
    pub roi: Option<RegionOfInterest>,
    /// A surface location is finalized once the newest burst is this much
    /// older than its crossing time (s)
    pub stack_duration_s: f64,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            flag_doppler_correction: true,
            flag_slant_range_correction: true,
            flag_window_delay_correction: true,
            flag_stack_masking: true,
            n_looks_stack: 240,
            min_num_contributing_looks: 4,
            zp_fact_range: 1,
            azimuth_window: AzimuthWindow::Disabled,
            look_angle_bounds: None,
            flag_surface_focusing: false,
            focus_target: None,
            roi: None,
            stack_duration_s: 2.5,
        }
    }
}

impl ProcessorConfig {
    pub fn validate(&self) -> AltResult<()> {
        if self.n_looks_stack == 0 {
            return Err(AltError::Configuration(
                "n_looks_stack must be at least 1".to_string(),
            ));
        }
        if self.min_num_contributing_looks > self.n_looks_stack {
            return Err(AltError::Configuration(format!(
                "min_num_contributing_looks ({}) exceeds n_looks_stack ({})",
                self.min_num_contributing_looks, self.n_looks_stack
            )));
        }
        if self.zp_fact_range == 0 {
            return Err(AltError::Configuration(
                "zp_fact_range must be at least 1".to_string(),
            ));
        }
        if let Some((min, max)) = self.look_angle_bounds {
            if min >= max {
                return Err(AltError::Configuration(format!(
                    "look-angle bounds inverted: min {} >= max {}",
                    min, max
                )));
            }
        }
        if self.flag_surface_focusing && self.focus_target.is_none() {
            return Err(AltError::Configuration(
                "surface focusing enabled without a focus target".to_string(),
            ));
        }
        if let Some(roi) = &self.roi {
            if roi.lat_min >= roi.lat_max || roi.lon_min >= roi.lon_max {
                return Err(AltError::Configuration(
                    "region of interest bounds inverted".to_string(),
                ));
            }
        }
        if !(self.stack_duration_s > 0.0) {
            return Err(AltError::Configuration(format!(
                "stack_duration_s must be positive, got {}",
                self.stack_duration_s
            )));
        }
        Ok(())
    }
}
