use crate::geo::Vector3;
use ndarray::{Array1, Array2};
use num_complex::Complex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Complex-valued echo sample (I + jQ)
pub type AltComplex = Complex<f64>;

/// 2D complex beam data array (pulses/looks x range samples)
pub type BeamMatrix = Array2<AltComplex>;

/// One look's complex range line
pub type BeamRow = Array1<AltComplex>;

/// Platform attitude angles in radians
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Attitude {
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
}

/// One radar measurement epoch, normalized and calibration-corrected upstream.
///
/// Immutable once pushed into the [`BurstArena`]; every downstream stage
/// reads it through a [`BurstHandle`].
#[derive(Debug, Clone)]
pub struct Burst {
    /// Arrival time in seconds of day
    pub time: f64,
    /// Satellite ECEF position in meters
    pub position: Vector3,
    /// Satellite ECEF velocity in m/s
    pub velocity: Vector3,
    /// Platform attitude at the burst epoch
    pub attitude: Attitude,
    /// Round-trip window delay in seconds
    pub window_delay: f64,
    /// Per-pulse beam-pointing angles in radians
    pub beam_angles: Vec<f64>,
    /// Range sample interval (unpadded) in seconds
    pub t0: f64,
    /// Pulse repetition interval in seconds
    pub pri: f64,
    /// Range-compressed beam matrix (pulses x padded range samples)
    pub beams: BeamMatrix,
}

/// Handle into a [`BurstArena`]; stored instead of references so stacks
/// never own or alias burst memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BurstHandle(pub usize);

/// Arena holding every burst still referenced by an open surface location.
///
/// Bursts enter the core only through [`BurstArena::push`], which enforces
/// the strict time ordering the sampler's interpolation relies on. Bursts
/// that no open location can reference any more are retired through
/// [`BurstArena::retire_before`]; handles stay stable across retirement and
/// a retired handle simply resolves to `None`.
#[derive(Debug, Default)]
pub struct BurstArena {
    bursts: VecDeque<Burst>,
    /// Bursts dropped from the front; offsets handles into `bursts`
    retired: usize,
    last_time: Option<f64>,
}

impl BurstArena {
    pub fn new() -> Self {
        Self {
            bursts: VecDeque::new(),
            retired: 0,
            last_time: None,
        }
    }

    /// Add a burst, enforcing strictly increasing arrival time.
    pub fn push(&mut self, burst: Burst) -> AltResult<BurstHandle> {
        if let Some(last) = self.last_time {
            if burst.time <= last {
                return Err(AltError::DataOrder(format!(
                    "burst at t={} does not follow t={}",
                    burst.time, last
                )));
            }
        }
        self.last_time = Some(burst.time);
        self.bursts.push_back(burst);
        Ok(BurstHandle(self.retired + self.bursts.len() - 1))
    }

    /// Fetch a burst; `None` when the handle is foreign or already retired.
    pub fn get(&self, handle: BurstHandle) -> Option<&Burst> {
        handle
            .0
            .checked_sub(self.retired)
            .and_then(|i| self.bursts.get(i))
    }

    /// Retained bursts with their handles, in arrival order.
    pub fn iter(&self) -> impl Iterator<Item = (BurstHandle, &Burst)> + '_ {
        let retired = self.retired;
        self.bursts
            .iter()
            .enumerate()
            .map(move |(i, burst)| (BurstHandle(retired + i), burst))
    }

    /// Drop bursts older than `horizon`. The two most recent bursts are
    /// always kept, since the sampler interpolates between them.
    pub fn retire_before(&mut self, horizon: f64) {
        while self.bursts.len() > 2 {
            match self.bursts.front() {
                Some(front) if front.time < horizon => {
                    self.bursts.pop_front();
                    self.retired += 1;
                }
                _ => break,
            }
        }
    }

    pub fn last_handle(&self) -> Option<BurstHandle> {
        let total = self.retired + self.bursts.len();
        if total == 0 {
            None
        } else {
            Some(BurstHandle(total - 1))
        }
    }

    /// Bursts consumed over the lifetime of the arena, retired included.
    pub fn len(&self) -> usize {
        self.retired + self.bursts.len()
    }

    /// Bursts currently held in memory.
    pub fn retained(&self) -> usize {
        self.bursts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One (burst, pulse) pair assigned to a surface location's stack.
#[derive(Debug, Clone)]
pub struct BeamContribution {
    /// Back-reference to the contributing burst
    pub burst: BurstHandle,
    /// Pulse index within the burst
    pub pulse: usize,
    /// Complex beam row for this look
    pub beam: BeamRow,
    /// Beam-pointing angle in radians
    pub beam_angle: f64,
    /// Range sample interval of the contributing burst in seconds
    pub t0: f64,
    /// Doppler angle of the look, zero at broadside
    pub doppler_angle: f64,
    /// Look angle, pi/2 + doppler - beam
    pub look_angle: f64,
    /// Pointing angle, look angle minus pitch
    pub pointing_angle: f64,
}

/// Per-look validity mask over the padded range axis.
#[derive(Debug, Clone)]
pub struct StackMask {
    /// looks x padded range samples, true = sample enabled
    pub flags: Array2<bool>,
    /// Per-look index of the last enabled sample
    pub mask_vector: Vec<usize>,
}

/// Finalized look stack of one surface location.
///
/// Looks are a contiguous chronological run of the candidate sequence,
/// never longer than the configured `n_looks_stack`.
#[derive(Debug, Clone)]
pub struct Stack {
    /// looks x padded range samples
    pub data: BeamMatrix,
    pub bursts: Vec<BurstHandle>,
    pub beam_angles: Vec<f64>,
    pub t0s: Vec<f64>,
    pub doppler_angles: Vec<f64>,
    pub look_angles: Vec<f64>,
    pub pointing_angles: Vec<f64>,
    /// Per-look net geometry shift in unpadded sample units, written by the
    /// geometry corrector and reused by the masker
    pub shifts: Vec<f64>,
    pub mask: Option<StackMask>,
}

impl Stack {
    pub fn len(&self) -> usize {
        self.bursts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bursts.is_empty()
    }
}

/// One along-track output sample: geolocation, satellite state at the
/// crossing instant, and the look stack built for it.
#[derive(Debug, Clone)]
pub struct SurfaceLocation {
    /// Sequential counter, unique per run
    pub counter: usize,
    /// Surface time in seconds of day
    pub time: f64,
    /// Surface geolocation, ECEF meters
    pub position: Vector3,
    pub lat: f64,
    pub lon: f64,
    pub alt: f64,
    /// Satellite state at the crossing instant
    pub sat_position: Vector3,
    pub sat_velocity: Vector3,
    pub attitude: Attitude,
    /// Reference window delay in seconds
    pub window_delay: f64,
    /// Chronological candidate contributions, populated while the location
    /// is open and drained on finalize
    pub stack_all: Vec<BeamContribution>,
    /// Finalized stack, present once the assembler has run
    pub stack: Option<Stack>,
    /// Aggregate sigma-0 scaling in dB
    pub sigma0_scaling: f64,
    /// Per-look sigma-0 scaling in dB
    pub sigma0_scaling_vector: Vec<f64>,
    /// Set when the focusing step relocated this location
    pub focused: bool,
}

/// Error types for altimeter processing
#[derive(Debug, thiserror::Error)]
pub enum AltError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Geometry error: {0}")]
    Geometry(String),

    #[error("Burst stream out of order: {0}")]
    DataOrder(String),

    #[error("Stack underflow: {0}")]
    StackUnderflow(String),
}

/// Result type for altimeter operations
pub type AltResult<T> = Result<T, AltError>;
