//! Stack validity masking.
//!
//! Builds per-look boolean masks over the padded range axis (geometry,
//! ambiguity, look-angle), combines them by AND and applies the result
//! multiplicatively to the corrected stack.

use crate::config::ProcessorConfig;
use crate::types::{AltComplex, AltError, AltResult, StackMask, SurfaceLocation};
use ndarray::Array2;
use num_traits::Zero;

/// Builds and applies validity masks to a corrected stack.
pub struct StackMasker {
    config: ProcessorConfig,
}

impl StackMasker {
    pub fn new(config: ProcessorConfig) -> AltResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Mask a finalized, geometry-corrected stack in place.
    pub fn mask(&self, surface: &mut SurfaceLocation) -> AltResult<()> {
        let counter = surface.counter;
        let stack = surface.stack.as_mut().ok_or_else(|| {
            AltError::Geometry(format!(
                "surface #{}: masking before stack finalize",
                counter
            ))
        })?;

        let n_looks = stack.len();
        let n_padded = stack.data.ncols();
        let zp = self.config.zp_fact_range;
        if n_padded % zp != 0 {
            return Err(AltError::Configuration(format!(
                "range axis of {} samples is not a multiple of zp_fact_range {}",
                n_padded, zp
            )));
        }
        let n_samples = n_padded / zp;

        if !self.config.flag_stack_masking {
            // Trivial all-enabled mask; the stack passes through unmodified.
            stack.mask = Some(StackMask {
                flags: Array2::from_elem((n_looks, n_padded), true),
                mask_vector: vec![n_padded.saturating_sub(1); n_looks],
            });
            return Ok(());
        }

        let mut flags = Array2::from_elem((n_looks, n_padded), true);
        let mut mask_vector = vec![0usize; n_looks];

        for i in 0..n_looks {
            let coarse_shift = stack.shifts[i].round() as i64;
            let geometry = geometry_mask_row(coarse_shift, n_samples, zp);
            // Ambiguity mask: extension point, currently always enabled.
            let angle_ok = match self.config.look_angle_bounds {
                Some((min, max)) => stack.look_angles[i] > min && stack.look_angles[i] < max,
                None => true,
            };

            for k in 0..n_padded {
                flags[[i, k]] = geometry[k] && angle_ok;
            }

            // Last enabled sample, scanning backward from the end
            mask_vector[i] = (0..n_padded)
                .rev()
                .find(|&k| flags[[i, k]])
                .unwrap_or(0);

            for k in 0..n_padded {
                if !flags[[i, k]] {
                    stack.data[[i, k]] = AltComplex::zero();
                }
            }
        }

        log::debug!("surface #{}: masked {} looks", counter, n_looks);
        stack.mask = Some(StackMask { flags, mask_vector });
        Ok(())
    }
}

/// Geometry mask of one look from its coarse range-bin shift.
///
/// A positive shift disables the leading `shift` unpadded samples, a
/// negative one the trailing `|shift|`; region bounds are scaled by the
/// zero-padding factor. An empty enabled region disables the whole row.
fn geometry_mask_row(shift: i64, n_samples: usize, zp: usize) -> Vec<bool> {
    let n_padded = n_samples * zp;
    let mut row = vec![false; n_padded];
    if shift > 0 {
        let begin = (shift as usize).saturating_mul(zp);
        if begin < n_padded {
            row[begin..].fill(true);
        }
    } else {
        let magnitude = shift.unsigned_abs() as usize;
        if magnitude < n_samples {
            let end = (n_samples - magnitude) * zp;
            row[..end].fill(true);
        }
    }
    row
}
