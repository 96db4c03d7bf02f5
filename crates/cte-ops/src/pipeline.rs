//! End-to-end correction of one image.
//!
//! ```text
//! observed --smooth--> smoothed --invert--> corrected_smooth
//! trail      = corrected_smooth - smoothed
//! corrected  = observed + trail
//! ```
//!
//! Only the trail estimated on the smoothed image is applied, so the read
//! noise of the observation passes through untouched.

use crate::forward::forward_model;
use crate::inverse::inverse_cte_blur;
use crate::smooth::{SmoothReport, cte_smooth_image_with_report};
use crate::trap_map::populate_trap_pixel_map;
use cte_core::{CteParameters, Image, Result};
use rayon::prelude::*;
#[allow(unused_imports)]
use tracing::{debug, info};

/// Result of [`correct_image`].
#[derive(Debug, Clone)]
pub struct Correction {
    /// Observed image with CTE trails removed.
    pub corrected: Image,
    /// Correction applied to each pixel, `corrected - observed`.
    pub trail: Image,
    /// Trap pixel map after readout-CR adjustments.
    pub trap_map: Image,
    /// Convergence of the read-noise smoother.
    pub smoothing: SmoothReport,
}

/// Corrects CTE trails in `observed`.
///
/// # Errors
///
/// Any error of the smoothing, trap map or inversion stages.
pub fn correct_image(observed: &Image, params: &CteParameters) -> Result<Correction> {
    params.validate()?;
    let (n_rows, n_columns) = observed.dimensions();
    let table = params.name.as_deref().unwrap_or("-");
    info!(n_rows, n_columns, table, "correcting CTE trails");

    let (smoothed, smoothing) = cte_smooth_image_with_report(observed, params.rn_amp)?;
    let mut trap_map = populate_trap_pixel_map(n_rows, n_columns, params)?;
    let corrected_smooth = inverse_cte_blur(&smoothed, &mut trap_map, params)?;

    let mut trail = Image::try_zeros(n_rows, n_columns)?;
    trail
        .data_mut()
        .par_iter_mut()
        .zip(corrected_smooth.data().par_iter())
        .zip(smoothed.data().par_iter())
        .for_each(|((t, &c), &s)| *t = c - s);

    let mut corrected = Image::try_zeros(n_rows, n_columns)?;
    corrected
        .data_mut()
        .par_iter_mut()
        .zip(observed.data().par_iter())
        .zip(trail.data().par_iter())
        .for_each(|((out, &o), &t)| *out = o + t);

    debug!(smoothing_passes = smoothing.passes, "CTE correction complete");
    Ok(Correction {
        corrected,
        trail,
        trap_map,
        smoothing,
    })
}

/// Adds CTE trails to a clean image, building the trap pixel map from
/// `params`.
pub fn simulate_image(clean: &Image, params: &CteParameters) -> Result<Image> {
    let (n_rows, n_columns) = clean.dimensions();
    let trap_map = populate_trap_pixel_map(n_rows, n_columns, params)?;
    forward_model(clean, &trap_map, params)
}
