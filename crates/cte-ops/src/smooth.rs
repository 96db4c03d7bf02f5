//! Read-noise smoothing.
//!
//! Trail removal amplifies read noise, so the correction is computed on a
//! smoothed version of the image and only the difference is applied to the
//! original. The smoother nudges each pixel towards agreement with its
//! vertical neighbours while keeping the residual `input - output` at about
//! the read-noise amplitude. Each pass computes an adjustment per pixel from
//! a 3-column window, applies three quarters of it and measures the RMS of
//! the residual; it stops once the residual reaches the read noise.
//!
//! # Example
//!
//! ```rust
//! use cte_core::Image;
//! use cte_ops::smooth::cte_smooth_image;
//!
//! let img = Image::filled(16, 4, 5.0);
//! // below 0.1 the input is returned unchanged
//! assert_eq!(cte_smooth_image(&img, 0.05).unwrap(), img);
//! ```

use crate::guard::ensure_column_image;
use cte_core::{Error, Image, Result};
use rayon::prelude::*;
use std::sync::Mutex;
#[allow(unused_imports)]
use tracing::{debug, info, trace};

/// Maximum number of smoothing passes.
pub const MAX_PASSES: u32 = 100;

/// Read-noise amplitude below which smoothing is skipped.
pub const MIN_READ_NOISE: f64 = 0.1;

/// Fraction of the computed adjustment applied per pass.
const RELAXATION: f64 = 0.75;

/// Convergence tolerance on `rn_amp - rms`.
const TOLERANCE: f64 = 1e-5;

/// Pixels with both input and output at or below this magnitude are left out
/// of the residual RMS.
const RMS_PIXEL_FLOOR: f32 = 0.1;

/// Fraction of the read noise bounding the neighbour and 3x3 terms.
const NEIGHBOUR_LIMIT: f64 = 0.33;

/// Outcome of a smoothing run.
#[derive(Debug, Clone, PartialEq)]
pub struct SmoothReport {
    /// Passes executed; 0 when smoothing was skipped.
    pub passes: u32,
    /// Residual RMS after the last pass.
    pub rms: f64,
    /// Whether the residual reached the read-noise level.
    pub converged: bool,
    /// Residual RMS after each pass, in order.
    pub rms_history: Vec<f64>,
}

/// Smooths `input` at read-noise amplitude `rn_amp`.
///
/// Shortcut for [`cte_smooth_image_with_report`] that drops the report.
pub fn cte_smooth_image(input: &Image, rn_amp: f64) -> Result<Image> {
    cte_smooth_image_with_report(input, rn_amp).map(|(image, _)| image)
}

/// Smooths `input` at read-noise amplitude `rn_amp` and reports convergence.
///
/// # Errors
///
/// - [`Error::AllocationProblem`] for an empty image
/// - [`Error::StorageOrderMismatch`] for row-major input
/// - [`Error::InvalidDimensions`] for fewer than three columns when
///   smoothing is active
pub fn cte_smooth_image_with_report(
    input: &Image,
    rn_amp: f64,
) -> Result<(Image, SmoothReport)> {
    ensure_column_image(input, "smoothing input")?;
    let (n_rows, n_columns) = input.dimensions();

    if rn_amp < MIN_READ_NOISE {
        debug!(rn_amp, "read noise below smoothing floor, returning input");
        let skipped = SmoothReport {
            passes: 0,
            rms: 0.0,
            converged: true,
            rms_history: Vec::new(),
        };
        return Ok((input.clone(), skipped));
    }
    if n_columns < 3 {
        return Err(Error::invalid_dimensions(
            n_rows,
            n_columns,
            "smoothing needs at least 3 columns",
        ));
    }
    trace!(n_rows, n_columns, rn_amp, "cte_smooth_image");

    let mut output = Image::try_zeros(n_rows, n_columns)?;
    output.data_mut().copy_from_slice(input.data());
    let mut adjustment = Image::try_zeros(n_rows, n_columns)?;
    let mut report = SmoothReport {
        passes: 0,
        rms: 0.0,
        converged: false,
        rms_history: Vec::with_capacity(MAX_PASSES as usize),
    };

    for pass in 1..=MAX_PASSES {
        {
            let smoothed = &output;
            adjustment
                .data_mut()
                .par_chunks_mut(n_rows)
                .enumerate()
                .for_each(|(i, adj)| {
                    let mid = i.clamp(1, n_columns - 2);
                    let window = Window {
                        observed: [
                            input.column(mid - 1),
                            input.column(mid),
                            input.column(mid + 1),
                        ],
                        smoothed: [
                            smoothed.column(mid - 1),
                            smoothed.column(mid),
                            smoothed.column(mid + 1),
                        ],
                    };
                    let local = 1 + i - mid;
                    for (j, a) in adj.iter_mut().enumerate() {
                        *a = window.find_dadj(local, j, rn_amp) as f32;
                    }
                });
        }

        let residual = Mutex::new(ResidualSum::default());
        output
            .data_mut()
            .par_chunks_mut(n_rows)
            .zip(adjustment.data().par_chunks(n_rows))
            .zip(input.data().par_chunks(n_rows))
            .for_each(|((out, adj), obs)| {
                let mut local = ResidualSum::default();
                for ((o, &a), &x) in out.iter_mut().zip(adj).zip(obs) {
                    *o = (f64::from(*o) + f64::from(a) * RELAXATION) as f32;
                    if x.abs() > RMS_PIXEL_FLOOR || o.abs() > RMS_PIXEL_FLOOR {
                        let r = f64::from(x - *o);
                        local.sum += r * r;
                        local.count += 1;
                    }
                }
                let mut total = residual
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                total.sum += local.sum;
                total.count += local.count;
            });

        let total = residual.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner());
        report.passes = pass;
        report.rms = total.rms();
        report.rms_history.push(report.rms);
        trace!(pass, rms = report.rms, "smoothing pass");
        if rn_amp - report.rms < TOLERANCE {
            report.converged = true;
            break;
        }
    }

    if report.converged {
        debug!(passes = report.passes, rms = report.rms, "smoothing converged");
    } else {
        info!(passes = report.passes, rms = report.rms, rn_amp, "smoothing hit pass limit");
    }
    Ok((output, report))
}

#[derive(Debug, Default)]
struct ResidualSum {
    sum: f64,
    count: usize,
}

impl ResidualSum {
    fn rms(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            (self.sum / self.count as f64).sqrt()
        }
    }
}

/// Three adjacent columns of the observed and smoothed images.
struct Window<'a> {
    observed: [&'a [f32]; 3],
    smoothed: [&'a [f32]; 3],
}

impl Window<'_> {
    /// Adjustment for row `j` of window column `c`.
    ///
    /// Combines four bounded pulls, each weighted so it fades where it would
    /// fight the read noise: towards the observation, towards the mean 3x3
    /// residual (centre column only, interior rows only) and towards each
    /// vertical neighbour.
    fn find_dadj(&self, c: usize, j: usize, rn: f64) -> f64 {
        let n_rows = self.observed[c].len();
        let limit = rn * NEIGHBOUR_LIMIT;
        let rn2 = rn * rn;

        let mval = f64::from(self.smoothed[c][j]);
        let dval0 = f64::from(self.observed[c][j]) - mval;
        let dval0u = dval0.clamp(-1.0, 1.0);

        let mut dval9 = 0.0;
        if c == 1 && j > 0 && j + 1 < n_rows {
            for col in 0..3 {
                for row in j - 1..=j + 1 {
                    dval9 += f64::from(self.observed[col][row])
                        - f64::from(self.smoothed[col][row]);
                }
            }
            dval9 /= 9.0;
        }
        let dval9u = dval9.clamp(-limit, limit);

        let dmod1 = if j > 0 {
            f64::from(self.smoothed[c][j - 1]) - mval
        } else {
            0.0
        };
        let dmod2 = if j + 1 < n_rows {
            f64::from(self.smoothed[c][j + 1]) - mval
        } else {
            0.0
        };
        let dmod1u = dmod1.clamp(-limit, limit);
        let dmod2u = dmod2.clamp(-limit, limit);

        let w0 = dval0 * dval0 / (dval0 * dval0 + 4.0 * rn2);
        let w9 = dval9 * dval9 / (dval9 * dval9 + 18.0 * rn2);
        let w1 = 4.0 * rn2 / (dmod1 * dmod1 + 4.0 * rn2);
        let w2 = 4.0 * rn2 / (dmod2 * dmod2 + 4.0 * rn2);

        dval0u * w0 * 0.25 + dval9u * w9 * 0.25 + dmod1u * w1 * 0.25 + dmod2u * w2 * 0.25
    }
}
