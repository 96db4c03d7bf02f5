//! Trap pixel map construction.
//!
//! Trap density grows with distance from the readout register and varies from
//! column to column. Four column-scale curves are measured at detector rows
//! 512/1024/1536/2048; the map interpolates linearly between them along the
//! column, multiplies by the row ramp `(row + 1) / 2048` and by the
//! time-dependent `scale_frac`.

use cte_core::{CteParameters, Error, Image, Result};
use rayon::prelude::*;
#[allow(unused_imports)]
use tracing::{debug, trace};

/// Detector rows between consecutive scale curves.
pub const CURVE_SPACING: f64 = 512.0;

/// Detector row length of the ramp normalization.
pub const RAMP_LENGTH: f64 = 2048.0;

/// Upper clamp of the curve coordinate, keeping `floor` inside the last
/// segment.
const MAX_CURVE_COORD: f64 = 2.999;

/// Builds the trap pixel map for an `n_rows x n_columns` column-major image.
///
/// Row `i` of the image sits at detector row `i + row_offset` and column `j`
/// reads scale curve entry `j + column_offset`.
///
/// # Errors
///
/// - [`Error::AllocationProblem`] if the curves or the requested image are
///   empty
/// - [`Error::SizeMismatch`] if the curves do not cover the offset columns
/// - [`Error::OutOfMemory`] if the map cannot be allocated
pub fn populate_trap_pixel_map(
    n_rows: usize,
    n_columns: usize,
    params: &CteParameters,
) -> Result<Image> {
    let scales = &params.scales;
    if scales.is_empty() {
        return Err(Error::allocation_problem("column scale curves are empty"));
    }
    if n_rows == 0 || n_columns == 0 {
        return Err(Error::allocation_problem("trap pixel map has no pixels"));
    }
    scales.validate()?;
    let needed = params.column_offset + n_columns;
    if scales.len() < needed {
        return Err(Error::size_mismatch(format!(
            "column scale curves cover {} columns, need {needed}",
            scales.len()
        )));
    }

    trace!(
        n_rows,
        n_columns,
        row_offset = params.row_offset,
        column_offset = params.column_offset,
        "populate_trap_pixel_map"
    );

    let mut map = Image::try_zeros(n_rows, n_columns)?;
    let curves = scales.curves();
    let scale_frac = params.scale_frac;
    let row_offset = params.row_offset;
    let column_offset = params.column_offset;

    map.data_mut()
        .par_chunks_mut(n_rows)
        .enumerate()
        .for_each(|(j, column)| {
            let curve_column = j + column_offset;
            for (i, density) in column.iter_mut().enumerate() {
                let row = i + row_offset;
                let coord = (row as f64 / CURVE_SPACING).clamp(0.0, MAX_CURVE_COORD);
                let segment = coord.floor() as usize;
                let frac = coord - segment as f64;
                let lower = curves[segment][curve_column];
                let upper = curves[segment + 1][curve_column];
                let scale = lower + (upper - lower) * frac;
                *density = (scale * ((row + 1) as f64 / RAMP_LENGTH) * scale_frac) as f32;
            }
        });

    debug!(n_rows, n_columns, scale_frac, "trap pixel map populated");
    Ok(map)
}
