//! Forward model: add CTE trails to a clean image.

use crate::guard::ensure_engine_inputs;
use crate::readout::ReadoutSimulator;
use crate::scratch::try_alloc_column;
use cte_core::{CteParameters, Image, Result, StatusAccumulator};
use rayon::prelude::*;
#[allow(unused_imports)]
use tracing::{debug, trace};

/// Simulates readout of every column of `input`.
///
/// Columns are independent and processed in parallel. Each column is widened
/// to `f64`, read out `n_par` times through its trap-density column and
/// narrowed back into the output.
///
/// # Errors
///
/// Input validation errors from [`ensure_engine_inputs`]. Failures inside a
/// column worker do not stop the other workers; the last one recorded is
/// returned after all columns finish.
pub fn forward_model(input: &Image, trap_map: &Image, params: &CteParameters) -> Result<Image> {
    ensure_engine_inputs(input, trap_map, params)?;
    let (n_rows, n_columns) = input.dimensions();
    trace!(n_rows, n_columns, n_par = params.n_par, "forward_model");

    let mut output = Image::try_zeros(n_rows, n_columns)?;
    let simulator = ReadoutSimulator::new(params);
    let status = StatusAccumulator::new();

    output
        .data_mut()
        .par_chunks_mut(n_rows)
        .zip(input.data().par_chunks(n_rows))
        .zip(trap_map.data().par_chunks(n_rows))
        .for_each_init(
            || status.capture(try_alloc_column(n_rows)),
            |pixels, ((out, column), density)| {
                let Some(pixels) = pixels.as_mut() else {
                    return;
                };
                for (p, &v) in pixels.iter_mut().zip(column) {
                    *p = f64::from(v);
                }
                status.capture(simulator.simulate_column_readout(pixels, density));
                for (o, &p) in out.iter_mut().zip(pixels.iter()) {
                    *o = p as f32;
                }
            },
        );

    status.into_result()?;
    debug!(n_columns, "forward model complete");
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use cte_core::{ColumnScales, Error, StorageOrder, TrapCharacterization};

    fn params() -> CteParameters {
        let traps = TrapCharacterization {
            cte_len: 3,
            qlevq: vec![5.0],
            dpdew: vec![1.0],
            rprof: vec![0.2, 0.2, 0.2],
            cprof: vec![0.1, 0.1, 0.1],
        };
        let mut p = CteParameters::new(traps, ColumnScales::uniform(3, 1.0));
        p.n_par = 1;
        p
    }

    #[test]
    fn test_trails_every_column() {
        let input = Image::from_fn(10, 3, |i, _| if i == 2 { 20.0 } else { 0.0 });
        let traps = Image::filled(10, 3, 1.0);
        let out = forward_model(&input, &traps, &params()).unwrap();

        for j in 0..3 {
            let col = out.column(j);
            assert_relative_eq!(col[2], 19.0);
            assert_relative_eq!(col[3], 0.2);
            assert_relative_eq!(col[5], 0.2);
            assert_eq!(col[6], 0.0);
        }
    }

    #[test]
    fn test_zero_trap_density_is_identity() {
        let input = Image::from_fn(16, 3, |i, j| (i * 13 + j * 7) as f32);
        let out = forward_model(&input, &Image::new(16, 3), &params()).unwrap();
        assert_eq!(out, input);
    }

    #[test]
    fn test_columns_independent() {
        let input = Image::from_fn(12, 3, |i, j| if i == 1 && j == 1 { 50.0 } else { 0.0 });
        let out = forward_model(&input, &Image::filled(12, 3, 1.0), &params()).unwrap();
        assert!(out.column(0).iter().all(|&v| v == 0.0));
        assert!(out.column(2).iter().all(|&v| v == 0.0));
        // three 0.2 releases come back out of the 1.0 captured
        assert_relative_eq!(out.column(1).iter().sum::<f32>(), 49.6, epsilon = 1e-4);
    }

    #[test]
    fn test_rejects_row_major() {
        let input = Image::new(8, 3).to_order(StorageOrder::RowMajor);
        let err = forward_model(&input, &Image::new(8, 3), &params()).unwrap_err();
        assert!(matches!(err, Error::StorageOrderMismatch { .. }));
    }
}
