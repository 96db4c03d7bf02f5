//! Iterative inversion of the readout model.
//!
//! For each column the solver looks for the pre-readout model whose simulated
//! readout reproduces the observation. Starting from the observation, every
//! iteration reads the model out, compares with the observation and
//! subtracts the difference:
//!
//! ```text
//! model' = model - (readout(model) - observed)
//! ```
//!
//! All but the last iteration damp the correction by `d^2 / (d^2 + rn^2)`, so
//! differences at the read-noise level barely move the model. The last
//! iteration applies the full correction.
//!
//! When readout-CR mitigation is enabled, a converged column that shows
//! over-subtraction has its trap densities lowered and is inverted again, at
//! most [`MAX_CR_ATTEMPTS`] times in total.

use crate::cr::correct_cr_over_subtraction;
use crate::guard::ensure_engine_inputs;
use crate::readout::ReadoutSimulator;
use crate::scratch::ColumnScratch;
use cte_core::{CteParameters, Image, Result, StatusAccumulator};
use rayon::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
#[allow(unused_imports)]
use tracing::{debug, trace};

/// Upper bound on inversion attempts per column, first attempt included.
pub const MAX_CR_ATTEMPTS: u32 = 5;

/// Outcome of inverting one column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnReport {
    /// Inversion attempts made, between 1 and [`MAX_CR_ATTEMPTS`].
    pub attempts: u32,
}

impl ColumnReport {
    /// Returns `true` if over-subtraction triggered at least one rerun.
    pub fn was_redone(&self) -> bool {
        self.attempts > 1
    }
}

/// Column solver bound to one parameter bundle.
#[derive(Debug, Clone, Copy)]
pub struct InverseSolver<'a> {
    params: &'a CteParameters,
    simulator: ReadoutSimulator<'a>,
}

impl<'a> InverseSolver<'a> {
    /// Creates a solver for `params`.
    pub fn new(params: &'a CteParameters) -> Self {
        Self {
            params,
            simulator: ReadoutSimulator::new(params),
        }
    }

    /// Inverts the column loaded in `scratch`.
    ///
    /// The observation must already be loaded with
    /// [`ColumnScratch::load_observed`]. On return the corrected column is in
    /// [`ColumnScratch::model`]; `traps` carries any density reductions made
    /// by readout-CR mitigation.
    pub fn invert_column(
        &self,
        scratch: &mut ColumnScratch,
        traps: &mut [f32],
    ) -> Result<ColumnReport> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            scratch.model.copy_from_slice(&scratch.observed);

            for _ in 1..self.params.n_forward {
                self.iterate(scratch, traps, true)?;
            }
            self.iterate(scratch, traps, false)?;

            let redo = self.params.fix_rocr
                && correct_cr_over_subtraction(
                    traps,
                    &scratch.model,
                    &scratch.observed,
                    self.params.thresh,
                );
            if !redo || attempts >= MAX_CR_ATTEMPTS {
                break;
            }
            trace!(attempts, "readout CR over-subtraction, rerunning column");
        }
        Ok(ColumnReport { attempts })
    }

    fn iterate(&self, scratch: &mut ColumnScratch, traps: &[f32], damped: bool) -> Result<()> {
        scratch.temp_model.copy_from_slice(&scratch.model);
        self.simulator.simulate_column_readout(&mut scratch.model, traps)?;

        let rn2 = self.params.rn_amp * self.params.rn_amp;
        for ((model, &prev), &observed) in scratch
            .model
            .iter_mut()
            .zip(&scratch.temp_model)
            .zip(&scratch.observed)
        {
            let mut delta = *model - observed;
            if damped {
                let delta2 = delta * delta;
                let denom = delta2 + rn2;
                if denom > 0.0 {
                    delta *= delta2 / denom;
                }
            }
            *model = prev - delta;
        }
        Ok(())
    }
}

/// Removes CTE trails from every column of `input`.
///
/// `trap_map` is the trap pixel map for `input`; it is modified in place
/// where readout-CR mitigation lowers densities. Every output column is
/// written, including columns whose worker recorded a failure.
///
/// # Errors
///
/// Input validation errors from [`ensure_engine_inputs`],
/// [`Error::OutOfMemory`](cte_core::Error::OutOfMemory) if a worker could not
/// allocate its scratch, or the last failure recorded by a column worker.
pub fn inverse_cte_blur(
    input: &Image,
    trap_map: &mut Image,
    params: &CteParameters,
) -> Result<Image> {
    ensure_engine_inputs(input, trap_map, params)?;
    let (n_rows, n_columns) = input.dimensions();
    trace!(
        n_rows,
        n_columns,
        n_forward = params.n_forward,
        fix_rocr = params.fix_rocr,
        "inverse_cte_blur"
    );

    let mut output = Image::try_zeros(n_rows, n_columns)?;
    let solver = InverseSolver::new(params);
    let status = StatusAccumulator::new();
    let redone = AtomicUsize::new(0);

    output
        .data_mut()
        .par_chunks_mut(n_rows)
        .zip(input.data().par_chunks(n_rows))
        .zip(trap_map.data_mut().par_chunks_mut(n_rows))
        .for_each_init(
            || status.capture(ColumnScratch::try_new(n_rows)),
            |scratch, ((out, observed), traps)| {
                let Some(scratch) = scratch.as_mut() else {
                    return;
                };
                scratch.load_observed(observed);
                if let Some(report) = status.capture(solver.invert_column(scratch, traps)) {
                    if report.was_redone() {
                        redone.fetch_add(1, Ordering::Relaxed);
                    }
                }
                scratch.store_model(out);
            },
        );

    status.into_result()?;
    debug!(n_columns, redone = redone.into_inner(), "inverse CTE blur complete");
    Ok(output)
}
