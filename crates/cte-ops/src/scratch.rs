//! Per-worker column scratch.
//!
//! Each worker of the inverse solver owns one [`ColumnScratch`] for the whole
//! call and reuses it for every column it processes. Allocation goes through
//! `try_reserve_exact` so that exhaustion surfaces as
//! [`Error::OutOfMemory`](cte_core::Error::OutOfMemory) instead of aborting.

use cte_core::{Error, Result};

/// Allocates `len` zeroed doubles, reporting exhaustion as an error.
pub fn try_alloc_column(len: usize) -> Result<Vec<f64>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|_| Error::out_of_memory::<f64>(len))?;
    buf.resize(len, 0.0);
    Ok(buf)
}

/// Working buffers for one column of the inverse solver.
#[derive(Debug, Clone)]
pub struct ColumnScratch {
    pub(crate) model: Vec<f64>,
    pub(crate) temp_model: Vec<f64>,
    pub(crate) observed: Vec<f64>,
}

impl ColumnScratch {
    /// Allocates scratch for columns of `n_rows` pixels.
    pub fn try_new(n_rows: usize) -> Result<Self> {
        Ok(Self {
            model: try_alloc_column(n_rows)?,
            temp_model: try_alloc_column(n_rows)?,
            observed: try_alloc_column(n_rows)?,
        })
    }

    /// Column length this scratch was sized for.
    pub fn n_rows(&self) -> usize {
        self.observed.len()
    }

    /// Widens an observed `f32` column into the scratch.
    ///
    /// # Panics
    ///
    /// Panics if `column` does not have [`n_rows`](Self::n_rows) entries.
    pub fn load_observed(&mut self, column: &[f32]) {
        assert_eq!(column.len(), self.observed.len(), "column length");
        for (dst, &src) in self.observed.iter_mut().zip(column) {
            *dst = f64::from(src);
        }
    }

    /// Observed column as loaded.
    pub fn observed(&self) -> &[f64] {
        &self.observed
    }

    /// Current model column.
    pub fn model(&self) -> &[f64] {
        &self.model
    }

    /// Narrows the model column into `out`.
    pub fn store_model(&self, out: &mut [f32]) {
        for (dst, &src) in out.iter_mut().zip(&self.model) {
            *dst = src as f32;
        }
    }
}
