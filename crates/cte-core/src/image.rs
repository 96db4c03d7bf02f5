//! Image buffer type for CTE processing.
//!
//! [`Image`] is a plain 2D `f32` buffer with an explicit [`StorageOrder`].
//! Readout physics runs along detector columns, so every engine entry point
//! requires [`StorageOrder::ColumnMajor`]:
//!
//! ```text
//! Memory: [r0 r1 r2 ... rN-1]  ← Column 0
//!         [r0 r1 r2 ... rN-1]  ← Column 1
//!         ...
//! ```
//!
//! Row 0 is the row closest to the readout amplifier; charge moves towards
//! lower row indices during readout.
//!
//! # Usage
//!
//! ```rust
//! use cte_core::Image;
//!
//! let mut img = Image::new(2048, 4);
//! img.set(100, 2, 250.0);
//! assert_eq!(img.get(100, 2), 250.0);
//! assert_eq!(img.column(2)[100], 250.0);
//! ```
//!
//! # Used By
//!
//! - `cte-ops` - Every simulation, inversion and smoothing operation

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Memory layout of an [`Image`] buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageOrder {
    /// Columns are contiguous: index = `column * n_rows + row`.
    #[default]
    ColumnMajor,
    /// Rows are contiguous: index = `row * n_columns + column`.
    RowMajor,
}

/// Owned 2D `f32` image buffer.
///
/// # Example
///
/// ```rust
/// use cte_core::{Image, StorageOrder};
///
/// let data = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
/// let img = Image::from_data(3, 2, StorageOrder::ColumnMajor, data).unwrap();
/// assert_eq!(img.column(1), &[4.0, 5.0, 6.0]);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    data: Vec<f32>,
    n_rows: usize,
    n_columns: usize,
    order: StorageOrder,
}

impl Image {
    /// Creates a zero-filled column-major image.
    ///
    /// # Panics
    ///
    /// Panics if allocation fails. Use [`Image::try_zeros`] inside the
    /// engine where exhaustion has to be reported as a status.
    pub fn new(n_rows: usize, n_columns: usize) -> Self {
        Self {
            data: vec![0.0; n_rows * n_columns],
            n_rows,
            n_columns,
            order: StorageOrder::ColumnMajor,
        }
    }

    /// Creates a column-major image filled with `value`.
    pub fn filled(n_rows: usize, n_columns: usize, value: f32) -> Self {
        Self {
            data: vec![value; n_rows * n_columns],
            n_rows,
            n_columns,
            order: StorageOrder::ColumnMajor,
        }
    }

    /// Creates a zero-filled column-major image, reporting allocation
    /// failure as [`Error::OutOfMemory`] instead of aborting.
    pub fn try_zeros(n_rows: usize, n_columns: usize) -> Result<Self> {
        let len = n_rows
            .checked_mul(n_columns)
            .ok_or_else(|| Error::invalid_dimensions(n_rows, n_columns, "size overflow"))?;
        let mut data = Vec::new();
        data.try_reserve_exact(len)
            .map_err(|_| Error::out_of_memory::<f32>(len))?;
        data.resize(len, 0.0);
        Ok(Self {
            data,
            n_rows,
            n_columns,
            order: StorageOrder::ColumnMajor,
        })
    }

    /// Creates an image from existing pixel data.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDimensions`] if `data.len()` is not
    /// `n_rows * n_columns`.
    pub fn from_data(
        n_rows: usize,
        n_columns: usize,
        order: StorageOrder,
        data: Vec<f32>,
    ) -> Result<Self> {
        let expected = n_rows
            .checked_mul(n_columns)
            .ok_or_else(|| Error::invalid_dimensions(n_rows, n_columns, "size overflow"))?;
        if data.len() != expected {
            return Err(Error::invalid_dimensions(
                n_rows,
                n_columns,
                format!("expected {} elements, got {}", expected, data.len()),
            ));
        }
        Ok(Self {
            data,
            n_rows,
            n_columns,
            order,
        })
    }

    /// Creates a column-major image from a per-pixel function `f(row, column)`.
    pub fn from_fn(
        n_rows: usize,
        n_columns: usize,
        mut f: impl FnMut(usize, usize) -> f32,
    ) -> Self {
        let mut data = Vec::with_capacity(n_rows * n_columns);
        for j in 0..n_columns {
            for i in 0..n_rows {
                data.push(f(i, j));
            }
        }
        Self {
            data,
            n_rows,
            n_columns,
            order: StorageOrder::ColumnMajor,
        }
    }

    /// Number of rows.
    #[inline]
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// Number of columns.
    #[inline]
    pub fn n_columns(&self) -> usize {
        self.n_columns
    }

    /// Returns `(n_rows, n_columns)`.
    #[inline]
    pub fn dimensions(&self) -> (usize, usize) {
        (self.n_rows, self.n_columns)
    }

    /// Storage order of the buffer.
    #[inline]
    pub fn order(&self) -> StorageOrder {
        self.order
    }

    /// Returns `true` if the image holds no pixels.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Raw pixel buffer in storage order.
    #[inline]
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Mutable raw pixel buffer in storage order.
    #[inline]
    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    #[inline]
    fn index(&self, row: usize, column: usize) -> usize {
        debug_assert!(row < self.n_rows && column < self.n_columns);
        match self.order {
            StorageOrder::ColumnMajor => column * self.n_rows + row,
            StorageOrder::RowMajor => row * self.n_columns + column,
        }
    }

    /// Pixel value at (`row`, `column`).
    ///
    /// # Panics
    ///
    /// Panics if the coordinates are out of bounds.
    #[inline]
    pub fn get(&self, row: usize, column: usize) -> f32 {
        self.data[self.index(row, column)]
    }

    /// Sets the pixel at (`row`, `column`).
    #[inline]
    pub fn set(&mut self, row: usize, column: usize, value: f32) {
        let idx = self.index(row, column);
        self.data[idx] = value;
    }

    /// Contiguous slice for one column of a column-major image.
    ///
    /// # Panics
    ///
    /// Panics if the image is not column-major or `column` is out of range.
    pub fn column(&self, column: usize) -> &[f32] {
        assert_eq!(
            self.order,
            StorageOrder::ColumnMajor,
            "column access needs column-major storage"
        );
        let start = column * self.n_rows;
        &self.data[start..start + self.n_rows]
    }

    /// Fails unless the image is column-major.
    pub fn ensure_column_major(&self) -> Result<()> {
        if self.order != StorageOrder::ColumnMajor {
            return Err(Error::StorageOrderMismatch {
                expected: StorageOrder::ColumnMajor,
                got: self.order,
            });
        }
        Ok(())
    }

    /// Fails with [`Error::AllocationProblem`] if the image holds no pixels.
    pub fn ensure_populated(&self, what: &str) -> Result<()> {
        if self.data.is_empty() || self.n_rows == 0 || self.n_columns == 0 {
            return Err(Error::allocation_problem(format!("{what} has no pixel data")));
        }
        Ok(())
    }

    /// Fails with [`Error::SizeMismatch`] unless `other` has the same shape.
    pub fn ensure_same_shape(&self, other: &Image, what: &str) -> Result<()> {
        if self.dimensions() != other.dimensions() {
            return Err(Error::size_mismatch(format!(
                "{what} is {}x{}, expected {}x{}",
                other.n_rows, other.n_columns, self.n_rows, self.n_columns
            )));
        }
        Ok(())
    }

    /// Returns a copy of this image in the requested storage order.
    ///
    /// This is a collaborator-side helper; engine entry points never call
    /// it on their inputs.
    pub fn to_order(&self, order: StorageOrder) -> Image {
        if order == self.order {
            return self.clone();
        }
        let mut out = Image {
            data: vec![0.0; self.data.len()],
            n_rows: self.n_rows,
            n_columns: self.n_columns,
            order,
        };
        for j in 0..self.n_columns {
            for i in 0..self.n_rows {
                out.set(i, j, self.get(i, j));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_new() {
        let img = Image::new(16, 4);
        assert_eq!(img.dimensions(), (16, 4));
        assert_eq!(img.order(), StorageOrder::ColumnMajor);
        assert!(img.data().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_column_major_layout() {
        let img = Image::from_fn(3, 2, |i, j| (j * 10 + i) as f32);
        assert_eq!(img.data(), &[0.0, 1.0, 2.0, 10.0, 11.0, 12.0]);
        assert_eq!(img.column(1), &[10.0, 11.0, 12.0]);
        assert_eq!(img.get(2, 1), 12.0);
    }

    #[test]
    #[should_panic(expected = "column-major")]
    fn test_column_on_row_major_panics() {
        let img = Image::new(3, 2).to_order(StorageOrder::RowMajor);
        let _ = img.column(0);
    }

    #[test]
    fn test_from_data_length_check() {
        let err = Image::from_data(4, 4, StorageOrder::ColumnMajor, vec![0.0; 15]).unwrap_err();
        assert!(matches!(err, Error::InvalidDimensions { .. }));
    }

    #[test]
    fn test_row_major_rejected() {
        let img = Image::from_data(2, 2, StorageOrder::RowMajor, vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let err = img.ensure_column_major().unwrap_err();
        assert!(matches!(
            err,
            Error::StorageOrderMismatch {
                got: StorageOrder::RowMajor,
                ..
            }
        ));
    }

    #[test]
    fn test_to_order_roundtrip() {
        let img = Image::from_data(2, 3, StorageOrder::RowMajor, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0])
            .unwrap();
        let col = img.to_order(StorageOrder::ColumnMajor);
        assert_eq!(col.data(), &[1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
        assert_eq!(col.get(1, 2), 6.0);
        assert_eq!(col.to_order(StorageOrder::RowMajor), img);
    }

    #[test]
    fn test_ensure_populated() {
        assert!(Image::new(0, 0).ensure_populated("input").is_err());
        assert!(Image::new(1, 1).ensure_populated("input").is_ok());
    }

    #[test]
    fn test_try_zeros() {
        let img = Image::try_zeros(8, 8).unwrap();
        assert_eq!(img.data().len(), 64);
        assert!(Image::try_zeros(usize::MAX, 2).is_err());
    }
}
