//! Entry-point validation guards.
//!
//! Every engine entry point checks its inputs once, before any parallel work
//! starts, so the column workers can assume consistent shapes.
//!
//! # Example
//!
//! ```rust,ignore
//! use cte_ops::guard::ensure_engine_inputs;
//!
//! // Fails on empty images, row-major storage or mismatched trap maps
//! ensure_engine_inputs(&image, &trap_map, &params)?;
//! ```

use cte_core::{CteParameters, Image, Result};

/// Validates an image that a column-parallel operation will read.
///
/// # Returns
///
/// `Err(AllocationProblem)` for an image without pixels,
/// `Err(StorageOrderMismatch)` for row-major storage.
pub fn ensure_column_image(image: &Image, what: &str) -> Result<()> {
    image.ensure_populated(what)?;
    image.ensure_column_major()
}

/// Validates the inputs of the forward model and the inverse solver.
///
/// Checks both images with [`ensure_column_image`], requires the trap map to
/// match the input shape and validates the parameter bundle.
pub fn ensure_engine_inputs(input: &Image, trap_map: &Image, params: &CteParameters) -> Result<()> {
    ensure_column_image(input, "input image")?;
    ensure_column_image(trap_map, "trap pixel map")?;
    input.ensure_same_shape(trap_map, "trap pixel map")?;
    params.validate()
}
