//! # cte-ops
//!
//! Pixel-based charge transfer efficiency (CTE) correction for CCD images.
//!
//! Charge traps in a radiation-damaged CCD hold back part of each pixel's
//! charge during readout and release it into the following pixels, leaving
//! trails behind every source. This crate simulates that process and inverts
//! it.
//!
//! # Modules
//!
//! - [`readout`] - Single-column readout simulation
//! - [`trap_map`] - Trap pixel map from column scale curves
//! - [`forward`] - Forward model over a whole image
//! - [`inverse`] - Damped iterative inversion with readout-CR mitigation
//! - [`cr`] - Over-subtraction detection and trap downscaling
//! - [`smooth`] - Read-noise smoothing
//! - [`pipeline`] - Smoothing, inversion and trail application end to end
//!
//! All image operations work on column-major [`Image`](cte_core::Image)s and
//! process columns in parallel with rayon.
//!
//! # Example
//!
//! ```rust,ignore
//! use cte_core::CteParameters;
//! use cte_ops::pipeline::correct_image;
//!
//! let params = CteParameters::from_file("wfc3_uvis.yaml")?;
//! let result = correct_image(&observed, &params)?;
//! let corrected = result.corrected;
//! ```
//!
//! # Lower-level steps
//!
//! ```rust,ignore
//! use cte_ops::{cte_smooth_image, inverse_cte_blur, populate_trap_pixel_map};
//!
//! let smoothed = cte_smooth_image(&observed, params.rn_amp)?;
//! let mut traps = populate_trap_pixel_map(rows, cols, &params)?;
//! let corrected = inverse_cte_blur(&smoothed, &mut traps, &params)?;
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod cr;
pub mod forward;
pub mod guard;
pub mod inverse;
pub mod pipeline;
pub mod readout;
pub mod scratch;
pub mod smooth;
pub mod trap_map;

pub use cr::correct_cr_over_subtraction;
pub use forward::forward_model;
pub use inverse::{ColumnReport, InverseSolver, MAX_CR_ATTEMPTS, inverse_cte_blur};
pub use pipeline::{Correction, correct_image, simulate_image};
pub use readout::{
    ReadoutAlgorithm, ReadoutSimulator, simulate_pixel_readout_v1_1, simulate_pixel_readout_v1_2,
};
pub use scratch::ColumnScratch;
pub use smooth::{SmoothReport, cte_smooth_image, cte_smooth_image_with_report};
pub use trap_map::populate_trap_pixel_map;
