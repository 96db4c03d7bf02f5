//! # cte-core
//!
//! Core types for pixel-based charge transfer efficiency (CTE) correction.
//!
//! This crate provides the foundational types used by the CTE engine:
//!
//! - [`Image`] - Column-major `f32` image buffer with explicit [`StorageOrder`]
//! - [`CteParameters`], [`TrapCharacterization`], [`ColumnScales`] - The
//!   parameter bundle delivered by the reference-table loader
//! - [`Error`], [`Result`], [`Status`] - Error handling and integer status codes
//! - [`StatusAccumulator`] - Failure bookkeeping shared by column workers
//!
//! ## Crate Structure
//!
//! ```text
//! cte-core (this crate)
//!    ^
//!    |
//!    +-- cte-ops (readout simulation, inversion, smoothing)
//!    +-- cte-cli (ctecorr driver)
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod error;
pub mod image;
pub mod params;
pub mod status;

pub use error::{Error, Result, Status};
pub use image::{Image, StorageOrder};
pub use params::{ColumnScales, CteParameters, TrapCharacterization};
pub use status::StatusAccumulator;

/// Prelude module for convenient imports.
///
/// ```
/// use cte_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::{Error, Result, Status};
    pub use crate::image::{Image, StorageOrder};
    pub use crate::params::{ColumnScales, CteParameters, TrapCharacterization};
    pub use crate::status::StatusAccumulator;
}
