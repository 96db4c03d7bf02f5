//! Integration tests for the CTE correction crates.
//!
//! This crate contains end-to-end tests that run parameter loading, trap map
//! construction, the forward model and the inversion together.
