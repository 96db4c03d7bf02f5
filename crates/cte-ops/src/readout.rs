//! Single-column readout simulation.
//!
//! Charge moves down a column towards the amplifier, row 0 first. Each trap
//! species `w` captures `dpdew[w] / n_par` (scaled by the local trap density)
//! from every pixel whose charge reaches its threshold `qlevq[w]`, and
//! releases the captured charge into the following `cte_len` pixels according
//! to its release profiles. Traps are processed independently, highest
//! threshold first.
//!
//! Two capture/release orderings exist:
//!
//! - [`ReadoutAlgorithm::Current`] ([`simulate_pixel_readout_v1_2`]) is used by
//!   the forward model and the inverse solver.
//! - [`ReadoutAlgorithm::Legacy`] ([`simulate_pixel_readout_v1_1`]) releases
//!   before capturing on every row and carries the cumulative term into the
//!   new trap fill instead of releasing it on the capture row. It is kept for
//!   regression comparisons.
//!
//! In both orderings the cumulative profile only applies while the trail is
//! still open: a capture on the last trail position gets no `cprof` term.
//!
//! # Example
//!
//! ```rust
//! use cte_core::TrapCharacterization;
//! use cte_ops::readout::ReadoutSimulator;
//!
//! let traps = TrapCharacterization {
//!     cte_len: 2,
//!     qlevq: vec![5.0],
//!     dpdew: vec![1.0],
//!     rprof: vec![0.5, 0.5],
//!     cprof: vec![0.0, 0.0],
//! };
//! let mut column = vec![0.0, 100.0, 0.0, 0.0];
//! let density = vec![1.0f32; 4];
//! ReadoutSimulator::with_traps(&traps, 1)
//!     .simulate_column_readout(&mut column, &density)
//!     .unwrap();
//! assert_eq!(column, vec![0.0, 99.0, 0.5, 0.5]);
//! ```

use cte_core::{CteParameters, Error, Result, TrapCharacterization};
#[allow(unused_imports)]
use tracing::{debug, trace};

/// Charge level below which no trap ever engages.
pub const MIN_TRAP_CHARGE: f64 = 10.0;

/// Trap capture/release ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadoutAlgorithm {
    /// Release on every row of an open trail, then capture; the cumulative
    /// term stays trapped.
    Legacy,
    /// Capture rows release and capture together; other trail rows release.
    #[default]
    Current,
}

impl ReadoutAlgorithm {
    /// Runs one clocking pass of this algorithm over `pixels`.
    #[inline]
    pub fn simulate_pixel_readout(
        self,
        pixels: &mut [f64],
        density: &[f32],
        traps: &TrapCharacterization,
        n_par: u32,
    ) {
        match self {
            Self::Legacy => simulate_pixel_readout_v1_1(pixels, density, traps, n_par),
            Self::Current => simulate_pixel_readout_v1_2(pixels, density, traps, n_par),
        }
    }
}

/// Highest trap whose threshold does not exceed the column's peak charge.
#[inline]
fn max_charge_trap(qlevq: &[f64], pixels: &[f64]) -> Option<usize> {
    let max_pixel = pixels.iter().copied().fold(MIN_TRAP_CHARGE, f64::max);
    qlevq.iter().rposition(|&q| q <= max_pixel)
}

/// One clocking pass, current ordering.
///
/// `pixels` and `density` must have the same length; this is not checked
/// here.
pub fn simulate_pixel_readout_v1_2(
    pixels: &mut [f64],
    density: &[f32],
    traps: &TrapCharacterization,
    n_par: u32,
) {
    let Some(top) = max_charge_trap(&traps.qlevq, pixels) else {
        return;
    };
    let cte_len = traps.cte_len;
    let n_par = f64::from(n_par);

    for w in (0..=top).rev() {
        let qlev = traps.qlevq[w];
        let capture = traps.dpdew[w] / n_par;
        let rprof = &traps.rprof[w * cte_len..(w + 1) * cte_len];
        let cprof = &traps.cprof[w * cte_len..(w + 1) * cte_len];

        let mut n_transfers = cte_len;
        let mut trapped_flux = 0.0f64;
        let mut prev_density = density.first().copied().unwrap_or_default();

        for (pixel, &d) in pixels.iter_mut().zip(density) {
            let last_density = std::mem::replace(&mut prev_density, d);
            let inside_trail = n_transfers < cte_len;
            let above = *pixel >= qlev;
            if !inside_trail && !above {
                continue;
            }

            if d < last_density {
                trapped_flux *= f64::from(d) / f64::from(last_density);
            }

            let released;
            let captured;
            if above {
                released = if inside_trail {
                    n_transfers += 1;
                    let cumulative = if n_transfers < cte_len {
                        cprof[n_transfers - 1] * trapped_flux
                    } else {
                        0.0
                    };
                    rprof[n_transfers - 1] * trapped_flux + cumulative
                } else {
                    0.0
                };
                trapped_flux = capture * f64::from(d);
                captured = trapped_flux;
                n_transfers = 0;
            } else {
                n_transfers += 1;
                released = rprof[n_transfers - 1] * trapped_flux;
                captured = 0.0;
            }

            *pixel += released - captured;
        }
    }
}

/// One clocking pass, legacy ordering.
///
/// Every row of an open trail releases first, advancing the transfer
/// counter. A capture on the same row keeps the cumulative term in the trap
/// instead of returning it to the pixel, so the new trail drains
/// `captured + cprof * trapped_flux`.
pub fn simulate_pixel_readout_v1_1(
    pixels: &mut [f64],
    density: &[f32],
    traps: &TrapCharacterization,
    n_par: u32,
) {
    let Some(top) = max_charge_trap(&traps.qlevq, pixels) else {
        return;
    };
    let cte_len = traps.cte_len;
    let n_par = f64::from(n_par);

    for w in (0..=top).rev() {
        let qlev = traps.qlevq[w];
        let mut trapped_flux = 0.0f64;
        let mut n_transfers = cte_len;

        for i in 0..pixels.len() {
            let pixel = pixels[i];
            if i > 0 && density[i] < density[i - 1] {
                trapped_flux *= f64::from(density[i]) / f64::from(density[i - 1]);
            }

            let mut release = 0.0;
            if n_transfers < cte_len {
                n_transfers += 1;
                release = traps.rprof(w, n_transfers - 1) * trapped_flux;
            }

            let mut captured = 0.0;
            if pixel >= qlev {
                captured = traps.dpdew[w] / n_par * f64::from(density[i]);
                let carried = if n_transfers < cte_len {
                    traps.cprof(w, n_transfers - 1) * trapped_flux
                } else {
                    0.0
                };
                n_transfers = 0;
                trapped_flux = captured + carried;
            }

            pixels[i] += release - captured;
        }
    }
}

/// Column readout simulator bound to one trap characterization.
#[derive(Debug, Clone, Copy)]
pub struct ReadoutSimulator<'a> {
    traps: &'a TrapCharacterization,
    n_par: u32,
    algorithm: ReadoutAlgorithm,
}

impl<'a> ReadoutSimulator<'a> {
    /// Simulator using the parameter bundle's traps and `n_par`.
    pub fn new(params: &'a CteParameters) -> Self {
        Self::with_traps(&params.traps, params.n_par)
    }

    /// Simulator for explicit traps and clock count.
    pub fn with_traps(traps: &'a TrapCharacterization, n_par: u32) -> Self {
        Self {
            traps,
            n_par,
            algorithm: ReadoutAlgorithm::default(),
        }
    }

    /// Selects the capture/release ordering.
    pub fn algorithm(mut self, algorithm: ReadoutAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Number of clocking passes per readout.
    pub fn n_par(&self) -> u32 {
        self.n_par
    }

    /// One clocking pass over `pixels`.
    #[inline]
    pub fn simulate_pixel_readout(&self, pixels: &mut [f64], density: &[f32]) {
        self.algorithm
            .simulate_pixel_readout(pixels, density, self.traps, self.n_par);
    }

    /// Full readout: `n_par` clocking passes over `pixels`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SizeMismatch`] if `density` and `pixels` differ in
    /// length.
    pub fn simulate_column_readout(&self, pixels: &mut [f64], density: &[f32]) -> Result<()> {
        if pixels.len() != density.len() {
            return Err(Error::size_mismatch(format!(
                "column has {} rows, trap density has {}",
                pixels.len(),
                density.len()
            )));
        }
        for _ in 0..self.n_par {
            self.simulate_pixel_readout(pixels, density);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use cte_core::ColumnScales;

    fn single_trap() -> TrapCharacterization {
        TrapCharacterization {
            cte_len: 3,
            qlevq: vec![5.0],
            dpdew: vec![1.0],
            rprof: vec![0.2, 0.2, 0.2],
            cprof: vec![0.1, 0.1, 0.1],
        }
    }

    fn three_traps() -> TrapCharacterization {
        TrapCharacterization {
            cte_len: 4,
            qlevq: vec![5.0, 50.0, 500.0],
            dpdew: vec![0.5, 0.4, 0.3],
            rprof: vec![
                0.4, 0.3, 0.2, 0.1, //
                0.5, 0.3, 0.1, 0.1, //
                0.6, 0.2, 0.1, 0.1,
            ],
            cprof: vec![
                0.3, 0.2, 0.1, 0.05, //
                0.3, 0.1, 0.05, 0.0, //
                0.2, 0.1, 0.0, 0.0,
            ],
        }
    }

    #[test]
    fn test_zero_column_stays_zero() {
        let traps = three_traps();
        let mut column = vec![0.0; 64];
        let density = vec![1.0f32; 64];
        ReadoutSimulator::with_traps(&traps, 7)
            .simulate_column_readout(&mut column, &density)
            .unwrap();
        assert!(column.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_single_trap_fixed_scenario() {
        let traps = single_trap();
        let density = vec![1.0f32; 10];
        let mut column = vec![0.0, 0.0, 20.0, 0.0, 8.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        ReadoutSimulator::with_traps(&traps, 1)
            .simulate_column_readout(&mut column, &density)
            .unwrap();

        // Row 2 captures 1.0. Row 3 releases rprof[0]. Row 4 sits inside the
        // trail and above threshold: it releases rprof[1] + cprof[1] and
        // captures again. Rows 5..=7 drain the new trail.
        let expected = [0.0, 0.0, 19.0, 0.2, 8.0 + (0.2 + 0.1 - 1.0), 0.2, 0.2, 0.2, 0.0, 0.0];
        for (got, want) in column.iter().zip(expected) {
            assert_relative_eq!(*got, want, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_below_min_charge_ignored() {
        // Column peak is 8 < MIN_TRAP_CHARGE, so the max is 10 and only the
        // first trap engages.
        let traps = TrapCharacterization {
            cte_len: 1,
            qlevq: vec![6.0, 9.5, 11.0],
            dpdew: vec![1.0, 1.0, 1.0],
            rprof: vec![1.0, 1.0, 1.0],
            cprof: vec![0.0, 0.0, 0.0],
        };
        assert_eq!(max_charge_trap(&traps.qlevq, &[8.0, 0.0]), Some(1));
        assert_eq!(max_charge_trap(&traps.qlevq, &[12.0]), Some(2));
        assert_eq!(max_charge_trap(&[20.0], &[12.0]), None);

        let mut column = vec![8.0, 0.0, 0.0];
        simulate_pixel_readout_v1_2(&mut column, &[1.0; 3], &traps, 1);
        // trap 1 (9.5) is eligible by the 10.0 floor but 8.0 never reaches it;
        // trap 0 captures 1.0 and releases it into row 1.
        assert_eq!(column, vec![7.0, 1.0, 0.0]);
    }

    #[test]
    fn test_charge_conserved_with_full_release() {
        let traps = TrapCharacterization {
            cte_len: 4,
            qlevq: vec![5.0],
            dpdew: vec![2.0],
            rprof: vec![0.25, 0.25, 0.25, 0.25],
            cprof: vec![0.0; 4],
        };
        let mut column = vec![0.0; 32];
        column[3] = 200.0;
        let total: f64 = column.iter().sum();
        ReadoutSimulator::with_traps(&traps, 1)
            .simulate_column_readout(&mut column, &vec![1.0; 32])
            .unwrap();
        assert_relative_eq!(column.iter().sum::<f64>(), total, epsilon = 1e-9);
        assert_relative_eq!(column[3], 198.0);
        assert_relative_eq!(column[4], 0.5);
    }

    #[test]
    fn test_density_drop_rescales_trapped_flux() {
        let traps = single_trap();
        let density = vec![1.0f32, 1.0, 0.5, 0.5, 0.5];
        let mut column = vec![20.0, 0.0, 0.0, 0.0, 0.0];
        simulate_pixel_readout_v1_2(&mut column, &density, &traps, 1);
        // trapped 1.0 at row 0, halved when density drops at row 2
        assert_relative_eq!(column[1], 0.2);
        assert_relative_eq!(column[2], 0.1);
        assert_relative_eq!(column[3], 0.1);
        assert_relative_eq!(column[4], 0.0);
    }

    #[test]
    fn test_capture_scales_with_n_par() {
        let traps = single_trap();
        let mut column = vec![20.0, 0.0, 0.0, 0.0];
        simulate_pixel_readout_v1_2(&mut column, &[1.0; 4], &traps, 4);
        assert_relative_eq!(column[0], 19.75);
        assert_relative_eq!(column[1], 0.05);
    }

    #[test]
    fn test_column_readout_repeats_n_par() {
        let traps = three_traps();
        let density = vec![0.8f32; 40];
        let mut column: Vec<f64> = (0..40).map(|i| if i % 7 == 0 { 900.0 } else { 20.0 }).collect();
        let mut by_hand = column.clone();

        ReadoutSimulator::with_traps(&traps, 3)
            .simulate_column_readout(&mut column, &density)
            .unwrap();
        for _ in 0..3 {
            simulate_pixel_readout_v1_2(&mut by_hand, &density, &traps, 3);
        }
        assert_eq!(column, by_hand);
    }

    #[test]
    fn test_size_mismatch() {
        let traps = single_trap();
        let mut column = vec![0.0; 4];
        let err = ReadoutSimulator::with_traps(&traps, 1)
            .simulate_column_readout(&mut column, &[1.0; 3])
            .unwrap_err();
        assert!(matches!(err, Error::SizeMismatch(_)));
    }

    #[test]
    fn test_capture_on_last_trail_position_skips_cumulative() {
        // Row 3 captures exactly when the row 0 trail reaches its last
        // position: the trail is closing, so only rprof[2] comes back.
        let traps = single_trap();
        let mut params = CteParameters::new(traps, ColumnScales::uniform(1, 1.0));
        params.n_par = 1;
        let density = vec![1.0f32; 7];
        let mut column = vec![20.0, 0.0, 0.0, 8.0, 0.0, 0.0, 0.0];
        ReadoutSimulator::new(&params)
            .simulate_column_readout(&mut column, &density)
            .unwrap();

        let expected = [19.0, 0.2, 0.2, 8.0 + (0.2 - 1.0), 0.2, 0.2, 0.2];
        for (got, want) in column.iter().zip(expected) {
            assert_relative_eq!(*got, want, epsilon = 1e-12);
        }
        assert_relative_eq!(column[3], 7.2, epsilon = 1e-12);
    }

    #[test]
    fn test_legacy_agrees_on_last_trail_position() {
        let traps = single_trap();
        let density = vec![1.0f32; 7];
        let start = vec![20.0, 0.0, 0.0, 8.0, 0.0, 0.0, 0.0];

        let mut current = start.clone();
        let mut legacy = start;
        simulate_pixel_readout_v1_2(&mut current, &density, &traps, 1);
        simulate_pixel_readout_v1_1(&mut legacy, &density, &traps, 1);
        for (a, b) in current.iter().zip(&legacy) {
            assert_relative_eq!(*a, *b, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_legacy_carries_cumulative_into_new_trail() {
        // Recapture at row 4 while the row 2 trail is still open. The current
        // ordering hands cprof[1] back to row 4; the legacy one keeps it in
        // the trap and spreads it over the following rows.
        let traps = single_trap();
        let density = vec![1.0f32; 10];
        let start = vec![0.0, 0.0, 20.0, 0.0, 8.0, 0.0, 0.0, 0.0, 0.0, 0.0];

        let mut current = start.clone();
        let mut legacy = start;
        ReadoutSimulator::with_traps(&traps, 1)
            .simulate_column_readout(&mut current, &density)
            .unwrap();
        ReadoutSimulator::with_traps(&traps, 1)
            .algorithm(ReadoutAlgorithm::Legacy)
            .simulate_column_readout(&mut legacy, &density)
            .unwrap();

        let want_current = [0.0, 0.0, 19.0, 0.2, 7.3, 0.2, 0.2, 0.2, 0.0, 0.0];
        let want_legacy = [0.0, 0.0, 19.0, 0.2, 7.2, 0.22, 0.22, 0.22, 0.0, 0.0];
        for i in 0..10 {
            assert_relative_eq!(current[i], want_current[i], epsilon = 1e-12);
            assert_relative_eq!(legacy[i], want_legacy[i], epsilon = 1e-12);
        }
    }

    #[test]
    fn test_algorithm_dispatch() {
        let traps = three_traps();
        let density = vec![1.0f32; 16];
        let start: Vec<f64> = (0..16).map(|i| (i * 37 % 600) as f64).collect();

        let mut a = start.clone();
        let mut b = start.clone();
        ReadoutAlgorithm::Legacy.simulate_pixel_readout(&mut a, &density, &traps, 2);
        simulate_pixel_readout_v1_1(&mut b, &density, &traps, 2);
        assert_eq!(a, b);

        let mut a = start.clone();
        let mut b = start;
        ReadoutAlgorithm::default().simulate_pixel_readout(&mut a, &density, &traps, 2);
        simulate_pixel_readout_v1_2(&mut b, &density, &traps, 2);
        assert_eq!(a, b);
    }
}
