//! Readout-cosmic-ray over-subtraction detection.
//!
//! A cosmic ray that hits during readout has a shorter trail than the model
//! assumes, so the inversion subtracts too much charge behind it and leaves a
//! negative hole. When such a hole is found, the trap density of the rows
//! leading up to it is reduced and the caller reruns the inversion.

/// Rows before this index are never tested.
pub const FIRST_TESTED_ROW: usize = 10;

/// Rows at the end of the column that are never tested.
pub const TRAILING_ROWS: usize = 2;

/// Number of preceding rows searched for the excess peak.
pub const PEAK_SEARCH_ROWS: usize = 10;

/// Factor applied to the trap density of flagged rows.
pub const TRAP_DOWNSCALE: f32 = 0.75;

/// Pair sum below which two adjacent rows are flagged.
const PAIR_LIMIT: f64 = -12.0;

/// Triple sum below which three adjacent rows are flagged.
const TRIPLE_LIMIT: f64 = -15.0;

/// Looks for over-subtraction in `model` and downscales `traps` behind it.
///
/// Rows `i` in `[10, n_rows - 2)` are flagged when any of these holds:
///
/// - `model[i]` and `model[i] - observed[i]` are both below `thresh`
/// - the model sum of rows `i, i+1` and its excess over observed are both
///   below -12
/// - the same for rows `i, i+1, i+2` against -15
///
/// For a flagged row, the row with the largest `model - observed` among
/// `i-10..=i` (earliest wins ties) is located and the trap density of every
/// row from there through `i` is multiplied by 0.75.
///
/// Returns `true` if any row was flagged.
///
/// # Panics
///
/// Panics if `traps` or `observed` is not the same length as `model`.
pub fn correct_cr_over_subtraction(
    traps: &mut [f32],
    model: &[f64],
    observed: &[f64],
    thresh: f64,
) -> bool {
    let n_rows = model.len();
    assert!(
        traps.len() == n_rows && observed.len() == n_rows,
        "column length mismatch: model {n_rows}, observed {}, traps {}",
        observed.len(),
        traps.len()
    );
    let end = n_rows.saturating_sub(TRAILING_ROWS);
    let excess = |k: usize| model[k] - observed[k];
    let mut redo = false;

    for i in FIRST_TESTED_ROW..end {
        let single = model[i] < thresh && excess(i) < thresh;

        let pair_model = model[i] + model[i + 1];
        let pair = pair_model < PAIR_LIMIT
            && pair_model - observed[i] - observed[i + 1] < PAIR_LIMIT;

        let triple_model = model[i] + model[i + 1] + model[i + 2];
        let triple = triple_model < TRIPLE_LIMIT
            && triple_model - observed[i] - observed[i + 1] - observed[i + 2] < TRIPLE_LIMIT;

        if !(single || pair || triple) {
            continue;
        }
        redo = true;

        let mut peak = i;
        for k in i - PEAK_SEARCH_ROWS..i {
            if excess(k) > excess(peak) {
                peak = k;
            }
        }
        for t in &mut traps[peak..=i] {
            *t *= TRAP_DOWNSCALE;
        }
    }

    redo
}

#[cfg(test)]
mod tests {
    use super::*;

    const THRESH: f64 = -10.0;

    fn flat(n: usize) -> (Vec<f32>, Vec<f64>, Vec<f64>) {
        (vec![1.0; n], vec![0.0; n], vec![0.0; n])
    }

    #[test]
    fn test_clean_column_not_flagged() {
        let (mut traps, model, observed) = flat(40);
        assert!(!correct_cr_over_subtraction(&mut traps, &model, &observed, THRESH));
        assert!(traps.iter().all(|&t| t == 1.0));
    }

    #[test]
    fn test_last_two_rows_never_flagged() {
        for row in [38, 39] {
            let (mut traps, mut model, observed) = flat(40);
            model[row] = -11.0;
            let flagged = correct_cr_over_subtraction(&mut traps, &model, &observed, THRESH);
            assert!(!flagged, "row {row}");
            assert!(traps.iter().all(|&t| t == 1.0));
        }
    }

    #[test]
    fn test_first_rows_never_flagged() {
        for row in 0..FIRST_TESTED_ROW {
            let (mut traps, mut model, observed) = flat(40);
            model[row] = -11.0;
            let flagged = correct_cr_over_subtraction(&mut traps, &model, &observed, THRESH);
            assert!(!flagged, "row {row}");
        }
    }

    #[test]
    fn test_boundary_rows_flagged() {
        // row 37 is n_rows - 3, the last row with a full triple lookahead
        for row in [10, 37] {
            let (mut traps, mut model, observed) = flat(40);
            model[row] = -11.0;
            let flagged = correct_cr_over_subtraction(&mut traps, &model, &observed, THRESH);
            assert!(flagged, "row {row}");
            assert_eq!(traps[row], TRAP_DOWNSCALE, "row {row}");
        }
    }

    #[test]
    fn test_short_column_has_no_tested_rows() {
        let (mut traps, _, observed) = flat(12);
        let model = vec![-100.0; 12];
        assert!(!correct_cr_over_subtraction(&mut traps, &model, &observed, THRESH));
        let (mut traps, _, observed) = flat(13);
        let model = vec![-100.0; 13];
        assert!(correct_cr_over_subtraction(&mut traps, &model, &observed, THRESH));
    }

    #[test]
    fn test_downscale_from_peak() {
        let (mut traps, mut model, observed) = flat(40);
        model[20] = -11.0;
        model[16] = 5.0; // peak excess within the search window
        assert!(correct_cr_over_subtraction(&mut traps, &model, &observed, THRESH));
        for (row, &t) in traps.iter().enumerate() {
            let expected = if (16..=20).contains(&row) { 0.75 } else { 1.0 };
            assert_eq!(t, expected, "row {row}");
        }
    }

    #[test]
    fn test_peak_ties_pick_earliest_row() {
        let (mut traps, mut model, observed) = flat(40);
        model[20] = -11.0;
        assert!(correct_cr_over_subtraction(&mut traps, &model, &observed, THRESH));
        assert!(traps[10..=20].iter().all(|&t| t == 0.75));
        assert_eq!(traps[9], 1.0);
        assert_eq!(traps[21], 1.0);
    }

    #[test]
    fn test_pair_and_triple_rules() {
        // Pair sums to -13 without either row crossing -10.
        let (mut traps, mut model, observed) = flat(40);
        model[20] = -6.5;
        model[21] = -6.5;
        assert!(correct_cr_over_subtraction(&mut traps, &model, &observed, THRESH));

        // Triple sums to -16 while every pair stays at or above -12.
        let (mut traps, mut model, observed) = flat(40);
        model[20] = -5.5;
        model[21] = -5.0;
        model[22] = -5.5;
        assert!(correct_cr_over_subtraction(&mut traps, &model, &observed, THRESH));
        assert_eq!(traps[20], 0.75);
        assert_eq!(traps[21], 1.0);
    }

    #[test]
    fn test_negative_observed_not_flagged() {
        // Model matches a genuinely negative observation.
        let (mut traps, mut model, mut observed) = flat(40);
        model[20] = -11.0;
        observed[20] = -11.0;
        assert!(!correct_cr_over_subtraction(&mut traps, &model, &observed, THRESH));
    }

    #[test]
    #[should_panic(expected = "column length mismatch")]
    fn test_short_trap_column_panics() {
        let (_, model, observed) = flat(40);
        let mut traps = vec![1.0f32; 20];
        correct_cr_over_subtraction(&mut traps, &model, &observed, THRESH);
    }

    #[test]
    #[should_panic(expected = "column length mismatch")]
    fn test_short_observed_column_panics() {
        let (mut traps, model, _) = flat(40);
        correct_cr_over_subtraction(&mut traps, &model, &[0.0; 39], THRESH);
    }
}
