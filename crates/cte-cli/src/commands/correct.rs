//! Correct command
//!
//! Smooths the observed image, inverts the readout on the smoothed copy and
//! applies the resulting trail correction to the observation.

use crate::CorrectArgs;
use anyhow::{Context, Result};
use cte_core::params::scale_fraction;
use cte_ops::correct_image;
#[allow(unused_imports)]
use tracing::{debug, info, trace};

pub fn run(args: CorrectArgs, verbose: u8) -> Result<()> {
    trace!(input = %args.input.display(), params = %args.params.display(), "correct::run");

    let mut params = super::load_params(&args.params)?;
    if let Some(rn_amp) = args.rn_amp {
        params.rn_amp = rn_amp;
    }
    if args.no_rocr {
        params.fix_rocr = false;
    }
    if let (Some(expstart), Some(date0), Some(date1)) = (args.expstart, args.date0, args.date1) {
        params.scale_frac = scale_fraction(expstart, date0, date1)
            .context("Failed to derive scale_frac from exposure date")?;
        info!(scale_frac = params.scale_frac, expstart, "derived trap growth fraction");
    }

    let observed = super::load_image(&args.input, args.geometry)?;

    if verbose > 0 {
        println!(
            "Correcting {} ({}x{}, n_par={}, n_forward={}, rn_amp={})",
            args.input.display(),
            observed.n_rows(),
            observed.n_columns(),
            params.n_par,
            params.n_forward,
            params.rn_amp
        );
    }

    let result = correct_image(&observed, &params).context("CTE correction failed")?;

    super::save_image(&args.output, &result.corrected)?;
    if let Some(trail) = &args.trail {
        super::save_image(trail, &result.trail)?;
    }

    if verbose > 0 {
        println!(
            "Done ({} smoothing passes, residual rms {:.4}).",
            result.smoothing.passes, result.smoothing.rms
        );
    }

    Ok(())
}
