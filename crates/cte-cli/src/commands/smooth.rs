//! Smooth command
//!
//! Runs only the read-noise smoother.

use crate::SmoothArgs;
use anyhow::{Context, Result};
use cte_ops::cte_smooth_image_with_report;
#[allow(unused_imports)]
use tracing::{debug, info, trace};

pub fn run(args: SmoothArgs, verbose: u8) -> Result<()> {
    trace!(input = %args.input.display(), rn_amp = args.rn_amp, "smooth::run");

    let image = super::load_image(&args.input, args.geometry)?;
    let (smoothed, report) =
        cte_smooth_image_with_report(&image, args.rn_amp).context("Smoothing failed")?;
    super::save_image(&args.output, &smoothed)?;

    info!(
        passes = report.passes,
        rms = report.rms,
        converged = report.converged,
        "smoothing finished"
    );
    if verbose > 0 {
        println!(
            "Smoothed {} in {} passes (rms {:.4}{})",
            args.input.display(),
            report.passes,
            report.rms,
            if report.converged { "" } else { ", pass limit reached" }
        );
    }

    Ok(())
}
