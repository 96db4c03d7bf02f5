//! Simulate command
//!
//! Adds CTE trails to a clean image with the forward model.

use crate::SimulateArgs;
use anyhow::{Context, Result};
use cte_ops::{forward_model, populate_trap_pixel_map};
#[allow(unused_imports)]
use tracing::{debug, info, trace};

pub fn run(args: SimulateArgs, verbose: u8) -> Result<()> {
    trace!(input = %args.input.display(), params = %args.params.display(), "simulate::run");

    let params = super::load_params(&args.params)?;
    let clean = super::load_image(&args.input, args.geometry)?;

    let trap_map = match &args.trap_map {
        Some(path) => super::load_image(path, args.geometry)?,
        None => populate_trap_pixel_map(args.geometry.rows, args.geometry.columns, &params)
            .context("Failed to build trap pixel map")?,
    };

    if verbose > 0 {
        println!("Simulating readout of {} (n_par={})", args.input.display(), params.n_par);
    }

    let trailed = forward_model(&clean, &trap_map, &params).context("Forward model failed")?;
    super::save_image(&args.output, &trailed)?;

    if verbose > 0 {
        println!("Done.");
    }

    Ok(())
}
