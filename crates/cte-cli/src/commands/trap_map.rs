//! Trap-map command

use crate::TrapMapArgs;
use anyhow::{Context, Result};
use cte_ops::populate_trap_pixel_map;
#[allow(unused_imports)]
use tracing::{debug, info, trace};

pub fn run(args: TrapMapArgs, verbose: u8) -> Result<()> {
    trace!(
        params = %args.params.display(),
        rows = args.geometry.rows,
        columns = args.geometry.columns,
        "trap_map::run"
    );

    let params = super::load_params(&args.params)?;
    let map = populate_trap_pixel_map(args.geometry.rows, args.geometry.columns, &params)
        .context("Failed to build trap pixel map")?;
    super::save_image(&args.output, &map)?;

    if verbose > 0 {
        let max = map.data().iter().copied().fold(0.0f32, f32::max);
        println!("Wrote {} (peak density {:.5})", args.output.display(), max);
    }

    Ok(())
}
