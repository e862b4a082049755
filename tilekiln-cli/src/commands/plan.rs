//! Plan command - show the tiles a bounding box covers per zoom level.

use clap::Args;
use serde_json::json;
use tilekiln::pipeline::GenerationPlan;

use super::common::RangeArgs;
use crate::error::CliError;

/// Arguments for the plan command.
#[derive(Debug, Args)]
pub struct PlanArgs {
    #[command(flatten)]
    pub range: RangeArgs,

    /// Print the plan as JSON
    #[arg(long)]
    pub json: bool,
}

/// Run the plan command.
pub fn run(args: PlanArgs) -> Result<(), CliError> {
    let plan = GenerationPlan::new(args.range.bounds, args.range.zooms()?)?;

    if args.json {
        let value = json!({
            "bounds": plan.bounds,
            "zooms": plan.zooms,
            "ranges": plan.ranges,
            "total_tiles": plan.total_tiles(),
        });
        println!("{:#}", value);
        return Ok(());
    }

    println!("Bounds: {}", plan.bounds);
    println!();
    println!("{:>4}  {:>15}  {:>15}  {:>10}", "zoom", "x", "y", "tiles");
    for range in &plan.ranges {
        println!(
            "{:>4}  {:>15}  {:>15}  {:>10}",
            range.zoom,
            format!("{}..={}", range.min_x, range.max_x),
            format!("{}..={}", range.min_y, range.max_y),
            range.count()
        );
    }
    println!();
    println!("Total: {} tiles", plan.total_tiles());

    Ok(())
}
