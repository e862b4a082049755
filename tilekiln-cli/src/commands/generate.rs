//! Generate command - render a bounding box into an MBTiles archive.

use std::path::PathBuf;

use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tilekiln::pipeline::{
    GenerationPlan, GenerationRequest, GenerationResult, PipelineOrchestrator, TileFailurePolicy,
};
use tilekiln::render::ImageFormat;
use tilekiln::renderer::RasterRendererFactory;

use super::common::{
    format_bytes, remove_overlay_copy, warn_undrawable_layers, RangeArgs, StyleArgs,
};
use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments for the generate command.
#[derive(Debug, Args)]
pub struct GenerateArgs {
    #[command(flatten)]
    pub range: RangeArgs,

    #[command(flatten)]
    pub style: StyleArgs,

    /// Archive name; written as <NAME>.mbtiles
    #[arg(long)]
    pub name: String,

    /// Tile image format: png, jpg or webp
    #[arg(long)]
    pub format: Option<ImageFormat>,

    /// Pixel ratio; 2 renders 512px tiles for 256px logical tiles
    #[arg(long)]
    pub ratio: Option<f32>,

    /// Number of renderer instances
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Directory that relative style resources resolve against
    /// (defaults to the temp directory)
    #[arg(long)]
    pub style_dir: Option<PathBuf>,

    /// Directory containing local .mbtiles and .pmtiles sources
    #[arg(long, default_value = ".")]
    pub source_dir: PathBuf,

    /// Directory the finished archive is moved to
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Stop at the first tile that fails to render
    #[arg(long)]
    pub fail_fast: bool,

    /// Exit successfully even if some tiles failed
    #[arg(long)]
    pub allow_partial: bool,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Mirror log output to stdout
    #[arg(long, short)]
    pub verbose: bool,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Run the generate command.
pub fn run(args: GenerateArgs) -> Result<(), CliError> {
    let runner = CliRunner::new(args.verbose, args.debug)?;
    runner.log_startup("generate");
    let config = runner.config();

    let zooms = args.range.zooms()?;
    let temp_dir = args.style.temp_dir(config);
    let style = args.style.build(config)?;
    warn_undrawable_layers(&style);

    let request = GenerationRequest {
        style,
        source_dir: args.source_dir.clone(),
        bounds: args.range.bounds,
        zooms,
        pixel_ratio: args.ratio.unwrap_or(config.render.pixel_ratio),
        format: args.format.unwrap_or(config.render.format),
        temp_dir: temp_dir.clone(),
        output_dir: args
            .output_dir
            .clone()
            .unwrap_or_else(|| config.output.directory.clone()),
        output_name: args.name.clone(),
    };

    let mut pipeline_config = config.pipeline_config();
    if let Some(concurrency) = args.concurrency {
        pipeline_config = pipeline_config.with_concurrency(concurrency);
    }
    if args.fail_fast {
        pipeline_config = pipeline_config.with_failure_policy(TileFailurePolicy::Abort);
    }

    if !args.json {
        let plan = GenerationPlan::new(request.bounds, request.zooms)?;
        println!("Generating {}.mbtiles", request.output_name);
        println!("  Bounds:      {}", request.bounds);
        println!("  Zoom:        {}-{}", zooms.min, zooms.max);
        println!("  Tiles:       {}", plan.total_tiles());
        println!("  Format:      {}", request.format);
        println!("  Ratio:       {}", request.pixel_ratio);
        println!("  Concurrency: {}", pipeline_config.concurrency);
        println!();
    }

    let style_dir = args.style_dir.clone().unwrap_or_else(|| temp_dir.clone());
    let factory = RasterRendererFactory::new(style_dir, &args.source_dir);

    let shutdown = CancellationToken::new();
    let orchestrator = PipelineOrchestrator::new(pipeline_config).with_shutdown(shutdown.clone());

    let outcome = runner.block_on(async {
        let interrupt = shutdown.clone();
        let watcher = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, cancelling generation");
                interrupt.cancel();
            }
        });
        let outcome = orchestrator.generate(&request, factory).await;
        watcher.abort();
        outcome
    });

    if args.style.overlay.is_some() {
        remove_overlay_copy(&temp_dir);
    }

    let result = outcome?;
    if args.json {
        print_json(&result)?;
    } else {
        print_summary(&result);
    }

    if let Some(message) = result.error_message.clone() {
        return Err(CliError::Move {
            message,
            path: result.file_location,
        });
    }
    if !result.failed_tiles.is_empty() && !args.allow_partial {
        return Err(CliError::PartialOutput {
            failed: result.failed_tiles.len(),
            path: result.file_location,
        });
    }

    Ok(())
}

fn print_summary(result: &GenerationResult) {
    let stats = &result.stats;
    println!("Generation complete");
    println!("  Archive:  {}", result.file_location.display());
    println!("  Size:     {}", format_bytes(result.file_size));
    println!("  Tiles:    {} written", result.number_of_tiles);
    if stats.failed > 0 {
        println!("  Failed:   {}", stats.failed);
        for failed in result.failed_tiles.iter().take(10) {
            println!("    {}: {}", failed.tile, failed.error);
        }
        if result.failed_tiles.len() > 10 {
            println!("    ... and {} more", result.failed_tiles.len() - 10);
        }
    }
    println!("  Elapsed:  {:.1}s", stats.elapsed.as_secs_f64());
}

fn print_json(result: &GenerationResult) -> Result<(), CliError> {
    let text = serde_json::to_string_pretty(result)
        .map_err(|e| CliError::Config(format!("Failed to serialize result: {}", e)))?;
    println!("{}", text);
    Ok(())
}
