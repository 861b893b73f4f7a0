//! Map renderer
//!
//! Renders one extent or one Web Mercator tile of a style document to a PNG
//! file through the render dispatcher.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use map_common::{BoundingBox, ImageSize, StyleId, TileCoord};
use render_dispatch::{DispatchConfig, Dispatcher};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "map-renderer")]
#[command(about = "Render a map style to PNG")]
struct Args {
    /// Style document (XML)
    style: PathBuf,

    /// Output PNG file
    #[arg(short, long, default_value = "map.png")]
    output: PathBuf,

    /// Style identifier used as the cache key
    #[arg(long, default_value = "1")]
    style_id: i64,

    /// Extent to render: "minx,miny,maxx,maxy"
    #[arg(long, conflicts_with = "tile")]
    bbox: Option<String>,

    /// Web Mercator tile to render: "z/x/y"
    #[arg(long)]
    tile: Option<String>,

    /// Image width (or tile size)
    #[arg(long, default_value = "256")]
    width: u32,

    /// Image height, defaults to the width
    #[arg(long)]
    height: Option<u32>,

    /// Extra pixels drawn around the image and cropped away
    #[arg(long, default_value = "0")]
    padding: u32,

    /// Dispatcher config file (YAML)
    #[arg(short, long, env = "RENDER_CONFIG")]
    config: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    log_level: String,

    /// Print style cache statistics as JSON when done
    #[arg(long)]
    stats: bool,
}

fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .json()
        .init();

    let config = match &args.config {
        Some(path) => DispatchConfig::from_yaml_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => DispatchConfig::from_env(),
    };

    let document: Arc<str> = std::fs::read_to_string(&args.style)
        .with_context(|| format!("Failed to read style {}", args.style.display()))?
        .into();

    let dispatcher =
        Dispatcher::with_default_engine(config).context("Failed to start render dispatcher")?;
    if !dispatcher.engine_available() {
        warn!("No rendering engine compiled in; output will be the fallback image");
    }

    let style_id = StyleId::new(args.style_id);
    let request = dispatcher.style_request(style_id, Arc::clone(&document));
    let start = Instant::now();

    let image = match (&args.bbox, &args.tile) {
        (Some(bbox), None) => {
            let extent = BoundingBox::from_str_list(bbox).context("Invalid --bbox")?;
            let size = ImageSize::new(args.width, args.height.unwrap_or(args.width));
            info!(style_id = %style_id, ?extent, width = size.width, height = size.height, "Rendering extent");
            dispatcher.render_image(style_id, document, &extent, size, args.padding)
        }
        (None, Some(tile)) => {
            let coord = TileCoord::from_path(tile)
                .ok_or_else(|| anyhow!("Invalid --tile {:?}, expected z/x/y", tile))?;
            if coord.z > dispatcher.max_zoom() {
                warn!(z = coord.z, max_zoom = dispatcher.max_zoom(), "Tile beyond configured max zoom");
            }
            info!(style_id = %style_id, z = coord.z, x = coord.x, y = coord.y, "Rendering tile");
            request.render_tile(coord, args.width)
        }
        _ => bail!("Exactly one of --bbox or --tile is required"),
    }
    .with_context(|| format!("Failed to render style {}", style_id))?;

    let png = image
        .to_png()
        .map_err(|e| anyhow!("PNG encoding failed: {}", e))?;
    std::fs::write(&args.output, &png)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;

    info!(
        output = %args.output.display(),
        width = image.width(),
        height = image.height(),
        bytes = png.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Image written"
    );

    if args.stats {
        if let Some(stats) = dispatcher.cache_stats() {
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
    }

    dispatcher.shutdown();
    Ok(())
}
