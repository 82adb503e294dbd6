/// Texture class raster: classifies sand/silt/clay percentage rasters into
/// the five texture classes and writes a u8 GeoTIFF (0 = no data).
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use soil_core::geotiff::{read_geotiff, write_geotiff_u8};
use soil_core::grid::Grid;
use soil_core::{classify, Fractions, TextureClass};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

const NODATA: u8 = 0;

#[derive(Parser, Debug)]
#[command(name = "texture_map", about = "Classify sand/silt/clay rasters into soil texture classes")]
struct Args {
    #[arg(long)]
    sand: PathBuf,

    #[arg(long)]
    silt: PathBuf,

    #[arg(long)]
    clay: PathBuf,

    /// Exclusion mask: any valid pixel is left unclassified
    #[arg(long)]
    mask: Option<PathBuf>,

    /// Bioma raster: pixels outside every bioma are left unclassified
    #[arg(long)]
    bioma: Option<PathBuf>,

    /// Output GeoTIFF
    #[arg(short, long)]
    output: PathBuf,

    #[arg(short, long)]
    verbose: bool,
}

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("setting default subscriber failed")
}

fn read(path: &PathBuf) -> Result<Grid<f32>> {
    read_geotiff(path).with_context(|| format!("Cannot read {}", path.display()))
}

/// Texture code per pixel, `NODATA` where excluded or a fraction is missing.
fn texture_codes(
    sand: &Grid<f32>,
    silt: &Grid<f32>,
    clay: &Grid<f32>,
    mask: Option<&Grid<f32>>,
    bioma: Option<&Grid<f32>>,
) -> Vec<u8> {
    (0..sand.data.len())
        .map(|i| {
            let excluded = mask.is_some_and(|m| !m.data[i].is_nan());
            let outside = bioma.is_some_and(|b| b.data[i].is_nan());
            let f = Fractions::new(sand.data[i], silt.data[i], clay.data[i]);
            if excluded || outside || !f.is_finite() {
                NODATA
            } else {
                classify(f).code()
            }
        })
        .collect()
}

/// Pixel count per class, indexed by class code (index 0 = no data).
fn histogram(codes: &[u8]) -> [usize; 6] {
    let mut counts = [0usize; 6];
    for &c in codes {
        if let Some(slot) = counts.get_mut(c as usize) {
            *slot += 1;
        }
    }
    counts
}

fn main() -> Result<()> {
    let args = Args::parse();
    setup_logging(args.verbose)?;

    let sand = read(&args.sand)?;
    let silt = read(&args.silt)?;
    let clay = read(&args.clay)?;
    let mask = args.mask.as_ref().map(read).transpose()?;
    let bioma = args.bioma.as_ref().map(read).transpose()?;

    let layers = [("silt", Some(&silt)), ("clay", Some(&clay)), ("mask", mask.as_ref()), ("bioma", bioma.as_ref())];
    for (name, grid) in layers {
        if let Some(g) = grid {
            if !g.same_shape(&sand) {
                bail!(
                    "{name} is {}×{}, expected {}×{} like sand",
                    g.width,
                    g.height,
                    sand.width,
                    sand.height
                );
            }
        }
    }

    let codes = texture_codes(&sand, &silt, &clay, mask.as_ref(), bioma.as_ref());
    let counts = histogram(&codes);
    for class in TextureClass::ALL {
        info!(code = class.code(), pixels = counts[class.code() as usize], "{}", class.label());
    }
    info!(pixels = counts[NODATA as usize], "no data");

    write_geotiff_u8(&args.output, &codes, sand.width, sand.height, &sand.transform, Some(NODATA))
        .with_context(|| format!("Write failed: {}", args.output.display()))?;
    info!("wrote {}", args.output.display());
    Ok(())
}
