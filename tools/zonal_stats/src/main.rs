/// Zonal soil statistics: area and carbon stock per texture class, land
/// cover, carbon interval and administrative unit, one CSV per year.
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::Serialize;
use soil_core::config::PipelineConfig;
use soil_core::export::CsvRecord;
use soil_core::grid::Window;
use soil_core::join::JoinedRow;
use soil_core::legend::Legend;
use soil_core::pipeline::{Pipeline, RunSummary, YearFailure, YearReport};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

// ── CLI ──────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "zonal_stats",
    about = "Area and soil carbon stock by texture, land cover, carbon interval and territory"
)]
struct Args {
    /// Pipeline configuration (JSON)
    #[arg(short, long)]
    config: PathBuf,

    /// Output root directory (created if absent)
    #[arg(short, long, default_value = "data/exports")]
    output: PathBuf,

    /// Process only this year (repeatable)
    #[arg(long = "year")]
    years: Vec<u16>,

    /// Reduction scale in metres, overriding the config
    #[arg(long)]
    scale: Option<f64>,

    /// Maximum number of sampled pixels per reduction, overriding the config
    #[arg(long)]
    max_pixels: Option<u64>,

    /// Print the first N rows of each year's table
    #[arg(long, default_value = "0")]
    preview: usize,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

// ── Output manifest ──────────────────────────────────────────────────────────

#[derive(Serialize)]
struct Manifest {
    version: String,
    scale: f64,
    stride: usize,
    window: Window,
    years: Vec<YearReport>,
    failed: Vec<YearFailure>,
}

impl Manifest {
    fn new(pipeline: &Pipeline, summary: RunSummary) -> Self {
        let cfg = pipeline.config();
        Self {
            version: cfg.version.clone(),
            scale: cfg.scale,
            stride: pipeline.stride(),
            window: pipeline.window(),
            years: summary.reports,
            failed: summary.failed,
        }
    }

    /// Error listing the failed years, if any.
    fn check(&self) -> Result<()> {
        if self.failed.is_empty() {
            return Ok(());
        }
        let years: Vec<String> = self.failed.iter().map(|f| f.year.to_string()).collect();
        bail!("{} year(s) failed: {}", self.failed.len(), years.join(", "))
    }
}

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("setting default subscriber failed")
}

/// Keep the available years named by `wanted`; all of them when `wanted` is empty.
fn select_years(available: &[u16], wanted: &[u16]) -> (Vec<u16>, Vec<u16>) {
    if wanted.is_empty() {
        return (available.to_vec(), Vec::new());
    }
    let mut selected: Vec<u16> = available.iter().copied().filter(|y| wanted.contains(y)).collect();
    selected.dedup();
    let mut missing: Vec<u16> = wanted.iter().copied().filter(|y| !available.contains(y)).collect();
    missing.sort_unstable();
    missing.dedup();
    (selected, missing)
}

fn preview_lines(rows: &[JoinedRow], legend: &Legend, n: usize) -> Vec<String> {
    rows.iter()
        .take(n)
        .map(|row| {
            let r = CsvRecord::from_row(row, legend);
            format!(
                "{} | {} | {} | {} | {} ({}) | {:.2} ha | {:.2} t",
                r.texture,
                r.landcover_n4,
                r.carbon_label,
                r.year,
                r.territory,
                legend.bioma_name(row.key.territory.bioma()),
                r.area_ha,
                r.mass_t
            )
        })
        .collect()
}

// ── Main ──────────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let args = Args::parse();
    setup_logging(args.verbose)?;

    let mut cfg = PipelineConfig::from_file(&args.config)
        .with_context(|| format!("Cannot load {}", args.config.display()))?;
    if let Some(scale) = args.scale {
        cfg.scale = scale;
    }
    if let Some(max_pixels) = args.max_pixels {
        cfg.max_pixels = max_pixels;
    }
    cfg.validate().context("Invalid configuration")?;

    let pipeline = Pipeline::load(cfg).context("Failed to prepare static layers")?;

    let available = pipeline.years().context("Failed to list years")?;
    let (years, missing) = select_years(&available, &args.years);
    for year in &missing {
        warn!(year, "requested year has no input rasters, skipping");
    }
    if years.is_empty() {
        bail!("no years to process (available: {available:?})");
    }
    info!(?years, "processing");

    let summary = pipeline.run_each(&args.output, &years, |report, outcome| {
        if report.area_only > 0 || report.mass_only > 0 {
            info!(
                year = report.year,
                area_only = report.area_only,
                mass_only = report.mass_only,
                "unmatched keys dropped"
            );
        }
        for line in preview_lines(&outcome.rows, pipeline.legend(), args.preview) {
            println!("{line}");
        }
    });

    let manifest = Manifest::new(&pipeline, summary);
    let manifest_path = args.output.join(&pipeline.config().folder).join("manifest.json");
    write_manifest(&manifest_path, &manifest)?;

    info!(
        years = manifest.years.len(),
        failed = manifest.failed.len(),
        rows = manifest.years.iter().map(|r| r.rows).sum::<usize>(),
        "done, manifest at {}",
        manifest_path.display()
    );
    manifest.check()
}

fn write_manifest(path: &Path, manifest: &Manifest) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(manifest)?)
        .with_context(|| format!("Write failed: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use soil_core::join::JoinKey;
    use soil_core::{CarbonBin, ClassKey, TerritoryKey, TextureClass};

    #[test]
    fn all_years_without_filter() {
        let (sel, missing) = select_years(&[2020, 2021, 2022], &[]);
        assert_eq!(sel, vec![2020, 2021, 2022]);
        assert!(missing.is_empty());
    }

    #[test]
    fn filter_keeps_order_and_reports_missing() {
        let (sel, missing) = select_years(&[2020, 2021, 2022], &[2022, 1990, 2020, 2022]);
        assert_eq!(sel, vec![2020, 2022]);
        assert_eq!(missing, vec![1990]);
    }

    fn manifest(failed: Vec<YearFailure>) -> Manifest {
        Manifest {
            version: "test".into(),
            scale: 30.0,
            stride: 1,
            window: Window::full(3, 2),
            years: Vec::new(),
            failed,
        }
    }

    #[test]
    fn failed_years_make_the_run_fail() {
        assert!(manifest(Vec::new()).check().is_ok());

        let m = manifest(vec![YearFailure {
            year: 2019,
            error: "land-cover code 75 outside 0..=69".into(),
        }]);
        let err = m.check().unwrap_err().to_string();
        assert!(err.contains("2019"), "{err}");

        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(json["failed"][0]["year"], 2019);
    }

    #[test]
    fn preview_is_truncated() {
        let row = JoinedRow {
            key: JoinKey {
                class: ClassKey::new(39, TextureClass::Clayey, CarbonBin::new(4).unwrap()).unwrap(),
                territory: TerritoryKey::new(3, 52).unwrap(),
                year: 2022,
            },
            area_ha: 1234.5,
            mass_t: 61725.0,
        };
        let lines = preview_lines(&[row, row, row], &Legend::default(), 2);
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            "Argilosa | Soja | 5. 40 até 50 ton/ha | 2022 | Goiás (Cerrado) | 1234.50 ha | 61725.00 t"
        );
    }
}
