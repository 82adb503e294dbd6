//! Pipeline orchestrator: static layers once, then reduce → join → export
//! per year.
//!
//! Order per year:
//!   1. Read land cover and carbon stock for the year
//!   2. Compose class and mass bands
//!   3. Grouped sums of area and mass
//!   4. Decode and inner-join
//!   5. Write the CSV

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::compose::{self, SoilInputs};
use crate::config::{PipelineConfig, Region};
use crate::error::{Result, SoilError};
use crate::export;
use crate::geotiff::read_geotiff;
use crate::grid::{GeoTransform, Grid, Window};
use crate::join::{self, JoinOutcome};
use crate::legend::Legend;
use crate::texture::TextureClass;
use crate::zonal::{self, Reduction, ZonalBands};

/// Outcome of one processed year.
#[derive(Debug, Clone, Serialize)]
pub struct YearReport {
    pub year: u16,
    pub rows: usize,
    /// Keys with area but no mass, dropped by the join.
    pub area_only: usize,
    /// Keys with mass but no area, dropped by the join.
    pub mass_only: usize,
    pub total_area_ha: f64,
    pub total_mass_t: f64,
    pub path: PathBuf,
}

/// A year that could not be processed.
#[derive(Debug, Clone, Serialize)]
pub struct YearFailure {
    pub year: u16,
    pub error: String,
}

/// Exported and failed years of one run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub reports: Vec<YearReport>,
    pub failed: Vec<YearFailure>,
}

impl RunSummary {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Sampling stride for a reduction at `scale` metres over cells of
/// `native_m` metres.
pub fn stride_for(scale: f64, native_m: f64) -> usize {
    if !(native_m > 0.0) || !scale.is_finite() {
        return 1;
    }
    ((scale / native_m).round() as usize).max(1)
}

/// Year-independent bands plus everything needed to process a year.
pub struct Pipeline {
    config: PipelineConfig,
    legend: Legend,
    width: usize,
    height: usize,
    transform: GeoTransform,
    texture: Vec<Option<TextureClass>>,
    territory: Vec<Option<u64>>,
    area_ha: Vec<f64>,
    window: Window,
    stride: usize,
}

impl Pipeline {
    /// Read the static rasters named in `config` and prepare the pipeline.
    pub fn load(config: PipelineConfig) -> Result<Self> {
        let paths = &config.inputs;
        info!(sand = %paths.sand.display(), "reading static layers");
        let exclusion = match &paths.exclusion_mask {
            Some(p) => Some(read_geotiff(p)?),
            None => None,
        };
        let inputs = SoilInputs {
            sand: read_geotiff(&paths.sand)?,
            silt: read_geotiff(&paths.silt)?,
            clay: read_geotiff(&paths.clay)?,
            exclusion,
            bioma: read_geotiff(&paths.bioma)?,
            admin: read_geotiff(&paths.admin)?,
        };
        Self::from_inputs(config, inputs)
    }

    /// Prepare the pipeline from grids already in memory.
    pub fn from_inputs(config: PipelineConfig, inputs: SoilInputs) -> Result<Self> {
        config.validate()?;
        inputs.check_shapes()?;

        let mut legend = Legend::default();
        if let Some(path) = &config.land_cover_legend {
            legend.load_land_cover(path)?;
        }
        if let Some(names) = &config.admin_names {
            legend.set_admin_names(names.clone());
        }

        let window = match config.region {
            Region::Bounds(b) => inputs.bioma.window_for(&b),
            Region::BiomaExtent => inputs.bioma.valid_extent(),
        };
        if window.is_empty() {
            return Err(SoilError::EmptyRegion);
        }

        let native_m = inputs.sand.transform.cell_size_m(config.cell_units);
        let stride = stride_for(config.scale, native_m);

        let texture = compose::texture_band(&inputs);
        let territory = compose::territory_band(&inputs.bioma, &inputs.admin)?;
        let area_ha = compose::area_band(&inputs.sand, config.cell_units);

        info!(
            width = inputs.sand.width,
            height = inputs.sand.height,
            ?window,
            stride,
            native_m,
            "static layers ready"
        );

        Ok(Self {
            width: inputs.sand.width,
            height: inputs.sand.height,
            transform: inputs.sand.transform,
            config,
            legend,
            texture,
            territory,
            area_ha,
            window,
            stride,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn legend(&self) -> &Legend {
        &self.legend
    }

    pub fn window(&self) -> Window {
        self.window
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Years to process: the configured list, else those found on disk.
    pub fn years(&self) -> Result<Vec<u16>> {
        match &self.config.years {
            Some(years) => {
                let mut years = years.clone();
                years.sort_unstable();
                years.dedup();
                Ok(years)
            }
            None => self.config.discover_years(),
        }
    }

    fn reduction(&self) -> Reduction {
        Reduction {
            window: self.window,
            stride: self.stride,
            max_pixels: self.config.max_pixels,
        }
    }

    /// Reduce and join one year from grids already in memory.
    pub fn reduce_year(&self, year: u16, landcover: &Grid<f32>, carbon: &Grid<f32>) -> Result<JoinOutcome> {
        compose::check_shape("landcover", landcover, self.width, self.height)?;
        compose::check_shape("carbon", carbon, self.width, self.height)?;
        if landcover.transform != self.transform || carbon.transform != self.transform {
            warn!(year, "yearly layer georeferencing differs from the static layers");
        }

        let class = compose::class_band(&self.texture, landcover, carbon)?;
        let mass = compose::mass_band(&self.area_ha, carbon);
        let red = self.reduction();

        let area_sums = zonal::grouped_sum(
            &ZonalBands {
                weight: &self.area_ha,
                class: &class,
                territory: &self.territory,
                width: self.width,
            },
            &red,
        )?;
        let mass_sums = zonal::grouped_sum(
            &ZonalBands {
                weight: &mass,
                class: &class,
                territory: &self.territory,
                width: self.width,
            },
            &red,
        )?;

        let area = join::flatten(&area_sums, year)?;
        let mass = join::flatten(&mass_sums, year)?;
        debug!(year, area_keys = area.len(), mass_keys = mass.len(), "flattened");
        Ok(join::inner_join(&area, &mass))
    }

    /// Read the year's rasters, reduce and join them.
    pub fn run_year(&self, year: u16) -> Result<JoinOutcome> {
        let lc_path = self.config.inputs.landcover_for(year);
        let c_path = self.config.inputs.carbon_for(year);
        debug!(year, landcover = %lc_path.display(), carbon = %c_path.display(), "reading yearly layers");
        let landcover = read_geotiff::<f32>(&lc_path)?;
        let carbon = read_geotiff::<f32>(&c_path)?;
        self.reduce_year(year, &landcover, &carbon)
    }

    /// Destination of a year's table under `output`.
    pub fn output_path(&self, output: &Path, year: u16) -> PathBuf {
        export::output_path(output, &self.config.folder, &self.config.file_template, year)
    }

    /// Write a joined year to its CSV and summarise it.
    pub fn export(&self, output: &Path, year: u16, outcome: &JoinOutcome) -> Result<YearReport> {
        let path = self.output_path(output, year);
        let rows = export::export_year(&path, &outcome.rows, &self.legend)?;
        let report = YearReport {
            year,
            rows,
            area_only: outcome.area_only,
            mass_only: outcome.mass_only,
            total_area_ha: outcome.rows.iter().map(|r| r.area_ha).sum(),
            total_mass_t: outcome.rows.iter().map(|r| r.mass_t).sum(),
            path,
        };
        info!(
            year,
            rows = report.rows,
            area_ha = report.total_area_ha,
            mass_t = report.total_mass_t,
            "exported {}",
            report.path.display()
        );
        Ok(report)
    }

    /// Process and export every year in `years`, in order.
    pub fn run(&self, output: &Path, years: &[u16]) -> RunSummary {
        self.run_each(output, years, |_, _| {})
    }

    /// Like [`Pipeline::run`], calling `on_year` after each exported year.
    ///
    /// Years are independent: a failing year is recorded in the summary and
    /// the remaining years still run.
    pub fn run_each<F>(&self, output: &Path, years: &[u16], mut on_year: F) -> RunSummary
    where
        F: FnMut(&YearReport, &JoinOutcome),
    {
        let mut summary = RunSummary::default();
        for &year in years {
            let result = self
                .run_year(year)
                .and_then(|outcome| Ok((self.export(output, year, &outcome)?, outcome)));
            match result {
                Ok((report, outcome)) => {
                    on_year(&report, &outcome);
                    summary.reports.push(report);
                }
                Err(e) => {
                    error!(year, "{e}");
                    summary.failed.push(YearFailure {
                        year,
                        error: e.to_string(),
                    });
                }
            }
        }
        summary
    }
}
