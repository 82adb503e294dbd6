//! Pipeline configuration, read from JSON.
//!
//! ```json
//! {
//!   "scale": 30,
//!   "version": "2025_04_08",
//!   "file_template": "2025_04_08_texture_niveis_YEAR",
//!   "folder": "GTSOLO-Workshop",
//!   "region": "bioma_extent",
//!   "cell_units": "degrees",
//!   "inputs": {
//!     "sand": "granulometry/sand_000_030cm.tif",
//!     "silt": "granulometry/silt_000_030cm.tif",
//!     "clay": "granulometry/clay_000_030cm.tif",
//!     "exclusion_mask": "mask/submerged_and_anthropized.tif",
//!     "bioma": "zones/bioma.tif",
//!     "admin": "zones/admin.tif",
//!     "landcover": "lulc/classification_{year}.tif",
//!     "carbon": "soc/prediction_{year}.tif"
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SoilError};
use crate::grid::{Bounds, CellUnits};

/// Placeholder for the year in input path templates.
pub const YEAR_PLACEHOLDER: &str = "{year}";
/// Placeholder for the year in the output file template.
pub const FILE_YEAR_PLACEHOLDER: &str = "YEAR";

/// Region the reduction is restricted to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Region {
    /// Explicit bounds in the grid CRS.
    Bounds(Bounds),
    /// Bounding box of every valid bioma pixel.
    BiomaExtent,
}

/// Input raster locations. `landcover` and `carbon` contain `{year}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputPaths {
    pub sand: PathBuf,
    pub silt: PathBuf,
    pub clay: PathBuf,
    #[serde(default)]
    pub exclusion_mask: Option<PathBuf>,
    pub bioma: PathBuf,
    pub admin: PathBuf,
    pub landcover: String,
    pub carbon: String,
}

impl InputPaths {
    pub fn landcover_for(&self, year: u16) -> PathBuf {
        PathBuf::from(self.landcover.replace(YEAR_PLACEHOLDER, &year.to_string()))
    }

    pub fn carbon_for(&self, year: u16) -> PathBuf {
        PathBuf::from(self.carbon.replace(YEAR_PLACEHOLDER, &year.to_string()))
    }

    fn resolve(&mut self, base: &Path) {
        let join = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        join(&mut self.sand);
        join(&mut self.silt);
        join(&mut self.clay);
        join(&mut self.bioma);
        join(&mut self.admin);
        if let Some(mask) = self.exclusion_mask.as_mut() {
            join(mask);
        }
        for template in [&mut self.landcover, &mut self.carbon] {
            if Path::new(template.as_str()).is_relative() {
                *template = base.join(template.as_str()).to_string_lossy().into_owned();
            }
        }
    }
}

fn default_scale() -> f64 {
    30.0
}

fn default_version() -> String {
    "2025_04_08".into()
}

fn default_file_template() -> String {
    "2025_04_08_texture_niveis_YEAR".into()
}

fn default_folder() -> String {
    "GTSOLO-Workshop".into()
}

fn default_region() -> Region {
    Region::BiomaExtent
}

fn default_max_pixels() -> u64 {
    10_000_000_000_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Reduction scale in metres.
    #[serde(default = "default_scale")]
    pub scale: f64,
    #[serde(default = "default_version")]
    pub version: String,
    /// Output file stem; `YEAR` is replaced by the year.
    #[serde(default = "default_file_template")]
    pub file_template: String,
    /// Sub-directory of the output directory receiving the tables.
    #[serde(default = "default_folder")]
    pub folder: String,
    #[serde(default = "default_region")]
    pub region: Region,
    #[serde(default = "default_max_pixels")]
    pub max_pixels: u64,
    #[serde(default)]
    pub cell_units: CellUnits,
    pub inputs: InputPaths,
    /// Years to process; discovered from the carbon template when absent.
    #[serde(default)]
    pub years: Option<Vec<u16>>,
    /// JSON file replacing the built-in land-cover legend.
    #[serde(default)]
    pub land_cover_legend: Option<PathBuf>,
    /// Administrative-unit names replacing the built-in state table.
    #[serde(default)]
    pub admin_names: Option<BTreeMap<u32, String>>,
}

impl PipelineConfig {
    /// Load and validate a config file. Relative paths resolve against the
    /// file's directory.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| SoilError::io(path, e))?;
        let mut cfg: Self = serde_json::from_str(&text).map_err(|source| SoilError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        cfg.inputs.resolve(base);
        if let Some(legend) = cfg.land_cover_legend.as_mut() {
            if legend.is_relative() {
                *legend = base.join(&*legend);
            }
        }
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.scale.is_finite() && self.scale > 0.0) {
            return Err(SoilError::Config(format!("scale must be positive, got {}", self.scale)));
        }
        if self.max_pixels == 0 {
            return Err(SoilError::Config("max_pixels must be positive".into()));
        }
        if !self.file_template.contains(FILE_YEAR_PLACEHOLDER) {
            return Err(SoilError::Config(format!(
                "file_template {:?} lacks the {FILE_YEAR_PLACEHOLDER} placeholder",
                self.file_template
            )));
        }
        for (name, template) in [("landcover", &self.inputs.landcover), ("carbon", &self.inputs.carbon)] {
            if !template.contains(YEAR_PLACEHOLDER) {
                return Err(SoilError::Config(format!(
                    "{name} path {template:?} lacks the {YEAR_PLACEHOLDER} placeholder"
                )));
            }
        }
        if let Region::Bounds(b) = self.region {
            if !(b.min_x < b.max_x && b.min_y < b.max_y) {
                return Err(SoilError::Config(format!("degenerate bounds {b:?}")));
            }
        }
        Ok(())
    }

    /// Years present on disk: files next to the carbon template whose name
    /// matches it with a four-digit year.
    pub fn discover_years(&self) -> Result<Vec<u16>> {
        let template = Path::new(&self.inputs.carbon);
        let dir = template.parent().unwrap_or_else(|| Path::new("."));
        let name = template
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| SoilError::Config(format!("carbon path {:?} has no file name", self.inputs.carbon)))?;
        let Some((prefix, suffix)) = name.split_once(YEAR_PLACEHOLDER) else {
            return Err(SoilError::Config(format!(
                "carbon file name {name:?} lacks the {YEAR_PLACEHOLDER} placeholder"
            )));
        };

        let mut years = Vec::new();
        for entry in fs::read_dir(dir).map_err(|e| SoilError::io(dir, e))? {
            let entry = entry.map_err(|e| SoilError::io(dir, e))?;
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            let Some(year) = file_name
                .strip_prefix(prefix)
                .and_then(|rest| rest.strip_suffix(suffix))
            else {
                continue;
            };
            if year.len() == 4 && year.bytes().all(|b| b.is_ascii_digit()) {
                if let Ok(y) = year.parse() {
                    years.push(y);
                }
            }
        }
        years.sort_unstable();
        years.dedup();
        Ok(years)
    }
}
