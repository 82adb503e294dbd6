use std::path::PathBuf;

use thiserror::Error;

use crate::carbon::MAX_BIN;
use crate::codes::{BIOMA_MAX, LANDCOVER_MAX};

/// Errors raised by the soil statistics pipeline.
#[derive(Debug, Error)]
pub enum SoilError {
    #[error("land-cover code {0} outside 0..={max}", max = LANDCOVER_MAX)]
    LandCoverOutOfRange(u64),

    #[error("texture class {0} outside 1..=5")]
    TextureOutOfRange(u32),

    #[error("carbon bin {0} outside 0..={max}", max = MAX_BIN)]
    CarbonBinOutOfRange(u32),

    #[error("bioma code {0} outside 0..={max}", max = BIOMA_MAX)]
    BiomaOutOfRange(u64),

    #[error("administrative unit code {0} does not fit in 32 bits")]
    AdminOutOfRange(u64),

    #[error("invalid {band} value {value} at pixel ({row}, {col})")]
    InvalidCode {
        band: &'static str,
        value: f64,
        row: usize,
        col: usize,
    },

    #[error("raster size mismatch: {layer} is {actual_width}x{actual_height}, expected {width}x{height}")]
    SizeMismatch {
        layer: String,
        width: usize,
        height: usize,
        actual_width: usize,
        actual_height: usize,
    },

    #[error("TIFF error in {path}: {source}")]
    Tiff {
        path: PathBuf,
        #[source]
        source: tiff::TiffError,
    },

    #[error("unsupported sample type in {0}")]
    UnsupportedSampleType(PathBuf),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("JSON error in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("target region does not cover any pixel")]
    EmptyRegion,

    #[error("reduction over {pixels} pixels exceeds max_pixels = {max_pixels}")]
    TooManyPixels { pixels: u64, max_pixels: u64 },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl SoilError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }
}

pub type Result<T> = std::result::Result<T, SoilError>;
