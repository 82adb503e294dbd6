//! Zonal area and carbon-stock statistics for soil texture × land cover ×
//! carbon bin × territory, computed locally over co-registered GeoTIFFs.

pub mod carbon;
pub mod codes;
pub mod compose;
pub mod config;
pub mod error;
pub mod export;
pub mod geotiff;
pub mod grid;
pub mod join;
pub mod legend;
pub mod pipeline;
pub mod texture;
pub mod zonal;

pub use carbon::CarbonBin;
pub use codes::{ClassKey, TerritoryKey};
pub use error::{Result, SoilError};
pub use texture::{classify, Fractions, TextureClass};
