//! CSV export of joined yearly tables.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{Result, SoilError};
use crate::join::JoinedRow;
use crate::legend::Legend;

/// Exported columns, in order.
pub const HEADER: [&str; 14] = [
    "classe textural int",
    "Classe textural",
    "cobertura int",
    "Cobertura n0",
    "Cobertura n1_1",
    "Cobertura n2",
    "Cobertura n3",
    "Cobertura n4",
    "intervalo de cos",
    "Intervalo de COS",
    "Ano",
    "Unidade Federativa",
    "Área ha",
    "Toneladas de COS",
];

/// One exported line. Field order must match [`HEADER`].
#[derive(Debug, Serialize)]
pub struct CsvRecord {
    #[serde(rename = "classe textural int")]
    pub texture_code: u8,
    #[serde(rename = "Classe textural")]
    pub texture: &'static str,
    #[serde(rename = "cobertura int")]
    pub landcover_code: u8,
    #[serde(rename = "Cobertura n0")]
    pub landcover_n0: String,
    #[serde(rename = "Cobertura n1_1")]
    pub landcover_n1_1: String,
    #[serde(rename = "Cobertura n2")]
    pub landcover_n2: String,
    #[serde(rename = "Cobertura n3")]
    pub landcover_n3: String,
    #[serde(rename = "Cobertura n4")]
    pub landcover_n4: String,
    #[serde(rename = "intervalo de cos")]
    pub carbon_bin: u8,
    #[serde(rename = "Intervalo de COS")]
    pub carbon_label: &'static str,
    #[serde(rename = "Ano")]
    pub year: u16,
    #[serde(rename = "Unidade Federativa")]
    pub territory: String,
    #[serde(rename = "Área ha")]
    pub area_ha: f64,
    #[serde(rename = "Toneladas de COS")]
    pub mass_t: f64,
}

impl CsvRecord {
    pub fn from_row(row: &JoinedRow, legend: &Legend) -> Self {
        let class = row.key.class;
        let levels = legend.land_cover(class.landcover());
        Self {
            texture_code: class.texture().code(),
            texture: class.texture().label(),
            landcover_code: class.landcover(),
            landcover_n0: levels.n0,
            landcover_n1_1: levels.n1_1,
            landcover_n2: levels.n2,
            landcover_n3: levels.n3,
            landcover_n4: levels.n4,
            carbon_bin: class.carbon().value(),
            carbon_label: class.carbon().label(),
            year: row.key.year,
            territory: legend.admin_name(row.key.territory.admin()),
            area_ha: row.area_ha,
            mass_t: row.mass_t,
        }
    }
}

/// Write the header and rows. Returns the number of data rows written.
pub fn write_csv<W: Write>(writer: W, rows: &[JoinedRow], legend: &Legend) -> csv::Result<usize> {
    let mut wtr = csv::WriterBuilder::new().has_headers(false).from_writer(writer);
    wtr.write_record(HEADER)?;
    for row in rows {
        wtr.serialize(CsvRecord::from_row(row, legend))?;
    }
    wtr.flush()?;
    Ok(rows.len())
}

/// `<output>/<folder>/<template with YEAR replaced>.csv`
pub fn output_path(output: &Path, folder: &str, file_template: &str, year: u16) -> PathBuf {
    let name = file_template.replace("YEAR", &year.to_string());
    output.join(folder).join(format!("{name}.csv"))
}

/// Write one year's table to disk, creating the folder if needed.
pub fn export_year(path: &Path, rows: &[JoinedRow], legend: &Legend) -> Result<usize> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| SoilError::io(parent, e))?;
    }
    let file = fs::File::create(path).map_err(|e| SoilError::io(path, e))?;
    write_csv(std::io::BufWriter::new(file), rows, legend).map_err(|source| SoilError::Csv {
        path: path.to_path_buf(),
        source,
    })
}
