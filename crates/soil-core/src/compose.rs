//! Per-pixel band composition.
//!
//! Turns co-registered input grids into the three bands a grouped reduction
//! consumes: a weight band, a class-code band and a territory-code band.
//! Missing data is carried as `None` (codes) or NaN (weights); a pixel only
//! contributes to a reduction when all three bands are present.

#[cfg(feature = "threading")]
use rayon::prelude::*;

use crate::carbon::CarbonBin;
use crate::codes::{ClassKey, TerritoryKey};
use crate::error::{Result, SoilError};
use crate::grid::{CellUnits, Grid, Sample};
use crate::texture::{classify, Fractions, TextureClass};

/// Static inputs shared by every year.
pub struct SoilInputs {
    pub sand: Grid<f32>,
    pub silt: Grid<f32>,
    pub clay: Grid<f32>,
    /// Water / built-up mask: any valid pixel here is excluded.
    pub exclusion: Option<Grid<f32>>,
    pub bioma: Grid<f64>,
    pub admin: Grid<f64>,
}

impl SoilInputs {
    /// Check every layer against the sand grid's shape.
    pub fn check_shapes(&self) -> Result<()> {
        let (w, h) = (self.sand.width, self.sand.height);
        check_shape("silt", &self.silt, w, h)?;
        check_shape("clay", &self.clay, w, h)?;
        check_shape("bioma", &self.bioma, w, h)?;
        check_shape("admin", &self.admin, w, h)?;
        if let Some(mask) = &self.exclusion {
            check_shape("exclusion mask", mask, w, h)?;
        }
        Ok(())
    }
}

pub(crate) fn check_shape<T>(layer: &str, grid: &Grid<T>, width: usize, height: usize) -> Result<()> {
    if grid.width != width || grid.height != height {
        return Err(SoilError::SizeMismatch {
            layer: layer.to_string(),
            width,
            height,
            actual_width: grid.width,
            actual_height: grid.height,
        });
    }
    Ok(())
}

/// Map rows in parallel when threading is enabled, in order either way.
fn map_rows<T, F>(height: usize, f: F) -> Result<Vec<T>>
where
    T: Send,
    F: Fn(usize) -> Result<Vec<T>> + Sync + Send,
{
    #[cfg(feature = "threading")]
    let rows: Vec<Result<Vec<T>>> = (0..height).into_par_iter().map(f).collect();
    #[cfg(not(feature = "threading"))]
    let rows: Vec<Result<Vec<T>>> = (0..height).map(f).collect();

    let mut out = Vec::new();
    for row in rows {
        out.extend(row?);
    }
    Ok(out)
}

/// Soil is present where the pixel lies inside a bioma and outside the
/// exclusion mask.
pub fn soil_presence(inputs: &SoilInputs) -> Vec<bool> {
    let n = inputs.bioma.data.len();
    (0..n)
        .map(|i| {
            let in_bioma = !inputs.bioma.data[i].is_nan();
            let excluded = inputs
                .exclusion
                .as_ref()
                .is_some_and(|m| !m.data[i].is_nan());
            in_bioma && !excluded
        })
        .collect()
}

/// Texture class per pixel; `None` where soil is absent or a fraction is missing.
pub fn texture_band(inputs: &SoilInputs) -> Vec<Option<TextureClass>> {
    let present = soil_presence(inputs);
    present
        .iter()
        .enumerate()
        .map(|(i, &soil)| {
            let f = Fractions::new(inputs.sand.data[i], inputs.silt.data[i], inputs.clay.data[i]);
            (soil && f.is_finite()).then(|| classify(f))
        })
        .collect()
}

/// Convert a raster sample to a non-negative integer code.
fn integer_code<T: Sample>(band: &'static str, grid: &Grid<T>, row: usize, col: usize) -> Result<Option<u64>> {
    let v = grid.get(row, col).to_f64();
    if v.is_nan() {
        return Ok(None);
    }
    if v < 0.0 || v.fract() != 0.0 || !v.is_finite() {
        return Err(SoilError::InvalidCode {
            band,
            value: v,
            row,
            col,
        });
    }
    Ok(Some(v as u64))
}

/// Territory code per pixel; `None` outside either boundary layer.
pub fn territory_band(bioma: &Grid<f64>, admin: &Grid<f64>) -> Result<Vec<Option<u64>>> {
    check_shape("admin", admin, bioma.width, bioma.height)?;
    map_rows(bioma.height, |row| {
        (0..bioma.width)
            .map(|col| {
                let b = integer_code("bioma", bioma, row, col)?;
                let a = integer_code("admin", admin, row, col)?;
                match (b, a) {
                    (Some(b), Some(a)) => Ok(Some(TerritoryKey::new(b, a)?.encode())),
                    _ => Ok(None),
                }
            })
            .collect()
    })
}

/// Pixel area in hectares for every pixel of the grid.
pub fn area_band<T: Sample>(grid: &Grid<T>, units: CellUnits) -> Vec<f64> {
    (0..grid.height)
        .flat_map(|row| {
            let ha = grid.transform.cell_area_m2(row, units) / 1e4;
            std::iter::repeat_n(ha, grid.width)
        })
        .collect()
}

/// Class code per pixel for one year.
///
/// Fails on the first land-cover value outside the packable range.
pub fn class_band(
    texture: &[Option<TextureClass>],
    landcover: &Grid<f32>,
    carbon: &Grid<f32>,
) -> Result<Vec<Option<u32>>> {
    check_shape("carbon", carbon, landcover.width, landcover.height)?;
    if texture.len() != landcover.data.len() {
        return Err(SoilError::SizeMismatch {
            layer: "landcover".into(),
            width: texture.len(),
            height: 1,
            actual_width: landcover.data.len(),
            actual_height: 1,
        });
    }
    let width = landcover.width;
    map_rows(landcover.height, |row| {
        (0..width)
            .map(|col| {
                let i = row * width + col;
                let Some(tex) = texture[i] else {
                    return Ok(None);
                };
                let stock = carbon.data[i];
                if stock.is_nan() {
                    return Ok(None);
                }
                let Some(lc) = integer_code("landcover", landcover, row, col)? else {
                    return Ok(None);
                };
                let lc = u32::try_from(lc).map_err(|_| SoilError::LandCoverOutOfRange(lc))?;
                let key = ClassKey::new(lc, tex, CarbonBin::from_stock(stock))?;
                Ok(Some(key.encode()))
            })
            .collect()
    })
}

/// Carbon mass per pixel in tonnes: area (ha) × stock (t/ha). NaN where stock is missing.
pub fn mass_band(area_ha: &[f64], carbon: &Grid<f32>) -> Vec<f64> {
    area_ha
        .iter()
        .zip(&carbon.data)
        .map(|(&a, &c)| a * c as f64)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::GeoTransform;
    use approx::assert_relative_eq;

    fn grid32(data: Vec<f32>, w: usize, h: usize) -> Grid<f32> {
        Grid::from_vec(data, w, h, GeoTransform::new(0.0, 60.0, 30.0, -30.0))
    }

    fn grid64(data: Vec<f64>, w: usize, h: usize) -> Grid<f64> {
        Grid::from_vec(data, w, h, GeoTransform::new(0.0, 60.0, 30.0, -30.0))
    }

    fn inputs() -> SoilInputs {
        let nan = f32::NAN;
        SoilInputs {
            sand: grid32(vec![10.0, 14.0, 90.0, 40.0], 2, 2),
            silt: grid32(vec![20.0, 50.0, 10.0, 40.0], 2, 2),
            clay: grid32(vec![70.0, 34.0, 0.0, 20.0], 2, 2),
            exclusion: Some(grid32(vec![nan, nan, nan, 1.0], 2, 2)),
            bioma: grid64(vec![4.0, 4.0, f64::NAN, 4.0], 2, 2),
            admin: grid64(vec![41.0, 41.0, 41.0, 42.0], 2, 2),
        }
    }

    #[test]
    fn texture_respects_soil_mask() {
        let tex = texture_band(&inputs());
        assert_eq!(
            tex,
            vec![Some(TextureClass::VeryClayey), Some(TextureClass::Silty), None, None]
        );
    }

    #[test]
    fn territory_codes_and_gaps() {
        let inp = inputs();
        let terr = territory_band(&inp.bioma, &inp.admin).unwrap();
        assert_eq!(terr, vec![Some(414), Some(414), None, Some(424)]);
    }

    #[test]
    fn negative_territory_code_is_rejected() {
        let bioma = grid64(vec![1.0, -1.0], 2, 1);
        let admin = grid64(vec![5.0, 5.0], 2, 1);
        assert!(matches!(
            territory_band(&bioma, &admin),
            Err(SoilError::InvalidCode { band: "bioma", col: 1, .. })
        ));
    }

    #[test]
    fn class_band_packs_and_masks() {
        let tex = texture_band(&inputs());
        let landcover = grid32(vec![3.0, 15.0, 3.0, 3.0], 2, 2);
        let carbon = grid32(vec![55.0, f32::NAN, 20.0, 20.0], 2, 2);
        let classes = class_band(&tex, &landcover, &carbon).unwrap();
        assert_eq!(classes, vec![Some((3 + 100) * 10 + 5), None, None, None]);
    }

    #[test]
    fn class_band_fails_on_unpackable_landcover() {
        let tex = vec![Some(TextureClass::Medium)];
        let landcover = grid32(vec![75.0], 1, 1);
        let carbon = grid32(vec![10.0], 1, 1);
        assert!(matches!(
            class_band(&tex, &landcover, &carbon),
            Err(SoilError::LandCoverOutOfRange(75))
        ));

        let huge = grid32(vec![5.0e9], 1, 1);
        assert!(matches!(
            class_band(&tex, &huge, &carbon),
            Err(SoilError::LandCoverOutOfRange(5_000_000_000))
        ));
    }

    #[test]
    fn area_and_mass() {
        let carbon = grid32(vec![10.0, 20.0, f32::NAN, 0.0], 2, 2);
        let area = area_band(&carbon, CellUnits::Metres);
        assert_eq!(area.len(), 4);
        assert_relative_eq!(area[0], 0.09);
        let mass = mass_band(&area, &carbon);
        assert_relative_eq!(mass[1], 1.8, epsilon = 1e-9);
        assert!(mass[2].is_nan());
        assert_eq!(mass[3], 0.0);
    }

    #[test]
    fn mismatched_layers_are_reported() {
        let mut inp = inputs();
        inp.clay = grid32(vec![1.0; 6], 3, 2);
        match inp.check_shapes() {
            Err(SoilError::SizeMismatch { layer, actual_width, .. }) => {
                assert_eq!(layer, "clay");
                assert_eq!(actual_width, 3);
            }
            other => panic!("expected size mismatch, got {other:?}"),
        }
    }
}
