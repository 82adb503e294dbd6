//! Single-band GeoTIFF reading and writing on top of the `tiff` crate.
//!
//! Only the georeferencing needed for a north-up grid is handled: the
//! ModelPixelScale and ModelTiepoint tags, plus GDAL's no-data tag. Any
//! integer or float sample type is widened to `f32`/`f64`, with no-data
//! samples replaced by NaN.

use std::fs::File;
use std::io::{BufWriter, Read, Seek, Write};
use std::path::Path;

use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::encoder::{colortype, TiffEncoder};
use tiff::tags::Tag;
use tracing::{debug, warn};

use crate::error::{Result, SoilError};
use crate::grid::{GeoTransform, Grid, Sample};

const TAG_PIXEL_SCALE: u16 = 33550;
const TAG_TIEPOINT: u16 = 33922;
const TAG_GDAL_NODATA: u16 = 42113;

/// Read the first image of a GeoTIFF into a grid.
pub fn read_geotiff<T: Sample>(path: impl AsRef<Path>) -> Result<Grid<T>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| SoilError::io(path, e))?;
    let grid = decode(file, path)?;
    debug!(
        path = %path.display(),
        width = grid.width,
        height = grid.height,
        "decoded raster"
    );
    Ok(grid)
}

fn decode<T: Sample, R: Read + Seek>(reader: R, path: &Path) -> Result<Grid<T>> {
    let tiff_err = |source| SoilError::Tiff {
        path: path.to_path_buf(),
        source,
    };

    let mut decoder = Decoder::new(reader)
        .map_err(tiff_err)?
        .with_limits(Limits::unlimited());
    let (width, height) = decoder.dimensions().map_err(tiff_err)?;
    let (width, height) = (width as usize, height as usize);

    let transform = read_transform(&mut decoder).unwrap_or_else(|| {
        warn!(path = %path.display(), "no georeferencing tags, using pixel coordinates");
        GeoTransform::identity()
    });
    let nodata = read_nodata(&mut decoder);

    let samples: Vec<f64> = match decoder.read_image().map_err(tiff_err)? {
        DecodingResult::U8(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::U16(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::U32(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::U64(v) => v.into_iter().map(|x| x as f64).collect(),
        DecodingResult::I8(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::I16(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::I32(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::I64(v) => v.into_iter().map(|x| x as f64).collect(),
        DecodingResult::F32(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::F64(v) => v,
        #[allow(unreachable_patterns)]
        _ => return Err(SoilError::UnsupportedSampleType(path.to_path_buf())),
    };

    // Multi-sample images decode interleaved; only the first band is kept.
    let band_stride = samples.len() / (width * height).max(1);
    if band_stride == 0 {
        return Err(SoilError::UnsupportedSampleType(path.to_path_buf()));
    }

    let data = samples
        .into_iter()
        .step_by(band_stride)
        .map(|v| match nodata {
            Some(nd) if v == nd => T::nan(),
            _ => T::from_f64(v),
        })
        .collect();

    Ok(Grid::from_vec(data, width, height, transform))
}

fn read_transform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<GeoTransform> {
    let scale = decoder
        .find_tag(Tag::from_u16_exhaustive(TAG_PIXEL_SCALE))
        .ok()??
        .into_f64_vec()
        .ok()?;
    let tie = decoder
        .find_tag(Tag::from_u16_exhaustive(TAG_TIEPOINT))
        .ok()??
        .into_f64_vec()
        .ok()?;
    if scale.len() < 2 || tie.len() < 6 {
        return None;
    }
    // tiepoint: [I, J, K, X, Y, Z] ties raster (I, J) to model (X, Y).
    let origin_x = tie[3] - tie[0] * scale[0];
    let origin_y = tie[4] + tie[1] * scale[1];
    Some(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1]))
}

fn read_nodata<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<f64> {
    let text = decoder
        .find_tag(Tag::from_u16_exhaustive(TAG_GDAL_NODATA))
        .ok()??
        .into_string()
        .ok()?;
    text.trim_matches(|c: char| c == '\0' || c.is_whitespace())
        .parse()
        .ok()
}

fn write_geotags<W: Write + Seek, C: colortype::ColorType, K: tiff::encoder::TiffKind>(
    image: &mut tiff::encoder::ImageEncoder<'_, W, C, K>,
    transform: &GeoTransform,
    nodata: Option<&str>,
) -> tiff::TiffResult<()> {
    let scale = [transform.pixel_width, transform.pixel_height.abs(), 0.0];
    image
        .encoder()
        .write_tag(Tag::from_u16_exhaustive(TAG_PIXEL_SCALE), &scale[..])?;
    let tie = [0.0, 0.0, 0.0, transform.origin_x, transform.origin_y, 0.0];
    image
        .encoder()
        .write_tag(Tag::from_u16_exhaustive(TAG_TIEPOINT), &tie[..])?;
    if let Some(nd) = nodata {
        image
            .encoder()
            .write_tag(Tag::from_u16_exhaustive(TAG_GDAL_NODATA), nd)?;
    }
    Ok(())
}

/// Write a `u8` class raster; `nodata` is recorded in the GDAL no-data tag.
pub fn write_geotiff_u8(
    path: impl AsRef<Path>,
    data: &[u8],
    width: usize,
    height: usize,
    transform: &GeoTransform,
    nodata: Option<u8>,
) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|e| SoilError::io(path, e))?;
    let nodata = nodata.map(|v| v.to_string());
    encode_u8(BufWriter::new(file), data, width, height, transform, nodata.as_deref()).map_err(
        |source| SoilError::Tiff {
            path: path.to_path_buf(),
            source,
        },
    )
}

fn encode_u8<W: Write + Seek>(
    writer: W,
    data: &[u8],
    width: usize,
    height: usize,
    transform: &GeoTransform,
    nodata: Option<&str>,
) -> tiff::TiffResult<()> {
    let mut encoder = TiffEncoder::new(writer)?;
    let mut image = encoder.new_image::<colortype::Gray8>(width as u32, height as u32)?;
    write_geotags(&mut image, transform, nodata)?;
    image.write_data(data)
}

/// Write an `f32` grid. NaN samples are written as-is.
pub fn write_geotiff_f32(path: impl AsRef<Path>, grid: &Grid<f32>, nodata: Option<f32>) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|e| SoilError::io(path, e))?;
    let nodata = nodata.map(|v| v.to_string());
    encode_f32(BufWriter::new(file), grid, nodata.as_deref()).map_err(|source| SoilError::Tiff {
        path: path.to_path_buf(),
        source,
    })
}

fn encode_f32<W: Write + Seek>(writer: W, grid: &Grid<f32>, nodata: Option<&str>) -> tiff::TiffResult<()> {
    let mut encoder = TiffEncoder::new(writer)?;
    let mut image =
        encoder.new_image::<colortype::Gray32Float>(grid.width as u32, grid.height as u32)?;
    write_geotags(&mut image, &grid.transform, nodata)?;
    image.write_data(&grid.data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn f32_grid_survives_encode_decode() {
        let transform = GeoTransform::new(-54.5, -24.0, 0.00025, -0.00025);
        let data: Vec<f32> = (0..12).map(|i| i as f32 * 1.5).collect();
        let grid = Grid::from_vec(data.clone(), 4, 3, transform);

        let mut buf = Cursor::new(Vec::new());
        encode_f32(&mut buf, &grid, None).unwrap();
        buf.set_position(0);

        let back: Grid<f32> = decode(buf, Path::new("mem.tif")).unwrap();
        assert_eq!((back.width, back.height), (4, 3));
        assert_eq!(back.data, data);
        assert!((back.transform.origin_x - transform.origin_x).abs() < 1e-9);
        assert!((back.transform.origin_y - transform.origin_y).abs() < 1e-9);
        assert!((back.transform.pixel_height + 0.00025).abs() < 1e-12);
    }

    #[test]
    fn nodata_tag_becomes_nan() {
        let data = [1u8, 0, 2, 0, 3, 4];
        let mut buf = Cursor::new(Vec::new());
        encode_u8(&mut buf, &data, 3, 2, &GeoTransform::identity(), Some("0")).unwrap();
        buf.set_position(0);

        let back: Grid<f64> = decode(buf, Path::new("mem.tif")).unwrap();
        assert_eq!(back.get(0, 0), 1.0);
        assert!(back.get(0, 1).is_nan());
        assert!(back.get(1, 0).is_nan());
        assert_eq!(back.get(1, 2), 4.0);
    }
}
