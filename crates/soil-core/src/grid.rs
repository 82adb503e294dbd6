use serde::{Deserialize, Serialize};

/// Mean Earth radius in metres, used for geographic cell areas.
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;
/// Metres per degree of latitude.
pub const METRES_PER_DEG: f64 = 111_320.0;

/// Units of the grid's coordinate reference system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellUnits {
    #[default]
    Degrees,
    Metres,
}

/// North-up affine transform: pixel (col, row) → (x, y) of the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub origin_x: f64,
    pub origin_y: f64,
    pub pixel_width: f64,
    /// Negative for north-up rasters.
    pub pixel_height: f64,
}

impl GeoTransform {
    pub fn new(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            pixel_width,
            pixel_height,
        }
    }

    /// Pixel-unit transform used when a TIFF carries no georeferencing.
    pub fn identity() -> Self {
        Self::new(0.0, 0.0, 1.0, -1.0)
    }

    pub fn pixel_to_geo(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.origin_x + col * self.pixel_width,
            self.origin_y + row * self.pixel_height,
        )
    }

    /// Fractional pixel coordinates of a geographic point.
    pub fn geo_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        (
            (x - self.origin_x) / self.pixel_width,
            (y - self.origin_y) / self.pixel_height,
        )
    }

    /// Area of one cell in row `row`, in square metres.
    pub fn cell_area_m2(&self, row: usize, units: CellUnits) -> f64 {
        match units {
            CellUnits::Metres => (self.pixel_width * self.pixel_height).abs(),
            CellUnits::Degrees => {
                let (_, lat_a) = self.pixel_to_geo(0.0, row as f64);
                let (_, lat_b) = self.pixel_to_geo(0.0, row as f64 + 1.0);
                let dlon = self.pixel_width.abs().to_radians();
                let band = (lat_a.to_radians().sin() - lat_b.to_radians().sin()).abs();
                EARTH_RADIUS_M * EARTH_RADIUS_M * dlon * band
            }
        }
    }

    /// Nominal cell size in metres along the meridian.
    pub fn cell_size_m(&self, units: CellUnits) -> f64 {
        match units {
            CellUnits::Metres => self.pixel_height.abs(),
            CellUnits::Degrees => self.pixel_height.abs() * METRES_PER_DEG,
        }
    }
}

/// Axis-aligned bounds in the grid's CRS.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

/// Rectangle of pixels; `cols` or `rows` of zero means empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    pub col0: usize,
    pub row0: usize,
    pub cols: usize,
    pub rows: usize,
}

impl Window {
    pub fn full(width: usize, height: usize) -> Self {
        Self {
            col0: 0,
            row0: 0,
            cols: width,
            rows: height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.cols == 0 || self.rows == 0
    }

    /// Number of pixels visited when sampling every `stride`-th row and column.
    pub fn sampled_pixels(&self, stride: usize) -> u64 {
        let stride = stride.max(1);
        (self.cols.div_ceil(stride) as u64) * (self.rows.div_ceil(stride) as u64)
    }
}

/// Sample types a [`Grid`] can hold. NaN marks no-data.
pub trait Sample: Copy + Send + Sync + 'static {
    fn from_f64(v: f64) -> Self;
    fn to_f64(self) -> f64;
    fn nan() -> Self;
}

impl Sample for f32 {
    #[inline]
    fn from_f64(v: f64) -> Self {
        v as f32
    }
    #[inline]
    fn to_f64(self) -> f64 {
        self as f64
    }
    fn nan() -> Self {
        f32::NAN
    }
}

impl Sample for f64 {
    #[inline]
    fn from_f64(v: f64) -> Self {
        v
    }
    #[inline]
    fn to_f64(self) -> f64 {
        self
    }
    fn nan() -> Self {
        f64::NAN
    }
}

/// A single-band raster stored row-major, row 0 = north edge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grid<T> {
    pub data: Vec<T>,
    pub width: usize,
    pub height: usize,
    pub transform: GeoTransform,
}

impl<T: Sample> Grid<T> {
    /// Create a grid filled with the given value.
    pub fn new(width: usize, height: usize, transform: GeoTransform, fill: T) -> Self {
        Self {
            data: vec![fill; width * height],
            width,
            height,
            transform,
        }
    }

    pub fn from_vec(data: Vec<T>, width: usize, height: usize, transform: GeoTransform) -> Self {
        debug_assert_eq!(data.len(), width * height);
        Self {
            data,
            width,
            height,
            transform,
        }
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> T {
        self.data[row * self.width + col]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, val: T) {
        self.data[row * self.width + col] = val;
    }

    #[inline]
    pub fn is_valid(&self, row: usize, col: usize) -> bool {
        !self.get(row, col).to_f64().is_nan()
    }

    pub fn same_shape<U>(&self, other: &Grid<U>) -> bool {
        self.width == other.width && self.height == other.height
    }

    /// Pixel window covering `bounds`, clamped to the grid.
    pub fn window_for(&self, bounds: &Bounds) -> Window {
        let (c_a, r_a) = self.transform.geo_to_pixel(bounds.min_x, bounds.max_y);
        let (c_b, r_b) = self.transform.geo_to_pixel(bounds.max_x, bounds.min_y);
        let clamp = |v: f64, hi: usize| -> usize { v.max(0.0).min(hi as f64) as usize };

        let col0 = clamp(c_a.min(c_b).floor(), self.width);
        let col1 = clamp(c_a.max(c_b).ceil(), self.width);
        let row0 = clamp(r_a.min(r_b).floor(), self.height);
        let row1 = clamp(r_a.max(r_b).ceil(), self.height);

        Window {
            col0,
            row0,
            cols: col1.saturating_sub(col0),
            rows: row1.saturating_sub(row0),
        }
    }

    /// Bounding window of all valid (non-NaN) pixels.
    pub fn valid_extent(&self) -> Window {
        let (mut min_r, mut max_r) = (usize::MAX, 0usize);
        let (mut min_c, mut max_c) = (usize::MAX, 0usize);
        for r in 0..self.height {
            for c in 0..self.width {
                if self.is_valid(r, c) {
                    min_r = min_r.min(r);
                    max_r = max_r.max(r);
                    min_c = min_c.min(c);
                    max_c = max_c.max(c);
                }
            }
        }
        if min_r == usize::MAX {
            return Window {
                col0: 0,
                row0: 0,
                cols: 0,
                rows: 0,
            };
        }
        Window {
            col0: min_c,
            row0: min_r,
            cols: max_c - min_c + 1,
            rows: max_r - min_r + 1,
        }
    }
}
