use ndarray::{Array, Array1, Array2, Array3, ArrayView2, Axis, Dimension};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// Real-valued reflectance, temperature or elevation sample
pub type OrthoReal = f32;

/// 2D raster data array (rows x cols)
pub type OrthoImage = Array2<OrthoReal>;

/// 3D multi-band raster data (band x rows x cols)
pub type OrthoCube = Array3<OrthoReal>;

/// Spectral bands of a MicaSense multispectral/thermal orthomosaic.
///
/// The discriminant is the zero-based channel position in the stacked
/// orthomosaic and is the same for every capture of this sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Band {
    Blue,
    Green,
    Red,
    RedEdge,
    Nir,
    Thermal,
}

impl Band {
    /// All bands in channel order
    pub const ALL: [Band; 6] = [
        Band::Blue,
        Band::Green,
        Band::Red,
        Band::RedEdge,
        Band::Nir,
        Band::Thermal,
    ];

    /// Zero-based channel position in the orthomosaic
    pub const fn index(self) -> usize {
        match self {
            Band::Blue => 0,
            Band::Green => 1,
            Band::Red => 2,
            Band::RedEdge => 3,
            Band::Nir => 4,
            Band::Thermal => 5,
        }
    }

    /// Look up a band by its zero-based channel position
    pub fn from_index(index: usize) -> OrthoResult<Band> {
        Self::ALL.get(index).copied().ok_or_else(|| {
            OrthoError::UnsupportedBand(format!(
                "channel {} (valid channels are 0..{})",
                index,
                Self::ALL.len()
            ))
        })
    }

    /// Short name used in band keys ("B", "G", "R", "R-E", "NIR", "TIR")
    pub fn short_name(self) -> &'static str {
        match self {
            Band::Blue => "B",
            Band::Green => "G",
            Band::Red => "R",
            Band::RedEdge => "R-E",
            Band::Nir => "NIR",
            Band::Thermal => "TIR",
        }
    }
}

impl std::fmt::Display for Band {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.short_name())
    }
}

impl FromStr for Band {
    type Err = OrthoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim();
        match key.to_uppercase().as_str() {
            "B" | "BLUE" => Ok(Band::Blue),
            "G" | "GREEN" => Ok(Band::Green),
            "R" | "RED" => Ok(Band::Red),
            "R-E" | "RE" | "REDEDGE" | "RED-EDGE" => Ok(Band::RedEdge),
            "NIR" => Ok(Band::Nir),
            "TIR" | "THERMAL" | "LWIR" => Ok(Band::Thermal),
            _ => match key.parse::<usize>() {
                Ok(index) => Band::from_index(index),
                Err(_) => Err(OrthoError::UnsupportedBand(key.to_string())),
            },
        }
    }
}

/// Which bands to keep when loading an orthomosaic
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum BandSelection {
    /// Every band the file provides, in channel order
    #[default]
    All,
    /// One band; the band axis is dropped
    Single(Band),
    /// A subset kept in the caller's order
    Many(Vec<Band>),
}

impl BandSelection {
    /// Parse a list of band keys (names or channel indices)
    pub fn parse_many<S: AsRef<str>>(keys: &[S]) -> OrthoResult<Self> {
        let bands = keys
            .iter()
            .map(|k| k.as_ref().parse::<Band>())
            .collect::<OrthoResult<Vec<_>>>()?;
        Ok(BandSelection::Many(bands))
    }
}

/// Angular unit for terrain derivatives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AngleUnit {
    #[default]
    Radians,
    Degrees,
}

impl FromStr for AngleUnit {
    type Err = OrthoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "radians" | "rad" => Ok(AngleUnit::Radians),
            "degrees" | "deg" => Ok(AngleUnit::Degrees),
            other => Err(OrthoError::Processing(format!("Unknown angle unit: {}", other))),
        }
    }
}

/// Interpolation used when moving a raster onto another grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Interpolation {
    Nearest,
    #[default]
    Linear,
}

/// Geospatial transformation parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub top_left_x: f64,
    pub pixel_width: f64,
    pub rotation_x: f64,
    pub top_left_y: f64,
    pub rotation_y: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    /// North-up transform without rotation
    pub fn new(top_left_x: f64, top_left_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            top_left_x,
            pixel_width,
            rotation_x: 0.0,
            top_left_y,
            rotation_y: 0.0,
            pixel_height,
        }
    }

    pub fn from_gdal(gt: [f64; 6]) -> Self {
        Self {
            top_left_x: gt[0],
            pixel_width: gt[1],
            rotation_x: gt[2],
            top_left_y: gt[3],
            rotation_y: gt[4],
            pixel_height: gt[5],
        }
    }

    pub fn to_gdal(&self) -> [f64; 6] {
        [
            self.top_left_x,
            self.pixel_width,
            self.rotation_x,
            self.top_left_y,
            self.rotation_y,
            self.pixel_height,
        ]
    }

    /// Pixel-centre x coordinates for `cols` columns
    pub fn x_coords(&self, cols: usize) -> Array1<f64> {
        Array1::from_iter((0..cols).map(|j| self.top_left_x + (j as f64 + 0.5) * self.pixel_width))
    }

    /// Pixel-centre y coordinates for `rows` rows
    pub fn y_coords(&self, rows: usize) -> Array1<f64> {
        Array1::from_iter((0..rows).map(|i| self.top_left_y + (i as f64 + 0.5) * self.pixel_height))
    }

    /// Fractional column of a map x coordinate, measured between pixel centres
    pub fn fractional_col(&self, x: f64) -> f64 {
        (x - self.top_left_x) / self.pixel_width - 0.5
    }

    /// Fractional row of a map y coordinate, measured between pixel centres
    pub fn fractional_row(&self, y: f64) -> f64 {
        (y - self.top_left_y) / self.pixel_height - 0.5
    }
}

impl Default for GeoTransform {
    fn default() -> Self {
        Self::new(0.0, 0.0, 1.0, -1.0)
    }
}

/// Replace every cell equal to the recorded no-data value with NaN.
///
/// When `nodata` is unset it is first set to `fallback`. Cells that are
/// already NaN never compare equal, so repeating the call is a no-op.
pub fn mask_nodata<D: Dimension>(data: &mut Array<OrthoReal, D>, nodata: &mut Option<f64>, fallback: f64) {
    let value = *nodata.get_or_insert(fallback);
    let sentinel = match num_traits::cast::<f64, OrthoReal>(value) {
        Some(s) if !s.is_nan() => s,
        _ => return,
    };
    data.mapv_inplace(|v| if v == sentinel { OrthoReal::NAN } else { v });
}

/// Single-band georeferenced raster
#[derive(Debug, Clone, PartialEq)]
pub struct GeoRaster {
    pub data: OrthoImage,
    pub geo_transform: GeoTransform,
    /// Coordinate reference system as WKT (empty when unknown)
    pub projection: String,
    /// No-data value recorded in the raster metadata
    pub nodata: Option<f64>,
}

impl GeoRaster {
    pub fn new(data: OrthoImage, geo_transform: GeoTransform, projection: impl Into<String>) -> Self {
        Self {
            data,
            geo_transform,
            projection: projection.into(),
            nodata: None,
        }
    }

    /// New raster on the same grid and CRS carrying `data`
    pub fn like(&self, data: OrthoImage) -> Self {
        Self {
            data,
            geo_transform: self.geo_transform,
            projection: self.projection.clone(),
            nodata: None,
        }
    }

    /// (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    pub fn x_coords(&self) -> Array1<f64> {
        self.geo_transform.x_coords(self.data.ncols())
    }

    pub fn y_coords(&self) -> Array1<f64> {
        self.geo_transform.y_coords(self.data.nrows())
    }

    /// True when both rasters share shape and exactly equal pixel-centre coordinates
    pub fn same_grid(&self, other: &GeoRaster) -> bool {
        self.shape() == other.shape()
            && self.x_coords() == other.x_coords()
            && self.y_coords() == other.y_coords()
    }

    /// See [`mask_nodata`]
    pub fn mask_nodata(&mut self, fallback: f64) {
        mask_nodata(&mut self.data, &mut self.nodata, fallback);
    }

    /// Number of non-missing cells
    pub fn valid_count(&self) -> usize {
        self.data.iter().filter(|v| !v.is_nan()).count()
    }
}

/// Multi-band georeferenced raster with a record of its band order
#[derive(Debug, Clone, PartialEq)]
pub struct BandStack {
    pub data: OrthoCube,
    /// Band stored at each position of the band axis
    pub bands: Vec<Band>,
    pub geo_transform: GeoTransform,
    pub projection: String,
    pub nodata: Option<f64>,
}

impl BandStack {
    /// (bands, rows, cols)
    pub fn shape(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    /// Position of `band` on the band axis
    pub fn position(&self, band: Band) -> OrthoResult<usize> {
        self.bands.iter().position(|b| *b == band).ok_or_else(|| {
            OrthoError::UnsupportedBand(format!("{} was not loaded (loaded: {:?})", band, self.bands))
        })
    }

    pub fn band_view(&self, band: Band) -> OrthoResult<ArrayView2<'_, OrthoReal>> {
        let position = self.position(band)?;
        Ok(self.data.index_axis(Axis(0), position))
    }

    /// Copy one band out as a [`GeoRaster`] on the same grid
    pub fn band_raster(&self, band: Band) -> OrthoResult<GeoRaster> {
        let view = self.band_view(band)?;
        Ok(GeoRaster {
            data: view.to_owned(),
            geo_transform: self.geo_transform,
            projection: self.projection.clone(),
            nodata: self.nodata,
        })
    }

    /// See [`mask_nodata`]
    pub fn mask_nodata(&mut self, fallback: f64) {
        mask_nodata(&mut self.data, &mut self.nodata, fallback);
    }
}

/// Pixels held by a loaded capture
#[derive(Debug, Clone, PartialEq)]
pub enum OrthoPixels {
    /// Band axis preserved
    Stack(BandStack),
    /// Single band selected; band axis dropped
    Single { band: Band, raster: GeoRaster },
}

impl OrthoPixels {
    pub fn bands(&self) -> Vec<Band> {
        match self {
            OrthoPixels::Stack(stack) => stack.bands.clone(),
            OrthoPixels::Single { band, .. } => vec![*band],
        }
    }

    pub fn band_view(&self, band: Band) -> OrthoResult<ArrayView2<'_, OrthoReal>> {
        match self {
            OrthoPixels::Stack(stack) => stack.band_view(band),
            OrthoPixels::Single { band: loaded, raster } if *loaded == band => Ok(raster.data.view()),
            OrthoPixels::Single { band: loaded, .. } => Err(OrthoError::UnsupportedBand(format!(
                "{} was not loaded (loaded: {})",
                band, loaded
            ))),
        }
    }

    pub fn geo_transform(&self) -> GeoTransform {
        match self {
            OrthoPixels::Stack(stack) => stack.geo_transform,
            OrthoPixels::Single { raster, .. } => raster.geo_transform,
        }
    }

    pub fn projection(&self) -> &str {
        match self {
            OrthoPixels::Stack(stack) => &stack.projection,
            OrthoPixels::Single { raster, .. } => &raster.projection,
        }
    }

    pub fn nodata(&self) -> Option<f64> {
        match self {
            OrthoPixels::Stack(stack) => stack.nodata,
            OrthoPixels::Single { raster, .. } => raster.nodata,
        }
    }

    /// Wrap derived data in a raster on the capture's grid
    pub fn raster_like(&self, data: OrthoImage) -> GeoRaster {
        GeoRaster::new(data, self.geo_transform(), self.projection())
    }
}

/// Error types for orthoimage processing
#[derive(Debug, thiserror::Error)]
pub enum OrthoError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No capture token found in filename: {0}")]
    InvalidFilename(String),

    #[error("Failed to parse timestamp '{input}' with format '{format}': {reason}")]
    TimestampParse {
        input: String,
        format: String,
        reason: String,
    },

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("Failed to read raster {}: {reason}", .path.display())]
    RasterRead { path: PathBuf, reason: String },

    #[error("Unsupported band: {0}")]
    UnsupportedBand(String),

    #[error("Missing input: {0}")]
    MissingInput(String),

    #[error("Orthoimage not initialized: call load() before {0}")]
    NotInitialized(&'static str),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Processing error: {0}")]
    Processing(String),

    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),
}

/// Result type for orthoimage operations
pub type OrthoResult<T> = Result<T, OrthoError>;

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_band_lookup_by_name_and_index() {
        assert_eq!("NIR".parse::<Band>().unwrap(), Band::Nir);
        assert_eq!("r-e".parse::<Band>().unwrap(), Band::RedEdge);
        assert_eq!("TIR".parse::<Band>().unwrap(), Band::Thermal);
        assert_eq!("2".parse::<Band>().unwrap(), Band::Red);
        assert_eq!(Band::from_index(4).unwrap(), Band::Nir);

        assert!(matches!("SWIR".parse::<Band>(), Err(OrthoError::UnsupportedBand(_))));
        assert!(matches!(Band::from_index(6), Err(OrthoError::UnsupportedBand(_))));
    }

    #[test]
    fn test_band_index_matches_channel_order() {
        for (i, band) in Band::ALL.iter().enumerate() {
            assert_eq!(band.index(), i);
        }
    }

    #[test]
    fn test_pixel_centre_coordinates() {
        let gt = GeoTransform::new(100.0, 200.0, 0.5, -0.5);
        let x = gt.x_coords(3);
        let y = gt.y_coords(2);
        assert_eq!(x.to_vec(), vec![100.25, 100.75, 101.25]);
        assert_eq!(y.to_vec(), vec![199.75, 199.25]);
        assert_eq!(gt.fractional_col(100.75), 1.0);
        assert_eq!(gt.fractional_row(199.75), 0.0);
    }

    #[test]
    fn test_mask_nodata_is_idempotent() {
        let mut data = array![[1.0f32, 65535.0], [65535.0, 4.0]];
        let mut nodata = None;

        mask_nodata(&mut data, &mut nodata, 65535.0);
        assert_eq!(nodata, Some(65535.0));
        assert!(data[[0, 1]].is_nan());
        assert!(data[[1, 0]].is_nan());

        let once: Vec<u32> = data.iter().map(|v| v.to_bits()).collect();
        mask_nodata(&mut data, &mut nodata, 65535.0);
        let twice: Vec<u32> = data.iter().map(|v| v.to_bits()).collect();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_mask_nodata_prefers_recorded_value() {
        let mut data = array![[-9999.0f32, 65535.0]];
        let mut nodata = Some(-9999.0);
        mask_nodata(&mut data, &mut nodata, 65535.0);
        assert!(data[[0, 0]].is_nan());
        assert_eq!(data[[0, 1]], 65535.0);
    }

    #[test]
    fn test_stack_band_lookup_follows_loaded_order() {
        let data = Array3::from_shape_fn((2, 2, 2), |(b, _, _)| b as f32);
        let stack = BandStack {
            data,
            bands: vec![Band::Nir, Band::Red],
            geo_transform: GeoTransform::default(),
            projection: String::new(),
            nodata: None,
        };
        assert_eq!(stack.band_view(Band::Nir).unwrap()[[0, 0]], 0.0);
        assert_eq!(stack.band_view(Band::Red).unwrap()[[0, 0]], 1.0);
        assert!(stack.band_view(Band::Thermal).is_err());
    }
}
