//! One orthomosaic capture with its elevation products.
//!
//! An [`OrthoCapture`] is constructed from a path without touching the
//! filesystem. [`OrthoCapture::load`] reads the multi-band raster and any
//! DEM/DTM the resolver can find; every derived product is computed on
//! demand from there.

use crate::config::OrthoConfig;
use crate::core::canopy::canopy_height;
use crate::core::indices::{ndvi, scale_thermal};
use crate::core::resample::{align_to_reference, resample_to_reference};
use crate::core::terrain::{terrain_attribute, TerrainAttribute};
use crate::io::raster::RasterReader;
use crate::io::resolver::{ArtifactResolver, CaptureKey, ConventionResolver, SiblingProduct};
use crate::timestamp::{extract_capture_id, file_base_name};
use crate::types::{
    AngleUnit, Band, BandSelection, BandStack, GeoRaster, Interpolation, OrthoError, OrthoImage,
    OrthoPixels, OrthoReal, OrthoResult,
};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use ndarray::Axis;
use std::path::{Path, PathBuf};

/// Per-call parameters of [`OrthoCapture::load_with`]
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub bands: BandSelection,
    /// No-data fallback for rasters that record none; the config value when unset
    pub nodata: Option<f64>,
}

impl LoadOptions {
    pub fn bands(bands: BandSelection) -> Self {
        Self {
            bands,
            ..Self::default()
        }
    }
}

pub struct OrthoCapture {
    source_path: PathBuf,
    name: String,
    capture_id: String,
    config: OrthoConfig,
    acquisition_time: Option<DateTime<Tz>>,
    resolver: Box<dyn ArtifactResolver>,
    nodata: f64,
    pixels: Option<OrthoPixels>,
    dem: Option<GeoRaster>,
    dtm: Option<GeoRaster>,
    canopy_height_model: Option<GeoRaster>,
    initialized: bool,
}

impl OrthoCapture {
    /// Describe a capture at `path`. Siblings are looked up beside it.
    ///
    /// Fails with [`OrthoError::InvalidFilename`] when the filename carries
    /// no capture token.
    pub fn new<P: Into<PathBuf>>(path: P, config: OrthoConfig) -> OrthoResult<Self> {
        let source_path = path.into();
        let name = file_base_name(&source_path.to_string_lossy());
        let capture_id = extract_capture_id(&name)?;
        let resolver = ConventionResolver::beside(&source_path);
        let nodata = config.nodata;

        Ok(Self {
            source_path,
            name,
            capture_id,
            config,
            acquisition_time: None,
            resolver: Box::new(resolver),
            nodata,
            pixels: None,
            dem: None,
            dtm: None,
            canopy_height_model: None,
            initialized: false,
        })
    }

    /// Use `resolver` instead of the directory convention to find siblings
    pub fn with_resolver<R: ArtifactResolver + 'static>(mut self, resolver: R) -> Self {
        self.resolver = Box::new(resolver);
        self
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capture_id(&self) -> &str {
        &self.capture_id
    }

    pub fn config(&self) -> &OrthoConfig {
        &self.config
    }

    pub fn acquisition_time(&self) -> Option<&DateTime<Tz>> {
        self.acquisition_time.as_ref()
    }

    /// Parse the acquisition time from the capture id with the configured
    /// layout and timezone policy, and remember it.
    pub fn resolve_acquisition_time(&mut self) -> OrthoResult<DateTime<Tz>> {
        let policy = self.config.tz_policy()?;
        let time = self.config.layout().resolve(&self.capture_id, &policy)?;
        log::debug!("{} acquired at {}", self.name, time);
        self.acquisition_time = Some(time);
        Ok(time)
    }

    /// Acquisition instant in UTC, the key captures are ordered by
    pub fn ordering_key(&self) -> Option<DateTime<Utc>> {
        self.acquisition_time.map(|t| t.with_timezone(&Utc))
    }

    /// Load every band plus any DEM and DTM
    pub fn load(&mut self) -> OrthoResult<()> {
        self.load_with(LoadOptions::default())
    }

    /// Read the orthomosaic and its elevation siblings.
    ///
    /// Everything from a previous load is discarded first, so on failure the
    /// capture is left uninitialized and holds no arrays.
    pub fn load_with(&mut self, options: LoadOptions) -> OrthoResult<()> {
        self.initialized = false;
        self.pixels = None;
        self.dem = None;
        self.dtm = None;
        self.canopy_height_model = None;

        let nodata = options.nodata.unwrap_or(self.config.nodata);
        let pixels = RasterReader::read_ortho(&self.source_path, &options.bands, nodata)?;
        let dem = self.read_sibling(SiblingProduct::Dem, nodata)?;
        let dtm = self.read_sibling(SiblingProduct::Dtm, nodata)?;

        log::info!(
            "Loaded {} with bands {:?} (DEM: {}, DTM: {})",
            self.name,
            pixels.bands(),
            dem.is_some(),
            dtm.is_some()
        );

        self.nodata = nodata;
        self.pixels = Some(pixels);
        self.dem = dem;
        self.dtm = dtm;
        self.initialized = true;
        Ok(())
    }

    fn capture_key(&self) -> CaptureKey<'_> {
        CaptureKey {
            name: &self.name,
            capture_id: &self.capture_id,
        }
    }

    fn read_sibling(&self, product: SiblingProduct, nodata: f64) -> OrthoResult<Option<GeoRaster>> {
        match self.resolver.resolve(product, &self.capture_key()) {
            Some(path) => RasterReader::read_single(path, nodata).map(Some),
            None => {
                log::warn!("No {} found for {}", product, self.name);
                Ok(None)
            }
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn require_pixels(&self, operation: &'static str) -> OrthoResult<&OrthoPixels> {
        match (&self.pixels, self.initialized) {
            (Some(pixels), true) => Ok(pixels),
            _ => Err(OrthoError::NotInitialized(operation)),
        }
    }

    fn require_dem(&self, operation: &'static str) -> OrthoResult<&GeoRaster> {
        self.require_pixels(operation)?;
        self.dem
            .as_ref()
            .ok_or_else(|| OrthoError::MissingInput(format!("{} requires a DEM for {}", operation, self.name)))
    }

    pub fn pixels(&self) -> Option<&OrthoPixels> {
        self.pixels.as_ref()
    }

    /// The 2-D raster when a single band was loaded
    pub fn single_band(&self) -> Option<&GeoRaster> {
        match &self.pixels {
            Some(OrthoPixels::Single { raster, .. }) => Some(raster),
            _ => None,
        }
    }

    pub fn dem(&self) -> Option<&GeoRaster> {
        self.dem.as_ref()
    }

    pub fn dtm(&self) -> Option<&GeoRaster> {
        self.dtm.as_ref()
    }

    pub fn canopy_height_model(&self) -> Option<&GeoRaster> {
        self.canopy_height_model.as_ref()
    }

    /// One loaded band as a raster on the capture grid
    pub fn band(&self, band: Band) -> OrthoResult<GeoRaster> {
        let pixels = self.require_pixels("band")?;
        let mut raster = pixels.raster_like(pixels.band_view(band)?.to_owned());
        raster.nodata = pixels.nodata();
        Ok(raster)
    }

    /// Normalized Difference Vegetation Index from the NIR and Red bands
    pub fn calc_ndvi(&self) -> OrthoResult<GeoRaster> {
        let pixels = self.require_pixels("calc_ndvi")?;
        let data = ndvi(pixels.band_view(Band::Nir)?, pixels.band_view(Band::Red)?)?;
        Ok(pixels.raster_like(data))
    }

    /// Surface temperature: thermal counts / 100
    pub fn temperature(&self) -> OrthoResult<GeoRaster> {
        let pixels = self.require_pixels("temperature")?;
        let data = scale_thermal(pixels.band_view(Band::Thermal)?);
        Ok(pixels.raster_like(data))
    }

    /// Resample every loaded band onto the DEM grid
    pub fn project_to_dem(&self, method: Interpolation) -> OrthoResult<OrthoPixels> {
        let dem = self.require_dem("project_to_dem")?;
        let pixels = self.require_pixels("project_to_dem")?;

        let mut layers = Vec::new();
        for band in pixels.bands() {
            let mut source = pixels.raster_like(pixels.band_view(band)?.to_owned());
            source.nodata = pixels.nodata();
            layers.push(resample_to_reference(&source, dem, method)?);
        }

        match pixels {
            OrthoPixels::Single { band, .. } => {
                let raster = layers
                    .pop()
                    .ok_or_else(|| OrthoError::Processing("no band to project".to_string()))?;
                Ok(OrthoPixels::Single { band: *band, raster })
            }
            OrthoPixels::Stack(stack) => {
                let views: Vec<_> = layers.iter().map(|l| l.data.view()).collect();
                let data = ndarray::stack(Axis(0), &views)
                    .map_err(|e| OrthoError::Processing(format!("Failed to stack bands: {}", e)))?;
                Ok(OrthoPixels::Stack(BandStack {
                    data,
                    bands: stack.bands.clone(),
                    geo_transform: dem.geo_transform,
                    projection: dem.projection.clone(),
                    nodata: stack.nodata,
                }))
            }
        }
    }

    /// Canopy height (DEM minus DTM) on the DEM grid; cached until the next load
    pub fn generate_canopy_height_model(&mut self, mask_negative: bool) -> OrthoResult<&GeoRaster> {
        let dem = self.require_dem("generate_canopy_height_model")?;
        let dtm = self.dtm.as_ref().ok_or_else(|| {
            OrthoError::MissingInput(format!("generate_canopy_height_model requires a DTM for {}", self.name))
        })?;

        let chm = canopy_height(dem, dtm, mask_negative)?;
        Ok(self.canopy_height_model.insert(chm))
    }

    /// Hillshade aligned to the DEM grid.
    ///
    /// Without an explicit `path` the resolver is asked for a sibling; when it
    /// finds none the result is `Ok(None)`.
    pub fn hillshade(&self, path: Option<&Path>) -> OrthoResult<Option<GeoRaster>> {
        let dem = self.require_dem("hillshade")?;

        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match self.resolver.resolve(SiblingProduct::Hillshade, &self.capture_key()) {
                Some(p) => p,
                None => {
                    log::warn!("No hillshade found for {}", self.name);
                    return Ok(None);
                }
            },
        };

        let hillshade = RasterReader::read_single(&path, self.nodata)?;
        let (aligned, alignment) = align_to_reference(&hillshade, dem)?;
        log::debug!("Hillshade aligned to DEM: {:?}", alignment);
        Ok(Some(aligned))
    }

    /// Slope of the DEM
    pub fn calc_slope(&self, unit: AngleUnit) -> OrthoResult<GeoRaster> {
        let dem = self.require_dem("calc_slope")?;
        let attribute = match unit {
            AngleUnit::Radians => TerrainAttribute::SlopeRadians,
            AngleUnit::Degrees => TerrainAttribute::SlopeDegrees,
        };
        let grid = terrain_attribute(dem, attribute)?;
        Ok(self.wrap_terrain(dem, grid.data, grid.nodata))
    }

    /// Aspect of the DEM, clockwise from north. Flat cells are -1 in degree
    /// units (its radian equivalent otherwise).
    pub fn calc_aspect(&self, unit: AngleUnit) -> OrthoResult<GeoRaster> {
        let dem = self.require_dem("calc_aspect")?;
        let grid = terrain_attribute(dem, TerrainAttribute::Aspect)?;

        let (data, sentinel) = match unit {
            AngleUnit::Degrees => (grid.data, grid.nodata),
            // Convert the sentinel with the data so they still compare equal
            AngleUnit::Radians => (grid.data.mapv(OrthoReal::to_radians), grid.nodata.to_radians()),
        };
        Ok(self.wrap_terrain(dem, data, sentinel))
    }

    fn wrap_terrain(&self, dem: &GeoRaster, data: OrthoImage, sentinel: OrthoReal) -> GeoRaster {
        let mut raster = dem.like(data);
        raster.nodata = Some(f64::from(sentinel));
        raster.mask_nodata(self.nodata);
        raster
    }
}

/// Order captures by acquisition instant; unresolved times sort first
pub fn sort_by_acquisition(captures: &mut [OrthoCapture]) {
    captures.sort_by(|a, b| {
        a.ordering_key()
            .cmp(&b.ordering_key())
            .then_with(|| a.source_path.cmp(&b.source_path))
    });
}

impl PartialEq for OrthoCapture {
    fn eq(&self, other: &Self) -> bool {
        self.source_path == other.source_path
    }
}

impl Eq for OrthoCapture {}

impl std::fmt::Debug for OrthoCapture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrthoCapture")
            .field("source_path", &self.source_path)
            .field("capture_id", &self.capture_id)
            .field("acquisition_time", &self.acquisition_time)
            .field("initialized", &self.initialized)
            .field("bands", &self.pixels.as_ref().map(|p| p.bands()))
            .field("dem", &self.dem.is_some())
            .field("dtm", &self.dtm.is_some())
            .finish()
    }
}

impl std::fmt::Display for OrthoCapture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrthoCapture(file=\"{}\")", self.source_path.display())
    }
}
