//! uav-ortho: UAV multispectral/thermal orthomosaics and their terrain products
//!
//! This library models one orthomosaic capture together with its co-registered
//! DEM and DTM, and derives the rasters an energy-balance model pulls from it:
//! NDVI, surface temperature, canopy height, slope, aspect and hillshade.

pub mod types;
pub mod config;
pub mod timestamp;
pub mod io;
pub mod core;

#[cfg(feature = "python")]
mod python;

// Re-export main types and functions for easier access
pub use types::{
    AngleUnit, Band, BandSelection, BandStack, GeoRaster, GeoTransform, Interpolation, OrthoError,
    OrthoPixels, OrthoResult,
};

pub use config::{OrthoConfig, DEFAULT_NODATA};
pub use timestamp::{
    dms_to_dd, extract_capture_id, filename_to_timestamp, make_tz_aware, round_to_decisecond,
    TimestampLayout, TzPolicy,
};
pub use io::{write_geotiff, ArtifactResolver, ConventionResolver, RasterReader, SiblingProduct, StaticResolver};
pub use crate::core::{resample_to_reference, sort_by_acquisition, LoadOptions, OrthoCapture};
