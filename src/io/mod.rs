//! I/O modules for reading orthomosaics, elevation models and their siblings

pub mod raster;
pub mod resolver;

pub use raster::{write_band_stack, write_geotiff, RasterReader};
pub use resolver::{ArtifactResolver, CaptureKey, ConventionResolver, SiblingProduct, StaticResolver};
