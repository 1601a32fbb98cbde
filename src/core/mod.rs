//! Core orthoimage processing modules

pub mod indices;
pub mod resample;
pub mod terrain;
pub mod canopy;
pub mod ortho;

// Re-export main types
pub use indices::{ndvi, normalized_difference, scale_thermal, THERMAL_SCALE};
pub use resample::{align_to_reference, reindex_nearest, resample_to_reference, Alignment};
pub use terrain::{terrain_attribute, TerrainAttribute, TerrainGrid, FLAT_ASPECT, TERRAIN_NODATA};
pub use canopy::canopy_height;
pub use ortho::{sort_by_acquisition, LoadOptions, OrthoCapture};
