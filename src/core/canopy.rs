//! Canopy height model: surface elevation above the bare-earth terrain

use crate::core::resample::resample_to_reference;
use crate::types::{GeoRaster, Interpolation, OrthoError, OrthoResult};
use ndarray::Zip;

/// `dem - dtm` on the DEM grid.
///
/// The DTM is moved onto the DEM grid with nearest-neighbour sampling first.
/// With `mask_negative`, negative heights are clipped to zero; missing cells
/// stay missing either way.
pub fn canopy_height(dem: &GeoRaster, dtm: &GeoRaster, mask_negative: bool) -> OrthoResult<GeoRaster> {
    log::info!("Generating canopy height model");
    let dtm_on_dem = resample_to_reference(dtm, dem, Interpolation::Nearest)?;

    if dtm_on_dem.shape() != dem.shape() {
        return Err(OrthoError::Processing(format!(
            "DTM resampled to {:?} but DEM is {:?}",
            dtm_on_dem.shape(),
            dem.shape()
        )));
    }

    let height = |surface: &f32, ground: &f32| {
        let h = surface - ground;
        if mask_negative && h < 0.0 {
            0.0
        } else {
            h
        }
    };

    #[cfg(feature = "parallel")]
    let data = Zip::from(&dem.data).and(&dtm_on_dem.data).par_map_collect(height);
    #[cfg(not(feature = "parallel"))]
    let data = Zip::from(&dem.data).and(&dtm_on_dem.data).map_collect(height);

    let mut chm = dem.like(data);
    chm.nodata = dem.nodata;
    log::debug!("Canopy height model has {} valid cells", chm.valid_count());
    Ok(chm)
}
