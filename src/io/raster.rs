use crate::types::{
    Band, BandSelection, BandStack, GeoRaster, GeoTransform, OrthoError, OrthoPixels, OrthoResult,
};
use gdal::raster::Buffer;
use gdal::{Dataset, DriverManager};
use ndarray::{Array2, Array3, Axis};
use std::path::Path;

/// GDAL-backed reader for orthomosaics and elevation rasters
pub struct RasterReader;

impl RasterReader {
    /// Read an orthomosaic, keeping the selected bands.
    ///
    /// Cells equal to the file's no-data value (or `nodata` when the file
    /// records none) become NaN, and that value is recorded on the result.
    pub fn read_ortho<P: AsRef<Path>>(
        path: P,
        selection: &BandSelection,
        nodata: f64,
    ) -> OrthoResult<OrthoPixels> {
        let path = path.as_ref();
        log::info!("Reading orthomosaic from: {}", path.display());

        let dataset = Self::open(path)?;
        let band_count = dataset.raster_count() as usize;
        log::debug!("Orthomosaic has {} bands", band_count);

        if band_count > Band::ALL.len() {
            log::warn!(
                "{} has {} bands; only the first {} are mapped",
                path.display(),
                band_count,
                Band::ALL.len()
            );
        }

        let bands: Vec<Band> = match selection {
            BandSelection::All => Band::ALL.iter().copied().take(band_count).collect(),
            BandSelection::Single(band) => vec![*band],
            BandSelection::Many(bands) => bands.clone(),
        };

        if bands.is_empty() {
            return Err(OrthoError::UnsupportedBand("empty band selection".to_string()));
        }
        for band in &bands {
            if band.index() >= band_count {
                return Err(OrthoError::UnsupportedBand(format!(
                    "{} (channel {}) not present in {} with {} bands",
                    band,
                    band.index(),
                    path.display(),
                    band_count
                )));
            }
        }

        let (geo_transform, projection) = Self::georeference(&dataset, path)?;
        let file_nodata = Self::band_nodata(&dataset, path, 1)?;

        let layers = bands
            .iter()
            .map(|band| Self::read_band(&dataset, path, band.index() + 1))
            .collect::<OrthoResult<Vec<_>>>()?;

        match selection {
            BandSelection::Single(band) => {
                let mut raster = GeoRaster {
                    data: layers.into_iter().next().unwrap_or_default(),
                    geo_transform,
                    projection,
                    nodata: file_nodata,
                };
                raster.mask_nodata(nodata);
                Ok(OrthoPixels::Single { band: *band, raster })
            }
            _ => {
                let views: Vec<_> = layers.iter().map(|l| l.view()).collect();
                let data: Array3<f32> = ndarray::stack(Axis(0), &views).map_err(|e| {
                    OrthoError::RasterRead {
                        path: path.to_path_buf(),
                        reason: format!("Failed to stack bands: {}", e),
                    }
                })?;
                let mut stack = BandStack {
                    data,
                    bands,
                    geo_transform,
                    projection,
                    nodata: file_nodata,
                };
                stack.mask_nodata(nodata);
                log::debug!("Loaded band stack with shape {:?}", stack.shape());
                Ok(OrthoPixels::Stack(stack))
            }
        }
    }

    /// Read the first band of a single-band raster (DEM, DTM, hillshade)
    pub fn read_single<P: AsRef<Path>>(path: P, nodata: f64) -> OrthoResult<GeoRaster> {
        let path = path.as_ref();
        log::info!("Reading raster from: {}", path.display());

        let dataset = Self::open(path)?;
        let (geo_transform, projection) = Self::georeference(&dataset, path)?;
        let data = Self::read_band(&dataset, path, 1)?;

        let mut raster = GeoRaster {
            data,
            geo_transform,
            projection,
            nodata: Self::band_nodata(&dataset, path, 1)?,
        };
        raster.mask_nodata(nodata);

        log::debug!("Raster size: {:?}", raster.shape());
        log::debug!("Raster geotransform: {:?}", raster.geo_transform);
        Ok(raster)
    }

    fn open(path: &Path) -> OrthoResult<Dataset> {
        Dataset::open(path).map_err(|e| OrthoError::RasterRead {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    fn georeference(dataset: &Dataset, path: &Path) -> OrthoResult<(GeoTransform, String)> {
        let gt = dataset.geo_transform().map_err(|e| OrthoError::RasterRead {
            path: path.to_path_buf(),
            reason: format!("No geotransform: {}", e),
        })?;
        let geo_transform = GeoTransform::from_gdal(gt);
        // Pixel-centre coordinates assume a north-up grid
        if geo_transform.rotation_x != 0.0 || geo_transform.rotation_y != 0.0 {
            return Err(OrthoError::RasterRead {
                path: path.to_path_buf(),
                reason: format!(
                    "rotated geotransforms are not supported (rotation {}, {})",
                    geo_transform.rotation_x, geo_transform.rotation_y
                ),
            });
        }
        Ok((geo_transform, dataset.projection()))
    }

    fn band_nodata(dataset: &Dataset, path: &Path, band_number: usize) -> OrthoResult<Option<f64>> {
        let band = dataset
            .rasterband(band_number as isize)
            .map_err(|e| OrthoError::RasterRead {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        Ok(band.no_data_value())
    }

    fn read_band(dataset: &Dataset, path: &Path, band_number: usize) -> OrthoResult<Array2<f32>> {
        let read_err = |e: gdal::errors::GdalError| OrthoError::RasterRead {
            path: path.to_path_buf(),
            reason: format!("band {}: {}", band_number, e),
        };

        let (width, height) = dataset.raster_size();
        let rasterband = dataset.rasterband(band_number as isize).map_err(read_err)?;
        let buffer = rasterband
            .read_as::<f32>((0, 0), (width, height), (width, height), None)
            .map_err(read_err)?;

        Array2::from_shape_vec((height, width), buffer.data).map_err(|e| OrthoError::RasterRead {
            path: path.to_path_buf(),
            reason: format!("Failed to reshape band {}: {}", band_number, e),
        })
    }
}

/// Write a single-band raster as a float32 GeoTIFF.
///
/// Missing cells are written as the raster's no-data value when one is set.
pub fn write_geotiff<P: AsRef<Path>>(raster: &GeoRaster, path: P) -> OrthoResult<()> {
    write_layers(
        path.as_ref(),
        vec![raster.data.clone()],
        raster.shape(),
        &raster.geo_transform,
        &raster.projection,
        raster.nodata,
    )
}

/// Write a band stack as a multi-band float32 GeoTIFF, in band-axis order
pub fn write_band_stack<P: AsRef<Path>>(stack: &BandStack, path: P) -> OrthoResult<()> {
    let (_, rows, cols) = stack.shape();
    write_layers(
        path.as_ref(),
        stack.data.axis_iter(Axis(0)).map(|l| l.to_owned()).collect(),
        (rows, cols),
        &stack.geo_transform,
        &stack.projection,
        stack.nodata,
    )
}

fn write_layers(
    path: &Path,
    layers: Vec<Array2<f32>>,
    (rows, cols): (usize, usize),
    geo_transform: &GeoTransform,
    projection: &str,
    nodata: Option<f64>,
) -> OrthoResult<()> {
    log::info!("Writing {} band(s) to: {}", layers.len(), path.display());

    let driver = DriverManager::get_driver_by_name("GTiff")?;
    let mut dataset = driver.create_with_band_type::<f32, _>(
        path,
        cols as isize,
        rows as isize,
        layers.len() as isize,
    )?;
    dataset.set_geo_transform(&geo_transform.to_gdal())?;
    if !projection.is_empty() {
        dataset.set_projection(projection)?;
    }

    let fill = nodata.and_then(num_traits::cast::<f64, f32>);
    for (i, layer) in layers.into_iter().enumerate() {
        let mut band = dataset.rasterband(i as isize + 1)?;
        if let Some(nd) = nodata {
            band.set_no_data_value(Some(nd))?;
        }
        let values: Vec<f32> = layer
            .iter()
            .map(|v| match fill {
                Some(f) if v.is_nan() => f,
                _ => *v,
            })
            .collect();
        band.write((0, 0), (cols, rows), &Buffer::new((cols, rows), values))?;
    }

    Ok(())
}
