#![allow(dead_code)]

use ndarray::{Array2, Array3};
use std::path::{Path, PathBuf};
use uav_ortho::io::write_band_stack;
use uav_ortho::types::{Band, BandStack, GeoRaster, GeoTransform};
use uav_ortho::write_geotiff;

pub const NAME: &str = "Ramajal_20210324_115832";
pub const ROWS: usize = 4;
pub const COLS: usize = 5;
pub const CELL: f64 = 0.1;
pub const ORIGIN: (f64, f64) = (500000.0, 3800000.0);
pub const NODATA: f32 = 65535.0;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn grid() -> GeoTransform {
    GeoTransform::new(ORIGIN.0, ORIGIN.1, CELL, -CELL)
}

/// Reflectance-like value of `band` at (row, col)
pub fn band_value(band: Band, row: usize, col: usize) -> f32 {
    match band {
        Band::Blue => 0.05,
        Band::Green => 0.08,
        Band::Red => 0.1 + 0.01 * col as f32,
        Band::RedEdge => 0.3,
        Band::Nir => 0.5 + 0.01 * row as f32,
        Band::Thermal => 29815.0 + row as f32,
    }
}

/// Six-band stack with the unmarked no-data sentinel in cell (0, 0) of every band
pub fn ortho_stack(bands: &[Band]) -> BandStack {
    let data = Array3::from_shape_fn((bands.len(), ROWS, COLS), |(b, r, c)| {
        if r == 0 && c == 0 {
            NODATA
        } else {
            band_value(bands[b], r, c)
        }
    });
    BandStack {
        data,
        bands: bands.to_vec(),
        geo_transform: grid(),
        projection: String::new(),
        nodata: None,
    }
}

/// 6x6 surface rising 1 m per metre eastward, on the ortho origin
pub fn dem_raster() -> GeoRaster {
    GeoRaster::new(
        Array2::from_shape_fn((6, 6), |(_, c)| c as f32 * CELL as f32),
        grid(),
        "",
    )
}

pub fn dtm_raster() -> GeoRaster {
    GeoRaster::new(Array2::from_elem((6, 6), 0.2), grid(), "")
}

pub fn sibling_path(dir: &Path, product: &str) -> PathBuf {
    let product_dir = dir.join(product);
    std::fs::create_dir_all(&product_dir).unwrap();
    product_dir.join(format!("{}_{}.tif", NAME, product))
}

pub fn write_sibling(dir: &Path, product: &str, raster: &GeoRaster) -> PathBuf {
    let path = sibling_path(dir, product);
    write_geotiff(raster, &path).unwrap();
    path
}

/// Orthomosaic without siblings
pub fn write_ortho(dir: &Path) -> PathBuf {
    let path = dir.join(format!("{}.tif", NAME));
    write_band_stack(&ortho_stack(&Band::ALL), &path).unwrap();
    path
}

/// Orthomosaic with DEM and DTM siblings
pub fn write_capture(dir: &Path) -> PathBuf {
    let path = write_ortho(dir);
    write_sibling(dir, "DEM", &dem_raster());
    write_sibling(dir, "DTM", &dtm_raster());
    path
}
