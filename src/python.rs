//! Python bindings exposing capture products as NumPy arrays

use crate::config::OrthoConfig;
use crate::core::{LoadOptions, OrthoCapture};
use crate::timestamp::{filename_to_timestamp, TzPolicy};
use crate::types::{AngleUnit, BandSelection, GeoRaster, OrthoError};
use numpy::{IntoPyArray, PyArray2};
use pyo3::exceptions::{PyIOError, PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use std::path::PathBuf;

fn to_py_err(e: OrthoError) -> PyErr {
    match e {
        OrthoError::Io(_) | OrthoError::RasterRead { .. } => PyIOError::new_err(e.to_string()),
        OrthoError::InvalidFilename(_)
        | OrthoError::TimestampParse { .. }
        | OrthoError::InvalidTimezone(_)
        | OrthoError::UnsupportedBand(_)
        | OrthoError::Config(_) => PyValueError::new_err(e.to_string()),
        _ => PyRuntimeError::new_err(e.to_string()),
    }
}

fn raster_to_numpy<'py>(py: Python<'py>, raster: GeoRaster) -> &'py PyArray2<f32> {
    raster.data.into_pyarray(py)
}

/// Python module definition
#[pymodule]
fn _core(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_class::<PyOrthoCapture>()?;
    m.add_function(wrap_pyfunction!(py_filename_to_timestamp, m)?)?;
    Ok(())
}

/// Parse a timestamp out of a filename, returned as an RFC 3339 string
#[pyfunction]
#[pyo3(name = "filename_to_timestamp", signature = (filename, skip_chars, end_chars, format, tz = "America/Los_Angeles"))]
fn py_filename_to_timestamp(
    filename: &str,
    skip_chars: usize,
    end_chars: usize,
    format: &str,
    tz: &str,
) -> PyResult<String> {
    let policy = TzPolicy::named(tz).map_err(to_py_err)?;
    let dt = filename_to_timestamp(filename, skip_chars, end_chars, format, &policy).map_err(to_py_err)?;
    Ok(dt.to_rfc3339())
}

/// Python wrapper for OrthoCapture
#[pyclass(name = "OrthoCapture")]
struct PyOrthoCapture {
    inner: OrthoCapture,
}

#[pymethods]
impl PyOrthoCapture {
    #[new]
    #[pyo3(signature = (path, config_path = None, tz = None))]
    fn new(path: PathBuf, config_path: Option<PathBuf>, tz: Option<String>) -> PyResult<Self> {
        let mut config = match config_path {
            Some(p) => OrthoConfig::from_json_file(p).map_err(to_py_err)?,
            None => OrthoConfig::micasense("America/Los_Angeles"),
        };
        if let Some(tz) = tz {
            config.tz = tz;
        }
        let inner = OrthoCapture::new(path, config).map_err(to_py_err)?;
        Ok(PyOrthoCapture { inner })
    }

    #[pyo3(signature = (bands = None, nodata = None))]
    fn load(&mut self, bands: Option<Vec<String>>, nodata: Option<f64>) -> PyResult<()> {
        let bands = match bands {
            Some(keys) => BandSelection::parse_many(&keys).map_err(to_py_err)?,
            None => BandSelection::All,
        };
        self.inner
            .load_with(LoadOptions { bands, nodata })
            .map_err(to_py_err)
    }

    #[getter]
    fn name(&self) -> String {
        self.inner.name().to_string()
    }

    #[getter]
    fn capture_id(&self) -> String {
        self.inner.capture_id().to_string()
    }

    #[getter]
    fn initialized(&self) -> bool {
        self.inner.is_initialized()
    }

    /// Acquisition time as RFC 3339, resolved on first access
    #[getter]
    fn acquisition_time(&mut self) -> PyResult<String> {
        let time = match self.inner.acquisition_time() {
            Some(t) => *t,
            None => self.inner.resolve_acquisition_time().map_err(to_py_err)?,
        };
        Ok(time.to_rfc3339())
    }

    fn calc_ndvi<'py>(&self, py: Python<'py>) -> PyResult<&'py PyArray2<f32>> {
        let ndvi = self.inner.calc_ndvi().map_err(to_py_err)?;
        Ok(raster_to_numpy(py, ndvi))
    }

    fn temperature<'py>(&self, py: Python<'py>) -> PyResult<&'py PyArray2<f32>> {
        let t = self.inner.temperature().map_err(to_py_err)?;
        Ok(raster_to_numpy(py, t))
    }

    #[pyo3(signature = (mask_negative = true))]
    fn generate_canopy_height_model<'py>(
        &mut self,
        py: Python<'py>,
        mask_negative: bool,
    ) -> PyResult<&'py PyArray2<f32>> {
        let chm = self
            .inner
            .generate_canopy_height_model(mask_negative)
            .map_err(to_py_err)?
            .clone();
        Ok(raster_to_numpy(py, chm))
    }

    #[pyo3(signature = (path = None))]
    fn hillshade<'py>(&self, py: Python<'py>, path: Option<PathBuf>) -> PyResult<Option<&'py PyArray2<f32>>> {
        let hs = self.inner.hillshade(path.as_deref()).map_err(to_py_err)?;
        Ok(hs.map(|r| raster_to_numpy(py, r)))
    }

    #[pyo3(signature = (unit = "radians"))]
    fn calc_slope<'py>(&self, py: Python<'py>, unit: &str) -> PyResult<&'py PyArray2<f32>> {
        let unit: AngleUnit = unit.parse().map_err(to_py_err)?;
        let slope = self.inner.calc_slope(unit).map_err(to_py_err)?;
        Ok(raster_to_numpy(py, slope))
    }

    #[pyo3(signature = (unit = "radians"))]
    fn calc_aspect<'py>(&self, py: Python<'py>, unit: &str) -> PyResult<&'py PyArray2<f32>> {
        let unit: AngleUnit = unit.parse().map_err(to_py_err)?;
        let aspect = self.inner.calc_aspect(unit).map_err(to_py_err)?;
        Ok(raster_to_numpy(py, aspect))
    }

    /// GDAL geotransform of the loaded orthomosaic
    fn geo_transform(&self) -> Option<[f64; 6]> {
        self.inner.pixels().map(|p| p.geo_transform().to_gdal())
    }

    fn __str__(&self) -> String {
        self.inner.to_string()
    }

    fn __repr__(&self) -> String {
        self.inner.to_string()
    }
}
