//! Spectral index and thermal scaling

use crate::types::{OrthoError, OrthoImage, OrthoReal, OrthoResult};
use ndarray::{ArrayView2, Zip};

/// Thermal band encoding: stored counts are temperature x 100
pub const THERMAL_SCALE: OrthoReal = 100.0;

/// `(a - b) / (a + b)` per cell.
///
/// Missing inputs stay missing, and a zero denominator yields NaN rather
/// than an infinity.
pub fn normalized_difference(
    a: ArrayView2<'_, OrthoReal>,
    b: ArrayView2<'_, OrthoReal>,
) -> OrthoResult<OrthoImage> {
    if a.dim() != b.dim() {
        return Err(OrthoError::Processing(format!(
            "Band shape mismatch: {:?} vs {:?}",
            a.dim(),
            b.dim()
        )));
    }

    let nd = |a: &OrthoReal, b: &OrthoReal| {
        let sum = a + b;
        if sum == 0.0 {
            OrthoReal::NAN
        } else {
            (a - b) / sum
        }
    };

    #[cfg(feature = "parallel")]
    let result = Zip::from(&a).and(&b).par_map_collect(nd);
    #[cfg(not(feature = "parallel"))]
    let result = Zip::from(&a).and(&b).map_collect(nd);

    Ok(result)
}

/// Normalized Difference Vegetation Index, `(NIR - Red) / (NIR + Red)`
pub fn ndvi(nir: ArrayView2<'_, OrthoReal>, red: ArrayView2<'_, OrthoReal>) -> OrthoResult<OrthoImage> {
    log::debug!("Calculating NDVI over {:?}", nir.dim());
    normalized_difference(nir, red)
}

/// Thermal counts divided by [`THERMAL_SCALE`]; no offset is applied
pub fn scale_thermal(thermal: ArrayView2<'_, OrthoReal>) -> OrthoImage {
    thermal.mapv(|v| v / THERMAL_SCALE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_ndvi_values() {
        let nir = array![[0.5f32, 0.8], [0.3, 0.0]];
        let red = array![[0.1f32, 0.2], [0.3, 0.4]];

        let result = ndvi(nir.view(), red.view()).unwrap();

        assert!((result[[0, 0]] - 0.4 / 0.6).abs() < 1e-6);
        assert!((result[[0, 1]] - 0.6).abs() < 1e-6);
        assert_eq!(result[[1, 0]], 0.0);
        assert_eq!(result[[1, 1]], -1.0);
    }

    #[test]
    fn test_ndvi_missing_and_zero_denominator() {
        let nir = array![[f32::NAN, 0.0, 0.5]];
        let red = array![[0.2f32, 0.0, f32::NAN]];

        let result = ndvi(nir.view(), red.view()).unwrap();
        assert!(result.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_ndvi_shape_mismatch() {
        let nir = array![[0.5f32, 0.8]];
        let red = array![[0.1f32], [0.2]];
        assert!(ndvi(nir.view(), red.view()).is_err());
    }

    #[test]
    fn test_thermal_scale_has_no_offset() {
        let counts = array![[29815.0f32, f32::NAN]];
        let t = scale_thermal(counts.view());
        assert!((t[[0, 0]] - 298.15).abs() < 1e-3);
        assert!(t[[0, 1]].is_nan());
    }
}
