//! Moving rasters between grids.
//!
//! Interpolation runs after no-data masking: a linear sample with any
//! missing neighbour of non-zero weight is missing, so valid areas shrink by
//! up to one source pixel along their borders.
//!
//! Rasters are never reprojected: both sides must share a CRS, and a pair
//! whose projections are both known and differ is rejected.

use crate::types::{GeoRaster, Interpolation, OrthoError, OrthoImage, OrthoReal, OrthoResult};
use ndarray::{Array1, Array2};

/// Fractional indices closer than this to an integer are snapped onto it
const SNAP_EPSILON: f64 = 1e-9;

/// How a raster was brought onto a reference grid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    /// Same shape and coordinates; data unchanged
    Identical,
    /// Different shape; interpolated onto the reference grid
    Interpolated,
    /// Same shape, coordinates differ; rows/cols matched to the nearest coordinate
    Reindexed,
}

/// Interpolate `source` onto the pixel centres of `reference`.
///
/// Reference cells outside the source grid are NaN. `Nearest` covers the
/// full footprint of the source pixels; `Linear` covers the span between
/// the outermost pixel centres.
pub fn resample_to_reference(
    source: &GeoRaster,
    reference: &GeoRaster,
    method: Interpolation,
) -> OrthoResult<GeoRaster> {
    check_projection(source, reference)?;
    let (target_height, target_width) = reference.shape();
    let (source_height, source_width) = source.shape();
    log::debug!(
        "Resampling {:?} onto {:?} grid ({:?})",
        source.shape(),
        reference.shape(),
        method
    );

    if source_height == 0 || source_width == 0 {
        return Err(OrthoError::Processing("Cannot resample an empty raster".to_string()));
    }

    let source_transform = &source.geo_transform;
    let cols: Vec<f64> = reference
        .x_coords()
        .iter()
        .map(|&x| snap(source_transform.fractional_col(x)))
        .collect();
    let rows: Vec<f64> = reference
        .y_coords()
        .iter()
        .map(|&y| snap(source_transform.fractional_row(y)))
        .collect();

    let data = Array2::from_shape_fn((target_height, target_width), |(i, j)| match method {
        Interpolation::Nearest => sample_nearest(&source.data, rows[i], cols[j]),
        Interpolation::Linear => sample_linear(&source.data, rows[i], cols[j]),
    });

    let mut resampled = reference.like(data);
    resampled.nodata = source.nodata;
    Ok(resampled)
}

/// Match each reference row and column to the source row and column with
/// the nearest coordinate, without interpolating.
pub fn reindex_nearest(source: &GeoRaster, reference: &GeoRaster) -> OrthoResult<GeoRaster> {
    check_projection(source, reference)?;
    let (source_height, source_width) = source.shape();
    if source_height == 0 || source_width == 0 {
        return Err(OrthoError::Processing("Cannot reindex an empty raster".to_string()));
    }

    let row_index = nearest_indices(&reference.y_coords(), &source.y_coords());
    let col_index = nearest_indices(&reference.x_coords(), &source.x_coords());

    let data = Array2::from_shape_fn(reference.shape(), |(i, j)| source.data[[row_index[i], col_index[j]]]);

    let mut reindexed = reference.like(data);
    reindexed.nodata = source.nodata;
    Ok(reindexed)
}

/// Bring `source` onto the grid of `reference`.
///
/// Shapes that differ are interpolated linearly. Equal shapes whose
/// coordinates are not exactly equal (rasters exported by different tools
/// round coordinates differently) are reindexed by nearest coordinate.
pub fn align_to_reference(source: &GeoRaster, reference: &GeoRaster) -> OrthoResult<(GeoRaster, Alignment)> {
    check_projection(source, reference)?;
    if source.shape() != reference.shape() {
        let aligned = resample_to_reference(source, reference, Interpolation::Linear)?;
        return Ok((aligned, Alignment::Interpolated));
    }

    if source.same_grid(reference) {
        return Ok((source.clone(), Alignment::Identical));
    }

    log::debug!("Shapes match but coordinates differ; reindexing by nearest coordinate");
    let aligned = reindex_nearest(source, reference)?;
    Ok((aligned, Alignment::Reindexed))
}

/// An empty projection is unknown and matches anything
fn check_projection(source: &GeoRaster, reference: &GeoRaster) -> OrthoResult<()> {
    if !source.projection.is_empty()
        && !reference.projection.is_empty()
        && source.projection != reference.projection
    {
        return Err(OrthoError::Processing(format!(
            "CRS mismatch: source is '{}' but reference is '{}'",
            source.projection, reference.projection
        )));
    }
    Ok(())
}

fn snap(index: f64) -> f64 {
    let rounded = index.round();
    if (index - rounded).abs() < SNAP_EPSILON {
        rounded
    } else {
        index
    }
}

fn sample_nearest(data: &OrthoImage, row: f64, col: f64) -> OrthoReal {
    let (height, width) = data.dim();
    if row < -0.5 || col < -0.5 || row >= height as f64 - 0.5 || col >= width as f64 - 0.5 {
        return OrthoReal::NAN;
    }
    let r = (row.round().max(0.0) as usize).min(height - 1);
    let c = (col.round().max(0.0) as usize).min(width - 1);
    data[[r, c]]
}

fn sample_linear(data: &OrthoImage, row: f64, col: f64) -> OrthoReal {
    let (height, width) = data.dim();
    if row < 0.0 || col < 0.0 || row > (height - 1) as f64 || col > (width - 1) as f64 {
        return OrthoReal::NAN;
    }

    let y1 = row.floor() as usize;
    let x1 = col.floor() as usize;
    let y2 = (y1 + 1).min(height - 1);
    let x2 = (x1 + 1).min(width - 1);

    let dy = row - y1 as f64;
    let dx = col - x1 as f64;

    let taps = [
        (y1, x1, (1.0 - dx) * (1.0 - dy)),
        (y1, x2, dx * (1.0 - dy)),
        (y2, x1, (1.0 - dx) * dy),
        (y2, x2, dx * dy),
    ];

    let mut value = 0.0f64;
    for (y, x, weight) in taps {
        if weight == 0.0 {
            continue;
        }
        let v = data[[y, x]];
        if v.is_nan() {
            return OrthoReal::NAN;
        }
        value += v as f64 * weight;
    }
    value as OrthoReal
}

/// For every target coordinate, the index of the closest source coordinate
fn nearest_indices(target: &Array1<f64>, source: &Array1<f64>) -> Vec<usize> {
    let mut sorted: Vec<(f64, usize)> = source.iter().copied().zip(0..).collect();
    sorted.sort_by(|a, b| a.0.total_cmp(&b.0));

    target
        .iter()
        .map(|&t| {
            let upper = sorted.partition_point(|(v, _)| *v < t);
            if upper == 0 {
                return sorted[0].1;
            }
            if upper == sorted.len() {
                return sorted[upper - 1].1;
            }
            let (below, below_index) = sorted[upper - 1];
            let (above, above_index) = sorted[upper];
            if (t - below) <= (above - t) {
                below_index
            } else {
                above_index
            }
        })
        .collect()
}
