//! Slope and aspect from a DEM using Horn's (1981) 3x3 method.
//!
//! The routine reports results the way terrain tools traditionally do: a
//! dedicated no-data sentinel ([`TERRAIN_NODATA`]) instead of NaN, and aspect
//! in compass degrees with flat cells marked [`FLAT_ASPECT`]. Callers are
//! responsible for masking the sentinel.

use crate::types::{GeoRaster, OrthoError, OrthoImage, OrthoReal, OrthoResult};
use ndarray::Array2;

/// Sentinel written where a derivative cannot be computed
pub const TERRAIN_NODATA: OrthoReal = -9999.0;

/// Aspect of cells without a gradient
pub const FLAT_ASPECT: OrthoReal = -1.0;

/// Terrain derivative to compute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerrainAttribute {
    SlopeRadians,
    SlopeDegrees,
    /// Degrees clockwise from north, in [0, 360)
    Aspect,
}

/// Output of the terrain routine with the sentinel it used
#[derive(Debug, Clone)]
pub struct TerrainGrid {
    pub data: OrthoImage,
    pub nodata: OrthoReal,
}

/// Compute a terrain attribute over `dem`.
///
/// Border cells, missing cells and cells with a missing neighbour are
/// [`TERRAIN_NODATA`].
pub fn terrain_attribute(dem: &GeoRaster, attribute: TerrainAttribute) -> OrthoResult<TerrainGrid> {
    let (rows, cols) = dem.shape();
    let dx = dem.geo_transform.pixel_width.abs();
    let dy = dem.geo_transform.pixel_height.abs();

    if dx == 0.0 || dy == 0.0 {
        return Err(OrthoError::Processing(format!(
            "DEM has zero cell size ({} x {})",
            dx, dy
        )));
    }

    log::debug!("Calculating {:?} from DEM {:?}, cell size {} x {}", attribute, (rows, cols), dx, dy);

    let row_values = |row: usize| -> Vec<OrthoReal> {
        (0..cols)
            .map(|col| horn_cell(&dem.data, row, col, dx, dy).map_or(TERRAIN_NODATA, |g| g.value(attribute)))
            .collect()
    };

    #[cfg(feature = "parallel")]
    let values: Vec<Vec<OrthoReal>> = {
        use rayon::prelude::*;
        (0..rows).into_par_iter().map(row_values).collect()
    };
    #[cfg(not(feature = "parallel"))]
    let values: Vec<Vec<OrthoReal>> = (0..rows).map(row_values).collect();

    let data = Array2::from_shape_vec((rows, cols), values.concat())
        .map_err(|e| OrthoError::Processing(format!("Shape error: {}", e)))?;

    Ok(TerrainGrid {
        data,
        nodata: TERRAIN_NODATA,
    })
}

/// Horn gradient at one cell: elevation change per metre eastward and southward
struct Gradient {
    dz_dx: f64,
    dz_dy: f64,
}

impl Gradient {
    fn value(&self, attribute: TerrainAttribute) -> OrthoReal {
        match attribute {
            TerrainAttribute::SlopeRadians => self.slope_radians() as OrthoReal,
            TerrainAttribute::SlopeDegrees => self.slope_radians().to_degrees() as OrthoReal,
            TerrainAttribute::Aspect => self.aspect_degrees(),
        }
    }

    fn slope_radians(&self) -> f64 {
        (self.dz_dx * self.dz_dx + self.dz_dy * self.dz_dy).sqrt().atan()
    }

    fn aspect_degrees(&self) -> OrthoReal {
        const FLAT_THRESHOLD: f64 = 1e-10;
        if self.dz_dx.abs() < FLAT_THRESHOLD && self.dz_dy.abs() < FLAT_THRESHOLD {
            return FLAT_ASPECT;
        }
        // Downslope direction as a compass bearing: east = -dz_dx, north = dz_dy
        let bearing = (-self.dz_dx).atan2(self.dz_dy).to_degrees();
        let bearing = if bearing < 0.0 { bearing + 360.0 } else { bearing };
        // 360 can appear after rounding a tiny negative angle
        (bearing % 360.0) as OrthoReal
    }
}

fn horn_cell(dem: &OrthoImage, row: usize, col: usize, dx: f64, dy: f64) -> Option<Gradient> {
    let (rows, cols) = dem.dim();
    if row == 0 || col == 0 || row + 1 >= rows || col + 1 >= cols {
        return None;
    }

    // a b c
    // d e f
    // g h i
    let at = |r: usize, c: usize| dem[[r, c]] as f64;
    let (a, b, c) = (at(row - 1, col - 1), at(row - 1, col), at(row - 1, col + 1));
    let (d, e, f) = (at(row, col - 1), at(row, col), at(row, col + 1));
    let (g, h, i) = (at(row + 1, col - 1), at(row + 1, col), at(row + 1, col + 1));

    if [a, b, c, d, e, f, g, h, i].iter().any(|v| v.is_nan()) {
        return None;
    }

    Some(Gradient {
        dz_dx: ((c + 2.0 * f + i) - (a + 2.0 * d + g)) / (8.0 * dx),
        dz_dy: ((g + 2.0 * h + i) - (a + 2.0 * b + c)) / (8.0 * dy),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GeoTransform;

    fn dem_from(f: impl Fn(usize, usize) -> f32, cell: f64) -> GeoRaster {
        GeoRaster::new(
            Array2::from_shape_fn((6, 6), |(r, c)| f(r, c)),
            GeoTransform::new(0.0, 0.0, cell, -cell),
            "",
        )
    }

    #[test]
    fn test_flat_dem_has_zero_slope() {
        let dem = dem_from(|_, _| 100.0, 1.0);
        let slope = terrain_attribute(&dem, TerrainAttribute::SlopeRadians).unwrap();
        assert_eq!(slope.data[[2, 2]], 0.0);
        let aspect = terrain_attribute(&dem, TerrainAttribute::Aspect).unwrap();
        assert_eq!(aspect.data[[2, 2]], FLAT_ASPECT);
    }

    #[test]
    fn test_45_degree_plane() {
        // rises 1 m per 1 m eastward
        let dem = dem_from(|_, c| c as f32, 1.0);
        let slope = terrain_attribute(&dem, TerrainAttribute::SlopeDegrees).unwrap();
        assert!((slope.data[[3, 3]] - 45.0).abs() < 1e-4);

        let radians = terrain_attribute(&dem, TerrainAttribute::SlopeRadians).unwrap();
        assert!((radians.data[[3, 3]] - std::f32::consts::FRAC_PI_4).abs() < 1e-6);

        // downslope faces west
        let aspect = terrain_attribute(&dem, TerrainAttribute::Aspect).unwrap();
        assert!((aspect.data[[3, 3]] - 270.0).abs() < 1e-4);
    }

    #[test]
    fn test_aspect_north_and_east() {
        // higher to the south: faces north
        let north = dem_from(|r, _| r as f32, 1.0);
        let aspect = terrain_attribute(&north, TerrainAttribute::Aspect).unwrap();
        let v = aspect.data[[2, 2]];
        assert!(v < 1e-3 || v > 359.999, "expected ~0, got {}", v);

        // higher to the west: faces east
        let east = dem_from(|_, c| -(c as f32), 1.0);
        let aspect = terrain_attribute(&east, TerrainAttribute::Aspect).unwrap();
        assert!((aspect.data[[2, 2]] - 90.0).abs() < 1e-4);
    }

    #[test]
    fn test_border_and_missing_cells_use_sentinel() {
        let mut dem = dem_from(|r, c| (r + c) as f32, 2.0);
        dem.data[[3, 3]] = f32::NAN;

        let slope = terrain_attribute(&dem, TerrainAttribute::SlopeRadians).unwrap();
        assert_eq!(slope.nodata, TERRAIN_NODATA);
        assert_eq!(slope.data[[0, 2]], TERRAIN_NODATA);
        assert_eq!(slope.data[[5, 5]], TERRAIN_NODATA);
        assert_eq!(slope.data[[2, 2]], TERRAIN_NODATA);
        assert_eq!(slope.data[[3, 3]], TERRAIN_NODATA);
        assert!(slope.data[[1, 1]] > 0.0);
    }
}
