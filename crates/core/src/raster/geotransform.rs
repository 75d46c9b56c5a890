//! Affine geotransformation and extents

use serde::{Deserialize, Serialize};

/// Axis-aligned geographic rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Extent {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Whether every corner matches `other` within `tolerance` map units.
    pub fn approx_eq(&self, other: &Extent, tolerance: f64) -> bool {
        (self.min_x - other.min_x).abs() <= tolerance
            && (self.min_y - other.min_y).abs() <= tolerance
            && (self.max_x - other.max_x).abs() <= tolerance
            && (self.max_y - other.max_y).abs() <= tolerance
    }
}

/// Affine transformation coefficients for georeferencing rasters.
///
/// Converts between pixel coordinates (col, row) and geographic coordinates (x, y):
/// ```text
/// x = origin_x + col * pixel_width + row * row_rotation
/// y = origin_y + col * col_rotation + row * pixel_height
/// ```
///
/// For north-up images the rotations are 0 and `pixel_height` is negative.
/// South-up grids (positive `pixel_height`) are handled by every method here.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    /// X coordinate of the upper-left corner
    pub origin_x: f64,
    /// Y coordinate of the upper-left corner
    pub origin_y: f64,
    /// Pixel width (cell size in X direction)
    pub pixel_width: f64,
    /// Pixel height (cell size in Y direction, usually negative)
    pub pixel_height: f64,
    /// Rotation about X axis (usually 0)
    pub row_rotation: f64,
    /// Rotation about Y axis (usually 0)
    pub col_rotation: f64,
}

impl GeoTransform {
    /// Create a new GeoTransform with no rotation
    pub fn new(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            pixel_width,
            pixel_height,
            row_rotation: 0.0,
            col_rotation: 0.0,
        }
    }

    /// Create from GDAL-style array [origin_x, pixel_width, row_rotation, origin_y, col_rotation, pixel_height]
    pub fn from_gdal(coeffs: [f64; 6]) -> Self {
        Self {
            origin_x: coeffs[0],
            pixel_width: coeffs[1],
            row_rotation: coeffs[2],
            origin_y: coeffs[3],
            col_rotation: coeffs[4],
            pixel_height: coeffs[5],
        }
    }

    /// Convert to GDAL-style array
    pub fn to_gdal(&self) -> [f64; 6] {
        [
            self.origin_x,
            self.pixel_width,
            self.row_rotation,
            self.origin_y,
            self.col_rotation,
            self.pixel_height,
        ]
    }

    /// Geographic coordinates of the center of pixel (col, row)
    pub fn pixel_to_geo(&self, col: usize, row: usize) -> (f64, f64) {
        self.apply(col as f64 + 0.5, row as f64 + 0.5)
    }

    /// Geographic coordinates of the top-left corner of pixel (col, row)
    pub fn pixel_to_geo_corner(&self, col: usize, row: usize) -> (f64, f64) {
        self.apply(col as f64, row as f64)
    }

    fn apply(&self, col: f64, row: f64) -> (f64, f64) {
        let x = self.origin_x + col * self.pixel_width + row * self.row_rotation;
        let y = self.origin_y + col * self.col_rotation + row * self.pixel_height;
        (x, y)
    }

    /// Convert geographic coordinates to fractional pixel coordinates.
    ///
    /// Returns `(NaN, NaN)` for a degenerate transform.
    pub fn geo_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        let det = self.pixel_width * self.pixel_height - self.row_rotation * self.col_rotation;

        if det.abs() < 1e-12 {
            return (f64::NAN, f64::NAN);
        }

        let dx = x - self.origin_x;
        let dy = y - self.origin_y;

        let col = (self.pixel_height * dx - self.row_rotation * dy) / det;
        let row = (-self.col_rotation * dx + self.pixel_width * dy) / det;

        (col, row)
    }

    /// Whether either rotation term is nonzero
    pub fn is_rotated(&self) -> bool {
        self.row_rotation != 0.0 || self.col_rotation != 0.0
    }

    /// Pixel size as (x, y) magnitudes
    pub fn pixel_size(&self) -> (f64, f64) {
        (self.pixel_width.abs(), self.pixel_height.abs())
    }

    /// Ground area covered by one cell, in squared map units
    pub fn pixel_area(&self) -> f64 {
        (self.pixel_width * self.pixel_height - self.row_rotation * self.col_rotation).abs()
    }

    /// Extent of the pixel window starting at (col, row) spanning cols x rows
    pub fn window_extent(&self, col: usize, row: usize, cols: usize, rows: usize) -> Extent {
        let corners = [
            self.pixel_to_geo_corner(col, row),
            self.pixel_to_geo_corner(col + cols, row),
            self.pixel_to_geo_corner(col, row + rows),
            self.pixel_to_geo_corner(col + cols, row + rows),
        ];

        let mut extent = Extent::new(f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY);
        for (x, y) in corners {
            extent.min_x = extent.min_x.min(x);
            extent.min_y = extent.min_y.min(y);
            extent.max_x = extent.max_x.max(x);
            extent.max_y = extent.max_y.max(y);
        }
        extent
    }

    /// Extent of a full raster of given dimensions
    pub fn extent(&self, width: usize, height: usize) -> Extent {
        self.window_extent(0, 0, width, height)
    }

    /// Fractional pixel offset of the upper-left corner of `extent`.
    ///
    /// The inverse of [`GeoTransform::window_extent`] for unrotated grids of
    /// either vertical orientation.
    pub fn extent_origin(&self, extent: &Extent) -> (f64, f64) {
        let x = if self.pixel_width >= 0.0 { extent.min_x } else { extent.max_x };
        let y = if self.pixel_height < 0.0 { extent.max_y } else { extent.min_y };
        self.geo_to_pixel(x, y)
    }
}

impl Default for GeoTransform {
    fn default() -> Self {
        Self::new(0.0, 0.0, 1.0, -1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_pixel_to_geo_roundtrip() {
        let gt = GeoTransform::new(100.0, 200.0, 10.0, -10.0);

        let (x, y) = gt.pixel_to_geo(5, 10);
        let (col, row) = gt.geo_to_pixel(x, y);

        assert_relative_eq!(col, 5.5, epsilon = 1e-10);
        assert_relative_eq!(row, 10.5, epsilon = 1e-10);
    }

    #[test]
    fn test_extent() {
        let gt = GeoTransform::new(0.0, 100.0, 1.0, -1.0);
        let e = gt.extent(100, 100);

        assert_relative_eq!(e.min_x, 0.0, epsilon = 1e-10);
        assert_relative_eq!(e.min_y, 0.0, epsilon = 1e-10);
        assert_relative_eq!(e.max_x, 100.0, epsilon = 1e-10);
        assert_relative_eq!(e.max_y, 100.0, epsilon = 1e-10);
    }

    #[test]
    fn test_window_extent_inverts_north_up() {
        let gt = GeoTransform::new(500.0, 1000.0, 30.0, -30.0);
        let e = gt.window_extent(256, 512, 100, 44);
        assert_relative_eq!(e.min_x, 500.0 + 256.0 * 30.0, epsilon = 1e-9);
        assert_relative_eq!(e.max_y, 1000.0 - 512.0 * 30.0, epsilon = 1e-9);

        let (col, row) = gt.extent_origin(&e);
        assert_relative_eq!(col, 256.0, epsilon = 1e-9);
        assert_relative_eq!(row, 512.0, epsilon = 1e-9);
    }

    #[test]
    fn test_window_extent_inverts_south_up() {
        let gt = GeoTransform::new(0.0, 0.0, 2.0, 2.0);
        let e = gt.window_extent(3, 4, 5, 6);
        assert_relative_eq!(e.min_y, 8.0, epsilon = 1e-12);
        assert_relative_eq!(e.max_y, 20.0, epsilon = 1e-12);

        let (col, row) = gt.extent_origin(&e);
        assert_relative_eq!(col, 3.0, epsilon = 1e-12);
        assert_relative_eq!(row, 4.0, epsilon = 1e-12);
    }

    #[test]
    fn test_pixel_area() {
        let gt = GeoTransform::new(0.0, 0.0, 30.0, -30.0);
        assert_relative_eq!(gt.pixel_area(), 900.0);
        assert_eq!(gt.pixel_size(), (30.0, 30.0));
    }
}
