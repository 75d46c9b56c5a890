//! Point features derived from raster cells

use crate::raster::GeoTransform;
use geo_types::{Coord, Point};

/// A weighted point located at a pixel center
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightedPoint {
    pub point: Point<f64>,
    pub weight: f64,
    /// Source pixel column
    pub col: usize,
    /// Source pixel row
    pub row: usize,
}

impl WeightedPoint {
    /// Point at the center of pixel (`col`, `row`)
    pub fn at_pixel(transform: &GeoTransform, col: usize, row: usize, weight: f64) -> Self {
        let (x, y) = transform.pixel_to_geo(col, row);
        Self {
            point: Point::new(x, y),
            weight,
            col,
            row,
        }
    }

    pub fn x(&self) -> f64 {
        self.point.x()
    }

    pub fn y(&self) -> f64 {
        self.point.y()
    }

    pub fn coord(&self) -> Coord<f64> {
        self.point.0
    }
}

/// Ordered collection of weighted points
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointSet {
    pub points: Vec<WeightedPoint>,
}

impl PointSet {
    pub fn new() -> Self {
        Self { points: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            points: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, point: WeightedPoint) {
        self.points.push(point);
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &WeightedPoint> {
        self.points.iter()
    }

    /// Sum of all weights
    pub fn total_weight(&self) -> f64 {
        self.points.iter().map(|p| p.weight).sum()
    }
}

impl IntoIterator for PointSet {
    type Item = WeightedPoint;
    type IntoIter = std::vec::IntoIter<WeightedPoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.into_iter()
    }
}

impl FromIterator<WeightedPoint> for PointSet {
    fn from_iter<I: IntoIterator<Item = WeightedPoint>>(iter: I) -> Self {
        Self {
            points: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_point_at_pixel_center() {
        let gt = GeoTransform::new(100.0, 200.0, 10.0, -10.0);
        let p = WeightedPoint::at_pixel(&gt, 2, 3, 1.0);
        assert_relative_eq!(p.x(), 125.0);
        assert_relative_eq!(p.y(), 165.0);
        assert_eq!((p.col, p.row), (2, 3));
    }

    #[test]
    fn test_total_weight() {
        let gt = GeoTransform::default();
        let set: PointSet = (0..4).map(|c| WeightedPoint::at_pixel(&gt, c, 0, 1.0)).collect();
        assert_eq!(set.len(), 4);
        assert_relative_eq!(set.total_weight(), 4.0);
    }
}
