//! Planar polygons built from vectorized curves.

use geo::algorithm::line_intersection::{LineIntersection, line_intersection};
use geo::{Area, Coord, Line, LineString};
use tracing::{debug, warn};

use crate::config::limits::MIN_POLYGON_AREA;
use crate::contour::{CurveKind, CurveRecord};
use crate::error::GeometryError;

/// A planar polygon: one exterior ring plus optional holes.
///
/// Rings are stored open (the first vertex is not repeated at the end).
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon2D {
    exterior: Vec<(f64, f64)>,
    holes: Vec<Vec<(f64, f64)>>,
}

impl Polygon2D {
    /// Build a polygon from a ring, rejecting anything that is not simple.
    pub fn try_from_ring(points: &[(f64, f64)]) -> Result<Self, GeometryError> {
        let polygon = Self::from_ring_unchecked(points.to_vec());
        polygon.check()?;
        Ok(polygon)
    }

    /// Wrap a ring without validating it. A trailing copy of the first
    /// vertex is dropped.
    pub fn from_ring_unchecked(mut points: Vec<(f64, f64)>) -> Self {
        if points.len() > 1 && points.first() == points.last() {
            points.pop();
        }
        Self {
            exterior: points,
            holes: Vec::new(),
        }
    }

    pub fn with_holes(mut self, holes: Vec<Vec<(f64, f64)>>) -> Self {
        self.holes = holes;
        self
    }

    pub fn exterior(&self) -> &[(f64, f64)] {
        &self.exterior
    }

    pub fn holes(&self) -> &[Vec<(f64, f64)>] {
        &self.holes
    }

    pub fn is_empty(&self) -> bool {
        self.exterior.is_empty()
    }

    pub fn is_valid(&self) -> bool {
        self.check().is_ok()
    }

    /// Enclosed area (exterior minus holes), always non-negative.
    pub fn area(&self) -> f64 {
        self.to_geo().unsigned_area()
    }

    /// Shoelace area of the exterior ring; positive when counter-clockwise.
    pub fn signed_area(&self) -> f64 {
        signed_ring_area(&self.exterior)
    }

    pub fn to_geo(&self) -> geo::Polygon<f64> {
        geo::Polygon::new(
            to_line_string(&self.exterior),
            self.holes.iter().map(|h| to_line_string(h)).collect(),
        )
    }

    fn check(&self) -> Result<(), GeometryError> {
        check_ring(&self.exterior)?;
        if self.area() <= MIN_POLYGON_AREA {
            return Err(GeometryError::ZeroArea);
        }
        Ok(())
    }
}

fn to_line_string(ring: &[(f64, f64)]) -> LineString<f64> {
    ring.iter().map(|&(x, y)| Coord { x, y }).collect()
}

pub fn signed_ring_area(ring: &[(f64, f64)]) -> f64 {
    let n = ring.len();
    if n < 3 {
        return 0.0;
    }
    let twice: f64 = (0..n)
        .map(|i| {
            let (x0, y0) = ring[i];
            let (x1, y1) = ring[(i + 1) % n];
            x0 * y1 - x1 * y0
        })
        .sum();
    twice / 2.0
}

/// Verify that an open ring is a simple closed polygon boundary.
pub fn check_ring(ring: &[(f64, f64)]) -> Result<(), GeometryError> {
    let n = ring.len();
    if n < 3 {
        return Err(GeometryError::TooFewVertices(n));
    }

    if let Some(i) = ring.iter().position(|(x, y)| !x.is_finite() || !y.is_finite()) {
        return Err(GeometryError::NonFinite(i));
    }

    if let Some(i) = (0..n).find(|&i| ring[i] == ring[(i + 1) % n]) {
        return Err(GeometryError::CoincidentVertices(i));
    }

    let edge = |i: usize| {
        let (x0, y0) = ring[i];
        let (x1, y1) = ring[(i + 1) % n];
        Line::new(Coord { x: x0, y: y0 }, Coord { x: x1, y: y1 })
    };

    for i in 0..n {
        for j in (i + 1)..n {
            let adjacent = j == i + 1 || (i == 0 && j == n - 1);
            match line_intersection(edge(i), edge(j)) {
                None => {}
                // neighbours meet at their shared vertex
                Some(LineIntersection::SinglePoint { .. }) if adjacent => {}
                Some(_) => return Err(GeometryError::SelfIntersection(i, j)),
            }
        }
    }

    Ok(())
}

/// Build polygons from curve records, keeping input order.
///
/// Curves are not required to be `closed`; every polyline with more than two
/// points is tried as a ring. Curves that do not form a valid polygon are
/// skipped with a warning.
pub fn build_polygons(curves: &[CurveRecord]) -> Vec<Polygon2D> {
    let polygons: Vec<Polygon2D> = curves
        .iter()
        .filter(|curve| curve.kind == CurveKind::Polyline && curve.points.len() > 2)
        .filter_map(|curve| match Polygon2D::try_from_ring(&curve.points) {
            Ok(polygon) if !polygon.is_empty() => Some(polygon),
            Ok(_) => None,
            Err(e) => {
                warn!(
                    "Could not create polygon from curve {}: {}",
                    curve.source_index, e
                );
                None
            }
        })
        .collect();

    debug!("Built {} polygons from {} curves", polygons.len(), curves.len());
    polygons
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(size: f64) -> Vec<(f64, f64)> {
        vec![(0.0, 0.0), (size, 0.0), (size, size), (0.0, size)]
    }

    #[test]
    fn test_valid_square() {
        let polygon = Polygon2D::try_from_ring(&square(10.0)).unwrap();
        assert!((polygon.area() - 100.0).abs() < 1e-9);
        assert!(polygon.signed_area() > 0.0);
        assert!(polygon.is_valid());
    }

    #[test]
    fn test_closing_vertex_is_dropped() {
        let mut ring = square(4.0);
        ring.push((0.0, 0.0));
        let polygon = Polygon2D::try_from_ring(&ring).unwrap();
        assert_eq!(polygon.exterior().len(), 4);
    }

    #[test]
    fn test_bowtie_is_rejected() {
        let bowtie = vec![(0.0, 0.0), (10.0, 10.0), (10.0, 0.0), (0.0, 10.0)];
        assert!(matches!(
            Polygon2D::try_from_ring(&bowtie),
            Err(GeometryError::SelfIntersection(_, _))
        ));
        assert!(!Polygon2D::from_ring_unchecked(bowtie).is_valid());
    }

    #[test]
    fn test_collinear_ring_is_rejected() {
        let flat = vec![(0.0, 0.0), (5.0, 0.0), (10.0, 0.0)];
        assert!(Polygon2D::try_from_ring(&flat).is_err());
    }

    #[test]
    fn test_coincident_and_nan_rejected() {
        let dup = vec![(0.0, 0.0), (5.0, 0.0), (5.0, 0.0), (5.0, 5.0)];
        assert_eq!(
            Polygon2D::try_from_ring(&dup),
            Err(GeometryError::CoincidentVertices(1))
        );

        let nan = vec![(0.0, 0.0), (f64::NAN, 0.0), (5.0, 5.0)];
        assert_eq!(Polygon2D::try_from_ring(&nan), Err(GeometryError::NonFinite(1)));
    }

    #[test]
    fn test_build_polygons_skips_and_keeps_order() {
        let curves = vec![
            CurveRecord::polyline(square(10.0), 0),
            CurveRecord::polyline(vec![(0.0, 0.0), (10.0, 10.0), (10.0, 0.0), (0.0, 10.0)], 1),
            CurveRecord::polyline(vec![(0.0, 0.0), (1.0, 1.0)], 2),
            CurveRecord::polyline(square(20.0), 3),
        ];
        let polygons = build_polygons(&curves);

        assert_eq!(polygons.len(), 2);
        assert!(polygons.len() < curves.len());
        assert!((polygons[0].area() - 100.0).abs() < 1e-9);
        assert!((polygons[1].area() - 400.0).abs() < 1e-9);
    }

    #[test]
    fn test_open_curves_still_become_polygons() {
        // endpoints 40 apart, so the record is open
        let curve = CurveRecord::polyline(vec![(0.0, 0.0), (40.0, 0.0), (40.0, 40.0)], 0);
        assert!(!curve.closed);
        assert_eq!(build_polygons(&[curve]).len(), 1);
    }
}
