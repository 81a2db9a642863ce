use tracing::debug;

use super::RawContour;
use crate::config::limits::CLOSURE_TOLERANCE;
use crate::geometry::simplify::distance;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurveKind {
    Polyline,
}

/// A vectorized curve in image coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct CurveRecord {
    pub kind: CurveKind,
    pub points: Vec<(f64, f64)>,
    /// First and last point lie within [`CLOSURE_TOLERANCE`] of each other.
    pub closed: bool,
    /// Position of the contour this curve came from.
    pub source_index: usize,
}

impl CurveRecord {
    pub fn polyline(points: Vec<(f64, f64)>, source_index: usize) -> Self {
        let closed = match (points.first(), points.last()) {
            (Some(&first), Some(&last)) => distance(first, last) < CLOSURE_TOLERANCE,
            _ => false,
        };
        Self {
            kind: CurveKind::Polyline,
            points,
            closed,
            source_index,
        }
    }
}

/// Turn contours into curve records, skipping any with fewer than three
/// points.
pub fn vectorize(contours: &[RawContour]) -> Vec<CurveRecord> {
    let curves: Vec<CurveRecord> = contours
        .iter()
        .enumerate()
        .filter(|(_, contour)| contour.len() >= 3)
        .map(|(i, contour)| {
            let curve = CurveRecord::polyline(contour.points_f64(), i);
            debug!(
                "Contour {}: {} points, closed: {}",
                i,
                curve.points.len(),
                curve.closed
            );
            curve
        })
        .collect();

    debug!("Vectorized {} curves", curves.len());
    curves
}
