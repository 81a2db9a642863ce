//! Contour detection on binary images.
//!
//! Border following (Suzuki-Abe, via `imageproc`) retrieves every outer and
//! hole border. Straight runs are compressed to their endpoints, short
//! specks are filtered out, and [`ContourExtractor::refine`] reduces each
//! survivor with a perimeter-relative Douglas-Peucker tolerance.

use image::GrayImage;
use imageproc::contours::{BorderType, find_contours};
use tracing::debug;

use crate::config::ContourConfig;
use crate::geometry::simplify::{arc_length, compress_collinear, simplify_ring};

/// Whether a border encloses foreground or a hole inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BorderKind {
    Outer,
    Hole,
}

/// A pixel boundary as traced from the image.
#[derive(Debug, Clone, PartialEq)]
pub struct RawContour {
    pub points: Vec<(i32, i32)>,
    pub kind: BorderKind,
    /// Index of the enclosing border in the traced set, if any.
    ///
    /// Refers to positions in the unfiltered trace, so it is only
    /// meaningful for diagnostics.
    pub parent: Option<usize>,
}

impl RawContour {
    pub fn new(points: Vec<(i32, i32)>) -> Self {
        Self {
            points,
            kind: BorderKind::Outer,
            parent: None,
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Perimeter of the contour treated as a closed ring.
    pub fn perimeter(&self) -> f64 {
        arc_length(&self.points_f64(), true)
    }

    pub fn points_f64(&self) -> Vec<(f64, f64)> {
        self.points
            .iter()
            .map(|&(x, y)| (x as f64, y as f64))
            .collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ContourExtractor {
    config: ContourConfig,
}

impl ContourExtractor {
    pub fn new(config: ContourConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ContourConfig {
        &self.config
    }

    /// Trace all borders in `image` and keep those longer than
    /// `min_contour_length`. Non-zero pixels are foreground.
    pub fn detect(&self, image: &GrayImage) -> Vec<RawContour> {
        let traced = find_contours::<i32>(image);
        let found = traced.len();

        let contours: Vec<RawContour> = traced
            .into_iter()
            .map(|c| RawContour {
                points: compress_collinear(
                    &c.points.iter().map(|p| (p.x, p.y)).collect::<Vec<_>>(),
                ),
                kind: match c.border_type {
                    BorderType::Outer => BorderKind::Outer,
                    BorderType::Hole => BorderKind::Hole,
                },
                parent: c.parent,
            })
            .filter(|c| c.perimeter() > self.config.min_contour_length)
            .collect();

        debug!(
            "Found {} contours, {} after length filter (> {})",
            found,
            contours.len(),
            self.config.min_contour_length
        );
        contours
    }

    /// Approximate each contour with tolerance `epsilon_factor * perimeter`,
    /// discarding results with fewer than three points.
    pub fn refine(&self, contours: &[RawContour]) -> Vec<RawContour> {
        let refined: Vec<RawContour> = contours
            .iter()
            .filter_map(|contour| {
                let epsilon = self.config.epsilon_factor * contour.perimeter();
                let simplified = simplify_ring(&contour.points_f64(), epsilon);
                if simplified.len() < 3 {
                    return None;
                }
                Some(RawContour {
                    points: simplified
                        .into_iter()
                        .map(|(x, y)| (x.round() as i32, y.round() as i32))
                        .collect(),
                    kind: contour.kind,
                    parent: contour.parent,
                })
            })
            .collect();

        debug!("Refined {} of {} contours", refined.len(), contours.len());
        refined
    }
}
