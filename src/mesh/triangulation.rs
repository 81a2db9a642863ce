//! Footprint triangulation backends.
//!
//! Both engines take an open ring and return triangles as index triples into
//! that ring, wound counter-clockwise. An engine fails rather than returning
//! triangles that do not exactly tile the ring.

use earcutr::earcut;
use tess2_rust::tess::TESS_UNDEF;
use tess2_rust::{ElementType, TessOption, Tessellator, WindingRule};

use crate::error::ExtrudeError;
use crate::geometry::polygon::{check_ring, signed_ring_area};

/// Relative mismatch allowed between the ring area and the summed area of
/// its triangles.
const AREA_TOLERANCE: f64 = 1e-6;

pub trait Triangulator {
    fn name(&self) -> &'static str;

    fn triangulate(&self, ring: &[(f64, f64)]) -> Result<Vec<[usize; 3]>, ExtrudeError>;
}

/// Ear clipping via `earcutr`. Rejects rings that are not simple.
#[derive(Debug, Clone, Copy, Default)]
pub struct EarcutTriangulator;

impl Triangulator for EarcutTriangulator {
    fn name(&self) -> &'static str {
        "earcut"
    }

    fn triangulate(&self, ring: &[(f64, f64)]) -> Result<Vec<[usize; 3]>, ExtrudeError> {
        check_ring(ring)?;

        let indices = triangulate_polygon_f64(ring, &[]);
        finish(ring, &indices)
    }
}

/// Sweep-line tessellation via the libtess2 port, with constrained
/// Delaunay refinement. Fails if tessellation has to invent vertices, which
/// happens exactly when the ring crosses itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct TessTriangulator;

impl Triangulator for TessTriangulator {
    fn name(&self) -> &'static str {
        "libtess2"
    }

    fn triangulate(&self, ring: &[(f64, f64)]) -> Result<Vec<[usize; 3]>, ExtrudeError> {
        if ring.len() < 3 {
            return Err(ExtrudeError::Triangulation(format!(
                "libtess2: ring has {} vertices",
                ring.len()
            )));
        }

        let flat: Vec<f32> = ring
            .iter()
            .flat_map(|&(x, y)| [x as f32, y as f32])
            .collect();

        let mut tess = Tessellator::new();
        tess.set_option(TessOption::ConstrainedDelaunayTriangulation, true);
        let flat: Vec<f64> = flat.into_iter().map(f64::from).collect();
        tess.add_contour(2, &flat);
        if !tess.tessellate(WindingRule::Odd, ElementType::Polygons, 3, 2, None) {
            return Err(ExtrudeError::Triangulation(format!(
                "libtess2: status {:?}",
                tess.get_status()
            )));
        }

        let to_ring = tess.vertex_indices();
        let mut indices = Vec::with_capacity(tess.elements().len());
        for &out in tess.elements() {
            if out == TESS_UNDEF {
                return Err(ExtrudeError::Triangulation(
                    "libtess2: incomplete triangle".to_string(),
                ));
            }
            match to_ring.get(out as usize) {
                Some(&src) if src != TESS_UNDEF && (src as usize) < ring.len() => {
                    indices.push(src as usize)
                }
                _ => {
                    return Err(ExtrudeError::Triangulation(
                        "libtess2: ring crosses itself".to_string(),
                    ));
                }
            }
        }
        finish(ring, &indices)
    }
}

/// Ear-clip an outer ring with optional holes into indices over the
/// concatenated ring-then-holes vertex list. Empty on failure.
pub fn triangulate_polygon_f64(outer: &[(f64, f64)], holes: &[Vec<(f64, f64)>]) -> Vec<usize> {
    if outer.len() < 3 {
        return Vec::new();
    }

    let mut vertices: Vec<f64> =
        Vec::with_capacity((outer.len() + holes.iter().map(|h| h.len()).sum::<usize>()) * 2);
    let mut hole_indices: Vec<usize> = Vec::with_capacity(holes.len());

    for &(x, y) in outer {
        vertices.push(x);
        vertices.push(y);
    }

    for hole in holes {
        hole_indices.push(vertices.len() / 2);
        for &(x, y) in hole {
            vertices.push(x);
            vertices.push(y);
        }
    }

    earcut(&vertices, &hole_indices, 2).unwrap_or_default()
}

/// Group flat indices into counter-clockwise triples and check they cover
/// the ring.
fn finish(ring: &[(f64, f64)], indices: &[usize]) -> Result<Vec<[usize; 3]>, ExtrudeError> {
    if indices.is_empty() || indices.len() % 3 != 0 {
        return Err(ExtrudeError::Triangulation(format!(
            "{} indices do not form triangles",
            indices.len()
        )));
    }

    let triangles: Vec<[usize; 3]> = indices
        .chunks_exact(3)
        .map(|t| {
            let tri = [t[0], t[1], t[2]];
            if triangle_signed_area(ring, &tri) < 0.0 {
                [tri[0], tri[2], tri[1]]
            } else {
                tri
            }
        })
        .collect();

    let expected = signed_ring_area(ring).abs();
    let covered: f64 = triangles
        .iter()
        .map(|t| triangle_signed_area(ring, t))
        .sum();
    if !(expected > 0.0) || (covered - expected).abs() > AREA_TOLERANCE * expected {
        return Err(ExtrudeError::Triangulation(format!(
            "triangles cover {covered:.6} of ring area {expected:.6}"
        )));
    }

    Ok(triangles)
}

fn triangle_signed_area(ring: &[(f64, f64)], tri: &[usize; 3]) -> f64 {
    let (ax, ay) = ring[tri[0]];
    let (bx, by) = ring[tri[1]];
    let (cx, cy) = ring[tri[2]];
    0.5 * ((bx - ax) * (cy - ay) - (cx - ax) * (by - ay))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Vec<(f64, f64)> {
        vec![(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)]
    }

    fn bowtie() -> Vec<(f64, f64)> {
        vec![(0.0, 0.0), (10.0, 10.0), (10.0, 0.0), (0.0, 10.0)]
    }

    #[test]
    fn test_triangulate_square() {
        let indices = triangulate_polygon_f64(&square(), &[]);
        assert_eq!(indices.len(), 6);
    }

    #[test]
    fn test_triangulate_empty() {
        let indices = triangulate_polygon_f64(&[], &[]);
        assert!(indices.is_empty());
    }

    #[test]
    fn test_triangulate_with_hole() {
        let outer = vec![(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)];
        let hole = vec![(2.0, 2.0), (8.0, 2.0), (8.0, 8.0), (2.0, 8.0)];
        let indices = triangulate_polygon_f64(&outer, &[hole]);
        assert!(!indices.is_empty());
        assert_eq!(indices.len() % 3, 0);
    }

    #[test]
    fn test_engines_wind_counter_clockwise() {
        // clockwise input
        let mut ring = square();
        ring.reverse();
        for engine in [&EarcutTriangulator as &dyn Triangulator, &TessTriangulator] {
            let triangles = engine.triangulate(&ring).unwrap();
            assert_eq!(triangles.len(), 2, "{}", engine.name());
            assert!(triangles.iter().all(|t| triangle_signed_area(&ring, t) > 0.0));
        }
    }

    #[test]
    fn test_engines_handle_concave_ring() {
        let ring = vec![
            (0.0, 0.0),
            (10.0, 0.0),
            (10.0, 10.0),
            (5.0, 3.0),
            (0.0, 10.0),
        ];
        for engine in [&EarcutTriangulator as &dyn Triangulator, &TessTriangulator] {
            let triangles = engine.triangulate(&ring).unwrap();
            assert_eq!(triangles.len(), 3, "{}", engine.name());
        }
    }

    #[test]
    fn test_engines_reject_bowtie() {
        assert!(EarcutTriangulator.triangulate(&bowtie()).is_err());
        assert!(TessTriangulator.triangulate(&bowtie()).is_err());
    }

    #[test]
    fn test_engines_reject_short_ring() {
        let ring = vec![(0.0, 0.0), (1.0, 0.0)];
        assert!(EarcutTriangulator.triangulate(&ring).is_err());
        assert!(TessTriangulator.triangulate(&ring).is_err());
    }
}
