//! Polygon extrusion with a fixed fallback cascade.
//!
//! The dominant footprint is extruded by trying, in order: earcut caps,
//! libtess2 caps, a side-wall-only prism, a 30 x 30 placeholder box and
//! finally a hand-built box. The first strategy that succeeds wins, so a
//! non-empty polygon list always yields some mesh.

use serde::Serialize;
use tracing::{debug, info, warn};

use super::Mesh3D;
use super::triangulation::{EarcutTriangulator, TessTriangulator, Triangulator};
use crate::config::limits::PLACEHOLDER_SIZE;
use crate::error::ExtrudeError;
use crate::geometry::Polygon2D;
use crate::geometry::polygon::signed_ring_area;

/// Which tier of the cascade produced a mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtrusionStrategy {
    Triangulated,
    AlternateEngine,
    ManualPrism,
    PlaceholderBox,
    HandBuiltBox,
}

impl ExtrusionStrategy {
    /// Order in which strategies are attempted.
    pub const CASCADE: [ExtrusionStrategy; 5] = [
        Self::Triangulated,
        Self::AlternateEngine,
        Self::ManualPrism,
        Self::PlaceholderBox,
        Self::HandBuiltBox,
    ];

    /// Tiers that may fail; the hand-built box always succeeds.
    const FALLIBLE: [ExtrusionStrategy; 4] = [
        Self::Triangulated,
        Self::AlternateEngine,
        Self::ManualPrism,
        Self::PlaceholderBox,
    ];

    pub fn is_fallback(self) -> bool {
        self != Self::Triangulated
    }

    fn attempt(
        self,
        engines: &Engines<'_>,
        footprint: &Polygon2D,
        thickness: f64,
    ) -> Result<Mesh3D, ExtrudeError> {
        match self {
            Self::Triangulated => triangulated_prism(engines.primary, footprint, thickness),
            Self::AlternateEngine => triangulated_prism(engines.alternate, footprint, thickness),
            Self::ManualPrism => manual_prism(footprint, thickness),
            Self::PlaceholderBox => {
                Mesh3D::cuboid([PLACEHOLDER_SIZE, PLACEHOLDER_SIZE, thickness])
            }
            Self::HandBuiltBox => Ok(hand_built_box(thickness)),
        }
    }
}

/// Cap triangulators for the first two tiers.
struct Engines<'a> {
    primary: &'a dyn Triangulator,
    alternate: &'a dyn Triangulator,
}

const DEFAULT_ENGINES: Engines<'static> = Engines {
    primary: &EarcutTriangulator,
    alternate: &TessTriangulator,
};

/// A mesh together with the strategy that produced it.
#[derive(Debug, Clone)]
pub struct Extrusion {
    pub mesh: Mesh3D,
    pub strategy: ExtrusionStrategy,
    /// Area of the footprint that was selected for extrusion.
    pub footprint_area: f64,
}

/// Pick the valid polygon with the largest area; the first one wins ties.
///
/// When no polygon is valid, the largest non-empty one is returned instead
/// so the fallback tiers still get a footprint.
pub fn select_dominant(polygons: &[Polygon2D]) -> Option<&Polygon2D> {
    largest(polygons.iter().filter(|p| p.is_valid())).or_else(|| {
        debug!("No valid polygon, selecting among invalid ones");
        largest(polygons.iter().filter(|p| !p.is_empty()))
    })
}

fn largest<'a>(candidates: impl Iterator<Item = &'a Polygon2D>) -> Option<&'a Polygon2D> {
    let mut best: Option<(&Polygon2D, f64)> = None;
    for polygon in candidates {
        let area = polygon.area();
        if !area.is_finite() {
            continue;
        }
        match best {
            Some((_, best_area)) if area <= best_area => {}
            _ => best = Some((polygon, area)),
        }
    }
    best.map(|(polygon, _)| polygon)
}

/// Extrude the dominant polygon to `thickness`.
///
/// Returns `None` only when there is nothing to extrude.
pub fn extrude(polygons: &[Polygon2D], thickness: f64) -> Option<Mesh3D> {
    extrude_detailed(polygons, thickness).map(|e| e.mesh)
}

pub fn extrude_detailed(polygons: &[Polygon2D], thickness: f64) -> Option<Extrusion> {
    extrude_with(&DEFAULT_ENGINES, polygons, thickness)
}

fn extrude_with(
    engines: &Engines<'_>,
    polygons: &[Polygon2D],
    thickness: f64,
) -> Option<Extrusion> {
    if polygons.is_empty() {
        info!("No valid polygons to extrude");
        return None;
    }

    let Some(footprint) = select_dominant(polygons) else {
        info!("No valid polygons found");
        return None;
    };
    let footprint_area = footprint.area();
    info!("Extruding polygon with area: {:.2}", footprint_area);

    let (mesh, strategy) = run_cascade(engines, footprint, thickness);
    Some(Extrusion {
        mesh,
        strategy,
        footprint_area,
    })
}

fn run_cascade(
    engines: &Engines<'_>,
    footprint: &Polygon2D,
    thickness: f64,
) -> (Mesh3D, ExtrusionStrategy) {
    for strategy in ExtrusionStrategy::FALLIBLE {
        match strategy.attempt(engines, footprint, thickness) {
            Ok(mesh) => {
                if strategy.is_fallback() {
                    warn!("Extrusion fell back to {:?}", strategy);
                } else {
                    debug!("Extruded with {:?}", strategy);
                }
                return (mesh, strategy);
            }
            Err(e) => warn!("{:?} extrusion failed: {}", strategy, e),
        }
    }

    warn!("Extrusion fell back to {:?}", ExtrusionStrategy::HandBuiltBox);
    (hand_built_box(thickness), ExtrusionStrategy::HandBuiltBox)
}

fn check_thickness(thickness: f64) -> Result<(), ExtrudeError> {
    if thickness.is_finite() && thickness > 0.0 {
        Ok(())
    } else {
        Err(ExtrudeError::InvalidThickness(thickness))
    }
}

/// Exterior ring reordered counter-clockwise so walls face outward.
fn ccw_ring(footprint: &Polygon2D) -> Vec<(f64, f64)> {
    let mut ring = footprint.exterior().to_vec();
    if signed_ring_area(&ring) < 0.0 {
        ring.reverse();
    }
    ring
}

/// Closed prism: triangulated caps plus side walls over shared vertices.
fn triangulated_prism(
    engine: &dyn Triangulator,
    footprint: &Polygon2D,
    thickness: f64,
) -> Result<Mesh3D, ExtrudeError> {
    check_thickness(thickness)?;
    let ring = ccw_ring(footprint);
    let cap = engine.triangulate(&ring)?;
    debug!("{} produced {} cap triangles", engine.name(), cap.len());

    let n = ring.len();
    let mut mesh = Mesh3D::default();
    let bottom = mesh.add_ring(&ring, 0.0);
    let top = mesh.add_ring(&ring, thickness);

    for &[a, b, c] in &cap {
        mesh.faces.push([top + a, top + b, top + c]);
        mesh.faces.push([bottom + a, bottom + c, bottom + b]);
    }
    mesh.add_side_walls(bottom, top, n);

    Ok(mesh)
}

/// Side walls only: the bottom and top rings are left open.
fn manual_prism(footprint: &Polygon2D, thickness: f64) -> Result<Mesh3D, ExtrudeError> {
    check_thickness(thickness)?;
    let ring = ccw_ring(footprint);
    if ring.len() < 3 {
        return Err(ExtrudeError::Triangulation(format!(
            "prism needs 3 ring vertices, got {}",
            ring.len()
        )));
    }
    if ring.iter().any(|(x, y)| !x.is_finite() || !y.is_finite()) {
        return Err(ExtrudeError::Triangulation(
            "prism ring has non-finite coordinates".to_string(),
        ));
    }

    let mut mesh = Mesh3D::default();
    let bottom = mesh.add_ring(&ring, 0.0);
    let top = mesh.add_ring(&ring, thickness);
    mesh.add_side_walls(bottom, top, ring.len());
    Ok(mesh)
}

/// Placeholder box written out by hand, used when nothing else worked.
fn hand_built_box(thickness: f64) -> Mesh3D {
    let s = PLACEHOLDER_SIZE;
    let t = thickness;
    let vertices = vec![
        [0.0, 0.0, 0.0],
        [s, 0.0, 0.0],
        [s, s, 0.0],
        [0.0, s, 0.0],
        [0.0, 0.0, t],
        [s, 0.0, t],
        [s, s, t],
        [0.0, s, t],
    ];
    let faces = vec![
        // bottom
        [0, 2, 1],
        [0, 3, 2],
        // top
        [4, 5, 6],
        [4, 6, 7],
        // front
        [0, 1, 5],
        [0, 5, 4],
        // right
        [1, 2, 6],
        [1, 6, 5],
        // back
        [2, 3, 7],
        [2, 7, 6],
        // left
        [3, 0, 4],
        [3, 4, 7],
    ];
    Mesh3D::new(vertices, faces)
}
