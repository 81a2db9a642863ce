//! Mesh validation for 3D printing
//!
//! Checks an extruded mesh for:
//! - Watertightness (every edge shared by exactly two faces)
//! - Degenerate total surface area
//! - Consistent face winding
//! - Self-intersections between non-adjacent faces
//! - Minimum feature size along every axis

use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, warn};

use super::Mesh3D;
use super::builder::{cross, dot, sub};
use crate::config::limits::{MIN_FEATURE_SIZE, MIN_SURFACE_AREA};

/// Outcome of [`validate`]: the mesh is valid iff `issues` is empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub issues: Vec<String>,
}

impl ValidationReport {
    fn from_issues(issues: Vec<String>) -> Self {
        Self {
            is_valid: issues.is_empty(),
            issues,
        }
    }

    pub fn summary(&self) -> String {
        if self.is_valid {
            "Mesh valid, no issues".to_string()
        } else {
            format!("Mesh issues: {}", self.issues.join(", "))
        }
    }
}

/// Run every check against `mesh`. A missing mesh yields a single
/// "mesh is null" issue.
pub fn validate(mesh: Option<&Mesh3D>) -> ValidationReport {
    let Some(mesh) = mesh else {
        return ValidationReport::from_issues(vec!["mesh is null".to_string()]);
    };

    let mut issues = Vec::new();

    if !mesh.indices_valid() {
        // nothing else can be checked safely
        issues.push("face index out of range".to_string());
        return ValidationReport::from_issues(issues);
    }

    if !is_watertight(mesh) {
        issues.push("not watertight".to_string());
    }

    if mesh.surface_area() <= MIN_SURFACE_AREA {
        issues.push("area too small".to_string());
    }

    if !is_winding_consistent(mesh) {
        issues.push("inconsistent winding".to_string());
    }

    if is_self_intersecting(mesh) {
        issues.push("self-intersections".to_string());
    }

    let min_dimension = mesh
        .dimensions()
        .map(|d| d[0].min(d[1]).min(d[2]))
        .unwrap_or(0.0);
    if !(min_dimension >= MIN_FEATURE_SIZE) {
        issues.push(format!("too thin: {:.3}", min_dimension));
    }

    let report = ValidationReport::from_issues(issues);
    if report.is_valid {
        debug!(
            "Mesh valid: {} vertices, {} faces",
            mesh.vertex_count(),
            mesh.face_count()
        );
    } else {
        warn!("{}", report.summary());
    }
    report
}

/// Every edge borders exactly two faces. A mesh without faces is not
/// watertight.
pub fn is_watertight(mesh: &Mesh3D) -> bool {
    !mesh.faces.is_empty() && mesh.edge_face_counts().values().all(|&c| c == 2)
}

/// No directed edge is used twice, so faces sharing an edge traverse it in
/// opposite directions.
pub fn is_winding_consistent(mesh: &Mesh3D) -> bool {
    let mut seen = HashSet::with_capacity(mesh.faces.len() * 3);
    mesh.faces.iter().all(|face| {
        (0..3).all(|k| seen.insert((face[k], face[(k + 1) % 3])))
    })
}

const INTERSECT_EPS: f64 = 1e-9;

/// Whether any two faces that share no vertex cross each other.
///
/// Coplanar overlaps are not detected; every other crossing is found by
/// testing each edge of one triangle against the interior of the other.
pub fn is_self_intersecting(mesh: &Mesh3D) -> bool {
    let boxes: Vec<([f64; 3], [f64; 3])> = mesh
        .faces
        .iter()
        .map(|f| {
            let c = mesh.corners(f);
            let mut lo = c[0];
            let mut hi = c[0];
            for v in &c[1..] {
                for axis in 0..3 {
                    lo[axis] = lo[axis].min(v[axis]);
                    hi[axis] = hi[axis].max(v[axis]);
                }
            }
            (lo, hi)
        })
        .collect();

    for i in 0..mesh.faces.len() {
        for j in (i + 1)..mesh.faces.len() {
            let (fa, fb) = (&mesh.faces[i], &mesh.faces[j]);
            if fa.iter().any(|v| fb.contains(v)) {
                continue;
            }
            let (lo_a, hi_a) = boxes[i];
            let (lo_b, hi_b) = boxes[j];
            if (0..3).any(|k| hi_a[k] < lo_b[k] || hi_b[k] < lo_a[k]) {
                continue;
            }
            let (a, b) = (mesh.corners(fa), mesh.corners(fb));
            if edges_cross(&a, &b) || edges_cross(&b, &a) {
                debug!("Faces {} and {} intersect", i, j);
                return true;
            }
        }
    }
    false
}

fn edges_cross(edges_of: &[[f64; 3]; 3], tri: &[[f64; 3]; 3]) -> bool {
    (0..3).any(|k| segment_hits_triangle(edges_of[k], edges_of[(k + 1) % 3], tri))
}

/// Moller-Trumbore restricted to the open segment and triangle interior.
fn segment_hits_triangle(p: [f64; 3], q: [f64; 3], tri: &[[f64; 3]; 3]) -> bool {
    let dir = sub(q, p);
    let e1 = sub(tri[1], tri[0]);
    let e2 = sub(tri[2], tri[0]);
    let h = cross(dir, e2);
    let det = dot(e1, h);
    if det.abs() < INTERSECT_EPS {
        return false;
    }
    let inv = 1.0 / det;
    let s = sub(p, tri[0]);
    let u = inv * dot(s, h);
    if u <= INTERSECT_EPS || u >= 1.0 - INTERSECT_EPS {
        return false;
    }
    let qv = cross(s, e1);
    let v = inv * dot(dir, qv);
    if v <= INTERSECT_EPS || u + v >= 1.0 - INTERSECT_EPS {
        return false;
    }
    let t = inv * dot(e2, qv);
    t > INTERSECT_EPS && t < 1.0 - INTERSECT_EPS
}
