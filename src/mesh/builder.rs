use std::collections::HashMap;

use crate::error::ExtrudeError;

/// A triangle for STL output
#[derive(Debug, Clone)]
pub struct Triangle {
    /// Three vertices: [[x, y, z], [x, y, z], [x, y, z]]
    pub vertices: [[f32; 3]; 3],
    /// Normal vector [nx, ny, nz]
    pub normal: [f32; 3],
}

impl Triangle {
    /// Create a new triangle and calculate its normal
    pub fn new(v0: [f32; 3], v1: [f32; 3], v2: [f32; 3]) -> Self {
        let n = face_normal(&[widen(v0), widen(v1), widen(v2)]);
        Self {
            vertices: [v0, v1, v2],
            normal: narrow(n),
        }
    }
}

fn widen(v: [f32; 3]) -> [f64; 3] {
    [v[0] as f64, v[1] as f64, v[2] as f64]
}

fn narrow(v: [f64; 3]) -> [f32; 3] {
    [v[0] as f32, v[1] as f32, v[2] as f32]
}

pub(crate) fn sub(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

pub(crate) fn cross(u: [f64; 3], v: [f64; 3]) -> [f64; 3] {
    [
        u[1] * v[2] - u[2] * v[1],
        u[2] * v[0] - u[0] * v[2],
        u[0] * v[1] - u[1] * v[0],
    ]
}

pub(crate) fn dot(u: [f64; 3], v: [f64; 3]) -> f64 {
    u[0] * v[0] + u[1] * v[1] + u[2] * v[2]
}

pub(crate) fn norm(v: [f64; 3]) -> f64 {
    dot(v, v).sqrt()
}

/// Unit normal by the right-hand rule; +Z for degenerate triangles.
pub fn face_normal(corners: &[[f64; 3]; 3]) -> [f64; 3] {
    let n = cross(sub(corners[1], corners[0]), sub(corners[2], corners[0]));
    let len = norm(n);
    if len > 1e-12 {
        [n[0] / len, n[1] / len, n[2] / len]
    } else {
        [0.0, 0.0, 1.0]
    }
}

/// An indexed triangle mesh.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh3D {
    pub vertices: Vec<[f64; 3]>,
    pub faces: Vec<[usize; 3]>,
}

impl Mesh3D {
    pub fn new(vertices: Vec<[f64; 3]>, faces: Vec<[usize; 3]>) -> Self {
        Self { vertices, faces }
    }

    /// Axis-aligned box spanning `[0, extents]` on each axis, outward
    /// facing.
    pub fn cuboid(extents: [f64; 3]) -> Result<Self, ExtrudeError> {
        if extents.iter().any(|e| !e.is_finite() || *e <= 0.0) {
            return Err(ExtrudeError::InvalidExtents(extents));
        }
        let [x, y, z] = extents;
        let footprint = [(0.0, 0.0), (x, 0.0), (x, y), (0.0, y)];

        let mut mesh = Self::default();
        let base = mesh.add_ring(&footprint, 0.0);
        let top = mesh.add_ring(&footprint, z);
        mesh.faces.extend([
            [base, base + 2, base + 1],
            [base, base + 3, base + 2],
            [top, top + 1, top + 2],
            [top, top + 2, top + 3],
        ]);
        mesh.add_side_walls(base, top, footprint.len());
        Ok(mesh)
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    /// Append a ring of 2D points at height `z`, returning the index of its
    /// first vertex.
    pub fn add_ring(&mut self, ring: &[(f64, f64)], z: f64) -> usize {
        let start = self.vertices.len();
        self.vertices.extend(ring.iter().map(|&(x, y)| [x, y, z]));
        start
    }

    /// Two triangles per ring edge between a bottom and a top ring of
    /// `n` vertices each. Outward for counter-clockwise rings.
    pub fn add_side_walls(&mut self, bottom: usize, top: usize, n: usize) {
        for i in 0..n {
            let j = (i + 1) % n;
            self.faces.push([bottom + i, bottom + j, top + j]);
            self.faces.push([top + j, top + i, bottom + i]);
        }
    }

    pub fn corners(&self, face: &[usize; 3]) -> [[f64; 3]; 3] {
        [
            self.vertices[face[0]],
            self.vertices[face[1]],
            self.vertices[face[2]],
        ]
    }

    /// All face indices are in range.
    pub fn indices_valid(&self) -> bool {
        let n = self.vertices.len();
        self.faces.iter().all(|f| f.iter().all(|&i| i < n))
    }

    pub fn bounds(&self) -> Option<([f64; 3], [f64; 3])> {
        let first = *self.vertices.first()?;
        Some(self.vertices.iter().fold((first, first), |(mut lo, mut hi), v| {
            for axis in 0..3 {
                lo[axis] = lo[axis].min(v[axis]);
                hi[axis] = hi[axis].max(v[axis]);
            }
            (lo, hi)
        }))
    }

    pub fn dimensions(&self) -> Option<[f64; 3]> {
        self.bounds()
            .map(|(lo, hi)| [hi[0] - lo[0], hi[1] - lo[1], hi[2] - lo[2]])
    }

    pub fn surface_area(&self) -> f64 {
        self.faces
            .iter()
            .map(|f| {
                let [a, b, c] = self.corners(f);
                0.5 * norm(cross(sub(b, a), sub(c, a)))
            })
            .sum()
    }

    /// Signed volume by the divergence theorem; positive when faces point
    /// outward on a closed mesh.
    pub fn signed_volume(&self) -> f64 {
        self.faces
            .iter()
            .map(|f| {
                let [a, b, c] = self.corners(f);
                dot(a, cross(b, c)) / 6.0
            })
            .sum()
    }

    /// Occurrence count of every undirected edge, keyed `(min, max)`.
    pub fn edge_face_counts(&self) -> HashMap<(usize, usize), usize> {
        let mut counts = HashMap::new();
        for face in &self.faces {
            for k in 0..3 {
                let (a, b) = (face[k], face[(k + 1) % 3]);
                *counts.entry((a.min(b), a.max(b))).or_insert(0) += 1;
            }
        }
        counts
    }

    /// Flatten into STL triangles with per-face normals.
    pub fn triangles(&self) -> Vec<Triangle> {
        self.faces
            .iter()
            .map(|f| {
                let [a, b, c] = self.corners(f);
                Triangle::new(narrow(a), narrow(b), narrow(c))
            })
            .collect()
    }
}
