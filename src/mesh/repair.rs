//! Best-effort mesh repair.
//!
//! Steps run in a fixed order on a working copy. A step that errors is
//! rolled back and logged, and the next step still runs, so `repair` itself
//! never fails.

use std::collections::{HashMap, HashSet, VecDeque};

use tracing::{debug, info, warn};

use super::Mesh3D;
use super::builder::{cross, dot};
use super::triangulation::triangulate_polygon_f64;
use crate::config::limits::MERGE_TOLERANCE;
use crate::error::RepairError;

/// Repair `mesh`: merge coincident vertices, make winding consistent and
/// outward, fill boundary loops, then drop unreferenced vertices.
pub fn repair(mesh: Mesh3D) -> Mesh3D {
    let mut mesh = mesh;
    if mesh.is_empty() {
        warn!("Mesh has no faces, skipping repair");
        return mesh;
    }

    info!(
        "Starting mesh repair: {} vertices, {} faces",
        mesh.vertex_count(),
        mesh.face_count()
    );
    let (initial_verts, initial_faces) = (mesh.vertex_count(), mesh.face_count());

    guarded(&mut mesh, "merge vertices", |m| {
        merge_vertices(m, MERGE_TOLERANCE)
    });
    guarded(&mut mesh, "fix winding", fix_winding);
    guarded(&mut mesh, "fill holes", fill_holes);
    guarded(&mut mesh, "remove unreferenced vertices", remove_unreferenced_vertices);

    info!(
        "Repair complete: {} verts -> {}, {} faces -> {}",
        initial_verts,
        mesh.vertex_count(),
        initial_faces,
        mesh.face_count()
    );
    mesh
}

/// Run one step on a copy and keep the result only if it succeeded.
fn guarded<F>(mesh: &mut Mesh3D, name: &str, step: F)
where
    F: FnOnce(&mut Mesh3D) -> Result<usize, RepairError>,
{
    let mut work = mesh.clone();
    match step(&mut work) {
        Ok(changed) => {
            if changed > 0 {
                debug!("{}: {} changes", name, changed);
            }
            *mesh = work;
        }
        Err(e) => warn!("Could not {}: {}", name, e),
    }
}

fn check_indices(mesh: &Mesh3D) -> Result<(), RepairError> {
    let count = mesh.vertices.len();
    for (face, f) in mesh.faces.iter().enumerate() {
        if let Some(&index) = f.iter().find(|&&i| i >= count) {
            return Err(RepairError::IndexOutOfRange { face, index, count });
        }
    }
    Ok(())
}

type Cell = (i64, i64, i64);

// Saturates at the i64 range for very large coordinates.
fn cell_of(p: [f64; 3], size: f64) -> Cell {
    (
        (p[0] / size).floor() as i64,
        (p[1] / size).floor() as i64,
        (p[2] / size).floor() as i64,
    )
}

/// The 3x3x3 block around `cell`, minus cells that fall outside i64.
fn neighbour_cells((cx, cy, cz): Cell) -> impl Iterator<Item = Cell> {
    let offsets = [-1i64, 0, 1];
    offsets.into_iter().flat_map(move |dx| {
        offsets.into_iter().flat_map(move |dy| {
            offsets.into_iter().filter_map(move |dz| {
                Some((
                    cx.checked_add(dx)?,
                    cy.checked_add(dy)?,
                    cz.checked_add(dz)?,
                ))
            })
        })
    })
}

/// Weld vertices closer than `tolerance` into the lowest index of their
/// cluster and drop faces that collapse. Returns the number of vertices
/// merged away.
pub fn merge_vertices(mesh: &mut Mesh3D, tolerance: f64) -> Result<usize, RepairError> {
    check_indices(mesh)?;
    if let Some(idx) = mesh
        .vertices
        .iter()
        .position(|v| v.iter().any(|c| !c.is_finite()))
    {
        return Err(RepairError::NonFinite(idx));
    }
    let cell_size = tolerance * 2.0;

    let mut grid: HashMap<Cell, Vec<usize>> = HashMap::new();
    for (idx, &v) in mesh.vertices.iter().enumerate() {
        grid.entry(cell_of(v, cell_size)).or_default().push(idx);
    }

    let mut remap: Vec<usize> = (0..mesh.vertices.len()).collect();
    let mut merged = 0;

    for (idx, &v) in mesh.vertices.iter().enumerate() {
        if remap[idx] != idx {
            continue;
        }
        for cell in neighbour_cells(cell_of(v, cell_size)) {
            let Some(candidates) = grid.get(&cell) else {
                continue;
            };
            for &other in candidates {
                if other <= idx || remap[other] != other {
                    continue;
                }
                let o = mesh.vertices[other];
                let d = ((v[0] - o[0]).powi(2) + (v[1] - o[1]).powi(2) + (v[2] - o[2]).powi(2))
                    .sqrt();
                if d < tolerance {
                    remap[other] = idx;
                    merged += 1;
                }
            }
        }
    }

    if merged == 0 {
        return Ok(0);
    }

    for face in &mut mesh.faces {
        for i in face.iter_mut() {
            *i = remap[*i];
        }
    }
    let before = mesh.faces.len();
    mesh.faces.retain(|&[a, b, c]| a != b && b != c && a != c);

    info!(
        "Merged {} vertices, dropped {} collapsed faces",
        merged,
        before - mesh.faces.len()
    );
    Ok(merged)
}

fn has_directed_edge(face: &[usize; 3], a: usize, b: usize) -> bool {
    (0..3).any(|k| face[k] == a && face[(k + 1) % 3] == b)
}

/// Flood-fill each connected component so neighbours traverse shared edges
/// in opposite directions, then turn closed components outward by signed
/// volume. Returns the number of faces flipped.
pub fn fix_winding(mesh: &mut Mesh3D) -> Result<usize, RepairError> {
    check_indices(mesh)?;

    let mut edge_faces: HashMap<(usize, usize), Vec<usize>> = HashMap::new();
    for (fi, face) in mesh.faces.iter().enumerate() {
        for k in 0..3 {
            let (a, b) = (face[k], face[(k + 1) % 3]);
            edge_faces.entry((a.min(b), a.max(b))).or_default().push(fi);
        }
    }

    let mut visited = vec![false; mesh.faces.len()];
    let mut flipped = 0;

    for seed in 0..mesh.faces.len() {
        if visited[seed] {
            continue;
        }
        visited[seed] = true;
        let mut component = vec![seed];
        let mut queue = VecDeque::from([seed]);

        while let Some(fi) = queue.pop_front() {
            let face = mesh.faces[fi];
            for k in 0..3 {
                let (a, b) = (face[k], face[(k + 1) % 3]);
                for &gi in &edge_faces[&(a.min(b), a.max(b))] {
                    if visited[gi] {
                        continue;
                    }
                    if has_directed_edge(&mesh.faces[gi], a, b) {
                        mesh.faces[gi].swap(1, 2);
                        flipped += 1;
                    }
                    visited[gi] = true;
                    component.push(gi);
                    queue.push_back(gi);
                }
            }
        }

        let closed = component.iter().all(|&fi| {
            let f = mesh.faces[fi];
            (0..3).all(|k| {
                let (a, b) = (f[k], f[(k + 1) % 3]);
                edge_faces[&(a.min(b), a.max(b))].len() == 2
            })
        });
        if !closed {
            continue;
        }
        let volume: f64 = component
            .iter()
            .map(|&fi| {
                let [a, b, c] = mesh.corners(&mesh.faces[fi]);
                dot(a, cross(b, c)) / 6.0
            })
            .sum();
        if volume < 0.0 {
            for &fi in &component {
                mesh.faces[fi].swap(1, 2);
            }
            flipped += component.len();
            debug!("Turned component of {} faces outward", component.len());
        }
    }

    if flipped > 0 {
        info!("Flipped {} faces", flipped);
    }
    Ok(flipped)
}

/// Trace boundary loops, each oriented so that filling it matches the
/// winding of the faces around it.
pub fn boundary_loops(mesh: &Mesh3D) -> Result<Vec<Vec<usize>>, RepairError> {
    check_indices(mesh)?;
    let counts = mesh.edge_face_counts();

    // boundary edge a->b is closed by a fill face containing b->a
    let mut next: HashMap<usize, usize> = HashMap::new();
    for face in &mesh.faces {
        for k in 0..3 {
            let (a, b) = (face[k], face[(k + 1) % 3]);
            if counts[&(a.min(b), a.max(b))] == 1 && next.insert(b, a).is_some() {
                return Err(RepairError::NonManifoldBoundary(b));
            }
        }
    }

    let mut starts: Vec<usize> = next.keys().copied().collect();
    starts.sort_unstable();

    let mut used = HashSet::new();
    let mut loops = Vec::new();
    for start in starts {
        if used.contains(&start) {
            continue;
        }
        let mut ring = vec![start];
        used.insert(start);
        let mut current = start;
        loop {
            let Some(&after) = next.get(&current) else {
                return Err(RepairError::NonManifoldBoundary(current));
            };
            if after == start {
                break;
            }
            if !used.insert(after) {
                return Err(RepairError::NonManifoldBoundary(after));
            }
            ring.push(after);
            current = after;
        }
        loops.push(ring);
    }
    Ok(loops)
}

/// Triangulate every boundary loop. Returns the number of loops filled.
pub fn fill_holes(mesh: &mut Mesh3D) -> Result<usize, RepairError> {
    let loops = boundary_loops(mesh)?;
    for ring in &loops {
        let fill = fill_loop(mesh, ring)?;
        debug!("Filled loop of {} vertices with {} faces", ring.len(), fill.len());
        mesh.faces.extend(fill);
    }
    if !loops.is_empty() {
        info!("Filled {} holes", loops.len());
    }
    Ok(loops.len())
}

fn fill_loop(mesh: &Mesh3D, ring: &[usize]) -> Result<Vec<[usize; 3]>, RepairError> {
    let n = ring.len();
    if n < 3 {
        return Err(RepairError::HoleFill(n));
    }

    // Newell normal picks the projection plane
    let mut normal = [0.0; 3];
    for i in 0..n {
        let c = cross(mesh.vertices[ring[i]], mesh.vertices[ring[(i + 1) % n]]);
        for axis in 0..3 {
            normal[axis] += c[axis];
        }
    }
    let (u, v) = if normal[2].abs() >= normal[0].abs() && normal[2].abs() >= normal[1].abs() {
        (0, 1)
    } else if normal[0].abs() >= normal[1].abs() {
        (1, 2)
    } else {
        (2, 0)
    };
    let flat: Vec<(f64, f64)> = ring
        .iter()
        .map(|&i| (mesh.vertices[i][u], mesh.vertices[i][v]))
        .collect();

    let loop_area = area2(&flat, &(0..n).collect::<Vec<_>>());
    if !(loop_area.abs() > 0.0) {
        return Err(RepairError::HoleFill(n));
    }

    let indices = triangulate_polygon_f64(&flat, &[]);
    if indices.len() != 3 * (n - 2) {
        return Err(RepairError::HoleFill(n));
    }

    Ok(indices
        .chunks_exact(3)
        .map(|t| {
            let same = area2(&flat, t).signum() == loop_area.signum();
            let (a, b, c) = if same { (t[0], t[1], t[2]) } else { (t[0], t[2], t[1]) };
            [ring[a], ring[b], ring[c]]
        })
        .collect())
}

/// Twice the signed area of the polygon visiting `flat` in `order`.
fn area2(flat: &[(f64, f64)], order: &[usize]) -> f64 {
    let m = order.len();
    (0..m)
        .map(|i| {
            let (x0, y0) = flat[order[i]];
            let (x1, y1) = flat[order[(i + 1) % m]];
            x0 * y1 - x1 * y0
        })
        .sum()
}

/// Compact the vertex array to the vertices faces actually use.
pub fn remove_unreferenced_vertices(mesh: &mut Mesh3D) -> Result<usize, RepairError> {
    check_indices(mesh)?;
    let mut used = vec![false; mesh.vertices.len()];
    for face in &mesh.faces {
        for &i in face {
            used[i] = true;
        }
    }

    let removed = used.iter().filter(|u| !**u).count();
    if removed == 0 {
        return Ok(0);
    }

    let mut remap = vec![0; mesh.vertices.len()];
    let mut kept = Vec::with_capacity(mesh.vertices.len() - removed);
    for (i, &v) in mesh.vertices.iter().enumerate() {
        if used[i] {
            remap[i] = kept.len();
            kept.push(v);
        }
    }
    for face in &mut mesh.faces {
        for i in face.iter_mut() {
            *i = remap[*i];
        }
    }
    mesh.vertices = kept;
    info!("Removed {} unreferenced vertices", removed);
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::validation::{is_watertight, is_winding_consistent, validate};

    fn open_prism() -> Mesh3D {
        let ring = [(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)];
        let mut mesh = Mesh3D::default();
        let bottom = mesh.add_ring(&ring, 0.0);
        let top = mesh.add_ring(&ring, 2.0);
        mesh.add_side_walls(bottom, top, ring.len());
        mesh
    }

    #[test]
    fn test_repair_valid_mesh_is_unchanged() {
        let cube = Mesh3D::cuboid([10.0, 10.0, 2.0]).unwrap();
        let once = repair(cube.clone());
        assert_eq!(once, cube);

        let twice = repair(once);
        assert!(validate(Some(&twice)).is_valid);
    }

    #[test]
    fn test_repair_closes_open_prism() {
        let mesh = open_prism();
        assert!(!is_watertight(&mesh));

        let repaired = repair(mesh);
        assert!(is_watertight(&repaired));
        assert!(is_winding_consistent(&repaired));
        assert_eq!(repaired.face_count(), 12);
        assert!((repaired.signed_volume() - 200.0).abs() < 1e-9);
        assert!(validate(Some(&repaired)).is_valid);
    }

    #[test]
    fn test_boundary_loops_of_open_prism() {
        let loops = boundary_loops(&open_prism()).unwrap();
        assert_eq!(loops.len(), 2);
        assert!(loops.iter().all(|l| l.len() == 4));
    }

    #[test]
    fn test_inside_out_mesh_is_turned_outward() {
        let mut mesh = Mesh3D::cuboid([4.0, 4.0, 4.0]).unwrap();
        for face in &mut mesh.faces {
            face.swap(1, 2);
        }
        assert!(mesh.signed_volume() < 0.0);

        let repaired = repair(mesh);
        assert!((repaired.signed_volume() - 64.0).abs() < 1e-9);
    }

    #[test]
    fn test_single_flipped_face_is_fixed() {
        let mut mesh = Mesh3D::cuboid([4.0, 4.0, 4.0]).unwrap();
        mesh.faces[5].swap(1, 2);
        assert!(!is_winding_consistent(&mesh));

        let repaired = repair(mesh);
        assert!(is_winding_consistent(&repaired));
        assert!(repaired.signed_volume() > 0.0);
    }

    #[test]
    fn test_merge_duplicate_vertices() {
        let mut mesh = Mesh3D::new(
            vec![
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [0.0, 1.0, 0.0],
                [1.0, 0.0, 0.0],
                [0.0, 1.0, 0.0],
                [1.0, 1.0, 0.0],
            ],
            vec![[0, 1, 2], [3, 5, 4]],
        );
        assert_eq!(merge_vertices(&mut mesh, MERGE_TOLERANCE).unwrap(), 2);
        assert_eq!(mesh.faces[1], [1, 5, 2]);
        assert_eq!(remove_unreferenced_vertices(&mut mesh).unwrap(), 2);
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.faces[1], [1, 3, 2]);
    }

    #[test]
    fn test_collapsed_faces_are_dropped() {
        let mut mesh = Mesh3D::new(
            vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 0.0, 1e-10]],
            vec![[0, 1, 2]],
        );
        merge_vertices(&mut mesh, MERGE_TOLERANCE).unwrap();
        assert!(mesh.faces.is_empty());
    }

    #[test]
    fn test_bad_indices_leave_mesh_untouched() {
        let mesh = Mesh3D::new(vec![[0.0, 0.0, 0.0]], vec![[0, 1, 2]]);
        let repaired = repair(mesh.clone());
        assert_eq!(repaired, mesh);
    }

    #[test]
    fn test_empty_mesh_passes_through() {
        assert_eq!(repair(Mesh3D::default()), Mesh3D::default());
    }

    fn tetrahedron(s: f64) -> Mesh3D {
        Mesh3D::new(
            vec![[0.0, 0.0, 0.0], [s, 0.0, 0.0], [0.0, s, 0.0], [0.0, 0.0, s]],
            vec![[0, 2, 1], [0, 1, 3], [0, 3, 2], [1, 2, 3]],
        )
    }

    #[test]
    fn test_huge_coordinates_do_not_overflow_grid() {
        let mut mesh = tetrahedron(1e12);
        assert_eq!(merge_vertices(&mut mesh, MERGE_TOLERANCE).unwrap(), 0);

        let repaired = repair(tetrahedron(1e12));
        assert_eq!(repaired.face_count(), 4);
        assert!(repaired.signed_volume() > 0.0);
    }

    #[test]
    fn test_neighbour_cells_stop_at_i64_bounds() {
        assert_eq!(neighbour_cells((0, 0, 0)).count(), 27);
        assert_eq!(neighbour_cells((i64::MAX, 0, 0)).count(), 18);
        assert_eq!(neighbour_cells((i64::MIN, i64::MAX, 0)).count(), 12);
    }

    #[test]
    fn test_non_finite_vertex_rolls_back_merge() {
        let mut mesh = Mesh3D::cuboid([4.0, 4.0, 4.0]).unwrap();
        mesh.vertices[3] = [f64::NAN, 4.0, 0.0];

        let mut work = mesh.clone();
        assert!(matches!(
            merge_vertices(&mut work, MERGE_TOLERANCE),
            Err(RepairError::NonFinite(3))
        ));

        let repaired = repair(mesh);
        assert_eq!(repaired.vertex_count(), 8);
        assert_eq!(repaired.face_count(), 12);
        assert!(repaired.vertices[3][0].is_nan());
    }
}
