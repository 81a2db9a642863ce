use super::{Mesh3D, Triangle};
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Write triangles to a binary STL file
///
/// Binary STL format:
/// - 80 byte header
/// - 4 byte u32 triangle count (little endian)
/// - For each triangle:
///   - 3 x f32 normal (12 bytes)
///   - 3 x 3 x f32 vertices (36 bytes)
///   - 2 byte attribute (usually 0)
pub fn write_stl(path: &Path, triangles: &[Triangle]) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create STL file: {}", path.display()))?;
    let mut writer = BufWriter::new(file);

    let mut header = [b' '; 80];
    let title = b"sketch2stl - Jewelry Sketch Solid";
    header[..title.len()].copy_from_slice(title);
    writer.write_all(&header)?;

    let count = u32::try_from(triangles.len())
        .with_context(|| format!("Too many triangles for STL: {}", triangles.len()))?;
    writer.write_all(&count.to_le_bytes())?;

    for tri in triangles {
        for &n in &tri.normal {
            writer.write_all(&n.to_le_bytes())?;
        }
        for vertex in &tri.vertices {
            for &coord in vertex {
                writer.write_all(&coord.to_le_bytes())?;
            }
        }
        writer.write_all(&[0u8, 0u8])?;
    }

    writer.flush()?;

    Ok(())
}

/// Export an indexed mesh, computing per-face normals.
pub fn write_mesh_stl(path: &Path, mesh: &Mesh3D) -> Result<usize> {
    let triangles = mesh.triangles();
    write_stl(path, &triangles)?;
    Ok(triangles.len())
}

/// Get the file size of an STL with the given number of triangles
pub fn estimate_stl_size(triangle_count: usize) -> usize {
    // 80 (header) + 4 (count) + triangles * (12 normal + 36 vertices + 2 attribute)
    80 + 4 + triangle_count * 50
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_write_stl() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.stl");

        let triangles = vec![
            Triangle::new([0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
            Triangle::new([0.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]),
        ];

        write_stl(&path, &triangles).unwrap();

        let metadata = fs::metadata(&path).unwrap();
        assert_eq!(metadata.len(), estimate_stl_size(2) as u64);
        let bytes = fs::read(&path).unwrap();
        assert!(bytes.starts_with(b"sketch2stl"));
    }

    #[test]
    fn test_write_mesh_reads_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("box.stl");
        let mesh = Mesh3D::cuboid([30.0, 30.0, 2.0]).unwrap();

        let written = write_mesh_stl(&path, &mesh).unwrap();
        assert_eq!(written, 12);

        let mut file = File::open(&path).unwrap();
        let stl = stl_io::read_stl(&mut file).unwrap();
        assert_eq!(stl.faces.len(), 12);
        assert_eq!(stl.vertices.len(), 8);
        let max_z = stl
            .vertices
            .iter()
            .map(|v| v.0[2])
            .fold(f32::MIN, f32::max);
        assert!((max_z - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_write_to_missing_dir_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("no/such/dir/out.stl");
        assert!(write_stl(&path, &[]).is_err());
    }

    #[test]
    fn test_estimate_size() {
        // Empty STL: 80 + 4 = 84 bytes
        assert_eq!(estimate_stl_size(0), 84);
        // 1 triangle: 84 + 50 = 134 bytes
        assert_eq!(estimate_stl_size(1), 134);
    }
}
