use std::f64::consts::PI;
use std::fs::File;

use image::{GrayImage, Luma};
use sketch2stl::config::{ContourConfig, thickness_for_path};
use sketch2stl::contour::{ContourExtractor, vectorize};
use sketch2stl::geometry::{Polygon2D, build_polygons};
use sketch2stl::mesh::validation::is_watertight;
use sketch2stl::mesh::{ExtrusionStrategy, extrude, extrude_detailed, repair, validate};
use sketch2stl::{Pipeline, PipelineError};
use tempfile::tempdir;

/// Binary mask with a filled disc, foreground 255.
fn disc_mask(radius: f64) -> GrayImage {
    let size = (2.0 * radius + 40.0) as u32;
    let c = size as f64 / 2.0;
    GrayImage::from_fn(size, size, |x, y| {
        let d = ((x as f64 - c).powi(2) + (y as f64 - c).powi(2)).sqrt();
        if d <= radius + 0.5 { Luma([255]) } else { Luma([0]) }
    })
}

/// The same disc drawn as dark ink on white paper.
fn disc_sketch(radius: f64) -> GrayImage {
    let mut image = disc_mask(radius);
    for p in image.pixels_mut() {
        p[0] = 255 - p[0];
    }
    image
}

#[test]
fn filled_circle_extrudes_via_default_path() {
    let mask = disc_mask(50.0);
    let extractor = ContourExtractor::new(ContourConfig::default());

    let contours = extractor.refine(&extractor.detect(&mask));
    assert_eq!(contours.len(), 1);

    let polygons = build_polygons(&vectorize(&contours));
    assert_eq!(polygons.len(), 1);
    let expected = PI * 50.0 * 50.0;
    let area = polygons[0].area();
    assert!(
        (area - expected).abs() / expected < 0.05,
        "area {area} vs {expected}"
    );

    let extrusion = extrude_detailed(&polygons, 2.0).unwrap();
    assert_eq!(extrusion.strategy, ExtrusionStrategy::Triangulated);
    let dims = extrusion.mesh.dimensions().unwrap();
    assert!(dims.iter().all(|&d| d >= 2.0 - 1e-9), "{dims:?}");
    assert!(is_watertight(&extrusion.mesh));
    assert!(validate(Some(&extrusion.mesh)).is_valid);
}

#[test]
fn empty_image_has_nothing_to_extrude() {
    let blank = GrayImage::new(120, 120);
    let extractor = ContourExtractor::new(ContourConfig::default());

    let contours = extractor.detect(&blank);
    assert!(contours.is_empty());
    let polygons = build_polygons(&vectorize(&contours));
    assert!(extrude(&polygons, 2.0).is_none());
}

#[test]
fn blank_sketch_file_is_not_exported() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("blank.png");
    let output = dir.path().join("blank.stl");
    GrayImage::from_pixel(120, 120, Luma([255])).save(&input).unwrap();

    let err = Pipeline::default()
        .process_file(&input, &output, 2.0)
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<PipelineError>(),
        Some(PipelineError::NothingToExport(_))
    ));
    assert!(!output.exists());
}

#[test]
fn convex_polygon_round_trip() {
    // regular hexagon, circumradius 10
    let ring: Vec<(f64, f64)> = (0..6)
        .map(|i| {
            let a = i as f64 * PI / 3.0;
            (20.0 + 10.0 * a.cos(), 20.0 + 10.0 * a.sin())
        })
        .collect();
    let polygon = Polygon2D::try_from_ring(&ring).unwrap();
    let area = polygon.area();
    let thickness = 1.25;

    let extrusion = extrude_detailed(&[polygon], thickness).unwrap();
    assert_eq!(extrusion.strategy, ExtrusionStrategy::Triangulated);
    let mesh = extrusion.mesh;

    let dims = mesh.dimensions().unwrap();
    assert!((dims[2] - thickness).abs() < 1e-9);

    let top_area: f64 = mesh
        .triangles()
        .iter()
        .zip(&mesh.faces)
        .filter(|(_, f)| f.iter().all(|&i| mesh.vertices[i][2] == thickness))
        .map(|(t, f)| {
            assert!(t.normal[2] > 0.99);
            let [a, b, c] = mesh.corners(f);
            0.5 * ((b[0] - a[0]) * (c[1] - a[1]) - (c[0] - a[0]) * (b[1] - a[1]))
        })
        .sum();
    assert!((top_area - area).abs() < 1e-9);
    assert!((mesh.signed_volume() - area * thickness).abs() < 1e-9);
}

#[test]
fn self_intersecting_ring_falls_back_to_open_prism() {
    let ring = vec![(0.0, 0.0), (10.0, 10.0), (10.0, 0.0), (0.0, 10.0)];
    let bowtie = Polygon2D::from_ring_unchecked(ring.clone());

    let extrusion = extrude_detailed(&[bowtie], 2.0).unwrap();
    assert_eq!(extrusion.strategy, ExtrusionStrategy::ManualPrism);
    assert_eq!(extrusion.mesh.face_count(), 2 * ring.len());

    let report = validate(Some(&extrusion.mesh));
    assert!(!report.is_valid);
    assert!(report.issues.contains(&"not watertight".to_string()));
}

#[test]
fn repair_twice_keeps_valid_mesh_valid() {
    let polygon =
        Polygon2D::try_from_ring(&[(0.0, 0.0), (12.0, 0.0), (12.0, 5.0), (0.0, 5.0)]).unwrap();
    let mesh = extrude(&[polygon], 2.0).unwrap();
    assert!(validate(Some(&mesh)).is_valid);

    let once = repair(mesh);
    assert!(validate(Some(&once)).is_valid);
    let twice = repair(once);
    assert!(validate(Some(&twice)).is_valid);
}

#[test]
fn sketch_file_exports_readable_stl() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("Pendant_Moon.png");
    let output = dir.path().join("pendant.stl");
    disc_sketch(40.0).save(&input).unwrap();

    let thickness = thickness_for_path(&input, 2.0);
    assert_eq!(thickness, 1.5);

    let result = Pipeline::default()
        .process_file(&input, &output, thickness)
        .unwrap();
    let mesh = result.mesh().unwrap();
    assert!(result.report.is_valid, "{:?}", result.report.issues);
    assert_eq!(result.polygons.len(), 1);

    let mut file = File::open(&output).unwrap();
    let stl = stl_io::read_stl(&mut file).unwrap();
    assert_eq!(stl.faces.len(), mesh.face_count());
    let (lo, hi) = stl
        .vertices
        .iter()
        .fold((f32::MAX, f32::MIN), |(lo, hi), v| (lo.min(v.0[2]), hi.max(v.0[2])));
    assert!(lo.abs() < 1e-6);
    assert!((hi - 1.5).abs() < 1e-6);
}

#[test]
fn unsupported_input_is_rejected() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("ring.svg");
    std::fs::write(&input, "<svg xmlns=\"http://www.w3.org/2000/svg\"/>").unwrap();

    let err = Pipeline::default()
        .process_file(&input, &dir.path().join("ring.stl"), 2.0)
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<PipelineError>(),
        Some(PipelineError::UnsupportedFormat { .. })
    ));
}

#[test]
fn missing_input_is_reported() {
    let dir = tempdir().unwrap();
    let err = Pipeline::default()
        .process_file(&dir.path().join("nope.png"), &dir.path().join("nope.stl"), 2.0)
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<PipelineError>(),
        Some(PipelineError::NotFound(_))
    ));
}
