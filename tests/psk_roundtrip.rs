//! Integration tests for writing PSK meshes and reading them back.

use pskpsa::psk::records::*;
use pskpsa::psk::{read_psk, write_psk, Mesh, PskFile};
use pskpsa::skeleton::{recompute_children_counts, BoneRecord};
use pskpsa::util::{Quat, Vec2, Vec3, Vec4};
use pskpsa::{ConvertOptions, Error};

use tempfile::NamedTempFile;

/// A pyramid: four points, four triangles, two bones.
fn pyramid() -> PskFile {
    let points = [
        Vec3::new(0.0, 0.0, 0.0),
        Vec3::new(100.0, 0.0, 0.0),
        Vec3::new(0.0, 100.0, 0.0),
        Vec3::new(0.0, 0.0, 100.0),
    ];
    let mut bones = vec![
        BoneRecord::new("pelvis", 0, Quat::IDENTITY, Vec3::ZERO).unwrap(),
        BoneRecord::new("spine", 0, Quat::from_rotation_x(0.3), Vec3::new(0.0, 0.0, 50.0)).unwrap(),
    ];
    recompute_children_counts(&mut bones);

    let mut psk = PskFile {
        points: points.iter().map(|&p| Vec3Record(p)).collect(),
        materials: vec![MaterialRecord::new("Skin").unwrap(), MaterialRecord::new("Cloth").unwrap()],
        bones,
        normals: points.iter().map(|p| Vec3Record(p.normalize_or_zero())).collect(),
        ..Default::default()
    };
    for (i, uv) in [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0), (0.5, 0.5)].into_iter().enumerate() {
        psk.wedges.push(WedgeRecord {
            point_index: i as u32,
            u: uv.0,
            v: uv.1,
            material_index: (i % 2) as u8,
            reserved: 0,
        });
        psk.colors.push(ColorRecord([i as u8 * 60, 255 - i as u8 * 60, 128, 255]));
        psk.weights.push(WeightRecord { weight: 0.75, point_index: i as i32, bone_index: 0 });
        psk.weights.push(WeightRecord { weight: 0.25, point_index: i as i32, bone_index: 1 });
    }
    psk.extra_uvs = vec![psk.wedges.iter().map(|w| UvRecord(Vec2::new(w.v, w.u))).collect()];
    for (n, wedges) in [[0, 1, 2], [0, 3, 1], [0, 2, 3], [1, 3, 2]].into_iter().enumerate() {
        psk.faces.push(FaceRecord {
            wedges,
            material_index: (n % 2) as u8,
            aux_material_index: 0,
            smoothing_groups: 1 << n,
        });
    }
    psk.morph_infos = vec![MorphInfoRecord::new("Squash", 2).unwrap()];
    psk.morph_data = vec![
        MorphDataRecord { position_delta: Vec3::new(0.0, 0.0, -50.0), normal_delta: Vec3::ZERO, point_index: 3 },
        MorphDataRecord { position_delta: Vec3::new(0.0, 10.0, 0.0), normal_delta: Vec3::ZERO, point_index: 2 },
    ];
    psk
}

#[test]
fn test_mesh_roundtrip() {
    let temp = NamedTempFile::new().expect("Failed to create temp file");
    let path = temp.path();
    pyramid().write(path).expect("Failed to write mesh");

    let opts = ConvertOptions::default();
    let mesh = read_psk(path, &opts).expect("Failed to read mesh");
    assert_eq!(mesh.positions.len(), 4);
    assert_eq!(mesh.triangles.len(), 4);
    assert_eq!(mesh.materials[1].name, "Cloth");
    assert_eq!(mesh.weights.len(), 8);
    assert_eq!(mesh.skeleton.len(), 2);
    assert!(mesh.skeleton.bones.iter().all(|b| b.has_weights));
    assert!(mesh.positions[3].abs_diff_eq(Vec3::new(0.0, 0.0, 1.0), 1e-6));
    assert_eq!(mesh.colors.as_ref().map(Vec::len), Some(12));
    assert_eq!(mesh.extra_uv_layers.len(), 1);
    assert_eq!(mesh.normals.as_ref().map(Vec::len), Some(4));
    assert!(mesh.morph_targets[0].deltas[0].position.abs_diff_eq(Vec3::new(0.0, 0.0, -0.5), 1e-6));
    assert!(mesh.morph_targets[0].deltas[1].position.abs_diff_eq(Vec3::new(0.0, -0.1, 0.0), 1e-6));

    // write the normalized mesh and decode it again
    let second = NamedTempFile::new().expect("Failed to create temp file");
    write_psk(second.path(), &mesh, &opts).expect("Failed to write mesh");
    let again = read_psk(second.path(), &opts).expect("Failed to read mesh");

    assert_eq!(again.triangles.len(), mesh.triangles.len());
    for (a, b) in again.triangles.iter().zip(&mesh.triangles) {
        assert_eq!(a.vertices, b.vertices);
        assert_eq!(a.wedge_materials, b.wedge_materials);
        assert_eq!(a.material, b.material);
        assert_eq!(a.smoothing_groups, b.smoothing_groups);
        for c in 0..3 {
            assert!(a.uvs[c].abs_diff_eq(b.uvs[c], 1e-6));
        }
    }
    for (a, b) in again.positions.iter().zip(&mesh.positions) {
        assert!(a.abs_diff_eq(*b, 1e-5));
    }
    assert_eq!(again.weights, mesh.weights);
    assert_eq!(again.materials, mesh.materials);
    assert_eq!(again.normals, mesh.normals);
    for (a, b) in again.colors.unwrap().iter().zip(mesh.colors.as_ref().unwrap()) {
        assert!(a.abs_diff_eq(*b, 1.0 / 255.0));
    }
    for (a, b) in again.extra_uv_layers[0].uvs.iter().zip(&mesh.extra_uv_layers[0].uvs) {
        assert!(a.abs_diff_eq(*b, 1e-6));
    }
    for (a, b) in again.morph_targets[0].deltas.iter().zip(&mesh.morph_targets[0].deltas) {
        assert_eq!(a.vertex, b.vertex);
        assert!(a.position.abs_diff_eq(b.position, 1e-5));
    }
    let names: Vec<&str> = again.skeleton.bones.iter().map(|b| b.name.as_str()).collect();
    assert_eq!(names, vec!["pelvis", "spine"]);
    assert!(again.skeleton.bones[1].head().abs_diff_eq(mesh.skeleton.bones[1].head(), 1e-5));
}

#[test]
fn test_wedges_are_stable_through_mesh() {
    let opts = ConvertOptions::default();
    let psk = pyramid();
    let back = Mesh::from_psk(&psk, &opts).unwrap().to_psk(&opts).unwrap();
    assert_eq!(back.wedges.len(), psk.wedges.len());
    assert_eq!(back.faces, psk.faces);
    assert_eq!(back.colors, psk.colors);
}

#[test]
fn test_missing_bones_fails() {
    let mut psk = pyramid();
    psk.bones.clear();
    let mut w = pskpsa::chunk::SectionWriter::new(Vec::new());
    psk.write_sections(&mut w).unwrap();
    let bytes = w.into_inner().unwrap();
    assert!(matches!(PskFile::from_bytes(&bytes), Err(Error::MissingSection(REFSKELT))));
}

#[test]
fn test_not_a_psk() {
    let temp = NamedTempFile::new().unwrap();
    std::fs::write(temp.path(), vec![0u8; 64]).unwrap();
    let err = read_psk(temp.path(), &ConvertOptions::default()).unwrap_err();
    assert!(matches!(err, Error::NotThisFormat { found: 0 }));
}

#[test]
fn test_failed_export_leaves_no_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.psk");
    let mut mesh = Mesh::from_psk(&pyramid(), &ConvertOptions::default()).unwrap();
    mesh.colors = Some(vec![Vec4::ONE; 2]);
    let err = write_psk(&path, &mesh, &ConvertOptions::default()).unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    assert!(!path.exists());

    let mut mesh = Mesh::from_psk(&pyramid(), &ConvertOptions::default()).unwrap();
    mesh.materials[0].name = "Ткань".into();
    assert!(matches!(write_psk(&path, &mesh, &ConvertOptions::default()), Err(Error::Encoding { .. })));
    assert!(!path.exists());
}
