//! Cosmetic bone reorientation.
//!
//! Turns each bone's display frame so its local Y axis points at its
//! children. Bind matrices are never modified.

use super::builder::Bone;
use crate::config::ConvertOptions;
use crate::util::{Mat4, Quat, Vec3};

const MIN_AXIS_LEN: f32 = 1e-6;

/// Display axis (bone-local) and length for one bone.
fn display_axis(bones: &[Bone], index: usize, bone_size: f32, opts: &ConvertOptions) -> (Vec3, f32) {
    let bone = &bones[index];
    if !bone.children.is_empty() {
        // children locations are expressed in this bone's frame
        let sum: Vec3 = bone.children.iter().map(|&c| bones[c].orig_location).sum();
        let axis = sum / bone.children.len() as f32;
        return (axis, axis.length());
    }

    if opts.reorient_directly && bone.parent.is_some() && bone.orig_location.length() > MIN_AXIS_LEN {
        // continue along the offset from the parent, seen from this bone
        return (bone.rotation * bone.orig_location, bone_size);
    }
    (opts.leaf_direction(), bone_size)
}

/// Reorient display frames of every bone in place.
pub(crate) fn reorient(bones: &mut [Bone], bone_size: f32, opts: &ConvertOptions) {
    let axes: Vec<(Vec3, f32)> = (0..bones.len())
        .map(|i| display_axis(bones, i, bone_size, opts))
        .collect();

    for (bone, (axis, len)) in bones.iter_mut().zip(axes) {
        let orient = if axis.length() > MIN_AXIS_LEN {
            Quat::from_rotation_arc(Vec3::Y, axis.normalize())
        } else {
            Quat::IDENTITY
        };
        bone.display_matrix = bone.bind_matrix * Mat4::from_quat(orient);
        bone.length = if len > MIN_AXIS_LEN { len } else { bone_size };
    }
}

#[cfg(test)]
mod tests {
    use crate::config::ConvertOptions;
    use crate::skeleton::{build_skeleton, BoneRecord};
    use crate::util::{Quat, Vec3};

    fn records() -> Vec<BoneRecord> {
        vec![
            BoneRecord::new("root", 0, Quat::IDENTITY, Vec3::ZERO).unwrap(),
            BoneRecord::new("a", 0, Quat::IDENTITY, Vec3::new(4.0, 0.0, 0.0)).unwrap(),
            BoneRecord::new("b", 0, Quat::IDENTITY, Vec3::new(0.0, 0.0, 4.0)).unwrap(),
        ]
    }

    #[test]
    fn test_reorient_points_at_children() {
        let opts = ConvertOptions { reorient_bones: true, ..ConvertOptions::unscaled() };
        let skel = build_skeleton(&records(), &opts).unwrap();
        let root = &skel.bones[0];
        // average child at (2, 0, 2)
        let expected = Vec3::new(2.0, 0.0, 2.0);
        assert!((root.length - expected.length()).abs() < 1e-5);
        assert!(root.tail().abs_diff_eq(expected, 1e-4), "{:?}", root.tail());
        // bind pose untouched
        assert_eq!(root.bind_matrix, glam::Mat4::IDENTITY);
    }

    #[test]
    fn test_leaf_direction() {
        let opts = ConvertOptions {
            reorient_bones: true,
            leaf_direction: [0.0, 0.0, 1.0],
            ..ConvertOptions::unscaled()
        };
        let skel = build_skeleton(&records(), &opts).unwrap();
        let leaf = &skel.bones[1];
        let dir = (leaf.tail() - leaf.head()).normalize();
        assert!(dir.abs_diff_eq(Vec3::Z, 1e-5));
        assert_eq!(leaf.length, skel.bone_size);
    }

    #[test]
    fn test_reorient_directly() {
        let opts = ConvertOptions {
            reorient_bones: true,
            reorient_directly: true,
            ..ConvertOptions::unscaled()
        };
        let skel = build_skeleton(&records(), &opts).unwrap();
        let leaf = &skel.bones[1];
        let dir = (leaf.tail() - leaf.head()).normalize();
        assert!(dir.abs_diff_eq(Vec3::X, 1e-5));
    }

    #[test]
    fn test_without_reorient_display_is_bind() {
        let skel = build_skeleton(&records(), &ConvertOptions::unscaled()).unwrap();
        for b in &skel.bones {
            assert_eq!(b.display_matrix, b.bind_matrix);
            assert_eq!(b.length, skel.bone_size);
        }
    }
}
