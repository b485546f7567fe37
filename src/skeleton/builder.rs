//! Bone hierarchy reconstruction from raw bone records.

use std::collections::VecDeque;

use super::records::{BoneRecord, recompute_children_counts};
use super::reorient::reorient;
use crate::config::ConvertOptions;
use crate::util::{conjugate, Error, Mat4, Quat, Result, Vec3};

/// Builder-stage bone: file data plus resolved links, no transforms yet.
#[derive(Clone, Debug)]
pub(crate) struct BuilderBone {
    pub name: String,
    pub flags: i32,
    pub declared_children: i32,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    pub orig_rotation: Quat,
    /// File location converted to model units.
    pub orig_location: Vec3,
}

/// A bone of a reconstructed skeleton.
#[derive(Clone, Debug, PartialEq)]
pub struct Bone {
    pub name: String,
    pub index: usize,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    pub flags: i32,
    /// Rotation exactly as stored in the file.
    pub orig_rotation: Quat,
    /// Stored location in model units.
    pub orig_location: Vec3,
    /// Rotation used to build the hierarchy. Differs from `orig_rotation`
    /// only for an inverted root.
    pub rotation: Quat,
    /// Bind pose in skeleton space.
    pub bind_matrix: Mat4,
    /// Display frame; equals `bind_matrix` unless bones were reoriented.
    pub display_matrix: Mat4,
    /// Display length along the local Y axis of `display_matrix`.
    pub length: f32,
    /// Set when at least one vertex weight references this bone.
    pub has_weights: bool,
}

impl Bone {
    /// Bind pose head position.
    #[inline]
    pub fn head(&self) -> Vec3 {
        self.bind_matrix.w_axis.truncate()
    }

    /// Display tail position.
    #[inline]
    pub fn tail(&self) -> Vec3 {
        self.display_matrix.transform_point3(Vec3::Y * self.length)
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

/// Bone hierarchy stored as an arena; links are indices into `bones`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Skeleton {
    pub bones: Vec<Bone>,
    /// Display bone size chosen from the average bone length.
    pub bone_size: f32,
    /// Whether the root rotations were conjugated while building.
    pub root_inverted: bool,
}

impl Skeleton {
    #[inline]
    pub fn len(&self) -> usize {
        self.bones.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    /// First bone without a parent.
    pub fn root(&self) -> Option<&Bone> {
        self.bones.iter().find(|b| b.is_root())
    }

    /// Look up a bone by name.
    pub fn find(&self, name: &str) -> Option<&Bone> {
        self.bones.iter().find(|b| b.name == name)
    }

    /// Children of the bone at `index`.
    pub fn children_of(&self, index: usize) -> impl Iterator<Item = &Bone> {
        self.bones
            .get(index)
            .into_iter()
            .flat_map(move |b| b.children.iter().map(move |&c| &self.bones[c]))
    }

    /// Convert back to file records.
    ///
    /// Rotations are the original stored values; locations are converted
    /// back to file units. Children counts are recomputed.
    pub fn to_records(&self, opts: &ConvertOptions) -> Result<Vec<BoneRecord>> {
        let scale = opts.export_scale();
        let mut records = self
            .bones
            .iter()
            .map(|b| {
                let parent = b.parent.unwrap_or(b.index) as i32;
                let mut rec = BoneRecord::new(&b.name, parent, b.orig_rotation, b.orig_location * scale)?;
                rec.flags = b.flags;
                Ok(rec)
            })
            .collect::<Result<Vec<_>>>()?;
        recompute_children_counts(&mut records);
        Ok(records)
    }
}

/// Create builder bones and resolve parent links.
///
/// A record whose parent index is its own index is a root. Out-of-range
/// parent indices make the bone a root with a warning.
pub(crate) fn link_bones(records: &[BoneRecord], unit_scale: f32) -> Vec<BuilderBone> {
    let mut bones: Vec<BuilderBone> = records
        .iter()
        .map(|r| BuilderBone {
            name: r.name(),
            flags: r.flags,
            declared_children: r.children_count,
            parent: None,
            children: Vec::new(),
            orig_rotation: r.rotation,
            orig_location: r.location * unit_scale,
        })
        .collect();

    for (i, rec) in records.iter().enumerate() {
        let p = rec.parent_index;
        if p as i64 == i as i64 {
            continue;
        }
        if p < 0 || p as usize >= bones.len() {
            tracing::warn!(bone = %bones[i].name, parent = p, "parent index out of range, treating as root");
            continue;
        }
        bones[i].parent = Some(p as usize);
        bones[p as usize].children.push(i);
    }

    for b in &bones {
        if b.children.len() as i32 != b.declared_children {
            tracing::warn!(
                bone = %b.name,
                declared = b.declared_children,
                actual = b.children.len(),
                "children count mismatch"
            );
        }
    }
    bones
}

/// Parent-before-child order. Fails if the links contain a cycle.
pub(crate) fn hierarchy_order(bones: &[BuilderBone]) -> Result<Vec<usize>> {
    let mut order = Vec::with_capacity(bones.len());
    let mut queue: VecDeque<usize> = (0..bones.len()).filter(|&i| bones[i].parent.is_none()).collect();
    while let Some(i) = queue.pop_front() {
        order.push(i);
        queue.extend(bones[i].children.iter().copied());
    }
    if order.len() != bones.len() {
        return Err(Error::invalid(format!(
            "bone hierarchy contains a cycle ({} of {} bones reachable from a root)",
            order.len(),
            bones.len()
        )));
    }
    Ok(order)
}

/// Display bone size from the average stored location length.
pub fn display_bone_size(locations: impl ExactSizeIterator<Item = Vec3>, opts: &ConvertOptions) -> f32 {
    let n = locations.len();
    if n == 0 {
        return opts.bone_size.max(0.01);
    }
    let sum: f32 = locations.map(|l| l.length()).sum();
    let avg = sum / n as f32 * opts.bone_size_ratio;
    ((avg.min(opts.bone_size) * 100.0).round() / 100.0).max(0.01)
}

/// Rebuild the bone hierarchy and bind transforms.
///
/// Non-root rotations are stored conjugated, so a child's skeleton-space
/// rotation is `parent * conj(q)`. The root uses `conj(q)` as well, after
/// optionally conjugating `q` itself (`invert_root_rotation`).
pub fn build_skeleton(records: &[BoneRecord], opts: &ConvertOptions) -> Result<Skeleton> {
    let _span = tracing::info_span!("build_skeleton", bones = records.len()).entered();

    let linked = link_bones(records, opts.unit_scale);
    let order = hierarchy_order(&linked)?;

    let mut bones: Vec<Bone> = linked
        .iter()
        .enumerate()
        .map(|(i, b)| {
            let rotation = if b.parent.is_none() && opts.invert_root_rotation {
                conjugate(b.orig_rotation)
            } else {
                b.orig_rotation
            };
            Bone {
                name: b.name.clone(),
                index: i,
                parent: b.parent,
                children: b.children.clone(),
                flags: b.flags,
                orig_rotation: b.orig_rotation,
                orig_location: b.orig_location,
                rotation,
                bind_matrix: Mat4::IDENTITY,
                display_matrix: Mat4::IDENTITY,
                length: 0.0,
                has_weights: false,
            }
        })
        .collect();

    let mut world_rot = vec![Quat::IDENTITY; bones.len()];
    for &i in &order {
        let local = conjugate(bones[i].rotation);
        let (rot, pos) = match bones[i].parent {
            Some(p) => {
                let parent_pos = bones[p].head();
                (
                    (world_rot[p] * local).normalize(),
                    parent_pos + world_rot[p] * bones[i].orig_location,
                )
            }
            None => (local.normalize(), bones[i].orig_location),
        };
        world_rot[i] = rot;
        bones[i].bind_matrix = Mat4::from_rotation_translation(rot, pos);
    }

    let bone_size = display_bone_size(bones.iter().map(|b| b.orig_location), opts);
    for b in &mut bones {
        b.display_matrix = b.bind_matrix;
        b.length = bone_size;
    }
    if opts.reorient_bones {
        reorient(&mut bones, bone_size, opts);
    }

    tracing::debug!(bone_size, "skeleton built");
    Ok(Skeleton { bones, bone_size, root_inverted: opts.invert_root_rotation })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::quat_approx_eq;

    fn rec(name: &str, parent: i32, rot: Quat, loc: Vec3) -> BoneRecord {
        BoneRecord::new(name, parent, rot, loc).unwrap()
    }

    fn chain() -> Vec<BoneRecord> {
        let mut recs = vec![
            rec("root", 0, Quat::IDENTITY, Vec3::ZERO),
            rec("mid", 0, Quat::IDENTITY, Vec3::new(0.0, 10.0, 0.0)),
            rec("tip", 1, Quat::IDENTITY, Vec3::new(0.0, 10.0, 0.0)),
        ];
        recompute_children_counts(&mut recs);
        recs
    }

    #[test]
    fn test_chain_links() {
        let skel = build_skeleton(&chain(), &ConvertOptions::unscaled()).unwrap();
        assert_eq!(skel.len(), 3);
        assert_eq!(skel.root().unwrap().name, "root");
        assert_eq!(skel.bones[1].parent, Some(0));
        assert_eq!(skel.bones[2].parent, Some(1));
        assert_eq!(skel.bones[0].children, vec![1]);
        assert!(skel.bones[2].head().abs_diff_eq(Vec3::new(0.0, 20.0, 0.0), 1e-5));
        let names: Vec<&str> = skel.children_of(1).map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["tip"]);
    }

    #[test]
    fn test_unit_scale() {
        let skel = build_skeleton(&chain(), &ConvertOptions::default()).unwrap();
        assert!(skel.bones[2].head().abs_diff_eq(Vec3::new(0.0, 0.2, 0.0), 1e-6));
    }

    #[test]
    fn test_child_rotation_is_conjugated() {
        let q = Quat::from_rotation_z(std::f32::consts::FRAC_PI_2);
        let mut recs = chain();
        // stored conjugated: the mid bone turns +90 degrees about Z
        recs[1].rotation = conjugate(q);
        let skel = build_skeleton(&recs, &ConvertOptions::unscaled()).unwrap();
        // tip offset +Y in mid space lands on -X
        let tip = skel.bones[2].head();
        assert!(tip.abs_diff_eq(Vec3::new(-10.0, 10.0, 0.0), 1e-4), "{tip:?}");
    }

    #[test]
    fn test_root_inversion_involution() {
        let q = Quat::from_euler(glam::EulerRot::XYZ, 0.3, -0.8, 1.1);
        let mut recs = chain();
        recs[0].rotation = q;

        let opts = ConvertOptions { invert_root_rotation: true, ..ConvertOptions::unscaled() };
        let skel = build_skeleton(&recs, &opts).unwrap();
        let root = skel.root().unwrap();
        assert_eq!(root.rotation, conjugate(q));
        assert_eq!(conjugate(root.rotation), q);
        // inverted root's skeleton-space rotation is the stored one
        let (_, r, _) = root.bind_matrix.to_scale_rotation_translation();
        assert!(quat_approx_eq(r, q, 1e-5));

        let opts = ConvertOptions { invert_root_rotation: false, ..ConvertOptions::unscaled() };
        let skel = build_skeleton(&recs, &opts).unwrap();
        assert_eq!(skel.root().unwrap().rotation, q);
    }

    #[test]
    fn test_children_mismatch_is_not_fatal() {
        let mut recs = chain();
        recs[0].children_count = 7;
        assert!(build_skeleton(&recs, &ConvertOptions::unscaled()).is_ok());
    }

    #[test]
    fn test_out_of_order_parents() {
        // child listed before its parent
        let recs = vec![
            rec("root", 0, Quat::IDENTITY, Vec3::ZERO),
            rec("hand", 2, Quat::IDENTITY, Vec3::X),
            rec("arm", 0, Quat::IDENTITY, Vec3::X),
        ];
        let skel = build_skeleton(&recs, &ConvertOptions::unscaled()).unwrap();
        assert_eq!(skel.bones[1].parent, Some(2));
        assert!(skel.bones[1].head().abs_diff_eq(Vec3::new(2.0, 0.0, 0.0), 1e-6));
    }

    #[test]
    fn test_cycle_is_fatal() {
        let recs = vec![
            rec("root", 0, Quat::IDENTITY, Vec3::ZERO),
            rec("a", 2, Quat::IDENTITY, Vec3::X),
            rec("b", 1, Quat::IDENTITY, Vec3::X),
        ];
        let err = build_skeleton(&recs, &ConvertOptions::unscaled()).unwrap_err();
        assert!(err.is_format_error());
    }

    #[test]
    fn test_bad_parent_becomes_root() {
        let recs = vec![
            rec("root", 0, Quat::IDENTITY, Vec3::ZERO),
            rec("stray", 42, Quat::IDENTITY, Vec3::X),
        ];
        let skel = build_skeleton(&recs, &ConvertOptions::unscaled()).unwrap();
        assert!(skel.bones[1].is_root());
        assert_eq!(skel.root().unwrap().index, 0);
    }

    #[test]
    fn test_display_bone_size() {
        let opts = ConvertOptions::unscaled();
        // average length 10 * 0.6 = 6, capped at 5
        let size = display_bone_size([Vec3::Y * 10.0, Vec3::X * 10.0].into_iter(), &opts);
        assert_eq!(size, 5.0);
        // average 0.5 * 0.6 = 0.3
        let size = display_bone_size([Vec3::Y, Vec3::ZERO].into_iter(), &opts);
        assert!((size - 0.3).abs() < 1e-6);
        // tiny skeletons clamp to 0.01
        let size = display_bone_size([Vec3::ZERO].into_iter(), &opts);
        assert_eq!(size, 0.01);
    }

    #[test]
    fn test_records_roundtrip() {
        let opts = ConvertOptions::default();
        let recs = chain();
        let skel = build_skeleton(&recs, &opts).unwrap();
        let back = skel.to_records(&opts).unwrap();
        assert_eq!(back.len(), recs.len());
        for (a, b) in recs.iter().zip(&back) {
            assert_eq!(a.name(), b.name());
            assert_eq!(a.parent_index, b.parent_index);
            assert_eq!(a.children_count, b.children_count);
            assert_eq!(a.rotation, b.rotation);
            assert!(a.location.abs_diff_eq(b.location, 1e-4));
        }
    }
}
