//! Sequence sampling.

use super::pose::PoseEvaluator;
use crate::psa::KeyRecord;
use crate::util::{conjugate, to_translation_rotation, Error, Mat4, Result};

/// Frame count, step and rate for sampling one sequence.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SamplePlan {
    pub start: i32,
    pub end: i32,
    /// Frames in the source range, both ends included.
    pub raw_frame_count: u32,
    /// Frames actually sampled.
    pub frame_count: u32,
    /// Source frames between samples; negative for reversed ranges.
    pub frame_step: f32,
    pub effective_fps: f32,
}

impl SamplePlan {
    /// Plan sampling of `[start, end]` at `fps`.
    ///
    /// `frame_count = max(quota, round(raw * ratio), 1)`.
    pub fn new(start: i32, end: i32, fps: f32, compression_ratio: f32, frame_quota: u32) -> Result<Self> {
        if !(fps.is_finite() && fps > 0.0) {
            return Err(Error::validation(format!("fps must be positive, got {fps}")));
        }
        if !(compression_ratio > 0.0 && compression_ratio <= 1.0) {
            return Err(Error::validation(format!(
                "compression ratio must be in (0, 1], got {compression_ratio}"
            )));
        }

        let raw_frame_count = start
            .abs_diff(end)
            .checked_add(1)
            .ok_or_else(|| Error::validation(format!("frame range {start}..={end} is too large")))?;
        let compressed = (raw_frame_count as f32 * compression_ratio).round() as u32;
        let frame_count = frame_quota.max(compressed).max(1);
        let frame_step = if frame_count > 1 {
            ((i64::from(end) - i64::from(start)) as f64 / f64::from(frame_count - 1)) as f32
        } else {
            0.0
        };
        let effective_fps = frame_count as f32 / (raw_frame_count as f32 / fps);

        Ok(Self { start, end, raw_frame_count, frame_count, frame_step, effective_fps })
    }

    /// Source frame of every sample, in order.
    pub fn frames(&self) -> impl Iterator<Item = f32> + '_ {
        (0..self.frame_count).map(move |i| self.start as f32 + i as f32 * self.frame_step)
    }

    /// Per-key time delta.
    #[inline]
    pub fn key_time(&self) -> f32 {
        1.0 / self.effective_fps
    }
}

/// How one exported bone is sampled.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SampledBone {
    /// Index into the evaluator's armature.
    pub bone: usize,
    /// Armature index of the nearest exported ancestor.
    pub parent: Option<usize>,
    /// Transform written for a root when root motion is not baked.
    pub root_bind: Mat4,
}

/// Key of one bone at the evaluator's current frame.
///
/// Non-root bones are stored parent-relative with the rotation conjugated.
/// A root either carries its world-space motion or stays at its bind.
pub fn bone_key<P: PoseEvaluator + ?Sized>(
    pose: &P,
    bone: &SampledBone,
    bake_root_motion: bool,
    export_scale: f32,
    time: f32,
) -> KeyRecord {
    let (location, rotation) = match bone.parent {
        Some(parent) => {
            let local = pose.pose_matrix(parent).inverse() * pose.pose_matrix(bone.bone);
            let (t, r) = to_translation_rotation(&local);
            (t, conjugate(r))
        }
        None if bake_root_motion => {
            let world = pose.armature().world_matrix * pose.pose_matrix(bone.bone);
            to_translation_rotation(&world)
        }
        None => to_translation_rotation(&bone.root_bind),
    };
    KeyRecord { location: location * export_scale, rotation, time }
}

/// Sample every frame of a plan; the clip must already be active.
///
/// Keys are appended frame by frame, bone by bone.
pub fn sample_sequence<P: PoseEvaluator + ?Sized>(
    pose: &mut P,
    plan: &SamplePlan,
    bones: &[SampledBone],
    bake_root_motion: bool,
    export_scale: f32,
    keys: &mut Vec<KeyRecord>,
) {
    let time = plan.key_time();
    keys.reserve(plan.frame_count as usize * bones.len());
    for frame in plan.frames() {
        pose.set_frame(frame);
        for bone in bones {
            keys.push(bone_key(&*pose, bone, bake_root_motion, export_scale, time));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anim::pose::{Armature, ArmatureBone, Clip, KeyframedPose, TrackKey};
    use crate::util::{quat_approx_eq, Quat, Vec3};

    #[test]
    fn test_plan_identity() {
        let plan = SamplePlan::new(0, 9, 30.0, 1.0, 0).unwrap();
        assert_eq!(plan.raw_frame_count, 10);
        assert_eq!(plan.frame_count, 10);
        assert_eq!(plan.frame_step, 1.0);
        assert!((plan.effective_fps - 30.0).abs() < 1e-4);
        assert!((plan.key_time() - 1.0 / 30.0).abs() < 1e-6);
    }

    #[test]
    fn test_plan_compression() {
        let plan = SamplePlan::new(0, 9, 30.0, 0.5, 0).unwrap();
        assert_eq!(plan.frame_count, 5);
        assert!((plan.frame_step - 9.0 / 4.0).abs() < 1e-6);
        assert!((plan.effective_fps - 15.0).abs() < 1e-4);
        let frames: Vec<f32> = plan.frames().collect();
        assert_eq!(frames.first(), Some(&0.0));
        assert_eq!(frames.last(), Some(&9.0));
    }

    #[test]
    fn test_plan_quota_and_minimum() {
        let plan = SamplePlan::new(0, 9, 30.0, 0.1, 4).unwrap();
        assert_eq!(plan.frame_count, 4);
        let plan = SamplePlan::new(5, 5, 30.0, 0.1, 0).unwrap();
        assert_eq!(plan.frame_count, 1);
        assert_eq!(plan.frame_step, 0.0);
    }

    #[test]
    fn test_plan_reversed() {
        let plan = SamplePlan::new(9, 0, 24.0, 1.0, 0).unwrap();
        assert_eq!(plan.frame_count, 10);
        assert_eq!(plan.frame_step, -1.0);
    }

    #[test]
    fn test_plan_rejects_bad_input() {
        assert!(matches!(SamplePlan::new(0, 9, 0.0, 1.0, 0), Err(Error::Validation(_))));
        assert!(matches!(SamplePlan::new(0, 9, 30.0, 0.0, 0), Err(Error::Validation(_))));
        assert!(matches!(SamplePlan::new(0, 9, 30.0, 1.5, 0), Err(Error::Validation(_))));
        assert!(SamplePlan::new(0, 9, f32::NAN, 1.0, 0).is_err());
    }

    #[test]
    fn test_plan_extreme_ranges() {
        let err = SamplePlan::new(i32::MIN, i32::MAX, 30.0, 1.0, 0).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        let plan = SamplePlan::new(i32::MIN, 0, 30.0, 1e-6, 0).unwrap();
        assert_eq!(plan.raw_frame_count, (1u32 << 31) + 1);
        assert!(plan.frame_step.is_finite() && plan.frame_step > 0.0);

        let back = SamplePlan::new(i32::MAX, i32::MIN + 1, 30.0, 1e-6, 0).unwrap();
        assert_eq!(back.raw_frame_count, u32::MAX);
        assert!(back.frame_step.is_finite() && back.frame_step < 0.0);
    }

    fn swinging_pose() -> KeyframedPose {
        let armature = Armature::new(vec![
            ArmatureBone { name: "root".into(), parent: None, bind_matrix: Mat4::IDENTITY },
            ArmatureBone {
                name: "arm".into(),
                parent: Some(0),
                bind_matrix: Mat4::from_translation(Vec3::Y),
            },
        ]);
        let mut pose = KeyframedPose::new(armature);
        let clip = Clip::new("Swing", 30.0, 0, 4)
            .with_track(
                0,
                vec![
                    TrackKey { frame: 0.0, translation: Vec3::ZERO, rotation: Quat::IDENTITY },
                    TrackKey { frame: 4.0, translation: Vec3::new(4.0, 0.0, 0.0), rotation: Quat::IDENTITY },
                ],
            )
            .with_track(
                1,
                vec![
                    TrackKey { frame: 0.0, translation: Vec3::Y, rotation: Quat::IDENTITY },
                    TrackKey { frame: 4.0, translation: Vec3::Y, rotation: Quat::from_rotation_z(1.0) },
                ],
            );
        pose.add_clip(clip);
        pose.set_clip(Some("Swing")).unwrap();
        pose
    }

    const BONES: [SampledBone; 2] = [
        SampledBone { bone: 0, parent: None, root_bind: Mat4::IDENTITY },
        SampledBone { bone: 1, parent: Some(0), root_bind: Mat4::IDENTITY },
    ];

    #[test]
    fn test_sample_keys() {
        let mut pose = swinging_pose();
        let plan = SamplePlan::new(0, 4, 30.0, 1.0, 0).unwrap();
        let mut keys = Vec::new();
        sample_sequence(&mut pose, &plan, &BONES, true, 100.0, &mut keys);
        assert_eq!(keys.len(), 10);

        let last_root = keys[8];
        assert!(last_root.location.abs_diff_eq(Vec3::new(400.0, 0.0, 0.0), 1e-3));
        let last_arm = keys[9];
        assert!(last_arm.location.abs_diff_eq(Vec3::new(0.0, 100.0, 0.0), 1e-3));
        // child rotations are stored conjugated
        assert!(quat_approx_eq(last_arm.rotation, Quat::from_rotation_z(-1.0), 1e-5));
        assert!((last_arm.time - 1.0 / 30.0).abs() < 1e-6);
    }

    #[test]
    fn test_locked_root() {
        let mut pose = swinging_pose();
        let plan = SamplePlan::new(0, 4, 30.0, 1.0, 0).unwrap();
        let root = SampledBone { root_bind: Mat4::from_translation(Vec3::new(0.0, 0.0, 1.0)), ..BONES[0] };
        let mut keys = Vec::new();
        sample_sequence(&mut pose, &plan, &[root], false, 1.0, &mut keys);
        assert!(keys.iter().all(|k| k.location == Vec3::new(0.0, 0.0, 1.0)));
    }

    #[test]
    fn test_root_world_transform() {
        let pose = swinging_pose();
        let mut armature = pose.armature().clone();
        armature.world_matrix = Mat4::from_translation(Vec3::new(0.0, 0.0, 5.0));
        let mut shifted = KeyframedPose::new(armature);
        for clip in pose.clips() {
            shifted.add_clip(clip.clone());
        }
        shifted.set_clip(Some("Swing")).unwrap();
        shifted.set_frame(0.0);
        let key = bone_key(&shifted, &BONES[0], true, 1.0, 1.0);
        assert!(key.location.abs_diff_eq(Vec3::new(0.0, 0.0, 5.0), 1e-5));
    }
}
