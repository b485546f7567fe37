//! Pose evaluation context.
//!
//! A [`PoseEvaluator`] owns the frame cursor and the active clip. Sampling
//! moves both; [`PoseScope`] puts them back when it goes out of scope.

use std::ops::{Deref, DerefMut};

use crate::skeleton::Skeleton;
use crate::util::{Error, Mat4, Quat, Result, Vec3};

/// A bone of the armature being exported.
#[derive(Clone, Debug, PartialEq)]
pub struct ArmatureBone {
    pub name: String,
    pub parent: Option<usize>,
    /// Rest pose in armature space.
    pub bind_matrix: Mat4,
}

/// Ordered bone list plus the armature object's own transforms.
#[derive(Clone, Debug, PartialEq)]
pub struct Armature {
    pub bones: Vec<ArmatureBone>,
    /// Armature transform relative to its parent object.
    pub local_matrix: Mat4,
    /// Armature transform in world space.
    pub world_matrix: Mat4,
}

impl Default for Armature {
    fn default() -> Self {
        Self { bones: Vec::new(), local_matrix: Mat4::IDENTITY, world_matrix: Mat4::IDENTITY }
    }
}

impl Armature {
    /// Armature with identity object transforms.
    pub fn new(bones: Vec<ArmatureBone>) -> Self {
        Self { bones, ..Default::default() }
    }

    /// Armature built from the bind pose of a reconstructed skeleton.
    pub fn from_skeleton(skeleton: &Skeleton) -> Self {
        Self::new(
            skeleton
                .bones
                .iter()
                .map(|b| ArmatureBone { name: b.name.clone(), parent: b.parent, bind_matrix: b.bind_matrix })
                .collect(),
        )
    }

    /// Check that parent links are in range and form a forest.
    pub fn validate(&self) -> Result<()> {
        let n = self.bones.len();
        let mut children = vec![Vec::new(); n];
        for (i, b) in self.bones.iter().enumerate() {
            match b.parent {
                Some(p) if p >= n => {
                    return Err(Error::validation(format!(
                        "bone \"{}\" has parent index {p} but the armature has {n} bones",
                        b.name
                    )));
                }
                Some(p) => children[p].push(i),
                None => {}
            }
        }

        let mut stack: Vec<usize> = (0..n).filter(|&i| self.bones[i].parent.is_none()).collect();
        let mut reached = 0;
        while let Some(i) = stack.pop() {
            reached += 1;
            stack.extend(children[i].iter().copied());
        }
        if reached != n {
            return Err(Error::validation(format!(
                "armature parent links contain a cycle ({reached} of {n} bones reachable from a root)"
            )));
        }
        Ok(())
    }

    pub fn find(&self, name: &str) -> Option<usize> {
        self.bones.iter().position(|b| b.name == name)
    }

    /// Rest transform of a bone relative to its parent.
    pub fn rest_local(&self, bone: usize) -> Mat4 {
        let b = &self.bones[bone];
        match b.parent {
            Some(p) => self.bones[p].bind_matrix.inverse() * b.bind_matrix,
            None => b.bind_matrix,
        }
    }
}

/// Evaluates armature-space bone poses at a frame of a clip.
pub trait PoseEvaluator {
    fn armature(&self) -> &Armature;

    /// Current frame; may be fractional.
    fn frame(&self) -> f32;

    fn set_frame(&mut self, frame: f32);

    /// Active clip, if any.
    fn clip(&self) -> Option<&str>;

    /// Activate a clip by name, or clear the active clip.
    fn set_clip(&mut self, clip: Option<&str>) -> Result<()>;

    /// Armature-space pose of a bone at the current frame.
    fn pose_matrix(&self, bone: usize) -> Mat4;
}

/// Guard that restores frame and clip of a [`PoseEvaluator`] on drop.
pub struct PoseScope<'a, P: PoseEvaluator + ?Sized> {
    inner: &'a mut P,
    frame: f32,
    clip: Option<String>,
}

impl<'a, P: PoseEvaluator + ?Sized> PoseScope<'a, P> {
    pub fn new(inner: &'a mut P) -> Self {
        let frame = inner.frame();
        let clip = inner.clip().map(str::to_owned);
        Self { inner, frame, clip }
    }
}

impl<P: PoseEvaluator + ?Sized> Deref for PoseScope<'_, P> {
    type Target = P;

    fn deref(&self) -> &P {
        self.inner
    }
}

impl<P: PoseEvaluator + ?Sized> DerefMut for PoseScope<'_, P> {
    fn deref_mut(&mut self) -> &mut P {
        self.inner
    }
}

impl<P: PoseEvaluator + ?Sized> Drop for PoseScope<'_, P> {
    fn drop(&mut self) {
        if let Err(e) = self.inner.set_clip(self.clip.as_deref()) {
            tracing::warn!(error = %e, "could not restore active clip");
        }
        self.inner.set_frame(self.frame);
    }
}

/// One key of a bone track, relative to the parent bone.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrackKey {
    pub frame: f32,
    pub translation: Vec3,
    pub rotation: Quat,
}

/// Keyed clip: per-bone tracks of parent-relative transforms.
///
/// Bones without a track stay at rest.
#[derive(Clone, Debug, PartialEq)]
pub struct Clip {
    pub name: String,
    pub fps: f32,
    pub start: i32,
    pub end: i32,
    /// Indexed by bone; keys sorted by frame.
    pub tracks: Vec<Vec<TrackKey>>,
}

impl Clip {
    pub fn new(name: impl Into<String>, fps: f32, start: i32, end: i32) -> Self {
        Self { name: name.into(), fps, start, end, tracks: Vec::new() }
    }

    /// Add or replace the track of a bone. Keys are sorted by frame.
    pub fn with_track(mut self, bone: usize, mut keys: Vec<TrackKey>) -> Self {
        keys.sort_by(|a, b| a.frame.total_cmp(&b.frame));
        if self.tracks.len() <= bone {
            self.tracks.resize(bone + 1, Vec::new());
        }
        self.tracks[bone] = keys;
        self
    }

    /// Interpolated parent-relative transform, `None` without keys.
    pub fn sample(&self, bone: usize, frame: f32) -> Option<Mat4> {
        let keys = self.tracks.get(bone).filter(|k| !k.is_empty())?;
        let i = keys.partition_point(|k| k.frame <= frame);
        let (t, r) = if i == 0 {
            (keys[0].translation, keys[0].rotation)
        } else if i == keys.len() {
            let last = keys[i - 1];
            (last.translation, last.rotation)
        } else {
            let (a, b) = (keys[i - 1], keys[i]);
            let f = (frame - a.frame) / (b.frame - a.frame);
            (a.translation.lerp(b.translation, f), a.rotation.slerp(b.rotation, f))
        };
        Some(Mat4::from_rotation_translation(r.normalize(), t))
    }
}

/// In-memory evaluator over keyed clips.
#[derive(Clone, Debug)]
pub struct KeyframedPose {
    armature: Armature,
    clips: Vec<Clip>,
    active: Option<usize>,
    frame: f32,
}

impl KeyframedPose {
    pub fn new(armature: Armature) -> Self {
        Self { armature, clips: Vec::new(), active: None, frame: 0.0 }
    }

    pub fn add_clip(&mut self, clip: Clip) {
        self.clips.retain(|c| c.name != clip.name);
        self.clips.push(clip);
    }

    pub fn clips(&self) -> &[Clip] {
        &self.clips
    }

    /// Parent-relative transform of a bone at the current frame.
    fn local_matrix(&self, bone: usize) -> Mat4 {
        self.active
            .and_then(|c| self.clips[c].sample(bone, self.frame))
            .unwrap_or_else(|| self.armature.rest_local(bone))
    }
}

impl PoseEvaluator for KeyframedPose {
    fn armature(&self) -> &Armature {
        &self.armature
    }

    fn frame(&self) -> f32 {
        self.frame
    }

    fn set_frame(&mut self, frame: f32) {
        self.frame = frame;
    }

    fn clip(&self) -> Option<&str> {
        self.active.map(|c| self.clips[c].name.as_str())
    }

    fn set_clip(&mut self, clip: Option<&str>) -> Result<()> {
        self.active = match clip {
            Some(name) => Some(
                self.clips
                    .iter()
                    .position(|c| c.name == name)
                    .ok_or_else(|| Error::ClipNotFound(name.to_string()))?,
            ),
            None => None,
        };
        Ok(())
    }

    fn pose_matrix(&self, bone: usize) -> Mat4 {
        let mut m = self.local_matrix(bone);
        let mut parent = self.armature.bones[bone].parent;
        while let Some(p) = parent {
            m = self.local_matrix(p) * m;
            parent = self.armature.bones[p].parent;
        }
        m
    }
}
