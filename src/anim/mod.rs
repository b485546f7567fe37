//! Animation export.
//!
//! - [`pose`] - pose evaluation context and the keyed reference evaluator
//! - [`sampler`] - sampling plans and per-bone key computation
//! - [`export`] - validated PSA building from export sequences

pub mod export;
pub mod pose;
pub mod sampler;

pub use export::{build_psa, clip_sequences, export_psa, BoneFilter, ExportSequence, ProgressObserver};
pub use pose::{Armature, ArmatureBone, Clip, KeyframedPose, PoseEvaluator, PoseScope, TrackKey};
pub use sampler::{bone_key, sample_sequence, SamplePlan, SampledBone};
