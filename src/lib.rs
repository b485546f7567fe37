//! # pskpsa
//!
//! Reader and writer for the ActorX skeletal mesh (.psk) and skeletal
//! animation (.psa) interchange formats.
//!
//! ## Modules
//!
//! - [`util`] - Errors, math helpers, name charset
//! - [`chunk`] - Section envelope shared by both formats
//! - [`skeleton`] - Bone records and hierarchy reconstruction
//! - [`psk`] - Mesh files and the normalized [`psk::Mesh`]
//! - [`psa`] - Animation files
//! - [`anim`] - Pose evaluation, sampling and PSA building
//! - [`config`] - Conversion options
//!
//! ## Example
//!
//! ```ignore
//! use pskpsa::prelude::*;
//!
//! let opts = ConvertOptions::default();
//! let mesh = read_psk("hero.psk", &opts)?;
//!
//! let mut pose = KeyframedPose::new(Armature::from_skeleton(&mesh.skeleton));
//! pose.add_clip(Clip::new("Idle", 30.0, 0, 59));
//! let sequences = clip_sequences(&pose, &opts);
//! export_psa("hero.psa", &mut pose, &sequences, &BoneFilter::All, &opts, &mut ())?;
//! ```

pub mod util;
pub mod chunk;
pub mod skeleton;
pub mod psk;
pub mod psa;
pub mod anim;
pub mod config;

// Re-export commonly used types
pub use config::ConvertOptions;
pub use util::{Error, Result};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::anim::{
        build_psa, clip_sequences, export_psa, Armature, ArmatureBone, BoneFilter, Clip, ExportSequence,
        KeyframedPose, PoseEvaluator, PoseScope, ProgressObserver, TrackKey,
    };
    pub use crate::config::ConvertOptions;
    pub use crate::psa::Psa;
    pub use crate::psk::{read_psk, write_psk, Mesh, PskFile};
    pub use crate::skeleton::{build_skeleton, Bone, Skeleton};
    pub use crate::util::{Error, Result};
}
