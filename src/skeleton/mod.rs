//! Skeleton reconstruction.
//!
//! Bones pass through three stages, each with its own type:
//!
//! - [`BoneRecord`] - raw 120-byte file record
//! - `BuilderBone` - resolved parent/child links (builder private)
//! - [`Bone`] - final bone with bind and display transforms
//!
//! All bones of a [`Skeleton`] live in one vector; parents and children are
//! indices into it.

mod builder;
mod records;
mod reorient;

pub use builder::{build_skeleton, display_bone_size, Bone, Skeleton};
pub use records::{recompute_children_counts, BoneRecord, NAME_LEN};
