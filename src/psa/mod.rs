//! PSA skeletal animation codec.
//!
//! ```text
//! ANIMHEAD   header only
//! BONENAMES  bones       120 bytes
//! ANIMINFO   sequences   168 bytes
//! ANIMKEYS   keys         32 bytes
//! ```
//!
//! The four sections are always written, in this order. Keys are laid out
//! sequence by sequence, frame by frame, bone by bone.

mod file;
pub mod records;

pub use file::{BoneKey, DecodedSequence, Psa};
pub use records::{KeyRecord, SequenceRecord};
