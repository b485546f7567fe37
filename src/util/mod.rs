//! Utility types and functions.
//!
//! - [`Error`] / [`Result`] - Error handling
//! - Math type re-exports from glam plus convention helpers
//! - Windows-1252 fixed-width name codec

mod charset;
mod error;
mod math;

pub use charset::*;
pub use error::*;
pub use math::*;
