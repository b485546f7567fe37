//! Chunked section envelope shared by PSK and PSA files.
//!
//! Both formats are a flat sequence of sections:
//!
//! ```text
//! +------------------+
//! | Section header   |  32 bytes (name, type flag, element size, count)
//! +------------------+
//! | Records          |  element size * count bytes
//! +------------------+
//! | Section header   |
//! +------------------+
//! | ...              |
//! ```

mod format;
mod reader;
mod record;
mod writer;

pub use format::*;
pub use reader::*;
pub use record::Record;
pub(crate) use record::{read_bytes, read_quat, read_vec3, write_quat, write_vec3};
pub use writer::*;
