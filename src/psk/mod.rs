//! PSK skeletal mesh codec.
//!
//! ```text
//! ACTRHEAD  header only
//! PNTS0000  points            12 bytes
//! VTXW0000  wedges            16 bytes
//! FACE0000  faces             12 bytes (FACE3200: 18 bytes)
//! MATT0000  materials         88 bytes
//! REFSKELT  bones            120 bytes
//! RAWWEIGHTS weights          12 bytes
//! optional: VERTEXCOLOR, EXTRAUVS<n>, VTXNORMS, MRPHINFO, MRPHDATA
//! ```
//!
//! [`PskFile`] holds the records; [`Mesh`] is the normalized form in model
//! units with a reconstructed [`Skeleton`](crate::skeleton::Skeleton).

mod file;
mod mesh;
pub mod records;

pub use file::PskFile;
pub use mesh::{uv_layers, Material, Mesh, MorphDelta, MorphTarget, Triangle, UvLayer, VertexWeight, UV_SINGLE};

use std::path::Path;

use crate::config::ConvertOptions;
use crate::util::Result;

/// Read a PSK file into a normalized mesh.
pub fn read_psk(path: impl AsRef<Path>, opts: &ConvertOptions) -> Result<Mesh> {
    Mesh::from_psk(&PskFile::read(path)?, opts)
}

/// Write a mesh as a PSK file. Nothing is written if encoding fails.
pub fn write_psk(path: impl AsRef<Path>, mesh: &Mesh, opts: &ConvertOptions) -> Result<()> {
    mesh.to_psk(opts)?.write(path)
}
