//! Fixed-size binary records.

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::util::{Quat, Result, Vec3};

/// A fixed-layout record stored in a section payload.
pub trait Record: Sized {
    /// Encoded size in bytes, written as the section element size.
    const SIZE: usize;

    /// Decode one record.
    fn read<R: Read>(r: &mut R) -> Result<Self>;

    /// Encode one record, writing exactly [`Self::SIZE`] bytes.
    fn write<W: Write>(&self, w: &mut W) -> Result<()>;
}

pub(crate) fn read_vec3<R: Read>(r: &mut R) -> Result<Vec3> {
    let x = r.read_f32::<LittleEndian>()?;
    let y = r.read_f32::<LittleEndian>()?;
    let z = r.read_f32::<LittleEndian>()?;
    Ok(Vec3::new(x, y, z))
}

pub(crate) fn write_vec3<W: Write>(w: &mut W, v: Vec3) -> Result<()> {
    w.write_f32::<LittleEndian>(v.x)?;
    w.write_f32::<LittleEndian>(v.y)?;
    w.write_f32::<LittleEndian>(v.z)?;
    Ok(())
}

/// Quaternion stored as `x, y, z, w`.
pub(crate) fn read_quat<R: Read>(r: &mut R) -> Result<Quat> {
    let x = r.read_f32::<LittleEndian>()?;
    let y = r.read_f32::<LittleEndian>()?;
    let z = r.read_f32::<LittleEndian>()?;
    let w = r.read_f32::<LittleEndian>()?;
    Ok(Quat::from_xyzw(x, y, z, w))
}

pub(crate) fn write_quat<W: Write>(w: &mut W, q: Quat) -> Result<()> {
    w.write_f32::<LittleEndian>(q.x)?;
    w.write_f32::<LittleEndian>(q.y)?;
    w.write_f32::<LittleEndian>(q.z)?;
    w.write_f32::<LittleEndian>(q.w)?;
    Ok(())
}

pub(crate) fn read_bytes<R: Read, const N: usize>(r: &mut R) -> Result<[u8; N]> {
    let mut buf = [0u8; N];
    r.read_exact(&mut buf)?;
    Ok(buf)
}
