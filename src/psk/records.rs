//! PSK section records.

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::chunk::{read_bytes, read_vec3, write_vec3, Record};
use crate::skeleton::NAME_LEN;
use crate::util::{decode_fixed, encode_fixed, NameKind, Result, Vec2, Vec3};

/// Section names, in the order they are written.
pub const ACTRHEAD: &str = "ACTRHEAD";
pub const PNTS0000: &str = "PNTS0000";
pub const VTXW0000: &str = "VTXW0000";
pub const FACE0000: &str = "FACE0000";
pub const FACE3200: &str = "FACE3200";
pub const MATT0000: &str = "MATT0000";
pub const REFSKELT: &str = "REFSKELT";
pub const REFSKEL0: &str = "REFSKEL0";
pub const RAWWEIGHTS: &str = "RAWWEIGHTS";
pub const RAWW0000: &str = "RAWW0000";
pub const VERTEXCOLOR: &str = "VERTEXCOLOR";
pub const EXTRAUVS: &str = "EXTRAUVS";
pub const VTXNORMS: &str = "VTXNORMS";
pub const MRPHINFO: &str = "MRPHINFO";
pub const MRPHDATA: &str = "MRPHDATA";

/// Wedge counts above this need 32-bit wedge indices (`FACE3200`).
pub const MAX_WEDGES_16: usize = 65536;

/// Three floats: points and normals.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Vec3Record(pub Vec3);

impl Record for Vec3Record {
    const SIZE: usize = 12;

    fn read<R: Read>(r: &mut R) -> Result<Self> {
        Ok(Self(read_vec3(r)?))
    }

    fn write<W: Write>(&self, w: &mut W) -> Result<()> {
        write_vec3(w, self.0)
    }
}

/// Two floats: extra UV channels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UvRecord(pub Vec2);

impl Record for UvRecord {
    const SIZE: usize = 8;

    fn read<R: Read>(r: &mut R) -> Result<Self> {
        let u = r.read_f32::<LittleEndian>()?;
        let v = r.read_f32::<LittleEndian>()?;
        Ok(Self(Vec2::new(u, v)))
    }

    fn write<W: Write>(&self, w: &mut W) -> Result<()> {
        w.write_f32::<LittleEndian>(self.0.x)?;
        w.write_f32::<LittleEndian>(self.0.y)?;
        Ok(())
    }
}

/// Face corner record.
///
/// The point index is a u16 followed by two padding bytes when the file
/// has at most [`MAX_WEDGES_16`] wedges, a full u32 otherwise. It is read
/// as a u32 here; the decoder masks it for 16-bit files.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WedgeRecord {
    pub point_index: u32,
    pub u: f32,
    pub v: f32,
    pub material_index: u8,
    pub reserved: u8,
}

impl Record for WedgeRecord {
    const SIZE: usize = 16;

    fn read<R: Read>(r: &mut R) -> Result<Self> {
        let point_index = r.read_u32::<LittleEndian>()?;
        let u = r.read_f32::<LittleEndian>()?;
        let v = r.read_f32::<LittleEndian>()?;
        let material_index = r.read_u8()?;
        let reserved = r.read_u8()?;
        r.read_u16::<LittleEndian>()?;
        Ok(Self { point_index, u, v, material_index, reserved })
    }

    fn write<W: Write>(&self, w: &mut W) -> Result<()> {
        w.write_u32::<LittleEndian>(self.point_index)?;
        w.write_f32::<LittleEndian>(self.u)?;
        w.write_f32::<LittleEndian>(self.v)?;
        w.write_u8(self.material_index)?;
        w.write_u8(self.reserved)?;
        w.write_u16::<LittleEndian>(0)?;
        Ok(())
    }
}

/// Triangle referencing three wedges.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FaceRecord {
    pub wedges: [u32; 3],
    pub material_index: u8,
    pub aux_material_index: u8,
    pub smoothing_groups: u32,
}

/// `FACE0000` layout: 16-bit wedge indices.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Face16(pub FaceRecord);

impl Record for Face16 {
    const SIZE: usize = 12;

    fn read<R: Read>(r: &mut R) -> Result<Self> {
        let mut wedges = [0u32; 3];
        for w in &mut wedges {
            *w = r.read_u16::<LittleEndian>()? as u32;
        }
        let material_index = r.read_u8()?;
        let aux_material_index = r.read_u8()?;
        let smoothing_groups = r.read_u32::<LittleEndian>()?;
        Ok(Self(FaceRecord { wedges, material_index, aux_material_index, smoothing_groups }))
    }

    fn write<W: Write>(&self, w: &mut W) -> Result<()> {
        for &idx in &self.0.wedges {
            w.write_u16::<LittleEndian>(idx as u16)?;
        }
        w.write_u8(self.0.material_index)?;
        w.write_u8(self.0.aux_material_index)?;
        w.write_u32::<LittleEndian>(self.0.smoothing_groups)?;
        Ok(())
    }
}

/// `FACE3200` layout: 32-bit wedge indices.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Face32(pub FaceRecord);

impl Record for Face32 {
    const SIZE: usize = 18;

    fn read<R: Read>(r: &mut R) -> Result<Self> {
        let mut wedges = [0u32; 3];
        for w in &mut wedges {
            *w = r.read_u32::<LittleEndian>()?;
        }
        let material_index = r.read_u8()?;
        let aux_material_index = r.read_u8()?;
        let smoothing_groups = r.read_u32::<LittleEndian>()?;
        Ok(Self(FaceRecord { wedges, material_index, aux_material_index, smoothing_groups }))
    }

    fn write<W: Write>(&self, w: &mut W) -> Result<()> {
        for &idx in &self.0.wedges {
            w.write_u32::<LittleEndian>(idx)?;
        }
        w.write_u8(self.0.material_index)?;
        w.write_u8(self.0.aux_material_index)?;
        w.write_u32::<LittleEndian>(self.0.smoothing_groups)?;
        Ok(())
    }
}

/// Material metadata. Textures are not resolved.
#[derive(Clone, Debug, PartialEq)]
pub struct MaterialRecord {
    pub name: [u8; NAME_LEN],
    pub texture_index: i32,
    pub poly_flags: u32,
    pub aux_material: i32,
    pub aux_flags: u32,
    pub lod_bias: i32,
    pub lod_style: i32,
}

impl MaterialRecord {
    pub fn new(name: &str) -> Result<Self> {
        Ok(Self {
            name: encode_fixed(name, NameKind::Material)?,
            texture_index: 0,
            poly_flags: 0,
            aux_material: 0,
            aux_flags: 0,
            lod_bias: 0,
            lod_style: 0,
        })
    }

    pub fn name(&self) -> String {
        decode_fixed(&self.name)
    }
}

impl Record for MaterialRecord {
    const SIZE: usize = 88;

    fn read<R: Read>(r: &mut R) -> Result<Self> {
        Ok(Self {
            name: read_bytes::<_, NAME_LEN>(r)?,
            texture_index: r.read_i32::<LittleEndian>()?,
            poly_flags: r.read_u32::<LittleEndian>()?,
            aux_material: r.read_i32::<LittleEndian>()?,
            aux_flags: r.read_u32::<LittleEndian>()?,
            lod_bias: r.read_i32::<LittleEndian>()?,
            lod_style: r.read_i32::<LittleEndian>()?,
        })
    }

    fn write<W: Write>(&self, w: &mut W) -> Result<()> {
        w.write_all(&self.name)?;
        w.write_i32::<LittleEndian>(self.texture_index)?;
        w.write_u32::<LittleEndian>(self.poly_flags)?;
        w.write_i32::<LittleEndian>(self.aux_material)?;
        w.write_u32::<LittleEndian>(self.aux_flags)?;
        w.write_i32::<LittleEndian>(self.lod_bias)?;
        w.write_i32::<LittleEndian>(self.lod_style)?;
        Ok(())
    }
}

/// Vertex influence.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WeightRecord {
    pub weight: f32,
    pub point_index: i32,
    pub bone_index: i32,
}

impl Record for WeightRecord {
    const SIZE: usize = 12;

    fn read<R: Read>(r: &mut R) -> Result<Self> {
        Ok(Self {
            weight: r.read_f32::<LittleEndian>()?,
            point_index: r.read_i32::<LittleEndian>()?,
            bone_index: r.read_i32::<LittleEndian>()?,
        })
    }

    fn write<W: Write>(&self, w: &mut W) -> Result<()> {
        w.write_f32::<LittleEndian>(self.weight)?;
        w.write_i32::<LittleEndian>(self.point_index)?;
        w.write_i32::<LittleEndian>(self.bone_index)?;
        Ok(())
    }
}

/// Per-wedge RGBA color.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ColorRecord(pub [u8; 4]);

impl Record for ColorRecord {
    const SIZE: usize = 4;

    fn read<R: Read>(r: &mut R) -> Result<Self> {
        Ok(Self(read_bytes::<_, 4>(r)?))
    }

    fn write<W: Write>(&self, w: &mut W) -> Result<()> {
        w.write_all(&self.0)?;
        Ok(())
    }
}

/// Morph target header: name and number of affected vertices.
#[derive(Clone, Debug, PartialEq)]
pub struct MorphInfoRecord {
    pub name: [u8; NAME_LEN],
    pub vertex_count: i32,
}

impl MorphInfoRecord {
    pub fn new(name: &str, vertex_count: usize) -> Result<Self> {
        Ok(Self {
            name: encode_fixed(name, NameKind::Morph)?,
            vertex_count: vertex_count as i32,
        })
    }

    pub fn name(&self) -> String {
        decode_fixed(&self.name)
    }
}

impl Record for MorphInfoRecord {
    const SIZE: usize = 68;

    fn read<R: Read>(r: &mut R) -> Result<Self> {
        Ok(Self {
            name: read_bytes::<_, NAME_LEN>(r)?,
            vertex_count: r.read_i32::<LittleEndian>()?,
        })
    }

    fn write<W: Write>(&self, w: &mut W) -> Result<()> {
        w.write_all(&self.name)?;
        w.write_i32::<LittleEndian>(self.vertex_count)?;
        Ok(())
    }
}

/// One affected vertex of a morph target.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MorphDataRecord {
    pub position_delta: Vec3,
    pub normal_delta: Vec3,
    pub point_index: i32,
}

impl Record for MorphDataRecord {
    const SIZE: usize = 28;

    fn read<R: Read>(r: &mut R) -> Result<Self> {
        Ok(Self {
            position_delta: read_vec3(r)?,
            normal_delta: read_vec3(r)?,
            point_index: r.read_i32::<LittleEndian>()?,
        })
    }

    fn write<W: Write>(&self, w: &mut W) -> Result<()> {
        write_vec3(w, self.position_delta)?;
        write_vec3(w, self.normal_delta)?;
        w.write_i32::<LittleEndian>(self.point_index)?;
        Ok(())
    }
}
