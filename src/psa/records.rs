//! PSA section records.

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::chunk::{read_bytes, read_quat, read_vec3, write_quat, write_vec3, Record};
use crate::skeleton::NAME_LEN;
use crate::util::{decode_fixed, encode_fixed, NameKind, Quat, Result, Vec3};

pub const ANIMHEAD: &str = "ANIMHEAD";
pub const BONENAMES: &str = "BONENAMES";
pub const ANIMINFO: &str = "ANIMINFO";
pub const ANIMKEYS: &str = "ANIMKEYS";

/// One animation sequence.
///
/// `frame_start_index` counts frames: the first key of the sequence is at
/// `frame_start_index * bone_count` in the key array.
#[derive(Clone, Debug, PartialEq)]
pub struct SequenceRecord {
    pub name: [u8; NAME_LEN],
    pub group: [u8; NAME_LEN],
    pub bone_count: i32,
    pub root_include: i32,
    pub compression_style: i32,
    pub key_quotum: i32,
    pub key_reduction: f32,
    pub track_time: f32,
    /// Effective sample rate after compression.
    pub fps: f32,
    pub start_bone: i32,
    pub frame_start_index: i32,
    pub frame_count: i32,
}

impl SequenceRecord {
    /// New sequence with reserved fields zeroed.
    pub fn new(name: &str, group: &str, bone_count: usize, fps: f32, frame_start_index: usize, frame_count: usize) -> Result<Self> {
        Ok(Self {
            name: encode_fixed(name, NameKind::Sequence)?,
            group: encode_fixed(group, NameKind::Sequence)?,
            bone_count: bone_count as i32,
            root_include: 0,
            compression_style: 0,
            key_quotum: 0,
            key_reduction: 1.0,
            track_time: frame_count as f32,
            fps,
            start_bone: 0,
            frame_start_index: frame_start_index as i32,
            frame_count: frame_count as i32,
        })
    }

    pub fn name(&self) -> String {
        decode_fixed(&self.name)
    }

    pub fn group(&self) -> String {
        decode_fixed(&self.group)
    }

    /// Index range of this sequence's keys in the flat key array.
    pub fn key_range(&self) -> std::ops::Range<usize> {
        let bones = self.bone_count.max(0) as usize;
        let start = self.frame_start_index.max(0) as usize * bones;
        start..start + self.frame_count.max(0) as usize * bones
    }
}

impl Record for SequenceRecord {
    const SIZE: usize = 168;

    fn read<R: Read>(r: &mut R) -> Result<Self> {
        Ok(Self {
            name: read_bytes::<_, NAME_LEN>(r)?,
            group: read_bytes::<_, NAME_LEN>(r)?,
            bone_count: r.read_i32::<LittleEndian>()?,
            root_include: r.read_i32::<LittleEndian>()?,
            compression_style: r.read_i32::<LittleEndian>()?,
            key_quotum: r.read_i32::<LittleEndian>()?,
            key_reduction: r.read_f32::<LittleEndian>()?,
            track_time: r.read_f32::<LittleEndian>()?,
            fps: r.read_f32::<LittleEndian>()?,
            start_bone: r.read_i32::<LittleEndian>()?,
            frame_start_index: r.read_i32::<LittleEndian>()?,
            frame_count: r.read_i32::<LittleEndian>()?,
        })
    }

    fn write<W: Write>(&self, w: &mut W) -> Result<()> {
        w.write_all(&self.name)?;
        w.write_all(&self.group)?;
        w.write_i32::<LittleEndian>(self.bone_count)?;
        w.write_i32::<LittleEndian>(self.root_include)?;
        w.write_i32::<LittleEndian>(self.compression_style)?;
        w.write_i32::<LittleEndian>(self.key_quotum)?;
        w.write_f32::<LittleEndian>(self.key_reduction)?;
        w.write_f32::<LittleEndian>(self.track_time)?;
        w.write_f32::<LittleEndian>(self.fps)?;
        w.write_i32::<LittleEndian>(self.start_bone)?;
        w.write_i32::<LittleEndian>(self.frame_start_index)?;
        w.write_i32::<LittleEndian>(self.frame_count)?;
        Ok(())
    }
}

/// One bone transform at one frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KeyRecord {
    pub location: Vec3,
    pub rotation: Quat,
    /// Per-frame delta: `1 / fps` of the owning sequence.
    pub time: f32,
}

impl Record for KeyRecord {
    const SIZE: usize = 32;

    fn read<R: Read>(r: &mut R) -> Result<Self> {
        Ok(Self {
            location: read_vec3(r)?,
            rotation: read_quat(r)?,
            time: r.read_f32::<LittleEndian>()?,
        })
    }

    fn write<W: Write>(&self, w: &mut W) -> Result<()> {
        write_vec3(w, self.location)?;
        write_quat(w, self.rotation)?;
        w.write_f32::<LittleEndian>(self.time)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_layout() {
        let seq = SequenceRecord::new("Walk", "Locomotion", 3, 15.0, 5, 10).unwrap();
        let mut buf = Vec::new();
        seq.write(&mut buf).unwrap();
        assert_eq!(buf.len(), SequenceRecord::SIZE);
        assert_eq!(&buf[..4], b"Walk");
        assert_eq!(&buf[64..74], b"Locomotion");
        assert_eq!(&buf[128..132], &3i32.to_le_bytes());
        // key reduction, track time, fps
        assert_eq!(&buf[144..148], &1.0f32.to_le_bytes());
        assert_eq!(&buf[148..152], &10.0f32.to_le_bytes());
        assert_eq!(&buf[152..156], &15.0f32.to_le_bytes());
        assert_eq!(&buf[160..164], &5i32.to_le_bytes());
        assert_eq!(&buf[164..168], &10i32.to_le_bytes());

        let back = SequenceRecord::read(&mut buf.as_slice()).unwrap();
        assert_eq!(back, seq);
        assert_eq!(back.key_range(), 15..45);
    }

    #[test]
    fn test_key_layout() {
        let key = KeyRecord {
            location: Vec3::new(1.0, 2.0, 3.0),
            rotation: Quat::from_xyzw(0.0, 0.0, 0.0, 1.0),
            time: 0.5,
        };
        let mut buf = Vec::new();
        key.write(&mut buf).unwrap();
        assert_eq!(buf.len(), KeyRecord::SIZE);
        // w is the last rotation component
        assert_eq!(&buf[24..28], &1.0f32.to_le_bytes());
        assert_eq!(&buf[28..32], &0.5f32.to_le_bytes());
    }

    #[test]
    fn test_unencodable_sequence_name() {
        assert!(SequenceRecord::new("步行", "", 1, 30.0, 0, 1).is_err());
    }
}
