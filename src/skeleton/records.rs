//! Raw bone record shared by `REFSKELT` (PSK) and `BONENAMES` (PSA).

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::chunk::{read_bytes, read_quat, read_vec3, write_quat, write_vec3, Record};
use crate::util::{decode_fixed, encode_fixed, NameKind, Quat, Result, Vec3};

/// Width of bone, sequence, material and morph name fields.
pub const NAME_LEN: usize = 64;

/// Bone record as stored in the file.
///
/// ```text
/// name[64] flags:i32 children:i32 parent:i32 rot:4xf32 loc:3xf32 pad[16]
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct BoneRecord {
    pub name: [u8; NAME_LEN],
    pub flags: i32,
    pub children_count: i32,
    /// Index of the parent record; a record pointing at itself is a root.
    pub parent_index: i32,
    pub rotation: Quat,
    pub location: Vec3,
    pub padding: [u8; 16],
}

impl BoneRecord {
    /// New record with an encoded name and zeroed counts.
    pub fn new(name: &str, parent_index: i32, rotation: Quat, location: Vec3) -> Result<Self> {
        Ok(Self {
            name: encode_fixed(name, NameKind::Bone)?,
            flags: 0,
            children_count: 0,
            parent_index,
            rotation,
            location,
            padding: [0; 16],
        })
    }

    /// Decoded bone name.
    pub fn name(&self) -> String {
        decode_fixed(&self.name)
    }
}

impl Record for BoneRecord {
    const SIZE: usize = 120;

    fn read<R: Read>(r: &mut R) -> Result<Self> {
        let name = read_bytes::<_, NAME_LEN>(r)?;
        let flags = r.read_i32::<LittleEndian>()?;
        let children_count = r.read_i32::<LittleEndian>()?;
        let parent_index = r.read_i32::<LittleEndian>()?;
        let rotation = read_quat(r)?;
        let location = read_vec3(r)?;
        let padding = read_bytes::<_, 16>(r)?;
        Ok(Self { name, flags, children_count, parent_index, rotation, location, padding })
    }

    fn write<W: Write>(&self, w: &mut W) -> Result<()> {
        w.write_all(&self.name)?;
        w.write_i32::<LittleEndian>(self.flags)?;
        w.write_i32::<LittleEndian>(self.children_count)?;
        w.write_i32::<LittleEndian>(self.parent_index)?;
        write_quat(w, self.rotation)?;
        write_vec3(w, self.location)?;
        w.write_all(&self.padding)?;
        Ok(())
    }
}

/// Recompute `children_count` of every record from the parent links.
///
/// Roots (records pointing at themselves) are not counted as their own
/// children.
pub fn recompute_children_counts(records: &mut [BoneRecord]) {
    for r in records.iter_mut() {
        r.children_count = 0;
    }
    for i in 0..records.len() {
        let parent = records[i].parent_index;
        if parent >= 0 && parent as usize != i && (parent as usize) < records.len() {
            records[parent as usize].children_count += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bone_record_size() {
        let rec = BoneRecord::new("Bip01", 0, Quat::IDENTITY, Vec3::new(1.0, 2.0, 3.0)).unwrap();
        let mut buf = Vec::new();
        rec.write(&mut buf).unwrap();
        assert_eq!(buf.len(), BoneRecord::SIZE);
        // rotation starts after name + three i32 fields
        assert_eq!(&buf[76..80], &0f32.to_le_bytes());
        assert_eq!(&buf[88..92], &1f32.to_le_bytes());
        assert_eq!(&buf[92..96], &1f32.to_le_bytes());

        let back = BoneRecord::read(&mut buf.as_slice()).unwrap();
        assert_eq!(back, rec);
        assert_eq!(back.name(), "Bip01");
    }

    #[test]
    fn test_recompute_children() {
        let mut recs: Vec<BoneRecord> = [0, 0, 1, 1, 0]
            .iter()
            .enumerate()
            .map(|(i, &p)| BoneRecord::new(&format!("b{i}"), p, Quat::IDENTITY, Vec3::ZERO).unwrap())
            .collect();
        recs[0].children_count = 99;
        recompute_children_counts(&mut recs);
        let counts: Vec<i32> = recs.iter().map(|r| r.children_count).collect();
        assert_eq!(counts, vec![3, 2, 0, 0, 0]);
    }
}
