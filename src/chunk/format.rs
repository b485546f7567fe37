//! Chunk envelope constants and the section header.

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::util::{decode_latin1, Error, NameKind, Result};

/// Type flag carried by every section header.
pub const SECTION_TYPE_FLAG: i32 = 1999801;

/// Width of the section name field in bytes.
pub const SECTION_NAME_LEN: usize = 20;

/// Size of a section header in bytes.
pub const SECTION_HEADER_SIZE: usize = 32;

/// Header preceding every section.
///
/// ```text
/// +------------------+
/// | Name             |  20 bytes, NUL padded
/// +------------------+
/// | Type flag        |  i32 LE (1999801)
/// +------------------+
/// | Element size     |  i32 LE (0 for header-only sections)
/// +------------------+
/// | Element count    |  i32 LE
/// +------------------+
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SectionHeader {
    pub name: String,
    pub type_flag: i32,
    pub element_size: i32,
    pub element_count: i32,
}

impl SectionHeader {
    /// Header for a section of `count` records of `size` bytes.
    pub fn new(name: impl Into<String>, size: usize, count: usize) -> Self {
        Self {
            name: name.into(),
            type_flag: SECTION_TYPE_FLAG,
            element_size: size as i32,
            element_count: count as i32,
        }
    }

    /// Payload length in bytes.
    ///
    /// Negative sizes or counts are rejected.
    pub fn payload_len(&self) -> Result<u64> {
        if self.element_size < 0 || self.element_count < 0 {
            return Err(Error::invalid(format!(
                "Section '{}' has negative size {} or count {}",
                self.name, self.element_size, self.element_count
            )));
        }
        Ok(self.element_size as u64 * self.element_count as u64)
    }

    /// Parse a header from its 32 raw bytes.
    pub fn from_bytes(bytes: &[u8; SECTION_HEADER_SIZE]) -> Self {
        let name = decode_latin1(&bytes[..SECTION_NAME_LEN]);
        let mut rest = &bytes[SECTION_NAME_LEN..];
        // Reading from a 12-byte slice cannot fail.
        let mut next = || rest.read_i32::<LittleEndian>().unwrap_or_default();
        let type_flag = next();
        let element_size = next();
        let element_count = next();
        Self { name, type_flag, element_size, element_count }
    }

    /// Write the header.
    pub fn write<W: Write>(&self, w: &mut W) -> Result<()> {
        if !self.name.is_ascii() {
            return Err(Error::encoding(NameKind::Section, self.name.clone()));
        }
        let mut name = [0u8; SECTION_NAME_LEN];
        let len = self.name.len().min(SECTION_NAME_LEN);
        name[..len].copy_from_slice(&self.name.as_bytes()[..len]);
        w.write_all(&name)?;
        w.write_i32::<LittleEndian>(self.type_flag)?;
        w.write_i32::<LittleEndian>(self.element_size)?;
        w.write_i32::<LittleEndian>(self.element_count)?;
        Ok(())
    }

    /// Read a header, `None` at a clean end of stream.
    pub fn read<R: Read>(r: &mut R, pos: u64) -> Result<Option<Self>> {
        let mut buf = [0u8; SECTION_HEADER_SIZE];
        let mut filled = 0;
        while filled < SECTION_HEADER_SIZE {
            match r.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        match filled {
            0 => Ok(None),
            SECTION_HEADER_SIZE => Ok(Some(Self::from_bytes(&buf))),
            _ => Err(Error::Truncated {
                pos: pos + filled as u64,
                needed: (SECTION_HEADER_SIZE - filled) as u64,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        let mut buf = Vec::new();
        SectionHeader::new("ANIMKEYS", 32, 3).write(&mut buf).unwrap();
        assert_eq!(buf.len(), SECTION_HEADER_SIZE);
        assert_eq!(&buf[..8], b"ANIMKEYS");
        assert!(buf[8..20].iter().all(|&b| b == 0));
        assert_eq!(&buf[20..24], &SECTION_TYPE_FLAG.to_le_bytes());
        assert_eq!(&buf[24..28], &32i32.to_le_bytes());
        assert_eq!(&buf[28..32], &3i32.to_le_bytes());
    }

    #[test]
    fn test_header_parse() {
        let mut buf = Vec::new();
        SectionHeader::new("REFSKELT", 120, 2).write(&mut buf).unwrap();
        let h = SectionHeader::read(&mut buf.as_slice(), 0).unwrap().unwrap();
        assert_eq!(h.name, "REFSKELT");
        assert_eq!(h.type_flag, SECTION_TYPE_FLAG);
        assert_eq!(h.payload_len().unwrap(), 240);
    }

    #[test]
    fn test_header_eof() {
        let empty: &[u8] = &[];
        assert!(SectionHeader::read(&mut &*empty, 0).unwrap().is_none());

        let short = [0u8; 10];
        let err = SectionHeader::read(&mut &short[..], 64).unwrap_err();
        assert!(matches!(err, Error::Truncated { pos: 74, needed: 22 }));
    }

    #[test]
    fn test_negative_count() {
        let h = SectionHeader { element_count: -1, ..SectionHeader::new("X", 4, 0) };
        assert!(h.payload_len().is_err());
    }
}
