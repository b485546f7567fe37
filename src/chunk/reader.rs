//! Section reader.

use std::fs::File;
use std::io::{Cursor, Read};
use std::ops::Deref;
use std::path::Path;

#[cfg(feature = "mmap")]
use memmap2::Mmap;

use super::format::*;
use super::record::Record;
use crate::util::{Error, Result};

/// One section as read from the stream: header plus raw payload.
#[derive(Clone, Debug)]
pub struct RawSection {
    pub header: SectionHeader,
    /// Stream position of the first payload byte.
    pub pos: u64,
    pub data: Vec<u8>,
}

impl RawSection {
    /// Section name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.header.name
    }

    /// Declared record count.
    #[inline]
    pub fn len(&self) -> usize {
        self.header.element_count.max(0) as usize
    }

    /// True if the section holds no records.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Decode the payload as records of type `T`.
    pub fn records<T: Record>(&self) -> Result<Vec<T>> {
        if self.is_empty() {
            return Ok(Vec::new());
        }
        let actual = self.header.element_size as usize;
        if actual != T::SIZE {
            return Err(Error::RecordSizeMismatch {
                section: self.header.name.clone(),
                expected: T::SIZE,
                actual,
            });
        }

        let mut cursor = Cursor::new(self.data.as_slice());
        let mut out = Vec::with_capacity(self.len());
        for _ in 0..self.len() {
            out.push(T::read(&mut cursor)?);
        }
        Ok(out)
    }
}

/// Sequential reader over the sections of a stream.
pub struct SectionReader<R: Read> {
    inner: R,
    pos: u64,
    sections_read: usize,
}

impl<R: Read> SectionReader<R> {
    /// Wrap a byte source.
    pub fn new(inner: R) -> Self {
        Self { inner, pos: 0, sections_read: 0 }
    }

    /// Current stream position.
    #[inline]
    pub fn pos(&self) -> u64 {
        self.pos
    }

    /// Read the next section, `None` at a clean end of stream.
    ///
    /// A wrong type flag on the first section means the stream is not in
    /// this format at all; on later sections it is a corrupt header.
    pub fn next_section(&mut self) -> Result<Option<RawSection>> {
        let Some(header) = SectionHeader::read(&mut self.inner, self.pos)? else {
            return Ok(None);
        };
        self.pos += SECTION_HEADER_SIZE as u64;

        if header.type_flag != SECTION_TYPE_FLAG {
            return Err(if self.sections_read == 0 {
                Error::NotThisFormat { found: header.type_flag }
            } else {
                Error::InvalidMagic { section: header.name, found: header.type_flag }
            });
        }

        let len = header.payload_len()?;
        let pos = self.pos;
        let mut data = Vec::new();
        let got = (&mut self.inner).take(len).read_to_end(&mut data)? as u64;
        if got < len {
            return Err(Error::Truncated { pos: pos + got, needed: len - got });
        }
        self.pos += len;
        self.sections_read += 1;

        tracing::debug!(
            section = %header.name,
            size = header.element_size,
            count = header.element_count,
            "read section"
        );
        Ok(Some(RawSection { header, pos, data }))
    }

    /// Read the next section, failing at end of stream.
    pub fn read_section(&mut self) -> Result<RawSection> {
        let pos = self.pos;
        self.next_section()?.ok_or(Error::Truncated {
            pos,
            needed: SECTION_HEADER_SIZE as u64,
        })
    }

    /// Read every remaining section.
    pub fn read_all(&mut self) -> Result<Vec<RawSection>> {
        let mut out = Vec::new();
        while let Some(section) = self.next_section()? {
            out.push(section);
        }
        Ok(out)
    }
}

/// Read one section from `source`.
pub fn read_section<R: Read>(source: R) -> Result<RawSection> {
    SectionReader::new(source).read_section()
}

/// Bytes of a file opened for decoding.
/// Memory-mapped when the `mmap` feature is enabled.
pub enum FileBytes {
    #[cfg(feature = "mmap")]
    Mmap(Mmap),
    Buffer(Vec<u8>),
}

impl FileBytes {
    /// Open a file, memory-mapping it when possible.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_opts(path, cfg!(feature = "mmap"))
    }

    /// Open a file with optional memory mapping.
    pub fn open_opts(path: impl AsRef<Path>, use_mmap: bool) -> Result<Self> {
        let path = path.as_ref();
        let mut file = File::open(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::FileNotFound(path.to_path_buf())
            } else {
                Error::Io(e)
            }
        })?;

        if use_mmap {
            if let Some(mapped) = map_file(&file)? {
                return Ok(mapped);
            }
        }

        let mut buf = Vec::new();
        file.read_to_end(&mut buf)?;
        Ok(Self::Buffer(buf))
    }
}

#[cfg(feature = "mmap")]
fn map_file(file: &File) -> Result<Option<FileBytes>> {
    if file.metadata()?.len() == 0 {
        return Ok(None);
    }
    // Safety: the map is read-only and dropped before the file is written again
    let mmap = unsafe { Mmap::map(file) }?;
    Ok(Some(FileBytes::Mmap(mmap)))
}

#[cfg(not(feature = "mmap"))]
fn map_file(_file: &File) -> Result<Option<FileBytes>> {
    Ok(None)
}

impl Deref for FileBytes {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            #[cfg(feature = "mmap")]
            Self::Mmap(m) => m,
            Self::Buffer(b) => b,
        }
    }
}
