//! Section writer.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use tempfile::NamedTempFile;

use super::format::*;
use super::record::Record;
use crate::util::{Error, Result};

/// Output stream for writing sections.
pub struct SectionWriter<W: Write> {
    writer: W,
    pos: u64,
}

impl<W: Write> SectionWriter<W> {
    /// Wrap a byte sink.
    pub fn new(writer: W) -> Self {
        Self { writer, pos: 0 }
    }

    /// Get the current write position.
    #[inline]
    pub fn pos(&self) -> u64 {
        self.pos
    }

    /// Write a header-only section (element size and count 0).
    pub fn write_header_section(&mut self, name: &str) -> Result<()> {
        SectionHeader::new(name, 0, 0).write(&mut self.writer)?;
        self.pos += SECTION_HEADER_SIZE as u64;
        tracing::debug!(section = name, "wrote header section");
        Ok(())
    }

    /// Write a header followed by every record.
    pub fn write_section<T: Record>(&mut self, name: &str, records: &[T]) -> Result<()> {
        SectionHeader::new(name, T::SIZE, records.len()).write(&mut self.writer)?;
        self.pos += SECTION_HEADER_SIZE as u64;
        for record in records {
            record.write(&mut self.writer)?;
        }
        self.pos += (T::SIZE * records.len()) as u64;
        tracing::debug!(section = name, size = T::SIZE, count = records.len(), "wrote section");
        Ok(())
    }

    /// Flush and return the underlying sink.
    pub fn into_inner(mut self) -> Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

/// Write one section to `sink`.
pub fn write_section<W: Write, T: Record>(sink: W, name: &str, records: &[T]) -> Result<()> {
    let mut w = SectionWriter::new(sink);
    w.write_section(name, records)?;
    w.into_inner()?;
    Ok(())
}

/// Write a file through a temporary sibling, renamed into place on success.
///
/// If `f` fails, the temporary file is removed and `path` is left untouched.
pub fn write_file_atomic<F>(path: impl AsRef<Path>, f: F) -> Result<()>
where
    F: FnOnce(&mut SectionWriter<BufWriter<&mut File>>) -> Result<()>,
{
    let path = path.as_ref();
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    {
        let mut w = SectionWriter::new(BufWriter::new(tmp.as_file_mut()));
        f(&mut w)?;
        let pos = w.pos();
        w.into_inner()?;
        tracing::debug!(path = %path.display(), bytes = pos, "persisting");
    }
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::record::{read_vec3, write_vec3};
    use crate::util::Vec3;
    use std::io::Read;

    struct Point(Vec3);

    impl Record for Point {
        const SIZE: usize = 12;
        fn read<R: Read>(r: &mut R) -> Result<Self> {
            Ok(Point(read_vec3(r)?))
        }
        fn write<W: Write>(&self, w: &mut W) -> Result<()> {
            write_vec3(w, self.0)
        }
    }

    #[test]
    fn test_write_positions() {
        let mut w = SectionWriter::new(Vec::new());
        w.write_header_section("ACTRHEAD").unwrap();
        w.write_section("PNTS0000", &[Point(Vec3::X), Point(Vec3::Y)]).unwrap();
        assert_eq!(w.pos(), 32 + 32 + 24);
        let bytes = w.into_inner().unwrap();
        assert_eq!(bytes.len(), 88);
        assert_eq!(&bytes[32 + 24..32 + 28], &12i32.to_le_bytes());
        assert_eq!(&bytes[32 + 28..32 + 32], &2i32.to_le_bytes());
    }

    #[test]
    fn test_atomic_write_success() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.psa");
        write_file_atomic(&path, |w| w.write_header_section("ANIMHEAD")).unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 32);
    }

    #[test]
    fn test_atomic_write_failure_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.psa");
        let err = write_file_atomic(&path, |w| {
            w.write_header_section("ANIMHEAD")?;
            Err(Error::validation("boom"))
        })
        .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(!path.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
