//! Raw PSK file: every section as decoded records.

use std::io::{Read, Write};
use std::path::Path;

use super::records::*;
use crate::chunk::{write_file_atomic, FileBytes, RawSection, SectionReader, SectionWriter};
use crate::skeleton::BoneRecord;
use crate::util::{Error, Result};

/// A PSK file at record level, before any conversion.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PskFile {
    pub points: Vec<Vec3Record>,
    pub wedges: Vec<WedgeRecord>,
    pub faces: Vec<FaceRecord>,
    pub materials: Vec<MaterialRecord>,
    pub bones: Vec<BoneRecord>,
    pub weights: Vec<WeightRecord>,
    /// Per-wedge colors; empty when the file has none.
    pub colors: Vec<ColorRecord>,
    /// Extra UV channels, each with one entry per wedge.
    pub extra_uvs: Vec<Vec<UvRecord>>,
    /// Per-point normals; empty when the file has none.
    pub normals: Vec<Vec3Record>,
    pub morph_infos: Vec<MorphInfoRecord>,
    pub morph_data: Vec<MorphDataRecord>,
}

impl PskFile {
    /// Read and decode a PSK file.
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let _span = tracing::info_span!("read_psk", path = %path.display()).entered();
        let bytes = FileBytes::open(path)?;
        Self::from_bytes(&bytes)
    }

    /// Decode a PSK file held in memory.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::from_reader(bytes)
    }

    /// Decode a PSK stream.
    ///
    /// Sections are dispatched by name and may come in any order. Unknown
    /// sections are skipped with a warning. Points and bones are required.
    pub fn from_reader<R: Read>(source: R) -> Result<Self> {
        let mut reader = SectionReader::new(source);
        let mut psk = PskFile::default();
        let mut first = true;

        while let Some(section) = reader.next_section()? {
            if first && section.name() != ACTRHEAD {
                tracing::warn!(section = section.name(), "file does not start with {ACTRHEAD}");
            }
            first = false;
            psk.take_section(&section)?;
        }

        if psk.points.is_empty() {
            return Err(Error::MissingSection(PNTS0000));
        }
        if psk.bones.is_empty() {
            return Err(Error::MissingSection(REFSKELT));
        }
        if psk.wedges.is_empty() || psk.faces.is_empty() {
            tracing::warn!(wedges = psk.wedges.len(), faces = psk.faces.len(), "file has no triangles");
        }
        Ok(psk)
    }

    fn take_section(&mut self, section: &RawSection) -> Result<()> {
        match section.name() {
            ACTRHEAD => {}
            PNTS0000 => self.points = section.records()?,
            VTXW0000 => {
                self.wedges = section.records()?;
                if self.wedges.len() <= MAX_WEDGES_16 {
                    // high half is padding
                    for w in &mut self.wedges {
                        w.point_index &= 0xFFFF;
                    }
                }
            }
            FACE0000 => self.faces = section.records::<Face16>()?.into_iter().map(|f| f.0).collect(),
            FACE3200 => self.faces = section.records::<Face32>()?.into_iter().map(|f| f.0).collect(),
            MATT0000 => self.materials = section.records()?,
            REFSKELT | REFSKEL0 => self.bones = section.records()?,
            RAWWEIGHTS | RAWW0000 => self.weights = section.records()?,
            VERTEXCOLOR => self.colors = section.records()?,
            VTXNORMS => self.normals = section.records()?,
            MRPHINFO => self.morph_infos = section.records()?,
            MRPHDATA => self.morph_data = section.records()?,
            name if name.starts_with(EXTRAUVS) => self.extra_uvs.push(section.records()?),
            name => tracing::warn!(section = name, pos = section.pos, "skipping unknown section"),
        }
        Ok(())
    }

    /// Check the parts a writer cannot do without.
    pub fn validate(&self) -> Result<()> {
        if self.points.is_empty() {
            return Err(Error::validation("mesh has no points"));
        }
        if self.bones.is_empty() {
            return Err(Error::validation("mesh has no bones"));
        }
        if !self.needs_wide_faces() {
            if let Some(w) = self.wedges.iter().find(|w| w.point_index > 0xFFFF) {
                return Err(Error::validation(format!(
                    "wedge references point {} but files with at most {MAX_WEDGES_16} wedges store 16-bit point indices",
                    w.point_index
                )));
            }
        }
        let wedge_count = self.wedges.len() as u32;
        if let Some(face) = self.faces.iter().find(|f| f.wedges.iter().any(|&w| w >= wedge_count)) {
            return Err(Error::validation(format!("face references wedge out of range: {:?}", face.wedges)));
        }
        Ok(())
    }

    /// True if faces need 32-bit wedge indices.
    #[inline]
    pub fn needs_wide_faces(&self) -> bool {
        self.wedges.len() > MAX_WEDGES_16
    }

    /// Write every section, in the conventional order.
    pub fn write_sections<W: Write>(&self, w: &mut SectionWriter<W>) -> Result<()> {
        w.write_header_section(ACTRHEAD)?;
        w.write_section(PNTS0000, &self.points)?;
        w.write_section(VTXW0000, &self.wedges)?;
        if self.needs_wide_faces() {
            let faces: Vec<Face32> = self.faces.iter().copied().map(Face32).collect();
            w.write_section(FACE3200, &faces)?;
        } else {
            let faces: Vec<Face16> = self.faces.iter().copied().map(Face16).collect();
            w.write_section(FACE0000, &faces)?;
        }
        w.write_section(MATT0000, &self.materials)?;
        w.write_section(REFSKELT, &self.bones)?;
        w.write_section(RAWWEIGHTS, &self.weights)?;
        if !self.colors.is_empty() {
            w.write_section(VERTEXCOLOR, &self.colors)?;
        }
        for (i, uvs) in self.extra_uvs.iter().enumerate() {
            w.write_section(&format!("{EXTRAUVS}{i}"), uvs)?;
        }
        if !self.normals.is_empty() {
            w.write_section(VTXNORMS, &self.normals)?;
        }
        if !self.morph_infos.is_empty() {
            w.write_section(MRPHINFO, &self.morph_infos)?;
            w.write_section(MRPHDATA, &self.morph_data)?;
        }
        Ok(())
    }

    /// Encode into a byte vector.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.validate()?;
        let mut w = SectionWriter::new(Vec::new());
        self.write_sections(&mut w)?;
        w.into_inner()
    }

    /// Validate, then write the file atomically.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        self.validate()?;
        write_file_atomic(path, |w| self.write_sections(w))
    }
}
