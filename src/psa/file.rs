//! PSA file: bones, sequences and the flat key array.

use std::io::{Read, Write};
use std::path::Path;

use super::records::*;
use crate::chunk::{write_file_atomic, FileBytes, SectionReader, SectionWriter};
use crate::config::ConvertOptions;
use crate::skeleton::BoneRecord;
use crate::util::{conjugate, Error, Quat, Result, Vec3};

/// A decoded or ready-to-write animation file.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Psa {
    pub bones: Vec<BoneRecord>,
    pub sequences: Vec<SequenceRecord>,
    /// Keys of all sequences: sequence, then frame, then bone.
    pub keys: Vec<KeyRecord>,
}

/// Bone transform in model convention.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoneKey {
    pub location: Vec3,
    pub rotation: Quat,
}

/// A sequence with its keys converted back to model convention.
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedSequence {
    pub name: String,
    pub group: String,
    pub fps: f32,
    /// `frames[frame][bone]`
    pub frames: Vec<Vec<BoneKey>>,
}

impl DecodedSequence {
    #[inline]
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }
}

impl Psa {
    /// Read and decode a PSA file.
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let _span = tracing::info_span!("read_psa", path = %path.display()).entered();
        let bytes = FileBytes::open(path)?;
        Self::from_bytes(&bytes)
    }

    /// Decode a PSA file held in memory.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::from_reader(bytes)
    }

    /// Decode a PSA stream and check sequence ranges against the keys.
    pub fn from_reader<R: Read>(source: R) -> Result<Self> {
        let mut reader = SectionReader::new(source);
        let mut psa = Psa::default();
        let (mut has_bones, mut has_info, mut has_keys) = (false, false, false);

        while let Some(section) = reader.next_section()? {
            match section.name() {
                ANIMHEAD => {}
                BONENAMES => {
                    psa.bones = section.records()?;
                    has_bones = true;
                }
                ANIMINFO => {
                    psa.sequences = section.records()?;
                    has_info = true;
                }
                ANIMKEYS => {
                    psa.keys = section.records()?;
                    has_keys = true;
                }
                name => tracing::warn!(section = name, pos = section.pos, "skipping unknown section"),
            }
        }

        if !has_bones {
            return Err(Error::MissingSection(BONENAMES));
        }
        if !has_info {
            return Err(Error::MissingSection(ANIMINFO));
        }
        if !has_keys {
            return Err(Error::MissingSection(ANIMKEYS));
        }
        psa.check_ranges().map_err(|e| match e {
            Error::Validation(msg) => Error::InvalidStructure(msg),
            e => e,
        })?;

        tracing::debug!(
            bones = psa.bones.len(),
            sequences = psa.sequences.len(),
            keys = psa.keys.len(),
            "animation decoded"
        );
        Ok(psa)
    }

    /// Sequence bone counts match and key ranges fit the key array.
    fn check_ranges(&self) -> Result<()> {
        for seq in &self.sequences {
            let name = seq.name();
            if seq.bone_count as usize != self.bones.len() || seq.bone_count < 0 {
                return Err(Error::validation(format!(
                    "sequence {name} has {} bones, file has {}",
                    seq.bone_count,
                    self.bones.len()
                )));
            }
            if seq.frame_start_index < 0 || seq.frame_count < 0 {
                return Err(Error::validation(format!("sequence {name} has a negative frame range")));
            }
            let range = seq.key_range();
            if range.end > self.keys.len() {
                return Err(Error::validation(format!(
                    "sequence {name} needs keys {}..{}, file has {}",
                    range.start,
                    range.end,
                    self.keys.len()
                )));
            }
        }
        Ok(())
    }

    /// Check everything a writer relies on.
    pub fn validate(&self) -> Result<()> {
        self.check_ranges()?;
        let frames: usize = self.sequences.iter().map(|s| s.frame_count.max(0) as usize).sum();
        let expected = frames * self.bones.len();
        if expected != self.keys.len() {
            return Err(Error::validation(format!(
                "{} keys for {frames} frames of {} bones",
                self.keys.len(),
                self.bones.len()
            )));
        }
        Ok(())
    }

    /// Look up a sequence by name.
    pub fn sequence(&self, name: &str) -> Result<&SequenceRecord> {
        self.sequences
            .iter()
            .find(|s| s.name() == name)
            .ok_or_else(|| Error::SequenceNotFound(name.to_string()))
    }

    /// All keys of one sequence.
    pub fn keys_for(&self, seq: &SequenceRecord) -> Result<&[KeyRecord]> {
        self.keys
            .get(seq.key_range())
            .ok_or_else(|| Error::invalid(format!("key range of sequence {} is out of bounds", seq.name())))
    }

    /// Keys of every bone at one frame of a sequence.
    pub fn frame_keys(&self, seq: &SequenceRecord, frame: usize) -> Result<&[KeyRecord]> {
        if frame >= seq.frame_count.max(0) as usize {
            return Err(Error::other(format!(
                "frame {frame} out of range for sequence {} ({} frames)",
                seq.name(),
                seq.frame_count
            )));
        }
        let bones = seq.bone_count.max(0) as usize;
        let keys = self.keys_for(seq)?;
        keys.get(frame * bones..(frame + 1) * bones)
            .ok_or_else(|| Error::invalid(format!("keys of frame {frame} in sequence {} are out of bounds", seq.name())))
    }

    /// Indices of bones whose parent index is their own index.
    pub fn root_indices(&self) -> Vec<usize> {
        self.bones
            .iter()
            .enumerate()
            .filter(|(i, b)| b.parent_index as i64 == *i as i64)
            .map(|(i, _)| i)
            .collect()
    }

    /// Convert every sequence back to model convention.
    ///
    /// Locations are scaled by `unit_scale`; non-root rotations are
    /// conjugated back. Root keys are stored unconjugated.
    pub fn decode_sequences(&self, opts: &ConvertOptions) -> Result<Vec<DecodedSequence>> {
        let roots = self.root_indices();
        let bones = self.bones.len();
        self.sequences
            .iter()
            .map(|seq| {
                let keys = self.keys_for(seq)?;
                let frames = keys
                    .chunks(bones.max(1))
                    .map(|frame| {
                        frame
                            .iter()
                            .enumerate()
                            .map(|(b, k)| BoneKey {
                                location: k.location * opts.unit_scale,
                                rotation: if roots.contains(&b) { k.rotation } else { conjugate(k.rotation) },
                            })
                            .collect()
                    })
                    .collect();
                Ok(DecodedSequence { name: seq.name(), group: seq.group(), fps: seq.fps, frames })
            })
            .collect()
    }

    /// Write the four sections, in order, even when empty.
    pub fn write_sections<W: Write>(&self, w: &mut SectionWriter<W>) -> Result<()> {
        w.write_header_section(ANIMHEAD)?;
        w.write_section(BONENAMES, &self.bones)?;
        w.write_section(ANIMINFO, &self.sequences)?;
        w.write_section(ANIMKEYS, &self.keys)?;
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::SECTION_HEADER_SIZE;

    fn sample() -> Psa {
        let bones = vec![
            BoneRecord::new("root", 0, Quat::IDENTITY, Vec3::ZERO).unwrap(),
            BoneRecord::new("arm", 0, Quat::IDENTITY, Vec3::X).unwrap(),
        ];
        let sequences = vec![
            SequenceRecord::new("Idle", "", 2, 30.0, 0, 2).unwrap(),
            SequenceRecord::new("Wave", "", 2, 30.0, 2, 1).unwrap(),
        ];
        let rot = Quat::from_rotation_z(0.5);
        let keys = (0..6)
            .map(|i| KeyRecord { location: Vec3::splat(i as f32), rotation: rot, time: 1.0 / 30.0 })
            .collect();
        Psa { bones, sequences, keys }
    }

    #[test]
    fn test_roundtrip_bytes() {
        let psa = sample();
        let bytes = psa.to_bytes().unwrap();
        assert_eq!(Psa::from_bytes(&bytes).unwrap(), psa);
    }

    #[test]
    fn test_empty_sections_written() {
        let bytes = Psa::default().to_bytes().unwrap();
        assert_eq!(bytes.len(), 4 * SECTION_HEADER_SIZE);
        assert_eq!(Psa::from_bytes(&bytes).unwrap(), Psa::default());
    }

    #[test]
    fn test_lookup() {
        let psa = sample();
        let wave = psa.sequence("Wave").unwrap();
        let keys = psa.keys_for(wave).unwrap();
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0].location, Vec3::splat(4.0));
        let idle = psa.sequence("Idle").unwrap();
        assert_eq!(psa.frame_keys(idle, 1).unwrap()[1].location, Vec3::splat(3.0));
        assert!(psa.frame_keys(idle, 2).is_err());
        assert!(matches!(psa.sequence("Run"), Err(Error::SequenceNotFound(_))));
    }

    #[test]
    fn test_frame_keys_follow_sequence_bone_count() {
        let mut psa = sample();
        psa.bones.push(BoneRecord::new("hand", 1, Quat::IDENTITY, Vec3::Y).unwrap());
        let idle = psa.sequence("Idle").unwrap().clone();
        let keys = psa.frame_keys(&idle, 1).unwrap();
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0].location, Vec3::splat(2.0));

        psa.bones.truncate(1);
        let wave = psa.sequence("Wave").unwrap().clone();
        assert_eq!(psa.frame_keys(&wave, 0).unwrap().len(), 2);
        assert!(psa.validate().is_err());
    }

    #[test]
    fn test_decode_sequences() {
        let psa = sample();
        let opts = ConvertOptions::default();
        let decoded = psa.decode_sequences(&opts).unwrap();
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[0].frame_count(), 2);
        let root = decoded[0].frames[0][0];
        let arm = decoded[0].frames[0][1];
        assert_eq!(root.rotation, Quat::from_rotation_z(0.5));
        assert_eq!(arm.rotation, conjugate(Quat::from_rotation_z(0.5)));
        assert!(arm.location.abs_diff_eq(Vec3::splat(0.01), 1e-7));
    }

    #[test]
    fn test_range_out_of_bounds() {
        let mut psa = sample();
        psa.keys.truncate(4);
        assert!(matches!(psa.to_bytes().unwrap_err(), Error::Validation(_)));

        // bypass the writer check to produce a bad file
        let mut w = SectionWriter::new(Vec::new());
        psa.write_sections(&mut w).unwrap();
        let bytes = w.into_inner().unwrap();
        let err = Psa::from_bytes(&bytes).unwrap_err();
        assert!(matches!(err, Error::InvalidStructure(_)));
    }

    #[test]
    fn test_missing_keys_section() {
        let psa = sample();
        let mut w = SectionWriter::new(Vec::new());
        w.write_header_section(ANIMHEAD).unwrap();
        w.write_section(BONENAMES, &psa.bones).unwrap();
        w.write_section(ANIMINFO, &psa.sequences).unwrap();
        let bytes = w.into_inner().unwrap();
        assert!(matches!(Psa::from_bytes(&bytes).unwrap_err(), Error::MissingSection(ANIMKEYS)));
    }

    #[test]
    fn test_corrupted_magic() {
        let mut bytes = sample().to_bytes().unwrap();
        bytes[20] = 0xAA;
        let err = Psa::from_bytes(&bytes).unwrap_err();
        assert!(err.is_format_error());
    }
}
