//! Building PSA files from a pose evaluator.

use std::collections::HashSet;
use std::path::Path;

use super::pose::{Armature, KeyframedPose, PoseEvaluator, PoseScope};
use super::sampler::{sample_sequence, SamplePlan, SampledBone};
use crate::config::ConvertOptions;
use crate::psa::{Psa, SequenceRecord};
use crate::skeleton::{recompute_children_counts, BoneRecord};
use crate::util::{conjugate, encode_cp1252, is_restricted_bone_name, to_translation_rotation, Error, NameKind, Result};

/// One sequence to export.
#[derive(Clone, Debug, PartialEq)]
pub struct ExportSequence {
    pub name: String,
    pub group: String,
    /// Clip activated while sampling; `None` samples whatever is active.
    pub clip: Option<String>,
    pub start: i32,
    pub end: i32,
    pub fps: f32,
    pub compression_ratio: f32,
    pub frame_quota: u32,
    pub bake_root_motion: bool,
}

impl ExportSequence {
    /// Sequence over `[start, end]` of a clip, remaining settings from `opts`.
    pub fn new(name: impl Into<String>, clip: Option<&str>, start: i32, end: i32, fps: f32, opts: &ConvertOptions) -> Self {
        Self {
            name: name.into(),
            group: String::new(),
            clip: clip.map(str::to_owned),
            start,
            end,
            fps,
            compression_ratio: opts.compression_ratio,
            frame_quota: opts.frame_quota,
            bake_root_motion: opts.bake_root_motion,
        }
    }
}

/// One export sequence per clip of a keyed pose, over the clip's range.
pub fn clip_sequences(pose: &KeyframedPose, opts: &ConvertOptions) -> Vec<ExportSequence> {
    pose.clips()
        .iter()
        .map(|c| ExportSequence::new(&c.name, Some(c.name.as_str()), c.start, c.end, c.fps, opts))
        .collect()
}

/// Which armature bones go into the file.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum BoneFilter {
    #[default]
    All,
    /// Only the named bones, in armature order.
    Names(Vec<String>),
}

impl BoneFilter {
    /// Armature indices of the selected bones.
    fn select(&self, armature: &Armature) -> Result<Vec<usize>> {
        match self {
            Self::All => Ok((0..armature.bones.len()).collect()),
            Self::Names(names) => {
                if let Some(missing) = names.iter().find(|n| armature.find(n).is_none()) {
                    return Err(Error::validation(format!("bone {missing} is not in the armature")));
                }
                Ok((0..armature.bones.len())
                    .filter(|&i| names.iter().any(|n| *n == armature.bones[i].name))
                    .collect())
            }
        }
    }
}

/// Receives coarse export progress.
pub trait ProgressObserver {
    fn begin(&mut self, _total: usize) {}
    fn sequence_done(&mut self, _index: usize, _total: usize, _name: &str) {}
    fn end(&mut self) {}
}

/// Ignores progress.
impl ProgressObserver for () {}

/// Validated sequence, ready to sample.
struct PlannedSequence<'a> {
    source: &'a ExportSequence,
    record: SequenceRecord,
    plan: SamplePlan,
}

fn check_bone_names(armature: &Armature, selected: &[usize], strict: bool) -> Result<()> {
    let mut seen = HashSet::new();
    for &i in selected {
        let name = &armature.bones[i].name;
        if encode_cp1252(name).is_none() {
            return Err(Error::encoding(NameKind::Bone, name.as_str()));
        }
        if strict && !is_restricted_bone_name(name) {
            return Err(Error::validation(format!(
                "bone name \"{name}\" contains characters outside [A-Za-z0-9_ -]"
            )));
        }
        if !seen.insert(name.as_str()) {
            return Err(Error::validation(format!("duplicate bone name \"{name}\"")));
        }
    }
    Ok(())
}

/// Nearest selected ancestor of every selected bone.
fn sampled_bones(armature: &Armature, selected: &[usize]) -> Vec<SampledBone> {
    selected
        .iter()
        .map(|&bone| {
            let mut parent = armature.bones[bone].parent;
            while let Some(p) = parent {
                if selected.contains(&p) {
                    break;
                }
                parent = armature.bones[p].parent;
            }
            SampledBone {
                bone,
                parent,
                root_bind: armature.local_matrix * armature.bones[bone].bind_matrix,
            }
        })
        .collect()
}

/// Bind-pose bone records.
///
/// Children store the conjugated parent-relative rotation and the
/// parent-relative location. Roots store the bind transform with the
/// armature's local transform applied.
fn bind_records(armature: &Armature, bones: &[SampledBone], export_scale: f32) -> Result<Vec<BoneRecord>> {
    let mut records = bones
        .iter()
        .enumerate()
        .map(|(i, b)| {
            let bone = &armature.bones[b.bone];
            let (parent_index, location, rotation) = match b.parent {
                Some(p) => {
                    let local = armature.bones[p].bind_matrix.inverse() * bone.bind_matrix;
                    let (t, r) = to_translation_rotation(&local);
                    let index = bones.iter().position(|s| s.bone == p).unwrap_or(i);
                    (index, t, conjugate(r))
                }
                None => {
                    let (t, r) = to_translation_rotation(&b.root_bind);
                    (i, t, r)
                }
            };
            BoneRecord::new(&bone.name, parent_index as i32, rotation, location * export_scale)
        })
        .collect::<Result<Vec<_>>>()?;
    recompute_children_counts(&mut records);
    Ok(records)
}

fn plan_sequences<'a>(
    sequences: &'a [ExportSequence],
    bone_count: usize,
    opts: &ConvertOptions,
) -> Result<Vec<PlannedSequence<'a>>> {
    if sequences.is_empty() {
        return Err(Error::validation("no sequences to export"));
    }

    let mut names = HashSet::new();
    let mut frame_start = 0usize;
    let mut planned = Vec::with_capacity(sequences.len());
    for seq in sequences {
        let name = format!("{}{}{}", opts.sequence_name_prefix, seq.name, opts.sequence_name_suffix)
            .trim()
            .to_string();
        if name.is_empty() {
            return Err(Error::validation("sequence with an empty name"));
        }
        if !names.insert(name.clone()) {
            return Err(Error::validation(format!("duplicate sequence name \"{name}\"")));
        }

        let plan = SamplePlan::new(seq.start, seq.end, seq.fps, seq.compression_ratio, seq.frame_quota)
            .map_err(|e| Error::validation(format!("sequence \"{name}\": {e}")))?;
        let frame_count = plan.frame_count as usize;
        let record = SequenceRecord::new(&name, &seq.group, bone_count, plan.effective_fps, frame_start, frame_count)?;
        frame_start += frame_count;
        planned.push(PlannedSequence { source: seq, record, plan });
    }
    Ok(planned)
}

/// Sample every sequence into an in-memory [`Psa`].
///
/// All inputs are validated before the first frame is sampled. The
/// evaluator's frame and clip are restored on return, including on error.
pub fn build_psa<P: PoseEvaluator + ?Sized>(
    pose: &mut P,
    sequences: &[ExportSequence],
    filter: &BoneFilter,
    opts: &ConvertOptions,
    progress: &mut dyn ProgressObserver,
) -> Result<Psa> {
    let _span = tracing::info_span!("build_psa", sequences = sequences.len()).entered();
    let export_scale = opts.export_scale();

    let armature = pose.armature();
    if armature.bones.is_empty() {
        return Err(Error::validation("armature has no bones"));
    }
    armature.validate()?;
    let selected = filter.select(armature)?;
    if selected.is_empty() {
        return Err(Error::validation("bone filter selects no bones"));
    }
    check_bone_names(armature, &selected, opts.bone_name_charset_strict)?;
    let bones = sampled_bones(armature, &selected);
    let bone_records = bind_records(armature, &bones, export_scale)?;
    let planned = plan_sequences(sequences, bones.len(), opts)?;

    let total_frames: usize = planned.iter().map(|p| p.plan.frame_count as usize).sum();
    let mut psa = Psa {
        bones: bone_records,
        sequences: Vec::with_capacity(planned.len()),
        keys: Vec::with_capacity(total_frames * bones.len()),
    };

    let total = planned.len();
    progress.begin(total);
    {
        let mut scope = PoseScope::new(pose);
        for (i, p) in planned.into_iter().enumerate() {
            if let Some(clip) = &p.source.clip {
                scope.set_clip(Some(clip.as_str()))?;
            }
            sample_sequence(
                &mut *scope,
                &p.plan,
                &bones,
                p.source.bake_root_motion,
                export_scale,
                &mut psa.keys,
            );
            tracing::debug!(
                sequence = %p.record.name(),
                frames = p.plan.frame_count,
                fps = p.plan.effective_fps,
                "sampled sequence"
            );
            progress.sequence_done(i, total, &p.record.name());
            psa.sequences.push(p.record);
        }
    }
    progress.end();

    tracing::info!(bones = psa.bones.len(), sequences = psa.sequences.len(), keys = psa.keys.len(), "animation built");
    Ok(psa)
}

/// Build a PSA in memory, then write it atomically.
///
/// On any error no file is left at `path`.
pub fn export_psa<P: PoseEvaluator + ?Sized>(
    path: impl AsRef<Path>,
    pose: &mut P,
    sequences: &[ExportSequence],
    filter: &BoneFilter,
    opts: &ConvertOptions,
    progress: &mut dyn ProgressObserver,
) -> Result<Psa> {
    let psa = build_psa(pose, sequences, filter, opts, progress)?;
    psa.write(path)?;
    Ok(psa)
}
