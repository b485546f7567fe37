//! Normalized mesh and its conversion to and from [`PskFile`].
//!
//! File conventions undone on import:
//!
//! - face corners are stored in the order (1, 0, 2)
//! - V texture coordinates are flipped (`1 - v`)
//! - morph position deltas have Y negated
//! - vertex color bytes are brightened with the linear to sRGB curve
//!   when gamma correction is on
//!
//! The encoder applies the same conventions in reverse.

use std::collections::{BTreeSet, HashMap};

use super::file::PskFile;
use super::records::*;
use crate::config::ConvertOptions;
use crate::skeleton::{build_skeleton, Skeleton};
use crate::util::{linear_to_srgb, srgb_to_linear, Error, Result, Vec2, Vec3, Vec4};

/// Name of the UV layer when UVs are not split per material.
pub const UV_SINGLE: &str = "UV_SINGLE";

/// A triangle of the normalized mesh.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Triangle {
    /// Vertex indices in model winding.
    pub vertices: [u32; 3],
    /// Source wedge of each corner. Only meaningful after import.
    pub wedges: [u32; 3],
    /// Texture coordinates per corner, V already flipped.
    pub uvs: [Vec2; 3],
    /// Wedge material of each corner.
    pub wedge_materials: [u8; 3],
    pub material: u8,
    pub aux_material: u8,
    pub smoothing_groups: u32,
}

/// Per-corner texture coordinates, three entries per triangle.
#[derive(Clone, Debug, PartialEq)]
pub struct UvLayer {
    pub name: String,
    pub uvs: Vec<Vec2>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Material {
    pub name: String,
    pub texture_index: i32,
    pub poly_flags: u32,
    pub aux_material: i32,
    pub aux_flags: u32,
    pub lod_bias: i32,
    pub lod_style: i32,
}

impl Material {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            texture_index: 0,
            poly_flags: 0,
            aux_material: 0,
            aux_flags: 0,
            lod_bias: 0,
            lod_style: 0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VertexWeight {
    pub vertex: u32,
    pub bone: u32,
    pub weight: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MorphDelta {
    pub vertex: u32,
    /// Position offset in model units and axes.
    pub position: Vec3,
    pub normal: Vec3,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MorphTarget {
    pub name: String,
    pub deltas: Vec<MorphDelta>,
}

/// A skinned mesh in model units.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Mesh {
    pub positions: Vec<Vec3>,
    pub triangles: Vec<Triangle>,
    /// Derived from triangle UVs: one `UV_SINGLE` layer, or one layer per
    /// wedge material when splitting.
    pub uv_layers: Vec<UvLayer>,
    pub extra_uv_layers: Vec<UvLayer>,
    /// RGBA per corner, sRGB encoded when gamma correction is on.
    pub colors: Option<Vec<Vec4>>,
    /// Per-vertex normals.
    pub normals: Option<Vec<Vec3>>,
    pub materials: Vec<Material>,
    pub weights: Vec<VertexWeight>,
    pub morph_targets: Vec<MorphTarget>,
    pub skeleton: Skeleton,
}

impl Mesh {
    /// Indices of weighted vertices per bone.
    pub fn vertex_groups(&self) -> Vec<Vec<u32>> {
        let mut groups = vec![Vec::new(); self.skeleton.len()];
        for w in &self.weights {
            if let Some(g) = groups.get_mut(w.bone as usize) {
                g.push(w.vertex);
            }
        }
        groups
    }

    /// Convert a decoded file into a mesh.
    pub fn from_psk(psk: &PskFile, opts: &ConvertOptions) -> Result<Self> {
        let _span = tracing::info_span!("decode_mesh", points = psk.points.len(), faces = psk.faces.len()).entered();

        let mut mesh = Mesh {
            positions: psk.points.iter().map(|p| p.0 * opts.unit_scale).collect(),
            ..Default::default()
        };

        if opts.import_skeleton {
            mesh.skeleton = build_skeleton(&psk.bones, opts)?;
        }

        if opts.import_mesh {
            decode_triangles(psk, &mut mesh)?;
            mesh.uv_layers = uv_layers(&mesh.triangles, opts.split_uv_per_material);
            mesh.extra_uv_layers = decode_extra_uvs(psk, &mesh.triangles);
            mesh.colors = decode_colors(psk, &mesh.triangles, opts);
            mesh.normals = decode_normals(psk);
            mesh.materials = psk.materials.iter().map(material_from_record).collect();
            mesh.weights = decode_weights(psk);
            mesh.morph_targets = decode_morphs(psk, opts)?;

            for w in &mesh.weights {
                if let Some(bone) = mesh.skeleton.bones.get_mut(w.bone as usize) {
                    bone.has_weights = true;
                }
            }
        }

        tracing::debug!(
            triangles = mesh.triangles.len(),
            weights = mesh.weights.len(),
            morphs = mesh.morph_targets.len(),
            "mesh decoded"
        );
        Ok(mesh)
    }

    /// Convert back into file records.
    ///
    /// Wedges are rebuilt by deduplicating corners with identical vertex,
    /// UV, material, color and extra UVs.
    pub fn to_psk(&self, opts: &ConvertOptions) -> Result<PskFile> {
        let scale = opts.export_scale();
        let corner_count = self.triangles.len() * 3;
        if let Some(colors) = &self.colors {
            if colors.len() != corner_count {
                return Err(Error::validation(format!(
                    "{} vertex colors for {corner_count} corners",
                    colors.len()
                )));
            }
        }
        if let Some(normals) = self.normals.as_ref().filter(|n| n.len() != self.positions.len()) {
            return Err(Error::validation(format!(
                "{} normals for {} vertices",
                normals.len(),
                self.positions.len()
            )));
        }
        if let Some(layer) = self.extra_uv_layers.iter().find(|l| l.uvs.len() != corner_count) {
            return Err(Error::validation(format!(
                "extra UV layer {} has {} entries for {corner_count} corners",
                layer.name,
                layer.uvs.len()
            )));
        }

        let mut psk = PskFile {
            points: self.positions.iter().map(|&p| Vec3Record(p * scale)).collect(),
            bones: self.skeleton.to_records(opts)?,
            ..Default::default()
        };
        psk.materials = self
            .materials
            .iter()
            .map(material_to_record)
            .collect::<Result<Vec<_>>>()?;
        if psk.materials.is_empty() && !self.triangles.is_empty() {
            psk.materials.push(MaterialRecord::new("None")?);
        }

        let colors = self.colors.as_deref();
        psk.extra_uvs = vec![Vec::new(); self.extra_uv_layers.len()];
        let mut lookup: HashMap<WedgeKey, u32> = HashMap::new();

        for (t, tri) in self.triangles.iter().enumerate() {
            let mut corner_wedges = [0u32; 3];
            // file order, so an imported mesh keeps its wedge numbering
            for c in [1, 0, 2] {
                let corner = t * 3 + c;
                let uv = Vec2::new(tri.uvs[c].x, 1.0 - tri.uvs[c].y);
                let color = colors.map(|cs| color_to_record(cs[corner], opts));
                let extra: Vec<Vec2> = self
                    .extra_uv_layers
                    .iter()
                    .map(|l| Vec2::new(l.uvs[corner].x, 1.0 - l.uvs[corner].y))
                    .collect();
                let key = WedgeKey::new(tri.vertices[c], uv, tri.wedge_materials[c], color, &extra);

                corner_wedges[c] = *lookup.entry(key).or_insert_with(|| {
                    let index = psk.wedges.len() as u32;
                    psk.wedges.push(WedgeRecord {
                        point_index: tri.vertices[c],
                        u: uv.x,
                        v: uv.y,
                        material_index: tri.wedge_materials[c],
                        reserved: 0,
                    });
                    if let Some(color) = color {
                        psk.colors.push(color);
                    }
                    for (layer, uv) in psk.extra_uvs.iter_mut().zip(&extra) {
                        layer.push(UvRecord(*uv));
                    }
                    index
                });
            }
            psk.faces.push(FaceRecord {
                wedges: [corner_wedges[1], corner_wedges[0], corner_wedges[2]],
                material_index: tri.material,
                aux_material_index: tri.aux_material,
                smoothing_groups: tri.smoothing_groups,
            });
        }

        psk.weights = self
            .weights
            .iter()
            .map(|w| WeightRecord { weight: w.weight, point_index: w.vertex as i32, bone_index: w.bone as i32 })
            .collect();
        if let Some(normals) = &self.normals {
            psk.normals = normals.iter().map(|&n| Vec3Record(n)).collect();
        }
        for target in &self.morph_targets {
            psk.morph_infos.push(MorphInfoRecord::new(&target.name, target.deltas.len())?);
            psk.morph_data.extend(target.deltas.iter().map(|d| MorphDataRecord {
                position_delta: Vec3::new(d.position.x, -d.position.y, d.position.z) * scale,
                normal_delta: d.normal,
                point_index: d.vertex as i32,
            }));
        }

        tracing::debug!(wedges = psk.wedges.len(), faces = psk.faces.len(), "mesh encoded");
        Ok(psk)
    }
}

/// Hashable identity of a wedge.
#[derive(PartialEq, Eq, Hash)]
struct WedgeKey {
    vertex: u32,
    uv: [u32; 2],
    material: u8,
    color: Option<[u8; 4]>,
    extra: Vec<[u32; 2]>,
}

impl WedgeKey {
    fn new(vertex: u32, uv: Vec2, material: u8, color: Option<ColorRecord>, extra: &[Vec2]) -> Self {
        let bits = |v: Vec2| [v.x.to_bits(), v.y.to_bits()];
        Self {
            vertex,
            uv: bits(uv),
            material,
            color: color.map(|c| c.0),
            extra: extra.iter().copied().map(bits).collect(),
        }
    }
}

fn decode_triangles(psk: &PskFile, mesh: &mut Mesh) -> Result<()> {
    let point_count = psk.points.len() as u32;
    let wedge = |index: u32| -> Result<&WedgeRecord> {
        let w = psk
            .wedges
            .get(index as usize)
            .ok_or_else(|| Error::invalid(format!("face references missing wedge {index}")))?;
        if w.point_index >= point_count {
            return Err(Error::invalid(format!("wedge {index} references missing point {}", w.point_index)));
        }
        Ok(w)
    };

    mesh.triangles.reserve(psk.faces.len());
    for face in &psk.faces {
        let order = [face.wedges[1], face.wedges[0], face.wedges[2]];
        let mut tri = Triangle {
            vertices: [0; 3],
            wedges: order,
            uvs: [Vec2::ZERO; 3],
            wedge_materials: [0; 3],
            material: face.material_index,
            aux_material: face.aux_material_index,
            smoothing_groups: face.smoothing_groups,
        };
        for (c, &index) in order.iter().enumerate() {
            let w = wedge(index)?;
            tri.vertices[c] = w.point_index;
            tri.uvs[c] = Vec2::new(w.u, 1.0 - w.v);
            tri.wedge_materials[c] = w.material_index;
        }
        mesh.triangles.push(tri);
    }
    Ok(())
}

/// Build the UV layers from per-corner triangle UVs.
pub fn uv_layers(triangles: &[Triangle], split_per_material: bool) -> Vec<UvLayer> {
    let corners = || triangles.iter().flat_map(|t| t.uvs.iter().copied().zip(t.wedge_materials));
    let materials: BTreeSet<u8> = triangles.iter().flat_map(|t| t.wedge_materials).collect();

    if !split_per_material || materials.len() <= 1 {
        return vec![UvLayer { name: UV_SINGLE.to_string(), uvs: corners().map(|(uv, _)| uv).collect() }];
    }

    materials
        .iter()
        .map(|&m| UvLayer {
            name: format!("UV{m}"),
            // corners of other materials keep a zero coordinate
            uvs: corners().map(|(uv, mat)| if mat == m { uv } else { Vec2::ZERO }).collect(),
        })
        .collect()
}

fn decode_extra_uvs(psk: &PskFile, triangles: &[Triangle]) -> Vec<UvLayer> {
    let mut layers = Vec::new();
    for (i, channel) in psk.extra_uvs.iter().enumerate() {
        if channel.len() != psk.wedges.len() {
            tracing::warn!(channel = i, count = channel.len(), wedges = psk.wedges.len(), "ignoring extra UV channel");
            continue;
        }
        let uvs = triangles
            .iter()
            .flat_map(|t| t.wedges)
            .map(|w| {
                let uv = channel[w as usize].0;
                Vec2::new(uv.x, 1.0 - uv.y)
            })
            .collect();
        layers.push(UvLayer { name: format!("EXTRAUV{i}"), uvs });
    }
    layers
}

fn decode_colors(psk: &PskFile, triangles: &[Triangle], opts: &ConvertOptions) -> Option<Vec<Vec4>> {
    if psk.colors.is_empty() {
        return None;
    }
    if psk.colors.len() != psk.wedges.len() {
        tracing::warn!(colors = psk.colors.len(), wedges = psk.wedges.len(), "ignoring vertex colors");
        return None;
    }
    let colors = triangles
        .iter()
        .flat_map(|t| t.wedges)
        .map(|w| color_from_record(psk.colors[w as usize], opts))
        .collect();
    Some(colors)
}

fn color_from_record(c: ColorRecord, opts: &ConvertOptions) -> Vec4 {
    let [r, g, b, a] = c.0.map(|v| v as f32 / 255.0);
    if opts.gamma_correct_vertex_colors {
        Vec4::new(linear_to_srgb(r), linear_to_srgb(g), linear_to_srgb(b), a)
    } else {
        Vec4::new(r, g, b, a)
    }
}

fn color_to_record(c: Vec4, opts: &ConvertOptions) -> ColorRecord {
    let rgb = if opts.gamma_correct_vertex_colors {
        [srgb_to_linear(c.x), srgb_to_linear(c.y), srgb_to_linear(c.z)]
    } else {
        [c.x, c.y, c.z]
    };
    let byte = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
    ColorRecord([byte(rgb[0]), byte(rgb[1]), byte(rgb[2]), byte(c.w)])
}

fn decode_normals(psk: &PskFile) -> Option<Vec<Vec3>> {
    if psk.normals.is_empty() {
        return None;
    }
    if psk.normals.len() != psk.points.len() {
        tracing::warn!(normals = psk.normals.len(), points = psk.points.len(), "ignoring vertex normals");
        return None;
    }
    Some(psk.normals.iter().map(|n| n.0).collect())
}

fn decode_weights(psk: &PskFile) -> Vec<VertexWeight> {
    let points = psk.points.len() as i32;
    let bones = psk.bones.len() as i32;
    let weights: Vec<VertexWeight> = psk
        .weights
        .iter()
        .filter(|w| w.weight > 0.0)
        .filter(|w| (0..points).contains(&w.point_index) && (0..bones).contains(&w.bone_index))
        .map(|w| VertexWeight { vertex: w.point_index as u32, bone: w.bone_index as u32, weight: w.weight })
        .collect();
    let dropped = psk.weights.len() - weights.len();
    if dropped > 0 {
        tracing::debug!(dropped, "dropped zero or invalid weights");
    }
    weights
}

fn decode_morphs(psk: &PskFile, opts: &ConvertOptions) -> Result<Vec<MorphTarget>> {
    let needed: usize = psk.morph_infos.iter().map(|m| m.vertex_count.max(0) as usize).sum();
    if needed > psk.morph_data.len() {
        return Err(Error::invalid(format!(
            "morph targets need {needed} deltas, file has {}",
            psk.morph_data.len()
        )));
    }

    let points = psk.points.len() as i32;
    let mut data = psk.morph_data.iter();
    let mut targets = Vec::with_capacity(psk.morph_infos.len());
    for info in &psk.morph_infos {
        let mut deltas = Vec::new();
        for d in data.by_ref().take(info.vertex_count.max(0) as usize) {
            if !(0..points).contains(&d.point_index) {
                tracing::warn!(morph = %info.name(), point = d.point_index, "morph delta references missing point");
                continue;
            }
            let p = d.position_delta * opts.unit_scale;
            deltas.push(MorphDelta {
                vertex: d.point_index as u32,
                position: Vec3::new(p.x, -p.y, p.z),
                normal: d.normal_delta,
            });
        }
        targets.push(MorphTarget { name: info.name(), deltas });
    }
    Ok(targets)
}

fn material_from_record(r: &MaterialRecord) -> Material {
    Material {
        name: r.name(),
        texture_index: r.texture_index,
        poly_flags: r.poly_flags,
        aux_material: r.aux_material,
        aux_flags: r.aux_flags,
        lod_bias: r.lod_bias,
        lod_style: r.lod_style,
    }
}

fn material_to_record(m: &Material) -> Result<MaterialRecord> {
    let mut r = MaterialRecord::new(&m.name)?;
    r.texture_index = m.texture_index;
    r.poly_flags = m.poly_flags;
    r.aux_material = m.aux_material;
    r.aux_flags = m.aux_flags;
    r.lod_bias = m.lod_bias;
    r.lod_style = m.lod_style;
    Ok(r)
}
