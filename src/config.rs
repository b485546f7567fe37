//! Conversion options shared by import and export.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::util::{Result, Vec3};

/// Options for reading and writing PSK/PSA files.
///
/// Built once per conversion and passed by reference; nothing mutates it
/// while a file is being processed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertOptions {
    // Units
    /// File units to model units for every linear quantity (0.01 = cm to m).
    pub unit_scale: f32,

    // Skeleton
    /// Conjugate the root bone rotation on import.
    pub invert_root_rotation: bool,
    pub reorient_bones: bool,
    /// Leaf bones follow their offset from the parent when reorienting.
    pub reorient_directly: bool,
    /// Display direction for leaf bones when reorienting.
    pub leaf_direction: [f32; 3],
    /// Upper bound for the display bone size.
    pub bone_size: f32,
    pub bone_size_ratio: f32,

    // Mesh
    pub import_mesh: bool,
    pub import_skeleton: bool,
    pub split_uv_per_material: bool,
    pub gamma_correct_vertex_colors: bool,

    // Animation
    /// Sample the root bone in world space instead of locking it to bind pose.
    pub bake_root_motion: bool,
    /// Restrict exported bone names to `[A-Za-z0-9_ -]`.
    pub bone_name_charset_strict: bool,
    pub compression_ratio: f32,
    pub frame_quota: u32,
    pub sequence_name_prefix: String,
    pub sequence_name_suffix: String,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            unit_scale: 0.01,
            invert_root_rotation: true,
            reorient_bones: false,
            reorient_directly: false,
            leaf_direction: [0.0, 1.0, 0.0],
            bone_size: 5.0,
            bone_size_ratio: 0.6,
            import_mesh: true,
            import_skeleton: true,
            split_uv_per_material: false,
            gamma_correct_vertex_colors: true,
            bake_root_motion: true,
            bone_name_charset_strict: false,
            compression_ratio: 1.0,
            frame_quota: 0,
            sequence_name_prefix: String::new(),
            sequence_name_suffix: String::new(),
        }
    }
}

impl ConvertOptions {
    /// Options with no unit conversion.
    pub fn unscaled() -> Self {
        Self { unit_scale: 1.0, ..Self::default() }
    }

    /// Leaf direction as a vector.
    #[inline]
    pub fn leaf_direction(&self) -> Vec3 {
        Vec3::from_array(self.leaf_direction)
    }

    /// Factor applied to linear quantities written to a file.
    #[inline]
    pub fn export_scale(&self) -> f32 {
        if self.unit_scale == 0.0 {
            1.0
        } else {
            1.0 / self.unit_scale
        }
    }

    /// Load options from a JSON file. Missing keys take default values.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Save options as pretty JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let o = ConvertOptions::default();
        assert_eq!(o.unit_scale, 0.01);
        assert!((o.export_scale() - 100.0).abs() < 1e-3);
        assert_eq!(o.compression_ratio, 1.0);
        assert_eq!(o.frame_quota, 0);
        assert_eq!(ConvertOptions::unscaled().export_scale(), 1.0);
    }

    #[test]
    fn test_partial_json() {
        let o: ConvertOptions =
            serde_json::from_str(r#"{ "unit_scale": 1.0, "frame_quota": 4 }"#).unwrap();
        assert_eq!(o.unit_scale, 1.0);
        assert_eq!(o.frame_quota, 4);
        assert!(o.invert_root_rotation);
    }

    #[test]
    fn test_save_load() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let o = ConvertOptions { compression_ratio: 0.25, ..Default::default() };
        o.save(file.path()).unwrap();
        assert_eq!(ConvertOptions::load(file.path()).unwrap(), o);
    }
}
