//! View parameters and live view instances

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::annotation::ComplexityLevel;
use crate::asset::{MeshDescriptor, ModelAsset, ModelInfo};
use crate::material::MaterialState;

/// Host-supplied view parameters.
///
/// Material state is always derived from a whole `ViewParams` value, never
/// accumulated from individual changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewParams {
    /// Part ids to show exclusively. Empty shows every part.
    pub isolate_parts: BTreeSet<String>,
    /// Part ids rendered see-through regardless of `opacity`
    pub transparency_toggled: BTreeSet<String>,
    /// Cross-section depth, percent
    pub slice: f32,
    /// Global opacity, percent
    pub opacity: f32,
    pub scale: f32,
    pub level: ComplexityLevel,
    pub show_annotations: bool,
    pub show_all_labels: bool,
    pub auto_rotate: bool,
}

impl Default for ViewParams {
    fn default() -> Self {
        Self {
            isolate_parts: BTreeSet::new(),
            transparency_toggled: BTreeSet::new(),
            slice: 0.0,
            opacity: 100.0,
            scale: 1.0,
            level: ComplexityLevel::Basic,
            show_annotations: true,
            show_all_labels: false,
            auto_rotate: false,
        }
    }
}

impl ViewParams {
    /// Clamp numeric fields into range. Non-finite values fall back to their
    /// defaults.
    pub fn sanitize(&mut self, min_scale: f32, max_scale: f32) {
        self.slice = clamp_or(self.slice, 0.0, 100.0, 0.0);
        self.opacity = clamp_or(self.opacity, 0.0, 100.0, 100.0);
        self.scale = clamp_or(self.scale, min_scale, max_scale, 1.0);
    }

    pub fn is_isolated(&self, part_id: &str) -> bool {
        self.isolate_parts.is_empty() || self.isolate_parts.contains(part_id)
    }
}

fn clamp_or(value: f32, min: f32, max: f32, fallback: f32) -> f32 {
    if value.is_finite() {
        value.clamp(min, max)
    } else {
        fallback
    }
}

/// One live rendering of a cached model template.
///
/// Owns its own copy of the template; material state lives here and is
/// rewritten wholesale by [`crate::MaterialController::apply`].
#[derive(Debug, Clone)]
pub struct ViewInstance {
    pub id: Uuid,
    pub model_id: String,
    /// Load generation this view was created for
    pub generation: u64,
    asset: ModelAsset,
    info: ModelInfo,
    materials: Vec<MaterialState>,
}

impl ViewInstance {
    pub fn new(model_id: &str, generation: u64, asset: ModelAsset) -> Self {
        let info = asset.info();
        let materials = vec![MaterialState::default(); asset.meshes.len()];
        Self {
            id: Uuid::new_v4(),
            model_id: model_id.to_string(),
            generation,
            asset,
            info,
            materials,
        }
    }

    pub fn asset(&self) -> &ModelAsset {
        &self.asset
    }

    pub fn info(&self) -> &ModelInfo {
        &self.info
    }

    pub fn meshes(&self) -> &[MeshDescriptor] {
        &self.asset.meshes
    }

    /// Material state per mesh, parallel to [`Self::meshes`]
    pub fn materials(&self) -> &[MaterialState] {
        &self.materials
    }

    /// Material of the first mesh carrying `part_id`
    pub fn material_for(&self, part_id: &str) -> Option<&MaterialState> {
        self.asset
            .meshes
            .iter()
            .position(|m| m.part_key() == part_id)
            .map(|i| &self.materials[i])
    }

    pub(crate) fn meshes_and_materials_mut(&mut self) -> (&[MeshDescriptor], &mut [MaterialState]) {
        (&self.asset.meshes, &mut self.materials)
    }
}
