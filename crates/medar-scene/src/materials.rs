//! Per-view anatomy materials
//!
//! Every mesh of a spawned model gets its own clone of its glTF material,
//! extended with a cutting-plane uniform. The derived [`MaterialState`] of
//! each part is copied onto that clone every frame, so the glTF asset shared
//! through the asset server is never touched.

use bevy::asset::embedded_asset;
use bevy::color::Alpha;
use bevy::pbr::{ExtendedMaterial, MaterialExtension};
use bevy::prelude::*;
use bevy::render::render_resource::{AsBindGroup, ShaderType};
use bevy::shader::ShaderRef;
use medar_core::{derive_material_state, ClipPlane, Frame, MaterialState};

use crate::models::{frame_meshes, PartMesh};
use crate::{CurrentFrame, ViewerSet};

const SHADER_PATH: &str = "embedded://medar_scene/shaders/clip_plane.wgsl";

/// Cutting plane as laid out for the shader
#[derive(ShaderType, Reflect, Debug, Clone, Copy, PartialEq, Default)]
pub struct ClipPlaneUniform {
    /// xyz: normal, w: constant
    pub plane: Vec4,
    pub enabled: u32,
}

impl From<&ClipPlane> for ClipPlaneUniform {
    fn from(clip: &ClipPlane) -> Self {
        Self {
            plane: clip.normal.extend(clip.constant),
            enabled: u32::from(clip.enabled),
        }
    }
}

#[derive(Asset, AsBindGroup, Reflect, Debug, Clone, Default)]
pub struct ClipPlaneExtension {
    #[uniform(100)]
    pub clip: ClipPlaneUniform,
}

impl MaterialExtension for ClipPlaneExtension {
    fn fragment_shader() -> ShaderRef {
        SHADER_PATH.into()
    }

    fn deferred_fragment_shader() -> ShaderRef {
        SHADER_PATH.into()
    }
}

/// Material used for every mesh of a loaded model
pub type AnatomyMaterial = ExtendedMaterial<StandardMaterial, ClipPlaneExtension>;

pub struct MaterialsPlugin;

impl Plugin for MaterialsPlugin {
    fn build(&self, app: &mut App) {
        embedded_asset!(app, "shaders/clip_plane.wgsl");
        app.add_plugins(MaterialPlugin::<AnatomyMaterial>::default())
            .add_systems(Update, apply_material_states.in_set(ViewerSet::Apply));
    }
}

/// Build the per-view clone of a glTF material
pub fn anatomy_material(base: &StandardMaterial) -> AnatomyMaterial {
    ExtendedMaterial {
        base: base.clone(),
        extension: ClipPlaneExtension::default(),
    }
}

/// Alpha mode and base-colour alpha for a part's derived state.
///
/// The derived opacity replaces whatever the glTF material authored.
pub fn blend_settings(state: &MaterialState) -> (AlphaMode, f32) {
    if state.transparent {
        // Blend mode skips depth writes, so parts behind stay visible
        (AlphaMode::Blend, state.opacity)
    } else {
        (AlphaMode::Opaque, 1.0)
    }
}

/// State of a part: the frame's derived state for its mesh, or a fresh
/// derivation when the mesh was not matched to the frame.
pub fn part_state(frame: &Frame, part: &PartMesh) -> MaterialState {
    part.frame_index
        .and_then(|index| frame_meshes(&frame.content).get(index))
        .filter(|mesh| mesh.part_id == part.part_id)
        .map(|mesh| mesh.material)
        .unwrap_or_else(|| derive_material_state(&frame.params, &part.part_id))
}

/// Whether a material already renders the given state
pub fn matches_state(material: &AnatomyMaterial, state: &MaterialState, clip: ClipPlaneUniform) -> bool {
    let (alpha_mode, alpha) = blend_settings(state);
    material.base.alpha_mode == alpha_mode
        && (material.base.base_color.alpha() - alpha).abs() < f32::EPSILON
        && material.extension.clip == clip
}

/// Copy a derived state onto a material
pub fn apply_state(material: &mut AnatomyMaterial, state: &MaterialState, clip: ClipPlaneUniform) {
    let (alpha_mode, alpha) = blend_settings(state);
    material.base.alpha_mode = alpha_mode;
    material.base.base_color.set_alpha(alpha);
    material.extension.clip = clip;
}

fn apply_material_states(
    frame: Res<CurrentFrame>,
    mut parts: Query<(&PartMesh, &MeshMaterial3d<AnatomyMaterial>, &mut Visibility)>,
    mut materials: ResMut<Assets<AnatomyMaterial>>,
) {
    let Some(frame) = frame.0.as_ref() else {
        return;
    };
    let clip = ClipPlaneUniform::from(&frame.clip);

    for (part, handle, mut visibility) in &mut parts {
        let state = part_state(frame, part);

        let wanted = if state.visible {
            Visibility::Inherited
        } else {
            Visibility::Hidden
        };
        if *visibility != wanted {
            *visibility = wanted;
        }

        // Read first so unchanged materials are not marked modified
        let needs_update = materials
            .get(&handle.0)
            .is_some_and(|current| !matches_state(current, &state, clip));
        if needs_update {
            if let Some(material) = materials.get_mut(&handle.0) {
                apply_state(material, &state, clip);
            }
        }
    }
}
