//! Per-mesh material derivation
//!
//! Visibility, transparency and the cross-section plane are a pure function
//! of [`ViewParams`] and a mesh's part id. The render adapter only copies the
//! derived [`MaterialState`] onto its own per-view materials.

use glam::Vec3;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::view::{ViewInstance, ViewParams};

/// Total travel of the cross-section plane, in model units, centred on the
/// origin. Fixed rather than derived from model bounds.
pub const CLIP_TRAVEL: f32 = 5.0;

/// Opacity of a part explicitly toggled transparent
pub const TOGGLED_OPACITY: f32 = 0.3;

/// Plane constant for a slice percentage: 0 maps to -2.5, 100 to +2.5
pub fn clip_offset(slice: f32) -> f32 {
    (slice / 100.0) * CLIP_TRAVEL - CLIP_TRAVEL / 2.0
}

/// Cutting plane `dot(normal, p) + constant = 0`. Points on the negative side
/// are clipped away.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClipPlane {
    pub normal: Vec3,
    pub constant: f32,
    pub enabled: bool,
}

impl Default for ClipPlane {
    fn default() -> Self {
        Self::from_slice(0.0)
    }
}

impl ClipPlane {
    /// Horizontal plane facing down; active only for a positive slice
    pub fn from_slice(slice: f32) -> Self {
        Self {
            normal: Vec3::NEG_Y,
            constant: clip_offset(slice),
            enabled: slice > 0.0,
        }
    }

    pub fn distance(&self, point: Vec3) -> f32 {
        self.normal.dot(point) + self.constant
    }

    pub fn clips(&self, point: Vec3) -> bool {
        self.enabled && self.distance(point) < 0.0
    }
}

/// Derived render state of one mesh
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MaterialState {
    pub visible: bool,
    pub transparent: bool,
    /// 0..=1
    pub opacity: f32,
    pub depth_write: bool,
    pub clip: ClipPlane,
}

impl Default for MaterialState {
    fn default() -> Self {
        Self {
            visible: true,
            transparent: false,
            opacity: 1.0,
            depth_write: true,
            clip: ClipPlane::default(),
        }
    }
}

/// Material state for a mesh with part id `part_id` under `params`
pub fn derive_material_state(params: &ViewParams, part_id: &str) -> MaterialState {
    let toggled = params.transparency_toggled.contains(part_id);
    let transparent = toggled || params.opacity < 100.0;
    let opacity = if toggled {
        TOGGLED_OPACITY
    } else if transparent {
        (params.opacity / 100.0).clamp(0.0, 1.0)
    } else {
        1.0
    };

    MaterialState {
        visible: params.is_isolated(part_id),
        transparent,
        opacity,
        depth_write: !transparent,
        clip: ClipPlane::from_slice(params.slice),
    }
}

/// Applies view parameters to a view instance's materials
#[derive(Debug, Clone, Copy, Default)]
pub struct MaterialController;

impl MaterialController {
    /// Rewrite every mesh material of `view` from `params`. Returns the
    /// number of visible meshes.
    pub fn apply(view: &mut ViewInstance, params: &ViewParams) -> usize {
        let (meshes, materials) = view.meshes_and_materials_mut();
        let mut visible = 0;
        for (mesh, material) in meshes.iter().zip(materials.iter_mut()) {
            *material = derive_material_state(params, mesh.part_key());
            if material.visible {
                visible += 1;
            }
        }
        trace!(model = %view.model_id, visible, "Applied view parameters");
        visible
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::parse_gltf;
    use crate::test_support::kidney_fixture;

    fn kidney_view() -> ViewInstance {
        let asset = parse_gltf("kidney.gltf", &kidney_fixture()).unwrap();
        ViewInstance::new("kidney", 1, asset)
    }

    #[test]
    fn test_clip_offset_range() {
        assert_eq!(clip_offset(0.0), -2.5);
        assert_eq!(clip_offset(50.0), 0.0);
        assert_eq!(clip_offset(100.0), 2.5);
        for slice in 0..=100 {
            let s = slice as f32;
            assert!((clip_offset(s) - ((s / 100.0) * 5.0 - 2.5)).abs() < 1e-6);
        }
    }

    #[test]
    fn test_clip_plane_activation() {
        let off = ClipPlane::from_slice(0.0);
        assert!(!off.enabled);
        assert!(!off.clips(Vec3::new(0.0, 10.0, 0.0)));

        let half = ClipPlane::from_slice(50.0);
        assert!(half.enabled);
        assert_eq!(half.normal, Vec3::NEG_Y);
        assert!(half.clips(Vec3::new(0.0, 1.0, 0.0)));
        assert!(!half.clips(Vec3::new(0.0, -1.0, 0.0)));
    }

    #[test]
    fn test_global_opacity() {
        for opacity in [0.0, 25.0, 99.0] {
            let params = ViewParams {
                opacity,
                ..ViewParams::default()
            };
            let state = derive_material_state(&params, "cortex");
            assert!(state.transparent);
            assert!(!state.depth_write);
            assert!((state.opacity - opacity / 100.0).abs() < 1e-6);
        }

        let opaque = derive_material_state(&ViewParams::default(), "cortex");
        assert!(!opaque.transparent);
        assert!(opaque.depth_write);
        assert_eq!(opaque.opacity, 1.0);
    }

    #[test]
    fn test_toggled_part_overrides_opacity() {
        let mut params = ViewParams {
            opacity: 80.0,
            ..ViewParams::default()
        };
        params.transparency_toggled.insert("medulla".to_string());

        let toggled = derive_material_state(&params, "medulla");
        assert!(toggled.transparent);
        assert_eq!(toggled.opacity, TOGGLED_OPACITY);

        let other = derive_material_state(&params, "cortex");
        assert!((other.opacity - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_apply_isolation() {
        let mut view = kidney_view();
        let mut params = ViewParams::default();
        params.isolate_parts.insert("cortex".to_string());

        let visible = MaterialController::apply(&mut view, &params);
        assert_eq!(visible, 1);
        for (mesh, material) in view.meshes().iter().zip(view.materials()) {
            assert_eq!(material.visible, mesh.part_key() == "cortex");
        }
    }

    #[test]
    fn test_apply_is_idempotent() {
        let mut view = kidney_view();
        let mut params = ViewParams {
            slice: 35.0,
            opacity: 60.0,
            ..ViewParams::default()
        };
        params.transparency_toggled.insert("renal-artery".to_string());

        MaterialController::apply(&mut view, &params);
        let first = view.materials().to_vec();
        MaterialController::apply(&mut view, &params);
        assert_eq!(view.materials(), first.as_slice());
    }

    #[test]
    fn test_apply_does_not_touch_template() {
        let asset = parse_gltf("kidney.gltf", &kidney_fixture()).unwrap();
        let mut view = ViewInstance::new("kidney", 1, asset.clone());
        let mut params = ViewParams::default();
        params.isolate_parts.insert("medulla".to_string());
        MaterialController::apply(&mut view, &params);
        assert_eq!(view.asset(), &asset);
    }

    #[test]
    fn test_params_are_not_accumulated() {
        let mut view = kidney_view();
        let mut params = ViewParams::default();
        params.isolate_parts.insert("cortex".to_string());
        MaterialController::apply(&mut view, &params);

        MaterialController::apply(&mut view, &ViewParams::default());
        assert!(view.materials().iter().all(|m| m.visible && !m.transparent));
        assert_eq!(view.material_for("renal-artery"), Some(&MaterialState::default()));
    }
}
