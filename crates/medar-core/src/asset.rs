//! Model assets - immutable templates decoded once from glTF
//!
//! The scene graph is flattened at load time into a list of typed mesh
//! descriptors, one per glTF primitive, so per-frame updates never have to
//! walk the node hierarchy or check node types.

use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use tracing::debug;

use crate::error::AssetLoadError;

/// Extras key carrying a stable part identifier on a glTF node or mesh
pub const PART_ID_KEY: &str = "partId";

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl Bounds {
    pub fn empty() -> Self {
        Self {
            min: Vec3::splat(f32::INFINITY),
            max: Vec3::splat(f32::NEG_INFINITY),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    pub fn include(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    pub fn merge(&mut self, other: &Bounds) {
        if !other.is_empty() {
            self.include(other.min);
            self.include(other.max);
        }
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    fn transformed(min: Vec3, max: Vec3, matrix: &Mat4) -> Self {
        let mut bounds = Self::empty();
        for i in 0..8 {
            let corner = Vec3::new(
                if i & 1 == 0 { min.x } else { max.x },
                if i & 2 == 0 { min.y } else { max.y },
                if i & 4 == 0 { min.z } else { max.z },
            );
            bounds.include(matrix.transform_point3(corner));
        }
        bounds
    }
}

/// Identifies the geometry of one primitive inside the source document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GeometryHandle {
    pub mesh: usize,
    pub primitive: usize,
}

/// One renderable mesh of a model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshDescriptor {
    /// Position in the flattened mesh list
    pub index: usize,
    /// Name of the glTF node holding the mesh
    pub node_name: Option<String>,
    /// Name of the glTF mesh
    pub mesh_name: Option<String>,
    /// `partId` extra, when the asset authors one
    pub part_id: Option<String>,
    pub geometry: GeometryHandle,
    /// Material index, `None` for the glTF default material
    pub material: Option<usize>,
    pub vertex_count: usize,
    pub triangle_count: usize,
    /// World-space bounds, when the position accessor declares min/max
    pub bounds: Option<Bounds>,
}

impl MeshDescriptor {
    /// Identifier used for isolation and transparency targeting.
    ///
    /// Falls back from the authored part id to the node name, then the mesh
    /// name. A mesh with none of these resolves to the empty string.
    pub fn part_key(&self) -> &str {
        self.part_id
            .as_deref()
            .or(self.node_name.as_deref())
            .or(self.mesh_name.as_deref())
            .unwrap_or("")
    }
}

/// Summary reported to the host once a model is loaded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub mesh_count: usize,
    pub vertex_count: usize,
    pub triangle_count: usize,
    pub material_count: usize,
    pub has_animations: bool,
    pub animation_names: Vec<String>,
    pub bounds: Option<Bounds>,
    pub byte_size: usize,
    pub sha256: String,
}

/// Immutable template for one anatomical model
#[derive(Debug, Clone, PartialEq)]
pub struct ModelAsset {
    pub locator: String,
    pub meshes: Vec<MeshDescriptor>,
    pub animation_names: Vec<String>,
    pub byte_size: usize,
    pub sha256: String,
}

impl ModelAsset {
    pub fn info(&self) -> ModelInfo {
        let materials: HashSet<Option<usize>> = self.meshes.iter().map(|m| m.material).collect();

        let mut bounds = Bounds::empty();
        for mesh in &self.meshes {
            if let Some(b) = &mesh.bounds {
                bounds.merge(b);
            }
        }

        ModelInfo {
            mesh_count: self.meshes.len(),
            vertex_count: self.meshes.iter().map(|m| m.vertex_count).sum(),
            triangle_count: self.meshes.iter().map(|m| m.triangle_count).sum(),
            material_count: materials.len(),
            has_animations: !self.animation_names.is_empty(),
            animation_names: self.animation_names.clone(),
            bounds: (!bounds.is_empty()).then_some(bounds),
            byte_size: self.byte_size,
            sha256: self.sha256.clone(),
        }
    }

    /// Distinct part keys of all meshes
    pub fn part_keys(&self) -> BTreeSet<&str> {
        self.meshes.iter().map(|m| m.part_key()).collect()
    }
}

/// Decode a glTF or GLB payload into a model template.
///
/// Only the document structure is needed (counts and bounds come from the
/// accessor metadata), so buffers and images are not resolved.
pub fn parse_gltf(locator: &str, bytes: &[u8]) -> Result<ModelAsset, AssetLoadError> {
    let gltf = gltf::Gltf::from_slice(bytes).map_err(|e| AssetLoadError::Parse {
        locator: locator.to_string(),
        reason: e.to_string(),
    })?;
    let document = &gltf.document;

    let mut meshes = Vec::new();
    if let Some(scene) = document.default_scene().or_else(|| document.scenes().next()) {
        for node in scene.nodes() {
            collect_meshes(&node, Mat4::IDENTITY, &mut meshes);
        }
    }

    let animation_names = document
        .animations()
        .map(|anim| {
            anim.name()
                .map(str::to_string)
                .unwrap_or_else(|| format!("animation-{}", anim.index()))
        })
        .collect();

    let asset = ModelAsset {
        locator: locator.to_string(),
        meshes,
        animation_names,
        byte_size: bytes.len(),
        sha256: sha256_hex(bytes),
    };
    debug!(
        locator = %locator,
        meshes = asset.meshes.len(),
        "Decoded glTF document"
    );
    Ok(asset)
}

fn collect_meshes(node: &gltf::Node, parent: Mat4, out: &mut Vec<MeshDescriptor>) {
    let world = parent * Mat4::from_cols_array_2d(&node.transform().matrix());

    if let Some(mesh) = node.mesh() {
        let part_id = part_id_from_extras(node.extras()).or_else(|| part_id_from_extras(mesh.extras()));
        for primitive in mesh.primitives() {
            let positions = primitive.get(&gltf::Semantic::Positions);
            let vertex_count = positions.as_ref().map(|a| a.count()).unwrap_or(0);
            let element_count = primitive.indices().map(|a| a.count()).unwrap_or(vertex_count);
            let triangle_count = match primitive.mode() {
                gltf::mesh::Mode::Triangles => element_count / 3,
                gltf::mesh::Mode::TriangleStrip | gltf::mesh::Mode::TriangleFan => {
                    element_count.saturating_sub(2)
                }
                _ => 0,
            };
            let bounds = positions
                .as_ref()
                .and_then(accessor_min_max)
                .map(|(min, max)| Bounds::transformed(min, max, &world));

            out.push(MeshDescriptor {
                index: out.len(),
                node_name: node.name().map(str::to_string),
                mesh_name: mesh.name().map(str::to_string),
                part_id: part_id.clone(),
                geometry: GeometryHandle {
                    mesh: mesh.index(),
                    primitive: primitive.index(),
                },
                material: primitive.material().index(),
                vertex_count,
                triangle_count,
                bounds,
            });
        }
    }

    for child in node.children() {
        collect_meshes(&child, world, out);
    }
}

fn part_id_from_extras(extras: &gltf::json::Extras) -> Option<String> {
    let raw = extras.as_ref()?;
    let value: serde_json::Value = serde_json::from_str(raw.get()).ok()?;
    value
        .get(PART_ID_KEY)
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

fn accessor_min_max(accessor: &gltf::Accessor) -> Option<(Vec3, Vec3)> {
    Some((json_vec3(&accessor.min()?)?, json_vec3(&accessor.max()?)?))
}

fn json_vec3(value: &serde_json::Value) -> Option<Vec3> {
    let values = value.as_array()?;
    if values.len() < 3 {
        return None;
    }
    Some(Vec3::new(
        values[0].as_f64()? as f32,
        values[1].as_f64()? as f32,
        values[2].as_f64()? as f32,
    ))
}

/// Compute SHA256 hash of data and return as hex string
pub fn sha256_hex(data: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{gltf_fixture, Part};

    #[test]
    fn test_parse_flattens_meshes() {
        let bytes = gltf_fixture(&[
            Part::named("cortex"),
            Part::named("medulla"),
            Part::tagged("Object_7", "pelvis"),
        ]);
        let asset = parse_gltf("kidney.gltf", &bytes).unwrap();

        assert_eq!(asset.meshes.len(), 3);
        let keys: Vec<_> = asset.meshes.iter().map(|m| m.part_key()).collect();
        assert_eq!(keys, ["cortex", "medulla", "pelvis"]);
        assert_eq!(asset.meshes[2].node_name.as_deref(), Some("Object_7"));
        assert_eq!(asset.meshes[1].index, 1);
        assert_eq!(asset.byte_size, bytes.len());
        assert_eq!(asset.sha256, sha256_hex(&bytes));
    }

    #[test]
    fn test_model_info_counts() {
        let bytes = gltf_fixture(&[Part::named("a"), Part::named("b"), Part::named("c")]);
        let info = parse_gltf("m.gltf", &bytes).unwrap().info();

        assert_eq!(info.mesh_count, 3);
        assert_eq!(info.vertex_count, 9);
        assert_eq!(info.triangle_count, 3);
        // Fixture alternates between two materials
        assert_eq!(info.material_count, 2);
        assert!(!info.has_animations);

        // Nodes are translated along +X by their index
        let bounds = info.bounds.unwrap();
        assert_eq!(bounds.min, Vec3::new(0.0, 0.0, 0.0));
        assert_eq!(bounds.max, Vec3::new(3.0, 1.0, 0.0));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let err = parse_gltf("broken.glb", b"definitely not gltf").unwrap_err();
        assert!(matches!(err, AssetLoadError::Parse { ref locator, .. } if locator == "broken.glb"));
    }

    #[test]
    fn test_part_key_fallback() {
        let mut mesh = MeshDescriptor {
            index: 0,
            node_name: None,
            mesh_name: Some("Sphere.001".to_string()),
            part_id: None,
            geometry: GeometryHandle { mesh: 0, primitive: 0 },
            material: None,
            vertex_count: 0,
            triangle_count: 0,
            bounds: None,
        };
        assert_eq!(mesh.part_key(), "Sphere.001");
        mesh.node_name = Some("aorta".to_string());
        assert_eq!(mesh.part_key(), "aorta");
        mesh.part_id = Some("vessel-aorta".to_string());
        assert_eq!(mesh.part_key(), "vessel-aorta");
        mesh.part_id = None;
        mesh.node_name = None;
        mesh.mesh_name = None;
        assert_eq!(mesh.part_key(), "");
    }

    #[test]
    fn test_animation_info() {
        let asset = ModelAsset {
            locator: "heart.glb".to_string(),
            meshes: Vec::new(),
            animation_names: vec!["Beat".to_string()],
            byte_size: 0,
            sha256: String::new(),
        };
        let info = asset.info();
        assert!(info.has_animations);
        assert_eq!(info.animation_names, ["Beat"]);
        assert_eq!(info.material_count, 0);
        assert!(info.bounds.is_none());
    }

    #[test]
    fn test_sha256() {
        let hash = sha256_hex(b"hello world");
        assert_eq!(hash, "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9");
    }
}
