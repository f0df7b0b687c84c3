//! Spawning of frame content: glTF model scenes and the placeholder heart

use bevy::gltf::{GltfExtras, GltfMeshExtras, GltfMeshName};
use bevy::prelude::*;
use medar_core::asset::PART_ID_KEY;
use medar_core::{
    is_remote_locator, parse_hex_color, FrameContent, GeometryHandle, MeshFrame, PlaceholderPrimitive,
    PlaceholderShape,
};
use std::path::Path;
use tracing::{debug, info};
use uuid::Uuid;

use crate::annotations::MarkerEntity;
use crate::materials::{anatomy_material, AnatomyMaterial};
use crate::{CurrentFrame, ViewerSet};

/// Root of a spawned model scene
#[derive(Component, Debug)]
pub struct ModelRoot {
    pub view_id: Uuid,
    pub model_id: String,
}

/// Root of the placeholder shown after a failed load
#[derive(Component, Debug)]
pub struct PlaceholderRoot {
    pub model_id: String,
}

#[derive(Component)]
pub struct PlaceholderPart;

/// Mesh of a model, linked to the part it renders
#[derive(Component, Debug, Clone, PartialEq)]
pub struct PartMesh {
    pub part_id: String,
    /// Index of the matching mesh in the frame, when one was found
    pub frame_index: Option<usize>,
}

/// Identity of what is currently spawned
#[derive(Debug, Clone, PartialEq, Eq)]
enum ContentKey {
    Model(Uuid),
    Placeholder(String),
}

/// What a frame asks of the spawned content
#[derive(Debug, PartialEq, Eq)]
enum ContentChange {
    Keep,
    Clear,
    Replace(ContentKey),
}

#[derive(Resource, Default)]
struct SpawnedContent {
    key: Option<ContentKey>,
    root: Option<Entity>,
}

pub struct ModelsPlugin;

impl Plugin for ModelsPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<SpawnedContent>().add_systems(
            Update,
            (sync_frame_content, tag_part_meshes, update_root_transforms)
                .chain()
                .in_set(ViewerSet::Apply),
        );
    }
}

fn content_key(content: &FrameContent) -> Option<ContentKey> {
    match content {
        FrameContent::Model { view_id, .. } => Some(ContentKey::Model(*view_id)),
        FrameContent::Placeholder { model_id, .. } => Some(ContentKey::Placeholder(model_id.clone())),
        FrameContent::Empty | FrameContent::Loading { .. } => None,
    }
}

/// The previous scene stays on screen while a fetch is outstanding and is
/// only replaced once a model or placeholder is ready.
fn content_change(spawned: Option<&ContentKey>, content: &FrameContent) -> ContentChange {
    match content {
        FrameContent::Loading { .. } => ContentChange::Keep,
        FrameContent::Empty if spawned.is_some() => ContentChange::Clear,
        FrameContent::Empty => ContentChange::Keep,
        _ => match content_key(content) {
            Some(key) if spawned != Some(&key) => ContentChange::Replace(key),
            _ => ContentChange::Keep,
        },
    }
}

/// Meshes of the frame's model, empty for any other content
pub(crate) fn frame_meshes(content: &FrameContent) -> &[MeshFrame] {
    match content {
        FrameContent::Model { meshes, .. } => meshes,
        _ => &[],
    }
}

/// Asset-server path for a catalog locator.
///
/// Remote URLs go through the web asset source; relative paths are anchored
/// at the working directory, since the asset root is left empty.
pub fn asset_path_for(locator: &str) -> String {
    if is_remote_locator(locator) || Path::new(locator).is_absolute() {
        return locator.to_string();
    }
    match std::env::current_dir() {
        Ok(dir) => dir.join(locator).to_string_lossy().into_owned(),
        Err(_) => locator.to_string(),
    }
}

fn sync_frame_content(
    mut commands: Commands,
    frame: Res<CurrentFrame>,
    mut spawned: ResMut<SpawnedContent>,
    asset_server: Res<AssetServer>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    let Some(frame) = frame.0.as_ref() else {
        return;
    };
    let key = match content_change(spawned.key.as_ref(), &frame.content) {
        ContentChange::Keep => return,
        ContentChange::Clear => None,
        ContentChange::Replace(key) => Some(key),
    };

    if let Some(root) = spawned.root.take() {
        commands.entity(root).despawn();
    }
    spawned.key = key;

    match &frame.content {
        FrameContent::Model {
            view_id,
            model_id,
            locator,
            meshes: parts,
            ..
        } => {
            let path = asset_path_for(locator);
            info!(model = %model_id, path = %path, parts = parts.len(), "Spawning model scene");
            let scene = asset_server.load(GltfAssetLabel::Scene(0).from_asset(path));
            let root = commands
                .spawn((
                    Name::new(format!("model:{model_id}")),
                    SceneRoot(scene),
                    Transform::default(),
                    Visibility::default(),
                    ModelRoot {
                        view_id: *view_id,
                        model_id: model_id.clone(),
                    },
                ))
                .id();
            spawned.root = Some(root);
        }
        FrameContent::Placeholder {
            model_id, shapes, ..
        } => {
            info!(model = %model_id, "Spawning placeholder");
            let root = commands
                .spawn((
                    Name::new(format!("placeholder:{model_id}")),
                    Transform::default(),
                    Visibility::default(),
                    PlaceholderRoot {
                        model_id: model_id.clone(),
                    },
                ))
                .with_children(|parent| {
                    for shape in shapes {
                        parent.spawn((
                            Mesh3d(meshes.add(placeholder_mesh(&shape.shape))),
                            MeshMaterial3d(materials.add(placeholder_material(shape))),
                            placeholder_transform(shape),
                            PlaceholderPart,
                        ));
                    }
                })
                .id();
            spawned.root = Some(root);
        }
        FrameContent::Empty | FrameContent::Loading { .. } => {
            debug!("Viewport cleared");
        }
    }
}

fn placeholder_mesh(shape: &PlaceholderShape) -> Mesh {
    match *shape {
        PlaceholderShape::Sphere { radius } => Sphere::new(radius).mesh().uv(32, 16),
        PlaceholderShape::Cone { radius, height } => Cone { radius, height }.mesh().resolution(32).build(),
    }
}

fn placeholder_material(shape: &PlaceholderPrimitive) -> StandardMaterial {
    let [r, g, b] = parse_hex_color(&shape.color).unwrap_or([0.8, 0.2, 0.2]);
    StandardMaterial {
        base_color: Color::srgb(r, g, b),
        perceptual_roughness: 0.6,
        ..default()
    }
}

fn placeholder_transform(shape: &PlaceholderPrimitive) -> Transform {
    Transform::from_translation(shape.translation).with_rotation(Quat::from_rotation_z(shape.rotation_z))
}

/// Read the part id from a glTF extras JSON blob
pub fn part_id_from_extras(extras: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(extras).ok()?;
    value.get(PART_ID_KEY)?.as_str().map(str::to_string)
}

/// Geometry of a primitive from its `Mesh{m}/Primitive{p}` asset label
pub fn geometry_from_label(label: &str) -> Option<GeometryHandle> {
    let (mesh, primitive) = label.split_once('/')?;
    Some(GeometryHandle {
        mesh: mesh.strip_prefix("Mesh")?.parse().ok()?,
        primitive: primitive.strip_prefix("Primitive")?.parse().ok()?,
    })
}

/// Node name as authored in the document.
///
/// The glTF loader names unnamed nodes `GltfNode{index}`.
pub fn authored_node_name(name: &str) -> Option<&str> {
    match name.strip_prefix("GltfNode") {
        Some(index) if !index.is_empty() && index.bytes().all(|b| b.is_ascii_digit()) => None,
        _ => Some(name),
    }
}

/// What the glTF loader exposes about one spawned primitive
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrimitiveLabels {
    pub geometry: Option<GeometryHandle>,
    pub node_name: Option<String>,
    pub node_part_id: Option<String>,
    pub mesh_part_id: Option<String>,
    pub mesh_name: Option<String>,
}

impl PrimitiveLabels {
    /// Part key with the same precedence as [`MeshDescriptor::part_key`]
    ///
    /// [`MeshDescriptor::part_key`]: medar_core::MeshDescriptor::part_key
    pub fn part_key(&self) -> String {
        self.node_part_id
            .as_deref()
            .or(self.mesh_part_id.as_deref())
            .or(self.node_name.as_deref())
            .or(self.mesh_name.as_deref())
            .unwrap_or("")
            .to_string()
    }

    /// Frame mesh rendered by this primitive.
    ///
    /// A geometry shared by several nodes is told apart by node name, then by
    /// part key.
    pub fn resolve<'a>(&self, meshes: &'a [MeshFrame]) -> Option<&'a MeshFrame> {
        let geometry = self.geometry?;
        let candidates: Vec<&MeshFrame> = meshes.iter().filter(|m| m.geometry == geometry).collect();
        match candidates.as_slice() {
            [] => None,
            [only] => Some(*only),
            many => {
                let key = self.part_key();
                many.iter()
                    .find(|m| m.node_name == self.node_name)
                    .or_else(|| many.iter().find(|m| m.part_id == key))
                    .copied()
            }
        }
    }

    /// Part linkage, taken from the frame when the primitive is found there
    pub fn part_mesh(&self, meshes: &[MeshFrame]) -> PartMesh {
        match self.resolve(meshes) {
            Some(mesh) => PartMesh {
                part_id: mesh.part_id.clone(),
                frame_index: Some(mesh.index),
            },
            None => PartMesh {
                part_id: self.part_key(),
                frame_index: None,
            },
        }
    }
}

fn model_root_of(
    entity: Entity,
    ancestor_query: &Query<&ChildOf>,
    roots: &Query<&ModelRoot>,
) -> Option<Uuid> {
    let mut current = entity;
    while let Ok(child_of) = ancestor_query.get(current) {
        current = child_of.parent();
        if let Ok(root) = roots.get(current) {
            return Some(root.view_id);
        }
    }
    None
}

/// Give every freshly spawned model mesh its own anatomy material and part id.
///
/// Bevy puts glTF primitives one level below their node. The node carries the
/// node name and extras, the primitive the mesh name and extras.
#[allow(clippy::type_complexity)]
fn tag_part_meshes(
    mut commands: Commands,
    frame: Res<CurrentFrame>,
    candidates: Query<
        (
            Entity,
            &Mesh3d,
            &MeshMaterial3d<StandardMaterial>,
            &ChildOf,
            Option<&GltfMeshExtras>,
            Option<&GltfMeshName>,
        ),
        (Without<PartMesh>, Without<PlaceholderPart>, Without<MarkerEntity>),
    >,
    nodes: Query<(Option<&Name>, Option<&GltfExtras>)>,
    ancestor_query: Query<&ChildOf>,
    roots: Query<&ModelRoot>,
    standard_materials: Res<Assets<StandardMaterial>>,
    mut anatomy_materials: ResMut<Assets<AnatomyMaterial>>,
) {
    let (frame_view, meshes) = match frame.0.as_ref().map(|f| &f.content) {
        Some(content @ FrameContent::Model { view_id, .. }) => (Some(*view_id), frame_meshes(content)),
        _ => (None, &[][..]),
    };

    for (entity, mesh, material, child_of, mesh_extras, mesh_name) in &candidates {
        let Some(view_id) = model_root_of(entity, &ancestor_query, &roots) else {
            continue;
        };
        let Some(base) = standard_materials.get(&material.0) else {
            continue;
        };

        let (node_name, node_extras) = nodes.get(child_of.parent()).unwrap_or((None, None));
        let labels = PrimitiveLabels {
            geometry: mesh
                .0
                .path()
                .and_then(|path| path.label())
                .and_then(geometry_from_label),
            node_name: node_name
                .and_then(|name| authored_node_name(name.as_str()))
                .map(str::to_string),
            node_part_id: node_extras.and_then(|extras| part_id_from_extras(&extras.value)),
            mesh_part_id: mesh_extras.and_then(|extras| part_id_from_extras(&extras.value)),
            mesh_name: mesh_name.map(|name| name.0.clone()),
        };
        let part = if frame_view == Some(view_id) {
            labels.part_mesh(meshes)
        } else {
            labels.part_mesh(&[])
        };
        debug!(part = %part.part_id, index = ?part.frame_index, "Tagged model mesh");

        commands
            .entity(entity)
            .remove::<MeshMaterial3d<StandardMaterial>>()
            .insert((MeshMaterial3d(anatomy_materials.add(anatomy_material(base))), part));
    }
}

#[allow(clippy::type_complexity)]
fn update_root_transforms(
    frame: Res<CurrentFrame>,
    mut roots: Query<&mut Transform, Or<(With<ModelRoot>, With<PlaceholderRoot>)>>,
) {
    let Some(frame) = frame.0.as_ref() else {
        return;
    };
    let wanted = Transform::from_rotation(Quat::from_rotation_y(frame.model_yaw))
        .with_scale(Vec3::splat(frame.params.scale));
    for mut transform in &mut roots {
        if *transform != wanted {
            *transform = wanted;
        }
    }
}
