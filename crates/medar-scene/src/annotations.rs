//! Annotation markers and click selection

use bevy::prelude::*;
use bevy_egui::EguiContexts;
use medar_core::{parse_hex_color, AnnotationMarker};
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::camera::MainCamera;
use crate::{CurrentFrame, ViewerSet, ViewerState};

const MARKER_RADIUS: f32 = 0.08;
const SELECTED_SCALE: f32 = 1.5;

/// Marker sphere for one annotation
#[derive(Component, Debug)]
pub struct MarkerEntity {
    pub id: String,
    pub title: String,
    pub show_label: bool,
}

#[derive(Resource)]
struct MarkerMesh(Handle<Mesh>);

pub struct AnnotationsPlugin;

impl Plugin for AnnotationsPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, setup_marker_mesh)
            .add_systems(Update, pick_marker.in_set(ViewerSet::Input))
            .add_systems(Update, sync_markers.in_set(ViewerSet::Apply));
    }
}

fn setup_marker_mesh(mut commands: Commands, mut meshes: ResMut<Assets<Mesh>>) {
    let mesh = meshes.add(Sphere::new(MARKER_RADIUS).mesh().uv(16, 12));
    commands.insert_resource(MarkerMesh(mesh));
}

/// Where a model-space annotation ends up once the model is scaled and turned
pub fn marker_world_position(position: Vec3, model_yaw: f32, scale: f32) -> Vec3 {
    Quat::from_rotation_y(model_yaw) * (position * scale)
}

/// Distance along the ray to the first hit with a sphere, if any
pub fn ray_sphere_hit(origin: Vec3, direction: Vec3, center: Vec3, radius: f32) -> Option<f32> {
    let to_center = center - origin;
    let along = to_center.dot(direction);
    if along < 0.0 {
        return None;
    }
    let miss_sq = to_center.length_squared() - along * along;
    let radius_sq = radius * radius;
    if miss_sq > radius_sq {
        return None;
    }
    Some(along - (radius_sq - miss_sq).sqrt())
}

fn marker_material(marker: &AnnotationMarker) -> StandardMaterial {
    let [r, g, b] = parse_hex_color(&marker.color).unwrap_or([1.0, 1.0, 1.0]);
    let glow = match (marker.selected, marker.visited) {
        (true, _) => 1.0,
        (false, true) => 0.15,
        (false, false) => 0.4,
    };
    StandardMaterial {
        base_color: Color::srgb(r, g, b),
        emissive: LinearRgba::from(Color::srgb(r * glow, g * glow, b * glow)),
        unlit: false,
        ..default()
    }
}

fn marker_transform(marker: &AnnotationMarker, model_yaw: f32, scale: f32) -> Transform {
    let size = if marker.selected { SELECTED_SCALE } else { 1.0 };
    Transform::from_translation(marker_world_position(marker.position, model_yaw, scale))
        .with_scale(Vec3::splat(size))
}

fn sync_markers(
    mut commands: Commands,
    frame: Res<CurrentFrame>,
    marker_mesh: Option<Res<MarkerMesh>>,
    mut existing: Query<(
        Entity,
        &mut MarkerEntity,
        &mut Transform,
        &MeshMaterial3d<StandardMaterial>,
    )>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    let Some(frame) = frame.0.as_ref() else {
        return;
    };
    let Some(marker_mesh) = marker_mesh else {
        return;
    };
    let wanted: HashMap<&str, &AnnotationMarker> =
        frame.markers.iter().map(|m| (m.id.as_str(), m)).collect();

    let mut present = Vec::new();
    for (entity, mut entity_marker, mut transform, material) in &mut existing {
        let Some(marker) = wanted.get(entity_marker.id.as_str()) else {
            commands.entity(entity).despawn();
            continue;
        };
        present.push(marker.id.as_str());

        let target = marker_transform(marker, frame.model_yaw, frame.params.scale);
        if *transform != target {
            *transform = target;
        }
        if entity_marker.show_label != marker.show_label {
            entity_marker.show_label = marker.show_label;
        }
        let desired = marker_material(marker);
        if let Some(current) = materials.get(&material.0) {
            if current.emissive != desired.emissive {
                if let Some(current) = materials.get_mut(&material.0) {
                    current.emissive = desired.emissive;
                }
            }
        }
    }

    for marker in &frame.markers {
        if present.contains(&marker.id.as_str()) {
            continue;
        }
        debug!(annotation = %marker.id, "Spawning marker");
        commands.spawn((
            Name::new(format!("annotation:{}", marker.id)),
            Mesh3d(marker_mesh.0.clone()),
            MeshMaterial3d(materials.add(marker_material(marker))),
            marker_transform(marker, frame.model_yaw, frame.params.scale),
            MarkerEntity {
                id: marker.id.clone(),
                title: marker.title.clone(),
                show_label: marker.show_label,
            },
        ));
    }
}

fn pick_marker(
    mut viewer: ResMut<ViewerState>,
    buttons: Res<ButtonInput<MouseButton>>,
    windows: Query<&Window>,
    cameras: Query<(&Camera, &GlobalTransform), With<MainCamera>>,
    markers: Query<(&MarkerEntity, &GlobalTransform)>,
    mut contexts: EguiContexts,
) {
    if !buttons.just_pressed(MouseButton::Left) {
        return;
    }
    let egui_wants_pointer = contexts
        .ctx_mut()
        .map(|ctx| ctx.wants_pointer_input() || ctx.is_pointer_over_area())
        .unwrap_or(false);
    if egui_wants_pointer {
        return;
    }
    let Ok(window) = windows.single() else {
        return;
    };
    let Some(cursor) = window.cursor_position() else {
        return;
    };
    let Ok((camera, camera_transform)) = cameras.single() else {
        return;
    };
    let Ok(ray) = camera.viewport_to_world(camera_transform, cursor) else {
        return;
    };

    let mut closest: Option<(f32, &str)> = None;
    for (marker, transform) in &markers {
        let (scale, _, center) = transform.to_scale_rotation_translation();
        let radius = MARKER_RADIUS * scale.max_element();
        if let Some(distance) = ray_sphere_hit(ray.origin, *ray.direction, center, radius) {
            if closest.is_none_or(|(best, _)| distance < best) {
                closest = Some((distance, marker.id.as_str()));
            }
        }
    }

    if let Some((_, id)) = closest {
        if let Err(e) = viewer.select_annotation(Some(id)) {
            warn!(annotation = %id, error = %e, "Marker selection rejected");
        }
    }
}
