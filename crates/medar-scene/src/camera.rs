//! Camera entity, lighting and pointer/keyboard navigation
//!
//! The orbit rig in the core owns the pose. Input here only feeds the rig;
//! the camera transform is copied from each frame afterwards.

use bevy::input::mouse::{AccumulatedMouseMotion, AccumulatedMouseScroll, MouseScrollUnit};
use bevy::prelude::*;
use bevy_egui::EguiContexts;
use medar_core::{CameraPose, NudgeDirection};
use std::f32::consts::TAU;

use crate::{CurrentFrame, ViewerSet, ViewerState};

/// Dolly factor per scrolled line
const SCROLL_DOLLY_PER_LINE: f32 = 0.95;
/// Pixels treated as one scroll line on touchpads
const PIXELS_PER_LINE: f32 = 100.0;

/// Marker component for the main camera
#[derive(Component)]
pub struct MainCamera;

pub struct CameraPlugin;

impl Plugin for CameraPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, setup_camera)
            .add_systems(
                Update,
                (pointer_navigation, keyboard_navigation).in_set(ViewerSet::Input),
            )
            .add_systems(Update, apply_camera_pose.in_set(ViewerSet::Apply));
    }
}

fn setup_camera(mut commands: Commands, viewer: Res<ViewerState>) {
    let pose = viewer.camera().pose();
    commands.spawn((
        Camera3d::default(),
        Projection::Perspective(PerspectiveProjection {
            fov: pose.fov_degrees.to_radians(),
            ..default()
        }),
        camera_transform(&pose),
        MainCamera,
    ));

    commands.insert_resource(AmbientLight {
        color: Color::WHITE,
        brightness: 400.0,
        ..default()
    });
    commands.spawn((
        DirectionalLight {
            illuminance: 8_000.0,
            shadows_enabled: false,
            ..default()
        },
        Transform::from_xyz(10.0, 10.0, 5.0).looking_at(Vec3::ZERO, Vec3::Y),
    ));
    commands.spawn((
        PointLight {
            intensity: 200_000.0,
            range: 30.0,
            ..default()
        },
        Transform::from_xyz(-10.0, -10.0, -5.0),
    ));
}

fn camera_transform(pose: &CameraPose) -> Transform {
    Transform::from_translation(pose.position).looking_at(pose.target, Vec3::Y)
}

fn egui_wants_pointer(contexts: &mut EguiContexts) -> bool {
    contexts
        .ctx_mut()
        .map(|ctx| ctx.wants_pointer_input() || ctx.is_pointer_over_area())
        .unwrap_or(false)
}

/// Convert a drag in pixels into orbit angles. A drag across the full
/// viewport height turns the camera once around.
pub fn drag_to_orbit(delta: Vec2, viewport_height: f32) -> (f32, f32) {
    let height = viewport_height.max(1.0);
    (-TAU * delta.x / height, -TAU * delta.y / height)
}

/// Dolly factor for a scroll amount, positive scroll moves closer
pub fn scroll_to_dolly(lines: f32) -> f32 {
    SCROLL_DOLLY_PER_LINE.powf(lines)
}

fn pointer_navigation(
    mut viewer: ResMut<ViewerState>,
    motion: Res<AccumulatedMouseMotion>,
    scroll: Res<AccumulatedMouseScroll>,
    buttons: Res<ButtonInput<MouseButton>>,
    windows: Query<&Window>,
    mut contexts: EguiContexts,
) {
    if egui_wants_pointer(&mut contexts) {
        return;
    }
    let Ok(window) = windows.single() else {
        return;
    };
    let height = window.height();

    if motion.delta != Vec2::ZERO {
        if buttons.pressed(MouseButton::Left) {
            let (azimuth, polar) = drag_to_orbit(motion.delta, height);
            viewer.orbit(azimuth, polar);
        } else if buttons.pressed(MouseButton::Right) || buttons.pressed(MouseButton::Middle) {
            let fraction = motion.delta / height.max(1.0);
            viewer.pan(fraction.x, fraction.y);
        }
    }

    if scroll.delta.y != 0.0 {
        let lines = match scroll.unit {
            MouseScrollUnit::Line => scroll.delta.y,
            MouseScrollUnit::Pixel => scroll.delta.y / PIXELS_PER_LINE,
        };
        viewer.dolly(scroll_to_dolly(lines));
    }
}

fn keyboard_navigation(
    mut viewer: ResMut<ViewerState>,
    keys: Res<ButtonInput<KeyCode>>,
    mut contexts: EguiContexts,
) {
    let egui_wants_keys = contexts
        .ctx_mut()
        .map(|ctx| ctx.wants_keyboard_input())
        .unwrap_or(false);
    if egui_wants_keys {
        return;
    }

    let nudges = [
        (KeyCode::ArrowLeft, NudgeDirection::Left),
        (KeyCode::ArrowRight, NudgeDirection::Right),
        (KeyCode::ArrowUp, NudgeDirection::Up),
        (KeyCode::ArrowDown, NudgeDirection::Down),
    ];
    for (key, direction) in nudges {
        if keys.just_pressed(key) {
            viewer.nudge_camera(direction);
        }
    }

    if keys.just_pressed(KeyCode::Equal) || keys.just_pressed(KeyCode::NumpadAdd) {
        viewer.zoom_in();
    }
    if keys.just_pressed(KeyCode::Minus) || keys.just_pressed(KeyCode::NumpadSubtract) {
        viewer.zoom_out();
    }
    if keys.just_pressed(KeyCode::KeyR) {
        viewer.reset_view();
    }
    if keys.just_pressed(KeyCode::KeyC) {
        viewer.reset_camera();
    }
}

fn apply_camera_pose(
    frame: Res<CurrentFrame>,
    mut cameras: Query<(&mut Transform, &mut Projection), With<MainCamera>>,
) {
    let Some(frame) = frame.0.as_ref() else {
        return;
    };
    let Ok((mut transform, mut projection)) = cameras.single_mut() else {
        return;
    };

    let wanted = camera_transform(&frame.camera);
    if *transform != wanted {
        *transform = wanted;
    }
    if let Projection::Perspective(perspective) = projection.as_mut() {
        let fov = frame.camera.fov_degrees.to_radians();
        if (perspective.fov - fov).abs() > f32::EPSILON {
            perspective.fov = fov;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drag_to_orbit() {
        let (azimuth, polar) = drag_to_orbit(Vec2::new(400.0, 0.0), 800.0);
        assert!((azimuth + TAU / 2.0).abs() < 1e-5);
        assert_eq!(polar, 0.0);

        // Zero-height windows must not produce infinities
        let (azimuth, _) = drag_to_orbit(Vec2::new(1.0, 1.0), 0.0);
        assert!(azimuth.is_finite());
    }

    #[test]
    fn test_scroll_to_dolly() {
        assert!(scroll_to_dolly(1.0) < 1.0);
        assert!(scroll_to_dolly(-1.0) > 1.0);
        assert_eq!(scroll_to_dolly(0.0), 1.0);
    }

    #[test]
    fn test_camera_transform_looks_at_target() {
        let pose = CameraPose {
            position: Vec3::new(0.0, 2.0, 6.0),
            target: Vec3::ZERO,
            fov_degrees: 45.0,
        };
        let transform = camera_transform(&pose);
        let forward = transform.forward();
        let expected = (pose.target - pose.position).normalize();
        assert!(forward.dot(expected) > 0.9999);
    }
}
