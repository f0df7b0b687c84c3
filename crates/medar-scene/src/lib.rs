//! MedAR Scene - Bevy render adapter for the anatomy viewer core
//!
//! The core produces one [`Frame`] per tick. This crate turns those frames
//! into a Bevy world:
//! - glTF scene spawning with per-view material clones
//! - clip-plane aware materials driven from the derived material state
//! - camera transform from the orbit rig, mouse/keyboard input back into it
//! - annotation markers, placeholder primitives and egui control panels
//! - a Tokio bridge so asset fetches never block the frame loop

pub mod annotations;
pub mod camera;
pub mod loading;
pub mod materials;
pub mod models;
pub mod ui;

use bevy::prelude::*;
use medar_core::{Frame, SceneOrchestrator, ViewerEvent};
use std::collections::VecDeque;

/// Number of status lines kept for the UI
const RECENT_EVENT_LIMIT: usize = 8;

/// The orchestrator, owned by the Bevy world
#[derive(Resource, Deref, DerefMut)]
pub struct ViewerState(pub SceneOrchestrator);

/// Frame produced by the most recent tick
#[derive(Resource, Default)]
pub struct CurrentFrame(pub Option<Frame>);

/// Recent viewer events, newest last
#[derive(Resource, Default)]
pub struct RecentEvents {
    pub entries: VecDeque<String>,
}

impl RecentEvents {
    pub fn push(&mut self, event: &ViewerEvent) {
        self.entries.push_back(describe_event(event));
        while self.entries.len() > RECENT_EVENT_LIMIT {
            self.entries.pop_front();
        }
    }
}

fn describe_event(event: &ViewerEvent) -> String {
    match event {
        ViewerEvent::Loading { model_id } => format!("Loading {model_id}..."),
        ViewerEvent::Loaded { model_id, info } => format!(
            "Loaded {model_id}: {} meshes, {} triangles",
            info.mesh_count, info.triangle_count
        ),
        ViewerEvent::LoadFailed { model_id, message } => {
            format!("Failed to load {model_id}: {message}")
        }
        ViewerEvent::AnnotationSelected { id: Some(id) } => format!("Selected {id}"),
        ViewerEvent::AnnotationSelected { id: None } => "Selection cleared".to_string(),
        ViewerEvent::AnnotationVisited { id, progress } => {
            format!("Visited {id} ({:.0}% explored)", progress * 100.0)
        }
        ViewerEvent::ViewReset => "View reset".to_string(),
    }
}

/// Ordering of the per-frame work
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub enum ViewerSet {
    /// Host input and load completions feed the orchestrator
    Input,
    /// The orchestrator ticks and produces a frame
    Advance,
    /// The frame is applied to the world
    Apply,
}

/// Plugin that wires the viewer core into a Bevy app.
///
/// Expects [`ViewerState`] and [`loading::AsyncRuntime`] to be inserted by
/// the host.
pub struct MedarScenePlugin;

impl Plugin for MedarScenePlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<CurrentFrame>()
            .init_resource::<RecentEvents>()
            .configure_sets(
                Update,
                (ViewerSet::Input, ViewerSet::Advance, ViewerSet::Apply).chain(),
            )
            .add_systems(Update, advance_viewer.in_set(ViewerSet::Advance))
            .add_plugins((
                camera::CameraPlugin,
                loading::LoadingPlugin,
                materials::MaterialsPlugin,
                models::ModelsPlugin,
                annotations::AnnotationsPlugin,
                ui::UiPlugin,
            ));
    }
}

fn advance_viewer(
    time: Res<Time>,
    mut viewer: ResMut<ViewerState>,
    mut frame: ResMut<CurrentFrame>,
    mut recent: ResMut<RecentEvents>,
) {
    frame.0 = Some(viewer.tick(time.delta_secs()));
    for event in viewer.drain_events() {
        tracing::debug!(?event, "Viewer event");
        recent.push(&event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medar_core::ModelInfo;

    #[test]
    fn test_recent_events_are_bounded() {
        let mut recent = RecentEvents::default();
        for i in 0..20 {
            recent.push(&ViewerEvent::Loading {
                model_id: format!("model-{i}"),
            });
        }
        assert_eq!(recent.entries.len(), RECENT_EVENT_LIMIT);
        assert_eq!(recent.entries.back().map(String::as_str), Some("Loading model-19..."));
    }

    #[test]
    fn test_describe_event() {
        let info = ModelInfo {
            mesh_count: 3,
            vertex_count: 9,
            triangle_count: 3,
            material_count: 1,
            has_animations: false,
            animation_names: Vec::new(),
            bounds: None,
            byte_size: 0,
            sha256: String::new(),
        };
        let text = describe_event(&ViewerEvent::Loaded {
            model_id: "kidney".to_string(),
            info,
        });
        assert_eq!(text, "Loaded kidney: 3 meshes, 3 triangles");
        assert_eq!(
            describe_event(&ViewerEvent::AnnotationVisited {
                id: "aorta".to_string(),
                progress: 0.5
            }),
            "Visited aorta (50% explored)"
        );
    }
}
