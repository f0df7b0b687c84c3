//! Bevy application for the interactive viewer

use bevy::asset::AssetMetaCheck;
use bevy::prelude::*;
use bevy_egui::EguiPlugin;
use medar_core::{SceneOrchestrator, WindowConfig};
use medar_scene::loading::{AsyncRuntime, LoadBridge};
use medar_scene::{MedarScenePlugin, ViewerState};

fn primary_window(config: &WindowConfig) -> Window {
    Window {
        title: config.title.clone(),
        resolution: (config.width, config.height).into(),
        ..default()
    }
}

/// Run the viewer until the window closes
pub fn run(
    viewer: SceneOrchestrator,
    runtime: tokio::runtime::Handle,
    initial_model: Option<String>,
) -> AppExit {
    let window = primary_window(&viewer.config().window);

    let mut bridge = LoadBridge::default();
    if let Some(model_id) = initial_model {
        bridge.request(model_id);
    }

    App::new()
        .insert_resource(ClearColor(Color::srgb(0.06, 0.07, 0.1)))
        .add_plugins(
            DefaultPlugins
                .set(WindowPlugin {
                    primary_window: Some(window),
                    ..default()
                })
                .set(AssetPlugin {
                    // Catalog locators are absolute paths or URLs
                    file_path: "".to_string(),
                    meta_check: AssetMetaCheck::Never,
                    ..default()
                }),
        )
        .add_plugins(EguiPlugin::default())
        .insert_resource(ViewerState(viewer))
        .insert_resource(AsyncRuntime(runtime))
        .insert_resource(bridge)
        .add_plugins(MedarScenePlugin)
        .run()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primary_window_from_config() {
        let config = WindowConfig {
            title: "Anatomy".to_string(),
            width: 1024,
            height: 768,
        };
        let window = primary_window(&config);
        assert_eq!(window.title, "Anatomy");
        assert_eq!(window.resolution.width(), 1024.0);
        assert_eq!(window.resolution.height(), 768.0);
    }
}
