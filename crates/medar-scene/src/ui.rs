//! egui control panels: model list, view controls, parts and annotations
//!
//! Widgets only record [`UiAction`]s while drawing. The actions are applied
//! to the orchestrator once the panels are done, so nothing is borrowed
//! across the two.

use bevy::ecs::system::SystemParam;
use bevy::prelude::*;
use bevy_egui::{egui, EguiContexts, EguiPrimaryContextPass};
use medar_core::{
    Annotation, ComplexityLevel, LoadStatus, ModelInfo, NudgeDirection, SceneOrchestrator,
};
use tracing::warn;

use crate::annotations::MarkerEntity;
use crate::camera::MainCamera;
use crate::loading::LoadBridge;
use crate::{CurrentFrame, RecentEvents, ViewerState};

/// A user request recorded by a widget
#[derive(Debug, Clone, PartialEq)]
pub enum UiAction {
    LoadModel(String),
    SetLevel(ComplexityLevel),
    SetSlice(f32),
    SetOpacity(f32),
    ZoomIn,
    ZoomOut,
    ShowAnnotations(bool),
    ShowAllLabels(bool),
    AutoRotate(bool),
    ToggleIsolated(String),
    ClearIsolation,
    ToggleTransparency(String),
    SelectAnnotation(Option<String>),
    Nudge(NudgeDirection),
    ResetView,
    ResetCamera,
}

/// Apply one recorded action
pub fn apply_action(viewer: &mut SceneOrchestrator, bridge: &mut LoadBridge, action: UiAction) {
    match action {
        UiAction::LoadModel(id) => bridge.request(id),
        UiAction::SetLevel(level) => {
            if let Err(e) = viewer.set_annotation_level(level) {
                warn!(level = %level, error = %e, "Level change rejected");
            }
        }
        UiAction::SetSlice(slice) => viewer.set_slice(slice),
        UiAction::SetOpacity(opacity) => viewer.set_opacity(opacity),
        UiAction::ZoomIn => viewer.zoom_in(),
        UiAction::ZoomOut => viewer.zoom_out(),
        UiAction::ShowAnnotations(show) => viewer.set_show_annotations(show),
        UiAction::ShowAllLabels(show) => viewer.set_show_all_labels(show),
        UiAction::AutoRotate(enabled) => viewer.set_auto_rotate(enabled),
        UiAction::ToggleIsolated(part_id) => {
            let mut isolated = viewer.params().isolate_parts.clone();
            if !isolated.remove(&part_id) {
                isolated.insert(part_id);
            }
            viewer.set_isolate_parts(isolated);
        }
        UiAction::ClearIsolation => viewer.set_isolate_parts(Vec::<String>::new()),
        UiAction::ToggleTransparency(part_id) => viewer.toggle_part_transparency(&part_id),
        UiAction::SelectAnnotation(id) => {
            if let Err(e) = viewer.select_annotation(id.as_deref()) {
                warn!(error = %e, "Annotation selection rejected");
            }
        }
        UiAction::Nudge(direction) => viewer.nudge_camera(direction),
        UiAction::ResetView => viewer.reset_view(),
        UiAction::ResetCamera => viewer.reset_camera(),
    }
}

#[derive(SystemParam)]
pub struct UiParams<'w, 's> {
    pub contexts: EguiContexts<'w, 's>,
    pub viewer: ResMut<'w, ViewerState>,
    pub bridge: ResMut<'w, LoadBridge>,
    pub frame: Res<'w, CurrentFrame>,
    pub recent: Res<'w, RecentEvents>,
    pub markers: Query<'w, 's, (&'static MarkerEntity, &'static GlobalTransform)>,
    pub cameras: Query<'w, 's, (&'static Camera, &'static GlobalTransform), With<MainCamera>>,
}

pub struct UiPlugin;

impl Plugin for UiPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(EguiPrimaryContextPass, ui_system);
    }
}

fn ui_system(mut params: UiParams) {
    let Ok(ctx) = params.contexts.ctx_mut() else {
        return;
    };
    let mut actions = Vec::new();
    let fetches = params.bridge.pending().len() + params.bridge.in_flight();
    let viewer: &SceneOrchestrator = &params.viewer;

    egui::SidePanel::left("models_panel")
        .default_width(260.0)
        .show(ctx, |ui| {
            egui::ScrollArea::vertical().show(ui, |ui| {
                models_section(ui, viewer, &mut actions);
                ui.separator();
                view_section(ui, viewer, &mut actions);
                ui.separator();
                parts_section(ui, viewer, &mut actions);
            });
        });

    if viewer.active_model().is_some() {
        egui::SidePanel::right("annotations_panel")
            .default_width(280.0)
            .show(ctx, |ui| {
                annotations_section(ui, viewer, &mut actions);
            });
    }

    egui::TopBottomPanel::bottom("status_panel")
        .max_height(120.0)
        .show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label(status_text(viewer.status(), fetches));
                ui.separator();
                ui.label("Drag to orbit | Right-drag to pan | Scroll to zoom | Arrows nudge | R resets");
            });
            for entry in params.recent.entries.iter().rev().take(3) {
                ui.label(egui::RichText::new(entry).small().color(egui::Color32::GRAY));
            }
        });

    if let Some(selected) = viewer.annotations().selected() {
        detail_window(ctx, selected, viewer.annotations().is_visited(&selected.id), &mut actions);
    }

    if let Ok((camera, camera_transform)) = params.cameras.single() {
        for (marker, transform) in &params.markers {
            if !marker.show_label {
                continue;
            }
            let Ok(position) = camera.world_to_viewport(camera_transform, transform.translation())
            else {
                continue;
            };
            egui::Area::new(egui::Id::new(("annotation_label", &marker.id)))
                .fixed_pos(egui::pos2(position.x + 12.0, position.y - 10.0))
                .interactable(false)
                .show(ctx, |ui| {
                    egui::Frame::popup(ui.style()).show(ui, |ui| {
                        ui.label(egui::RichText::new(&marker.title).strong());
                    });
                });
        }
    }

    let viewer = &mut params.viewer.0;
    for action in actions {
        apply_action(viewer, &mut params.bridge, action);
    }
}

/// Status line, with the number of fetches not yet handed back
fn status_text(status: &LoadStatus, fetches: usize) -> String {
    let text = match status {
        LoadStatus::Idle => "Select a model".to_string(),
        LoadStatus::Loading { model_id } => format!("Loading {model_id}..."),
        LoadStatus::Loaded { model_id, .. } => format!("Showing {model_id}"),
        LoadStatus::Failed { model_id, message } => {
            format!("{model_id} unavailable ({message}), showing placeholder")
        }
    };
    match fetches {
        0 => text,
        1 => format!("{text} (1 fetch pending)"),
        n => format!("{text} ({n} fetches pending)"),
    }
}

fn models_section(ui: &mut egui::Ui, viewer: &SceneOrchestrator, actions: &mut Vec<UiAction>) {
    ui.heading("Models");
    for entry in &viewer.catalog().models {
        let active = viewer.active_model() == Some(entry.id.as_str());
        let response = ui.selectable_label(active, &entry.label);
        let response = match &entry.description {
            Some(description) => response.on_hover_text(description),
            None => response,
        };
        if response.clicked() {
            actions.push(UiAction::LoadModel(entry.id.clone()));
        }
    }

    if let LoadStatus::Loaded { info, .. } = viewer.status() {
        ui.collapsing("Model info", |ui| model_info(ui, info));
    }
}

fn model_info(ui: &mut egui::Ui, info: &ModelInfo) {
    egui::Grid::new("model_info_grid").num_columns(2).show(ui, |ui| {
        ui.label("Meshes");
        ui.label(info.mesh_count.to_string());
        ui.end_row();
        ui.label("Vertices");
        ui.label(info.vertex_count.to_string());
        ui.end_row();
        ui.label("Triangles");
        ui.label(info.triangle_count.to_string());
        ui.end_row();
        ui.label("Materials");
        ui.label(info.material_count.to_string());
        ui.end_row();
        ui.label("Size");
        ui.label(format!("{:.1} KiB", info.byte_size as f64 / 1024.0));
        ui.end_row();
        if let Some(bounds) = &info.bounds {
            let size = bounds.size();
            ui.label("Extent");
            ui.label(format!("{:.2} x {:.2} x {:.2}", size.x, size.y, size.z));
            ui.end_row();
        }
        ui.label("SHA-256");
        ui.label(info.sha256.get(..12).unwrap_or(&info.sha256))
            .on_hover_text(&info.sha256);
        ui.end_row();
    });
    if info.has_animations {
        ui.label(
            egui::RichText::new(format!(
                "Animations not played: {}",
                info.animation_names.join(", ")
            ))
            .small()
            .color(egui::Color32::YELLOW),
        );
    }
}

fn view_section(ui: &mut egui::Ui, viewer: &SceneOrchestrator, actions: &mut Vec<UiAction>) {
    let view = viewer.params();
    ui.heading("View");

    let mut level = view.level;
    egui::ComboBox::from_label("Detail level")
        .selected_text(level.as_str())
        .show_ui(ui, |ui| {
            for candidate in ComplexityLevel::ALL {
                let available = viewer
                    .active_entry()
                    .is_none_or(|entry| entry.supports_level(candidate));
                ui.add_enabled_ui(available, |ui| {
                    ui.selectable_value(&mut level, candidate, candidate.as_str());
                });
            }
        });
    if level != view.level {
        actions.push(UiAction::SetLevel(level));
    }

    let mut slice = view.slice;
    if ui
        .add(egui::Slider::new(&mut slice, 0.0..=100.0).text("Cross-section"))
        .changed()
    {
        actions.push(UiAction::SetSlice(slice));
    }
    let mut opacity = view.opacity;
    if ui
        .add(egui::Slider::new(&mut opacity, 0.0..=100.0).text("Opacity"))
        .changed()
    {
        actions.push(UiAction::SetOpacity(opacity));
    }

    ui.horizontal(|ui| {
        if ui.button("-").on_hover_text("Zoom out").clicked() {
            actions.push(UiAction::ZoomOut);
        }
        ui.label(format!("Scale {:.2}x", view.scale));
        if ui.button("+").on_hover_text("Zoom in").clicked() {
            actions.push(UiAction::ZoomIn);
        }
    });

    let mut show_annotations = view.show_annotations;
    if ui.checkbox(&mut show_annotations, "Show annotations").changed() {
        actions.push(UiAction::ShowAnnotations(show_annotations));
    }
    let mut show_all_labels = view.show_all_labels;
    if ui.checkbox(&mut show_all_labels, "Show all labels").changed() {
        actions.push(UiAction::ShowAllLabels(show_all_labels));
    }
    let mut auto_rotate = view.auto_rotate;
    if ui.checkbox(&mut auto_rotate, "Auto-rotate").changed() {
        actions.push(UiAction::AutoRotate(auto_rotate));
    }

    ui.add_space(4.0);
    ui.label("Camera");
    egui::Grid::new("nudge_pad").show(ui, |ui| {
        ui.label("");
        if ui.button("⬆").clicked() {
            actions.push(UiAction::Nudge(NudgeDirection::Up));
        }
        ui.label("");
        ui.end_row();
        if ui.button("⬅").clicked() {
            actions.push(UiAction::Nudge(NudgeDirection::Left));
        }
        if ui.button("⟲").on_hover_text("Reset camera").clicked() {
            actions.push(UiAction::ResetCamera);
        }
        if ui.button("➡").clicked() {
            actions.push(UiAction::Nudge(NudgeDirection::Right));
        }
        ui.end_row();
        ui.label("");
        if ui.button("⬇").clicked() {
            actions.push(UiAction::Nudge(NudgeDirection::Down));
        }
        ui.label("");
        ui.end_row();
    });

    if ui.button("Reset view").clicked() {
        actions.push(UiAction::ResetView);
    }
}

fn parts_section(ui: &mut egui::Ui, viewer: &SceneOrchestrator, actions: &mut Vec<UiAction>) {
    let part_ids = viewer.part_ids();
    if part_ids.is_empty() {
        return;
    }
    let view = viewer.params();

    egui::CollapsingHeader::new(format!("Parts ({})", part_ids.len()))
        .default_open(false)
        .show(ui, |ui| {
            if !view.isolate_parts.is_empty() && ui.button("Show all parts").clicked() {
                actions.push(UiAction::ClearIsolation);
            }
            egui::Grid::new("parts_grid").num_columns(3).show(ui, |ui| {
                ui.label(egui::RichText::new("Part").strong());
                ui.label(egui::RichText::new("Isolate").strong());
                ui.label(egui::RichText::new("Fade").strong());
                ui.end_row();
                for part_id in &part_ids {
                    let label = if part_id.is_empty() { "(unnamed)" } else { part_id.as_str() };
                    ui.label(label);
                    let mut isolated = view.isolate_parts.contains(part_id);
                    if ui.checkbox(&mut isolated, "").changed() {
                        actions.push(UiAction::ToggleIsolated(part_id.clone()));
                    }
                    let mut faded = view.transparency_toggled.contains(part_id);
                    if ui.checkbox(&mut faded, "").changed() {
                        actions.push(UiAction::ToggleTransparency(part_id.clone()));
                    }
                    ui.end_row();
                }
            });
        });
}

fn annotations_section(ui: &mut egui::Ui, viewer: &SceneOrchestrator, actions: &mut Vec<UiAction>) {
    let registry = viewer.annotations();
    ui.heading("Annotations");

    let progress = registry.current_progress();
    ui.add(egui::ProgressBar::new(progress).text(format!("{:.0}% explored", progress * 100.0)));
    ui.separator();

    let selected = registry.selection().id();
    egui::ScrollArea::vertical().show(ui, |ui| {
        for annotation in registry.applicable() {
            ui.horizontal(|ui| {
                let mark = if registry.is_visited(&annotation.id) { "✔" } else { "○" };
                ui.label(mark);
                let color = marker_color32(annotation.marker_color());
                ui.colored_label(color, "●");
                let is_selected = selected == Some(annotation.id.as_str());
                if ui.selectable_label(is_selected, &annotation.title).clicked() {
                    let next = if is_selected { None } else { Some(annotation.id.clone()) };
                    actions.push(UiAction::SelectAnnotation(next));
                }
            });
        }
    });
}

fn detail_window(
    ctx: &egui::Context,
    annotation: &Annotation,
    visited: bool,
    actions: &mut Vec<UiAction>,
) {
    egui::Window::new(&annotation.title)
        .id(egui::Id::new("annotation_detail"))
        .collapsible(false)
        .resizable(false)
        .anchor(egui::Align2::RIGHT_BOTTOM, egui::vec2(-300.0, -140.0))
        .show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.colored_label(marker_color32(annotation.marker_color()), "●");
                ui.label(format!("{:?}", annotation.kind));
                if visited {
                    ui.label(egui::RichText::new("visited").small().color(egui::Color32::GRAY));
                }
            });
            ui.label(&annotation.description);
            if let Some(details) = &annotation.detailed_info {
                ui.separator();
                ui.label(egui::RichText::new(details).small());
            }
            if ui.button("Close").clicked() {
                actions.push(UiAction::SelectAnnotation(None));
            }
        });
}

fn marker_color32(hex: &str) -> egui::Color32 {
    match medar_core::parse_hex_color(hex) {
        Some([r, g, b]) => egui::Color32::from_rgb(
            (r * 255.0).round() as u8,
            (g * 255.0).round() as u8,
            (b * 255.0).round() as u8,
        ),
        None => egui::Color32::WHITE,
    }
}
