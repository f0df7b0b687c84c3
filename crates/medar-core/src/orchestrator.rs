//! Scene orchestrator - composes the loader, material controller, camera rig
//! and annotation registry into one frame per tick
//!
//! All state lives on the caller's thread. Loads are split into
//! [`SceneOrchestrator::select_model`], which hands out a [`LoadTicket`], and
//! [`SceneOrchestrator::finish_load`], which applies the result only if the
//! ticket still belongs to the current selection. Hosts that own an async
//! runtime can run the fetch anywhere in between.

use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::f32::consts::TAU;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::annotation::{Annotation, AnnotationChange, AnnotationKind, AnnotationRegistry, ComplexityLevel};
use crate::asset::{GeometryHandle, ModelAsset, ModelInfo};
use crate::camera::{CameraPose, CameraRig, NudgeDirection};
use crate::catalog::{ModelCatalog, ModelEntry};
use crate::config::ViewerConfig;
use crate::error::{AssetLoadError, UnsupportedAnimationError, ViewerError};
use crate::loader::AssetLoader;
use crate::material::{ClipPlane, MaterialController, MaterialState};
use crate::placeholder::{placeholder_heart, PlaceholderPrimitive};
use crate::view::{ViewInstance, ViewParams};

/// Load state of the active model
#[derive(Debug, Clone, PartialEq, Default)]
pub enum LoadStatus {
    #[default]
    Idle,
    Loading { model_id: String },
    Loaded { model_id: String, info: ModelInfo },
    Failed { model_id: String, message: String },
}

/// Identifies one requested load. Results carrying an outdated ticket are
/// discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTicket {
    pub model_id: String,
    pub locator: String,
    pub generation: u64,
}

/// Notifications for the host
#[derive(Debug, Clone, PartialEq)]
pub enum ViewerEvent {
    Loading { model_id: String },
    Loaded { model_id: String, info: ModelInfo },
    LoadFailed { model_id: String, message: String },
    AnnotationSelected { id: Option<String> },
    AnnotationVisited { id: String, progress: f32 },
    ViewReset,
}

/// One mesh of the active view with its derived material
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshFrame {
    pub index: usize,
    pub part_id: String,
    pub node_name: Option<String>,
    pub geometry: GeometryHandle,
    pub material: MaterialState,
}

/// What the viewport shows
#[derive(Debug, Clone, PartialEq)]
pub enum FrameContent {
    Empty,
    Loading {
        model_id: String,
    },
    Model {
        view_id: Uuid,
        model_id: String,
        generation: u64,
        locator: String,
        meshes: Vec<MeshFrame>,
    },
    Placeholder {
        model_id: String,
        message: String,
        shapes: Vec<PlaceholderPrimitive>,
    },
}

/// Annotation marker to draw
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationMarker {
    pub id: String,
    pub title: String,
    pub kind: AnnotationKind,
    pub position: Vec3,
    pub color: String,
    pub selected: bool,
    pub visited: bool,
    pub show_label: bool,
}

/// Everything the renderer needs for one tick
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub sequence: u64,
    pub camera: CameraPose,
    pub clip: ClipPlane,
    pub params: ViewParams,
    /// Model rotation about Y from auto-rotate, radians
    pub model_yaw: f32,
    pub content: FrameContent,
    pub markers: Vec<AnnotationMarker>,
    pub selected: Option<Annotation>,
    pub progress: f32,
}

pub struct SceneOrchestrator {
    config: ViewerConfig,
    catalog: Arc<ModelCatalog>,
    loader: AssetLoader,
    camera: CameraRig,
    annotations: AnnotationRegistry,
    params: ViewParams,
    active_model: Option<String>,
    generation: u64,
    status: LoadStatus,
    view: Option<ViewInstance>,
    clip: ClipPlane,
    model_yaw: f32,
    sequence: u64,
    events: Vec<ViewerEvent>,
}

impl SceneOrchestrator {
    pub fn new(config: ViewerConfig, catalog: Arc<ModelCatalog>, loader: AssetLoader) -> Self {
        let camera = CameraRig::new(config.camera.clone());
        let annotations = AnnotationRegistry::new(Arc::clone(&catalog));
        Self {
            config,
            catalog,
            loader,
            camera,
            annotations,
            params: ViewParams::default(),
            active_model: None,
            generation: 0,
            status: LoadStatus::Idle,
            view: None,
            clip: ClipPlane::default(),
            model_yaw: 0.0,
            sequence: 0,
            events: Vec::new(),
        }
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    pub fn loader(&self) -> &AssetLoader {
        &self.loader
    }

    pub fn camera(&self) -> &CameraRig {
        &self.camera
    }

    pub fn annotations(&self) -> &AnnotationRegistry {
        &self.annotations
    }

    pub fn params(&self) -> &ViewParams {
        &self.params
    }

    pub fn view(&self) -> Option<&ViewInstance> {
        self.view.as_ref()
    }

    pub fn active_model(&self) -> Option<&str> {
        self.active_model.as_deref()
    }

    pub fn active_entry(&self) -> Option<&ModelEntry> {
        self.active_model.as_deref().and_then(|id| self.catalog.get(id))
    }

    pub fn status(&self) -> &LoadStatus {
        &self.status
    }

    /// Warm the cache with the configured preload list. Returns the number of
    /// fetches scheduled.
    pub fn preload_configured(&self) -> usize {
        let mut scheduled = 0;
        for id in &self.config.assets.preload {
            match self.catalog.locator_for(id, &self.config.assets.base) {
                Ok(locator) => {
                    if self.loader.preload(&locator) {
                        scheduled += 1;
                    }
                }
                Err(e) => warn!(model = %id, error = %e, "Skipping preload"),
            }
        }
        scheduled
    }

    /// Switch to a model and start a new load generation.
    ///
    /// Discards the current view and resets the camera, the view parameters
    /// and (for a different model) the annotation session.
    pub fn select_model(&mut self, model_id: &str) -> Result<LoadTicket, ViewerError> {
        let locator = self
            .catalog
            .locator_for(model_id, &self.config.assets.base)
            .map_err(|_| ViewerError::UnknownModel(model_id.to_string()))?;

        self.generation += 1;
        self.active_model = Some(model_id.to_string());
        self.view = None;
        self.params = ViewParams::default();
        self.model_yaw = 0.0;
        self.camera.reset();
        self.annotations.activate(Some(model_id), self.params.level);
        self.pump_annotation_changes();

        info!(
            model = %model_id,
            locator = %locator,
            generation = self.generation,
            "Loading model"
        );
        self.status = LoadStatus::Loading {
            model_id: model_id.to_string(),
        };
        self.events.push(ViewerEvent::Loading {
            model_id: model_id.to_string(),
        });

        Ok(LoadTicket {
            model_id: model_id.to_string(),
            locator,
            generation: self.generation,
        })
    }

    /// Apply a load result. Returns false when the ticket is stale and the
    /// result was dropped.
    pub fn finish_load(
        &mut self,
        ticket: &LoadTicket,
        result: Result<ModelAsset, AssetLoadError>,
    ) -> bool {
        let current = ticket.generation == self.generation
            && self.active_model.as_deref() == Some(ticket.model_id.as_str());
        if !current {
            debug!(
                model = %ticket.model_id,
                generation = ticket.generation,
                current_generation = self.generation,
                "Discarding stale load result"
            );
            return false;
        }

        let model_id = ticket.model_id.clone();
        match result {
            Ok(asset) => {
                if !asset.animation_names.is_empty() {
                    let err = UnsupportedAnimationError {
                        model: model_id.clone(),
                        names: asset.animation_names.clone(),
                    };
                    warn!(error = %err, "Animations will not be played");
                }

                let mut view = ViewInstance::new(&model_id, ticket.generation, asset);
                MaterialController::apply(&mut view, &self.params);
                let info = view.info().clone();
                info!(
                    model = %model_id,
                    meshes = info.mesh_count,
                    vertices = info.vertex_count,
                    triangles = info.triangle_count,
                    "Model loaded"
                );
                self.view = Some(view);
                self.status = LoadStatus::Loaded {
                    model_id: model_id.clone(),
                    info: info.clone(),
                };
                self.events.push(ViewerEvent::Loaded { model_id, info });
            }
            Err(e) => {
                warn!(model = %model_id, error = %e, "Model load failed, showing placeholder");
                let message = e.to_string();
                self.view = None;
                self.status = LoadStatus::Failed {
                    model_id: model_id.clone(),
                    message: message.clone(),
                };
                self.events.push(ViewerEvent::LoadFailed { model_id, message });
            }
        }
        true
    }

    /// Select a model and load it through the cache in one step. A load
    /// failure is returned but has already degraded the view to the
    /// placeholder.
    pub async fn load_model(&mut self, model_id: &str) -> Result<(), ViewerError> {
        let ticket = self.select_model(model_id)?;
        let result = self.loader.load(&ticket.locator).await;
        let outcome = result.as_ref().map(|_| ()).map_err(|e| e.clone().into());
        self.finish_load(&ticket, result);
        outcome
    }

    /// Advance one tick and produce the frame to render
    pub fn tick(&mut self, dt: f32) -> Frame {
        self.clip = ClipPlane::from_slice(self.params.slice);
        self.camera.update();
        if self.params.auto_rotate && dt.is_finite() && dt > 0.0 {
            self.model_yaw = (self.model_yaw + dt * self.config.model.auto_rotate_speed) % TAU;
        }
        self.sequence += 1;
        self.frame()
    }

    /// Snapshot of the current state without advancing
    pub fn frame(&self) -> Frame {
        Frame {
            sequence: self.sequence,
            camera: self.camera.pose(),
            clip: self.clip,
            params: self.params.clone(),
            model_yaw: self.model_yaw,
            content: self.content(),
            markers: self.markers(),
            selected: self.annotations.selected().cloned(),
            progress: self.annotations.current_progress(),
        }
    }

    /// Replace all view parameters at once
    pub fn set_view_params(&mut self, mut params: ViewParams) -> Result<(), ViewerError> {
        self.check_level(params.level)?;
        params.sanitize(self.config.model.min_scale, self.config.model.max_scale);
        if params.level != self.params.level {
            self.annotations.set_level(params.level);
            self.pump_annotation_changes();
        }
        self.params = params;
        self.reapply();
        Ok(())
    }

    pub fn set_isolate_parts<I, S>(&mut self, parts: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.params.isolate_parts = parts.into_iter().map(Into::into).collect();
        self.reapply();
    }

    pub fn set_transparency_toggled<I, S>(&mut self, parts: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.params.transparency_toggled = parts.into_iter().map(Into::into).collect();
        self.reapply();
    }

    /// Flip one part in or out of the transparency set
    pub fn toggle_part_transparency(&mut self, part_id: &str) {
        let toggled = &mut self.params.transparency_toggled;
        if !toggled.remove(part_id) {
            toggled.insert(part_id.to_string());
        }
        self.reapply();
    }

    pub fn set_slice(&mut self, slice: f32) {
        self.params.slice = slice;
        self.sanitize_and_reapply();
    }

    pub fn set_opacity(&mut self, opacity: f32) {
        self.params.opacity = opacity;
        self.sanitize_and_reapply();
    }

    pub fn set_scale(&mut self, scale: f32) {
        self.params.scale = scale;
        self.sanitize_and_reapply();
    }

    pub fn zoom_in(&mut self) {
        self.set_scale(self.params.scale * self.config.model.zoom_in_factor);
    }

    pub fn zoom_out(&mut self) {
        self.set_scale(self.params.scale * self.config.model.zoom_out_factor);
    }

    pub fn set_show_annotations(&mut self, show: bool) {
        self.params.show_annotations = show;
    }

    pub fn set_show_all_labels(&mut self, show: bool) {
        self.params.show_all_labels = show;
    }

    pub fn set_auto_rotate(&mut self, enabled: bool) {
        self.params.auto_rotate = enabled;
    }

    /// Change the annotation level. The active model must author it.
    pub fn set_annotation_level(&mut self, level: ComplexityLevel) -> Result<(), ViewerError> {
        self.check_level(level)?;
        self.params.level = level;
        self.annotations.set_level(level);
        self.pump_annotation_changes();
        Ok(())
    }

    /// Select an annotation (or clear with `None`). Selecting also marks the
    /// annotation visited.
    pub fn select_annotation(&mut self, id: Option<&str>) -> Result<(), ViewerError> {
        let result = self.annotations.select(id);
        if result.is_ok() {
            if let Some(id) = id {
                self.annotations.mark_visited(id)?;
            }
        }
        self.pump_annotation_changes();
        result.map_err(Into::into)
    }

    /// Restore default view parameters and camera, keeping the model, the
    /// annotation level and visited progress
    pub fn reset_view(&mut self) {
        self.params = ViewParams {
            level: self.params.level,
            ..ViewParams::default()
        };
        self.model_yaw = 0.0;
        self.camera.reset();
        // Clearing a selection cannot fail
        let _ = self.annotations.select(None);
        self.reapply();
        self.pump_annotation_changes();
        self.events.push(ViewerEvent::ViewReset);
        debug!("View reset");
    }

    pub fn reset_camera(&mut self) {
        self.camera.reset();
    }

    pub fn nudge_camera(&mut self, direction: NudgeDirection) {
        self.camera.nudge(direction);
    }

    pub fn orbit(&mut self, delta_azimuth: f32, delta_polar: f32) {
        self.camera.rotate(delta_azimuth, delta_polar);
    }

    pub fn pan(&mut self, delta_x: f32, delta_y: f32) {
        self.camera.pan(delta_x, delta_y);
    }

    pub fn dolly(&mut self, factor: f32) {
        self.camera.dolly(factor);
    }

    /// Take all pending host notifications
    pub fn drain_events(&mut self) -> Vec<ViewerEvent> {
        std::mem::take(&mut self.events)
    }

    /// Part ids present in the active view
    pub fn part_ids(&self) -> BTreeSet<String> {
        self.view
            .as_ref()
            .map(|v| v.asset().part_keys().into_iter().map(str::to_string).collect())
            .unwrap_or_default()
    }

    fn check_level(&self, level: ComplexityLevel) -> Result<(), ViewerError> {
        match self.active_entry() {
            Some(entry) if !entry.supports_level(level) => Err(ViewerError::LevelUnavailable {
                model: entry.id.clone(),
                level,
            }),
            _ => Ok(()),
        }
    }

    fn sanitize_and_reapply(&mut self) {
        self.params
            .sanitize(self.config.model.min_scale, self.config.model.max_scale);
        self.reapply();
    }

    fn reapply(&mut self) {
        if let Some(view) = self.view.as_mut() {
            MaterialController::apply(view, &self.params);
        }
    }

    fn pump_annotation_changes(&mut self) {
        for change in self.annotations.take_changes() {
            self.events.push(match change {
                AnnotationChange::Selected(id) => ViewerEvent::AnnotationSelected { id },
                AnnotationChange::Visited { id, progress } => {
                    ViewerEvent::AnnotationVisited { id, progress }
                }
            });
        }
    }

    fn content(&self) -> FrameContent {
        if let Some(view) = &self.view {
            let meshes = view
                .meshes()
                .iter()
                .zip(view.materials())
                .map(|(mesh, material)| MeshFrame {
                    index: mesh.index,
                    part_id: mesh.part_key().to_string(),
                    node_name: mesh.node_name.clone(),
                    geometry: mesh.geometry,
                    material: *material,
                })
                .collect();
            return FrameContent::Model {
                view_id: view.id,
                model_id: view.model_id.clone(),
                generation: view.generation,
                locator: view.asset().locator.clone(),
                meshes,
            };
        }

        match &self.status {
            LoadStatus::Loading { model_id } => FrameContent::Loading {
                model_id: model_id.clone(),
            },
            LoadStatus::Failed { model_id, message } => FrameContent::Placeholder {
                model_id: model_id.clone(),
                message: message.clone(),
                shapes: placeholder_heart(),
            },
            LoadStatus::Idle | LoadStatus::Loaded { .. } => FrameContent::Empty,
        }
    }

    fn markers(&self) -> Vec<AnnotationMarker> {
        if !self.params.show_annotations {
            return Vec::new();
        }
        let selected = self.annotations.selection().id();
        self.annotations
            .applicable()
            .into_iter()
            .map(|a| {
                let is_selected = selected == Some(a.id.as_str());
                AnnotationMarker {
                    id: a.id.clone(),
                    title: a.title.clone(),
                    kind: a.kind,
                    position: Vec3::from_array(a.position),
                    color: a.marker_color().to_string(),
                    selected: is_selected,
                    visited: self.annotations.is_visited(&a.id),
                    show_label: self.params.show_all_labels || is_selected,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::UnknownAnnotationError;
    use crate::loader::AssetSource;
    use crate::test_support::{gltf_fixture, kidney_fixture, MemorySource, Part};

    fn orchestrator_with(source: MemorySource) -> (SceneOrchestrator, Arc<MemorySource>) {
        let source = Arc::new(source);
        let mut config = ViewerConfig::default();
        config.assets.base = "assets".to_string();
        let catalog = Arc::new(ModelCatalog::builtin().unwrap());
        let loader = AssetLoader::new(Arc::clone(&source) as Arc<dyn AssetSource>);
        (SceneOrchestrator::new(config, catalog, loader), source)
    }

    fn standard_source() -> MemorySource {
        MemorySource::new()
            .with("assets/kidney.glb", kidney_fixture())
            .with(
                "assets/heart.glb",
                gltf_fixture(&[Part::named("left-ventricle"), Part::named("aorta")]),
            )
    }

    fn mesh_visibility(frame: &Frame) -> Vec<(String, bool)> {
        match &frame.content {
            FrameContent::Model { meshes, .. } => meshes
                .iter()
                .map(|m| (m.part_id.clone(), m.material.visible))
                .collect(),
            other => panic!("expected model content, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_kidney_end_to_end() {
        let (mut orchestrator, _) = orchestrator_with(standard_source());
        orchestrator.load_model("kidney").await.unwrap();

        match orchestrator.status() {
            LoadStatus::Loaded { model_id, info } => {
                assert_eq!(model_id, "kidney");
                assert!(info.mesh_count > 0);
            }
            other => panic!("unexpected status {other:?}"),
        }

        orchestrator.set_isolate_parts(["cortex"]);
        let frame = orchestrator.tick(0.016);
        let visibility = mesh_visibility(&frame);
        assert_eq!(visibility.iter().filter(|(_, visible)| *visible).count(), 1);
        assert!(visibility.iter().all(|(part, visible)| *visible == (part == "cortex")));

        let err = orchestrator.select_annotation(Some("pelvis-marker")).unwrap_err();
        assert_eq!(
            err,
            ViewerError::Annotation(UnknownAnnotationError {
                id: "pelvis-marker".to_string(),
                model: Some("kidney".to_string()),
                level: ComplexityLevel::Basic,
            })
        );
    }

    #[tokio::test]
    async fn test_load_events() {
        let (mut orchestrator, _) = orchestrator_with(standard_source());
        orchestrator.load_model("kidney").await.unwrap();
        let events = orchestrator.drain_events();
        assert!(matches!(&events[0], ViewerEvent::Loading { model_id } if model_id == "kidney"));
        assert!(matches!(&events[1], ViewerEvent::Loaded { info, .. } if info.mesh_count == 3));
        assert!(orchestrator.drain_events().is_empty());
    }

    #[tokio::test]
    async fn test_failed_load_shows_placeholder() {
        let (mut orchestrator, source) = orchestrator_with(MemorySource::new());
        let err = orchestrator.load_model("brain").await.unwrap_err();
        assert!(matches!(err, ViewerError::Load(AssetLoadError::Fetch { .. })));

        let frame = orchestrator.tick(0.016);
        match frame.content {
            FrameContent::Placeholder { model_id, shapes, .. } => {
                assert_eq!(model_id, "brain");
                assert_eq!(shapes.len(), 4);
            }
            other => panic!("expected placeholder, got {other:?}"),
        }
        assert!(orchestrator
            .drain_events()
            .iter()
            .any(|e| matches!(e, ViewerEvent::LoadFailed { model_id, .. } if model_id == "brain")));

        // Failures are not cached, so re-selecting retries the fetch
        orchestrator.load_model("brain").await.unwrap_err();
        assert_eq!(source.fetch_count(), 2);
    }

    #[test]
    fn test_unknown_model() {
        let (mut orchestrator, _) = orchestrator_with(MemorySource::new());
        assert_eq!(
            orchestrator.select_model("spleen").unwrap_err(),
            ViewerError::UnknownModel("spleen".to_string())
        );
        assert_eq!(orchestrator.status(), &LoadStatus::Idle);
        assert_eq!(orchestrator.tick(0.016).content, FrameContent::Empty);
    }

    #[test]
    fn test_stale_result_is_discarded() {
        let (mut orchestrator, _) = orchestrator_with(MemorySource::new());
        let kidney = orchestrator.select_model("kidney").unwrap();
        let heart = orchestrator.select_model("heart").unwrap();
        assert!(heart.generation > kidney.generation);

        let asset = crate::asset::parse_gltf(&kidney.locator, &kidney_fixture()).unwrap();
        assert!(!orchestrator.finish_load(&kidney, Ok(asset)));
        assert!(orchestrator.view().is_none());
        assert!(matches!(
            orchestrator.tick(0.016).content,
            FrameContent::Loading { ref model_id } if model_id == "heart"
        ));

        // Re-selecting the same model also invalidates older tickets
        let heart_again = orchestrator.select_model("heart").unwrap();
        let err = AssetLoadError::Fetch {
            locator: heart.locator.clone(),
            reason: "timeout".to_string(),
        };
        assert!(!orchestrator.finish_load(&heart, Err(err)));
        assert!(matches!(orchestrator.status(), LoadStatus::Loading { .. }));
        assert_eq!(heart_again.locator, "assets/heart.glb");
    }

    #[tokio::test]
    async fn test_model_switch_resets_state() {
        let (mut orchestrator, _) = orchestrator_with(standard_source());
        orchestrator.load_model("heart").await.unwrap();
        orchestrator.set_annotation_level(ComplexityLevel::Advanced).unwrap();
        orchestrator.set_slice(60.0);
        orchestrator.set_opacity(40.0);
        orchestrator.zoom_in();
        orchestrator.set_isolate_parts(["aorta"]);
        orchestrator.nudge_camera(NudgeDirection::Left);
        orchestrator.select_annotation(Some("aorta")).unwrap();
        assert!(orchestrator.annotations().current_progress() > 0.0);

        orchestrator.load_model("kidney").await.unwrap();
        assert_eq!(orchestrator.params(), &ViewParams::default());
        assert_eq!(orchestrator.camera().pose(), CameraRig::new(Default::default()).pose());
        assert_eq!(orchestrator.annotations().current_progress(), 0.0);
        assert!(orchestrator.annotations().selected().is_none());
        assert_eq!(orchestrator.annotations().level(), ComplexityLevel::Basic);
    }

    #[tokio::test]
    async fn test_selection_marks_visited() {
        let (mut orchestrator, _) = orchestrator_with(standard_source());
        orchestrator.load_model("heart").await.unwrap();
        orchestrator.drain_events();

        let mut last = 0.0;
        for id in ["left-atrium", "right-atrium", "left-atrium", "left-ventricle"] {
            orchestrator.select_annotation(Some(id)).unwrap();
            let progress = orchestrator.tick(0.016).progress;
            assert!(progress >= last);
            last = progress;
        }
        assert_eq!(last, 0.75);

        let events = orchestrator.drain_events();
        let visits = events
            .iter()
            .filter(|e| matches!(e, ViewerEvent::AnnotationVisited { .. }))
            .count();
        assert_eq!(visits, 3);
        assert!(events.contains(&ViewerEvent::AnnotationSelected {
            id: Some("left-ventricle".to_string())
        }));

        let frame = orchestrator.frame();
        assert_eq!(frame.selected.map(|a| a.id), Some("left-ventricle".to_string()));
        let marker = frame.markers.iter().find(|m| m.id == "left-ventricle").unwrap();
        assert!(marker.selected && marker.visited && marker.show_label);
        assert_eq!(marker.color, "#ef4444");
    }

    #[tokio::test]
    async fn test_level_availability() {
        let (mut orchestrator, _) = orchestrator_with(standard_source());
        orchestrator.load_model("kidney").await.unwrap();
        assert_eq!(
            orchestrator.set_annotation_level(ComplexityLevel::Intermediate),
            Err(ViewerError::LevelUnavailable {
                model: "kidney".to_string(),
                level: ComplexityLevel::Intermediate,
            })
        );

        let params = ViewParams {
            level: ComplexityLevel::Advanced,
            ..ViewParams::default()
        };
        assert!(orchestrator.set_view_params(params).is_err());
        assert_eq!(orchestrator.params().level, ComplexityLevel::Basic);
    }

    #[tokio::test]
    async fn test_level_change_filters_markers() {
        let (mut orchestrator, _) = orchestrator_with(standard_source());
        orchestrator.load_model("heart").await.unwrap();
        assert_eq!(orchestrator.frame().markers.len(), 4);

        orchestrator.select_annotation(Some("left-atrium")).unwrap();
        orchestrator.set_annotation_level(ComplexityLevel::Advanced).unwrap();
        assert_eq!(orchestrator.frame().markers.len(), 9);
        // Still shown at the new level, so still selected
        assert!(orchestrator.annotations().selected().is_some());

        orchestrator.select_annotation(Some("aorta")).unwrap();
        orchestrator.set_annotation_level(ComplexityLevel::Basic).unwrap();
        assert!(orchestrator.annotations().selected().is_none());

        orchestrator.set_show_annotations(false);
        assert!(orchestrator.frame().markers.is_empty());
    }

    #[tokio::test]
    async fn test_reset_view_keeps_progress() {
        let (mut orchestrator, _) = orchestrator_with(standard_source());
        orchestrator.load_model("heart").await.unwrap();
        orchestrator.set_annotation_level(ComplexityLevel::Intermediate).unwrap();
        orchestrator.select_annotation(Some("mitral-valve")).unwrap();
        orchestrator.set_slice(30.0);
        orchestrator.set_transparency_toggled(["aorta"]);
        orchestrator.set_scale(3.0);
        orchestrator.dolly(2.0);
        orchestrator.drain_events();

        orchestrator.reset_view();
        let params = orchestrator.params();
        assert_eq!(params.scale, 1.0);
        assert_eq!(params.slice, 0.0);
        assert_eq!(params.opacity, 100.0);
        assert!(params.isolate_parts.is_empty());
        assert!(params.transparency_toggled.is_empty());
        assert_eq!(params.level, ComplexityLevel::Intermediate);
        assert!((orchestrator.camera().distance() - CameraRig::new(Default::default()).distance()).abs() < 1e-4);
        assert!(orchestrator.annotations().is_visited("mitral-valve"));
        assert!(orchestrator.annotations().selected().is_none());
        assert!(orchestrator.drain_events().contains(&ViewerEvent::ViewReset));

        let frame = orchestrator.tick(0.016);
        assert!(mesh_visibility(&frame).iter().all(|(_, visible)| *visible));
    }

    #[test]
    fn test_scale_bounds() {
        let (mut orchestrator, _) = orchestrator_with(MemorySource::new());
        orchestrator.zoom_in();
        assert!((orchestrator.params().scale - 1.2).abs() < 1e-6);
        for _ in 0..50 {
            orchestrator.zoom_in();
        }
        assert_eq!(orchestrator.params().scale, 5.0);
        for _ in 0..50 {
            orchestrator.zoom_out();
        }
        assert_eq!(orchestrator.params().scale, 0.1);
        orchestrator.set_scale(-2.0);
        assert_eq!(orchestrator.params().scale, 0.1);
    }

    #[test]
    fn test_tick_recomputes_clip_plane() {
        let (mut orchestrator, _) = orchestrator_with(MemorySource::new());
        let frame = orchestrator.tick(0.016);
        assert!(!frame.clip.enabled);
        assert_eq!(frame.clip.constant, -2.5);

        orchestrator.set_slice(100.0);
        let frame = orchestrator.tick(0.016);
        assert!(frame.clip.enabled);
        assert_eq!(frame.clip.constant, 2.5);
        assert_eq!(frame.sequence, 2);
    }

    #[test]
    fn test_auto_rotate() {
        let (mut orchestrator, _) = orchestrator_with(MemorySource::new());
        orchestrator.tick(1.0);
        assert_eq!(orchestrator.frame().model_yaw, 0.0);

        orchestrator.set_auto_rotate(true);
        let frame = orchestrator.tick(1.0);
        assert!((frame.model_yaw - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_animated_model_still_loads() {
        let (mut orchestrator, _) = orchestrator_with(MemorySource::new());
        let ticket = orchestrator.select_model("heart").unwrap();
        let mut asset = crate::asset::parse_gltf(&ticket.locator, &kidney_fixture()).unwrap();
        asset.animation_names.push("Heartbeat".to_string());

        assert!(orchestrator.finish_load(&ticket, Ok(asset)));
        match orchestrator.status() {
            LoadStatus::Loaded { info, .. } => {
                assert!(info.has_animations);
                assert_eq!(info.animation_names, ["Heartbeat"]);
            }
            other => panic!("unexpected status {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_toggle_part_transparency() {
        let (mut orchestrator, _) = orchestrator_with(standard_source());
        orchestrator.load_model("kidney").await.unwrap();
        assert_eq!(
            orchestrator.part_ids().into_iter().collect::<Vec<_>>(),
            ["cortex", "medulla", "renal-artery"]
        );

        orchestrator.toggle_part_transparency("medulla");
        let view = orchestrator.view().unwrap();
        assert_eq!(view.material_for("medulla").unwrap().opacity, 0.3);
        assert!(!view.material_for("cortex").unwrap().transparent);

        orchestrator.toggle_part_transparency("medulla");
        assert!(!orchestrator.view().unwrap().material_for("medulla").unwrap().transparent);
    }
}
