//! Annotation points of interest, complexity levels, and the selection /
//! visited-progress state machine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

use crate::catalog::ModelCatalog;
use crate::error::UnknownAnnotationError;

/// Fixed three-point scale of annotation detail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComplexityLevel {
    Basic,
    Intermediate,
    Advanced,
}

impl ComplexityLevel {
    pub const ALL: [ComplexityLevel; 3] = [Self::Basic, Self::Intermediate, Self::Advanced];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Intermediate => "intermediate",
            Self::Advanced => "advanced",
        }
    }
}

impl Default for ComplexityLevel {
    fn default() -> Self {
        Self::Basic
    }
}

impl fmt::Display for ComplexityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComplexityLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "basic" => Ok(Self::Basic),
            "intermediate" => Ok(Self::Intermediate),
            "advanced" => Ok(Self::Advanced),
            other => Err(format!("unknown complexity level: {}", other)),
        }
    }
}

/// Semantic type of an annotation marker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnotationKind {
    Chamber,
    Valve,
    Vessel,
    Muscle,
}

impl AnnotationKind {
    /// Marker colour as sRGB hex
    pub fn marker_color(&self) -> &'static str {
        match self {
            Self::Chamber => "#ef4444",
            Self::Valve => "#22c55e",
            Self::Vessel => "#3b82f6",
            Self::Muscle => "#eab308",
        }
    }
}

/// A point of interest on a model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: AnnotationKind,
    pub title: String,
    pub description: String,
    /// Longer text shown in the detail panel
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detailed_info: Option<String>,
    /// Overrides the per-kind marker colour
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Model-space position
    pub position: [f32; 3],
    /// Levels this annotation is shown at
    #[serde(default = "all_levels")]
    pub levels: Vec<ComplexityLevel>,
}

fn all_levels() -> Vec<ComplexityLevel> {
    ComplexityLevel::ALL.to_vec()
}

impl Annotation {
    pub fn applies_to(&self, level: ComplexityLevel) -> bool {
        self.levels.contains(&level)
    }

    pub fn marker_color(&self) -> &str {
        self.color.as_deref().unwrap_or_else(|| self.kind.marker_color())
    }
}

/// Selection state: at most one annotation is selected
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Selection {
    #[default]
    NoneSelected,
    Selected(String),
}

impl Selection {
    pub fn id(&self) -> Option<&str> {
        match self {
            Self::NoneSelected => None,
            Self::Selected(id) => Some(id),
        }
    }
}

/// Change notification observed by the host
#[derive(Debug, Clone, PartialEq)]
pub enum AnnotationChange {
    Selected(Option<String>),
    Visited { id: String, progress: f32 },
}

/// Holds the authored annotations and tracks selection and visited state for
/// the active model
#[derive(Debug, Clone)]
pub struct AnnotationRegistry {
    catalog: Arc<ModelCatalog>,
    active_model: Option<String>,
    level: ComplexityLevel,
    selection: Selection,
    /// Visited ids with the time of the first visit. Only grows within a session.
    visited: HashMap<String, DateTime<Utc>>,
    changes: Vec<AnnotationChange>,
}

impl AnnotationRegistry {
    pub fn new(catalog: Arc<ModelCatalog>) -> Self {
        Self {
            catalog,
            active_model: None,
            level: ComplexityLevel::default(),
            selection: Selection::default(),
            visited: HashMap::new(),
            changes: Vec::new(),
        }
    }

    /// Annotations of `model_id` shown at `level`, in declaration order
    pub fn list_for(&self, model_id: &str, level: ComplexityLevel) -> Vec<&Annotation> {
        self.catalog
            .get(model_id)
            .map(|model| {
                model
                    .annotations
                    .iter()
                    .filter(|a| a.applies_to(level))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Annotations applicable to the active model and level
    pub fn applicable(&self) -> Vec<&Annotation> {
        match &self.active_model {
            Some(model) => self.list_for(model, self.level),
            None => Vec::new(),
        }
    }

    pub fn active_model(&self) -> Option<&str> {
        self.active_model.as_deref()
    }

    pub fn level(&self) -> ComplexityLevel {
        self.level
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn selected(&self) -> Option<&Annotation> {
        let id = self.selection.id()?;
        self.applicable().into_iter().find(|a| a.id == id)
    }

    /// Switch to a model and level. Changing the model starts a new session.
    pub fn activate(&mut self, model_id: Option<&str>, level: ComplexityLevel) {
        if self.active_model.as_deref() != model_id {
            self.reset_session();
            self.active_model = model_id.map(str::to_string);
        }
        self.set_level(level);
    }

    /// Change the level. A selection not shown at the new level is cleared.
    pub fn set_level(&mut self, level: ComplexityLevel) {
        self.level = level;
        if let Some(id) = self.selection.id() {
            let still_shown = self.applicable().iter().any(|a| a.id == id);
            if !still_shown {
                self.set_selection(Selection::NoneSelected);
            }
        }
    }

    /// `None` always succeeds; `Some(id)` requires an annotation of the
    /// active model at the active level.
    pub fn select(&mut self, id: Option<&str>) -> Result<(), UnknownAnnotationError> {
        let next = match id {
            None => Selection::NoneSelected,
            Some(id) => {
                if !self.applicable().iter().any(|a| a.id == id) {
                    return Err(self.unknown(id));
                }
                Selection::Selected(id.to_string())
            }
        };
        self.set_selection(next);
        Ok(())
    }

    /// Record a visit. Returns `Ok(false)` if the id was already visited.
    pub fn mark_visited(&mut self, id: &str) -> Result<bool, UnknownAnnotationError> {
        let known = self
            .active_model
            .as_deref()
            .and_then(|model| self.catalog.get(model))
            .map(|model| model.annotations.iter().any(|a| a.id == id))
            .unwrap_or(false);
        if !known {
            return Err(self.unknown(id));
        }
        if self.visited.contains_key(id) {
            return Ok(false);
        }

        self.visited.insert(id.to_string(), Utc::now());
        let progress = self.current_progress();
        debug!(annotation = %id, progress, "Annotation visited");
        self.changes.push(AnnotationChange::Visited {
            id: id.to_string(),
            progress,
        });
        Ok(true)
    }

    pub fn is_visited(&self, id: &str) -> bool {
        self.visited.contains_key(id)
    }

    pub fn visited_at(&self, id: &str) -> Option<DateTime<Utc>> {
        self.visited.get(id).copied()
    }

    /// Number of visited annotations shown at the active level
    pub fn visited_count(&self) -> usize {
        self.applicable()
            .iter()
            .filter(|a| self.visited.contains_key(&a.id))
            .count()
    }

    /// Fraction of `model_id`'s annotations at `level` visited this session.
    /// Always within `[0, 1]`; 0 for a model that is not active.
    pub fn progress(&self, model_id: &str, level: ComplexityLevel) -> f32 {
        if self.active_model.as_deref() != Some(model_id) {
            return 0.0;
        }
        let applicable = self.list_for(model_id, level);
        if applicable.is_empty() {
            return 0.0;
        }
        let visited = applicable
            .iter()
            .filter(|a| self.visited.contains_key(&a.id))
            .count();
        visited as f32 / applicable.len() as f32
    }

    pub fn current_progress(&self) -> f32 {
        match &self.active_model {
            Some(model) => self.progress(model, self.level),
            None => 0.0,
        }
    }

    /// Clear selection and visited state
    pub fn reset_session(&mut self) {
        self.set_selection(Selection::NoneSelected);
        self.visited.clear();
    }

    /// Drain pending change notifications
    pub fn take_changes(&mut self) -> Vec<AnnotationChange> {
        std::mem::take(&mut self.changes)
    }

    fn set_selection(&mut self, next: Selection) {
        if self.selection != next {
            self.changes
                .push(AnnotationChange::Selected(next.id().map(str::to_string)));
            self.selection = next;
        }
    }

    fn unknown(&self, id: &str) -> UnknownAnnotationError {
        UnknownAnnotationError {
            id: id.to_string(),
            model: self.active_model.clone(),
            level: self.level,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> AnnotationRegistry {
        AnnotationRegistry::new(Arc::new(ModelCatalog::builtin().unwrap()))
    }

    #[test]
    fn test_level_parsing() {
        assert_eq!("Advanced".parse::<ComplexityLevel>(), Ok(ComplexityLevel::Advanced));
        assert!("expert".parse::<ComplexityLevel>().is_err());
        assert_eq!(ComplexityLevel::Intermediate.to_string(), "intermediate");
    }

    #[test]
    fn test_list_for_declaration_order() {
        let reg = registry();
        let ids: Vec<_> = reg
            .list_for("heart", ComplexityLevel::Basic)
            .iter()
            .map(|a| a.id.as_str())
            .collect();
        assert_eq!(
            ids,
            ["left-atrium", "right-atrium", "left-ventricle", "right-ventricle"]
        );
        assert_eq!(reg.list_for("heart", ComplexityLevel::Intermediate).len(), 6);
        assert_eq!(reg.list_for("heart", ComplexityLevel::Advanced).len(), 9);
        assert!(reg.list_for("unknown", ComplexityLevel::Basic).is_empty());
    }

    #[test]
    fn test_select_state_machine() {
        let mut reg = registry();
        reg.activate(Some("heart"), ComplexityLevel::Basic);

        reg.select(Some("left-atrium")).unwrap();
        assert_eq!(reg.selection(), &Selection::Selected("left-atrium".to_string()));

        // Valves are not shown at basic
        let err = reg.select(Some("mitral-valve")).unwrap_err();
        assert_eq!(err.id, "mitral-valve");
        assert_eq!(err.level, ComplexityLevel::Basic);
        // Failed select leaves the selection alone
        assert_eq!(reg.selection().id(), Some("left-atrium"));

        reg.select(None).unwrap();
        assert_eq!(reg.selection(), &Selection::NoneSelected);
    }

    #[test]
    fn test_select_without_active_model() {
        let mut reg = registry();
        assert!(reg.select(Some("left-atrium")).is_err());
        assert!(reg.select(None).is_ok());
    }

    #[test]
    fn test_level_change_clears_hidden_selection() {
        let mut reg = registry();
        reg.activate(Some("heart"), ComplexityLevel::Advanced);
        reg.select(Some("aorta")).unwrap();
        reg.set_level(ComplexityLevel::Basic);
        assert_eq!(reg.selection(), &Selection::NoneSelected);

        reg.select(Some("left-atrium")).unwrap();
        reg.set_level(ComplexityLevel::Advanced);
        assert_eq!(reg.selection().id(), Some("left-atrium"));
    }

    #[test]
    fn test_mark_visited_idempotent() {
        let mut reg = registry();
        reg.activate(Some("heart"), ComplexityLevel::Basic);
        assert_eq!(reg.mark_visited("left-atrium"), Ok(true));
        assert_eq!(reg.mark_visited("left-atrium"), Ok(false));
        assert!(reg.is_visited("left-atrium"));
        assert!(reg.visited_at("left-atrium").is_some());
        assert!(reg.mark_visited("no-such-thing").is_err());
    }

    #[test]
    fn test_progress_monotonic_and_bounded() {
        let mut reg = registry();
        reg.activate(Some("heart"), ComplexityLevel::Basic);
        let mut last = reg.progress("heart", ComplexityLevel::Basic);
        assert_eq!(last, 0.0);

        for id in ["left-atrium", "left-atrium", "right-atrium", "left-ventricle", "right-ventricle"] {
            reg.mark_visited(id).unwrap();
            let p = reg.progress("heart", ComplexityLevel::Basic);
            assert!(p >= last);
            assert!((0.0..=1.0).contains(&p));
            last = p;
        }
        assert_eq!(last, 1.0);
        // Visits carry over to the wider level
        assert!((reg.progress("heart", ComplexityLevel::Intermediate) - 4.0 / 6.0).abs() < 1e-6);
        // Other models report nothing
        assert_eq!(reg.progress("brain", ComplexityLevel::Basic), 0.0);
    }

    #[test]
    fn test_model_switch_resets_session() {
        let mut reg = registry();
        reg.activate(Some("heart"), ComplexityLevel::Basic);
        reg.select(Some("left-atrium")).unwrap();
        reg.mark_visited("left-atrium").unwrap();

        reg.activate(Some("kidney"), ComplexityLevel::Basic);
        assert_eq!(reg.selection(), &Selection::NoneSelected);
        assert!(!reg.is_visited("left-atrium"));
        assert_eq!(reg.progress("kidney", ComplexityLevel::Basic), 0.0);

        // Re-activating the same model keeps the session
        reg.mark_visited("renal-cortex").unwrap();
        reg.activate(Some("kidney"), ComplexityLevel::Basic);
        assert!(reg.is_visited("renal-cortex"));
    }

    #[test]
    fn test_change_notifications() {
        let mut reg = registry();
        reg.activate(Some("heart"), ComplexityLevel::Basic);
        reg.select(Some("left-atrium")).unwrap();
        reg.select(Some("left-atrium")).unwrap();
        reg.mark_visited("left-atrium").unwrap();

        let changes = reg.take_changes();
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0], AnnotationChange::Selected(Some("left-atrium".to_string())));
        assert_eq!(
            changes[1],
            AnnotationChange::Visited {
                id: "left-atrium".to_string(),
                progress: 0.25
            }
        );
        assert!(reg.take_changes().is_empty());
    }

    #[test]
    fn test_marker_color_override() {
        let reg = registry();
        let heart = reg.list_for("heart", ComplexityLevel::Advanced);
        let aorta = heart.iter().find(|a| a.id == "aorta").unwrap();
        assert_eq!(aorta.marker_color(), AnnotationKind::Vessel.marker_color());
    }
}
