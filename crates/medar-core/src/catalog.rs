//! Model catalog - maps model identifiers to asset locators and authored
//! annotation data
//!
//! The catalog is plain TOML. A built-in catalog covering the standard
//! anatomy set is compiled in; hosts may replace it with their own file.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

use crate::annotation::{Annotation, ComplexityLevel};

const BUILTIN_CATALOG: &str = include_str!("../catalog/anatomy.toml");

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Failed to read model catalog: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse model catalog: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Failed to serialize model catalog: {0}")]
    SerializeError(#[from] toml::ser::Error),
    #[error("Duplicate model id: {0}")]
    DuplicateModel(String),
    #[error("Duplicate annotation id {annotation} in model {model}")]
    DuplicateAnnotation { model: String, annotation: String },
    #[error("Unknown model: {0}")]
    UnknownModel(String),
}

/// A single anatomical model entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelEntry {
    /// Stable identifier (e.g., "heart")
    pub id: String,
    /// Human-readable name
    pub label: String,
    /// Asset locator, absolute URL/path or relative to the asset base
    pub locator: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Complexity levels this model authors annotations for
    #[serde(default = "default_levels")]
    pub levels: Vec<ComplexityLevel>,
    #[serde(default, rename = "annotation")]
    pub annotations: Vec<Annotation>,
}

fn default_levels() -> Vec<ComplexityLevel> {
    vec![ComplexityLevel::Basic]
}

impl ModelEntry {
    pub fn supports_level(&self, level: ComplexityLevel) -> bool {
        self.levels.contains(&level)
    }

    pub fn annotation(&self, id: &str) -> Option<&Annotation> {
        self.annotations.iter().find(|a| a.id == id)
    }
}

/// The model catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelCatalog {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default, rename = "model")]
    pub models: Vec<ModelEntry>,
}

fn default_version() -> String {
    "1.0".to_string()
}

impl Default for ModelCatalog {
    fn default() -> Self {
        Self {
            version: default_version(),
            models: Vec::new(),
        }
    }
}

impl ModelCatalog {
    /// The catalog shipped with the crate
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_toml(BUILTIN_CATALOG)
    }

    /// Load and validate a catalog from a TOML string
    pub fn from_toml(content: &str) -> Result<Self, CatalogError> {
        let catalog: ModelCatalog = toml::from_str(content)?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Load and validate a catalog from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, CatalogError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Save the catalog to a TOML file
    pub fn to_file(&self, path: &Path) -> Result<(), CatalogError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Model ids must be unique, and annotation ids unique within a model
    pub fn validate(&self) -> Result<(), CatalogError> {
        let mut model_ids = HashSet::new();
        for model in &self.models {
            if !model_ids.insert(model.id.as_str()) {
                return Err(CatalogError::DuplicateModel(model.id.clone()));
            }
            let mut annotation_ids = HashSet::new();
            for annotation in &model.annotations {
                if !annotation_ids.insert(annotation.id.as_str()) {
                    return Err(CatalogError::DuplicateAnnotation {
                        model: model.id.clone(),
                        annotation: annotation.id.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&ModelEntry> {
        self.models.iter().find(|m| m.id == id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.models.iter().map(|m| m.id.as_str())
    }

    /// Full locator for a model, joined onto `base` when relative
    pub fn locator_for(&self, id: &str, base: &str) -> Result<String, CatalogError> {
        self.get(id)
            .map(|m| resolve_locator(base, &m.locator))
            .ok_or_else(|| CatalogError::UnknownModel(id.to_string()))
    }
}

/// Join a relative locator onto a base. URLs and absolute paths pass through.
pub fn resolve_locator(base: &str, locator: &str) -> String {
    let is_url = locator.contains("://");
    if is_url || Path::new(locator).is_absolute() || base.is_empty() {
        return locator.to_string();
    }
    format!("{}/{}", base.trim_end_matches('/'), locator)
}
