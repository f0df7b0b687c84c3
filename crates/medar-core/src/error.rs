//! Error taxonomy for the viewer core
//!
//! None of these are fatal to the host. Load failures degrade to the
//! placeholder visual, unknown annotations are reported back to the caller,
//! and undriven animations are only logged.

use thiserror::Error;

use crate::annotation::ComplexityLevel;

/// Fetching or decoding a model asset failed.
///
/// `Clone` so a single coalesced fetch can hand the same outcome to every
/// caller waiting on it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssetLoadError {
    #[error("Failed to fetch {locator}: {reason}")]
    Fetch { locator: String, reason: String },
    #[error("Failed to read {locator}: {reason}")]
    Io { locator: String, reason: String },
    #[error("Failed to parse {locator} as glTF: {reason}")]
    Parse { locator: String, reason: String },
}

impl AssetLoadError {
    pub fn locator(&self) -> &str {
        match self {
            Self::Fetch { locator, .. } | Self::Io { locator, .. } | Self::Parse { locator, .. } => {
                locator
            }
        }
    }
}

/// An annotation id that is not authored for the active model/level.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown annotation '{id}' for model {model:?} at level {level}")]
pub struct UnknownAnnotationError {
    pub id: String,
    pub model: Option<String>,
    pub level: ComplexityLevel,
}

/// The model carries animation clips the viewer does not play.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Model {model} has {} animation(s) that will stay static: {names:?}", names.len())]
pub struct UnsupportedAnimationError {
    pub model: String,
    pub names: Vec<String>,
}

/// Errors surfaced by [`crate::SceneOrchestrator`] commands
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ViewerError {
    #[error("Unknown model: {0}")]
    UnknownModel(String),
    #[error("Model {model} has no annotations at level {level}")]
    LevelUnavailable {
        model: String,
        level: ComplexityLevel,
    },
    #[error(transparent)]
    Annotation(#[from] UnknownAnnotationError),
    #[error(transparent)]
    Load(#[from] AssetLoadError),
}
