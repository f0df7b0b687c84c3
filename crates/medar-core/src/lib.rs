//! MedAR Core - GPU-free anatomy viewer core
//!
//! This crate holds everything the interactive anatomy viewer needs that does
//! not touch a graphics context:
//! - Asset loading with a process-wide, coalescing model cache
//! - Per-mesh material derivation (isolation, transparency, cross-section)
//! - Orbit camera rig with damping, nudging and distance bounds
//! - Annotation registry with selection and visited-progress tracking
//! - The scene orchestrator that composes the above into per-tick frames

pub mod annotation;
pub mod asset;
pub mod camera;
pub mod catalog;
pub mod config;
pub mod error;
pub mod loader;
pub mod material;
pub mod orchestrator;
pub mod placeholder;
pub mod view;

#[cfg(test)]
pub(crate) mod test_support;

pub use annotation::{
    Annotation, AnnotationChange, AnnotationKind, AnnotationRegistry, ComplexityLevel, Selection,
};
pub use asset::{parse_gltf, Bounds, GeometryHandle, MeshDescriptor, ModelAsset, ModelInfo};
pub use camera::{CameraPose, CameraRig, NudgeDirection};
pub use catalog::{CatalogError, ModelCatalog, ModelEntry};
pub use config::{AssetsConfig, CameraConfig, ConfigError, ModelConfig, ViewerConfig, WindowConfig};
pub use error::{AssetLoadError, UnknownAnnotationError, UnsupportedAnimationError, ViewerError};
pub use loader::{is_remote_locator, AssetLoader, AssetSource, FileSource, HttpSource, LocatorSource};
pub use material::{clip_offset, derive_material_state, ClipPlane, MaterialController, MaterialState};
pub use orchestrator::{
    AnnotationMarker, Frame, FrameContent, LoadStatus, LoadTicket, MeshFrame, SceneOrchestrator,
    ViewerEvent,
};
pub use placeholder::{parse_hex_color, placeholder_heart, PlaceholderPrimitive, PlaceholderShape};
pub use view::{ViewInstance, ViewParams};
