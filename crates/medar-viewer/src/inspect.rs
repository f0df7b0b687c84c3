//! Headless model inspection for `--inspect`

use anyhow::{bail, Context, Result};
use medar_core::{ComplexityLevel, LoadStatus, ModelInfo, SceneOrchestrator};
use std::fmt;

/// Summary of one catalog model
#[derive(Debug)]
pub struct InspectReport {
    pub model_id: String,
    pub label: String,
    pub locator: String,
    pub info: ModelInfo,
    /// Annotation count for each level the model authors
    pub annotations: Vec<(ComplexityLevel, usize)>,
    pub parts: Vec<String>,
}

impl fmt::Display for InspectReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let info = &self.info;
        writeln!(f, "{} ({})", self.label, self.model_id)?;
        writeln!(f, "  Locator:    {}", self.locator)?;
        writeln!(f, "  Size:       {} bytes", info.byte_size)?;
        writeln!(f, "  SHA-256:    {}", info.sha256)?;
        writeln!(f, "  Meshes:     {}", info.mesh_count)?;
        writeln!(f, "  Vertices:   {}", info.vertex_count)?;
        writeln!(f, "  Triangles:  {}", info.triangle_count)?;
        writeln!(f, "  Materials:  {}", info.material_count)?;
        if let Some(bounds) = &info.bounds {
            let size = bounds.size();
            writeln!(f, "  Extent:     {:.3} x {:.3} x {:.3}", size.x, size.y, size.z)?;
        }
        if info.has_animations {
            writeln!(
                f,
                "  Animations: {} (not played)",
                info.animation_names.join(", ")
            )?;
        }
        for (level, count) in &self.annotations {
            writeln!(f, "  Annotations at {level}: {count}")?;
        }
        if !self.parts.is_empty() {
            writeln!(f, "  Parts:      {}", self.parts.join(", "))?;
        }
        Ok(())
    }
}

/// Load a model through the cache and summarise it. Load failures are
/// errors here rather than a placeholder.
pub async fn inspect(mut viewer: SceneOrchestrator, model_id: &str) -> Result<InspectReport> {
    viewer
        .load_model(model_id)
        .await
        .with_context(|| format!("loading model '{model_id}'"))?;

    let LoadStatus::Loaded { info, .. } = viewer.status().clone() else {
        bail!("model '{model_id}' did not finish loading");
    };
    let Some(entry) = viewer.active_entry() else {
        bail!("model '{model_id}' is not in the catalog");
    };

    let annotations = ComplexityLevel::ALL
        .into_iter()
        .filter(|level| entry.supports_level(*level))
        .map(|level| (level, viewer.annotations().list_for(model_id, level).len()))
        .collect();

    Ok(InspectReport {
        model_id: model_id.to_string(),
        label: entry.label.clone(),
        locator: viewer
            .catalog()
            .locator_for(model_id, &viewer.config().assets.base)?,
        info,
        annotations,
        parts: viewer.part_ids().into_iter().collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setup::build_orchestrator;
    use medar_core::ViewerConfig;
    use std::path::Path;
    use tempfile::TempDir;

    const TINY_GLTF: &str = r#"{
  "asset": { "version": "2.0" },
  "scene": 0,
  "scenes": [{ "nodes": [0, 1] }],
  "nodes": [
    { "name": "Object_2", "mesh": 0, "extras": { "partId": "femur-head" } },
    { "name": "shaft", "mesh": 0 }
  ],
  "meshes": [{ "name": "bone", "primitives": [{ "attributes": { "POSITION": 0 } }] }],
  "accessors": [{
    "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
    "min": [0, 0, 0], "max": [1, 1, 0]
  }],
  "bufferViews": [{ "buffer": 0, "byteLength": 36 }],
  "buffers": [{
    "byteLength": 36,
    "uri": "data:application/octet-stream;base64,AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA"
  }]
}"#;

    const CATALOG: &str = r#"
[[model]]
id = "femur"
label = "Femur"
locator = "femur.gltf"
levels = ["basic", "intermediate"]

[[model.annotation]]
id = "femoral-head"
type = "muscle"
title = "Femoral Head"
description = "Ball of the hip joint."
position = [0.0, 1.0, 0.0]
levels = ["basic", "intermediate"]

[[model.annotation]]
id = "greater-trochanter"
type = "muscle"
title = "Greater Trochanter"
description = "Attachment for the gluteal muscles."
position = [0.3, 0.8, 0.0]
levels = ["intermediate"]

[[model]]
id = "missing"
label = "Missing"
locator = "missing.gltf"
"#;

    fn config_in(dir: &Path) -> ViewerConfig {
        std::fs::write(dir.join("femur.gltf"), TINY_GLTF).unwrap();
        std::fs::write(dir.join("catalog.toml"), CATALOG).unwrap();
        let mut config = ViewerConfig::default();
        config.assets.base = dir.to_string_lossy().into_owned();
        config.assets.catalog = Some(dir.join("catalog.toml"));
        config
    }

    #[tokio::test]
    async fn test_inspect_reports_model() {
        let dir = TempDir::new().unwrap();
        let viewer = build_orchestrator(config_in(dir.path())).unwrap();

        let report = inspect(viewer, "femur").await.unwrap();
        assert_eq!(report.label, "Femur");
        assert_eq!(report.info.mesh_count, 2);
        assert_eq!(report.info.triangle_count, 2);
        assert_eq!(
            report.annotations,
            [(ComplexityLevel::Basic, 1), (ComplexityLevel::Intermediate, 2)]
        );
        assert_eq!(report.parts, ["femur-head", "shaft"]);

        let text = report.to_string();
        assert!(text.starts_with("Femur (femur)"));
        assert!(text.contains("Annotations at intermediate: 2"));
    }

    #[tokio::test]
    async fn test_inspect_fails_on_missing_file() {
        let dir = TempDir::new().unwrap();
        let viewer = build_orchestrator(config_in(dir.path())).unwrap();
        let err = inspect(viewer, "missing").await.unwrap_err();
        assert!(err.to_string().contains("missing"));
    }

    #[tokio::test]
    async fn test_inspect_fails_on_unknown_model() {
        let dir = TempDir::new().unwrap();
        let viewer = build_orchestrator(config_in(dir.path())).unwrap();
        assert!(inspect(viewer, "spleen").await.is_err());
    }
}
