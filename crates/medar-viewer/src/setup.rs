//! Assembly of the orchestrator from configuration

use anyhow::{Context, Result};
use medar_core::{AssetLoader, LocatorSource, ModelCatalog, SceneOrchestrator, ViewerConfig};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Catalog named by the configuration, or the built-in one
pub fn load_catalog(config: &ViewerConfig) -> Result<ModelCatalog> {
    let catalog = match &config.assets.catalog {
        Some(path) => ModelCatalog::from_file(path)
            .with_context(|| format!("loading catalog {}", path.display()))?,
        None => ModelCatalog::builtin().context("loading built-in catalog")?,
    };
    info!(models = catalog.models.len(), version = %catalog.version, "Catalog ready");
    Ok(catalog)
}

pub fn build_orchestrator(config: ViewerConfig) -> Result<SceneOrchestrator> {
    let catalog = load_catalog(&config)?;
    let source = LocatorSource::new(Duration::from_secs(config.assets.http_timeout_secs))
        .context("creating HTTP client")?;
    let loader = AssetLoader::new(Arc::new(source));
    Ok(SceneOrchestrator::new(config, Arc::new(catalog), loader))
}
