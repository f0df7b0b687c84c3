//! In-memory glTF fixtures for unit tests

use futures::future::{BoxFuture, FutureExt};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::error::AssetLoadError;
use crate::loader::AssetSource;

/// In-memory asset source that counts fetches and yields before answering
#[derive(Default)]
pub struct MemorySource {
    files: HashMap<String, Vec<u8>>,
    fetches: AtomicUsize,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, locator: &str, bytes: Vec<u8>) -> Self {
        self.files.insert(locator.to_string(), bytes);
        self
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl AssetSource for MemorySource {
    fn fetch<'a>(&'a self, locator: &'a str) -> BoxFuture<'a, Result<Vec<u8>, AssetLoadError>> {
        async move {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.files.get(locator).cloned().ok_or_else(|| AssetLoadError::Fetch {
                locator: locator.to_string(),
                reason: "HTTP 404 Not Found".to_string(),
            })
        }
        .boxed()
    }
}

/// One node of a fixture document
pub struct Part {
    pub name: &'static str,
    pub part_id: Option<&'static str>,
}

impl Part {
    pub fn named(name: &'static str) -> Self {
        Self { name, part_id: None }
    }

    pub fn tagged(name: &'static str, part_id: &'static str) -> Self {
        Self {
            name,
            part_id: Some(part_id),
        }
    }
}

/// Build a glTF JSON document with one single-triangle mesh per part.
///
/// Node `i` is translated by `(i, 0, 0)` and uses material `i % 2`. All
/// meshes share one position accessor spanning `(0,0,0)..(1,1,0)`.
pub fn gltf_fixture(parts: &[Part]) -> Vec<u8> {
    let nodes: Vec<Value> = parts
        .iter()
        .enumerate()
        .map(|(i, part)| {
            let mut node = json!({
                "name": part.name,
                "mesh": i,
                "translation": [i as f32, 0.0, 0.0],
            });
            if let Some(part_id) = part.part_id {
                node["extras"] = json!({ "partId": part_id });
            }
            node
        })
        .collect();

    let meshes: Vec<Value> = parts
        .iter()
        .enumerate()
        .map(|(i, part)| {
            json!({
                "name": format!("{}-mesh", part.name),
                "primitives": [{ "attributes": { "POSITION": 0 }, "material": i % 2 }],
            })
        })
        .collect();

    let document = json!({
        "asset": { "version": "2.0" },
        "scene": 0,
        "scenes": [{ "nodes": (0..parts.len()).collect::<Vec<_>>() }],
        "nodes": nodes,
        "meshes": meshes,
        "materials": [{ "name": "tissue" }, { "name": "vessel" }],
        "accessors": [{
            "bufferView": 0,
            "componentType": 5126,
            "count": 3,
            "type": "VEC3",
            "min": [0.0, 0.0, 0.0],
            "max": [1.0, 1.0, 0.0],
        }],
        "bufferViews": [{ "buffer": 0, "byteLength": 36 }],
        "buffers": [{
            "byteLength": 36,
            "uri": format!("data:application/octet-stream;base64,{}", "A".repeat(48)),
        }],
    });

    serde_json::to_vec(&document).unwrap_or_default()
}

/// Kidney-like fixture used by loader and orchestrator tests
pub fn kidney_fixture() -> Vec<u8> {
    gltf_fixture(&[
        Part::named("cortex"),
        Part::named("medulla"),
        Part::tagged("Object_3", "renal-artery"),
    ])
}
