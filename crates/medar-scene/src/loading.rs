//! Bridge between the frame loop and asynchronous model fetches
//!
//! Model requests are turned into load tickets on the main thread, fetched on
//! a Tokio runtime, and handed back through a shared slot that is polled once
//! per frame. The orchestrator drops results whose ticket went stale while the
//! fetch was in flight.

use bevy::prelude::*;
use medar_core::{AssetLoadError, LoadTicket, ModelAsset};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, warn};

use crate::{ViewerSet, ViewerState};

/// Handle of the runtime that runs asset fetches
#[derive(Resource, Clone)]
pub struct AsyncRuntime(pub tokio::runtime::Handle);

type LoadSlot = Arc<Mutex<Option<Result<ModelAsset, AssetLoadError>>>>;

struct InFlightLoad {
    ticket: LoadTicket,
    slot: LoadSlot,
}

/// Pending model requests and in-flight fetches
#[derive(Resource, Default)]
pub struct LoadBridge {
    requests: Vec<String>,
    in_flight: Vec<InFlightLoad>,
}

impl LoadBridge {
    /// Queue a model for loading on the next frame
    pub fn request(&mut self, model_id: impl Into<String>) {
        self.requests.push(model_id.into());
    }

    /// Requests not yet turned into loads
    pub fn pending(&self) -> &[String] {
        &self.requests
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }
}

pub struct LoadingPlugin;

impl Plugin for LoadingPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<LoadBridge>()
            .add_systems(Startup, preload_models)
            .add_systems(
                Update,
                (start_requested_loads, poll_pending_loads)
                    .chain()
                    .in_set(ViewerSet::Input),
            );
    }
}

fn preload_models(viewer: Res<ViewerState>, runtime: Res<AsyncRuntime>) {
    let _guard = runtime.0.enter();
    let scheduled = viewer.preload_configured();
    debug!(scheduled, "Scheduled model preloads");
}

fn start_requested_loads(
    mut bridge: ResMut<LoadBridge>,
    mut viewer: ResMut<ViewerState>,
    runtime: Res<AsyncRuntime>,
) {
    let requests = std::mem::take(&mut bridge.requests);
    for model_id in requests {
        let ticket = match viewer.select_model(&model_id) {
            Ok(ticket) => ticket,
            Err(e) => {
                warn!(model = %model_id, error = %e, "Ignoring model request");
                continue;
            }
        };

        let slot: LoadSlot = Arc::new(Mutex::new(None));
        let out = Arc::clone(&slot);
        let loader = viewer.loader().clone();
        let locator = ticket.locator.clone();
        runtime.0.spawn(async move {
            let result = loader.load(&locator).await;
            *out.lock().unwrap_or_else(PoisonError::into_inner) = Some(result);
        });

        bridge.in_flight.push(InFlightLoad { ticket, slot });
    }
}

fn poll_pending_loads(mut bridge: ResMut<LoadBridge>, mut viewer: ResMut<ViewerState>) {
    bridge.in_flight.retain(|load| {
        let result = match load.slot.try_lock() {
            Ok(mut slot) => slot.take(),
            Err(_) => None,
        };
        match result {
            Some(result) => {
                viewer.finish_load(&load.ticket, result);
                false
            }
            None => true,
        }
    });
}
