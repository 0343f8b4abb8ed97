#![allow(dead_code)]

pub mod mock_providers;
pub mod mock_token_source;

pub use mock_providers::{DelayedProvider, FailingProvider, GatedProvider, PanickingProvider};
pub use mock_token_source::{ScriptedTokenSource, ScriptedTurn};

use advisor_host::{ClientEvent, EventKind};
use tokio::sync::mpsc;

/// Drain every event the emitter sent. The emitter must already be dropped.
pub async fn collect_events(mut rx: mpsc::Receiver<ClientEvent>) -> Vec<ClientEvent> {
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    events
}

pub fn kinds(events: &[ClientEvent]) -> Vec<EventKind> {
    events.iter().map(|e| e.kind).collect()
}
