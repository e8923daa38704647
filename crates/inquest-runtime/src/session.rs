//! Session registry and lifecycle
//!
//! One session per investigation: a spawned engine loop, a command queue,
//! a snapshot broadcast, and a safety deadline. The deadline exists so an
//! upstream that dies without a terminal frame cannot pin a half-finished
//! graph forever — when it fires, the session is terminated exactly as if
//! a timeout frame had arrived, and the rendered state stays available.

use crate::queue::{EngineLoop, SessionHandle};
use dashmap::DashMap;
use inquest_core::{EngineConfig, Result, RuntimeConfig};
use inquest_graph::GraphEngine;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub struct SessionRegistry {
    sessions: DashMap<String, SessionHandle>,
    engine_config: EngineConfig,
    runtime_config: RuntimeConfig,
}

impl SessionRegistry {
    pub fn new(engine_config: EngineConfig, runtime_config: RuntimeConfig) -> Self {
        Self {
            sessions: DashMap::new(),
            engine_config,
            runtime_config,
        }
    }

    /// Get the session for an investigation id, spawning its engine loop
    /// and safety timer on first use.
    pub fn open(&self, id: impl Into<String>) -> Result<SessionHandle> {
        let id = id.into();
        if let Some(existing) = self.sessions.get(&id) {
            return Ok(existing.clone());
        }

        let engine = GraphEngine::new(self.engine_config.clone())?;
        let (command_tx, command_rx) = mpsc::channel(self.runtime_config.queue_depth);
        let (snapshot_tx, _) = broadcast::channel(self.runtime_config.snapshot_buffer);
        let cancel = CancellationToken::new();

        let handle = SessionHandle::new(id.clone(), command_tx, snapshot_tx.clone(), cancel.clone());
        let engine_loop = EngineLoop::new(engine, command_rx, snapshot_tx, cancel);
        tokio::spawn(engine_loop.run());
        self.spawn_safety_timer(&handle);

        info!(session = %id, "session opened");
        self.sessions.insert(id, handle.clone());
        Ok(handle)
    }

    fn spawn_safety_timer(&self, handle: &SessionHandle) {
        let timeout = Duration::from_secs(self.runtime_config.safety_timeout_secs);
        let cancel = handle.cancel_token();
        let session = handle.id().to_string();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(timeout) => {
                    warn!(session = %session, timeout_secs = timeout.as_secs(),
                          "safety timeout reached, terminating session");
                    cancel.cancel();
                }
            }
        });
    }

    pub fn get(&self, id: &str) -> Option<SessionHandle> {
        self.sessions.get(id).map(|entry| entry.clone())
    }

    pub fn list(&self) -> Vec<String> {
        self.sessions.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Tear a session down entirely and forget it.
    pub async fn close(&self, id: &str) -> bool {
        match self.sessions.remove(id) {
            Some((_, handle)) => {
                let _ = handle.shutdown().await;
                info!(session = %id, "session closed");
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use inquest_core::{NodeKind, NodeRecord, NodeStatus, UpdateFrame};

    fn frame(id: &str, parent: Option<&str>) -> UpdateFrame {
        UpdateFrame::node_created(
            "inv-1",
            NodeRecord {
                id: id.into(),
                kind: NodeKind::Analysis,
                label: format!("News scan {id}"),
                description: String::new(),
                status: NodeStatus::Completed,
                data: serde_json::json!({}),
                parent_id: parent.map(Into::into),
                children_ids: Vec::new(),
                created_at: Utc::now(),
                completed_at: None,
            },
        )
    }

    fn registry(timeout_secs: u64) -> SessionRegistry {
        let runtime = RuntimeConfig {
            safety_timeout_secs: timeout_secs,
            ..RuntimeConfig::default()
        };
        SessionRegistry::new(EngineConfig::default(), runtime)
    }

    #[tokio::test]
    async fn open_is_idempotent_per_id() {
        let registry = registry(120);
        let a = registry.open("inv-1").unwrap();
        let b = registry.open("inv-1").unwrap();
        assert_eq!(a.id(), b.id());
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn ingested_frames_surface_in_snapshots() {
        let registry = registry(120);
        let handle = registry.open("inv-1").unwrap();
        let mut rx = handle.subscribe();

        handle.ingest(frame("root", None)).await.unwrap();
        let snapshot = rx.recv().await.unwrap();
        assert_eq!(snapshot.nodes.len(), 1);
        assert_eq!(snapshot.positions.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn safety_timeout_terminates_but_keeps_state() {
        let registry = registry(5);
        let handle = registry.open("inv-1").unwrap();
        let mut rx = handle.subscribe();
        handle.ingest(frame("root", None)).await.unwrap();
        let first = rx.recv().await.unwrap();
        assert!(!first.terminated);

        // Paused clock: the sleep in the safety timer auto-advances.
        let terminated = loop {
            match rx.recv().await {
                Ok(snapshot) if snapshot.terminated => break snapshot,
                Ok(_) => continue,
                Err(e) => panic!("snapshot stream ended early: {e}"),
            }
        };
        assert_eq!(terminated.nodes.len(), 1, "state survives the timeout");
    }

    #[tokio::test]
    async fn close_removes_the_session() {
        let registry = registry(120);
        let handle = registry.open("inv-1").unwrap();
        assert!(registry.close("inv-1").await);
        assert!(registry.get("inv-1").is_none());
        // The loop drains its queue and exits; once it has, commands fail
        // cleanly instead of piling up.
        let mut attempts = 0;
        while handle.ingest(frame("x", None)).await.is_ok() {
            attempts += 1;
            assert!(attempts < 1000, "engine loop never shut down");
            tokio::task::yield_now().await;
        }
    }
}
