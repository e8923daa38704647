//! Wire protocol: upstream update frames and user interaction commands

use crate::types::{NodeId, NodeRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Discriminant of an update frame.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UpdateKind {
    NodeCreated,
    NodeUpdated,
    NodeCompleted,
    InvestigationComplete,
    InvestigationError,
    InvestigationTimeout,
}

impl UpdateKind {
    /// Terminal frames stop ingestion for the session but leave current
    /// state renderable.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            UpdateKind::InvestigationComplete
                | UpdateKind::InvestigationError
                | UpdateKind::InvestigationTimeout
        )
    }
}

/// One frame of the ordered upstream stream. Node-bearing frames carry a
/// complete node record; terminal frames carry only a message.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UpdateFrame {
    #[serde(rename = "type")]
    pub kind: UpdateKind,
    pub investigation_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<NodeRecord>,
    #[serde(default)]
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl UpdateFrame {
    pub fn node_created(investigation_id: impl Into<String>, node: NodeRecord) -> Self {
        Self::with_node(UpdateKind::NodeCreated, investigation_id, node)
    }

    pub fn node_updated(investigation_id: impl Into<String>, node: NodeRecord) -> Self {
        Self::with_node(UpdateKind::NodeUpdated, investigation_id, node)
    }

    pub fn node_completed(investigation_id: impl Into<String>, node: NodeRecord) -> Self {
        Self::with_node(UpdateKind::NodeCompleted, investigation_id, node)
    }

    pub fn terminal(
        kind: UpdateKind,
        investigation_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            investigation_id: investigation_id.into(),
            node: None,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    fn with_node(kind: UpdateKind, investigation_id: impl Into<String>, node: NodeRecord) -> Self {
        Self {
            kind,
            investigation_id: investigation_id.into(),
            node: Some(node),
            message: String::new(),
            timestamp: Utc::now(),
        }
    }
}

/// A discrete user gesture against the presentation state. Interactions
/// touch only viewport/expansion state and never trigger data-layer
/// recomputation.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Interaction {
    Pan {
        dx: f64,
        dy: f64,
    },
    Zoom {
        factor: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        focal: Option<(f64, f64)>,
    },
    /// Capture a drag anchor; subsequent `DragMove`s are relative to it.
    DragStart {
        x: f64,
        y: f64,
    },
    DragMove {
        x: f64,
        y: f64,
    },
    DragEnd,
    ToggleExpand {
        id: NodeId,
    },
    ResetView,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn update_frame_parses_upstream_shape() {
        let frame: UpdateFrame = serde_json::from_value(json!({
            "type": "node_created",
            "investigation_id": "inv-1",
            "node": {
                "id": "n-1",
                "type": "data_fetch",
                "label": "Fetch ACME Price Data",
                "description": "Retrieved price data",
                "status": "completed",
                "data": {"symbol": "ACME", "start_price": 95.0, "end_price": 100.0,
                         "price_change_percent": 5.26},
                "created_at": "2026-08-07T12:00:00Z"
            },
            "message": "Created data fetch node",
            "timestamp": "2026-08-07T12:00:00Z"
        }))
        .unwrap();
        assert_eq!(frame.kind, UpdateKind::NodeCreated);
        assert!(!frame.kind.is_terminal());
        assert_eq!(frame.node.unwrap().id.as_str(), "n-1");
    }

    #[test]
    fn terminal_frames_need_no_node() {
        let frame: UpdateFrame = serde_json::from_value(json!({
            "type": "investigation_complete",
            "investigation_id": "inv-1",
            "message": "done",
            "timestamp": "2026-08-07T12:05:00Z"
        }))
        .unwrap();
        assert!(frame.kind.is_terminal());
        assert!(frame.node.is_none());
    }

    #[test]
    fn interaction_wire_shape() {
        let json = serde_json::to_value(Interaction::Zoom {
            factor: 1.2,
            focal: Some((10.0, 20.0)),
        })
        .unwrap();
        assert_eq!(json["action"], "zoom");
        let back: Interaction = serde_json::from_value(json).unwrap();
        assert_eq!(
            back,
            Interaction::Zoom {
                factor: 1.2,
                focal: Some((10.0, 20.0))
            }
        );
    }
}
