//! EdgeResolver — derives the rendered connection set
//!
//! Structural edges mirror parent→child spawn relationships; cross-reference
//! edges come from payload-embedded citations (an inference or validation
//! node aggregating evidence outside its parent chain). An edge is only
//! emitted once both endpoints hold a position.

use crate::layout::LayoutEngine;
use crate::store::NodeStore;
use inquest_core::{Edge, EdgeKind, NodeId};
use std::collections::HashSet;

#[derive(Debug, Default)]
pub struct EdgeResolver {
    edges: Vec<Edge>,
}

impl EdgeResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the full edge set against current positions. Runs after
    /// every ingestion; endpoints without a position are suppressed rather
    /// than drawn dangling, and reappear automatically once placed.
    pub fn rebuild(&mut self, store: &NodeStore, layout: &LayoutEngine) {
        self.edges.clear();
        for id in store.ids() {
            let Some(node) = store.get(id) else { continue };
            if !layout.is_positioned(id) {
                continue;
            }

            if let Some(parent) = &node.parent_id {
                if layout.is_positioned(parent) {
                    self.edges.push(Edge {
                        from: parent.clone(),
                        to: id.clone(),
                        kind: EdgeKind::Structural,
                    });
                }
            }

            let mut seen: HashSet<&NodeId> = HashSet::new();
            for target in node.payload.evidence_refs() {
                // The parent link already owns this relationship.
                if Some(target) == node.parent_id.as_ref() || target == id {
                    continue;
                }
                if !seen.insert(target) {
                    continue;
                }
                if store.contains(target) && layout.is_positioned(target) {
                    self.edges.push(Edge {
                        from: target.clone(),
                        to: id.clone(),
                        kind: EdgeKind::CrossRef,
                    });
                }
            }
        }
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn clear(&mut self) {
        self.edges.clear();
    }
}
