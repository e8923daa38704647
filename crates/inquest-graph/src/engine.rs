//! GraphEngine — composes store, classifier, layout, edges, and
//! presentation state behind `ingest`/`interact`/`snapshot`
//!
//! One ingest pass runs the whole pipeline: append to the store, classify
//! the lane, place (or defer) the node, retry the deferred set, and rebuild
//! edges. Failures degrade to diagnostics; only a protocol violation
//! (immutable-field conflict, ingestion after terminate) is returned as an
//! error, and it leaves prior state untouched.

use crate::edges::EdgeResolver;
use crate::expansion::ExpansionState;
use crate::lanes::LaneClassifier;
use crate::layout::{LayoutEngine, Placement};
use crate::store::NodeStore;
use inquest_core::{
    Diagnostic, Edge, EngineConfig, Error, Interaction, LayoutPosition, Node, NodeId, NodeStatus,
    Result, UpdateFrame, ViewState,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::viewport::ViewportController;

/// What one ingest call did.
#[derive(Clone, Debug, PartialEq)]
pub enum IngestOutcome {
    Applied {
        id: NodeId,
        merged: bool,
        /// True when the node is waiting for its parent.
        deferred: bool,
    },
    /// A terminal frame: ingestion stops, state stays renderable.
    Terminal,
    /// A node frame without a node record; dropped with a warning.
    Ignored,
}

/// Per-status node tallies for footers and health output.
#[derive(Clone, Copy, Debug, Default, Serialize, PartialEq)]
pub struct StatusCounts {
    pub pending: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub error: usize,
}

/// The one read surface presentation layers get. A pure projection of
/// engine state: taking a snapshot has no side effects and may happen at
/// any time, any number of times.
#[derive(Clone, Debug, Serialize)]
pub struct Snapshot {
    pub revision: u64,
    pub investigation_id: Option<String>,
    pub nodes: Vec<Node>,
    pub positions: Vec<LayoutPosition>,
    pub edges: Vec<Edge>,
    pub view: ViewState,
    pub expanded: Vec<NodeId>,
    pub diagnostics: Vec<Diagnostic>,
    pub status_counts: StatusCounts,
    pub terminated: bool,
}

impl Snapshot {
    pub fn position_of(&self, id: &NodeId) -> Option<&LayoutPosition> {
        self.positions.iter().find(|p| &p.node_id == id)
    }

    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.iter().find(|n| &n.id == id)
    }
}

pub struct GraphEngine {
    store: NodeStore,
    classifier: LaneClassifier,
    layout: LayoutEngine,
    edges: EdgeResolver,
    viewport: ViewportController,
    expansion: ExpansionState,
    diagnostics: Vec<Diagnostic>,
    investigation_id: Option<String>,
    revision: u64,
    terminated: bool,
}

impl GraphEngine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        let classifier = LaneClassifier::new(&config)?;
        Ok(Self {
            store: NodeStore::new(),
            classifier,
            layout: LayoutEngine::new(&config),
            edges: EdgeResolver::new(),
            viewport: ViewportController::new(config.viewport),
            expansion: ExpansionState::new(),
            diagnostics: Vec::new(),
            investigation_id: None,
            revision: 0,
            terminated: false,
        })
    }

    /// Process one upstream frame, in arrival order.
    pub fn ingest(&mut self, frame: &UpdateFrame) -> Result<IngestOutcome> {
        if self.terminated {
            return Err(Error::Terminated);
        }
        if self.investigation_id.is_none() {
            self.investigation_id = Some(frame.investigation_id.clone());
        }

        if frame.kind.is_terminal() {
            info!(kind = ?frame.kind, "terminal frame; session stops ingesting");
            self.stop();
            return Ok(IngestOutcome::Terminal);
        }

        let Some(record) = &frame.node else {
            warn!(kind = ?frame.kind, "node frame without node record ignored");
            return Ok(IngestOutcome::Ignored);
        };

        let (node, malformed) = Node::from_record(record.clone());
        let id = node.id.clone();

        // Store first: a rejected merge must leave no trace, diagnostics
        // included.
        let change = self.store.append(node)?;
        if malformed {
            self.diagnostics.push(Diagnostic::MalformedPayload { id: id.clone() });
        }
        if let Some((current, attempted)) = change.stale_status {
            self.diagnostics.push(Diagnostic::StaleStatus {
                id: id.clone(),
                current,
                attempted,
            });
        }

        let deferred = !self.try_place(&id);
        if deferred && !change.merged {
            let parent = self
                .store
                .get(&id)
                .and_then(|n| n.parent_id.clone())
                .unwrap_or_else(|| NodeId::new("?"));
            self.diagnostics.push(Diagnostic::DanglingReference {
                id: id.clone(),
                parent,
            });
        }

        self.resolve_deferred();
        self.edges.rebuild(&self.store, &self.layout);
        self.revision += 1;

        Ok(IngestOutcome::Applied {
            id,
            merged: change.merged,
            deferred,
        })
    }

    /// Classify and place one stored node. Returns false when deferred.
    fn try_place(&mut self, id: &NodeId) -> bool {
        let Some(node) = self.store.get(id) else {
            return false;
        };
        let lane = self.classifier.classify(node);
        let parent = node.parent_id.clone();
        match self.layout.place(id, &lane, parent.as_ref()) {
            Placement::Placed(position) => {
                debug!(node = %id, lane = %position.lane, level = position.level, "placed");
                true
            }
            Placement::Deferred => false,
        }
    }

    /// Retry the deferred set until a full pass makes no progress, so a
    /// resolved parent pulls in arbitrarily deep chains of waiting
    /// descendants.
    fn resolve_deferred(&mut self) {
        loop {
            let mut progressed = false;
            for id in self.layout.deferred_ids() {
                if self.try_place(&id) {
                    progressed = true;
                }
            }
            if !progressed {
                break;
            }
        }
    }

    /// Apply a user gesture. Touches only viewport/expansion state; never
    /// the data pipeline.
    pub fn interact(&mut self, interaction: &Interaction) {
        match interaction {
            Interaction::ToggleExpand { id } => {
                if self.store.contains(id) {
                    self.expansion.toggle(id);
                } else {
                    debug!(node = %id, "toggle on unknown node ignored");
                }
            }
            other => self.viewport.apply(other),
        }
        self.revision += 1;
    }

    /// Stop accepting ingestion; current state stays renderable and
    /// interactive. Orphans get their overflow placement now.
    pub fn terminate(&mut self) {
        if self.terminated {
            return;
        }
        info!("engine terminated");
        self.stop();
    }

    fn stop(&mut self) {
        self.terminated = true;
        self.layout.flush_deferred();
        self.edges.rebuild(&self.store, &self.layout);
        self.revision += 1;
    }

    /// Clear everything together: nodes, layout, edges, expansion,
    /// viewport, diagnostics. Partial reset is not a thing — stale
    /// expansion flags must not leak into the next investigation.
    pub fn reset(&mut self) {
        info!("engine reset");
        self.store.clear();
        self.layout.clear();
        self.edges.clear();
        self.expansion.clear();
        self.viewport.reset();
        self.diagnostics.clear();
        self.investigation_id = None;
        self.terminated = false;
        self.revision += 1;
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn snapshot(&self) -> Snapshot {
        let nodes: Vec<Node> = self
            .store
            .ids()
            .iter()
            .filter_map(|id| self.store.get(id).cloned())
            .collect();
        let mut status_counts = StatusCounts::default();
        for node in &nodes {
            match node.status {
                NodeStatus::Pending => status_counts.pending += 1,
                NodeStatus::InProgress => status_counts.in_progress += 1,
                NodeStatus::Completed => status_counts.completed += 1,
                NodeStatus::Error => status_counts.error += 1,
            }
        }
        Snapshot {
            revision: self.revision,
            investigation_id: self.investigation_id.clone(),
            nodes,
            positions: self.layout.positions(),
            edges: self.edges.edges().to_vec(),
            view: self.viewport.view(),
            expanded: self.expansion.ids(),
            diagnostics: self.diagnostics.clone(),
            status_counts,
            terminated: self.terminated,
        }
    }
}
