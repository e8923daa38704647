//! NodeStore — the append-only, deduplicated node collection
//!
//! Single source of truth for "what exists". `append` inserts-or-merges by
//! id and keeps `child_ids` and reverse `parent_id` links consistent after
//! every ingestion, whichever side of the relationship arrived first.

use inquest_core::{Error, Node, NodeId, NodeStatus, Result};
use std::collections::HashMap;

/// What one `append` touched: the affected subgraph the layout pass needs
/// to look at, plus merge observations for diagnostics.
#[derive(Clone, Debug, Default)]
pub struct ChangeSet {
    /// Id of the inserted or merged node.
    pub appended: Option<NodeId>,
    /// True when the id already existed and mutable fields were merged.
    pub merged: bool,
    /// The parent whose fan-out changed, if it is already present.
    pub parent: Option<NodeId>,
    /// Previously-seen children that named this node as parent before it
    /// arrived and are now resolvable.
    pub resolved_children: Vec<NodeId>,
    /// A status merge that would have moved backward: `(current, attempted)`.
    pub stale_status: Option<(NodeStatus, NodeStatus)>,
}

#[derive(Debug, Default)]
pub struct NodeStore {
    nodes: HashMap<NodeId, Node>,
    /// First-appearance order; drives every ordered traversal.
    order: Vec<NodeId>,
    /// Parent declared through `child_ids` before the child arrived.
    declared_parent: HashMap<NodeId, NodeId>,
    /// Children that arrived naming a parent not seen yet, per parent.
    waiting: HashMap<NodeId, Vec<NodeId>>,
}

impl NodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert-or-merge by id. Merging updates status (forward only),
    /// description, label, payload, and `completed_at`; it never changes
    /// kind or an established parent. A merge that would is rejected with
    /// `DuplicateConflict` and leaves the store untouched.
    pub fn append(&mut self, node: Node) -> Result<ChangeSet> {
        let mut change = ChangeSet::default();

        if self.nodes.contains_key(&node.id) {
            self.merge(node, &mut change)?;
        } else {
            self.insert(node, &mut change);
        }
        Ok(change)
    }

    fn insert(&mut self, mut node: Node, change: &mut ChangeSet) {
        let id = node.id.clone();

        // A parent that arrived earlier may have declared this node in its
        // child_ids; adopt that link if the record itself carries none.
        if node.parent_id.is_none() {
            if let Some(declared) = self.declared_parent.get(&id) {
                node.parent_id = Some(declared.clone());
            }
        }

        if let Some(parent) = node.parent_id.clone() {
            if let Some(parent_node) = self.nodes.get_mut(&parent) {
                if !parent_node.child_ids.contains(&id) {
                    parent_node.child_ids.push(id.clone());
                }
                change.parent = Some(parent);
            } else {
                // Forward reference: remember who is waiting for whom.
                self.waiting.entry(parent).or_default().push(id.clone());
            }
        }

        self.register_declared_children(&node);
        change.resolved_children = self.waiting.remove(&id).unwrap_or_default();

        self.order.push(id.clone());
        change.appended = Some(id.clone());
        self.nodes.insert(id, node);
    }

    fn merge(&mut self, incoming: Node, change: &mut ChangeSet) -> Result<()> {
        let id = incoming.id.clone();
        let Some(current) = self.nodes.get_mut(&id) else {
            return Ok(());
        };

        // Conflict checks before any mutation, so a rejected event leaves
        // prior state intact.
        if current.kind != incoming.kind {
            return Err(Error::duplicate(id, "kind"));
        }
        if let (Some(a), Some(b)) = (&current.parent_id, &incoming.parent_id) {
            if a != b {
                return Err(Error::duplicate(id, "parent_id"));
            }
        }

        if incoming.status.rank() >= current.status.rank() {
            current.status = incoming.status;
        } else {
            change.stale_status = Some((current.status, incoming.status));
        }
        if !incoming.label.is_empty() {
            current.label = incoming.label;
        }
        if !incoming.description.is_empty() {
            current.description = incoming.description;
        }
        current.payload = incoming.payload;
        if current.completed_at.is_none() {
            current.completed_at = incoming.completed_at;
        }
        for child in &incoming.child_ids {
            if !current.child_ids.contains(child) {
                current.child_ids.push(child.clone());
            }
        }
        // A parent reference may be filled in by a later frame.
        let mut filled_parent = None;
        if current.parent_id.is_none() && incoming.parent_id.is_some() {
            current.parent_id = incoming.parent_id.clone();
            filled_parent = incoming.parent_id;
        }
        change.parent = current.parent_id.clone();
        let merged = current.clone();

        if let Some(parent) = filled_parent {
            if let Some(parent_node) = self.nodes.get_mut(&parent) {
                if !parent_node.child_ids.contains(&id) {
                    parent_node.child_ids.push(id.clone());
                }
            } else {
                self.waiting.entry(parent).or_default().push(id.clone());
            }
        }

        self.register_declared_children(&merged);
        change.merged = true;
        change.appended = Some(id);
        Ok(())
    }

    /// Record declared child links and back-fill parents of children that
    /// arrived first without one.
    fn register_declared_children(&mut self, node: &Node) {
        for child in &node.child_ids {
            self.declared_parent
                .entry(child.clone())
                .or_insert_with(|| node.id.clone());
            if let Some(existing) = self.nodes.get_mut(child) {
                if existing.parent_id.is_none() {
                    existing.parent_id = Some(node.id.clone());
                }
            }
        }
    }

    pub fn get(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Ordered children of a node: declared `child_ids` first (authoritative
    /// fan-out order), then back-referenced children in arrival order.
    pub fn children(&self, id: &NodeId) -> Vec<NodeId> {
        let mut out: Vec<NodeId> = match self.nodes.get(id) {
            Some(node) => node
                .child_ids
                .iter()
                .filter(|c| self.nodes.contains_key(c))
                .cloned()
                .collect(),
            None => return Vec::new(),
        };
        for candidate_id in &self.order {
            if out.contains(candidate_id) {
                continue;
            }
            if let Some(candidate) = self.nodes.get(candidate_id) {
                if candidate.parent_id.as_ref() == Some(id) {
                    out.push(candidate_id.clone());
                }
            }
        }
        out
    }

    /// Nodes with no parent, in arrival order.
    pub fn roots(&self) -> Vec<NodeId> {
        self.order
            .iter()
            .filter(|id| self.nodes[*id].parent_id.is_none())
            .cloned()
            .collect()
    }

    /// All ids in first-appearance order.
    pub fn ids(&self) -> &[NodeId] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.order.clear();
        self.declared_parent.clear();
        self.waiting.clear();
    }
}
