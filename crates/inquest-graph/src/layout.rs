//! LayoutEngine — incremental, monotonic placement of streamed nodes
//!
//! Positions are computed once per node from fixed spacing constants and
//! never revised by later unrelated arrivals. Overlap avoidance is by
//! construction: each lane owns a horizontal level and staggers its nodes
//! vertically away from the main axis. A child arriving before its parent
//! is deferred, placed the moment the parent resolves, and given a
//! best-effort overflow position if the parent never shows up before the
//! session ends.

use inquest_core::{EngineConfig, Lane, LayoutGeometry, LayoutPosition, NodeId};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Outcome of a placement attempt.
#[derive(Clone, Debug, PartialEq)]
pub enum Placement {
    Placed(LayoutPosition),
    /// Parent not positioned yet; the node waits in the deferred set.
    Deferred,
}

#[derive(Clone, Debug)]
struct LaneSlot {
    index: usize,
    level: u32,
    count: u32,
}

#[derive(Debug)]
pub struct LayoutEngine {
    geometry: LayoutGeometry,
    positions: HashMap<NodeId, LayoutPosition>,
    /// Placement order, for deterministic snapshot traversal.
    placed: Vec<NodeId>,
    /// Deferred nodes in arrival order.
    deferred: Vec<NodeId>,
    deferred_set: HashSet<NodeId>,

    /// Next free main-lane level (equals the count of main nodes placed).
    main_next: u32,
    /// Max level among main + thematic nodes; the base of the validation
    /// reservation.
    branch_max: u32,
    lanes: HashMap<String, LaneSlot>,
    next_lane_index: usize,
    /// Rightmost validation level placed so far.
    validation_max: Option<u32>,
    validation_count: u32,
    final_count: u32,
    /// Max level over every placed node; overflow appends past this.
    max_level: u32,
}

impl LayoutEngine {
    pub fn new(config: &EngineConfig) -> Self {
        let mut engine = Self {
            geometry: config.geometry.clone(),
            positions: HashMap::new(),
            placed: Vec::new(),
            deferred: Vec::new(),
            deferred_set: HashSet::new(),
            main_next: 0,
            branch_max: 0,
            lanes: HashMap::new(),
            next_lane_index: 0,
            validation_max: None,
            validation_count: 0,
            final_count: 0,
            max_level: 0,
        };
        // Pre-register the configured thematic lanes so their vertical
        // order is stable regardless of which branch streams first.
        for name in &config.thematic_lanes {
            engine.register_lane(name);
        }
        engine
    }

    fn register_lane(&mut self, name: &str) -> usize {
        let next_index = &mut self.next_lane_index;
        self.lanes
            .entry(name.to_string())
            .or_insert_with(|| {
                let index = *next_index;
                *next_index += 1;
                LaneSlot {
                    index,
                    level: 0,
                    count: 0,
                }
            })
            .index
    }

    /// Place a node, or defer it when its parent has no position yet.
    /// Placing an already-positioned node is a no-op returning the existing
    /// position, which makes duplicate ingestion harmless.
    pub fn place(&mut self, id: &NodeId, lane: &Lane, parent: Option<&NodeId>) -> Placement {
        if let Some(existing) = self.positions.get(id) {
            return Placement::Placed(existing.clone());
        }
        if let Some(parent) = parent {
            if !self.positions.contains_key(parent) {
                if self.deferred_set.insert(id.clone()) {
                    self.deferred.push(id.clone());
                    debug!(node = %id, parent = %parent, "deferring node until parent resolves");
                }
                return Placement::Deferred;
            }
        }

        let position = match lane {
            Lane::Main => self.place_main(id),
            Lane::Thematic(name) => self.place_thematic(id, name),
            Lane::Validation => self.place_validation(id),
            Lane::Final => self.place_final(id),
        };
        self.commit(position.clone());
        Placement::Placed(position)
    }

    fn place_main(&mut self, id: &NodeId) -> LayoutPosition {
        let level = self.main_next;
        self.main_next += 1;
        self.branch_max = self.branch_max.max(level);
        LayoutPosition {
            node_id: id.clone(),
            x: self.geometry.x_for_level(level),
            y: self.geometry.center_y,
            level,
            lane: Lane::Main,
        }
    }

    fn place_thematic(&mut self, id: &NodeId, name: &str) -> LayoutPosition {
        let main_max = self.main_next.saturating_sub(1);
        let next_index = &mut self.next_lane_index;
        let slot = self.lanes.entry(name.to_string()).or_insert_with(|| {
            let index = *next_index;
            *next_index += 1;
            LaneSlot {
                index,
                level: 0,
                count: 0,
            }
        });
        if slot.count == 0 {
            // Branches render one level past the point where the main flow
            // forked.
            slot.level = main_max + 1;
        }
        let index = slot.index;
        let level = slot.level;
        let node_index = slot.count;
        slot.count += 1;
        self.branch_max = self.branch_max.max(level);

        let lane_y = self.geometry.thematic_y(index);
        // Stagger away from the main axis so a deep branch never drifts
        // back into the center lane.
        let away = if lane_y < self.geometry.center_y {
            -1.0
        } else {
            1.0
        };
        LayoutPosition {
            node_id: id.clone(),
            x: self.geometry.x_for_level(level),
            y: lane_y + away * f64::from(node_index) * self.geometry.intra_lane_spacing,
            level,
            lane: Lane::thematic(name),
        }
    }

    /// Validation sits `max(2, largest lane size)` past everything the
    /// branches have claimed: a lookahead reservation that keeps its edges
    /// out of branch territory no matter how long a branch grows.
    fn reservation(&self) -> u32 {
        let max_lane = self.lanes.values().map(|slot| slot.count).max().unwrap_or(0);
        self.branch_max + max_lane.max(2)
    }

    fn place_validation(&mut self, id: &NodeId) -> LayoutPosition {
        let level = self.reservation();
        self.validation_max = Some(self.validation_max.map_or(level, |v| v.max(level)));
        let node_index = self.validation_count;
        self.validation_count += 1;
        LayoutPosition {
            node_id: id.clone(),
            x: self.geometry.x_for_level(level),
            y: self.geometry.center_y + f64::from(node_index) * self.geometry.intra_lane_spacing,
            level,
            lane: Lane::Validation,
        }
    }

    fn place_final(&mut self, id: &NodeId) -> LayoutPosition {
        let level = self.validation_max.unwrap_or_else(|| self.reservation()) + 1;
        let node_index = self.final_count;
        self.final_count += 1;
        LayoutPosition {
            node_id: id.clone(),
            x: self.geometry.x_for_level(level),
            y: self.geometry.center_y + f64::from(node_index) * self.geometry.intra_lane_spacing,
            level,
            lane: Lane::Final,
        }
    }

    fn commit(&mut self, position: LayoutPosition) {
        self.max_level = self.max_level.max(position.level);
        self.deferred_set.remove(&position.node_id);
        self.deferred.retain(|d| d != &position.node_id);
        self.placed.push(position.node_id.clone());
        self.positions.insert(position.node_id.clone(), position);
    }

    /// Give every still-deferred node a best-effort position in a trailing
    /// overflow column, so investigation progress stays visible even when a
    /// parent was never observed. Called when the session stops ingesting.
    pub fn flush_deferred(&mut self) {
        if self.deferred.is_empty() {
            return;
        }
        let level = self.max_level + 1;
        let pending: Vec<NodeId> = self.deferred.drain(..).collect();
        self.deferred_set.clear();
        for (row, id) in pending.into_iter().enumerate() {
            debug!(node = %id, "placing permanently deferred node in overflow column");
            let position = LayoutPosition {
                node_id: id.clone(),
                x: self.geometry.x_for_level(level),
                y: self.geometry.center_y + row as f64 * self.geometry.intra_lane_spacing,
                level,
                lane: Lane::Main,
            };
            self.max_level = self.max_level.max(level);
            self.placed.push(id);
            self.positions.insert(position.node_id.clone(), position);
        }
    }

    pub fn position(&self, id: &NodeId) -> Option<&LayoutPosition> {
        self.positions.get(id)
    }

    pub fn is_positioned(&self, id: &NodeId) -> bool {
        self.positions.contains_key(id)
    }

    /// Positions in placement order.
    pub fn positions(&self) -> Vec<LayoutPosition> {
        self.placed
            .iter()
            .filter_map(|id| self.positions.get(id).cloned())
            .collect()
    }

    /// Still-deferred node ids in arrival order.
    pub fn deferred_ids(&self) -> Vec<NodeId> {
        self.deferred.clone()
    }

    pub fn clear(&mut self) {
        let config_lanes: Vec<(String, usize)> = {
            let mut lanes: Vec<_> = self
                .lanes
                .iter()
                .map(|(name, slot)| (name.clone(), slot.index))
                .collect();
            lanes.sort_by_key(|(_, index)| *index);
            lanes
        };
        self.positions.clear();
        self.placed.clear();
        self.deferred.clear();
        self.deferred_set.clear();
        self.main_next = 0;
        self.branch_max = 0;
        self.lanes.clear();
        self.next_lane_index = 0;
        self.validation_max = None;
        self.validation_count = 0;
        self.final_count = 0;
        self.max_level = 0;
        // Keep the configured lane order stable across session resets.
        for (name, _) in config_lanes {
            self.register_lane(&name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn engine() -> LayoutEngine {
        LayoutEngine::new(&EngineConfig::default())
    }

    fn placed(p: Placement) -> LayoutPosition {
        match p {
            Placement::Placed(pos) => pos,
            Placement::Deferred => panic!("expected placement, node was deferred"),
        }
    }

    #[test]
    fn main_lane_advances_one_level_per_node() {
        let mut layout = engine();
        let a = placed(layout.place(&"a".into(), &Lane::Main, None));
        let b = placed(layout.place(&"b".into(), &Lane::Main, Some(&"a".into())));
        assert_eq!(a.level, 0);
        assert_eq!(b.level, 1);
        assert_eq!(a.y, b.y);
        assert!(b.x > a.x);
    }

    #[test]
    fn thematic_lane_forks_after_main_head() {
        let mut layout = engine();
        layout.place(&"r".into(), &Lane::Main, None);
        layout.place(&"d".into(), &Lane::Main, Some(&"r".into()));
        let n = placed(layout.place(&"n1".into(), &Lane::thematic("news"), Some(&"d".into())));
        assert_eq!(n.level, 2);

        // Second node in the same lane shares the level, staggered away
        // from the center axis.
        let n2 = placed(layout.place(&"n2".into(), &Lane::thematic("news"), Some(&"n1".into())));
        assert_eq!(n2.level, 2);
        assert_eq!(n2.x, n.x);
        assert!((n2.y - n.y).abs() >= 1.0);
        assert!(n2.y < n.y, "news lane sits above center and staggers up");
    }

    #[test]
    fn distinct_lanes_never_share_a_row() {
        let mut layout = engine();
        layout.place(&"r".into(), &Lane::Main, None);
        let news = placed(layout.place(&"n".into(), &Lane::thematic("news"), Some(&"r".into())));
        let fin =
            placed(layout.place(&"f".into(), &Lane::thematic("financial"), Some(&"r".into())));
        let mkt = placed(layout.place(&"m".into(), &Lane::thematic("market"), Some(&"r".into())));
        assert_ne!(news.y, fin.y);
        assert_ne!(news.y, mkt.y);
        assert_ne!(fin.y, mkt.y);
    }

    #[test]
    fn validation_reserves_two_levels_past_branches() {
        let mut layout = engine();
        layout.place(&"r".into(), &Lane::Main, None);
        let n1 = placed(layout.place(&"n1".into(), &Lane::thematic("news"), Some(&"r".into())));
        let v1 = placed(layout.place(&"v1".into(), &Lane::Validation, Some(&"n1".into())));
        // One news node: reservation is max(2, 1) = 2 past the last
        // thematic level.
        assert!(v1.level >= n1.level + 2);

        let f1 = placed(layout.place(&"f1".into(), &Lane::Final, Some(&"v1".into())));
        assert_eq!(f1.level, v1.level + 1);
        assert_eq!(f1.y, layout.geometry.center_y);
    }

    #[test]
    fn long_branch_pushes_validation_further_out() {
        let mut layout = engine();
        layout.place(&"r".into(), &Lane::Main, None);
        let mut parent = NodeId::new("r");
        for i in 0..4 {
            let id = NodeId::new(format!("n{i}"));
            layout.place(&id, &Lane::thematic("news"), Some(&parent));
            parent = id;
        }
        let v = placed(layout.place(&"v".into(), &Lane::Validation, Some(&parent)));
        // Lane size 4 beats the minimum reservation of 2.
        assert_eq!(v.level, 1 + 4);
    }

    #[test]
    fn placement_is_monotonic_under_unrelated_insertions() {
        let mut layout = engine();
        layout.place(&"r".into(), &Lane::Main, None);
        let before = placed(layout.place(&"n1".into(), &Lane::thematic("news"), Some(&"r".into())));
        for i in 0..5 {
            let id = NodeId::new(format!("x{i}"));
            layout.place(&id, &Lane::thematic("market"), Some(&"r".into()));
        }
        layout.place(&"v".into(), &Lane::Validation, Some(&"r".into()));
        let after = layout.position(&"n1".into()).unwrap();
        assert_eq!(&before, after);
    }

    #[test]
    fn deferred_until_parent_resolves() {
        let mut layout = engine();
        let attempt = layout.place(&"child".into(), &Lane::thematic("news"), Some(&"ghost".into()));
        assert_eq!(attempt, Placement::Deferred);
        assert!(!layout.is_positioned(&"child".into()));
        assert_eq!(layout.deferred_ids(), vec![NodeId::new("child")]);

        layout.place(&"ghost".into(), &Lane::Main, None);
        let pos = placed(layout.place(&"child".into(), &Lane::thematic("news"), Some(&"ghost".into())));
        assert_eq!(pos.level, 1);
        assert!(layout.deferred_ids().is_empty());
    }

    #[test]
    fn flush_gives_orphans_an_overflow_column() {
        let mut layout = engine();
        layout.place(&"r".into(), &Lane::Main, None);
        layout.place(&"a".into(), &Lane::Main, Some(&"missing".into()));
        layout.place(&"b".into(), &Lane::Main, Some(&"missing".into()));
        layout.flush_deferred();

        let a = layout.position(&"a".into()).unwrap();
        let b = layout.position(&"b".into()).unwrap();
        assert_eq!(a.level, 1);
        assert_eq!(b.level, 1);
        assert!(b.y > a.y, "overflow rows stack in arrival order");
    }

    #[test]
    fn duplicate_placement_returns_existing_position() {
        let mut layout = engine();
        let first = placed(layout.place(&"r".into(), &Lane::Main, None));
        let second = placed(layout.place(&"r".into(), &Lane::Main, None));
        assert_eq!(first, second);
        assert_eq!(layout.positions().len(), 1);
    }

    #[test]
    fn clear_preserves_configured_lane_order() {
        let mut layout = engine();
        layout.place(&"r".into(), &Lane::Main, None);
        let before =
            placed(layout.place(&"m".into(), &Lane::thematic("market"), Some(&"r".into()))).y;
        layout.clear();
        layout.place(&"r".into(), &Lane::Main, None);
        let after =
            placed(layout.place(&"m".into(), &Lane::thematic("market"), Some(&"r".into()))).y;
        assert_eq!(before, after);
    }
}
