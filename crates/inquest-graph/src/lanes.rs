//! LaneClassifier — declarative routing of nodes into investigation lanes
//!
//! A pure function of node attributes: the ordered rule table is evaluated
//! first-match-wins against the node's kind and label. Never consults
//! history or arrival order, so re-classification is trivially idempotent.

use inquest_core::{EngineConfig, Error, Lane, Node, NodeKind, Result};
use regex::Regex;

struct CompiledRule {
    kind: Option<NodeKind>,
    pattern: Option<Regex>,
    lane: Lane,
}

impl CompiledRule {
    fn matches(&self, node: &Node) -> bool {
        if let Some(kind) = self.kind {
            if node.kind != kind {
                return false;
            }
        }
        if let Some(pattern) = &self.pattern {
            if !pattern.is_match(&node.label) {
                return false;
            }
        }
        true
    }
}

pub struct LaneClassifier {
    rules: Vec<CompiledRule>,
}

impl LaneClassifier {
    /// Compile the configured rule table. A malformed pattern is a config
    /// error; classification itself can no longer fail after this.
    pub fn new(config: &EngineConfig) -> Result<Self> {
        let mut rules = Vec::with_capacity(config.rules.len());
        for rule in &config.rules {
            let pattern = match &rule.pattern {
                Some(raw) => Some(Regex::new(raw).map_err(|e| {
                    Error::config(format!("invalid lane rule pattern `{raw}`: {e}"))
                })?),
                None => None,
            };
            rules.push(CompiledRule {
                kind: rule.kind,
                pattern,
                lane: rule.lane.clone(),
            });
        }
        Ok(Self { rules })
    }

    /// First matching rule wins; nodes matching no rule fall into the main
    /// lane.
    pub fn classify(&self, node: &Node) -> Lane {
        for rule in &self.rules {
            if rule.matches(node) {
                return rule.lane.clone();
            }
        }
        Lane::Main
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use inquest_core::{LaneRule, NodeStatus, Payload};

    fn node(kind: NodeKind, label: &str) -> Node {
        Node {
            id: "n".into(),
            kind,
            label: label.to_string(),
            description: String::new(),
            status: NodeStatus::Completed,
            payload: Payload::Opaque(serde_json::Map::new()),
            parent_id: None,
            child_ids: Vec::new(),
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    fn classifier() -> LaneClassifier {
        LaneClassifier::new(&EngineConfig::default()).unwrap()
    }

    #[test]
    fn kind_rules_win_over_label_rules() {
        // A validation node whose label also mentions news still routes to
        // the validation lane: validation is the first rule in the table.
        let lane = classifier().classify(&node(
            NodeKind::Validation,
            "Cross-Validation: ACME News Analysis",
        ));
        assert_eq!(lane, Lane::Validation);
    }

    #[test]
    fn label_keywords_route_to_thematic_lanes() {
        let c = classifier();
        assert_eq!(
            c.classify(&node(NodeKind::Analysis, "Sentiment Analysis: ACME News")),
            Lane::thematic("news")
        );
        assert_eq!(
            c.classify(&node(
                NodeKind::Analysis,
                "Earnings Analysis: ACME Financial Performance"
            )),
            Lane::thematic("financial")
        );
        assert_eq!(
            c.classify(&node(NodeKind::Analysis, "Market Context: ACME Sector")),
            Lane::thematic("market")
        );
    }

    #[test]
    fn master_inference_routes_to_final_lane() {
        let lane = classifier().classify(&node(
            NodeKind::Inference,
            "Master Inference: Why ACME Price Increased",
        ));
        assert_eq!(lane, Lane::Final);
        // A branch-level inference keeps its branch lane.
        let lane = classifier().classify(&node(NodeKind::Inference, "News Impact Inference"));
        assert_eq!(lane, Lane::thematic("news"));
    }

    #[test]
    fn unmatched_nodes_fall_into_main() {
        let lane = classifier().classify(&node(NodeKind::DataFetch, "Fetch ACME Price Data"));
        assert_eq!(lane, Lane::Main);
        let lane = classifier().classify(&node(NodeKind::Decision, "AI Agent Decision"));
        assert_eq!(lane, Lane::Main);
    }

    #[test]
    fn classification_is_idempotent() {
        let c = classifier();
        let n = node(NodeKind::Analysis, "News deep dive");
        assert_eq!(c.classify(&n), c.classify(&n));
    }

    #[test]
    fn bad_pattern_is_a_config_error() {
        let mut config = EngineConfig::default();
        config.rules.push(LaneRule::label("(unclosed", Lane::Main));
        assert!(LaneClassifier::new(&config).is_err());
    }
}
