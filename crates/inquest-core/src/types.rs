//! Core data model: nodes, lanes, and the payload shapes they carry

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::sync::Arc;

/// Node identifier - cheaply cloneable, unique for the session
#[derive(Clone, Debug, Hash, Eq, PartialEq, PartialOrd, Ord)]
pub struct NodeId(Arc<str>);

impl NodeId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(Arc::from(s.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl Serialize for NodeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for NodeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(NodeId::new(s))
    }
}

/// The closed set of node kinds the upstream backend emits.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    DataFetch,
    Analysis,
    Decision,
    Inference,
    Validation,
    Spawn,
}

impl NodeKind {
    pub fn label(&self) -> &'static str {
        match self {
            NodeKind::DataFetch => "data fetch",
            NodeKind::Analysis => "analysis",
            NodeKind::Decision => "decision",
            NodeKind::Inference => "inference",
            NodeKind::Validation => "validation",
            NodeKind::Spawn => "spawn",
        }
    }
}

/// Node lifecycle status. Transitions only move forward; a merge that would
/// move backward is ignored and surfaced as a diagnostic.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Pending,
    InProgress,
    Completed,
    Error,
}

impl NodeStatus {
    /// Monotonic ordering of the lifecycle. `Error` is terminal and may
    /// follow any other state.
    pub fn rank(&self) -> u8 {
        match self {
            NodeStatus::Pending => 0,
            NodeStatus::InProgress => 1,
            NodeStatus::Completed => 2,
            NodeStatus::Error => 3,
        }
    }
}

/// A logical horizontal grouping of nodes by investigation theme.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Lane {
    Main,
    Thematic(String),
    Validation,
    Final,
}

impl Lane {
    pub fn thematic(name: impl Into<String>) -> Self {
        Lane::Thematic(name.into())
    }

    pub fn name(&self) -> &str {
        match self {
            Lane::Main => "main",
            Lane::Thematic(name) => name,
            Lane::Validation => "validation",
            Lane::Final => "final",
        }
    }
}

impl std::fmt::Display for Lane {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl Serialize for Lane {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for Lane {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(match s.as_str() {
            "main" => Lane::Main,
            "validation" => Lane::Validation,
            "final" => Lane::Final,
            _ => Lane::Thematic(s),
        })
    }
}

// ---------------------------------------------------------------------------
// Payloads — kind-dependent structured records
// ---------------------------------------------------------------------------

/// A single headline with its classified sentiment.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Article {
    pub headline: String,
    pub sentiment: String,
}

/// Price movement summary attached to data-fetch nodes.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PricePayload {
    pub symbol: String,
    pub start_price: f64,
    pub end_price: f64,
    pub price_change_percent: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub movement_significance: Option<String>,
}

/// News sentiment breakdown attached to analysis nodes.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SentimentPayload {
    pub overall_sentiment: String,
    pub sentiment_score: f64,
    #[serde(default)]
    pub news_articles: Vec<Article>,
}

/// Earnings result attached to analysis nodes.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct EarningsPayload {
    pub eps_beat: bool,
    pub earnings_surprise: f64,
    pub revenue_growth: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guidance_impact: Option<String>,
}

/// Sector and flow context attached to analysis nodes.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct MarketPayload {
    pub sector_performance: f64,
    pub market_sentiment: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relative_strength: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub institutional_flow: Option<String>,
}

/// An autonomous branching decision: which hypotheses to test and which
/// parallel threads to spawn for them.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DecisionPayload {
    pub investigation_hypotheses: Vec<String>,
    pub parallel_threads: Vec<String>,
    pub decision_confidence: f64,
}

/// A synthesis conclusion. `evidence` names the upstream findings this
/// inference cites, outside its direct parent chain.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct InferencePayload {
    pub primary_explanation: String,
    pub confidence_score: f64,
    #[serde(default)]
    pub reasoning_steps: Vec<String>,
    #[serde(default)]
    pub evidence: Vec<NodeId>,
}

/// Cross-validation of multiple investigation branches.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ValidationPayload {
    pub validated_sources: Vec<NodeId>,
    pub consistency_score: f64,
    #[serde(default)]
    pub validation_results: Vec<String>,
}

/// Kind-dependent structured record carried by a node. Unrecognized or
/// partial shapes fall back to `Opaque`, which renders as a key-value
/// listing, so the graph never loses a node over its payload.
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(untagged)]
pub enum Payload {
    Price(PricePayload),
    Sentiment(SentimentPayload),
    Earnings(EarningsPayload),
    Market(MarketPayload),
    Decision(DecisionPayload),
    Inference(InferencePayload),
    Validation(ValidationPayload),
    Opaque(serde_json::Map<String, Value>),
}

impl Payload {
    /// Decode the raw `data` bag of a wire record into the typed shape for
    /// its kind. Returns the payload plus whether the shape was malformed
    /// for a kind that has a declared shape (the node is kept either way).
    pub fn decode(kind: NodeKind, data: &Value) -> (Self, bool) {
        let typed = match kind {
            NodeKind::DataFetch => serde_json::from_value(data.clone()).map(Payload::Price),
            NodeKind::Analysis => serde_json::from_value(data.clone())
                .map(Payload::Sentiment)
                .or_else(|_| serde_json::from_value(data.clone()).map(Payload::Earnings))
                .or_else(|_| serde_json::from_value(data.clone()).map(Payload::Market)),
            NodeKind::Decision => serde_json::from_value(data.clone()).map(Payload::Decision),
            NodeKind::Inference => serde_json::from_value(data.clone()).map(Payload::Inference),
            NodeKind::Validation => serde_json::from_value(data.clone()).map(Payload::Validation),
            // Spawn markers carry free-form context; the bag is their shape.
            NodeKind::Spawn => return (Self::opaque_from(data), false),
        };
        match typed {
            Ok(payload) => (payload, false),
            Err(_) => (Self::opaque_from(data), true),
        }
    }

    fn opaque_from(data: &Value) -> Self {
        match data {
            Value::Object(map) => Payload::Opaque(map.clone()),
            Value::Null => Payload::Opaque(serde_json::Map::new()),
            other => {
                let mut map = serde_json::Map::new();
                map.insert("value".to_string(), other.clone());
                Payload::Opaque(map)
            }
        }
    }

    /// Node ids this payload cites outside the parent chain. Source of
    /// cross-reference edges.
    pub fn evidence_refs(&self) -> &[NodeId] {
        match self {
            Payload::Inference(p) => &p.evidence,
            Payload::Validation(p) => &p.validated_sources,
            _ => &[],
        }
    }

    /// Flatten to ordered `(key, rendered value)` pairs for display. The
    /// generic path every renderer can fall back to.
    pub fn fields(&self) -> Vec<(String, String)> {
        let value = serde_json::to_value(self).unwrap_or(Value::Null);
        match value {
            Value::Object(map) => map
                .into_iter()
                .map(|(k, v)| (k, render_value(&v)))
                .collect(),
            other => vec![("value".to_string(), render_value(&other))],
        }
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(render_value)
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Nodes — wire record and ingested form
// ---------------------------------------------------------------------------

/// A node exactly as the upstream backend serializes it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub label: String,
    #[serde(default)]
    pub description: String,
    pub status: NodeStatus,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub parent_id: Option<NodeId>,
    #[serde(default)]
    pub children_ids: Vec<NodeId>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

/// An ingested node with its payload decoded. Identity and relationships
/// are immutable; status, description, payload, and `completed_at` are
/// filled in by later update frames for the same id.
#[derive(Clone, Debug, Serialize)]
pub struct Node {
    pub id: NodeId,
    pub kind: NodeKind,
    pub label: String,
    pub description: String,
    pub status: NodeStatus,
    pub payload: Payload,
    pub parent_id: Option<NodeId>,
    pub child_ids: Vec<NodeId>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Node {
    /// Decode a wire record. The boolean reports a malformed payload shape;
    /// the node itself is always produced.
    pub fn from_record(record: NodeRecord) -> (Self, bool) {
        let (payload, malformed) = Payload::decode(record.kind, &record.data);
        let node = Node {
            id: record.id,
            kind: record.kind,
            label: record.label,
            description: record.description,
            status: record.status,
            payload,
            parent_id: record.parent_id,
            child_ids: record.children_ids,
            created_at: record.created_at,
            completed_at: record.completed_at,
        };
        (node, malformed)
    }
}

/// Derived 2-D placement for one node. Owned by the layout engine and
/// recomputed, never persisted.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct LayoutPosition {
    pub node_id: NodeId,
    pub x: f64,
    pub y: f64,
    pub level: u32,
    pub lane: Lane,
}

/// The rendered connection classes.
#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// Mirrors a parent→child spawn relationship.
    Structural,
    /// An aggregation/citation relationship from payload-embedded
    /// references; rendered with distinct stroke styling.
    CrossRef,
}

/// A resolved connection between two positioned nodes.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct Edge {
    pub from: NodeId,
    pub to: NodeId,
    pub kind: EdgeKind,
}

/// Pan/zoom transform state, clamped to the configured scale bounds.
#[derive(Clone, Copy, Debug, Serialize, PartialEq)]
pub struct ViewState {
    pub scale: f64,
    pub translate_x: f64,
    pub translate_y: f64,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            scale: 1.0,
            translate_x: 0.0,
            translate_y: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn node_kind_wire_names() {
        assert_eq!(
            serde_json::to_string(&NodeKind::DataFetch).unwrap(),
            "\"data_fetch\""
        );
        assert_eq!(
            serde_json::from_str::<NodeStatus>("\"in_progress\"").unwrap(),
            NodeStatus::InProgress
        );
    }

    #[test]
    fn lane_round_trip() {
        let lanes = vec![
            Lane::Main,
            Lane::thematic("news"),
            Lane::Validation,
            Lane::Final,
        ];
        for lane in lanes {
            let json = serde_json::to_string(&lane).unwrap();
            let back: Lane = serde_json::from_str(&json).unwrap();
            assert_eq!(lane, back);
        }
    }

    #[test]
    fn payload_decodes_typed_shape() {
        let data = json!({
            "overall_sentiment": "positive",
            "sentiment_score": 0.75,
            "news_articles": [{"headline": "ACME surges", "sentiment": "positive"}],
            "confidence_level": "high"
        });
        let (payload, malformed) = Payload::decode(NodeKind::Analysis, &data);
        assert!(!malformed);
        match payload {
            Payload::Sentiment(p) => {
                assert_eq!(p.overall_sentiment, "positive");
                assert_eq!(p.news_articles.len(), 1);
            }
            other => panic!("expected sentiment payload, got {other:?}"),
        }
    }

    #[test]
    fn payload_falls_back_to_opaque() {
        let data = json!({"unexpected": true});
        let (payload, malformed) = Payload::decode(NodeKind::Inference, &data);
        assert!(malformed);
        assert!(matches!(payload, Payload::Opaque(_)));
        // The bag is still inspectable field by field.
        let fields = Payload::decode(NodeKind::Inference, &data).0.fields();
        assert_eq!(fields[0].0, "unexpected");
    }

    #[test]
    fn evidence_refs_come_from_inference_and_validation() {
        let inference = Payload::Inference(InferencePayload {
            primary_explanation: "earnings beat".into(),
            confidence_score: 0.9,
            reasoning_steps: vec![],
            evidence: vec!["n1".into(), "n2".into()],
        });
        assert_eq!(inference.evidence_refs().len(), 2);
        let price = Payload::Price(PricePayload {
            symbol: "ACME".into(),
            start_price: 95.0,
            end_price: 100.0,
            price_change_percent: 5.26,
            movement_significance: None,
        });
        assert!(price.evidence_refs().is_empty());
    }

    #[test]
    fn status_rank_is_monotonic() {
        assert!(NodeStatus::Pending.rank() < NodeStatus::InProgress.rank());
        assert!(NodeStatus::InProgress.rank() < NodeStatus::Completed.rank());
        assert!(NodeStatus::Completed.rank() < NodeStatus::Error.rank());
    }
}
