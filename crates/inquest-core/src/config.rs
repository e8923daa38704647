//! Configuration for the engine, runtime, and gateway

use crate::types::{Lane, NodeKind};
use serde::{Deserialize, Serialize};

/// One entry of the ordered lane classification table. A rule matches when
/// its kind (if set) equals the node's kind AND its pattern (if set)
/// matches the node's label. Evaluation is first-match-wins.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LaneRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<NodeKind>,
    /// Case-insensitivity belongs in the pattern itself (`(?i)...`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    pub lane: Lane,
}

impl LaneRule {
    pub fn kind(kind: NodeKind, lane: Lane) -> Self {
        Self {
            kind: Some(kind),
            pattern: None,
            lane,
        }
    }

    pub fn label(pattern: impl Into<String>, lane: Lane) -> Self {
        Self {
            kind: None,
            pattern: Some(pattern.into()),
            lane,
        }
    }

    pub fn kind_and_label(kind: NodeKind, pattern: impl Into<String>, lane: Lane) -> Self {
        Self {
            kind: Some(kind),
            pattern: Some(pattern.into()),
            lane,
        }
    }
}

/// Fixed spacing constants; overlap avoidance is by construction, not by
/// iterative relaxation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LayoutGeometry {
    #[serde(default = "default_base_x")]
    pub base_x: f64,
    #[serde(default = "default_center_y")]
    pub center_y: f64,
    #[serde(default = "default_level_spacing")]
    pub level_spacing: f64,
    #[serde(default = "default_intra_lane_spacing")]
    pub intra_lane_spacing: f64,
    #[serde(default = "default_lane_gap")]
    pub lane_gap: f64,
}

fn default_base_x() -> f64 {
    80.0
}

fn default_center_y() -> f64 {
    360.0
}

fn default_level_spacing() -> f64 {
    220.0
}

fn default_intra_lane_spacing() -> f64 {
    90.0
}

fn default_lane_gap() -> f64 {
    170.0
}

impl Default for LayoutGeometry {
    fn default() -> Self {
        Self {
            base_x: default_base_x(),
            center_y: default_center_y(),
            level_spacing: default_level_spacing(),
            intra_lane_spacing: default_intra_lane_spacing(),
            lane_gap: default_lane_gap(),
        }
    }
}

impl LayoutGeometry {
    /// Base y of the i-th thematic lane, fanned out above and below the
    /// main lane: index 0 above, 1 below, 2 two slots above, and so on.
    pub fn thematic_y(&self, lane_index: usize) -> f64 {
        let step = (lane_index / 2 + 1) as f64;
        let sign = if lane_index % 2 == 0 { -1.0 } else { 1.0 };
        self.center_y + sign * step * self.lane_gap
    }

    pub fn x_for_level(&self, level: u32) -> f64 {
        self.base_x + f64::from(level) * self.level_spacing
    }
}

/// Scale clamp for the viewport. Pan is deliberately unconstrained.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ViewportBounds {
    #[serde(default = "default_min_scale")]
    pub min_scale: f64,
    #[serde(default = "default_max_scale")]
    pub max_scale: f64,
}

fn default_min_scale() -> f64 {
    0.1
}

fn default_max_scale() -> f64 {
    3.0
}

impl Default for ViewportBounds {
    fn default() -> Self {
        Self {
            min_scale: default_min_scale(),
            max_scale: default_max_scale(),
        }
    }
}

/// Everything the graph engine needs: the ordered thematic lane set, the
/// classification rule table, spacing constants, and viewport bounds.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_thematic_lanes")]
    pub thematic_lanes: Vec<String>,
    #[serde(default = "default_rules")]
    pub rules: Vec<LaneRule>,
    #[serde(default)]
    pub geometry: LayoutGeometry,
    #[serde(default)]
    pub viewport: ViewportBounds,
}

fn default_thematic_lanes() -> Vec<String> {
    vec!["news".into(), "financial".into(), "market".into()]
}

// The upstream labels are free-form prose, so routing is keyword-based.
// The exact keyword list is policy, not protocol: it lives here so it can
// be replaced per deployment without touching the engine.
fn default_rules() -> Vec<LaneRule> {
    vec![
        LaneRule::kind(NodeKind::Validation, Lane::Validation),
        LaneRule::kind_and_label(
            NodeKind::Inference,
            r"(?i)master|final|comprehensive",
            Lane::Final,
        ),
        LaneRule::label(r"(?i)news|sentiment|headline|social", Lane::thematic("news")),
        LaneRule::label(
            r"(?i)earnings|financial|revenue|eps|guidance",
            Lane::thematic("financial"),
        ),
        LaneRule::label(
            r"(?i)market|sector|institutional|peer|technical|volume",
            Lane::thematic("market"),
        ),
    ]
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            thematic_lanes: default_thematic_lanes(),
            rules: default_rules(),
            geometry: LayoutGeometry::default(),
            viewport: ViewportBounds::default(),
        }
    }
}

/// Engine loop and session lifecycle knobs.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,
    #[serde(default = "default_snapshot_buffer")]
    pub snapshot_buffer: usize,
    /// Sessions are terminated after this long without an explicit
    /// terminal frame, so an abandoned upstream cannot pin state forever.
    #[serde(default = "default_safety_timeout_secs")]
    pub safety_timeout_secs: u64,
}

fn default_queue_depth() -> usize {
    1024
}

fn default_snapshot_buffer() -> usize {
    64
}

fn default_safety_timeout_secs() -> u64 {
    120
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            queue_depth: default_queue_depth(),
            snapshot_buffer: default_snapshot_buffer(),
            safety_timeout_secs: default_safety_timeout_secs(),
        }
    }
}

/// Gateway configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub bind: BindMode,
    #[serde(default)]
    pub auth: AuthConfig,
}

fn default_port() -> u16 {
    17861
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind: BindMode::default(),
            auth: AuthConfig::default(),
        }
    }
}

/// Bind mode for the gateway
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BindMode {
    #[default]
    Loopback,
    Lan,
}

impl BindMode {
    pub fn to_addr(&self) -> &str {
        match self {
            BindMode::Loopback => "127.0.0.1",
            BindMode::Lan => "0.0.0.0",
        }
    }
}

/// Authentication configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub mode: AuthMode,
    pub token: Option<String>,
}

/// Authentication mode
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    #[default]
    Token,
    None,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_rules_route_validation_first() {
        let config = EngineConfig::default();
        assert_eq!(config.rules[0].kind, Some(NodeKind::Validation));
        assert_eq!(config.rules[0].lane, Lane::Validation);
        assert_eq!(config.thematic_lanes.len(), 3);
    }

    #[test]
    fn thematic_lanes_alternate_around_center() {
        let geometry = LayoutGeometry::default();
        assert!(geometry.thematic_y(0) < geometry.center_y);
        assert!(geometry.thematic_y(1) > geometry.center_y);
        assert!(geometry.thematic_y(2) < geometry.thematic_y(0));
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let config: EngineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.viewport.max_scale, 3.0);
        assert_eq!(config.geometry.level_spacing, 220.0);
    }

    #[test]
    fn partial_override_keeps_remaining_defaults() {
        let config: RuntimeConfig =
            serde_json::from_str(r#"{"safety_timeout_secs": 30}"#).unwrap();
        assert_eq!(config.safety_timeout_secs, 30);
        assert_eq!(config.queue_depth, 1024);
    }
}
