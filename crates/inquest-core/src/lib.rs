//! Core types for Inquest: the node model, wire protocol, error taxonomy,
//! and configuration shared by the graph engine, runtime, and gateway.

pub mod config;
pub mod error;
pub mod protocol;
pub mod types;

pub use config::{
    AuthConfig, AuthMode, BindMode, EngineConfig, GatewayConfig, LaneRule, LayoutGeometry,
    RuntimeConfig, ViewportBounds,
};
pub use error::{Diagnostic, Error, Result};
pub use protocol::{Interaction, UpdateFrame, UpdateKind};
pub use types::{
    Article, DecisionPayload, EarningsPayload, Edge, EdgeKind, InferencePayload, Lane,
    LayoutPosition, MarketPayload, Node, NodeId, NodeKind, NodeRecord, NodeStatus, Payload,
    PricePayload, SentimentPayload, ValidationPayload, ViewState,
};
