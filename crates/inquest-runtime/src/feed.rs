//! Playback feeds — scripted and demo investigation streams
//!
//! The engine never decides investigation content; it only renders what an
//! upstream produces. These feeds stand in for that upstream: `ScriptFeed`
//! replays a JSONL capture, `DemoFeed` generates the canonical multi-branch
//! stock investigation (price fetch → branching decision → parallel
//! news/earnings/market threads → cross-validation → master inference)
//! with paced delivery, for demos and end-to-end tests.

use crate::queue::SessionHandle;
use async_trait::async_trait;
use chrono::Utc;
use inquest_core::{NodeId, NodeKind, NodeRecord, NodeStatus, Result, UpdateFrame, UpdateKind};
use serde_json::json;
use std::collections::VecDeque;
use std::path::Path;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

/// An ordered source of upstream frames with its own pacing.
#[async_trait]
pub trait FeedSource: Send {
    fn investigation_id(&self) -> &str;

    /// The next frame, or None when the stream is drained.
    async fn next_frame(&mut self) -> Option<UpdateFrame>;
}

/// Pump a feed into a session until it drains. Returns the number of
/// frames delivered.
pub async fn drive<S: FeedSource>(mut source: S, session: &SessionHandle) -> Result<usize> {
    let mut delivered = 0;
    while let Some(frame) = source.next_frame().await {
        session.ingest(frame).await?;
        delivered += 1;
    }
    info!(
        investigation = source.investigation_id(),
        frames = delivered,
        "feed drained"
    );
    Ok(delivered)
}

// ---------------------------------------------------------------------------
// ScriptFeed — replay a JSONL capture
// ---------------------------------------------------------------------------

/// Replays update frames from a JSONL file, one frame per line. Blank
/// lines and `#` comments are skipped.
pub struct ScriptFeed {
    investigation_id: String,
    frames: VecDeque<UpdateFrame>,
    delay: Duration,
}

impl ScriptFeed {
    pub fn from_path(path: &Path, delay: Duration) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let mut frames = VecDeque::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            frames.push_back(serde_json::from_str::<UpdateFrame>(line)?);
        }
        let investigation_id = frames
            .front()
            .map(|f| f.investigation_id.clone())
            .unwrap_or_else(|| "script".to_string());
        Ok(Self {
            investigation_id,
            frames,
            delay,
        })
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

#[async_trait]
impl FeedSource for ScriptFeed {
    fn investigation_id(&self) -> &str {
        &self.investigation_id
    }

    async fn next_frame(&mut self) -> Option<UpdateFrame> {
        let frame = self.frames.pop_front()?;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Some(frame)
    }
}

// ---------------------------------------------------------------------------
// DemoFeed — the canned multi-branch investigation
// ---------------------------------------------------------------------------

/// Generates a complete investigation session for a symbol. Content is
/// fixed; only ids and timestamps are fresh per run.
pub struct DemoFeed {
    investigation_id: String,
    frames: VecDeque<UpdateFrame>,
    delay: Duration,
}

impl DemoFeed {
    pub fn new(symbol: &str, delay: Duration) -> Self {
        let investigation_id = format!("inv-{}", Uuid::new_v4());
        let frames = demo_frames(&investigation_id, symbol);
        Self {
            investigation_id,
            frames,
            delay,
        }
    }
}

#[async_trait]
impl FeedSource for DemoFeed {
    fn investigation_id(&self) -> &str {
        &self.investigation_id
    }

    async fn next_frame(&mut self) -> Option<UpdateFrame> {
        let frame = self.frames.pop_front()?;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Some(frame)
    }
}

fn record(
    id: &NodeId,
    kind: NodeKind,
    label: String,
    description: String,
    status: NodeStatus,
    data: serde_json::Value,
    parent: Option<&NodeId>,
) -> NodeRecord {
    NodeRecord {
        id: id.clone(),
        kind,
        label,
        description,
        status,
        data,
        parent_id: parent.cloned(),
        children_ids: Vec::new(),
        created_at: Utc::now(),
        completed_at: if status == NodeStatus::Completed {
            Some(Utc::now())
        } else {
            None
        },
    }
}

fn demo_frames(investigation_id: &str, symbol: &str) -> VecDeque<UpdateFrame> {
    let root = NodeId::new(format!("{investigation_id}-price"));
    let decision = NodeId::new(format!("{investigation_id}-decision"));
    let news = NodeId::new(format!("{investigation_id}-news"));
    let earnings = NodeId::new(format!("{investigation_id}-earnings"));
    let market = NodeId::new(format!("{investigation_id}-market"));
    let validation = NodeId::new(format!("{investigation_id}-validation"));
    let master = NodeId::new(format!("{investigation_id}-master"));

    let price_data = json!({
        "symbol": symbol,
        "start_price": 95.0,
        "end_price": 100.0,
        "price_change_percent": 5.26,
        "movement_significance": "significant",
    });

    let mut frames = VecDeque::new();

    // The root goes out twice: created in progress, then completed — the
    // same shape the live backend streams.
    frames.push_back(UpdateFrame::node_created(
        investigation_id,
        record(
            &root,
            NodeKind::DataFetch,
            format!("Fetch {symbol} Price Data"),
            format!("Retrieving {symbol} price history for the analysis window"),
            NodeStatus::InProgress,
            price_data.clone(),
            None,
        ),
    ));
    frames.push_back(UpdateFrame::node_completed(
        investigation_id,
        record(
            &root,
            NodeKind::DataFetch,
            format!("Fetch {symbol} Price Data"),
            format!(
                "Retrieved price data showing movement from $95.00 to $100.00, \
                 a +5.26% change over the analysis period"
            ),
            NodeStatus::Completed,
            price_data,
            None,
        ),
    ));

    frames.push_back(UpdateFrame::node_created(
        investigation_id,
        record(
            &decision,
            NodeKind::Decision,
            "AI Agent Decision: Multi-Branch Investigation Strategy".to_string(),
            format!(
                "Agent decided to investigate 3 hypotheses through parallel \
                 threads for the +5.26% move in {symbol}"
            ),
            NodeStatus::Completed,
            json!({
                "investigation_hypotheses": [
                    "Company-specific news or announcement",
                    "Market sentiment shift",
                    "Analyst coverage or rating change",
                ],
                "parallel_threads": ["news_sentiment", "earnings_deep_dive", "market_context"],
                "decision_confidence": 0.85,
            }),
            Some(&root),
        ),
    ));

    frames.push_back(UpdateFrame::node_created(
        investigation_id,
        record(
            &news,
            NodeKind::Analysis,
            format!("Sentiment Analysis: {symbol} News"),
            format!("Processed 3 recent articles for {symbol}: 67% positive"),
            NodeStatus::Completed,
            json!({
                "overall_sentiment": "positive",
                "sentiment_score": 0.75,
                "news_articles": [
                    {"headline": format!("{symbol} surges on strong quarterly results"),
                     "sentiment": "positive"},
                    {"headline": format!("Analysts upgrade {symbol} price target"),
                     "sentiment": "positive"},
                    {"headline": format!("Mixed signals for {symbol} outlook"),
                     "sentiment": "neutral"},
                ],
            }),
            Some(&decision),
        ),
    ));

    frames.push_back(UpdateFrame::node_created(
        investigation_id,
        record(
            &earnings,
            NodeKind::Analysis,
            format!("Earnings Analysis: {symbol} Financial Performance"),
            format!("Deep analysis of {symbol} earnings data and financial metrics"),
            NodeStatus::Completed,
            json!({
                "eps_beat": true,
                "earnings_surprise": 4.2,
                "revenue_growth": 9.8,
                "guidance_impact": "positive",
            }),
            Some(&decision),
        ),
    ));

    frames.push_back(UpdateFrame::node_created(
        investigation_id,
        record(
            &market,
            NodeKind::Analysis,
            format!("Market Context: {symbol} Sector Analysis"),
            format!("Broader market conditions and sector performance around {symbol}"),
            NodeStatus::Completed,
            json!({
                "sector_performance": 2.1,
                "market_sentiment": "bullish",
                "relative_strength": "outperforming",
                "institutional_flow": "buying",
            }),
            Some(&decision),
        ),
    ));

    frames.push_back(UpdateFrame::node_created(
        investigation_id,
        record(
            &validation,
            NodeKind::Validation,
            format!("Agent Cross-Validation: {symbol}"),
            "Cross-validated findings from 3 investigation branches".to_string(),
            NodeStatus::Completed,
            json!({
                "validated_sources": [news.as_str(), earnings.as_str(), market.as_str()],
                "consistency_score": 0.85,
                "validation_results": [
                    "News sentiment aligns with price movement",
                    "Earnings performance supports price increase",
                    "Stock outperforming broader market",
                ],
            }),
            // Aggregates several branches; it has no single spawning parent.
            None,
        ),
    ));

    frames.push_back(UpdateFrame::node_created(
        investigation_id,
        record(
            &master,
            NodeKind::Inference,
            format!("Master Inference: Why {symbol} Price Increased"),
            format!("Comprehensive inference explaining the {symbol} move with 88% confidence"),
            NodeStatus::Completed,
            json!({
                "primary_explanation": format!(
                    "{symbol} rose 5.26% on an earnings beat amplified by positive \
                     news coverage and sector momentum"
                ),
                "confidence_score": 0.88,
                "reasoning_steps": [
                    "Earnings surprise of +4.2% exceeded consensus",
                    "67% positive news coverage reinforced the move",
                    "Stock outperformed a bullish sector",
                ],
                "evidence": [news.as_str(), earnings.as_str(), market.as_str()],
            }),
            Some(&validation),
        ),
    ));

    frames.push_back(UpdateFrame::terminal(
        UpdateKind::InvestigationComplete,
        investigation_id,
        format!("Investigation of {symbol} complete"),
    ));

    frames
}

#[cfg(test)]
mod tests {
    use super::*;
    use inquest_core::{EngineConfig, EdgeKind, Lane};
    use inquest_graph::GraphEngine;
    use pretty_assertions::assert_eq;

    async fn drain(mut feed: impl FeedSource) -> Vec<UpdateFrame> {
        let mut frames = Vec::new();
        while let Some(frame) = feed.next_frame().await {
            frames.push(frame);
        }
        frames
    }

    #[tokio::test]
    async fn demo_feed_populates_every_lane() {
        let feed = DemoFeed::new("ACME", Duration::ZERO);
        let mut engine = GraphEngine::new(EngineConfig::default()).unwrap();
        for frame in drain(feed).await {
            engine.ingest(&frame).unwrap();
        }

        let snap = engine.snapshot();
        assert!(snap.terminated);
        assert_eq!(snap.nodes.len(), 7);
        assert!(snap.diagnostics.is_empty(), "demo payloads are well formed");

        let lanes: Vec<Lane> = snap.positions.iter().map(|p| p.lane.clone()).collect();
        for expected in [
            Lane::Main,
            Lane::thematic("news"),
            Lane::thematic("financial"),
            Lane::thematic("market"),
            Lane::Validation,
            Lane::Final,
        ] {
            assert!(lanes.contains(&expected), "missing lane {expected}");
        }

        // Validation and master inference each cite the three branches.
        let cross = snap
            .edges
            .iter()
            .filter(|e| e.kind == EdgeKind::CrossRef)
            .count();
        assert_eq!(cross, 6);
    }

    #[tokio::test]
    async fn demo_feed_round_trips_through_a_script_file() {
        let feed = DemoFeed::new("ACME", Duration::ZERO);
        let frames = drain(feed).await;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.jsonl");
        let mut lines = vec!["# captured demo session".to_string()];
        for frame in &frames {
            lines.push(serde_json::to_string(frame).unwrap());
        }
        std::fs::write(&path, lines.join("\n")).unwrap();

        let script = ScriptFeed::from_path(&path, Duration::ZERO).unwrap();
        assert_eq!(script.len(), frames.len());
        assert_eq!(script.investigation_id(), frames[0].investigation_id);
    }

    #[tokio::test]
    async fn script_feed_rejects_garbage_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.jsonl");
        std::fs::write(&path, "{not json}").unwrap();
        assert!(ScriptFeed::from_path(&path, Duration::ZERO).is_err());
    }
}
