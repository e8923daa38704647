//! Session runtime: one engine loop per investigation
//!
//! Wraps the graph engine in the concurrency model it expects — a single
//! consumer draining an ordered command queue — and adds session lifecycle
//! (registry, safety timeout, teardown) plus playback feeds that stand in
//! for the live upstream.

pub mod feed;
pub mod queue;
pub mod session;

pub use feed::{drive, DemoFeed, FeedSource, ScriptFeed};
pub use queue::{EngineCommand, EngineLoop, SessionHandle};
pub use session::SessionRegistry;
