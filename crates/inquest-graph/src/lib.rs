//! Incremental DAG layout and interactive rendering engine
//!
//! Ingests an ordered stream of node-arrival frames for a graph whose final
//! shape is unknown, classifies nodes into investigation lanes, computes
//! stable 2-D positions and edge routes, and composes them with pan/zoom
//! and expand/collapse state into an immutable [`Snapshot`] — the only
//! surface presentation layers read.

pub mod edges;
pub mod engine;
pub mod expansion;
pub mod lanes;
pub mod layout;
pub mod store;
pub mod viewport;

pub use edges::EdgeResolver;
pub use engine::{GraphEngine, IngestOutcome, Snapshot, StatusCounts};
pub use expansion::ExpansionState;
pub use lanes::LaneClassifier;
pub use layout::{LayoutEngine, Placement};
pub use store::{ChangeSet, NodeStore};
pub use viewport::ViewportController;
