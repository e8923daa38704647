//! WebSocket gateway: the transport glue around the graph engine
//!
//! Viewer clients subscribe to a session and receive a full snapshot per
//! revision; upstream producers push update frames into it. The engine
//! itself never sees the transport — frames and interactions enter through
//! the same session command queue as everywhere else.

pub mod auth;
pub mod server;
pub mod ws;

pub use auth::ResolvedAuth;
pub use server::{start_gateway, GatewayLaunchConfig};
pub use ws::{ClientMessage, ServerMessage, WsState};
