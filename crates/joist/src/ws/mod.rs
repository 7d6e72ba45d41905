//! WebSocket subscriber transport.

mod handler;
mod hub;
mod types;

pub use handler::ws_handler;
pub use hub::{BroadcastForwarder, WsHub, WsSender};
pub use types::{ControlMessage, ServerMessage};
