//! Joist backend library.
//!
//! Relays committed PostgreSQL row mutations to WebSocket subscribers in
//! real time: LISTEN/NOTIFY in, JSON change messages out.

pub mod api;
pub mod config;
pub mod db;
pub mod relay;
pub mod ws;
