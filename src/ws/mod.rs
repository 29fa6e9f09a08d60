//! World bridge WebSocket endpoint

pub mod handler;
pub mod protocol;
