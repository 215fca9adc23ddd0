//! HTTP and WebSocket request handlers
//!
//! - `api` - Health check endpoint
//! - `uniproxy` - Device protocol WebSocket

pub mod api;
pub mod uniproxy;

pub use uniproxy::uniproxy_handler;
