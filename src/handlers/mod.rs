//! HTTP and WebSocket request handlers
//!
//! - `api` - Health check, session registry and credential endpoints
//! - `realtime` - Voice session WebSocket transport

pub mod api;
pub mod realtime;

// Re-export commonly used handlers for convenient access
pub use realtime::realtime_handler;
