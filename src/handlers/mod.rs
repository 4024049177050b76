//! HTTP and WebSocket request handlers
//!
//! - `health` - Health check endpoint
//! - `live` - Live session WebSocket bridged to the model

pub mod health;
pub mod live;

// Re-export commonly used handlers for convenient access
pub use health::health_check;
pub use live::live_handler;
