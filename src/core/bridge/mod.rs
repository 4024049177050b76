//! Per-connection session bridge.
//!
//! A session reads the client's setup frame, opens one live model session,
//! then runs two relays until either side stops:
//!
//! - uplink: client media → model
//! - downlink: model events → client, executing tool calls on the way
//!
//! Both relays share the model sink through [`SessionWriter`] and one
//! cancellation token. The first relay to exit cancels the other, and the
//! model session is closed before [`SessionBridge::run`] returns.

mod downlink;
mod session;
mod uplink;

pub use session::{
    BridgeError, ClientInbound, RelayExit, SessionBridge, SessionOutcome, SessionStats,
    SessionWriter, StatsSnapshot,
};
