//! The connection endpoint: one live WebSocket session.
//!
//! An [`Endpoint`] is the thin wrapper the connection actor owns. It exposes
//! exactly three things: open a session, send text, and register a single
//! inbound handler.
//!
//! ## Session Lifecycle
//!
//! 1. **Open** - after a successful opening handshake
//! 2. **Closing** - close frame sent by either side
//! 3. **Closed** - close acknowledged, peer gone, or a write failed

mod endpoint;
mod state;

pub use endpoint::Endpoint;
pub use state::ConnectionState;
