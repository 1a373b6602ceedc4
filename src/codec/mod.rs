//! Async framing over tokio I/O halves.

mod framed;
mod upgrade;

pub use framed::{FrameReader, FrameWriter};
pub use upgrade::client_handshake;
