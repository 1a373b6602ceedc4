//! Client-side WebSocket wire protocol (RFC 6455).
//!
//! Sans-I/O building blocks used by the connection endpoint: frame codec,
//! masking, message reassembly and the opening handshake.

pub mod assembler;
pub mod frame;
pub mod handshake;
pub mod mask;
pub mod opcode;

pub use assembler::{AssembledMessage, MessageAssembler};
pub use frame::Frame;
pub use handshake::{ClientRequest, HandshakeResponse, WS_GUID, WsTarget, compute_accept_key};
pub use mask::{MaskGenerator, apply_mask};
pub use opcode::OpCode;
