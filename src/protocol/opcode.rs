//! WebSocket frame opcodes as defined in RFC 6455.

use crate::error::{Error, Result};

/// WebSocket frame opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpCode {
    /// Continuation of a fragmented message (0x0).
    Continuation = 0x0,
    /// UTF-8 text (0x1).
    Text = 0x1,
    /// Binary data (0x2). Received binary messages are not routed to tests.
    Binary = 0x2,
    /// Close (0x8).
    Close = 0x8,
    /// Ping (0x9). Answered with a pong by the endpoint.
    Ping = 0x9,
    /// Pong (0xA).
    Pong = 0xA,
}

impl OpCode {
    /// Create an `OpCode` from the low nibble of the first header byte.
    ///
    /// # Errors
    ///
    /// Returns `Error::ReservedOpcode` for 0x3-0x7 and 0xB-0xF.
    pub fn from_u8(byte: u8) -> Result<Self> {
        match byte {
            0x0 => Ok(OpCode::Continuation),
            0x1 => Ok(OpCode::Text),
            0x2 => Ok(OpCode::Binary),
            0x8 => Ok(OpCode::Close),
            0x9 => Ok(OpCode::Ping),
            0xA => Ok(OpCode::Pong),
            other => Err(Error::ReservedOpcode(other)),
        }
    }

    /// Convert to the raw nibble value.
    #[inline]
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Close, Ping and Pong are control opcodes.
    #[inline]
    #[must_use]
    pub const fn is_control(self) -> bool {
        matches!(self, OpCode::Close | OpCode::Ping | OpCode::Pong)
    }
}

impl std::fmt::Display for OpCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            OpCode::Continuation => "Continuation",
            OpCode::Text => "Text",
            OpCode::Binary => "Binary",
            OpCode::Close => "Close",
            OpCode::Ping => "Ping",
            OpCode::Pong => "Pong",
        };
        f.write_str(name)
    }
}
