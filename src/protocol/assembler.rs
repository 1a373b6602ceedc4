//! Reassembly of fragmented data messages (RFC 6455 Section 5.4).

use crate::config::Limits;
use crate::error::{Error, Result};
use crate::protocol::{Frame, OpCode};

/// A complete data message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssembledMessage {
    /// A UTF-8 text message.
    Text(String),
    /// A binary message.
    Binary(Vec<u8>),
}

/// Collects data frames until a frame with FIN set completes the message.
#[derive(Debug)]
pub struct MessageAssembler {
    opcode: Option<OpCode>,
    buffer: Vec<u8>,
    limits: Limits,
}

impl MessageAssembler {
    /// Create an assembler enforcing `limits.max_message_size`.
    #[must_use]
    pub fn new(limits: Limits) -> Self {
        Self {
            opcode: None,
            buffer: Vec::new(),
            limits,
        }
    }

    /// Feed one data frame. Returns the message once it is complete.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidFrame` for continuation frames out of sequence or
    ///   text that is not valid UTF-8
    /// - `Error::FrameTooLarge` if the message exceeds the size limit
    pub fn push(&mut self, frame: Frame) -> Result<Option<AssembledMessage>> {
        if frame.opcode.is_control() {
            return Ok(None);
        }
        match (frame.opcode, self.opcode) {
            (OpCode::Continuation, None) => {
                return Err(Error::InvalidFrame("unexpected continuation frame".into()));
            }
            (OpCode::Continuation, Some(_)) => {}
            (_, Some(_)) => {
                return Err(Error::InvalidFrame("expected continuation frame".into()));
            }
            (opcode, None) => self.opcode = Some(opcode),
        }

        self.limits
            .check_message_size(self.buffer.len() + frame.payload().len())?;

        let fin = frame.fin;
        if self.buffer.is_empty() {
            self.buffer = frame.into_payload();
        } else {
            self.buffer.extend_from_slice(frame.payload());
        }

        if !fin {
            return Ok(None);
        }

        let payload = std::mem::take(&mut self.buffer);
        match self.opcode.take() {
            Some(OpCode::Text) => String::from_utf8(payload)
                .map(|text| Some(AssembledMessage::Text(text)))
                .map_err(|_| Error::InvalidFrame("invalid UTF-8 in text message".into())),
            _ => Ok(Some(AssembledMessage::Binary(payload))),
        }
    }
}
