//! WebSocket frame parsing and serialization (RFC 6455).
//!
//! Only what a client needs: parse unmasked server frames, write masked
//! client frames. No extensions are negotiated, so any RSV bit is an error.

use bytes::{BufMut, BytesMut};

use crate::error::{Error, Result};
use crate::protocol::OpCode;
use crate::protocol::mask::apply_mask;

/// Maximum payload size for control frames.
pub const MAX_CONTROL_FRAME_PAYLOAD: usize = 125;

/// Close status used when the probe ends a session.
pub const CLOSE_NORMAL: u16 = 1000;

/// A single WebSocket frame.
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-------+-+-------------+-------------------------------+
/// |F|R|R|R| opcode|M| Payload len |    Extended payload length    |
/// |I|S|S|S|  (4)  |A|     (7)     |             (16/64)           |
/// |N|V|V|V|       |S|             |   (if payload len==126/127)   |
/// +-+-+-+-+-------+-+-------------+-------------------------------+
/// |     Masking key (client frames only)  |     Payload data      |
/// +---------------------------------------+-----------------------+
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Final fragment flag.
    pub fin: bool,
    /// Frame opcode.
    pub opcode: OpCode,
    payload: Vec<u8>,
}

impl Frame {
    /// Create a new frame.
    #[must_use]
    pub fn new(fin: bool, opcode: OpCode, payload: Vec<u8>) -> Self {
        Self {
            fin,
            opcode,
            payload,
        }
    }

    /// Create a final text frame.
    #[must_use]
    pub fn text(data: impl Into<String>) -> Self {
        Self::new(true, OpCode::Text, data.into().into_bytes())
    }

    /// Create a close frame with optional status code and reason.
    #[must_use]
    pub fn close(code: Option<u16>, reason: &str) -> Self {
        let payload = match code {
            Some(code) => {
                let mut data = code.to_be_bytes().to_vec();
                data.extend_from_slice(reason.as_bytes());
                data
            }
            None => Vec::new(),
        };
        Self::new(true, OpCode::Close, payload)
    }

    /// Create a pong frame echoing a ping payload.
    #[must_use]
    pub fn pong(data: impl Into<Vec<u8>>) -> Self {
        Self::new(true, OpCode::Pong, data.into())
    }

    /// Payload bytes.
    #[inline]
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Take ownership of the payload.
    #[must_use]
    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    /// Status code of a close frame, if it carries one.
    #[must_use]
    pub fn close_code(&self) -> Option<u16> {
        match (self.opcode, self.payload.as_slice()) {
            (OpCode::Close, [hi, lo, ..]) => Some(u16::from_be_bytes([*hi, *lo])),
            _ => None,
        }
    }

    /// Parse one frame from the front of `buf`.
    ///
    /// Returns the frame and the number of bytes consumed. Masked frames are
    /// unmasked; callers that must reject them check the header themselves.
    ///
    /// # Errors
    ///
    /// - `Error::IncompleteFrame` if `buf` does not yet hold a whole frame
    /// - `Error::FrameTooLarge` if the declared payload exceeds `max_payload`
    /// - `Error::ReservedOpcode` / `Error::InvalidFrame` for malformed headers
    pub fn parse(buf: &[u8], max_payload: usize) -> Result<(Self, usize)> {
        need(buf, 2)?;

        let fin = buf[0] & 0x80 != 0;
        if buf[0] & 0x70 != 0 {
            return Err(Error::InvalidFrame(
                "reserved bits set without negotiated extension".into(),
            ));
        }
        let opcode = OpCode::from_u8(buf[0] & 0x0F)?;
        let masked = buf[1] & 0x80 != 0;

        let (declared, mut offset) = match buf[1] & 0x7F {
            126 => {
                need(buf, 4)?;
                (u64::from(u16::from_be_bytes([buf[2], buf[3]])), 4)
            }
            127 => {
                need(buf, 10)?;
                let mut len = [0u8; 8];
                len.copy_from_slice(&buf[2..10]);
                (u64::from_be_bytes(len), 10)
            }
            n => (u64::from(n), 2),
        };

        if declared > max_payload as u64 {
            return Err(Error::FrameTooLarge {
                size: declared,
                max: max_payload,
            });
        }
        // Bounded by max_payload, so this fits in usize.
        let len = declared as usize;

        let mask = if masked {
            need(buf, offset + 4)?;
            let key = [buf[offset], buf[offset + 1], buf[offset + 2], buf[offset + 3]];
            offset += 4;
            Some(key)
        } else {
            None
        };

        need(buf, offset + len)?;
        let mut payload = buf[offset..offset + len].to_vec();
        if let Some(key) = mask {
            apply_mask(&mut payload, key);
        }

        let frame = Self::new(fin, opcode, payload);
        frame.validate()?;
        Ok((frame, offset + len))
    }

    /// Check control frame constraints.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidFrame` if a control frame is fragmented or its
    /// payload exceeds 125 bytes.
    pub fn validate(&self) -> Result<()> {
        if self.opcode.is_control() {
            if !self.fin {
                return Err(Error::InvalidFrame(
                    "control frames cannot be fragmented".into(),
                ));
            }
            if self.payload.len() > MAX_CONTROL_FRAME_PAYLOAD {
                return Err(Error::InvalidFrame(format!(
                    "control frame payload too large: {} bytes",
                    self.payload.len()
                )));
            }
        }
        Ok(())
    }

    /// Append the wire encoding of this frame to `dst`, masking with `mask`.
    pub fn encode(&self, dst: &mut BytesMut, mask: Option<[u8; 4]>) {
        let len = self.payload.len();
        let mask_bit = if mask.is_some() { 0x80 } else { 0 };

        let mut byte0 = self.opcode.as_u8();
        if self.fin {
            byte0 |= 0x80;
        }

        dst.reserve(self.wire_size(mask.is_some()));
        dst.put_u8(byte0);
        if len <= 125 {
            dst.put_u8(mask_bit | len as u8);
        } else if len <= usize::from(u16::MAX) {
            dst.put_u8(mask_bit | 126);
            dst.put_u16(len as u16);
        } else {
            dst.put_u8(mask_bit | 127);
            dst.put_u64(len as u64);
        }

        match mask {
            Some(key) => {
                dst.put_slice(&key);
                let start = dst.len();
                dst.put_slice(&self.payload);
                apply_mask(&mut dst[start..], key);
            }
            None => dst.put_slice(&self.payload),
        }
    }

    /// Number of bytes [`Frame::encode`] will append.
    #[must_use]
    pub fn wire_size(&self, masked: bool) -> usize {
        let len = self.payload.len();
        let extended = match len {
            0..=125 => 0,
            126..=65535 => 2,
            _ => 8,
        };
        let mask_len = if masked { 4 } else { 0 };
        2 + extended + mask_len + len
    }
}

#[inline]
fn need(buf: &[u8], n: usize) -> Result<()> {
    if buf.len() < n {
        Err(Error::IncompleteFrame {
            needed: n - buf.len(),
        })
    } else {
        Ok(())
    }
}
