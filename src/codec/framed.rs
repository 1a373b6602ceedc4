use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::config::Limits;
use crate::error::{Error, Result};
use crate::protocol::{Frame, MaskGenerator};

const READ_CHUNK: usize = 4096;

/// Reads server frames from the read half of a session.
pub struct FrameReader<R> {
    io: R,
    buf: BytesMut,
    limits: Limits,
}

impl<R> FrameReader<R> {
    /// Create a reader. `buffered` holds bytes already read past the
    /// handshake response.
    #[must_use]
    pub fn new(io: R, buffered: BytesMut, limits: Limits) -> Self {
        Self {
            io,
            buf: buffered,
            limits,
        }
    }
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    /// Read the next complete frame.
    ///
    /// # Errors
    ///
    /// - `Error::ConnectionClosed` on EOF
    /// - `Error::InvalidFrame` if the server masked a frame
    /// - Parse and I/O errors
    pub async fn read_frame(&mut self) -> Result<Frame> {
        loop {
            if self.buf.len() >= 2 {
                if self.buf[1] & 0x80 != 0 {
                    return Err(Error::InvalidFrame("server frame must not be masked".into()));
                }
                match Frame::parse(&self.buf, self.limits.max_frame_size) {
                    Ok((frame, consumed)) => {
                        self.buf.advance(consumed);
                        return Ok(frame);
                    }
                    Err(Error::IncompleteFrame { .. }) => {}
                    Err(e) => return Err(e),
                }
            }

            self.buf.reserve(READ_CHUNK);
            let n = self.io.read_buf(&mut self.buf).await?;
            if n == 0 {
                return Err(Error::ConnectionClosed);
            }
        }
    }
}

/// Writes masked client frames to the write half of a session.
pub struct FrameWriter<W> {
    io: W,
    buf: BytesMut,
    masks: MaskGenerator,
}

impl<W> FrameWriter<W> {
    #[must_use]
    pub fn new(io: W) -> Self {
        Self {
            io,
            buf: BytesMut::with_capacity(READ_CHUNK),
            masks: MaskGenerator::new(),
        }
    }
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    /// Mask, write and flush one frame.
    pub async fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        self.buf.clear();
        frame.encode(&mut self.buf, Some(self.masks.next_mask()));
        self.io.write_all(&self.buf).await?;
        self.io.flush().await?;
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<()> {
        self.io.shutdown().await?;
        Ok(())
    }
}
