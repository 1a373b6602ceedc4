use std::sync::{Arc, Mutex, PoisonError};

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;

use crate::codec::{FrameReader, FrameWriter, client_handshake};
use crate::config::{Config, Limits};
use crate::connection::ConnectionState;
use crate::connection::state::SharedState;
use crate::error::{Error, Result};
use crate::protocol::frame::CLOSE_NORMAL;
use crate::protocol::{AssembledMessage, Frame, MessageAssembler, OpCode, WsTarget};

type Handler = Arc<dyn Fn(String) + Send + Sync>;
type BoxedWrite = Box<dyn AsyncWrite + Send + Unpin>;
type SharedWriter = Arc<tokio::sync::Mutex<FrameWriter<BoxedWrite>>>;

struct Shared {
    state: SharedState,
    handler: Mutex<Option<Handler>>,
}

impl Shared {
    fn dispatch(&self, text: String, uri: &str) {
        // Clone out of the slot so the handler runs without the lock held.
        let handler = self
            .handler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match handler {
            Some(handler) => handler(text),
            None => tracing::debug!(uri = %uri, "no handler registered; dropping message"),
        }
    }
}

/// One live WebSocket session to the endpoint under test.
///
/// Outbound text goes through [`Endpoint::send`]. Inbound text messages are
/// handed to the single handler registered with [`Endpoint::set_handler`],
/// which runs on the endpoint's reader task. Pings are answered and close
/// frames are acknowledged without involving the handler.
///
/// Dropping the endpoint stops its reader task.
///
/// ## Example
///
/// ```rust,ignore
/// use wsprobe::{Config, Endpoint};
///
/// let endpoint = Endpoint::open("ws://127.0.0.1:9001/echo", &Config::default()).await?;
/// endpoint.set_handler(|text| println!("received {text}"));
/// endpoint.send("Hello Server").await?;
/// ```
pub struct Endpoint {
    uri: String,
    writer: SharedWriter,
    shared: Arc<Shared>,
    reader: JoinHandle<()>,
}

impl Endpoint {
    /// Connect to `uri` and complete the opening handshake.
    ///
    /// The TCP connect and the handshake together are bounded by
    /// `config.timeouts.handshake`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Connection` if the URI is invalid, the connection is
    /// refused, the handshake is rejected, or the deadline passes.
    pub async fn open(uri: &str, config: &Config) -> Result<Self> {
        let target = WsTarget::parse(uri).map_err(|e| Error::Connection(e.to_string()))?;
        let limits = &config.limits;
        let deadline = config.timeouts.handshake;

        let connect = async {
            let mut stream = TcpStream::connect(target.socket_addr()).await?;
            stream.set_nodelay(true)?;
            let buffered = client_handshake(&mut stream, &target, limits).await?;
            Ok::<_, Error>((stream, buffered))
        };

        let (stream, buffered) = tokio::time::timeout(deadline, connect)
            .await
            .map_err(|_| Error::Connection(format!("{uri}: handshake timed out after {deadline:?}")))?
            .map_err(|e| Error::Connection(format!("{uri}: {e}")))?;

        tracing::info!(uri = %uri, "WebSocket session established");
        Ok(Self::from_upgraded(uri, stream, buffered, limits.clone()))
    }

    /// Wrap a stream on which the opening handshake has already completed.
    ///
    /// `buffered` holds bytes read past the handshake response. Must be called
    /// from within a tokio runtime.
    pub fn from_upgraded<S>(
        uri: impl Into<String>,
        stream: S,
        buffered: BytesMut,
        limits: Limits,
    ) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let uri = uri.into();
        let (read_half, write_half) = tokio::io::split(stream);
        let writer: SharedWriter = Arc::new(tokio::sync::Mutex::new(FrameWriter::new(
            Box::new(write_half) as BoxedWrite,
        )));
        let shared = Arc::new(Shared {
            state: SharedState::new(ConnectionState::Open),
            handler: Mutex::new(None),
        });

        let reader = tokio::spawn(read_loop(
            FrameReader::new(read_half, buffered, limits.clone()),
            MessageAssembler::new(limits),
            writer.clone(),
            shared.clone(),
            uri.clone(),
        ));

        Self {
            uri,
            writer,
            shared,
            reader,
        }
    }

    /// The URI this endpoint was opened with.
    #[must_use]
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Current session state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.shared.state.load()
    }

    /// Check if the session is open for sending.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state().can_send()
    }

    /// Register the inbound message handler, replacing any previous one.
    pub fn set_handler<F>(&self, handler: F)
    where
        F: Fn(String) + Send + Sync + 'static,
    {
        *self
            .shared
            .handler
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(handler));
    }

    /// Send one text message. Does not wait for any reply.
    ///
    /// # Errors
    ///
    /// Returns `Error::Send` if the session is not open or the write fails.
    /// A failed write marks the session closed.
    pub async fn send(&self, payload: &str) -> Result<()> {
        let state = self.shared.state.load();
        if !state.can_send() {
            return Err(Error::Send(format!("session is {state}")));
        }

        let mut writer = self.writer.lock().await;
        writer
            .write_frame(&Frame::text(payload))
            .await
            .map_err(|e| {
                self.shared.state.store(ConnectionState::Closed);
                Error::Send(e.to_string())
            })?;
        tracing::trace!(uri = %self.uri, len = payload.len(), "text frame sent");
        Ok(())
    }

    /// Start the closing handshake with status 1000.
    ///
    /// Does nothing if the session is not open.
    ///
    /// # Errors
    ///
    /// Returns `Error::Send` if the close frame cannot be written.
    pub async fn close(&self) -> Result<()> {
        if !self
            .shared
            .state
            .transition(ConnectionState::Open, ConnectionState::Closing)
        {
            return Ok(());
        }
        let mut writer = self.writer.lock().await;
        writer
            .write_frame(&Frame::close(Some(CLOSE_NORMAL), ""))
            .await
            .map_err(|e| Error::Send(e.to_string()))
    }
}

impl Drop for Endpoint {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("uri", &self.uri)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

async fn read_loop<R>(
    mut reader: FrameReader<R>,
    mut assembler: MessageAssembler,
    writer: SharedWriter,
    shared: Arc<Shared>,
    uri: String,
) where
    R: AsyncRead + Unpin,
{
    loop {
        let frame = match reader.read_frame().await {
            Ok(frame) => frame,
            Err(Error::ConnectionClosed) => {
                tracing::debug!(uri = %uri, "peer closed the connection");
                break;
            }
            Err(e) => {
                tracing::warn!(uri = %uri, error = %e, "read failed; closing session");
                break;
            }
        };
        tracing::trace!(uri = %uri, opcode = %frame.opcode, len = frame.payload().len(), "frame received");

        match frame.opcode {
            OpCode::Ping => {
                let pong = Frame::pong(frame.into_payload());
                if let Err(e) = writer.lock().await.write_frame(&pong).await {
                    tracing::warn!(uri = %uri, error = %e, "failed to answer ping");
                    break;
                }
            }
            OpCode::Pong => {}
            OpCode::Close => {
                let code = frame.close_code();
                if shared
                    .state
                    .transition(ConnectionState::Open, ConnectionState::Closing)
                {
                    let _ = writer.lock().await.write_frame(&Frame::close(code, "")).await;
                }
                tracing::info!(uri = %uri, code = ?code, "session closed");
                break;
            }
            OpCode::Text | OpCode::Binary | OpCode::Continuation => match assembler.push(frame) {
                Ok(Some(AssembledMessage::Text(text))) => shared.dispatch(text, &uri),
                Ok(Some(AssembledMessage::Binary(data))) => {
                    tracing::debug!(uri = %uri, len = data.len(), "ignoring binary message");
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(uri = %uri, error = %e, "invalid message; closing session");
                    break;
                }
            },
        }
    }

    shared.state.store(ConnectionState::Closed);
    let _ = writer.lock().await.shutdown().await;
}
