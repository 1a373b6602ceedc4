use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::config::Limits;
use crate::error::{Error, Result};
use crate::protocol::{ClientRequest, HandshakeResponse, WsTarget};

/// Perform the client opening handshake on `stream`.
///
/// Returns any bytes the server sent after the end of its response headers;
/// they belong to the first frames of the session.
///
/// # Errors
///
/// - `Error::InvalidHandshake` for a rejected or oversized response
/// - `Error::ConnectionClosed` if the server hangs up mid-handshake
/// - I/O errors
pub async fn client_handshake<S>(
    stream: &mut S,
    target: &WsTarget,
    limits: &Limits,
) -> Result<BytesMut>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let request = ClientRequest::new(target.clone())?;
    let mut out = Vec::new();
    request.write(&mut out);
    stream.write_all(&out).await?;
    stream.flush().await?;

    let mut buf = BytesMut::with_capacity(1024);
    let header_len = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
        limits.check_handshake_size(buf.len())?;
        if stream.read_buf(&mut buf).await? == 0 {
            return Err(Error::ConnectionClosed);
        }
    };
    limits.check_handshake_size(header_len)?;

    let head = buf.split_to(header_len);
    let response = HandshakeResponse::parse(&head)?;
    response.verify(&request.key)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::compute_accept_key;
    use tokio::io::{AsyncBufReadExt, BufReader, duplex};

    async fn read_request_key<S: AsyncRead + Unpin>(server: &mut BufReader<S>) -> String {
        let mut key = String::new();
        loop {
            let mut line = String::new();
            server.read_line(&mut line).await.unwrap();
            if let Some(value) = line.strip_prefix("Sec-WebSocket-Key:") {
                key = value.trim().to_string();
            }
            if line == "\r\n" {
                return key;
            }
        }
    }

    #[tokio::test]
    async fn test_handshake_success_keeps_trailing_bytes() {
        let (mut client, server) = duplex(4096);
        let target = WsTarget::parse("ws://localhost/echo").unwrap();

        let server = tokio::spawn(async move {
            let mut server = BufReader::new(server);
            let key = read_request_key(&mut server).await;
            let response = format!(
                "HTTP/1.1 101 Switching Protocols\r\n\
                 Upgrade: websocket\r\n\
                 Connection: Upgrade\r\n\
                 Sec-WebSocket-Accept: {}\r\n\
                 \r\n",
                compute_accept_key(&key)
            );
            let mut server = server.into_inner();
            server.write_all(response.as_bytes()).await.unwrap();
            server.write_all(&[0x81, 0x02, b'h', b'i']).await.unwrap();
            server
        });

        let rest = client_handshake(&mut client, &target, &Limits::default())
            .await
            .unwrap();
        let _server = server.await.unwrap();

        // The trailing frame may or may not have arrived with the headers.
        assert!(rest.is_empty() || &rest[..] == [0x81, 0x02, b'h', b'i']);
    }

    #[tokio::test]
    async fn test_handshake_rejects_bad_accept() {
        let (mut client, server) = duplex(4096);
        let target = WsTarget::parse("ws://localhost/").unwrap();

        tokio::spawn(async move {
            let mut server = BufReader::new(server);
            read_request_key(&mut server).await;
            let mut server = server.into_inner();
            server
                .write_all(
                    b"HTTP/1.1 101 Switching Protocols\r\n\
                      Upgrade: websocket\r\n\
                      Connection: Upgrade\r\n\
                      Sec-WebSocket-Accept: bogus\r\n\r\n",
                )
                .await
                .unwrap();
            // Keep the stream open until the client is done.
            tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        });

        let err = client_handshake(&mut client, &target, &Limits::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidHandshake(_)));
    }

    #[tokio::test]
    async fn test_handshake_server_hangs_up() {
        let (mut client, server) = duplex(4096);
        let target = WsTarget::parse("ws://localhost/").unwrap();

        tokio::spawn(async move {
            let mut server = BufReader::new(server);
            read_request_key(&mut server).await;
        });

        let err = client_handshake(&mut client, &target, &Limits::default())
            .await
            .unwrap_err();
        assert_eq!(err, Error::ConnectionClosed);
    }

    #[tokio::test]
    async fn test_handshake_oversized_response() {
        let (mut client, server) = duplex(64 * 1024);
        let target = WsTarget::parse("ws://localhost/").unwrap();
        let limits = Limits {
            max_handshake_size: 256,
            ..Limits::default()
        };

        tokio::spawn(async move {
            let mut server = BufReader::new(server);
            read_request_key(&mut server).await;
            let mut server = server.into_inner();
            let padding = format!("HTTP/1.1 101 OK\r\nX-Pad: {}\r\n", "a".repeat(4096));
            let _ = server.write_all(padding.as_bytes()).await;
            tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        });

        let err = client_handshake(&mut client, &target, &limits)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidHandshake(msg) if msg.contains("too large")));
    }
}
