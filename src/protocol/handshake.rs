//! Client side of the WebSocket opening handshake (RFC 6455 Section 4.1).

use std::collections::HashMap;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use sha1::{Digest, Sha1};

use crate::error::{Error, Result};

/// The WebSocket GUID used in the Sec-WebSocket-Accept calculation.
pub const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Computes the Sec-WebSocket-Accept value for a Sec-WebSocket-Key.
///
/// ```
/// use wsprobe::protocol::handshake::compute_accept_key;
///
/// let accept = compute_accept_key("dGhlIHNhbXBsZSBub25jZQ==");
/// assert_eq!(accept, "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
/// ```
pub fn compute_accept_key(key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(key.as_bytes());
    hasher.update(WS_GUID.as_bytes());
    BASE64.encode(hasher.finalize())
}

/// Generate a random, base64-encoded 16-byte Sec-WebSocket-Key.
///
/// # Errors
///
/// Returns `Error::Io` if the OS random source is unavailable.
pub fn generate_key() -> Result<String> {
    let mut nonce = [0u8; 16];
    getrandom::getrandom(&mut nonce).map_err(|e| Error::Io(e.to_string()))?;
    Ok(BASE64.encode(nonce))
}

/// The parts of a `ws://` URI needed to connect and upgrade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WsTarget {
    /// Host name or IP literal, without IPv6 brackets.
    pub host: String,
    /// TCP port (80 when the URI omits it).
    pub port: u16,
    /// Request target, including any query string. Never empty.
    pub path: String,
}

impl WsTarget {
    /// Parse a `ws://host[:port][/path][?query]` URI.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidUri` for other schemes (including `wss://`),
    /// a missing host, or a bad port.
    pub fn parse(uri: &str) -> Result<Self> {
        let (scheme, rest) = uri
            .split_once("://")
            .ok_or_else(|| Error::InvalidUri(format!("missing scheme: {uri:?}")))?;
        if !scheme.eq_ignore_ascii_case("ws") {
            return Err(Error::InvalidUri(format!(
                "unsupported scheme {scheme:?} (only ws:// is supported)"
            )));
        }

        let (authority, path) = match rest.find(['/', '?']) {
            Some(i) if rest.as_bytes()[i] == b'/' => (&rest[..i], rest[i..].to_string()),
            Some(i) => (&rest[..i], format!("/{}", &rest[i..])),
            None => (rest, "/".to_string()),
        };
        // Strip userinfo; credentials are not forwarded.
        let authority = authority.rsplit_once('@').map_or(authority, |(_, a)| a);

        let (host, port) = if let Some(bracketed) = authority.strip_prefix('[') {
            let (host, after) = bracketed
                .split_once(']')
                .ok_or_else(|| Error::InvalidUri(format!("unterminated IPv6 literal: {uri:?}")))?;
            (host, after.strip_prefix(':'))
        } else {
            match authority.rsplit_once(':') {
                Some((host, port)) => (host, Some(port)),
                None => (authority, None),
            }
        };

        if host.is_empty() {
            return Err(Error::InvalidUri(format!("missing host: {uri:?}")));
        }
        let port = match port {
            Some(p) => p
                .parse()
                .map_err(|_| Error::InvalidUri(format!("invalid port {p:?}")))?,
            None => 80,
        };

        Ok(Self {
            host: host.to_string(),
            port,
            path,
        })
    }

    /// Address string suitable for `TcpStream::connect`.
    #[must_use]
    pub fn socket_addr(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Value of the Host header.
    #[must_use]
    pub fn host_header(&self) -> String {
        match (self.host.contains(':'), self.port) {
            (true, 80) => format!("[{}]", self.host),
            (false, 80) => self.host.clone(),
            _ => self.socket_addr(),
        }
    }
}

/// The HTTP Upgrade request sent by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientRequest {
    /// Where to connect.
    pub target: WsTarget,
    /// The Sec-WebSocket-Key sent to the server.
    pub key: String,
}

impl ClientRequest {
    /// Build a request for `target` with a fresh random key.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if no random key can be generated.
    pub fn new(target: WsTarget) -> Result<Self> {
        Ok(Self {
            target,
            key: generate_key()?,
        })
    }

    /// Write the HTTP request to a buffer.
    pub fn write(&self, buf: &mut Vec<u8>) {
        let request = format!(
            "GET {} HTTP/1.1\r\n\
             Host: {}\r\n\
             Upgrade: websocket\r\n\
             Connection: Upgrade\r\n\
             Sec-WebSocket-Key: {}\r\n\
             Sec-WebSocket-Version: 13\r\n\
             \r\n",
            self.target.path,
            self.target.host_header(),
            self.key
        );
        buf.extend_from_slice(request.as_bytes());
    }
}

/// The server's handshake response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeResponse {
    /// The Sec-WebSocket-Accept value.
    pub accept: String,
    /// The selected Sec-WebSocket-Protocol, if any.
    pub protocol: Option<String>,
}

impl HandshakeResponse {
    /// Parse the status line and headers of an upgrade response.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHandshake`] if the status is not 101, or the
    /// `Upgrade`, `Connection` or `Sec-WebSocket-Accept` headers are missing
    /// or wrong.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(data)
            .map_err(|_| Error::InvalidHandshake("response is not valid UTF-8".into()))?;
        let mut lines = text.lines();

        let status_line = lines
            .next()
            .ok_or_else(|| Error::InvalidHandshake("empty response".into()))?;
        if !status_line.starts_with("HTTP/1.1 101") {
            return Err(Error::InvalidHandshake(format!(
                "expected 101 status, got: {status_line}"
            )));
        }

        let headers = parse_headers(lines);

        let upgrade = header(&headers, "upgrade")?;
        if !upgrade.eq_ignore_ascii_case("websocket") {
            return Err(Error::InvalidHandshake(format!(
                "invalid Upgrade header: {upgrade}"
            )));
        }

        let connection = header(&headers, "connection")?;
        if !connection.to_ascii_lowercase().contains("upgrade") {
            return Err(Error::InvalidHandshake(format!(
                "invalid Connection header: {connection}"
            )));
        }

        Ok(Self {
            accept: header(&headers, "sec-websocket-accept")?.to_string(),
            protocol: headers.get("sec-websocket-protocol").cloned(),
        })
    }

    /// Check that the server answered the key the client sent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHandshake`] on mismatch.
    pub fn verify(&self, key: &str) -> Result<()> {
        if self.accept == compute_accept_key(key) {
            Ok(())
        } else {
            Err(Error::InvalidHandshake(
                "Sec-WebSocket-Accept does not match the request key".into(),
            ))
        }
    }
}

fn parse_headers<'a>(lines: impl Iterator<Item = &'a str>) -> HashMap<String, String> {
    lines
        .take_while(|line| !line.is_empty())
        .filter_map(|line| line.split_once(':'))
        .map(|(name, value)| (name.trim().to_ascii_lowercase(), value.trim().to_string()))
        .collect()
}

fn header<'a>(headers: &'a HashMap<String, String>, name: &str) -> Result<&'a str> {
    headers
        .get(name)
        .map(String::as_str)
        .ok_or_else(|| Error::InvalidHandshake(format!("missing {name} header")))
}
