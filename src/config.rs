//! Configuration, limits and timeouts for probe sessions.
//!
//! The only required setting is the endpoint URI. Everything else has a
//! default suited to testing a local server.
//!
//! Settings can be loaded from a `key=value` properties file in dotenv syntax:
//!
//! ```text
//! web_socket_uri=ws://127.0.0.1:9001/echo
//! expect_timeout_ms=2000
//! reply_routing=in_order
//! ```
//!
//! or from the environment, where each key is upper-cased and prefixed with
//! `WSPROBE_` (for example `WSPROBE_WEB_SOCKET_URI`).

use std::path::Path;
use std::time::Duration;

use crate::actor::ReplyRouting;
use crate::error::{Error, Result};

/// Property key holding the endpoint URI.
pub const URI_KEY: &str = "web_socket_uri";

/// Prefix for environment variable overrides.
pub const ENV_PREFIX: &str = "WSPROBE_";

const KEYS: &[&str] = &[
    URI_KEY,
    "expect_timeout_ms",
    "no_message_window_ms",
    "handshake_timeout_ms",
    "mailbox_capacity",
    "inbox_capacity",
    "reply_routing",
    "max_frame_size",
    "max_message_size",
];

/// Size limits applied to data read from the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    /// Maximum payload size of a single frame in bytes.
    ///
    /// Default: 16 MB
    pub max_frame_size: usize,

    /// Maximum size of a reassembled message in bytes.
    ///
    /// Default: 64 MB
    pub max_message_size: usize,

    /// Maximum size of the upgrade response in bytes.
    ///
    /// Default: 8 KB
    pub max_handshake_size: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_frame_size: 16 * 1024 * 1024,
            max_message_size: 64 * 1024 * 1024,
            max_handshake_size: 8192,
        }
    }
}

impl Limits {
    /// Validate that a message size is within limits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FrameTooLarge`] if `size` exceeds the configured maximum.
    pub const fn check_message_size(&self, size: usize) -> Result<()> {
        if size > self.max_message_size {
            Err(Error::FrameTooLarge {
                size: size as u64,
                max: self.max_message_size,
            })
        } else {
            Ok(())
        }
    }

    /// Validate that the handshake response size is within limits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHandshake`] if `size` exceeds the configured maximum.
    pub fn check_handshake_size(&self, size: usize) -> Result<()> {
        if size > self.max_handshake_size {
            Err(Error::InvalidHandshake(format!(
                "response too large: {} bytes (max: {})",
                size, self.max_handshake_size
            )))
        } else {
            Ok(())
        }
    }
}

/// Deadlines used by connections and expectations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timeouts {
    /// Maximum time to connect and complete the upgrade handshake.
    ///
    /// Default: 10 seconds
    pub handshake: Duration,

    /// Default deadline for `expect_msg`.
    ///
    /// Default: 2 seconds
    pub expect: Duration,

    /// Default quiet window for `expect_no_msg`.
    ///
    /// Default: 500 milliseconds
    pub no_message: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            handshake: Duration::from_secs(10),
            expect: Duration::from_secs(2),
            no_message: Duration::from_millis(500),
        }
    }
}

impl Timeouts {
    /// Create new timeouts with custom values.
    #[must_use]
    pub const fn new(handshake: Duration, expect: Duration, no_message: Duration) -> Self {
        Self {
            handshake,
            expect,
            no_message,
        }
    }
}

/// Probe configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// The `ws://` URI of the endpoint under test.
    pub uri: String,

    /// Resource limits.
    pub limits: Limits,

    /// Timeout configuration.
    pub timeouts: Timeouts,

    /// Capacity of each connection actor's mailbox.
    ///
    /// Default: 64
    pub mailbox_capacity: usize,

    /// Capacity of each test probe's private inbox.
    ///
    /// Default: 64
    pub inbox_capacity: usize,

    /// How inbound frames are matched to the stimulus that caused them.
    ///
    /// Default: [`ReplyRouting::LastSender`]
    pub routing: ReplyRouting,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            uri: String::new(),
            limits: Limits::default(),
            timeouts: Timeouts::default(),
            mailbox_capacity: 64,
            inbox_capacity: 64,
            routing: ReplyRouting::default(),
        }
    }
}

impl Config {
    /// Create a configuration targeting `uri` with default settings.
    #[must_use]
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            ..Default::default()
        }
    }

    /// Set custom limits.
    #[must_use]
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Set timeout configuration.
    #[must_use]
    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Set the actor mailbox capacity.
    #[must_use]
    pub const fn with_mailbox_capacity(mut self, capacity: usize) -> Self {
        self.mailbox_capacity = capacity;
        self
    }

    /// Set the probe inbox capacity.
    #[must_use]
    pub const fn with_inbox_capacity(mut self, capacity: usize) -> Self {
        self.inbox_capacity = capacity;
        self
    }

    /// Set the reply routing policy.
    #[must_use]
    pub const fn with_routing(mut self, routing: ReplyRouting) -> Self {
        self.routing = routing;
        self
    }

    /// Check values the builders cannot rule out.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a channel capacity is zero.
    pub fn validate(&self) -> Result<()> {
        check_capacity("mailbox_capacity", self.mailbox_capacity)?;
        check_capacity("inbox_capacity", self.inbox_capacity)
    }

    /// Parse configuration from properties text.
    ///
    /// Lines are `key=value` in dotenv syntax: `#` comments, optional quotes
    /// and an optional `export` prefix. Unknown keys are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a line is malformed, `web_socket_uri` is
    /// missing, or a value cannot be parsed.
    pub fn from_properties(text: &str) -> Result<Self> {
        Self::from_entries(dotenvy::from_read_iter(text.as_bytes()))
    }

    /// Load configuration from a properties file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the file cannot be read or parsed.
    pub fn from_properties_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let entries = dotenvy::from_path_iter(path)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        Self::from_entries(entries)
    }

    fn from_entries<I>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = dotenvy::Result<(String, String)>>,
    {
        let mut config = Self::default();
        let mut has_uri = false;

        for entry in entries {
            let (key, value) = entry.map_err(|e| Error::Config(e.to_string()))?;
            has_uri |= key == URI_KEY;
            config.apply(&key, value.trim())?;
        }

        if !has_uri {
            return Err(Error::Config(format!("missing {URI_KEY}")));
        }
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from `WSPROBE_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `WSPROBE_WEB_SOCKET_URI` is unset or a value
    /// cannot be parsed.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a configuration from an arbitrary `WSPROBE_*` variable lookup.
    ///
    /// # Errors
    ///
    /// Same as [`Config::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        let mut has_uri = false;

        for key in KEYS {
            let name = format!("{ENV_PREFIX}{}", key.to_ascii_uppercase());
            if let Some(value) = lookup(&name) {
                has_uri |= *key == URI_KEY;
                config.apply(key, value.trim())?;
            }
        }

        if !has_uri {
            return Err(Error::Config(format!(
                "missing {ENV_PREFIX}{}",
                URI_KEY.to_ascii_uppercase()
            )));
        }
        config.validate()?;
        Ok(config)
    }

    fn apply(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            URI_KEY => self.uri = value.to_string(),
            "expect_timeout_ms" => self.timeouts.expect = parse_millis(key, value)?,
            "no_message_window_ms" => self.timeouts.no_message = parse_millis(key, value)?,
            "handshake_timeout_ms" => self.timeouts.handshake = parse_millis(key, value)?,
            "mailbox_capacity" => self.mailbox_capacity = parse_number(key, value)?,
            "inbox_capacity" => self.inbox_capacity = parse_number(key, value)?,
            "max_frame_size" => self.limits.max_frame_size = parse_number(key, value)?,
            "max_message_size" => self.limits.max_message_size = parse_number(key, value)?,
            "reply_routing" => self.routing = value.parse()?,
            _ => {}
        }
        Ok(())
    }
}

fn parse_number(key: &str, value: &str) -> Result<usize> {
    value
        .parse()
        .map_err(|_| Error::Config(format!("{key}: expected a number, got {value:?}")))
}

fn parse_millis(key: &str, value: &str) -> Result<Duration> {
    let millis = parse_number(key, value)?;
    Ok(Duration::from_millis(millis as u64))
}

// tokio's bounded channels panic on a zero capacity.
fn check_capacity(key: &str, capacity: usize) -> Result<()> {
    if capacity == 0 {
        return Err(Error::Config(format!("{key}: capacity must be at least 1")));
    }
    Ok(())
}
