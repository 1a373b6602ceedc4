//! Messages delivered to test probes and the matchers used to check them.

use std::fmt;
use std::sync::Arc;

use crate::actor::UnitId;
use crate::error::Error;

/// An inbound server message routed to a probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    payload: String,
    sender: Option<UnitId>,
}

impl Message {
    /// Create a message with no recorded sender.
    #[must_use]
    pub fn new(payload: impl Into<String>) -> Self {
        Self {
            payload: payload.into(),
            sender: None,
        }
    }

    /// Record the unit that forwarded this message.
    #[must_use]
    pub fn with_sender(mut self, sender: UnitId) -> Self {
        self.sender = Some(sender);
        self
    }

    /// The text payload.
    #[must_use]
    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Take ownership of the payload.
    #[must_use]
    pub fn into_payload(self) -> String {
        self.payload
    }

    /// The connection actor that forwarded this message, if known.
    #[must_use]
    pub fn sender(&self) -> Option<UnitId> {
        self.sender
    }
}

/// A stimulus that could not be written to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendFailure {
    /// The payload that was not sent.
    pub payload: String,
    /// Why the write failed (always `Error::Send`).
    pub error: Error,
}

/// What a connection actor puts into a probe's inbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// A server message.
    Message(Message),
    /// Notification that a stimulus from this probe failed.
    Failed(SendFailure),
}

/// Payload expectation for [`TestProbe::expect_message_matching`].
///
/// [`TestProbe::expect_message_matching`]: crate::TestProbe::expect_message_matching
#[derive(Clone)]
pub enum Matcher {
    /// Payload equals the string.
    Exact(String),
    /// Payload contains the string.
    Contains(String),
    /// Payload starts with the string.
    StartsWith(String),
    /// Payload ends with the string.
    EndsWith(String),
    /// Payload satisfies the predicate.
    Predicate {
        /// Shown in failure messages.
        description: String,
        /// The check.
        test: Arc<dyn Fn(&str) -> bool + Send + Sync>,
    },
}

impl Matcher {
    /// Match a payload exactly.
    #[must_use]
    pub fn exact(expected: impl Into<String>) -> Self {
        Matcher::Exact(expected.into())
    }

    /// Match payloads containing `needle`.
    #[must_use]
    pub fn contains(needle: impl Into<String>) -> Self {
        Matcher::Contains(needle.into())
    }

    /// Match payloads starting with `prefix`.
    #[must_use]
    pub fn starts_with(prefix: impl Into<String>) -> Self {
        Matcher::StartsWith(prefix.into())
    }

    /// Match payloads ending with `suffix`.
    #[must_use]
    pub fn ends_with(suffix: impl Into<String>) -> Self {
        Matcher::EndsWith(suffix.into())
    }

    /// Match payloads accepted by `test`.
    #[must_use]
    pub fn predicate<F>(description: impl Into<String>, test: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        Matcher::Predicate {
            description: description.into(),
            test: Arc::new(test),
        }
    }

    /// Check a payload against this matcher.
    #[must_use]
    pub fn matches(&self, payload: &str) -> bool {
        match self {
            Matcher::Exact(s) => payload == s,
            Matcher::Contains(s) => payload.contains(s.as_str()),
            Matcher::StartsWith(s) => payload.starts_with(s.as_str()),
            Matcher::EndsWith(s) => payload.ends_with(s.as_str()),
            Matcher::Predicate { test, .. } => test(payload),
        }
    }
}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Matcher::Exact(s) => write!(f, "{s:?}"),
            Matcher::Contains(s) => write!(f, "message containing {s:?}"),
            Matcher::StartsWith(s) => write!(f, "message starting with {s:?}"),
            Matcher::EndsWith(s) => write!(f, "message ending with {s:?}"),
            Matcher::Predicate { description, .. } => f.write_str(description),
        }
    }
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Matcher({self})")
    }
}

impl From<&str> for Matcher {
    fn from(expected: &str) -> Self {
        Matcher::exact(expected)
    }
}

impl From<String> for Matcher {
    fn from(expected: String) -> Self {
        Matcher::Exact(expected)
    }
}
