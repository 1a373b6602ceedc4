//! Test probes: a private inbox plus blocking expectations.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Instant, timeout, timeout_at};

use crate::actor::{Address, UnitId};
use crate::config::Timeouts;
use crate::error::{Error, Result};
use crate::message::{Delivery, Matcher, Message};

/// The receiving side of one test case.
///
/// A probe owns its inbox exclusively; other units only ever see its
/// [`Address`]. Expectations take `&mut self`, so a single probe is driven by
/// a single task. Failures are returned to the caller and never affect other
/// probes.
///
/// Dropping the probe closes the inbox; anything delivered afterwards is
/// discarded by the sender.
#[derive(Debug)]
pub struct TestProbe {
    address: Address,
    inbox: mpsc::Receiver<Delivery>,
    timeouts: Timeouts,
}

impl TestProbe {
    /// Create a probe whose inbox holds up to `capacity` deliveries.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, inbox) = mpsc::channel(capacity);
        Self {
            address: Address::new(UnitId::next(), tx),
            inbox,
            timeouts: Timeouts::default(),
        }
    }

    /// Use `timeouts` for [`TestProbe::expect_msg`] and
    /// [`TestProbe::expect_no_msg`].
    #[must_use]
    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// The reply address to pass along with stimuli.
    #[must_use]
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Identity of this probe.
    #[must_use]
    pub fn id(&self) -> UnitId {
        self.address.id()
    }

    /// Wait up to `within` for the next message.
    ///
    /// A message already queued is returned immediately. If the deadline
    /// passes, nothing is taken from the inbox.
    ///
    /// # Errors
    ///
    /// - `Error::Timeout` if nothing arrives in time
    /// - `Error::Send` if a stimulus from this probe could not be sent
    pub async fn expect_message(&mut self, within: Duration) -> Result<Message> {
        match timeout(within, self.inbox.recv()).await {
            Ok(Some(delivery)) => into_message(delivery),
            // Unreachable while the probe holds its own address.
            Ok(None) => Err(Error::ActorStopped),
            Err(_) => {
                tracing::debug!(probe = %self.id(), within = ?within, "expectation timed out");
                Err(Error::Timeout(within))
            }
        }
    }

    /// Wait for the next message and require its payload to equal `expected`.
    ///
    /// # Errors
    ///
    /// As [`TestProbe::expect_message`], plus `Error::UnexpectedMessage` on a
    /// payload mismatch.
    pub async fn expect_message_eq(&mut self, within: Duration, expected: &str) -> Result<Message> {
        self.expect_message_matching(within, &Matcher::exact(expected))
            .await
    }

    /// Wait for the next message and require it to satisfy `matcher`.
    ///
    /// # Errors
    ///
    /// As [`TestProbe::expect_message`], plus `Error::UnexpectedMessage` if
    /// the payload does not match.
    pub async fn expect_message_matching(
        &mut self,
        within: Duration,
        matcher: &Matcher,
    ) -> Result<Message> {
        let message = self.expect_message(within).await?;
        if matcher.matches(message.payload()) {
            Ok(message)
        } else {
            Err(Error::UnexpectedMessage {
                expected: matcher.to_string(),
                actual: message.into_payload(),
            })
        }
    }

    /// Require that nothing arrives for the whole of `window`.
    ///
    /// Always waits the full window on success. Arrivals after the window are
    /// not considered.
    ///
    /// # Errors
    ///
    /// - `Error::ExtraMessage` if a message arrives inside the window
    /// - `Error::Send` if a stimulus from this probe failed inside the window
    pub async fn expect_no_message(&mut self, window: Duration) -> Result<()> {
        match timeout(window, self.inbox.recv()).await {
            Err(_) | Ok(None) => Ok(()),
            Ok(Some(Delivery::Message(message))) => {
                Err(Error::ExtraMessage(message.into_payload()))
            }
            Ok(Some(Delivery::Failed(failure))) => Err(failure.error),
        }
    }

    /// Collect `n` messages, all within one overall deadline.
    ///
    /// # Errors
    ///
    /// Fails with the first error encountered; messages received before the
    /// failure are consumed.
    pub async fn receive_n(&mut self, n: usize, within: Duration) -> Result<Vec<Message>> {
        let deadline = Instant::now() + within;
        let mut messages = Vec::with_capacity(n);
        while messages.len() < n {
            let delivery = match timeout_at(deadline, self.inbox.recv()).await {
                Ok(Some(delivery)) => delivery,
                Ok(None) => return Err(Error::ActorStopped),
                Err(_) => {
                    tracing::debug!(
                        probe = %self.id(),
                        received = messages.len(),
                        wanted = n,
                        "receive_n timed out"
                    );
                    return Err(Error::Timeout(within));
                }
            };
            messages.push(into_message(delivery)?);
        }
        Ok(messages)
    }

    /// [`TestProbe::expect_message_eq`] with the default reply timeout.
    ///
    /// # Errors
    ///
    /// As [`TestProbe::expect_message_eq`].
    pub async fn expect_msg(&mut self, expected: &str) -> Result<Message> {
        let within = self.timeouts.expect;
        self.expect_message_eq(within, expected).await
    }

    /// [`TestProbe::expect_no_message`] with the default quiet window.
    ///
    /// # Errors
    ///
    /// As [`TestProbe::expect_no_message`].
    pub async fn expect_no_msg(&mut self) -> Result<()> {
        let window = self.timeouts.no_message;
        self.expect_no_message(window).await
    }
}

fn into_message(delivery: Delivery) -> Result<Message> {
    match delivery {
        Delivery::Message(message) => Ok(message),
        Delivery::Failed(failure) => Err(failure.error),
    }
}
