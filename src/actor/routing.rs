//! Matching inbound frames to the stimulus that caused them.

use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

use crate::actor::Address;
use crate::error::Error;

/// Policy for choosing the reply destination of an inbound frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ReplyRouting {
    /// Every frame goes to whoever sent the most recent stimulus.
    ///
    /// With more than one stimulus outstanding, earlier senders may see
    /// replies meant for later ones. Frames arriving before any stimulus are
    /// dropped.
    #[default]
    LastSender,

    /// Each frame goes to the oldest stimulus still awaiting a reply, one
    /// frame per stimulus. Once none is outstanding, further frames go to the
    /// most recent sender.
    InOrder,
}

impl fmt::Display for ReplyRouting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplyRouting::LastSender => write!(f, "last_sender"),
            ReplyRouting::InOrder => write!(f, "in_order"),
        }
    }
}

impl FromStr for ReplyRouting {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "last_sender" => Ok(ReplyRouting::LastSender),
            "in_order" => Ok(ReplyRouting::InOrder),
            other => Err(Error::Config(format!(
                "reply_routing: expected last_sender or in_order, got {other:?}"
            ))),
        }
    }
}

/// Reply bookkeeping owned by a single connection actor.
#[derive(Debug)]
pub(crate) struct ReplyRouter {
    policy: ReplyRouting,
    last_sender: Option<Address>,
    pending: VecDeque<Address>,
    outstanding: usize,
}

impl ReplyRouter {
    pub(crate) fn new(policy: ReplyRouting) -> Self {
        Self {
            policy,
            last_sender: None,
            pending: VecDeque::new(),
            outstanding: 0,
        }
    }

    /// A stimulus from `reply_to` has been accepted.
    pub(crate) fn record(&mut self, reply_to: &Address) {
        self.last_sender = Some(reply_to.clone());
        if self.policy == ReplyRouting::InOrder {
            self.pending.push_back(reply_to.clone());
        }
        self.outstanding += 1;
    }

    /// The most recent stimulus from `reply_to` was never sent.
    pub(crate) fn abandon(&mut self, reply_to: &Address) {
        if self.pending.back() == Some(reply_to) {
            self.pending.pop_back();
        }
        self.outstanding = self.outstanding.saturating_sub(1);
    }

    /// Destination for the next inbound frame, if any.
    pub(crate) fn resolve(&mut self) -> Option<Address> {
        self.outstanding = self.outstanding.saturating_sub(1);
        match self.policy {
            ReplyRouting::LastSender => self.last_sender.clone(),
            ReplyRouting::InOrder => self
                .pending
                .pop_front()
                .or_else(|| self.last_sender.clone()),
        }
    }

    /// Number of stimuli not yet matched with a frame.
    pub(crate) fn outstanding(&self) -> usize {
        self.outstanding
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::UnitId;
    use tokio::sync::mpsc;

    fn address() -> Address {
        let (tx, _rx) = mpsc::channel(1);
        Address::new(UnitId::next(), tx)
    }

    #[test]
    fn test_routing_parse_and_display() {
        assert_eq!("last_sender".parse::<ReplyRouting>().unwrap(), ReplyRouting::LastSender);
        assert_eq!(" IN_ORDER ".parse::<ReplyRouting>().unwrap(), ReplyRouting::InOrder);
        assert!("round_robin".parse::<ReplyRouting>().is_err());
        assert_eq!(ReplyRouting::InOrder.to_string(), "in_order");
    }

    #[test]
    fn test_no_sender_resolves_to_none() {
        let mut router = ReplyRouter::new(ReplyRouting::LastSender);
        assert_eq!(router.resolve(), None);
        assert_eq!(router.outstanding(), 0);
    }

    #[test]
    fn test_last_sender_is_overwritten() {
        let (a, b) = (address(), address());
        let mut router = ReplyRouter::new(ReplyRouting::LastSender);
        router.record(&a);
        router.record(&b);
        assert_eq!(router.outstanding(), 2);
        assert_eq!(router.resolve(), Some(b.clone()));
        assert_eq!(router.resolve(), Some(b.clone()));
        // Unsolicited frames still go to the last sender.
        assert_eq!(router.resolve(), Some(b));
        assert_eq!(router.outstanding(), 0);
    }

    #[test]
    fn test_in_order_matches_stimuli() {
        let (a, b) = (address(), address());
        let mut router = ReplyRouter::new(ReplyRouting::InOrder);
        router.record(&a);
        router.record(&b);
        assert_eq!(router.resolve(), Some(a));
        assert_eq!(router.resolve(), Some(b.clone()));
        assert_eq!(router.outstanding(), 0);
        assert_eq!(router.resolve(), Some(b));
    }

    #[test]
    fn test_abandon_removes_failed_stimulus() {
        let (a, b) = (address(), address());
        let mut router = ReplyRouter::new(ReplyRouting::InOrder);
        router.record(&a);
        router.record(&b);
        router.abandon(&b);
        assert_eq!(router.outstanding(), 1);
        assert_eq!(router.resolve(), Some(a));
    }
}
