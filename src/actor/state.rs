//! Connection actor state machine.

/// Lifecycle state of a connection actor.
///
/// `Idle -> AwaitingReply` when a stimulus is forwarded, back to `Idle` once
/// no stimulus is outstanding, `Stopped` after the mailbox loop exits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ActorState {
    /// No stimulus outstanding.
    #[default]
    Idle,
    /// At least one stimulus has been forwarded without a reply yet.
    AwaitingReply,
    /// The actor has exited; stimuli are rejected.
    Stopped,
}

impl ActorState {
    /// Returns `true` unless the actor has stopped.
    #[must_use]
    #[inline]
    pub const fn is_running(&self) -> bool {
        !matches!(self, ActorState::Stopped)
    }
}

impl std::fmt::Display for ActorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActorState::Idle => write!(f, "Idle"),
            ActorState::AwaitingReply => write!(f, "AwaitingReply"),
            ActorState::Stopped => write!(f, "Stopped"),
        }
    }
}
