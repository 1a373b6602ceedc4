//! Identities and reply addresses of concurrent units.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::message::Delivery;

static NEXT_UNIT: AtomicU64 = AtomicU64::new(1);

/// Opaque identity of a probe or connection actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitId(u64);

impl UnitId {
    /// Allocate a process-unique id.
    pub(crate) fn next() -> Self {
        UnitId(NEXT_UNIT.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw id value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A reply destination: the sending side of one probe's private inbox.
///
/// Cloning an address does not grant read access to the inbox. Two addresses
/// are equal when they point at the same inbox.
#[derive(Clone)]
pub struct Address {
    id: UnitId,
    inbox: mpsc::Sender<Delivery>,
}

impl Address {
    pub(crate) fn new(id: UnitId, inbox: mpsc::Sender<Delivery>) -> Self {
        Self { id, inbox }
    }

    /// Identity of the unit behind this address.
    #[must_use]
    pub fn id(&self) -> UnitId {
        self.id
    }

    /// Check if the owning unit has gone away.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inbox.is_closed()
    }

    /// Enqueue a delivery without waiting.
    ///
    /// The delivery is discarded if the inbox is full or its owner is gone.
    pub(crate) fn deliver(&self, delivery: Delivery) -> Result<(), Undelivered> {
        self.inbox.try_send(delivery).map_err(|e| match e {
            TrySendError::Full(_) => Undelivered::Full,
            TrySendError::Closed(_) => Undelivered::Closed,
        })
    }
}

/// Why a delivery was discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Undelivered {
    /// The inbox has no free slot.
    Full,
    /// The owning unit dropped its inbox.
    Closed,
}

impl PartialEq for Address {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Address {}

impl Hash for Address {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.id)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.id, f)
    }
}
