//! Connection actors and the addresses replies are routed to.
//!
//! A [`ConnectionActor`] wraps one [`Endpoint`](crate::Endpoint) in its own
//! task. Tests talk to it through an [`ActorRef`], passing their own
//! [`Address`] as the reply destination of every stimulus.

#[allow(clippy::module_inception)]
mod actor;
mod address;
mod routing;
mod state;

pub use actor::{ActorRef, ConnectionActor};
pub use address::{Address, UnitId};
pub use routing::ReplyRouting;
pub use state::ActorState;
