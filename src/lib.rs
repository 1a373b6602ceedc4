//! # wsprobe - Actor-style test harness for WebSocket endpoints
//!
//! `wsprobe` drives a persistent, bidirectional WebSocket endpoint from many
//! concurrent test cases. Each test owns a [`TestProbe`] with a private inbox;
//! each live session is owned by a [`ConnectionActor`] that forwards stimuli to
//! the server and routes every server message back to a probe.
//!
//! ## Features
//!
//! - **Isolated tests**: failures and timeouts stay local to one probe
//! - **Explicit reply addresses** on every stimulus, with selectable
//!   [`ReplyRouting`]
//! - **Timed expectations**: `expect_message`, `expect_no_message`, matchers
//! - **Suite runner** with per-test panic capture and ordered reports
//! - **Minimal RFC 6455 client** over tokio, text frames only
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use wsprobe::{Config, TestSystem};
//!
//! let system = TestSystem::new("echo", Config::new("ws://127.0.0.1:9001/echo"));
//! let actor = system.connection_actor().await?;
//! let mut probe = system.probe();
//!
//! actor.tell("Hello Server", probe.address()).await?;
//! probe.expect_message_eq(Duration::from_secs(2), "Hello Server").await?;
//! probe.expect_no_message(Duration::from_millis(500)).await?;
//! ```

pub mod actor;
pub mod codec;
pub mod config;
pub mod connection;
pub mod error;
pub mod message;
pub mod probe;
pub mod protocol;
pub mod system;

pub use actor::{ActorRef, ActorState, Address, ConnectionActor, ReplyRouting, UnitId};
pub use config::{Config, Limits, Timeouts};
pub use connection::{ConnectionState, Endpoint};
pub use error::{Error, Result};
pub use message::{Delivery, Matcher, Message, SendFailure};
pub use probe::TestProbe;
pub use protocol::{OpCode, WS_GUID, compute_accept_key};
pub use system::{SuiteReport, TestCase, TestOutcome, TestSystem};
