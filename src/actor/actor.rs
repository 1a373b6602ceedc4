use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::actor::address::Undelivered;
use crate::actor::routing::ReplyRouter;
use crate::actor::{ActorState, Address, UnitId};
use crate::config::Config;
use crate::connection::Endpoint;
use crate::error::{Error, Result};
use crate::message::{Delivery, Message, SendFailure};

/// Mailbox items. Stimuli come from probes, inbound frames from the
/// endpoint's reader task; the actor task is the only consumer.
#[derive(Debug)]
pub(crate) enum Command {
    Stimulus { payload: String, reply_to: Address },
    Inbound(String),
    Stop,
}

/// Mediator between test probes and one live endpoint.
///
/// The actor owns its [`Endpoint`] exclusively and runs as its own tokio task.
/// Stimuli are forwarded without waiting for replies; every inbound frame is
/// routed to a reply address chosen by the configured
/// [`ReplyRouting`](crate::ReplyRouting). All routing state lives inside the
/// task, so the mailbox loop is the only writer.
///
/// ## Example
///
/// ```rust,ignore
/// use wsprobe::{Config, ConnectionActor, TestProbe};
///
/// let actor = ConnectionActor::spawn(&Config::new("ws://127.0.0.1:9001/echo")).await?;
/// let mut probe = TestProbe::new(16);
/// actor.tell("Hello Server", probe.address()).await?;
/// probe.expect_message_eq(Duration::from_secs(2), "Hello Server").await?;
/// ```
pub struct ConnectionActor {
    id: UnitId,
    endpoint: Endpoint,
    router: ReplyRouter,
    mailbox: mpsc::Receiver<Command>,
    state: watch::Sender<ActorState>,
}

impl ConnectionActor {
    /// Open an endpoint for `config.uri` and start an actor around it.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` for a zero mailbox capacity and
    /// `Error::Connection` if the endpoint cannot be opened; no actor is
    /// started in either case.
    pub async fn spawn(config: &Config) -> Result<ActorRef> {
        config.validate()?;
        let endpoint = Endpoint::open(&config.uri, config).await?;
        let (actor, _task) = Self::start(endpoint, config);
        Ok(actor)
    }

    /// Start an actor around an already open endpoint.
    ///
    /// Returns the handle used to send stimuli and the actor task. Aborting the
    /// task drops the endpoint. A zero mailbox capacity is treated as one.
    pub fn start(endpoint: Endpoint, config: &Config) -> (ActorRef, JoinHandle<()>) {
        let id = UnitId::next();
        let (tx, mailbox) = mpsc::channel(config.mailbox_capacity.max(1));
        let (state, state_rx) = watch::channel(ActorState::Idle);

        // A weak handle, so that dropping every ActorRef still stops the actor.
        let inbound = tx.downgrade();
        endpoint.set_handler(move |text| {
            let Some(mailbox) = inbound.upgrade() else {
                return;
            };
            if let Err(TrySendError::Full(_)) = mailbox.try_send(Command::Inbound(text)) {
                tracing::warn!(actor = %id, "mailbox full; dropping inbound message");
            }
        });

        let actor = Self {
            id,
            endpoint,
            router: ReplyRouter::new(config.routing),
            mailbox,
            state,
        };
        let task = tokio::spawn(actor.run());

        let handle = ActorRef {
            id,
            mailbox: tx,
            state: state_rx,
        };
        (handle, task)
    }

    async fn run(mut self) {
        tracing::debug!(actor = %self.id, uri = %self.endpoint.uri(), "connection actor started");

        while let Some(command) = self.mailbox.recv().await {
            match command {
                Command::Stimulus { payload, reply_to } => self.on_stimulus(payload, reply_to).await,
                Command::Inbound(text) => self.on_inbound(text),
                Command::Stop => break,
            }
        }

        self.state.send_replace(ActorState::Stopped);
        self.mailbox.close();
        if let Err(e) = self.endpoint.close().await {
            tracing::debug!(actor = %self.id, error = %e, "close frame not sent");
        }
        tracing::debug!(actor = %self.id, "connection actor stopped");
    }

    async fn on_stimulus(&mut self, payload: String, reply_to: Address) {
        tracing::debug!(actor = %self.id, reply_to = %reply_to, "forwarding stimulus");
        self.router.record(&reply_to);
        self.publish_state();

        if let Err(error) = self.endpoint.send(&payload).await {
            tracing::warn!(actor = %self.id, reply_to = %reply_to, error = %error, "stimulus not sent");
            self.router.abandon(&reply_to);
            self.publish_state();

            let failure = SendFailure { payload, error };
            match reply_to.deliver(Delivery::Failed(failure)) {
                Ok(()) => {}
                Err(Undelivered::Full) => {
                    tracing::warn!(actor = %self.id, reply_to = %reply_to, "inbox full; failure dropped");
                }
                Err(Undelivered::Closed) => {
                    tracing::debug!(actor = %self.id, reply_to = %reply_to, "sender gone; failure dropped");
                }
            }
        }
    }

    fn on_inbound(&mut self, text: String) {
        let destination = self.router.resolve();
        self.publish_state();

        let Some(destination) = destination else {
            tracing::debug!(actor = %self.id, "no sender recorded; message dropped");
            return;
        };

        tracing::debug!(actor = %self.id, to = %destination, "routing reply");
        let message = Message::new(text).with_sender(self.id);
        match destination.deliver(Delivery::Message(message)) {
            Ok(()) => {}
            Err(Undelivered::Full) => {
                tracing::warn!(actor = %self.id, to = %destination, "inbox full; message dropped");
            }
            Err(Undelivered::Closed) => {
                tracing::debug!(actor = %self.id, to = %destination, "destination gone; message dropped");
            }
        }
    }

    fn publish_state(&self) {
        let next = if self.router.outstanding() > 0 {
            ActorState::AwaitingReply
        } else {
            ActorState::Idle
        };
        self.state.send_if_modified(|current| {
            let changed = *current != next;
            *current = next;
            changed
        });
    }
}

/// Handle to a running [`ConnectionActor`].
///
/// Cheap to clone. The actor stops when [`ActorRef::stop`] is called or the
/// last handle is dropped.
#[derive(Clone)]
pub struct ActorRef {
    id: UnitId,
    mailbox: mpsc::Sender<Command>,
    state: watch::Receiver<ActorState>,
}

impl ActorRef {
    /// Identity of the actor; matches [`Message::sender`] of its replies.
    #[must_use]
    pub fn id(&self) -> UnitId {
        self.id
    }

    /// Send a stimulus to be forwarded to the server, with `reply_to` as
    /// its reply destination.
    ///
    /// Returns once the stimulus is queued in the actor's mailbox.
    ///
    /// # Errors
    ///
    /// Returns `Error::ActorStopped` if the actor is no longer running.
    pub async fn tell(&self, payload: impl Into<String>, reply_to: &Address) -> Result<()> {
        self.mailbox
            .send(Command::Stimulus {
                payload: payload.into(),
                reply_to: reply_to.clone(),
            })
            .await
            .map_err(|_| Error::ActorStopped)
    }

    /// Current actor state.
    #[must_use]
    pub fn state(&self) -> ActorState {
        if self.mailbox.is_closed() {
            ActorState::Stopped
        } else {
            *self.state.borrow()
        }
    }

    /// Ask the actor to close its session and exit.
    ///
    /// Stimuli queued before the stop request are still processed.
    pub async fn stop(&self) {
        let _ = self.mailbox.send(Command::Stop).await;
    }

    /// Wait until the actor has exited.
    pub async fn stopped(&self) {
        let mut state = self.state.clone();
        // An error means the actor task is gone, which also counts.
        let _ = state.wait_for(|s| *s == ActorState::Stopped).await;
    }
}

impl std::fmt::Debug for ActorRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ActorRef({})", self.id)
    }
}
