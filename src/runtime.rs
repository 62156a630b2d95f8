//! Runtime for executing a conversation
//!
//! One actor task owns the conversation state and message log. Handles talk
//! to it over a command channel and observe it through a broadcast channel.

mod executor;

#[cfg(test)]
pub mod testing;

pub use executor::ConversationRuntime;

use crate::conversation::Message;
use crate::protocol::UserInput;
use crate::state_machine::{ConvState, Event, TransitionError};
use crate::transport::Transport;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_util::sync::{CancellationToken, DropGuard};

const COMMAND_CAPACITY: usize = 32;
const BROADCAST_CAPACITY: usize = 128;

/// Requests processed by the runtime actor, one at a time
#[derive(Debug)]
pub enum Command {
    /// Feed an event to the state machine. `reply` receives the verdict
    /// once the transition's effects have been applied.
    Dispatch {
        event: Event,
        reply: Option<oneshot::Sender<Result<(), TransitionError>>>,
    },
    Snapshot {
        reply: oneshot::Sender<ConversationSnapshot>,
    },
    CheckHealth {
        reply: Option<oneshot::Sender<bool>>,
    },
    /// Result of a background health probe
    HealthChecked { available: bool },
}

/// Updates broadcast to subscribers
#[derive(Debug, Clone)]
pub enum ChatUpdate {
    MessageAppended { message: Message },
    /// A message changed in place (its form was locked)
    MessageUpdated { message: Message },
    StateChanged { state: ConvState },
    /// The in-flight request resolved and the conversation accepts input again
    Settled,
    ServiceStatus { available: bool },
    /// A user action was refused; nothing changed
    Rejected { message: String },
}

/// Point-in-time copy of the conversation
#[derive(Debug, Clone)]
pub struct ConversationSnapshot {
    pub state: ConvState,
    pub messages: Vec<Message>,
    /// `None` until the first health check completes
    pub service_available: Option<bool>,
}

impl ConversationSnapshot {
    /// Message owning the newest open form, if any
    pub fn open_form(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.has_open_form())
    }
}

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Rejected(#[from] TransitionError),
    #[error("Conversation runtime has stopped")]
    Closed,
}

#[derive(Debug, Clone)]
pub struct RuntimeOptions {
    /// Upper bound for a single transport call
    pub request_timeout: Duration,
    /// Seed the log with the greeting message
    pub welcome: bool,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(60),
            welcome: true,
        }
    }
}

/// Handle to interact with a running conversation
///
/// Cloning is cheap. The runtime stops when the last clone is dropped or
/// `shutdown` is called.
#[derive(Clone)]
pub struct ConversationHandle {
    command_tx: mpsc::Sender<Command>,
    broadcast_tx: broadcast::Sender<ChatUpdate>,
    cancel: CancellationToken,
    _guard: Arc<DropGuard>,
}

/// Spawn a runtime for a fresh conversation
pub fn start<T: Transport + 'static>(transport: T, options: RuntimeOptions) -> ConversationHandle {
    let (command_tx, command_rx) = mpsc::channel(COMMAND_CAPACITY);
    let (broadcast_tx, _) = broadcast::channel(BROADCAST_CAPACITY);
    let cancel = CancellationToken::new();

    let runtime = ConversationRuntime::new(
        transport,
        options,
        command_rx,
        command_tx.clone(),
        broadcast_tx.clone(),
        cancel.clone(),
    );
    tokio::spawn(async move {
        runtime.run().await;
        tracing::info!("Conversation runtime finished");
    });

    ConversationHandle {
        command_tx,
        broadcast_tx,
        _guard: Arc::new(cancel.clone().drop_guard()),
        cancel,
    }
}

impl ConversationHandle {
    /// Send a fresh query. Returns once the request is issued, not answered.
    pub async fn send_query(&self, text: impl Into<String>) -> Result<(), RuntimeError> {
        self.dispatch(Event::SendQuery { text: text.into() }).await
    }

    /// Submit form values for a paused execution
    pub async fn submit_form(
        &self,
        execution_id: impl Into<String>,
        values: UserInput,
    ) -> Result<(), RuntimeError> {
        self.dispatch(Event::SubmitForm {
            execution_id: execution_id.into(),
            values,
        })
        .await
    }

    pub async fn snapshot(&self) -> Result<ConversationSnapshot, RuntimeError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Snapshot { reply }).await?;
        rx.await.map_err(|_| RuntimeError::Closed)
    }

    /// Probe the service and broadcast the result
    pub async fn check_health(&self) -> Result<bool, RuntimeError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::CheckHealth { reply: Some(reply) })
            .await?;
        rx.await.map_err(|_| RuntimeError::Closed)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChatUpdate> {
        self.broadcast_tx.subscribe()
    }

    /// Stop the runtime. In-flight transport calls are abandoned.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    async fn dispatch(&self, event: Event) -> Result<(), RuntimeError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Dispatch {
            event,
            reply: Some(reply),
        })
        .await?;
        rx.await.map_err(|_| RuntimeError::Closed)??;
        Ok(())
    }

    async fn send(&self, command: Command) -> Result<(), RuntimeError> {
        if self.cancel.is_cancelled() {
            return Err(RuntimeError::Closed);
        }
        self.command_tx
            .send(command)
            .await
            .map_err(|_| RuntimeError::Closed)
    }
}
