//! Conversation runtime executor

use super::{ChatUpdate, Command, ConversationSnapshot, RuntimeOptions};
use crate::conversation::{MessageDraft, MessageLog};
use crate::protocol::{ExecuteRequest, ExecuteResponse};
use crate::state_machine::{transition, ConvState, Effect, Event, TransitionError};
use crate::transport::Transport;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_util::sync::CancellationToken;

/// Single writer of a conversation's state and message log
pub struct ConversationRuntime<T: Transport + 'static> {
    state: ConvState,
    log: MessageLog,
    transport: Arc<T>,
    options: RuntimeOptions,
    service_available: Option<bool>,
    command_rx: mpsc::Receiver<Command>,
    /// Cloned into spawned transport calls so results come back as commands
    command_tx: mpsc::Sender<Command>,
    broadcast_tx: broadcast::Sender<ChatUpdate>,
    cancel: CancellationToken,
}

impl<T: Transport + 'static> ConversationRuntime<T> {
    pub fn new(
        transport: T,
        options: RuntimeOptions,
        command_rx: mpsc::Receiver<Command>,
        command_tx: mpsc::Sender<Command>,
        broadcast_tx: broadcast::Sender<ChatUpdate>,
        cancel: CancellationToken,
    ) -> Self {
        let mut log = MessageLog::new();
        if options.welcome {
            log.append(MessageDraft::welcome());
        }

        Self {
            state: ConvState::Idle,
            log,
            transport: Arc::new(transport),
            options,
            service_available: None,
            command_rx,
            command_tx,
            broadcast_tx,
            cancel,
        }
    }

    pub async fn run(mut self) {
        tracing::info!(
            timeout = ?self.options.request_timeout,
            messages = self.log.len(),
            "Starting conversation runtime"
        );

        loop {
            tokio::select! {
                biased;

                () = self.cancel.cancelled() => break,

                Some(command) = self.command_rx.recv() => self.handle_command(command),

                else => break,
            }
        }

        tracing::info!(state = self.state.name(), "Conversation runtime stopped");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Dispatch { event, reply } => {
                let result = self.process_event(event);
                if let Err(e) = &result {
                    tracing::debug!(error = %e, state = self.state.name(), "Event rejected");
                    let _ = self.broadcast_tx.send(ChatUpdate::Rejected {
                        message: e.to_string(),
                    });
                }
                if let Some(reply) = reply {
                    let _ = reply.send(result);
                }
            }

            Command::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }

            Command::CheckHealth { reply } => self.spawn_health_check(reply),

            Command::HealthChecked { available } => {
                if self.service_available != Some(available) {
                    tracing::info!(available, "Agent service status changed");
                }
                self.service_available = Some(available);
                let _ = self
                    .broadcast_tx
                    .send(ChatUpdate::ServiceStatus { available });
            }
        }
    }

    fn process_event(&mut self, event: Event) -> Result<(), TransitionError> {
        let result = transition(&self.state, &self.log, event)?;

        tracing::debug!(
            from = self.state.name(),
            to = result.new_state.name(),
            effects = result.effects.len(),
            "Transition"
        );
        self.state = result.new_state;

        for effect in result.effects {
            self.execute_effect(effect);
        }
        Ok(())
    }

    fn execute_effect(&mut self, effect: Effect) {
        match effect {
            Effect::AppendMessage { draft } => {
                let message = self.log.append(draft).clone();
                let _ = self
                    .broadcast_tx
                    .send(ChatUpdate::MessageAppended { message });
            }

            Effect::MarkSubmitted { execution_id } => {
                match self.log.mark_submitted(&execution_id) {
                    Ok(message) => {
                        let message = message.clone();
                        let _ = self
                            .broadcast_tx
                            .send(ChatUpdate::MessageUpdated { message });
                    }
                    // transition checked submittability against this same log
                    Err(e) => tracing::error!(error = %e, "Failed to lock submitted form"),
                }
            }

            Effect::Execute { request } => self.spawn_execute(request),

            Effect::NotifyStateChange => {
                let _ = self.broadcast_tx.send(ChatUpdate::StateChanged {
                    state: self.state.clone(),
                });
            }

            Effect::NotifySettled => {
                let _ = self.broadcast_tx.send(ChatUpdate::Settled);
            }
        }
    }

    /// Run the transport call in the background; its result re-enters the
    /// actor as a `Dispatch` command
    fn spawn_execute(&self, request: ExecuteRequest) {
        let transport = self.transport.clone();
        let command_tx = self.command_tx.clone();
        let cancel = self.cancel.clone();
        let timeout = self.options.request_timeout;

        tracing::info!(kind = request.kind(), "Issuing agent request (background)");

        tokio::spawn(async move {
            let call = AssertUnwindSafe(tokio::time::timeout(
                timeout,
                transport.execute(&request),
            ))
            .catch_unwind();

            let event = tokio::select! {
                biased;

                () = cancel.cancelled() => {
                    tracing::info!("Agent request abandoned, runtime stopping");
                    return;
                }

                outcome = call => match outcome {
                    Ok(Ok(response)) => Event::ResponseReceived { response },
                    Ok(Err(_elapsed)) => {
                        tracing::warn!(?timeout, "Agent request timed out");
                        Event::ResponseReceived {
                            response: timed_out(timeout),
                        }
                    }
                    Err(panic) => {
                        let message = panic_message(panic.as_ref());
                        tracing::error!(%message, "Transport panicked");
                        Event::TransportFault { message }
                    }
                },
            };

            let _ = command_tx
                .send(Command::Dispatch { event, reply: None })
                .await;
        });
    }

    fn spawn_health_check(&self, reply: Option<oneshot::Sender<bool>>) {
        let transport = self.transport.clone();
        let command_tx = self.command_tx.clone();
        let timeout = self.options.request_timeout;

        tokio::spawn(async move {
            let available = matches!(
                tokio::time::timeout(timeout, transport.check_health()).await,
                Ok(true)
            );
            let _ = command_tx.send(Command::HealthChecked { available }).await;
            if let Some(reply) = reply {
                let _ = reply.send(available);
            }
        });
    }

    fn snapshot(&self) -> ConversationSnapshot {
        ConversationSnapshot {
            state: self.state.clone(),
            messages: self.log.messages().to_vec(),
            service_available: self.service_available,
        }
    }
}

fn timed_out(timeout: Duration) -> ExecuteResponse {
    ExecuteResponse::failed(format!("Request timed out after {timeout:?}."))
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "transport panicked".to_string()
    }
}
