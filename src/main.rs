//! Aegis Chat - terminal client for the Aegis agent
//!
//! A conversation state machine drives a multi-turn request/response
//! protocol with the agent service; responses render as structured
//! documents, charts and forms.

mod config;
mod conversation;
mod form;
mod protocol;
mod render;
mod runtime;
mod state_machine;
mod transport;

use config::{ClientConfig, LogFormat, TransportMode};
use form::{ControlKind, DynamicForm, FormRejection};
use render::terminal::TerminalPrinter;
use runtime::{ChatUpdate, ConversationHandle, RuntimeError, RuntimeOptions};
use state_machine::ConvState;
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use transport::{HttpTransport, LoggingTransport, MockAgentTransport, Transport, TransportError};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const HELP: &str = "Commands: /new starts a fresh chat, /health re-checks the agent service, /cancel skips an open form, /quit exits.";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ClientConfig::from_env()?;
    init_tracing(config.log_format);

    let transport = Arc::new(build_transport(&config)?);
    tracing::info!(
        transport = ?config.transport,
        timeout = ?config.request_timeout,
        "Starting chat client"
    );

    let options = RuntimeOptions {
        request_timeout: config.request_timeout,
        welcome: true,
    };
    let printer = TerminalPrinter::detect().with_chart_width(chart_width());

    let mut chat = Chat::new(transport, options, printer);
    let result = chat.run().await;
    chat.handle.shutdown();
    result
}

fn init_tracing(format: LogFormat) {
    // stdout is the chat surface; logs go to stderr
    let registry = tracing_subscriber::registry().with(
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "aegis_chat=info".into()),
    );
    match format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_span_list(false)
                    .with_writer(std::io::stderr),
            )
            .init(),
        LogFormat::Compact => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_writer(std::io::stderr),
            )
            .init(),
    }
}

fn build_transport(config: &ClientConfig) -> Result<LoggingTransport, TransportError> {
    let (inner, name): (Arc<dyn Transport>, String) = match config.transport {
        TransportMode::Http => {
            let http = HttpTransport::new(&config.api_base_url, config.request_timeout)?;
            let name = format!("http {}", http.base_url());
            (Arc::new(http), name)
        }
        TransportMode::Mock => {
            let mock = match config.mock_latency {
                Some(latency) => MockAgentTransport::with_latency(latency, latency),
                None => MockAgentTransport::new(),
            };
            (Arc::new(mock), "mock".to_string())
        }
    };
    Ok(LoggingTransport::new(inner, name))
}

/// Charts take about a third of the terminal
fn chart_width() -> usize {
    crossterm::terminal::size().map_or(32, |(cols, _)| (usize::from(cols) / 3).clamp(16, 60))
}

/// Form being filled in field by field
struct FormSession {
    form: DynamicForm,
    field: usize,
}

/// What the input loop does after a line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    /// A fresh conversation replaced the old one
    Restarted,
    Quit,
}

struct Chat {
    transport: Arc<LoggingTransport>,
    options: RuntimeOptions,
    handle: ConversationHandle,
    printer: TerminalPrinter,
    form: Option<FormSession>,
}

impl Chat {
    fn new(transport: Arc<LoggingTransport>, options: RuntimeOptions, printer: TerminalPrinter) -> Self {
        let handle = runtime::start(Arc::clone(&transport), options.clone());
        Self {
            transport,
            options,
            handle,
            printer,
            form: None,
        }
    }

    async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let mut updates = self.handle.subscribe();
        self.greet().await?;

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        self.prompt();

        loop {
            tokio::select! {
                update = updates.recv() => match update {
                    Ok(update) => self.on_update(update).await?,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Display fell behind conversation updates");
                    }
                    Err(RecvError::Closed) => break,
                },

                line = lines.next_line() => match line? {
                    Some(line) => match self.on_line(line.trim_end()).await? {
                        Flow::Continue => {}
                        Flow::Restarted => {
                            updates = self.handle.subscribe();
                            self.greet().await?;
                            self.prompt();
                        }
                        Flow::Quit => break,
                    },
                    None => break,
                },
            }
        }
        Ok(())
    }

    /// Print the conversation so far and probe the service
    async fn greet(&mut self) -> Result<(), RuntimeError> {
        for message in self.handle.snapshot().await?.messages {
            println!("{}", self.printer.message(&render::render_message(&message)));
        }
        println!("{HELP}\n");
        self.handle.check_health().await?;
        Ok(())
    }

    /// Drop the current conversation and start over with a greeting
    fn restart(&mut self) {
        tracing::info!("Starting a new chat");
        self.handle.shutdown();
        self.handle = runtime::start(Arc::clone(&self.transport), self.options.clone());
        self.form = None;
    }

    async fn on_update(&mut self, update: ChatUpdate) -> Result<(), RuntimeError> {
        match update {
            ChatUpdate::MessageAppended { message } => {
                // The user already sees what they typed
                if message.role != conversation::Role::User {
                    println!("\n{}", self.printer.message(&render::render_message(&message)));
                }
            }
            ChatUpdate::MessageUpdated { message } => {
                if let Some(form) = DynamicForm::for_message(&message).filter(|f| !f.submit_visible()) {
                    println!("{}", self.printer.form_status(&form));
                }
            }
            ChatUpdate::StateChanged {
                state: ConvState::AwaitingResponse { .. },
            } => {
                println!("{}", self.printer.status("Aegis is working...", true));
            }
            ChatUpdate::Settled => {
                self.open_form().await?;
                self.prompt();
            }
            ChatUpdate::ServiceStatus { available } => {
                let text = if available {
                    "Agent service: online"
                } else {
                    "Agent service: offline"
                };
                println!("{}", self.printer.status(text, available));
            }
            ChatUpdate::Rejected { message } => {
                println!("{}", self.printer.status(&message, false));
                self.prompt();
            }
            ChatUpdate::StateChanged { .. } => {}
        }
        Ok(())
    }

    async fn on_line(&mut self, line: &str) -> Result<Flow, RuntimeError> {
        match line {
            "/quit" | "/exit" => return Ok(Flow::Quit),
            "/help" => println!("{HELP}"),
            "/new" => {
                self.restart();
                return Ok(Flow::Restarted);
            }
            "/health" => {
                self.handle.check_health().await?;
            }
            "/cancel" if self.form.is_some() => {
                self.form = None;
                println!("{}", self.printer.status("Form skipped.", true));
            }
            command if command.starts_with('/') => {
                println!("{}", self.printer.status(&format!("Unknown command {command}"), false));
                println!("{HELP}");
            }
            _ if self.form.is_some() => {
                if self.on_field_input(line).await? {
                    return Ok(Flow::Continue);
                }
            }
            "" => {}
            text => match self.handle.send_query(text).await {
                // Rejections are broadcast and printed from there
                Ok(()) | Err(RuntimeError::Rejected(_)) => return Ok(Flow::Continue),
                Err(e) => return Err(e),
            },
        }
        self.prompt();
        Ok(Flow::Continue)
    }

    /// Start filling in the form the last turn opened, if any
    async fn open_form(&mut self) -> Result<(), RuntimeError> {
        let snapshot = self.handle.snapshot().await?;
        if snapshot.service_available == Some(false) {
            println!(
                "{}",
                self.printer
                    .status("Agent service looked offline at the last check; /health re-checks it.", false)
            );
        }
        if snapshot.state.open_execution_id().is_none() {
            return Ok(());
        }
        self.form = snapshot
            .open_form()
            .and_then(DynamicForm::for_message)
            .map(|form| FormSession { form, field: 0 });
        if let Some(session) = &self.form {
            println!("{}", self.printer.form_status(&session.form));
        }
        Ok(())
    }

    /// Returns `true` once the form was handed to the runtime
    async fn on_field_input(&mut self, line: &str) -> Result<bool, RuntimeError> {
        let Some(session) = self.form.as_mut() else {
            return Ok(false);
        };
        let Some((key, kind)) = session
            .form
            .controls()
            .get(session.field)
            .map(|control| (control.key.to_string(), control.kind))
        else {
            return Ok(false);
        };

        if !line.is_empty() {
            let stored = match kind {
                ControlKind::Toggle => match parse_toggle(line) {
                    Some(on) => session.form.set_toggle(&key, on),
                    None => {
                        println!("{}", self.printer.status("Please answer y or n.", false));
                        return Ok(false);
                    }
                },
                ControlKind::Text | ControlKind::Number => session.form.set_text(&key, line),
            };
            if let Err(e) = stored {
                tracing::warn!(error = %e, "Form field rejected input");
            }
        }

        session.field += 1;
        if session.field < session.form.schema().len() {
            return Ok(false);
        }

        let submitting = self.handle.snapshot().await?.state.is_busy();
        let Some(session) = self.form.as_mut() else {
            return Ok(false);
        };
        match session.form.submit(submitting) {
            Ok(values) => {
                let Some(execution_id) = session.form.execution_id().map(str::to_string) else {
                    self.form = None;
                    return Ok(false);
                };
                session.form.lock();
                self.form = None;
                match self.handle.submit_form(execution_id, values).await {
                    // Rejections are broadcast and printed from there
                    Ok(()) | Err(RuntimeError::Rejected(_)) => return Ok(true),
                    Err(e) => return Err(e),
                }
            }
            Err(FormRejection::Invalid(errors)) => {
                for (key, error) in &errors {
                    println!("{}", self.printer.status(&format!("{key}: {error}"), false));
                }
                // Revisit from the first invalid field
                session.field = session
                    .form
                    .controls()
                    .iter()
                    .position(|c| c.error.is_some())
                    .unwrap_or(0);
            }
            Err(FormRejection::Submitting) => {
                // Keep the values; the last field can be confirmed again
                println!("{}", self.printer.status(&FormRejection::Submitting.to_string(), false));
                session.field = session.form.schema().len().saturating_sub(1);
            }
            Err(e @ FormRejection::Locked) => {
                println!("{}", self.printer.status(&e.to_string(), false));
                self.form = None;
            }
        }
        Ok(false)
    }

    fn prompt(&self) {
        match &self.form {
            Some(session) => {
                if let Some(control) = session.form.controls().get(session.field) {
                    print!("{}", self.printer.field_prompt(control));
                }
            }
            None => print!("> "),
        }
        let _ = std::io::stdout().flush();
    }
}

fn parse_toggle(input: &str) -> Option<bool> {
    match input.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" | "true" | "on" => Some(true),
        "n" | "no" | "false" | "off" => Some(false),
        _ => None,
    }
}
