//! Mock implementations for testing
//!
//! These mocks enable runtime integration testing without real I/O.

use crate::protocol::{ExecuteRequest, ExecuteResponse};
use crate::transport::Transport;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

// ============================================================================
// Scripted Transport
// ============================================================================

/// What the scripted transport does for one call
#[allow(dead_code)]
#[derive(Debug)]
pub enum ScriptStep {
    Respond(ExecuteResponse),
    /// Panic inside the transport future
    Panic(String),
    /// Never answer
    Hang,
}

/// Transport that plays back queued steps and records every request
pub struct ScriptedTransport {
    steps: Mutex<VecDeque<ScriptStep>>,
    requests: Mutex<Vec<ExecuteRequest>>,
    healthy: AtomicBool,
    /// Signalled whenever a request arrives
    pub request_started: Arc<Notify>,
}

#[allow(dead_code)]
impl ScriptedTransport {
    pub fn new() -> Self {
        Self {
            steps: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            healthy: AtomicBool::new(true),
            request_started: Arc::new(Notify::new()),
        }
    }

    pub fn queue(&self, step: ScriptStep) {
        self.steps.lock().unwrap().push_back(step);
    }

    /// Queue a response
    pub fn queue_response(&self, response: ExecuteResponse) {
        self.queue(ScriptStep::Respond(response));
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    /// Get recorded requests
    pub fn recorded_requests(&self) -> Vec<ExecuteRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Default for ScriptedTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn execute(&self, request: &ExecuteRequest) -> ExecuteResponse {
        self.requests.lock().unwrap().push(request.clone());
        self.request_started.notify_one();

        let step = self.steps.lock().unwrap().pop_front();
        match step {
            Some(ScriptStep::Respond(response)) => response,
            Some(ScriptStep::Panic(message)) => panic!("{message}"),
            Some(ScriptStep::Hang) => std::future::pending().await,
            None => ExecuteResponse::failed("No scripted response queued"),
        }
    }

    async fn check_health(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::{MessageContent, Role};
    use crate::form::{DynamicForm, FormRejection};
    use crate::protocol::{
        Block, ChartType, ExecuteRequest, FieldSpec, FieldType, InputSchema, Outcome, Output, UserInput,
    };
    use crate::runtime::{
        start, ChatUpdate, ConversationHandle, ConversationSnapshot, RuntimeError, RuntimeOptions,
    };
    use crate::state_machine::transition::{QUERY_FAULT, SUBMIT_FAULT};
    use crate::state_machine::{ConvState, TransitionError};
    use crate::transport::MockAgentTransport;
    use serde_json::json;
    use std::time::Duration;
    use tokio::sync::broadcast;

    fn options() -> RuntimeOptions {
        RuntimeOptions {
            request_timeout: Duration::from_secs(5),
            welcome: false,
        }
    }

    fn start_scripted(transport: &Arc<ScriptedTransport>, options: RuntimeOptions) -> ConversationHandle {
        start(transport.clone(), options)
    }

    /// Wait for the in-flight turn to resolve
    async fn next_settled(rx: &mut broadcast::Receiver<ChatUpdate>) {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                match rx.recv().await {
                    Ok(ChatUpdate::Settled) => break,
                    Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(broadcast::error::RecvError::Closed) => panic!("runtime closed"),
                }
            }
        })
        .await
        .expect("turn should settle");
    }

    fn open_execution(snapshot: &ConversationSnapshot) -> String {
        snapshot
            .open_form()
            .and_then(|m| m.execution_id())
            .expect("an open form")
            .to_string()
    }

    fn input(pairs: &[(&str, serde_json::Value)]) -> UserInput {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[tokio::test]
    async fn welcome_message_seeds_the_log() {
        let handle = start(MockAgentTransport::instant(), RuntimeOptions::default());
        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.messages.len(), 1);
        assert_eq!(snapshot.messages[0].role, Role::Agent);
        assert_eq!(snapshot.state, ConvState::Idle);
        assert_eq!(snapshot.service_available, None);
    }

    /// Sales report flow: prompt, second prompt, final document
    #[tokio::test]
    async fn sales_report_flow_end_to_end() {
        let handle = start(MockAgentTransport::instant(), options());
        let mut rx = handle.subscribe();

        // Step 1: the query opens a form asking for the region
        handle.send_query("Generate a sales report").await.unwrap();
        next_settled(&mut rx).await;

        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.messages.len(), 2);
        assert_eq!(snapshot.messages[0].role, Role::User);
        let prompt = snapshot.messages[1].prompt.as_ref().unwrap();
        assert!(!prompt.has_submitted);
        let schema = prompt.input_schema.as_ref().unwrap();
        assert_eq!(schema.len(), 2);
        assert_eq!(schema.get("region"), Some(&FieldSpec::string(true).with_description("Region (e.g. North America, APAC)")));
        let forecast = schema.get("includeForecast").unwrap();
        assert_eq!(forecast.field_type, FieldType::Boolean);
        assert!(!forecast.required);
        let keys: Vec<_> = schema.iter().map(|(key, _)| key).collect();
        assert_eq!(keys, ["region", "includeForecast"]);
        let first = open_execution(&snapshot);
        assert_eq!(
            snapshot.state,
            ConvState::AwaitingFormInput {
                execution_id: first.clone()
            }
        );

        // Step 2: submitting locks the first form and opens the next one
        handle
            .submit_form(&first, input(&[("region", json!("APAC"))]))
            .await
            .unwrap();
        next_settled(&mut rx).await;

        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.messages.len(), 3);
        assert!(snapshot.messages[1].prompt.as_ref().unwrap().has_submitted);
        let second = open_execution(&snapshot);
        assert_ne!(first, second);
        let text = snapshot.messages[2].content.as_text().unwrap();
        assert!(text.contains("APAC"), "{text}");

        // Step 3: the final answer is a document with a bar chart
        handle
            .submit_form(&second, input(&[("period", json!("2024Q1"))]))
            .await
            .unwrap();
        next_settled(&mut rx).await;

        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.messages.len(), 4);
        assert_eq!(snapshot.state, ConvState::Idle);
        assert!(snapshot.open_form().is_none());
        let MessageContent::Document(doc) = &snapshot.messages[3].content else {
            panic!("expected a document, got {:?}", snapshot.messages[3].content);
        };
        assert!(matches!(doc.blocks[0], Block::Paragraph { .. }));
        let Block::Chart { chart } = &doc.blocks[1] else {
            panic!("expected a chart block");
        };
        assert_eq!(chart.chart_type, ChartType::Bar);
        assert_eq!(chart.x, vec!["Jan", "Feb", "Mar"]);
        let names: Vec<_> = chart.series.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Revenue", "Target"]);
        assert!(chart.series.iter().all(|s| s.data.len() == 3));
    }

    #[tokio::test]
    async fn submitting_twice_is_rejected_without_transport_call() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.queue_response(ExecuteResponse::waiting_for_input(
            "exec-1",
            "Which region?",
            InputSchema::new().with_field("region", FieldSpec::string(true)),
        ));
        transport.queue_response(ExecuteResponse::completed("done"));
        let handle = start_scripted(&transport, options());
        let mut rx = handle.subscribe();

        handle.send_query("report").await.unwrap();
        next_settled(&mut rx).await;
        handle
            .submit_form("exec-1", input(&[("region", json!("EU"))]))
            .await
            .unwrap();
        next_settled(&mut rx).await;
        let before = handle.snapshot().await.unwrap();

        let err = handle
            .submit_form("exec-1", input(&[("region", json!("EU"))]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::Rejected(TransitionError::AlreadySubmitted(ref id)) if id == "exec-1"
        ));
        let err = handle.submit_form("exec-404", UserInput::new()).await.unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::Rejected(TransitionError::UnknownExecution(_))
        ));

        let after = handle.snapshot().await.unwrap();
        assert_eq!(after.messages, before.messages);
        assert_eq!(transport.recorded_requests().len(), 2);
        assert_eq!(
            transport.recorded_requests()[1],
            ExecuteRequest::resume("exec-1", input(&[("region", json!("EU"))]))
        );
    }

    /// Transport fault on a fresh query: user message plus system error
    #[tokio::test]
    async fn panicking_transport_appends_system_error() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.queue(ScriptStep::Panic("connection reset".into()));
        let handle = start_scripted(&transport, options());
        let mut rx = handle.subscribe();

        handle.send_query("hello").await.unwrap();
        next_settled(&mut rx).await;

        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.state, ConvState::Idle);
        assert_eq!(snapshot.messages.len(), 2);
        assert_eq!(snapshot.messages[0].role, Role::User);
        assert_eq!(snapshot.messages[0].content.as_text(), Some("hello"));
        assert_eq!(snapshot.messages[1].role, Role::System);
        assert_eq!(snapshot.messages[1].content.as_text(), Some(QUERY_FAULT));

        // The runtime survives and serves the next turn
        transport.queue_response(ExecuteResponse::completed("still here"));
        handle.send_query("again").await.unwrap();
        next_settled(&mut rx).await;
        assert_eq!(handle.snapshot().await.unwrap().messages.len(), 4);
    }

    #[tokio::test]
    async fn panicking_transport_on_resume_uses_submit_text() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.queue_response(ExecuteResponse::waiting_for_input(
            "exec-1",
            "More?",
            InputSchema::new(),
        ));
        transport.queue(ScriptStep::Panic("boom".into()));
        let handle = start_scripted(&transport, options());
        let mut rx = handle.subscribe();

        handle.send_query("start").await.unwrap();
        next_settled(&mut rx).await;
        handle.submit_form("exec-1", UserInput::new()).await.unwrap();
        next_settled(&mut rx).await;

        let snapshot = handle.snapshot().await.unwrap();
        let last = snapshot.messages.last().unwrap();
        assert_eq!(last.role, Role::System);
        assert_eq!(last.content.as_text(), Some(SUBMIT_FAULT));
        assert_eq!(snapshot.state, ConvState::Idle);
        // The form stays locked after a failed submission
        assert!(snapshot.open_form().is_none());
    }

    #[tokio::test]
    async fn hung_transport_times_out_into_failed_message() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.queue(ScriptStep::Hang);
        let handle = start_scripted(
            &transport,
            RuntimeOptions {
                request_timeout: Duration::from_millis(50),
                welcome: false,
            },
        );
        let mut rx = handle.subscribe();

        handle.send_query("hello").await.unwrap();
        next_settled(&mut rx).await;

        let snapshot = handle.snapshot().await.unwrap();
        let last = snapshot.messages.last().unwrap();
        assert_eq!(last.role, Role::Agent);
        assert_eq!(last.content.as_text(), Some("Request timed out after 50ms."));
        assert_eq!(snapshot.state, ConvState::Idle);
    }

    #[tokio::test]
    async fn second_query_while_busy_is_rejected() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.queue(ScriptStep::Hang);
        let handle = start_scripted(&transport, options());
        let mut rx = handle.subscribe();

        handle.send_query("first").await.unwrap();
        let err = handle.send_query("second").await.unwrap_err();
        assert!(matches!(err, RuntimeError::Rejected(TransitionError::Busy)));

        let mut saw_rejection = false;
        while let Ok(update) = rx.try_recv() {
            if let ChatUpdate::Rejected { message } = update {
                saw_rejection = message.contains("busy");
            }
        }
        assert!(saw_rejection);

        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.messages.len(), 1);
        assert!(snapshot.state.is_busy());
        assert_eq!(transport.recorded_requests().len(), 1);
    }

    #[tokio::test]
    async fn blank_query_is_rejected() {
        let transport = Arc::new(ScriptedTransport::new());
        let handle = start_scripted(&transport, options());

        let err = handle.send_query("   ").await.unwrap_err();
        assert!(matches!(err, RuntimeError::Rejected(TransitionError::EmptyQuery)));
        assert!(handle.snapshot().await.unwrap().messages.is_empty());
        assert!(transport.recorded_requests().is_empty());
    }

    /// Required string left empty: the form refuses and nothing is sent
    #[tokio::test]
    async fn invalid_form_never_reaches_transport() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.queue_response(ExecuteResponse::waiting_for_input(
            "exec-1",
            "Which region?",
            InputSchema::new()
                .with_field("region", FieldSpec::string(true))
                .with_field("includeForecast", FieldSpec::boolean(false)),
        ));
        let handle = start_scripted(&transport, options());
        let mut rx = handle.subscribe();

        handle.send_query("report").await.unwrap();
        next_settled(&mut rx).await;

        let snapshot = handle.snapshot().await.unwrap();
        let message = snapshot.open_form().unwrap();
        let mut form = DynamicForm::for_message(message).unwrap();
        form.set_text("region", "").unwrap();

        let Err(FormRejection::Invalid(errors)) = form.submit(false) else {
            panic!("expected validation failure");
        };
        assert_eq!(
            errors.get("region").map(String::as_str),
            Some("This field is required")
        );
        assert_eq!(transport.recorded_requests().len(), 1);
        let after = handle.snapshot().await.unwrap();
        assert!(!after.messages[1].prompt.as_ref().unwrap().has_submitted);
    }

    #[tokio::test]
    async fn updates_are_broadcast_in_order() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.queue_response(ExecuteResponse::completed(Output::Text("hi".into())));
        let handle = start_scripted(&transport, options());
        let mut rx = handle.subscribe();

        handle.send_query("hello").await.unwrap();
        next_settled(&mut rx).await;

        let handle2 = handle.clone();
        let mut rx = handle2.subscribe();
        transport.queue_response(ExecuteResponse::failed(""));
        handle2.send_query("again").await.unwrap();

        let mut kinds = Vec::new();
        loop {
            let update = tokio::time::timeout(Duration::from_secs(5), rx.recv())
                .await
                .unwrap()
                .unwrap();
            let kind = match &update {
                ChatUpdate::MessageAppended { message } => match message.role {
                    Role::User => "user",
                    Role::Agent => "agent",
                    Role::System => "system",
                },
                ChatUpdate::StateChanged { state } => state.name(),
                ChatUpdate::Settled => "settled",
                _ => "other",
            };
            kinds.push(kind);
            if matches!(update, ChatUpdate::Settled) {
                break;
            }
        }
        assert_eq!(
            kinds,
            vec!["user", "awaiting_response", "agent", "idle", "settled"]
        );
        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(
            snapshot.messages[3].content.as_text(),
            Some("Something went wrong.")
        );
    }

    #[tokio::test]
    async fn health_check_updates_snapshot_and_broadcasts() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.set_healthy(false);
        let handle = start_scripted(&transport, options());
        let mut rx = handle.subscribe();

        assert!(!handle.check_health().await.unwrap());
        let update = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(update, ChatUpdate::ServiceStatus { available: false }));
        assert_eq!(handle.snapshot().await.unwrap().service_available, Some(false));

        transport.set_healthy(true);
        assert!(handle.check_health().await.unwrap());
    }

    #[tokio::test]
    async fn shutdown_closes_the_handle() {
        let transport = Arc::new(ScriptedTransport::new());
        let handle = start_scripted(&transport, options());
        handle.shutdown();
        assert!(matches!(
            handle.send_query("hello").await,
            Err(RuntimeError::Closed)
        ));
        assert!(matches!(handle.snapshot().await, Err(RuntimeError::Closed)));
    }

    #[tokio::test]
    async fn completed_document_survives_unchanged() {
        let transport = Arc::new(ScriptedTransport::new());
        let body = json!({
            "status": "COMPLETED",
            "success": true,
            "output": {"type": "document", "version": "v1", "blocks": [
                {"type": "paragraph", "text": "Hi"},
                {"type": "chart", "chart": {"type": "line", "title": "T", "x": ["a"], "series": [{"name": "s", "data": [1.0]}]}}
            ]}
        });
        let response: ExecuteResponse = serde_json::from_value(body).unwrap();
        let Outcome::Completed {
            output: Some(Output::Document(expected)),
        } = response.outcome.clone()
        else {
            unreachable!()
        };
        transport.queue_response(response);
        let handle = start_scripted(&transport, options());
        let mut rx = handle.subscribe();

        handle.send_query("doc").await.unwrap();
        next_settled(&mut rx).await;

        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(
            snapshot.messages[1].content,
            MessageContent::Document(expected)
        );
    }
}
