//! Property-based tests for the state machine
//!
//! These tests verify key invariants hold across all possible inputs.

use super::transition::*;
use super::*;
use crate::conversation::MessageLog;
use crate::protocol::{
    Block, Document, ExecuteResponse, FieldSpec, InputSchema, Outcome, Output, UserInput,
};
use proptest::prelude::*;
use serde_json::json;

// ============================================================================
// Test Helpers
// ============================================================================

/// Apply the log-mutating effects the way the runtime does
fn apply(log: &mut MessageLog, effects: &[Effect]) -> Vec<ExecuteRequestSeen> {
    let mut requests = Vec::new();
    for effect in effects {
        match effect {
            Effect::AppendMessage { draft } => {
                log.append(draft.clone());
            }
            Effect::MarkSubmitted { execution_id } => {
                log.mark_submitted(execution_id).unwrap();
            }
            Effect::Execute { request } => requests.push(ExecuteRequestSeen(request.kind())),
            Effect::NotifyStateChange | Effect::NotifySettled => {}
        }
    }
    requests
}

#[derive(Debug, PartialEq)]
struct ExecuteRequestSeen(&'static str);

fn count_appends(effects: &[Effect]) -> usize {
    effects
        .iter()
        .filter(|e| matches!(e, Effect::AppendMessage { .. }))
        .count()
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_text() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ]{0,30}"
}

fn arb_non_blank_text() -> impl Strategy<Value = String> {
    "[ ]{0,3}[a-zA-Z0-9]{1,20}[ ]{0,3}"
}

fn arb_schema() -> impl Strategy<Value = InputSchema> {
    proptest::collection::vec(("[a-z]{1,8}", any::<bool>()), 0..4).prop_map(|fields| {
        fields
            .into_iter()
            .fold(InputSchema::new(), |schema, (key, required)| {
                schema.with_field(key, FieldSpec::string(required))
            })
    })
}

fn arb_output() -> impl Strategy<Value = Option<Output>> {
    prop_oneof![
        Just(None),
        arb_text().prop_map(|t| Some(Output::Text(t))),
        arb_text().prop_map(|t| Some(Output::Document(Document::new(vec![Block::paragraph(t)])))),
        Just(Some(Output::Opaque(json!({"rows": [1, 2, 3]})))),
    ]
}

fn arb_outcome() -> impl Strategy<Value = Outcome> {
    prop_oneof![
        arb_output().prop_map(|output| Outcome::Completed { output }),
        (
            proptest::option::of("exec-[a-z0-9]{4}"),
            proptest::option::of(arb_text()),
            proptest::option::of(arb_schema()),
        )
            .prop_map(|(execution_id, await_message, input_schema)| {
                Outcome::WaitingForInput {
                    execution_id,
                    await_message,
                    input_schema,
                }
            }),
        proptest::option::of(arb_text()).prop_map(|error| Outcome::Failed { error }),
    ]
}

fn arb_response() -> impl Strategy<Value = ExecuteResponse> {
    (arb_outcome(), any::<bool>()).prop_map(|(outcome, success)| ExecuteResponse {
        outcome,
        skill_id: None,
        intent: None,
        duration_ms: None,
        success,
    })
}

fn arb_pending() -> impl Strategy<Value = PendingAction> {
    prop_oneof![
        Just(PendingAction::Query),
        "exec-[a-z0-9]{4}".prop_map(|execution_id| PendingAction::Resume { execution_id }),
    ]
}

fn arb_ready_state() -> impl Strategy<Value = ConvState> {
    prop_oneof![
        Just(ConvState::Idle),
        "exec-[a-z0-9]{4}".prop_map(|execution_id| ConvState::AwaitingFormInput { execution_id }),
    ]
}

fn arb_user_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        arb_text().prop_map(|text| Event::SendQuery { text }),
        "exec-[a-z0-9]{4}".prop_map(|execution_id| Event::SubmitForm {
            execution_id,
            values: UserInput::new(),
        }),
    ]
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    /// No user action is accepted while a request is in flight
    #[test]
    fn prop_busy_rejects_user_actions(pending in arb_pending(), event in arb_user_event()) {
        let state = ConvState::AwaitingResponse { pending };
        let result = transition(&state, &MessageLog::new(), event);
        prop_assert!(matches!(result, Err(TransitionError::Busy)));
    }

    /// Every response appends exactly one message and leaves the machine ready
    #[test]
    fn prop_response_appends_exactly_one_message(
        pending in arb_pending(),
        response in arb_response(),
    ) {
        let state = ConvState::AwaitingResponse { pending };
        let result = transition(&state, &MessageLog::new(), Event::ResponseReceived { response }).unwrap();
        prop_assert_eq!(count_appends(&result.effects), 1);
        prop_assert!(!result.new_state.is_busy());
        prop_assert!(result.effects.contains(&Effect::NotifySettled));

        // Waiting on a form only when the appended prompt can be submitted
        let mut log = MessageLog::new();
        apply(&mut log, &result.effects);
        if let Some(execution_id) = result.new_state.open_execution_id() {
            prop_assert!(log.check_submittable(execution_id).is_ok());
        }
    }

    /// A full query turn grows the log by exactly two messages
    #[test]
    fn prop_query_turn_grows_log_by_two(
        start in arb_ready_state(),
        text in arb_non_blank_text(),
        response in arb_response(),
    ) {
        let mut log = MessageLog::new();
        let sent = transition(&start, &log, Event::SendQuery { text }).unwrap();
        let requests = apply(&mut log, &sent.effects);
        prop_assert_eq!(requests, vec![ExecuteRequestSeen("query")]);
        prop_assert_eq!(log.len(), 1);

        let resolved = transition(&sent.new_state, &log, Event::ResponseReceived { response }).unwrap();
        apply(&mut log, &resolved.effects);
        prop_assert_eq!(log.len(), 2);
    }

    /// A transport fault also grows the log by exactly two
    #[test]
    fn prop_faulted_turn_grows_log_by_two(text in arb_non_blank_text(), message in arb_text()) {
        let mut log = MessageLog::new();
        let sent = transition(&ConvState::Idle, &log, Event::SendQuery { text }).unwrap();
        apply(&mut log, &sent.effects);
        let faulted = transition(&sent.new_state, &log, Event::TransportFault { message }).unwrap();
        apply(&mut log, &faulted.effects);
        prop_assert_eq!(log.len(), 2);
        prop_assert_eq!(faulted.new_state, ConvState::Idle);
    }

    /// Whitespace-only input never produces effects
    #[test]
    fn prop_blank_query_rejected(start in arb_ready_state(), text in "[ \t\n]{0,10}") {
        let result = transition(&start, &MessageLog::new(), Event::SendQuery { text });
        prop_assert!(matches!(result, Err(TransitionError::EmptyQuery)));
    }

    /// Submitting the same execution twice is rejected without side effects
    #[test]
    fn prop_submit_is_idempotent_per_execution(
        execution_id in "exec-[a-z0-9]{4}",
        schema in arb_schema(),
        response in arb_response(),
    ) {
        let mut log = MessageLog::new();
        let opened = transition(
            &ConvState::AwaitingResponse { pending: PendingAction::Query },
            &log,
            Event::ResponseReceived {
                response: ExecuteResponse::waiting_for_input(execution_id.clone(), "more?", schema),
            },
        ).unwrap();
        apply(&mut log, &opened.effects);

        let submit = Event::SubmitForm { execution_id: execution_id.clone(), values: UserInput::new() };
        let first = transition(&opened.new_state, &log, submit.clone()).unwrap();
        let requests = apply(&mut log, &first.effects);
        prop_assert_eq!(requests, vec![ExecuteRequestSeen("resume")]);

        let resolved = transition(&first.new_state, &log, Event::ResponseReceived { response }).unwrap();
        apply(&mut log, &resolved.effects);

        let len_before = log.len();
        let ready = if resolved.new_state.is_busy() { ConvState::Idle } else { resolved.new_state.clone() };
        let second = transition(&ready, &log, submit);
        // A new prompt reusing the same id would legitimately reopen the form
        if log.check_submittable(&execution_id).is_err() {
            prop_assert!(second.is_err());
            prop_assert_eq!(log.len(), len_before);
        }
    }
}
