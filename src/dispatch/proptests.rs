//! Property tests over the reducer's turn handling: no interleaving of
//! solicitations, timeouts, clears, and user submissions may leave the turn
//! pointer aimed at an obligation that cannot accept a reply.

use super::*;
use crate::state::ChatState;
use proptest::prelude::*;
use serde_json::json;
use tokio::sync::mpsc;

#[derive(Debug, Clone)]
enum Op {
    Ask(u8),
    AdvisoryMessage(u8),
    Timeout(u8),
    ClearInput(u8),
    SubmitKeyboard,
    ClearSession,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u8..8).prop_map(Op::Ask),
        (0u8..8).prop_map(Op::AdvisoryMessage),
        (0u8..8).prop_map(Op::Timeout),
        (0u8..8).prop_map(Op::ClearInput),
        Just(Op::SubmitKeyboard),
        Just(Op::ClearSession),
    ]
}

fn apply(state: &mut ChatState, ctx: &SessionContext, tx: &mpsc::UnboundedSender<Outgoing>, op: Op) {
    match op {
        Op::Ask(n) => {
            let event = ServerEvent::decode(
                "ask",
                json!({
                    "msg": { "id": format!("s{n}"), "output": "?" },
                    "spec": { "__type__": "AskSpec", "timeout": 30, "type": "text" }
                }),
            )
            .unwrap();
            let ack = AckHandle::new(u64::from(n), tx.clone());
            dispatch(state, ctx, Input::Server { event, ack: Some(ack) });
        }
        Op::AdvisoryMessage(n) => {
            let event = ServerEvent::decode(
                "new_message",
                json!({
                    "msg": { "id": format!("s{n}"), "output": "fyi" },
                    "spec": { "__type__": "MessageSpec" }
                }),
            )
            .unwrap();
            dispatch(state, ctx, Input::Server { event, ack: None });
        }
        Op::Timeout(n) => {
            let event = ServerEvent::decode(
                "ask_timeout",
                json!({ "msg": { "id": format!("s{n}") } }),
            )
            .unwrap();
            dispatch(state, ctx, Input::Server { event, ack: None });
        }
        Op::ClearInput(n) => {
            let event = ServerEvent::decode(
                "clear_input",
                json!({ "msg": { "id": format!("s{n}") } }),
            )
            .unwrap();
            dispatch(state, ctx, Input::Server { event, ack: None });
        }
        Op::SubmitKeyboard => {
            let step = Step::user_message("user", "answer");
            dispatch(
                state,
                ctx,
                Input::Command(Command::SubmitUserInput {
                    kind: UserInputKind::Keyboard,
                    step,
                    data: None,
                }),
            );
        }
        Op::ClearSession => {
            dispatch(
                state,
                ctx,
                Input::Command(Command::ClearSession {
                    new_session_id: "next".to_string(),
                }),
            );
        }
    }
}

proptest! {
    #[test]
    fn turn_pointer_always_targets_an_active_obligation(
        ops in prop::collection::vec(op_strategy(), 0..64)
    ) {
        let ctx = SessionContext { http_endpoint: "http://localhost".to_string() };
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut state = ChatState::new("sid");
        for op in ops {
            apply(&mut state, &ctx, &tx, op);
            prop_assert!(state.turn.check_invariant());
        }
        // Every ack frame produced along the way is well-formed wire output.
        while let Ok(frame) = rx.try_recv() {
            match frame {
                Outgoing::Ack { payload, .. } => {
                    prop_assert!(payload.get("type").is_some());
                }
                Outgoing::Event { name, .. } => {
                    prop_assert!(!name.is_empty());
                }
            }
        }
    }

    #[test]
    fn duplicate_ids_never_duplicate_log_entries(
        ids in prop::collection::vec(0u8..4, 1..32)
    ) {
        let ctx = SessionContext { http_endpoint: "http://localhost".to_string() };
        let mut state = ChatState::new("sid");
        for n in &ids {
            let event = ServerEvent::decode(
                "new_message",
                json!({ "msg": { "id": format!("s{n}"), "output": format!("v{n}") } }),
            )
            .unwrap();
            dispatch(&mut state, &ctx, Input::Server { event, ack: None });
        }
        let mut seen: Vec<&str> = state.log.steps().iter().map(|s| s.id.as_str()).collect();
        seen.sort_unstable();
        let before = seen.len();
        seen.dedup();
        prop_assert_eq!(before, seen.len());
    }
}
