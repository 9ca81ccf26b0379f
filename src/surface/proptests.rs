//! Property-based tests for the surface reducer
//!
//! Random action sequences must leave the transcript consistent after every
//! step.

use super::format::{format_arguments, format_result};
use super::*;
use crate::event::StreamEvent;
use proptest::prelude::*;
use serde_json::Value;

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_json() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::from),
        "[a-zA-Z0-9 \"\\\\]{0,12}".prop_map(Value::String),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-z_]{1,8}", inner, 0..4)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

fn arb_structured_json() -> impl Strategy<Value = Value> {
    prop_oneof![
        prop::collection::vec(arb_json(), 0..4).prop_map(Value::Array),
        prop::collection::btree_map("[a-z_]{1,8}", arb_json(), 0..4)
            .prop_map(|m| Value::Object(m.into_iter().collect())),
    ]
}

fn arb_tool_id() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(String::new()),
        Just("t1".to_string()),
        Just("t2".to_string()),
        Just("t3".to_string()),
    ]
}

fn arb_stream_event() -> impl Strategy<Value = StreamEvent> {
    prop_oneof![
        4 => "[a-z .]{0,8}".prop_map(StreamEvent::Content),
        2 => (arb_tool_id(), prop_oneof![Just(String::new()), Just("Price".to_string())], arb_json())
            .prop_map(|(id, name, args)| StreamEvent::tool_call(id, name, args)),
        2 => (arb_tool_id(), arb_json()).prop_map(|(id, result)| StreamEvent::tool_result(id, result)),
        1 => Just(StreamEvent::End),
        1 => "[a-z ]{1,8}".prop_map(StreamEvent::Error),
    ]
}

fn arb_action() -> impl Strategy<Value = Action> {
    prop_oneof![
        2 => "[a-z ]{0,6}".prop_map(Action::Submit),
        8 => arb_stream_event().prop_map(Action::Stream),
        1 => (0usize..12).prop_map(Action::ToggleCard),
        1 => (0usize..12).prop_map(Action::CollapseDue),
    ]
}

// ============================================================================
// Invariant checks
// ============================================================================

fn check_structure(t: &Transcript) -> Result<(), TestCaseError> {
    if let Some(index) = t.open_bubble() {
        prop_assert!(
            matches!(t.nodes().get(index), Some(Node::Assistant(_))),
            "open bubble must point at an assistant node"
        );
        prop_assert_eq!(t.lock(), InputLock::Awaiting);
    }
    for (id, index) in &t.registry {
        let card = t.card(*index);
        prop_assert!(card.is_some(), "registry entry must point at a card");
        let card = card.unwrap();
        prop_assert_eq!(&card.tool_id, id);
        prop_assert!(card.is_waiting(), "registered card already has a result");
    }
    if !t.input_enabled() {
        prop_assert!(!t.nodes().is_empty());
    } else {
        prop_assert!(!t.typing(), "typing indicator visible while idle");
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn prop_transcript_stays_consistent(actions in prop::collection::vec(arb_action(), 0..60)) {
        let mut t = Transcript::new();
        let mut in_flight = false;
        let mut unlocks = 0usize;
        let mut turns_finished = 0usize;

        for (step, action) in actions.into_iter().enumerate() {
            let accepted_submit = matches!(&action, Action::Submit(text) if !text.trim().is_empty() && !in_flight);
            let terminal = matches!(&action, Action::Stream(event) if event.is_terminal()) && in_flight;

            let was_enabled = t.input_enabled();
            let effects = reduce_at(&mut t, action, i64::try_from(step).unwrap_or(0));
            if !was_enabled && t.input_enabled() {
                unlocks += 1;
            }

            if accepted_submit {
                prop_assert!(matches!(effects.first(), Some(Effect::SendPrompt(_))));
                in_flight = true;
            }
            if terminal {
                prop_assert!(effects.contains(&Effect::FocusInput));
                in_flight = false;
                turns_finished += 1;
            }
            prop_assert_eq!(t.input_enabled(), !in_flight);
            check_structure(&t)?;
        }
        prop_assert_eq!(unlocks, turns_finished);
    }

    #[test]
    fn prop_contents_concatenate_exactly(fragments in prop::collection::vec("[a-zA-Z .,!]{0,10}", 1..20)) {
        let mut t = Transcript::new();
        reduce(&mut t, Action::Submit("go".into()));
        for fragment in &fragments {
            reduce(&mut t, Action::Stream(StreamEvent::Content(fragment.clone())));
        }
        reduce(&mut t, Action::Stream(StreamEvent::End));

        let bubbles: Vec<&Node> = t.nodes().iter().filter(|n| matches!(n, Node::Assistant(_))).collect();
        prop_assert_eq!(bubbles.len(), 1);
        prop_assert_eq!(bubbles[0], &Node::Assistant(fragments.concat()));
    }

    #[test]
    fn prop_matched_result_fills_once(result in arb_json(), late in arb_json()) {
        let mut t = Transcript::new();
        reduce(&mut t, Action::Submit("go".into()));
        reduce(&mut t, Action::Stream(StreamEvent::tool_call("t1", "Price", Value::Null)));
        let effects = reduce(&mut t, Action::Stream(StreamEvent::tool_result("t1", result.clone())));
        prop_assert!(
            matches!(effects.first(), Some(Effect::ScheduleCollapse { card: 1, .. })),
            "expected collapse for card 1, got {:?}",
            effects
        );
        prop_assert!(!t.is_registered("t1"));

        // A second result with the same id no longer matches
        reduce(&mut t, Action::Stream(StreamEvent::tool_result("t1", late.clone())));
        prop_assert_eq!(t.card(1).unwrap().result.clone(), Some(format_result(&result)));
        prop_assert_eq!(t.nodes().last(), Some(&Node::StandaloneResult(format_result(&late))));
    }

    #[test]
    fn prop_serialized_structures_reparse(value in arb_structured_json()) {
        let args = format_arguments(&value).unwrap();
        prop_assert_eq!(serde_json::from_str::<Value>(&args).unwrap(), value.clone());
        let result = format_result(&value);
        prop_assert_eq!(serde_json::from_str::<Value>(&result).unwrap(), value);
    }

    #[test]
    fn prop_new_turn_after_terminal(first in arb_stream_event(), text in "[a-z]{1,8}") {
        let mut t = Transcript::new();
        reduce(&mut t, Action::Submit("one".into()));
        reduce(&mut t, Action::Stream(first));
        reduce(&mut t, Action::Stream(StreamEvent::End));
        prop_assert!(t.input_enabled());

        let before = t.nodes().len();
        let effects = reduce(&mut t, Action::Submit(text.clone()));
        prop_assert_eq!(effects.first(), Some(&Effect::SendPrompt(text.clone())));
        prop_assert_eq!(t.nodes().len(), before + 1);
        prop_assert_eq!(t.nodes().last(), Some(&Node::User(text)));
        prop_assert!(!t.input_enabled());
    }
}
