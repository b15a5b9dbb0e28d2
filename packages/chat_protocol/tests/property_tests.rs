use proptest::prelude::*;

use chat_protocol::{ERROR_TEXT, FrameOutcome, InboundFrame, MessageLog, Role};

fn token(content: &str) -> InboundFrame {
    InboundFrame::Token {
        content: content.to_string(),
    }
}

// --- Streaming assembly ---

proptest! {
    #[test]
    fn tokens_concatenate_in_arrival_order(fragments in prop::collection::vec(".{0,12}", 1..20)) {
        let mut log = MessageLog::new();
        log.push_user("question");
        for fragment in &fragments {
            log.apply(&token(fragment));
        }

        prop_assert_eq!(log.len(), 2);
        let reply = log.last().unwrap();
        prop_assert_eq!(reply.role, Role::Agent);
        prop_assert_eq!(&reply.text, &fragments.concat());
    }

    #[test]
    fn agent_message_after_tokens_adds_nothing(
        fragments in prop::collection::vec("[a-z ]{1,8}", 1..10),
        full in proptest::option::of(".{0,20}"),
    ) {
        let mut log = MessageLog::new();
        log.push_user("question");
        for fragment in &fragments {
            log.apply(&token(fragment));
        }
        let before = log.len();

        let outcome = log.apply(&InboundFrame::AgentMessage { content: full, done: true });

        prop_assert_eq!(outcome, FrameOutcome::Unchanged);
        prop_assert_eq!(log.len(), before);
        prop_assert_eq!(&log.last().unwrap().text, &fragments.concat());
    }

    #[test]
    fn agent_message_alone_adds_exactly_one(content in "[a-zA-Z0-9 ]{1,40}") {
        let mut log = MessageLog::new();
        log.push_user("question");

        log.apply(&InboundFrame::AgentMessage { content: Some(content.clone()), done: true });

        prop_assert_eq!(log.len(), 2);
        prop_assert_eq!(log.last().unwrap().role, Role::Agent);
        prop_assert_eq!(&log.last().unwrap().text, &content);
    }

    #[test]
    fn errors_never_leak_backend_detail(detail in proptest::option::of(".{0,40}")) {
        let mut log = MessageLog::new();
        log.apply(&InboundFrame::Error { content: detail });
        prop_assert_eq!(log.last().unwrap().role, Role::Error);
        prop_assert_eq!(log.last().unwrap().text.as_str(), ERROR_TEXT);
    }

    #[test]
    fn log_never_shrinks(ops in prop::collection::vec(0u8..5, 0..40)) {
        let mut log = MessageLog::new();
        let mut previous = 0;
        for op in ops {
            match op {
                0 => { log.push_user("u"); }
                1 => { log.apply(&token("t")); }
                2 => { log.apply(&InboundFrame::AgentMessage { content: Some("a".into()), done: true }); }
                3 => { log.apply(&InboundFrame::Error { content: None }); }
                _ => { log.push_upload_summary(["f.csv"]); }
            }
            prop_assert!(log.len() >= previous);
            previous = log.len();
        }
    }
}

// --- Decoding robustness ---

proptest! {
    #[test]
    fn decode_never_panics(raw in ".{0,64}") {
        let _ = InboundFrame::decode(&raw);
    }

    #[test]
    fn unknown_types_are_rejected(kind in "[a-z]{3,10}") {
        prop_assume!(!["token", "error"].contains(&kind.as_str()));
        let raw = format!(r#"{{"type":"{kind}","content":"x"}}"#);
        prop_assert!(InboundFrame::decode(&raw).is_err());
    }
}
