use std::sync::Arc;
use std::thread;

use ivr_core::{
    IntentRuleSet, Resolution, ResolveError, ResolveInput, Resolver, RouteDecision, Service,
};

fn route(resolution: Resolution) -> RouteDecision {
    match resolution {
        Resolution::Route(decision) => decision,
        Resolution::RepeatMenu => panic!("expected a route"),
    }
}

#[test]
fn keypad_partitions() {
    let resolver = Resolver::default();

    for digit in ["1", "2", "3", "4"] {
        let decision = route(resolver.resolve(&ResolveInput::digit(digit)).unwrap());
        assert_eq!(decision.service, Service::Account);
        assert_eq!(decision.confidence, 1.0);
    }
    for digit in ["5", "6", "7"] {
        let decision = route(resolver.resolve(&ResolveInput::digit(digit)).unwrap());
        assert_eq!(decision.service, Service::Agent);
        assert_eq!(decision.confidence, 1.0);
    }
    for digit in ["0", "8"] {
        assert_eq!(
            resolver.resolve_digit(digit),
            Err(ResolveError::InvalidDigit(digit.to_string()))
        );
    }
    assert_eq!(
        resolver.resolve(&ResolveInput::digit("9")).unwrap(),
        Resolution::RepeatMenu
    );
}

#[test]
fn reference_utterances() {
    let resolver = Resolver::default();
    let cases = [
        ("check my balance", Service::Account, '1', "balance_inquiry", 0.85),
        ("recharge my phone", Service::Account, '2', "recharge_account", 0.85),
        ("cancel my last transaction", Service::Agent, '7', "cancel_action", 0.85),
        ("I want to talk to an agent", Service::Agent, '5', "agent_support", 0.85),
        ("what's the weather today", Service::Unknown, '0', "unknown", 0.0),
        ("", Service::Unknown, '0', "unknown", 0.0),
    ];

    for (text, service, digit, intent, confidence) in cases {
        assert_eq!(
            resolver.classify(text),
            RouteDecision {
                service,
                digit,
                intent: intent.to_string(),
                confidence,
            },
            "{text}"
        );
    }
}

#[test]
fn concurrent_callers_share_one_rule_set() {
    let resolver = Arc::new(Resolver::new(Arc::new(IntentRuleSet::standard())));
    let expected = resolver.classify("show me my last transaction");

    let handles = (0..8)
        .map(|_| {
            let resolver = Arc::clone(&resolver);
            thread::spawn(move || resolver.classify("show me my last transaction"))
        })
        .collect::<Vec<_>>();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), expected);
    }
}

#[test]
fn shipped_rule_file_matches_builtin_table() {
    let path = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../../config/intent_rules.json");
    let loaded = ivr_core::load_rule_set(path).expect("shipped rule file should load");
    assert_eq!(loaded, IntentRuleSet::standard());
}
