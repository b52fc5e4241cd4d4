use crate::models::{RouteDecision, Service, RULE_MATCH_CONFIDENCE};
use crate::rules::{IntentRule, IntentRuleSet};

/// Case-folds, trims and collapses inner whitespace.
pub fn normalize_utterance(input: &str) -> String {
    input
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_lowercase()
}

/// Coarse phase: the first service (in rule-set order) with any keyword
/// present in the utterance.
pub fn detect_service(rules: &IntentRuleSet, text: &str) -> Service {
    rules
        .services()
        .into_iter()
        .find(|service| rules.rules_for(*service).any(|rule| rule.has_evidence(text)))
        .unwrap_or(Service::Unknown)
}

/// Maps a free-text utterance onto a route.
///
/// Matching runs in two phases. The coarse phase picks a service from keyword
/// evidence; the fine phase walks that service's rules in priority order and
/// falls back to the service's catch-all rule when nothing specific matches.
pub fn classify_utterance(rules: &IntentRuleSet, utterance: &str) -> RouteDecision {
    let text = normalize_utterance(utterance);
    if text.is_empty() {
        return RouteDecision::unknown();
    }

    let service = detect_service(rules, &text);
    if !service.is_routable() {
        return RouteDecision::unknown();
    }

    for rule in rules.rules_for(service) {
        if !rule.matches(&text) {
            continue;
        }

        let winner = rule
            .yields_to
            .as_deref()
            .and_then(|target| rules.rule(target))
            .filter(|target| target.has_evidence(&text))
            .unwrap_or(rule);

        return decision(winner, RULE_MATCH_CONFIDENCE);
    }

    match rules.fallback_for(service) {
        Some(rule) => decision(rule, rule.fallback_confidence.unwrap_or(RULE_MATCH_CONFIDENCE)),
        None => RouteDecision::unknown(),
    }
}

fn decision(rule: &IntentRule, confidence: f32) -> RouteDecision {
    RouteDecision {
        service: rule.service,
        digit: rule.digit,
        intent: rule.name.clone(),
        confidence,
    }
}
