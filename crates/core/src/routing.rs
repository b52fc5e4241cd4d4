use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::ResolveError;
use crate::intent::classify_utterance;
use crate::models::{
    Resolution, ResolveInput, RouteDecision, Service, DIGIT_CONFIDENCE, MENU_DIGIT,
};
use crate::rules::IntentRuleSet;

/// Keypad digit to service table, derived from the rule set's digits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigitRouter {
    table: BTreeMap<char, Service>,
}

impl DigitRouter {
    pub fn from_rules(rules: &IntentRuleSet) -> Self {
        Self {
            table: rules
                .rules()
                .iter()
                .map(|rule| (rule.digit, rule.service))
                .collect(),
        }
    }

    pub fn service_for(&self, digit: char) -> Option<Service> {
        self.table.get(&digit).copied()
    }

    /// Exact keypad match. Unrouted digits, the menu digit included, are
    /// rejected with [`ResolveError::InvalidDigit`].
    pub fn route(&self, digit: char) -> Result<RouteDecision, ResolveError> {
        let service = self
            .service_for(digit)
            .ok_or_else(|| ResolveError::InvalidDigit(digit.to_string()))?;

        Ok(RouteDecision {
            service,
            digit,
            intent: String::new(),
            confidence: DIGIT_CONFIDENCE,
        })
    }

    pub fn digits(&self) -> impl Iterator<Item = char> + '_ {
        self.table.keys().copied()
    }
}

/// Turns one caller input into a [`Resolution`]. Holds no per-call state.
#[derive(Debug, Clone)]
pub struct Resolver {
    rules: Arc<IntentRuleSet>,
    digits: DigitRouter,
}

impl Resolver {
    pub fn new(rules: Arc<IntentRuleSet>) -> Self {
        let digits = DigitRouter::from_rules(&rules);
        Self { rules, digits }
    }

    pub fn rules(&self) -> &IntentRuleSet {
        &self.rules
    }

    pub fn digit_router(&self) -> &DigitRouter {
        &self.digits
    }

    pub fn resolve(&self, input: &ResolveInput) -> Result<Resolution, ResolveError> {
        match (input.digit.as_deref(), input.utterance.as_deref()) {
            (Some(digit), None) => {
                let digit = parse_digit(digit)?;
                if digit == MENU_DIGIT {
                    return Ok(Resolution::RepeatMenu);
                }
                self.digits.route(digit).map(Resolution::Route)
            }
            (None, Some(utterance)) => Ok(Resolution::Route(self.classify(utterance))),
            _ => Err(ResolveError::InvalidInput),
        }
    }

    /// Routes a single keypad digit. The caller intercepts the menu digit.
    pub fn resolve_digit(&self, digit: &str) -> Result<RouteDecision, ResolveError> {
        self.digits.route(parse_digit(digit)?)
    }

    pub fn classify(&self, utterance: &str) -> RouteDecision {
        classify_utterance(&self.rules, utterance)
    }
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new(Arc::new(IntentRuleSet::standard()))
    }
}

/// Accepts exactly one character after trimming.
pub fn parse_digit(raw: &str) -> Result<char, ResolveError> {
    let trimmed = raw.trim();
    let mut chars = trimmed.chars();
    match (chars.next(), chars.next()) {
        (Some(digit), None) => Ok(digit),
        _ => Err(ResolveError::InvalidDigit(trimmed.to_string())),
    }
}
