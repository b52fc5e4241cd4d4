use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::RuleSetError;
use crate::models::{Service, MENU_DIGIT};

/// A conjunction of keywords with optional exclusions.
///
/// Matches when every `all_of` keyword occurs in the utterance and no
/// `none_of` keyword does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordMatcher {
    pub all_of: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub none_of: Vec<String>,
}

impl KeywordMatcher {
    pub fn keyword(keyword: &str) -> Self {
        Self {
            all_of: vec![keyword.to_string()],
            none_of: Vec::new(),
        }
    }

    pub fn all(keywords: &[&str]) -> Self {
        Self {
            all_of: words(keywords),
            none_of: Vec::new(),
        }
    }

    pub fn unless(mut self, excluded: &[&str]) -> Self {
        self.none_of.extend(words(excluded));
        self
    }

    pub fn matches(&self, text: &str) -> bool {
        self.all_of.iter().all(|needle| text.contains(needle.as_str()))
            && !self.none_of.iter().any(|needle| text.contains(needle.as_str()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentRule {
    pub name: String,
    pub service: Service,
    pub digit: char,
    /// Coarse-phase evidence for the rule's service.
    pub keywords: Vec<String>,
    /// Fine-phase matchers. When empty, each keyword matches on its own.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub matchers: Vec<KeywordMatcher>,
    /// Marks the catch-all rule of its service and the confidence it reports
    /// when nothing more specific matched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_confidence: Option<f32>,
    /// Rule that takes over when its keywords co-occur with a match of this one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub yields_to: Option<String>,
}

impl IntentRule {
    pub fn new(name: &str, service: Service, digit: char, keywords: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            service,
            digit,
            keywords: words(keywords),
            matchers: Vec::new(),
            fallback_confidence: None,
            yields_to: None,
        }
    }

    pub fn with_matchers(mut self, matchers: Vec<KeywordMatcher>) -> Self {
        self.matchers = matchers;
        self
    }

    pub fn with_fallback(mut self, confidence: f32) -> Self {
        self.fallback_confidence = Some(confidence);
        self
    }

    pub fn yielding_to(mut self, rule: &str) -> Self {
        self.yields_to = Some(rule.to_string());
        self
    }

    pub fn has_evidence(&self, text: &str) -> bool {
        self.keywords.iter().any(|needle| text.contains(needle.as_str()))
    }

    pub fn matches(&self, text: &str) -> bool {
        if self.matchers.is_empty() {
            self.has_evidence(text)
        } else {
            self.matchers.iter().any(|matcher| matcher.matches(text))
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.fallback_confidence.is_some()
    }

    fn normalize(&mut self) {
        self.name = self.name.trim().to_string();
        self.keywords = normalize_words(&self.keywords);
        for matcher in &mut self.matchers {
            matcher.all_of = normalize_words(&matcher.all_of);
            matcher.none_of = normalize_words(&matcher.none_of);
        }
        if let Some(target) = self.yields_to.as_mut() {
            *target = target.trim().to_string();
        }
    }
}

/// Mapping row for menus and diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntentMapping {
    pub intent: String,
    pub digit: char,
    pub service: Service,
}

#[derive(Debug, Deserialize)]
struct RuleSetDocument {
    rules: Vec<IntentRule>,
}

/// The authoritative, validated, read-only list of intent rules.
///
/// Rules of one service are listed in fine-phase priority order; services are
/// scanned in the order they first appear.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntentRuleSet {
    rules: Vec<IntentRule>,
}

impl IntentRuleSet {
    pub fn new(mut rules: Vec<IntentRule>) -> Result<Self, RuleSetError> {
        for rule in &mut rules {
            rule.normalize();
        }
        validate(&rules)?;
        Ok(Self { rules })
    }

    /// The banking IVR rule table: account services on digits 1-4, the agent
    /// platform on digits 5-7.
    pub fn standard() -> Self {
        Self {
            rules: standard_rules(),
        }
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let document: RuleSetDocument =
            serde_json::from_str(raw).context("invalid intent rule set document")?;
        Ok(Self::new(document.rules)?)
    }

    pub fn rules(&self) -> &[IntentRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn rule(&self, name: &str) -> Option<&IntentRule> {
        self.rules.iter().find(|rule| rule.name == name)
    }

    pub fn rule_for_digit(&self, digit: char) -> Option<&IntentRule> {
        self.rules.iter().find(|rule| rule.digit == digit)
    }

    /// Services in coarse-phase scan order.
    pub fn services(&self) -> Vec<Service> {
        let mut order = Vec::new();
        for rule in &self.rules {
            if !order.contains(&rule.service) {
                order.push(rule.service);
            }
        }
        order
    }

    pub fn rules_for(&self, service: Service) -> impl Iterator<Item = &IntentRule> {
        self.rules.iter().filter(move |rule| rule.service == service)
    }

    pub fn fallback_for(&self, service: Service) -> Option<&IntentRule> {
        self.rules_for(service).find(|rule| rule.is_fallback())
    }

    pub fn mapping(&self) -> Vec<IntentMapping> {
        let mut rows = self
            .rules
            .iter()
            .map(|rule| IntentMapping {
                intent: rule.name.clone(),
                digit: rule.digit,
                service: rule.service,
            })
            .collect::<Vec<_>>();
        rows.sort_by_key(|row| row.digit);
        rows
    }
}

impl Default for IntentRuleSet {
    fn default() -> Self {
        Self::standard()
    }
}

pub fn load_rule_set(path: impl AsRef<Path>) -> Result<IntentRuleSet> {
    let raw = fs::read_to_string(path.as_ref()).with_context(|| {
        format!(
            "failed reading intent rule set at {}",
            path.as_ref().display()
        )
    })?;

    IntentRuleSet::from_json_str(&raw)
        .with_context(|| format!("invalid intent rule set at {}", path.as_ref().display()))
}

fn standard_rules() -> Vec<IntentRule> {
    use crate::models::{ACCOUNT_FALLBACK_CONFIDENCE, RULE_MATCH_CONFIDENCE};

    vec![
        IntentRule::new(
            "recharge_account",
            Service::Account,
            '2',
            &["recharge", "topup", "top up", "reload", "add"],
        )
        .with_matchers(vec![
            KeywordMatcher::keyword("recharge"),
            KeywordMatcher::keyword("topup"),
            KeywordMatcher::keyword("top up"),
            KeywordMatcher::keyword("reload"),
            KeywordMatcher::all(&["add", "money"]),
        ]),
        IntentRule::new(
            "last_transaction",
            Service::Account,
            '3',
            &["last", "transaction", "recent", "history", "previous", "latest"],
        )
        .yielding_to("cancel_action"),
        IntentRule::new(
            "loan_info",
            Service::Account,
            '4',
            &["loan", "credit", "borrow", "advance", "emi", "installment"],
        ),
        IntentRule::new(
            "balance_inquiry",
            Service::Account,
            '1',
            &["balance", "check", "account", "money", "show", "much"],
        )
        .with_matchers(vec![
            KeywordMatcher::keyword("balance"),
            KeywordMatcher::keyword("check").unless(&["recharge"]),
            KeywordMatcher::keyword("show"),
            KeywordMatcher::keyword("much"),
            KeywordMatcher::keyword("account").unless(&["recharge", "edit", "update"]),
        ])
        .with_fallback(ACCOUNT_FALLBACK_CONFIDENCE),
        IntentRule::new(
            "cancel_action",
            Service::Agent,
            '7',
            &["cancel", "stop", "quit", "exit", "abort", "terminate"],
        ),
        IntentRule::new(
            "update_details",
            Service::Agent,
            '6',
            &["update", "change", "modify", "edit", "details", "profile"],
        ),
        IntentRule::new(
            "agent_support",
            Service::Agent,
            '5',
            &[
                "agent", "support", "help", "human", "customer", "talk", "speak", "connect",
            ],
        )
        .with_fallback(RULE_MATCH_CONFIDENCE),
    ]
}

fn validate(rules: &[IntentRule]) -> Result<(), RuleSetError> {
    if rules.is_empty() {
        return Err(RuleSetError::Empty);
    }

    let mut names: HashSet<&str> = HashSet::new();
    let mut digits: HashMap<char, &str> = HashMap::new();
    let mut fallbacks: HashMap<Service, usize> = HashMap::new();

    for rule in rules {
        if !names.insert(rule.name.as_str()) {
            return Err(RuleSetError::DuplicateName(rule.name.clone()));
        }
        if rule.keywords.is_empty() {
            return Err(RuleSetError::NoKeywords {
                name: rule.name.clone(),
            });
        }
        if rule.matchers.iter().any(|matcher| matcher.all_of.is_empty()) {
            return Err(RuleSetError::EmptyMatcher {
                name: rule.name.clone(),
            });
        }
        if !rule.service.is_routable() {
            return Err(RuleSetError::Unroutable {
                name: rule.name.clone(),
            });
        }
        if rule.digit == MENU_DIGIT {
            return Err(RuleSetError::ReservedDigit {
                name: rule.name.clone(),
            });
        }
        if !rule.service.owns_digit(rule.digit) {
            return Err(RuleSetError::DigitOutOfRange {
                name: rule.name.clone(),
                digit: rule.digit,
                service: rule.service,
            });
        }
        if let Some(first) = digits.insert(rule.digit, rule.name.as_str()) {
            return Err(RuleSetError::DuplicateDigit {
                digit: rule.digit,
                first: first.to_string(),
                second: rule.name.clone(),
            });
        }
        if let Some(confidence) = rule.fallback_confidence {
            if !(0.0..1.0).contains(&confidence) {
                return Err(RuleSetError::ConfidenceOutOfRange {
                    name: rule.name.clone(),
                    confidence,
                });
            }
            *fallbacks.entry(rule.service).or_default() += 1;
        }
    }

    for rule in rules {
        if let Some(target) = rule.yields_to.as_deref() {
            if !names.contains(target) {
                return Err(RuleSetError::UnknownYieldTarget {
                    name: rule.name.clone(),
                    target: target.to_string(),
                });
            }
        }
    }

    for rule in rules {
        match fallbacks.get(&rule.service).copied().unwrap_or(0) {
            0 => return Err(RuleSetError::MissingFallback(rule.service)),
            1 => {}
            _ => return Err(RuleSetError::DuplicateFallback(rule.service)),
        }
    }

    Ok(())
}

fn words(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

fn normalize_words(values: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(values.len());
    for value in values {
        let value = value.trim().to_lowercase();
        if !value.is_empty() && !out.contains(&value) {
            out.push(value);
        }
    }
    out
}
