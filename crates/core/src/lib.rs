pub mod error;
pub mod intent;
pub mod models;
pub mod routing;
pub mod rules;

pub use error::{ResolveError, RuleSetError};
pub use intent::{classify_utterance, detect_service, normalize_utterance};
pub use models::*;
pub use routing::{parse_digit, DigitRouter, Resolver};
pub use rules::{load_rule_set, IntentMapping, IntentRule, IntentRuleSet, KeywordMatcher};
