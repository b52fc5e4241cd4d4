use thiserror::Error;

use crate::models::Service;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("exactly one of digit or utterance must be supplied")]
    InvalidInput,
    #[error("invalid option selected: {0:?}")]
    InvalidDigit(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuleSetError {
    #[error("rule set is empty")]
    Empty,
    #[error("rule {name:?} has no keywords")]
    NoKeywords { name: String },
    #[error("rule {name:?} has an empty matcher")]
    EmptyMatcher { name: String },
    #[error("rule {name:?} targets the unknown service")]
    Unroutable { name: String },
    #[error("duplicate rule name {0:?}")]
    DuplicateName(String),
    #[error("digit {digit:?} is used by both {first:?} and {second:?}")]
    DuplicateDigit {
        digit: char,
        first: String,
        second: String,
    },
    #[error("digit {digit:?} of rule {name:?} is outside the {service} range")]
    DigitOutOfRange {
        name: String,
        digit: char,
        service: Service,
    },
    #[error("rule {name:?} uses the reserved menu digit")]
    ReservedDigit { name: String },
    #[error("service {0} has no fallback rule")]
    MissingFallback(Service),
    #[error("service {0} has more than one fallback rule")]
    DuplicateFallback(Service),
    #[error("fallback confidence {confidence} of rule {name:?} is outside [0, 1)")]
    ConfidenceOutOfRange { name: String, confidence: f32 },
    #[error("rule {name:?} yields to unknown rule {target:?}")]
    UnknownYieldTarget { name: String, target: String },
}
