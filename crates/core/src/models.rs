use serde::{Deserialize, Serialize};

/// Digit reserved for the "repeat menu" pseudo-intent.
pub const MENU_DIGIT: char = '9';

/// Digit reported when an utterance matches nothing.
pub const UNKNOWN_DIGIT: char = '0';

pub const UNKNOWN_INTENT: &str = "unknown";

pub const DIGIT_CONFIDENCE: f32 = 1.0;
pub const RULE_MATCH_CONFIDENCE: f32 = 0.85;
pub const ACCOUNT_FALLBACK_CONFIDENCE: f32 = 0.7;
pub const NO_MATCH_CONFIDENCE: f32 = 0.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Service {
    #[serde(rename = "acs", alias = "account")]
    Account,
    #[serde(rename = "bap", alias = "agent")]
    Agent,
    #[serde(rename = "unknown")]
    Unknown,
}

impl Service {
    pub fn as_code(self) -> &'static str {
        match self {
            Self::Account => "acs",
            Self::Agent => "bap",
            Self::Unknown => "unknown",
        }
    }

    pub fn is_routable(self) -> bool {
        !matches!(self, Self::Unknown)
    }

    /// Keypad digits a routable service is allowed to own.
    pub fn owns_digit(self, digit: char) -> bool {
        match self {
            Self::Account => ('1'..='4').contains(&digit),
            Self::Agent => ('5'..='7').contains(&digit),
            Self::Unknown => false,
        }
    }
}

impl std::fmt::Display for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_code())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteDecision {
    pub service: Service,
    pub digit: char,
    pub intent: String,
    pub confidence: f32,
}

impl RouteDecision {
    pub fn unknown() -> Self {
        Self {
            service: Service::Unknown,
            digit: UNKNOWN_DIGIT,
            intent: UNKNOWN_INTENT.to_string(),
            confidence: NO_MATCH_CONFIDENCE,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.service == Service::Unknown
    }
}

/// Outcome of resolving one caller input.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Resolution {
    RepeatMenu,
    Route(RouteDecision),
}

/// Raw caller input. Exactly one of the two fields is expected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveInput {
    pub digit: Option<String>,
    pub utterance: Option<String>,
}

impl ResolveInput {
    pub fn digit(value: impl Into<String>) -> Self {
        Self {
            digit: Some(value.into()),
            utterance: None,
        }
    }

    pub fn utterance(value: impl Into<String>) -> Self {
        Self {
            digit: None,
            utterance: Some(value.into()),
        }
    }
}
