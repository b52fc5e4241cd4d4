mod providers;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use ivr_core::{
    parse_digit, IntentMapping, Resolution, ResolveError, ResolveInput, Resolver, RouteDecision,
    Service,
};
use ivr_observability::AppMetrics;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, instrument, warn};

pub use providers::{
    not_understood_reply, AccountServices, AgentPlatform, ServiceProvider, MENU_TEXT,
    NOT_UNDERSTOOD_TEXT,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("missing sessionId")]
    MissingSession,
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error("no {service} provider answers digit {digit:?}")]
    ProviderMissing { service: Service, digit: char },
}

impl DispatchError {
    /// Whether the caller sent a malformed request, as opposed to a failure
    /// on our side.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::ProviderMissing { .. })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IvrRequest {
    pub session_id: String,
    pub digit: Option<String>,
    pub query: Option<String>,
}

impl IvrRequest {
    pub fn digit(session_id: impl Into<String>, digit: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            digit: Some(digit.into()),
            query: None,
        }
    }

    pub fn query(session_id: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            digit: None,
            query: Some(query.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IvrReply {
    pub session_id: String,
    pub response: String,
    pub resolution: Resolution,
}

impl IvrReply {
    pub fn decision(&self) -> Option<&RouteDecision> {
        match &self.resolution {
            Resolution::Route(decision) => Some(decision),
            Resolution::RepeatMenu => None,
        }
    }
}

#[derive(Clone)]
pub struct IvrDispatcher {
    resolver: Resolver,
    providers: HashMap<Service, Arc<dyn ServiceProvider>>,
    metrics: Arc<AppMetrics>,
}

impl IvrDispatcher {
    pub fn new(resolver: Resolver, metrics: Arc<AppMetrics>) -> Self {
        Self {
            resolver,
            providers: HashMap::new(),
            metrics,
        }
        .with_provider(Arc::new(AccountServices))
        .with_provider(Arc::new(AgentPlatform))
    }

    pub fn with_provider(mut self, provider: Arc<dyn ServiceProvider>) -> Self {
        self.providers.insert(provider.service(), provider);
        self
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    pub fn metrics(&self) -> &Arc<AppMetrics> {
        &self.metrics
    }

    #[instrument(skip(self, request), fields(session_id = %request.session_id))]
    pub fn handle(&self, request: IvrRequest) -> Result<IvrReply, DispatchError> {
        let started = Instant::now();
        self.metrics.inc_request();

        let result = self.dispatch(request);
        self.metrics.observe_latency(started.elapsed());

        match &result {
            Ok(reply) => match reply.decision() {
                Some(decision) => info!(
                    service = %decision.service,
                    provider = self.provider_name(decision.service).unwrap_or("none"),
                    digit = %decision.digit,
                    intent = %decision.intent,
                    confidence = decision.confidence,
                    "ivr request routed"
                ),
                None => info!("menu repeated"),
            },
            Err(err) if err.is_client_error() => {
                self.metrics.inc_rejected();
                warn!(error = %err, "ivr request rejected");
            }
            Err(err) => warn!(error = %err, "ivr request failed"),
        }

        result
    }

    /// Answers a digit straight from one provider, bypassing intent resolution.
    pub fn provider_reply(&self, service: Service, digit: &str) -> Result<String, DispatchError> {
        self.metrics.inc_request();

        let result = parse_digit(digit).and_then(|digit| {
            self.providers
                .get(&service)
                .and_then(|provider| provider.respond(digit))
                .map(ToString::to_string)
                .ok_or_else(|| ResolveError::InvalidDigit(digit.to_string()))
        });

        if let Err(err) = &result {
            self.metrics.inc_rejected();
            warn!(
                service = %service,
                provider = self.provider_name(service).unwrap_or("none"),
                error = %err,
                "provider request rejected"
            );
        }

        Ok(result?)
    }

    /// Name of the provider registered for `service`, if any.
    pub fn provider_name(&self, service: Service) -> Option<&'static str> {
        self.providers.get(&service).map(|provider| provider.name())
    }

    pub fn intent_mapping(&self) -> Vec<IntentMapping> {
        self.resolver.rules().mapping()
    }

    fn dispatch(&self, request: IvrRequest) -> Result<IvrReply, DispatchError> {
        let session_id = request.session_id.trim().to_string();
        if session_id.is_empty() {
            return Err(DispatchError::MissingSession);
        }

        match (&request.digit, &request.query) {
            (Some(_), None) => self.metrics.inc_digit_request(),
            (None, Some(_)) => self.metrics.inc_utterance_request(),
            _ => {}
        }

        let resolution = self.resolver.resolve(&ResolveInput {
            digit: request.digit,
            utterance: request.query,
        })?;

        let response = match &resolution {
            Resolution::RepeatMenu => {
                self.metrics.inc_menu_repeat();
                MENU_TEXT.to_string()
            }
            Resolution::Route(decision) if decision.is_unknown() => {
                self.metrics.inc_unknown_intent();
                not_understood_reply()
            }
            Resolution::Route(decision) => self.canned_reply(decision)?,
        };

        Ok(IvrReply {
            session_id,
            response,
            resolution,
        })
    }

    fn canned_reply(&self, decision: &RouteDecision) -> Result<String, DispatchError> {
        self.providers
            .get(&decision.service)
            .and_then(|provider| provider.respond(decision.digit))
            .map(ToString::to_string)
            .ok_or(DispatchError::ProviderMissing {
                service: decision.service,
                digit: decision.digit,
            })
    }
}
