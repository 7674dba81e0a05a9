//! The traffic router: extract → resolve → classify → combine.
//!
//! One `decide` call per inbound message. The router holds only read-only
//! configuration and shared clients, so a single instance serves every
//! request concurrently.

use std::str::FromStr;
use std::sync::Arc;

use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::config::TrafficConfig;
use crate::error::{self, RoutingError};
use crate::llm::{LlmProvider, create_provider};
use crate::lookup::{AirtableLookup, LookupClient};
use crate::routing::clarify::with_clarify_email;
use crate::routing::classifier::IntentClassifier;
use crate::routing::combiner::combine;
use crate::routing::extractor::EntityExtractor;
use crate::routing::resolver::Resolver;
use crate::routing::types::{InboundMessage, ResolvedEntities, RoutingDecision};
use crate::routing::vocabulary::ClientVocabulary;

/// What to do when the record store cannot be reached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LookupFailurePolicy {
    /// Carry on with unresolved entities and say so in the reason.
    #[default]
    Degrade,
    /// Fail the request with `LookupUnavailable`.
    Fail,
}

impl LookupFailurePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Degrade => "degrade",
            Self::Fail => "fail",
        }
    }
}

impl FromStr for LookupFailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "degrade" => Ok(Self::Degrade),
            "fail" => Ok(Self::Fail),
            other => Err(format!("expected 'degrade' or 'fail', got '{other}'")),
        }
    }
}

/// Routes inbound messages to workflows.
pub struct TrafficRouter {
    extractor: EntityExtractor,
    resolver: Resolver,
    classifier: IntentClassifier,
    lookup_policy: LookupFailurePolicy,
}

impl TrafficRouter {
    pub fn new(
        vocabulary: ClientVocabulary,
        lookup: Arc<dyn LookupClient>,
        llm: Arc<dyn LlmProvider>,
        internal_domains: Vec<String>,
    ) -> Self {
        Self {
            extractor: EntityExtractor::new(vocabulary),
            resolver: Resolver::new(lookup),
            classifier: IntentClassifier::new(llm, internal_domains),
            lookup_policy: LookupFailurePolicy::default(),
        }
    }

    /// Production router: Anthropic for inference, Airtable for lookups,
    /// the agency's client vocabulary.
    pub fn from_config(config: &TrafficConfig) -> error::Result<Self> {
        let llm = create_provider(&config.llm)?;
        let lookup = Arc::new(AirtableLookup::new(config.airtable.clone())?);
        Ok(Self::new(
            ClientVocabulary::agency_defaults(),
            lookup,
            llm,
            config.internal_domains.clone(),
        )
        .with_lookup_policy(config.lookup_policy))
    }

    pub fn with_lookup_policy(mut self, policy: LookupFailurePolicy) -> Self {
        self.lookup_policy = policy;
        self
    }

    /// Decide the route for one message under a fresh request id.
    pub async fn decide(&self, message: &InboundMessage) -> Result<RoutingDecision, RoutingError> {
        self.decide_with_id(message, Uuid::new_v4()).await
    }

    /// Decide the route for one message, logging under `request_id`.
    pub async fn decide_with_id(
        &self,
        message: &InboundMessage,
        request_id: Uuid,
    ) -> Result<RoutingDecision, RoutingError> {
        let span = info_span!("decide", %request_id, source = message.source.as_str());
        self.run(message).instrument(span).await
    }

    async fn run(&self, message: &InboundMessage) -> Result<RoutingDecision, RoutingError> {
        if message.is_blank() {
            return Err(RoutingError::MalformedInput(
                "subject and message content are both empty".into(),
            ));
        }

        let candidates = self.extractor.extract(message);
        let hints = self.extractor.client_hints(message);

        let resolved = match self.resolver.resolve(&candidates, &hints).await {
            Ok(resolved) => resolved,
            Err(e) => match self.lookup_policy {
                LookupFailurePolicy::Fail => {
                    warn!(error = %e, "Lookup unavailable, failing request");
                    return Err(RoutingError::LookupUnavailable(e));
                }
                LookupFailurePolicy::Degrade => {
                    warn!(error = %e, "Lookup unavailable, continuing with unresolved entities");
                    ResolvedEntities {
                        lookup_unavailable: true,
                        ..ResolvedEntities::unresolved(&candidates)
                    }
                }
            },
        };
        debug!(
            job_number = ?resolved.job_number,
            client_code = ?resolved.client_code,
            match_confidence = ?resolved.match_confidence,
            "Entities resolved"
        );

        let judgment = self
            .classifier
            .classify(message, &resolved)
            .await
            .map_err(|e| {
                warn!(error = %e, "Inference unavailable");
                RoutingError::InferenceUnavailable(e)
            })?;

        let decision = with_clarify_email(
            combine(&resolved, &judgment),
            message,
            resolved.match_confidence,
        );

        info!(
            route = %decision.route,
            confidence = %decision.confidence,
            job_number = decision.job_number.as_deref().unwrap_or("-"),
            client_code = decision.client_code.as_deref().unwrap_or("-"),
            suggested_route = %judgment.route,
            "Routing decision"
        );
        Ok(decision)
    }
}
