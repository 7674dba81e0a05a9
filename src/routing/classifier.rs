//! Intent classifier: asks the LLM which of the seven routes fits.
//!
//! The route criteria live in the system prompt; nothing here string-matches
//! intent. Unusable model output is folded into a `clarify` judgment so a
//! bad answer never fails the request. Only a failed call does.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::LlmError;
use crate::llm::provider::{ChatMessage, CompletionRequest, LlmProvider};
use crate::routing::types::{
    Confidence, InboundMessage, IntentJudgment, MatchConfidence, ResolvedEntities, Route,
};

/// Max tokens for the classification call.
const CLASSIFY_MAX_TOKENS: u32 = 1500;

/// Temperature for classification (deterministic-ish).
const CLASSIFY_TEMPERATURE: f32 = 0.1;

/// Body characters sent to the model.
const BODY_PREVIEW_CHARS: usize = 4000;

/// Active jobs listed in the prompt.
const MAX_ACTIVE_JOBS: usize = 20;

/// Classifies message intent via an `LlmProvider`.
pub struct IntentClassifier {
    llm: Arc<dyn LlmProvider>,
    internal_domains: Vec<String>,
}

impl IntentClassifier {
    /// `internal_domains` are the agency's own email domains; any other
    /// recipient is marked external in the prompt.
    pub fn new(llm: Arc<dyn LlmProvider>, internal_domains: Vec<String>) -> Self {
        Self {
            llm,
            internal_domains: internal_domains
                .into_iter()
                .map(|d| d.trim().to_lowercase())
                .filter(|d| !d.is_empty())
                .collect(),
        }
    }

    /// Judge the message's route.
    ///
    /// Errors only when the inference call itself fails.
    pub async fn classify(
        &self,
        message: &InboundMessage,
        resolved: &ResolvedEntities,
    ) -> Result<IntentJudgment, LlmError> {
        let request = CompletionRequest::new(vec![
            ChatMessage::system(build_classify_system_prompt()),
            ChatMessage::user(build_classify_user_prompt(
                message,
                resolved,
                &self.internal_domains,
            )),
        ])
        .with_temperature(CLASSIFY_TEMPERATURE)
        .with_max_tokens(CLASSIFY_MAX_TOKENS);

        let response = self.llm.complete(request).await?;
        info!(
            model = self.llm.model_name(),
            input_tokens = response.input_tokens,
            output_tokens = response.output_tokens,
            cost_usd = %response.cost(self.llm.cost_per_token()),
            "Classification call complete"
        );

        let judgment = parse_judgment(&response.content);
        if judgment.malformed {
            warn!(
                raw_response = %response.content.chars().take(500).collect::<String>(),
                "Malformed classification response, falling back to clarify"
            );
        } else {
            debug!(
                route = %judgment.route,
                confidence = %judgment.model_confidence,
                "Classified message"
            );
        }
        Ok(judgment)
    }
}

/// True when `email` belongs to one of `internal_domains` (or a subdomain).
pub fn is_internal_address(email: &str, internal_domains: &[String]) -> bool {
    let Some((_, domain)) = email.trim().rsplit_once('@') else {
        return false;
    };
    let domain = domain.to_lowercase();
    internal_domains
        .iter()
        .any(|d| domain == *d || domain.ends_with(&format!(".{d}")))
}

// ── Prompt construction ─────────────────────────────────────────────

fn build_classify_system_prompt() -> String {
    "You are the traffic manager for a creative agency. Route each inbound email or Teams \
     message to exactly one workflow.\n\n\
     Routes:\n\
     - \"triage\": no existing job number resolves and the message describes a new \
       engagement, brief or request.\n\
     - \"update\": the message relates to an existing job and reports status or progress. \
       Not a deliverable, not a finance artifact.\n\
     - \"wip\": an explicit work-in-progress report, usually with attachments, \
       internal-facing.\n\
     - \"tracker\": finance or billing report language: hours, timesheets, invoices, \
       budgets, estimates.\n\
     - \"work-to-client\": the message sends or announces a deliverable to an external \
       (non-agency) recipient.\n\
     - \"feedback\": a reply carrying the client's reactions, approval or requested \
       changes.\n\
     - \"clarify\": not enough information to choose, or the signals contradict each \
       other (e.g. a job number is present but it is unclear whether this is an update \
       or a WIP).\n\n\
     Use the resolved job and client details as evidence: an update is more likely when \
     the job number already resolves to an existing job. Recipients are marked internal \
     or external.\n\n\
     Respond with ONLY a JSON object:\n\
     {\"route\": \"...\", \"intent\": \"...\", \"confidence\": \"high|medium|low\", \
     \"rationale\": \"...\"}\n\n\
     Rules:\n\
     - \"intent\" is one short sentence describing what the sender wants\n\
     - \"rationale\" is one or two sentences explaining the route\n\
     - Use \"high\" confidence only when the route is unambiguous\n\
     - When in doubt between two routes, choose \"clarify\""
        .to_string()
}

fn build_classify_user_prompt(
    message: &InboundMessage,
    resolved: &ResolvedEntities,
    internal_domains: &[String],
) -> String {
    let mut prompt = String::with_capacity(1024);

    prompt.push_str(&format!("Source: {}\n", message.source.as_str()));
    prompt.push_str(&format!("Subject: {}\n", message.subject));
    prompt.push_str("From: ");
    if let Some(ref name) = message.sender_name {
        prompt.push_str(&format!("{} ", name));
    }
    prompt.push_str(&format!("<{}>\n", message.sender_email));

    if message.recipients.is_empty() {
        prompt.push_str("Recipients: (none)\n");
    } else {
        let recipients = message
            .recipients
            .iter()
            .map(|r| {
                let side = if is_internal_address(r, internal_domains) {
                    "internal"
                } else {
                    "external"
                };
                format!("{r} ({side})")
            })
            .collect::<Vec<_>>()
            .join(", ");
        prompt.push_str(&format!("Recipients: {}\n", recipients));
    }

    let attachments = message.attachments();
    prompt.push_str(&format!("Has Attachments: {}\n", !attachments.is_empty()));
    if !attachments.is_empty() {
        prompt.push_str(&format!("Attachment Names: {}\n", attachments.join(", ")));
    }

    prompt.push_str("\nResolved entities:\n");
    let match_label = match resolved.match_confidence {
        MatchConfidence::Exact => "exact (job found in system)",
        MatchConfidence::Fuzzy => "fuzzy (client known, job not verified)",
        MatchConfidence::None => "none (no known job or client)",
    };
    prompt.push_str(&format!("  Match: {}\n", match_label));
    if let Some(ref job) = resolved.job_number {
        prompt.push_str(&format!("  Job number: {}\n", job));
    }
    if let Some(ref project) = resolved.project {
        prompt.push_str(&format!(
            "  Job: {} (stage: {}, status: {}, with client: {})\n",
            project.job_name,
            if project.stage.is_empty() { "unknown" } else { project.stage.as_str() },
            if project.status.is_empty() { "unknown" } else { project.status.as_str() },
            if project.with_client { "yes" } else { "no" },
        ));
    }
    match (&resolved.client_code, &resolved.client_name) {
        (Some(code), Some(name)) => prompt.push_str(&format!("  Client: {} ({})\n", name, code)),
        (Some(code), None) => prompt.push_str(&format!("  Client code: {} (unverified)\n", code)),
        _ => {}
    }
    if resolved.lookup_unavailable {
        prompt.push_str("  Note: the job system could not be reached; nothing was verified.\n");
    }

    if !resolved.active_jobs.is_empty() {
        prompt.push_str("\nActive jobs for this client:\n");
        for job in resolved.active_jobs.iter().take(MAX_ACTIVE_JOBS) {
            prompt.push_str(&format!("- {} - {}", job.job_number, job.job_name));
            if !job.description.is_empty() {
                prompt.push_str(&format!(": {}", job.description));
            }
            prompt.push('\n');
        }
    }

    let body_preview: String = message.body.chars().take(BODY_PREVIEW_CHARS).collect();
    prompt.push_str(&format!("\nMessage content:\n{}", body_preview));

    prompt
}

// ── Response parsing ────────────────────────────────────────────────

/// LLM classification response structure.
#[derive(Debug, serde::Deserialize)]
struct ClassifyResponse {
    #[serde(default)]
    route: String,
    #[serde(default, alias = "intentSummary", alias = "summary")]
    intent: String,
    #[serde(default)]
    confidence: Option<String>,
    #[serde(default, alias = "reason")]
    rationale: String,
}

/// Parse the model's answer. Never fails: unusable output becomes a
/// low-confidence `clarify` judgment with `malformed` set.
fn parse_judgment(raw: &str) -> IntentJudgment {
    let json_str = extract_json_object(raw);
    let response: ClassifyResponse = match serde_json::from_str(json_str) {
        Ok(response) => response,
        Err(e) => return malformed_judgment(&format!("response was not valid JSON ({e})")),
    };

    let Some(route) = Route::parse_lenient(&response.route) else {
        return malformed_judgment(&format!("unknown route '{}'", response.route));
    };

    let model_confidence = match response.confidence.as_deref() {
        None => Confidence::Low,
        Some(raw) => match Confidence::parse_lenient(raw) {
            Some(confidence) => confidence,
            None => return malformed_judgment(&format!("unknown confidence '{raw}'")),
        },
    };

    IntentJudgment {
        route,
        intent_summary: if response.intent.trim().is_empty() {
            "Intent not stated".into()
        } else {
            response.intent.trim().to_string()
        },
        model_confidence,
        rationale: if response.rationale.trim().is_empty() {
            format!("Classified as {route}.")
        } else {
            response.rationale.trim().to_string()
        },
        malformed: false,
    }
}

fn malformed_judgment(detail: &str) -> IntentJudgment {
    IntentJudgment {
        route: Route::Clarify,
        intent_summary: "Could not determine intent".into(),
        model_confidence: Confidence::Low,
        rationale: format!("The classifier returned a malformed response: {detail}."),
        malformed: true,
    }
}

/// The JSON object in the model's answer: bare, inside a markdown fence, or
/// embedded in prose. Anything else comes back trimmed for serde to reject.
fn extract_json_object(text: &str) -> &str {
    let trimmed = text.trim();

    // Already a JSON object
    if trimmed.starts_with('{') {
        return trimmed;
    }

    // Wrapped in a ```json or bare ``` fence
    for fence in ["```json", "```"] {
        if let Some(inner) = trimmed
            .split_once(fence)
            .and_then(|(_, after)| after.split_once("```"))
            .map(|(inner, _)| inner.trim())
            && inner.starts_with('{')
        {
            return inner;
        }
    }

    // Outermost braces inside surrounding text
    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if end > start => &trimmed[start..=end],
        _ => trimmed,
    }
}
