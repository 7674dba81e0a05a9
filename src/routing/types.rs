//! Shared types for the routing pipeline.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::lookup::{JobSummary, ProjectRecord};

// ── Inbound message ─────────────────────────────────────────────────

/// Where a message arrived from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    #[default]
    Email,
    Teams,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Teams => "teams",
        }
    }
}

/// An email or Teams message to be routed.
///
/// Built once per request by the transport and consumed by `decide`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundMessage {
    /// Email body or Teams message text.
    pub body: String,
    /// Email subject or Teams channel name.
    pub subject: String,
    pub sender_email: String,
    pub sender_name: Option<String>,
    /// TO and CC addresses, in the order received.
    pub recipients: Vec<String>,
    pub has_attachments: bool,
    /// Empty whenever `has_attachments` is false.
    pub attachment_names: Vec<String>,
    pub source: Source,
}

impl InboundMessage {
    /// Minimal email with just a subject and body.
    pub fn email(subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            subject: subject.into(),
            sender_email: String::new(),
            sender_name: None,
            recipients: Vec::new(),
            has_attachments: false,
            attachment_names: Vec::new(),
            source: Source::Email,
        }
    }

    pub fn with_sender(mut self, email: impl Into<String>, name: Option<&str>) -> Self {
        self.sender_email = email.into();
        self.sender_name = name.map(String::from);
        self
    }

    pub fn with_recipients(mut self, recipients: Vec<String>) -> Self {
        self.recipients = recipients;
        self
    }

    pub fn with_attachments(mut self, names: Vec<String>) -> Self {
        self.has_attachments = !names.is_empty();
        self.attachment_names = names;
        self
    }

    pub fn with_source(mut self, source: Source) -> Self {
        self.source = source;
        self
    }

    /// True when neither subject nor body carries any text.
    pub fn is_blank(&self) -> bool {
        self.subject.trim().is_empty() && self.body.trim().is_empty()
    }

    /// Attachment names, honouring `has_attachments`.
    pub fn attachments(&self) -> &[String] {
        if self.has_attachments {
            self.attachment_names.as_slice()
        } else {
            &[]
        }
    }
}

// ── Routes and confidence ───────────────────────────────────────────

/// Workflow route a message is dispatched to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Route {
    /// New engagement or request with no existing job.
    Triage,
    /// Status/progress on an existing job.
    Update,
    /// Work-in-progress report.
    Wip,
    /// Finance and billing report.
    Tracker,
    /// Deliverable going to an external recipient.
    WorkToClient,
    /// Client reactions, approvals or change requests.
    Feedback,
    /// Not enough information, or contradictory signals.
    Clarify,
}

impl Route {
    pub const ALL: [Route; 7] = [
        Route::Triage,
        Route::Update,
        Route::Wip,
        Route::Tracker,
        Route::WorkToClient,
        Route::Feedback,
        Route::Clarify,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Triage => "triage",
            Self::Update => "update",
            Self::Wip => "wip",
            Self::Tracker => "tracker",
            Self::WorkToClient => "work-to-client",
            Self::Feedback => "feedback",
            Self::Clarify => "clarify",
        }
    }

    /// Routes that only make sense against an existing job.
    pub fn requires_job_number(&self) -> bool {
        matches!(
            self,
            Self::Update | Self::Wip | Self::Tracker | Self::WorkToClient | Self::Feedback
        )
    }

    /// Parse a route name, tolerating case, `_` and spaces ("Work_To_Client").
    pub fn parse_lenient(raw: &str) -> Option<Self> {
        let normalized = raw
            .trim()
            .to_lowercase()
            .replace(['_', ' '], "-");
        Self::ALL
            .into_iter()
            .find(|route| route.as_str() == normalized)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse certainty grade. Ordered `Low < Medium < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    pub fn parse_lenient(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "high" => Some(Self::High),
            "medium" | "med" => Some(Self::Medium),
            "low" => Some(Self::Low),
            _ => None,
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How well extracted entities matched the record store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchConfidence {
    /// A job number matched a job record.
    Exact,
    /// Only a client code matched a client record.
    Fuzzy,
    /// Nothing matched (or the store was not consulted).
    None,
}

impl MatchConfidence {
    /// Highest decision confidence this match quality can support.
    pub fn ceiling(&self) -> Confidence {
        match self {
            Self::Exact => Confidence::High,
            Self::Fuzzy => Confidence::Medium,
            Self::None => Confidence::Low,
        }
    }
}

// ── Extraction ──────────────────────────────────────────────────────

/// Where in the message a candidate was found. Ordered most specific first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Provenance {
    Subject,
    Body,
    AttachmentName,
    SenderDomain,
}

/// Whether a candidate matched the strict pattern or a loose one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CandidateStrength {
    Exact,
    Fuzzy,
}

/// A proposed job number and/or client code found in a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityCandidate {
    /// Normalized `CODE NNN`.
    pub job_number: Option<String>,
    pub client_code: Option<String>,
    pub provenance: Provenance,
    pub strength: CandidateStrength,
}

/// A client code the message suggests without naming a job: a known code or
/// alias in the text, or the sender's email domain. Only used to find the
/// client when no job number resolves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientHint {
    pub client_code: String,
    pub provenance: Provenance,
}

// ── Resolution ──────────────────────────────────────────────────────

/// Entities after checking candidates against the record store.
///
/// `client_name` is only set when `client_code` matched a known record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedEntities {
    pub job_number: Option<String>,
    pub client_code: Option<String>,
    pub client_name: Option<String>,
    pub match_confidence: MatchConfidence,
    /// The matched job record, for exact matches.
    pub project: Option<ProjectRecord>,
    /// The client's active jobs, as classifier context.
    pub active_jobs: Vec<JobSummary>,
    /// Set when the store could not be reached and resolution was skipped.
    pub lookup_unavailable: bool,
}

impl ResolvedEntities {
    /// Raw first job number and client code, with nothing verified.
    pub fn unresolved(candidates: &[EntityCandidate]) -> Self {
        Self {
            job_number: candidates.iter().find_map(|c| c.job_number.clone()),
            client_code: candidates.iter().find_map(|c| c.client_code.clone()),
            client_name: None,
            match_confidence: MatchConfidence::None,
            project: None,
            active_jobs: Vec::new(),
            lookup_unavailable: false,
        }
    }
}

// ── Classification ──────────────────────────────────────────────────

/// The classifier's view of what the message is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentJudgment {
    pub route: Route,
    pub intent_summary: String,
    pub model_confidence: Confidence,
    pub rationale: String,
    /// The upstream answer was unusable and this is the `clarify` fallback.
    #[serde(default)]
    pub malformed: bool,
}

// ── Decision ────────────────────────────────────────────────────────

/// Final routing decision returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingDecision {
    pub route: Route,
    pub confidence: Confidence,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,
    pub intent: String,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<ProjectRecord>,
    /// Draft asking the sender for the missing details (clarify only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clarify_email: Option<String>,
}
