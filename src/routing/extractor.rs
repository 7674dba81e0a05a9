//! Entity extraction: job numbers and client codes from message text.
//!
//! Pure pattern matching, no lookups. `extract` returns job-number
//! candidates only, from the subject, then body, then attachment names
//! (exact before fuzzy within each). Client codes named without a job
//! number, and the client implied by the sender's domain, come out of
//! `client_hints` instead.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::routing::types::{
    CandidateStrength, ClientHint, EntityCandidate, InboundMessage, Provenance,
};
use crate::routing::vocabulary::ClientVocabulary;

/// 2–5 letters, an optional separator, 2–4 digits, on word boundaries.
static JOB_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b([a-z]{2,5})(\s*|\s*[-_]\s*)(\d{2,4})\b")
        .expect("job number pattern is valid")
});

/// Standalone uppercase token that might be a client code.
static CODE_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([A-Z]{2,5})\b").expect("code token pattern is valid"));

/// Uppercase words that look like a code before a number but never are.
const NOT_CLIENT_CODES: &[&str] = &[
    "AT", "ON", "IN", "BY", "TO", "OF", "OR", "FOR", "FROM", "THE", "AND", "NO", "NR", "NUM",
    "REF", "PAGE", "PG", "ROUND", "ROOM", "UNIT", "LEVEL", "PM", "AM", "HRS", "HR", "MIN",
    "MINS", "DAY", "DAYS", "WEEK", "WK", "YEAR", "FY", "QTR", "JAN", "FEB", "MAR", "APR", "MAY",
    "JUNE", "JUN", "JULY", "JUL", "AUG", "SEP", "SEPT", "OCT", "NOV", "DEC", "COVID", "ISO",
    "USD", "NZD", "AUD", "GST", "EUR", "GBP", "RE", "FW", "FWD", "VER", "REV", "TEL", "PH",
    "MB", "GB", "KB", "WIP", "DRAFT", "FINAL", "COPY", "PDF", "DOC", "DOCX", "PPT", "PPTX",
    "XLS", "XLSX", "CSV", "TXT", "JPG", "JPEG", "PNG", "GIF", "MP", "MOV", "ZIP", "IMG", "DSC",
];

/// Pulls job-number candidates and client hints out of a message.
#[derive(Debug, Clone)]
pub struct EntityExtractor {
    vocabulary: ClientVocabulary,
}

impl EntityExtractor {
    pub fn new(vocabulary: ClientVocabulary) -> Self {
        Self { vocabulary }
    }

    /// Job-number candidates, most specific first. Never fails; a message
    /// with no job-number-like token gives an empty list.
    pub fn extract(&self, message: &InboundMessage) -> Vec<EntityCandidate> {
        let attachments = attachment_text(message);
        let sources = [
            (Provenance::Subject, message.subject.as_str()),
            (Provenance::Body, message.body.as_str()),
            (Provenance::AttachmentName, attachments.as_str()),
        ];

        let mut candidates: Vec<EntityCandidate> = Vec::new();

        for (provenance, text) in sources {
            let mut found = self.job_numbers_in(text, provenance);
            // Stable: keeps text order within each strength.
            found.sort_by_key(|c| c.strength);
            for candidate in found {
                let duplicate = candidates.iter().any(|c| c.job_number == candidate.job_number);
                if !duplicate {
                    candidates.push(candidate);
                }
            }
        }

        debug!(count = candidates.len(), "Extracted job number candidates");
        candidates
    }

    /// Known client codes the message points at without a job number:
    /// codes and aliases in the subject, body and attachment names, then
    /// the sender's domain. Each code appears once.
    pub fn client_hints(&self, message: &InboundMessage) -> Vec<ClientHint> {
        let attachments = attachment_text(message);
        let sources = [
            (Provenance::Subject, message.subject.as_str()),
            (Provenance::Body, message.body.as_str()),
            (Provenance::AttachmentName, attachments.as_str()),
        ];

        let mut hints: Vec<ClientHint> = Vec::new();
        let mut push = |client_code: String, provenance: Provenance| {
            if !hints.iter().any(|h| h.client_code == client_code) {
                hints.push(ClientHint {
                    client_code,
                    provenance,
                });
            }
        };

        for (provenance, text) in sources {
            for code in self.client_codes_in(text) {
                push(code, provenance);
            }
        }
        if let Some(code) = self.vocabulary.code_for_sender(&message.sender_email) {
            push(code.to_string(), Provenance::SenderDomain);
        }

        debug!(count = hints.len(), "Extracted client hints");
        hints
    }

    fn job_numbers_in(&self, text: &str, provenance: Provenance) -> Vec<EntityCandidate> {
        let mut found = Vec::new();
        for caps in JOB_NUMBER.captures_iter(text) {
            let raw_code = &caps[1];
            let separator = &caps[2];
            let digits = &caps[3];
            let code = raw_code.to_uppercase();
            let known = self.vocabulary.is_known_code(&code);

            if !known {
                // File names carry too many version and date tokens.
                if provenance == Provenance::AttachmentName {
                    continue;
                }
                // Unknown codes must be written in capitals and not be a
                // common word ("at 10", "PAGE 12").
                let shouted = raw_code.chars().all(|c| c.is_ascii_uppercase());
                if !shouted || NOT_CLIENT_CODES.contains(&code.as_str()) {
                    continue;
                }
            }

            let strength = if known && separator == " " {
                CandidateStrength::Exact
            } else {
                CandidateStrength::Fuzzy
            };
            found.push(EntityCandidate {
                job_number: Some(format!("{code} {digits}")),
                client_code: Some(code),
                provenance,
                strength,
            });
        }
        found
    }

    fn client_codes_in(&self, text: &str) -> Vec<String> {
        let mut codes: Vec<String> = CODE_TOKEN
            .captures_iter(text)
            .map(|caps| caps[1].to_string())
            .filter(|code| self.vocabulary.is_known_code(code))
            .collect();
        for code in self.vocabulary.codes_named_in(text) {
            if !codes.contains(&code) {
                codes.push(code);
            }
        }
        codes
    }
}

/// Attachment names as one scannable text; underscores count as spaces.
/// Empty unless the message says it has attachments.
fn attachment_text(message: &InboundMessage) -> String {
    message
        .attachments()
        .iter()
        .map(|name| name.replace('_', " "))
        .collect::<Vec<_>>()
        .join("\n")
}
