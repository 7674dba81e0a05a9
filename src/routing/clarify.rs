//! Clarify email drafts.
//!
//! When a message lands on `clarify`, the decision carries a short HTML reply
//! asking the sender for what is missing. Rendering is pure; sending is the
//! caller's job.

use crate::routing::types::{InboundMessage, MatchConfidence, Route, RoutingDecision};

/// Attach a clarify draft to `decision` when its route is `clarify`.
/// Any other decision is returned unchanged.
pub fn with_clarify_email(
    mut decision: RoutingDecision,
    message: &InboundMessage,
    match_confidence: MatchConfidence,
) -> RoutingDecision {
    decision.clarify_email = (decision.route == Route::Clarify).then(|| {
        render_clarify_email(
            message.sender_name.as_deref(),
            decision.job_number.as_deref(),
            match_confidence,
        )
    });
    decision
}

/// Render the clarify HTML.
///
/// A job number that was extracted but never matched gets the
/// "couldn't find job" wording; otherwise the sender is asked for one.
pub fn render_clarify_email(
    sender_name: Option<&str>,
    job_number: Option<&str>,
    match_confidence: MatchConfidence,
) -> String {
    let greeting = sender_name
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .and_then(|n| n.split_whitespace().next())
        .map(escape_html)
        .unwrap_or_else(|| "there".to_string());

    let body = match job_number {
        Some(job) if match_confidence != MatchConfidence::Exact => format!(
            "<p>I couldn't find job <strong>{}</strong> in our system.</p>\n\
             <p>Could you double-check the job number? Or reply <strong>TRIAGE</strong> \
             if this is a new job.</p>",
            escape_html(job)
        ),
        Some(job) => format!(
            "<p>I found job <strong>{}</strong> but couldn't tell what you need.</p>\n\
             <p>Is this an update, a WIP, feedback, or something going to the client?</p>",
            escape_html(job)
        ),
        None => "<p>I couldn't tell which job this is about.</p>\n\
                 <p>Could you reply with the job number (e.g. TOW 087)? Or reply \
                 <strong>TRIAGE</strong> if this is a new job.</p>"
            .to_string(),
    };

    format!("<p>Hi {greeting},</p>\n{body}\n<p>Dot</p>")
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
