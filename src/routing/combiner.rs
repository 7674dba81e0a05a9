//! Decision combiner: folds resolved entities and the intent judgment into
//! the final routing decision.
//!
//! Pure and deterministic: same inputs, same decision.

use crate::routing::types::{
    Confidence, IntentJudgment, MatchConfidence, ResolvedEntities, Route, RoutingDecision,
};

/// Reason given when a job-bound route has nothing to bind to.
pub const NO_JOB_NUMBER_REASON: &str = "No job number found for a route that requires one.";

const UNRESOLVED_LOOKUP_CLAUSE: &str =
    "Unresolved entity lookup: the job system was unavailable, so nothing was verified.";
const FUZZY_CLAUSE: &str = "Job number not verified; matched on client code only.";
const NO_MATCH_CLAUSE: &str = "No job or client matched known records.";

/// Combine resolution and classification.
///
/// 1. A job-bound route with no match, or with no job number at all,
///    becomes `clarify` / `low`.
/// 2. Otherwise confidence is the weaker of the model's and the match's.
/// 3. The reason carries a clause for weak or skipped resolution.
/// 4. Entities pass through untouched.
pub fn combine(resolved: &ResolvedEntities, judgment: &IntentJudgment) -> RoutingDecision {
    let unbound = resolved.match_confidence == MatchConfidence::None
        || resolved.job_number.is_none();
    let (route, confidence, reason) = if judgment.route.requires_job_number() && unbound {
        let mut reason = NO_JOB_NUMBER_REASON.to_string();
        if resolved.lookup_unavailable {
            append_clause(&mut reason, UNRESOLVED_LOOKUP_CLAUSE);
        }
        (Route::Clarify, Confidence::Low, reason)
    } else {
        let confidence = judgment
            .model_confidence
            .min(resolved.match_confidence.ceiling());
        (judgment.route, confidence, compose_reason(resolved, judgment))
    };

    RoutingDecision {
        route,
        confidence,
        job_number: resolved.job_number.clone(),
        client_code: resolved.client_code.clone(),
        client_name: resolved.client_name.clone(),
        intent: judgment.intent_summary.clone(),
        reason,
        project: resolved.project.clone(),
        clarify_email: None,
    }
}

fn compose_reason(resolved: &ResolvedEntities, judgment: &IntentJudgment) -> String {
    let mut reason = judgment.rationale.trim().to_string();
    if resolved.lookup_unavailable {
        append_clause(&mut reason, UNRESOLVED_LOOKUP_CLAUSE);
        return reason;
    }
    match resolved.match_confidence {
        MatchConfidence::Exact => {}
        MatchConfidence::Fuzzy => append_clause(&mut reason, FUZZY_CLAUSE),
        MatchConfidence::None => append_clause(&mut reason, NO_MATCH_CLAUSE),
    }
    reason
}

fn append_clause(reason: &mut String, clause: &str) {
    if reason.is_empty() {
        reason.push_str(clause);
        return;
    }
    if !reason.ends_with(['.', '!', '?']) {
        reason.push('.');
    }
    reason.push(' ');
    reason.push_str(clause);
}
