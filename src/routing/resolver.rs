//! Lookup resolver: confirms extracted candidates against the record store.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::LookupError;
use crate::lookup::{JobSummary, LookupClient, client_code_of};
use crate::routing::types::{ClientHint, EntityCandidate, MatchConfidence, ResolvedEntities};

/// Resolves candidates to known jobs and clients.
pub struct Resolver {
    lookup: Arc<dyn LookupClient>,
}

impl Resolver {
    pub fn new(lookup: Arc<dyn LookupClient>) -> Self {
        Self { lookup }
    }

    /// Resolve candidates in order.
    ///
    /// 1. First job number with a job record → `Exact`, record fields win.
    /// 2. Else first client code with a client record, from the candidates
    ///    and then the hints → `Fuzzy`. The job number stays as extracted,
    ///    preferring one that carries the matched client's code.
    /// 3. Else `None` with the raw candidate values.
    ///
    /// Any store error is returned as-is; it is never read as "no match".
    pub async fn resolve(
        &self,
        candidates: &[EntityCandidate],
        hints: &[ClientHint],
    ) -> Result<ResolvedEntities, LookupError> {
        for job_number in candidates.iter().filter_map(|c| c.job_number.as_deref()) {
            let Some(project) = self.lookup.find_job(job_number).await? else {
                debug!(job_number, store = self.lookup.name(), "Job number not found");
                continue;
            };
            debug!(
                candidate = job_number,
                job_number = %project.job_number,
                "Job number resolved"
            );
            let client_name = Some(project.client_name.clone()).filter(|n| !n.is_empty());
            let active_jobs = self.active_jobs(&project.client_code).await;
            return Ok(ResolvedEntities {
                job_number: Some(project.job_number.clone()),
                client_code: Some(project.client_code.clone()).filter(|c| !c.is_empty()),
                client_name,
                match_confidence: MatchConfidence::Exact,
                project: Some(project),
                active_jobs,
                lookup_unavailable: false,
            });
        }

        let codes = candidates
            .iter()
            .filter_map(|c| c.client_code.as_deref())
            .chain(hints.iter().map(|h| h.client_code.as_str()));

        let mut tried: Vec<&str> = Vec::new();
        for code in codes {
            if tried.iter().any(|t| t.eq_ignore_ascii_case(code)) {
                continue;
            }
            tried.push(code);

            let Some(client) = self.lookup.find_client(code).await? else {
                debug!(client_code = code, "Client code not found");
                continue;
            };
            debug!(client_code = %client.client_code, "Client code resolved");
            let active_jobs = self.active_jobs(&client.client_code).await;
            return Ok(ResolvedEntities {
                job_number: job_number_for_client(candidates, &client.client_code),
                client_code: Some(client.client_code),
                client_name: Some(client.client_name),
                match_confidence: MatchConfidence::Fuzzy,
                project: None,
                active_jobs,
                lookup_unavailable: false,
            });
        }

        Ok(ResolvedEntities::unresolved(candidates))
    }

    /// Classifier context only; a failure here does not affect resolution.
    async fn active_jobs(&self, client_code: &str) -> Vec<JobSummary> {
        if client_code.is_empty() {
            return Vec::new();
        }
        match self.lookup.active_jobs(client_code).await {
            Ok(jobs) => jobs,
            Err(e) => {
                warn!(client_code, error = %e, "Failed to load active jobs");
                Vec::new()
            }
        }
    }
}

/// First extracted job number under `client_code`, else the first at all.
fn job_number_for_client(candidates: &[EntityCandidate], client_code: &str) -> Option<String> {
    let mut job_numbers = candidates.iter().filter_map(|c| c.job_number.as_deref());
    job_numbers
        .clone()
        .find(|job| client_code_of(job).eq_ignore_ascii_case(client_code))
        .or_else(|| job_numbers.next())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::{ClientRecord, MemoryLookup, ProjectRecord};
    use crate::routing::types::{CandidateStrength, Provenance};

    fn tower_project() -> ProjectRecord {
        ProjectRecord {
            record_id: "recTOW087".into(),
            job_number: "TOW 087".into(),
            job_name: "Newsletter".into(),
            client_code: "TOW".into(),
            client_name: "Tower Insurance".into(),
            stage: "Craft".into(),
            status: "In Progress".into(),
            round: 1,
            with_client: false,
            teams_channel_id: None,
        }
    }

    fn store() -> Arc<MemoryLookup> {
        Arc::new(
            MemoryLookup::new()
                .with_project(tower_project())
                .with_client(ClientRecord {
                    client_code: "TOW".into(),
                    client_name: "Tower Insurance".into(),
                })
                .with_client(ClientRecord {
                    client_code: "SKY".into(),
                    client_name: "Sky TV".into(),
                }),
        )
    }

    fn job(job_number: &str, strength: CandidateStrength) -> EntityCandidate {
        EntityCandidate {
            job_number: Some(job_number.into()),
            client_code: Some(crate::lookup::client_code_of(job_number)),
            provenance: Provenance::Subject,
            strength,
        }
    }

    fn hint(client_code: &str, provenance: Provenance) -> ClientHint {
        ClientHint {
            client_code: client_code.into(),
            provenance,
        }
    }

    #[tokio::test]
    async fn exact_job_match_populates_client() {
        let resolver = Resolver::new(store());
        let resolved = resolver
            .resolve(&[job("TOW 087", CandidateStrength::Exact)], &[])
            .await
            .unwrap();
        assert_eq!(resolved.match_confidence, MatchConfidence::Exact);
        assert_eq!(resolved.job_number.as_deref(), Some("TOW 087"));
        assert_eq!(resolved.client_code.as_deref(), Some("TOW"));
        assert_eq!(resolved.client_name.as_deref(), Some("Tower Insurance"));
        assert_eq!(resolved.project.unwrap().record_id, "recTOW087");
        assert_eq!(resolved.active_jobs.len(), 1);
    }

    #[tokio::test]
    async fn record_corrects_candidate_formatting() {
        let resolver = Resolver::new(store());
        let mut candidate = job("TOW 087", CandidateStrength::Fuzzy);
        candidate.job_number = Some("tow087".into());
        let resolved = resolver.resolve(&[candidate], &[]).await.unwrap();
        assert_eq!(resolved.job_number.as_deref(), Some("TOW 087"));
    }

    #[tokio::test]
    async fn later_candidate_can_match() {
        let resolver = Resolver::new(store());
        let resolved = resolver
            .resolve(
                &[
                    job("TOW 999", CandidateStrength::Exact),
                    job("TOW 087", CandidateStrength::Exact),
                ],
                &[],
            )
            .await
            .unwrap();
        assert_eq!(resolved.match_confidence, MatchConfidence::Exact);
        assert_eq!(resolved.job_number.as_deref(), Some("TOW 087"));
    }

    #[tokio::test]
    async fn client_only_match_is_fuzzy_and_keeps_extracted_job() {
        let resolver = Resolver::new(store());
        let resolved = resolver
            .resolve(&[job("SKY 404", CandidateStrength::Exact)], &[])
            .await
            .unwrap();
        assert_eq!(resolved.match_confidence, MatchConfidence::Fuzzy);
        assert_eq!(resolved.job_number.as_deref(), Some("SKY 404"));
        assert_eq!(resolved.client_code.as_deref(), Some("SKY"));
        assert_eq!(resolved.client_name.as_deref(), Some("Sky TV"));
        assert!(resolved.project.is_none());
    }

    #[tokio::test]
    async fn job_number_wins_over_conflicting_client_code() {
        let resolver = Resolver::new(store());
        let resolved = resolver
            .resolve(
                &[job("TOW 087", CandidateStrength::Exact)],
                &[hint("SKY", Provenance::Body)],
            )
            .await
            .unwrap();
        assert_eq!(resolved.match_confidence, MatchConfidence::Exact);
        assert_eq!(resolved.client_code.as_deref(), Some("TOW"));
        assert_eq!(resolved.client_name.as_deref(), Some("Tower Insurance"));
    }

    #[tokio::test]
    async fn sender_hint_resolves_client_without_job() {
        let resolver = Resolver::new(store());
        let resolved = resolver
            .resolve(&[], &[hint("TOW", Provenance::SenderDomain)])
            .await
            .unwrap();
        assert_eq!(resolved.match_confidence, MatchConfidence::Fuzzy);
        assert!(resolved.job_number.is_none());
        assert_eq!(resolved.client_name.as_deref(), Some("Tower Insurance"));
        assert_eq!(resolved.active_jobs.len(), 1);
    }

    #[tokio::test]
    async fn fuzzy_match_prefers_job_under_matched_client() {
        let resolver = Resolver::new(store());
        let resolved = resolver
            .resolve(
                &[
                    job("ACME 204", CandidateStrength::Fuzzy),
                    job("TOW 555", CandidateStrength::Exact),
                ],
                &[hint("TOW", Provenance::SenderDomain)],
            )
            .await
            .unwrap();
        assert_eq!(resolved.match_confidence, MatchConfidence::Fuzzy);
        assert_eq!(resolved.client_code.as_deref(), Some("TOW"));
        assert_eq!(resolved.job_number.as_deref(), Some("TOW 555"));
    }

    #[tokio::test]
    async fn fuzzy_match_falls_back_to_first_job() {
        let resolver = Resolver::new(store());
        let resolved = resolver
            .resolve(
                &[job("ACME 204", CandidateStrength::Fuzzy)],
                &[hint("TOW", Provenance::SenderDomain)],
            )
            .await
            .unwrap();
        assert_eq!(resolved.match_confidence, MatchConfidence::Fuzzy);
        assert_eq!(resolved.client_name.as_deref(), Some("Tower Insurance"));
        assert_eq!(resolved.job_number.as_deref(), Some("ACME 204"));
    }

    #[tokio::test]
    async fn nothing_resolves_keeps_raw_values_without_name() {
        let resolver = Resolver::new(store());
        let resolved = resolver
            .resolve(&[job("ACME 204", CandidateStrength::Fuzzy)], &[])
            .await
            .unwrap();
        assert_eq!(resolved.match_confidence, MatchConfidence::None);
        assert_eq!(resolved.job_number.as_deref(), Some("ACME 204"));
        assert_eq!(resolved.client_code.as_deref(), Some("ACME"));
        assert!(resolved.client_name.is_none());
    }

    #[tokio::test]
    async fn no_candidates_resolve_to_none() {
        let resolver = Resolver::new(store());
        let resolved = resolver.resolve(&[], &[]).await.unwrap();
        assert_eq!(resolved.match_confidence, MatchConfidence::None);
        assert!(resolved.job_number.is_none());
        assert!(resolved.client_code.is_none());
    }

    #[tokio::test]
    async fn unavailable_store_is_an_error_not_a_miss() {
        let lookup = store();
        lookup.set_unavailable(true);
        let resolver = Resolver::new(lookup);
        let result = resolver
            .resolve(&[job("TOW 087", CandidateStrength::Exact)], &[])
            .await;
        assert!(result.is_err());
    }
}
