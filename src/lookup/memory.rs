//! In-memory lookup store, loaded from fixtures.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use super::{
    ACTIVE_STATUSES, ClientRecord, JobSummary, LookupClient, ProjectRecord, client_code_of,
    is_placeholder_job,
};
use crate::error::LookupError;

const STORE: &str = "memory";

/// Lookup over a fixed set of records.
///
/// Job numbers match ignoring case and whitespace ("tow087" finds "TOW 087").
/// `set_unavailable(true)` makes every call fail as an unreachable store would.
#[derive(Debug, Default)]
pub struct MemoryLookup {
    projects: Vec<ProjectRecord>,
    clients: Vec<ClientRecord>,
    unavailable: AtomicBool,
}

impl MemoryLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_project(mut self, project: ProjectRecord) -> Self {
        self.projects.push(project);
        self
    }

    pub fn with_client(mut self, client: ClientRecord) -> Self {
        self.clients.push(client);
        self
    }

    /// Simulate an outage (or recovery) of the store.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::Relaxed);
    }

    fn check_available(&self) -> Result<(), LookupError> {
        if self.unavailable.load(Ordering::Relaxed) {
            Err(LookupError::RequestFailed {
                store: STORE.to_string(),
                reason: "store unavailable".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

fn job_key(job_number: &str) -> String {
    job_number
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase()
}

#[async_trait]
impl LookupClient for MemoryLookup {
    fn name(&self) -> &str {
        STORE
    }

    async fn find_job(&self, job_number: &str) -> Result<Option<ProjectRecord>, LookupError> {
        self.check_available()?;
        let key = job_key(job_number);
        Ok(self
            .projects
            .iter()
            .find(|p| job_key(&p.job_number) == key)
            .cloned())
    }

    async fn find_client(&self, client_code: &str) -> Result<Option<ClientRecord>, LookupError> {
        self.check_available()?;
        Ok(self
            .clients
            .iter()
            .find(|c| c.client_code.eq_ignore_ascii_case(client_code))
            .cloned())
    }

    async fn active_jobs(&self, client_code: &str) -> Result<Vec<JobSummary>, LookupError> {
        self.check_available()?;
        Ok(self
            .projects
            .iter()
            .filter(|p| client_code_of(&p.job_number).eq_ignore_ascii_case(client_code))
            .filter(|p| ACTIVE_STATUSES.contains(&p.status.as_str()))
            .filter(|p| !is_placeholder_job(&p.job_number))
            .map(|p| JobSummary {
                job_number: p.job_number.clone(),
                job_name: p.job_name.clone(),
                description: String::new(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project(job_number: &str, status: &str) -> ProjectRecord {
        ProjectRecord {
            record_id: format!("rec-{job_number}"),
            job_number: job_number.into(),
            job_name: "Newsletter".into(),
            client_code: client_code_of(job_number),
            client_name: "Tower Insurance".into(),
            stage: "Craft".into(),
            status: status.into(),
            round: 1,
            with_client: false,
            teams_channel_id: None,
        }
    }

    #[tokio::test]
    async fn job_lookup_ignores_case_and_spacing() {
        let lookup = MemoryLookup::new().with_project(project("TOW 087", "In Progress"));
        let found = lookup.find_job("tow087").await.unwrap().unwrap();
        assert_eq!(found.job_number, "TOW 087");
        assert!(lookup.find_job("TOW 088").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn active_jobs_skip_completed_and_placeholders() {
        let lookup = MemoryLookup::new()
            .with_project(project("TOW 087", "In Progress"))
            .with_project(project("TOW 090", "On Hold"))
            .with_project(project("TOW 050", "Completed"))
            .with_project(project("TOW 999", "In Progress"))
            .with_project(project("SKY 001", "In Progress"));
        let jobs = lookup.active_jobs("tow").await.unwrap();
        let numbers: Vec<&str> = jobs.iter().map(|j| j.job_number.as_str()).collect();
        assert_eq!(numbers, vec!["TOW 087", "TOW 090"]);
    }

    #[tokio::test]
    async fn unavailable_store_errors() {
        let lookup = MemoryLookup::new().with_project(project("TOW 087", "In Progress"));
        lookup.set_unavailable(true);
        assert!(lookup.find_job("TOW 087").await.is_err());
        lookup.set_unavailable(false);
        assert!(lookup.find_job("TOW 087").await.unwrap().is_some());
    }
}
