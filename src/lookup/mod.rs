//! Job/client record lookup.
//!
//! The router resolves extracted candidates through the `LookupClient` trait.
//! `AirtableLookup` is the production store; `MemoryLookup` serves fixtures.

pub mod airtable;
pub mod memory;

pub use airtable::{AirtableConfig, AirtableLookup};
pub use memory::MemoryLookup;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::LookupError;

/// A job (project) record as held by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRecord {
    pub record_id: String,
    pub job_number: String,
    pub job_name: String,
    pub client_code: String,
    pub client_name: String,
    pub stage: String,
    pub status: String,
    pub round: u32,
    pub with_client: bool,
    pub teams_channel_id: Option<String>,
}

/// A client record as held by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientRecord {
    pub client_code: String,
    pub client_name: String,
}

/// Short description of an active job, fed to the classifier as context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSummary {
    pub job_number: String,
    pub job_name: String,
    pub description: String,
}

/// Statuses that count as "active" for a client's job list.
pub const ACTIVE_STATUSES: &[&str] = &["In Progress", "On Hold"];

/// Placeholder job numbers end in these suffixes and are never real work.
pub fn is_placeholder_job(job_number: &str) -> bool {
    job_number.ends_with("998") || job_number.ends_with("999")
}

/// Client code prefix of a job number ("TOW 087" → "TOW").
pub fn client_code_of(job_number: &str) -> String {
    job_number
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect::<String>()
        .to_uppercase()
}

/// Read-only access to the job/client record store.
#[async_trait]
pub trait LookupClient: Send + Sync {
    /// Store name for logs and errors.
    fn name(&self) -> &str;

    /// Exact match on a job number.
    async fn find_job(&self, job_number: &str) -> Result<Option<ProjectRecord>, LookupError>;

    /// Exact match on a client code.
    async fn find_client(&self, client_code: &str) -> Result<Option<ClientRecord>, LookupError>;

    /// Active, non-placeholder jobs for a client.
    async fn active_jobs(&self, client_code: &str) -> Result<Vec<JobSummary>, LookupError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_code_prefix() {
        assert_eq!(client_code_of("TOW 087"), "TOW");
        assert_eq!(client_code_of("sky123"), "SKY");
        assert_eq!(client_code_of(""), "");
    }

    #[test]
    fn placeholder_jobs() {
        assert!(is_placeholder_job("TOW 999"));
        assert!(is_placeholder_job("ONE 998"));
        assert!(!is_placeholder_job("ONE 099"));
    }
}
