//! Airtable-backed lookup over the REST API.
//!
//! Projects carry `Job Number`, `Project Name`, `Client`, `Stage`, `Status`,
//! `Round`, `With Client?` and `Teams Channel ID`. Clients carry `Client` and
//! `Client code`. Linked/lookup fields arrive as arrays; the first value wins.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use super::{
    ACTIVE_STATUSES, ClientRecord, JobSummary, LookupClient, ProjectRecord, client_code_of,
    is_placeholder_job,
};
use crate::error::LookupError;

const AIRTABLE_API_BASE: &str = "https://api.airtable.com/v0";
const STORE: &str = "airtable";

/// Default per-request timeout for Airtable calls.
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);

/// Airtable connection settings.
#[derive(Debug, Clone)]
pub struct AirtableConfig {
    /// `None` leaves the store unconfigured; every call reports `NotConfigured`.
    pub api_key: Option<SecretString>,
    pub base_id: String,
    pub projects_table: String,
    pub clients_table: String,
    pub timeout: Duration,
}

/// Lookup client for the agency's Airtable base.
pub struct AirtableLookup {
    config: AirtableConfig,
    base_url: String,
    client: Client,
}

impl AirtableLookup {
    pub fn new(config: AirtableConfig) -> Result<Self, LookupError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LookupError::RequestFailed {
                store: STORE.to_string(),
                reason: format!("Failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            config,
            base_url: AIRTABLE_API_BASE.to_string(),
            client,
        })
    }

    /// Point the client at a different API host (test servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn query(
        &self,
        table: &str,
        formula: &str,
        max_records: Option<u32>,
    ) -> Result<Vec<AirtableRecord>, LookupError> {
        let Some(api_key) = self.config.api_key.as_ref() else {
            return Err(LookupError::NotConfigured(
                "AIRTABLE_API_KEY is not set".to_string(),
            ));
        };

        let url = format!("{}/{}/{}", self.base_url, self.config.base_id, table);
        let mut params = vec![("filterByFormula", formula.to_string())];
        if let Some(max) = max_records {
            params.push(("maxRecords", max.to_string()));
        }
        debug!(table, formula, "Querying Airtable");

        let response = self
            .client
            .get(&url)
            .bearer_auth(api_key.expose_secret())
            .query(&params)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LookupError::RequestFailed {
                store: STORE.to_string(),
                reason: format!("HTTP {status} from table {table}"),
            });
        }

        let body = response.text().await.map_err(|e| self.transport_error(e))?;
        parse_records(&body)
    }

    fn transport_error(&self, e: reqwest::Error) -> LookupError {
        if e.is_timeout() {
            LookupError::Timeout {
                store: STORE.to_string(),
                timeout: self.config.timeout,
            }
        } else {
            LookupError::RequestFailed {
                store: STORE.to_string(),
                reason: e.to_string(),
            }
        }
    }
}

#[async_trait]
impl LookupClient for AirtableLookup {
    fn name(&self) -> &str {
        STORE
    }

    async fn find_job(&self, job_number: &str) -> Result<Option<ProjectRecord>, LookupError> {
        let formula = format!("{{Job Number}}='{}'", escape_formula(job_number));
        let records = self
            .query(&self.config.projects_table, &formula, Some(1))
            .await?;
        Ok(records
            .into_iter()
            .next()
            .map(|record| project_from_record(record, job_number)))
    }

    async fn find_client(&self, client_code: &str) -> Result<Option<ClientRecord>, LookupError> {
        let formula = format!("{{Client code}}='{}'", escape_formula(client_code));
        let records = self
            .query(&self.config.clients_table, &formula, Some(1))
            .await?;
        Ok(records
            .into_iter()
            .next()
            .and_then(|record| client_from_record(record, client_code)))
    }

    async fn active_jobs(&self, client_code: &str) -> Result<Vec<JobSummary>, LookupError> {
        let formula = active_jobs_formula(client_code);
        let records = self
            .query(&self.config.projects_table, &formula, None)
            .await?;
        Ok(records
            .into_iter()
            .map(job_summary_from_record)
            .filter(|job| !job.job_number.is_empty() && !is_placeholder_job(&job.job_number))
            .collect())
    }
}

// ── Record mapping ──────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RecordsPage {
    #[serde(default)]
    records: Vec<AirtableRecord>,
}

#[derive(Debug, Deserialize)]
struct AirtableRecord {
    id: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

fn parse_records(body: &str) -> Result<Vec<AirtableRecord>, LookupError> {
    serde_json::from_str::<RecordsPage>(body)
        .map(|page| page.records)
        .map_err(|e| LookupError::InvalidResponse {
            store: STORE.to_string(),
            reason: e.to_string(),
        })
}

/// Airtable string literal escaping for `filterByFormula`.
fn escape_formula(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

fn active_jobs_formula(client_code: &str) -> String {
    let statuses = ACTIVE_STATUSES
        .iter()
        .map(|s| format!("{{Status}}='{s}'"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "AND(FIND('{}', {{Job Number}})=1, OR({statuses}))",
        escape_formula(client_code)
    )
}

/// Text of a field, taking the first element of linked/lookup arrays.
fn field_str(fields: &Map<String, Value>, key: &str) -> String {
    match fields.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(items)) => items
            .first()
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .unwrap_or_default(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn project_from_record(record: AirtableRecord, queried: &str) -> ProjectRecord {
    let fields = &record.fields;
    let mut job_number = field_str(fields, "Job Number");
    if job_number.is_empty() {
        job_number = queried.to_string();
    }
    let mut client_code = field_str(fields, "Client code");
    if client_code.is_empty() {
        client_code = client_code_of(&job_number);
    }
    let round = fields
        .get("Round")
        .and_then(Value::as_u64)
        .and_then(|r| u32::try_from(r).ok())
        .unwrap_or(0);
    let teams_channel_id = Some(field_str(fields, "Teams Channel ID")).filter(|s| !s.is_empty());

    ProjectRecord {
        record_id: record.id.clone(),
        job_name: field_str(fields, "Project Name"),
        client_name: field_str(fields, "Client"),
        stage: field_str(fields, "Stage"),
        status: field_str(fields, "Status"),
        round,
        with_client: fields
            .get("With Client?")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        teams_channel_id,
        job_number,
        client_code,
    }
}

fn client_from_record(record: AirtableRecord, queried: &str) -> Option<ClientRecord> {
    let client_name = field_str(&record.fields, "Client");
    if client_name.is_empty() {
        return None;
    }
    let mut client_code = field_str(&record.fields, "Client code");
    if client_code.is_empty() {
        client_code = queried.to_uppercase();
    }
    Some(ClientRecord {
        client_code,
        client_name,
    })
}

fn job_summary_from_record(record: AirtableRecord) -> JobSummary {
    JobSummary {
        job_number: field_str(&record.fields, "Job Number"),
        job_name: field_str(&record.fields, "Project Name"),
        description: field_str(&record.fields, "Description"),
    }
}
