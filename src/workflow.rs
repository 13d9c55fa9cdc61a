use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::Duration;

use chrono::NaiveDate;
use regex::Regex;
use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use serde::{Deserialize, Serialize};

use crate::domain::{LibraryId, OrcabusId, Rgid};
use crate::error::GlueError;

/// Separator between the name, version and portal run id segments of a
/// workflow run name. Neither segment may contain it.
pub const RUN_NAME_SEPARATOR: &str = "--";

/// Freshly allocated, globally unique identifier for one workflow execution
/// attempt: a UTC date prefix followed by eight hex characters, so ids stay
/// human-sortable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PortalRunId(String);

impl PortalRunId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PortalRunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PortalRunId {
    type Err = GlueError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        static PATTERN: OnceLock<Regex> = OnceLock::new();
        let pattern = PATTERN.get_or_init(|| Regex::new(r"^(\d{8})[0-9a-f]{8}$").unwrap());

        let captures = pattern
            .captures(value)
            .ok_or_else(|| GlueError::InvalidPortalRunId(value.to_string()))?;
        let date_prefix = captures.get(1).map(|m| m.as_str()).unwrap_or_default();
        if NaiveDate::parse_from_str(date_prefix, "%Y%m%d").is_err() {
            return Err(GlueError::InvalidPortalRunId(value.to_string()));
        }
        Ok(Self(value.to_string()))
    }
}

/// Workflow identity used to look a workflow up in the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowSelector {
    pub name: String,
    pub version: String,
}

impl WorkflowSelector {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

/// Registry record for a workflow. Emitted verbatim on draft events; the
/// finer selectors are only present when the registry carries them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowDescriptor {
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_engine: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_engine_pipeline_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_state: Option<String>,
}

impl WorkflowDescriptor {
    /// Degraded name+version-only descriptor for call sites that opted into
    /// the placeholder policy on an unresolved registry lookup.
    pub fn placeholder(selector: &WorkflowSelector) -> Self {
        Self {
            name: selector.name.clone(),
            version: selector.version.clone(),
            code_version: None,
            execution_engine: None,
            execution_engine_pipeline_id: None,
            validation_state: None,
        }
    }
}

/// One prior run as recorded by the run-history store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowRunDetail {
    pub orcabus_id: OrcabusId,
    pub workflow_name: String,
    pub workflow_version: String,
    pub portal_run_id: PortalRunId,
}

/// Run-history query key: workflow identity plus the library/readset
/// identities of a candidate analysis unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunHistoryQuery {
    pub workflow_name: String,
    pub workflow_version: String,
    pub library_ids: Vec<LibraryId>,
    pub rgids: Vec<Rgid>,
}

pub trait WorkflowClient: Send + Sync {
    /// Zero-or-one registry match for the selector.
    fn find_workflow(&self, selector: &WorkflowSelector)
    -> Result<Option<WorkflowDescriptor>, GlueError>;

    /// Prior runs matching the workflow identity and overlapping the
    /// library-id/rgid key.
    fn list_runs(&self, query: &RunHistoryQuery) -> Result<Vec<WorkflowRunDetail>, GlueError>;

    /// Allocate a fresh portal run id. Side-effecting and externally unique.
    fn allocate_portal_run_id(&self) -> Result<PortalRunId, GlueError>;
}

/// Derive the deterministic run name for a (workflow name, version, portal
/// run id) triple.
pub fn workflow_run_name(name: &str, version: &str, portal_run_id: &PortalRunId) -> String {
    format!("{name}{RUN_NAME_SEPARATOR}{version}{RUN_NAME_SEPARATOR}{portal_run_id}")
}

/// Recover the originating triple from a run name produced by
/// [`workflow_run_name`].
pub fn parse_workflow_run_name(run_name: &str) -> Result<(String, String, PortalRunId), GlueError> {
    let mut segments = run_name.rsplitn(3, RUN_NAME_SEPARATOR);
    let portal_segment = segments.next();
    let version = segments.next();
    let name = segments.next();
    match (name, version, portal_segment) {
        (Some(name), Some(version), Some(portal_segment))
            if !name.is_empty() && !version.is_empty() =>
        {
            let portal_run_id = portal_segment
                .parse::<PortalRunId>()
                .map_err(|_| GlueError::InvalidWorkflowRunName(run_name.to_string()))?;
            Ok((name.to_string(), version.to_string(), portal_run_id))
        }
        _ => Err(GlueError::InvalidWorkflowRunName(run_name.to_string())),
    }
}

#[derive(Clone)]
pub struct WorkflowHttpClient {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct Page<T> {
    results: Vec<T>,
    #[serde(default)]
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PortalRunIdResponse {
    portal_run_id: PortalRunId,
}

impl WorkflowHttpClient {
    pub fn new(base_url: &str) -> Result<Self, GlueError> {
        let client = build_client(GlueError::WorkflowHttp)?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn get_pages<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>, GlueError> {
        let mut results = Vec::new();
        let mut page: Page<T> = handle_json(
            self.client.get(url).query(query).send(),
            GlueError::WorkflowHttp,
            |status, message| GlueError::WorkflowStatus { status, message },
        )?;
        loop {
            results.append(&mut page.results);
            let Some(next) = page.next.take() else {
                return Ok(results);
            };
            page = handle_json(
                self.client.get(&next).send(),
                GlueError::WorkflowHttp,
                |status, message| GlueError::WorkflowStatus { status, message },
            )?;
        }
    }
}

impl WorkflowClient for WorkflowHttpClient {
    fn find_workflow(
        &self,
        selector: &WorkflowSelector,
    ) -> Result<Option<WorkflowDescriptor>, GlueError> {
        let url = format!("{}/workflow", self.base_url);
        let matches: Vec<WorkflowDescriptor> = self.get_pages(
            &url,
            &[
                ("name", selector.name.clone()),
                ("version", selector.version.clone()),
            ],
        )?;
        Ok(matches
            .into_iter()
            .find(|descriptor| descriptor.name == selector.name))
    }

    fn list_runs(&self, query: &RunHistoryQuery) -> Result<Vec<WorkflowRunDetail>, GlueError> {
        let url = format!("{}/workflowrun", self.base_url);
        let library_ids = query
            .library_ids
            .iter()
            .map(LibraryId::as_str)
            .collect::<Vec<_>>()
            .join(",");
        let rgids = query
            .rgids
            .iter()
            .map(Rgid::as_str)
            .collect::<Vec<_>>()
            .join(",");
        self.get_pages(
            &url,
            &[
                ("workflowName", query.workflow_name.clone()),
                ("workflowVersion", query.workflow_version.clone()),
                ("libraryIdList", library_ids),
                ("rgidList", rgids),
            ],
        )
    }

    fn allocate_portal_run_id(&self) -> Result<PortalRunId, GlueError> {
        let url = format!("{}/portalrunid", self.base_url);
        let response: PortalRunIdResponse = handle_json(
            self.client.post(&url).send(),
            GlueError::WorkflowHttp,
            |status, message| GlueError::WorkflowStatus { status, message },
        )?;
        Ok(response.portal_run_id)
    }
}

pub(crate) fn build_client(
    map_err: impl Fn(String) -> GlueError,
) -> Result<Client, GlueError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        USER_AGENT,
        HeaderValue::from_str(&format!("analysis-glue/{}", env!("CARGO_PKG_VERSION")))
            .map_err(|err| map_err(err.to_string()))?,
    );
    if let Ok(token) = std::env::var("ORCABUS_TOKEN") {
        if !token.trim().is_empty() {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", token.trim()))
                    .map_err(|err| map_err(err.to_string()))?,
            );
        }
    }
    Client::builder()
        .default_headers(headers)
        .timeout(Duration::from_secs(30))
        .build()
        .map_err(|err| map_err(err.to_string()))
}

pub(crate) fn handle_json<T: serde::de::DeserializeOwned>(
    response: Result<reqwest::blocking::Response, reqwest::Error>,
    map_transport: impl Fn(String) -> GlueError,
    map_status: impl Fn(u16, String) -> GlueError,
) -> Result<T, GlueError> {
    let response = response.map_err(|err| map_transport(err.to_string()))?;
    if !response.status().is_success() {
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| "request failed".to_string());
        return Err(map_status(status, message));
    }
    response.json().map_err(|err| map_transport(err.to_string()))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parse_portal_run_id_valid() {
        let id: PortalRunId = "20250829a1b2c3d4".parse().unwrap();
        assert_eq!(id.as_str(), "20250829a1b2c3d4");
    }

    #[test]
    fn parse_portal_run_id_rejects_bad_shape() {
        assert_matches!(
            "2025082a1b2c3d4".parse::<PortalRunId>(),
            Err(GlueError::InvalidPortalRunId(_))
        );
        assert_matches!(
            "20250829A1B2C3D4".parse::<PortalRunId>(),
            Err(GlueError::InvalidPortalRunId(_))
        );
    }

    #[test]
    fn parse_portal_run_id_rejects_impossible_date() {
        assert_matches!(
            "20251340a1b2c3d4".parse::<PortalRunId>(),
            Err(GlueError::InvalidPortalRunId(_))
        );
    }

    #[test]
    fn run_name_round_trip() {
        let portal_run_id: PortalRunId = "20250829a1b2c3d4".parse().unwrap();
        let run_name = workflow_run_name("dragen-wgts-dna", "4.4.4", &portal_run_id);
        assert_eq!(run_name, "dragen-wgts-dna--4.4.4--20250829a1b2c3d4");

        let (name, version, parsed) = parse_workflow_run_name(&run_name).unwrap();
        assert_eq!(name, "dragen-wgts-dna");
        assert_eq!(version, "4.4.4");
        assert_eq!(parsed, portal_run_id);
    }

    #[test]
    fn parse_run_name_rejects_missing_segments() {
        assert_matches!(
            parse_workflow_run_name("dragen-wgts-dna--4.4.4"),
            Err(GlueError::InvalidWorkflowRunName(_))
        );
        assert_matches!(
            parse_workflow_run_name("--4.4.4--20250829a1b2c3d4"),
            Err(GlueError::InvalidWorkflowRunName(_))
        );
    }
}
