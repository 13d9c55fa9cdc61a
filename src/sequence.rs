use reqwest::blocking::Client;
use serde::Deserialize;

use crate::domain::{LibraryId, OrcabusId};
use crate::error::GlueError;
use crate::workflow::{build_client, handle_json};

pub trait SequenceClient: Send + Sync {
    /// Business ids of every library sequenced on the given instrument run.
    fn library_ids_on_run(&self, instrument_run_id: &str) -> Result<Vec<LibraryId>, GlueError>;
}

#[derive(Clone)]
pub struct SequenceHttpClient {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct Page<T> {
    results: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SequenceRecord {
    orcabus_id: OrcabusId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LibraryIdList {
    library_ids: Vec<LibraryId>,
}

impl SequenceHttpClient {
    pub fn new(base_url: &str) -> Result<Self, GlueError> {
        let client = build_client(GlueError::SequenceHttp)?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

impl SequenceClient for SequenceHttpClient {
    fn library_ids_on_run(&self, instrument_run_id: &str) -> Result<Vec<LibraryId>, GlueError> {
        let url = format!("{}/sequence", self.base_url);
        let page: Page<SequenceRecord> = handle_json(
            self.client
                .get(&url)
                .query(&[("instrumentRunId", instrument_run_id)])
                .send(),
            GlueError::SequenceHttp,
            |status, message| GlueError::SequenceStatus { status, message },
        )?;
        let sequence = page
            .results
            .into_iter()
            .next()
            .ok_or_else(|| GlueError::RunNotFound(instrument_run_id.to_string()))?;

        let url = format!("{}/sequence/{}/library_ids", self.base_url, sequence.orcabus_id);
        let list: LibraryIdList = handle_json(
            self.client.get(&url).send(),
            GlueError::SequenceHttp,
            |status, message| GlueError::SequenceStatus { status, message },
        )?;
        Ok(list.library_ids)
    }
}
