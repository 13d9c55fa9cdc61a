use reqwest::blocking::Client;
use serde::Deserialize;

use crate::domain::{LibraryId, OrcabusId, ReadSet, Rgid};
use crate::error::GlueError;
use crate::workflow::{build_client, handle_json};

/// Readset Resolver: maps a library to the identity of every sequencing
/// readset produced for it. The rgid ties a readset back to its physical
/// sequencing origin.
pub trait FastqClient: Send + Sync {
    fn readsets_in_library(&self, library_id: &LibraryId) -> Result<Vec<ReadSet>, GlueError>;
}

#[derive(Clone)]
pub struct FastqHttpClient {
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
struct FastqRecord {
    id: OrcabusId,
    index: String,
    lane: u32,
    instrument_run_id: String,
}

impl From<FastqRecord> for ReadSet {
    fn from(record: FastqRecord) -> Self {
        ReadSet {
            rgid: Rgid::compose(&record.index, record.lane, &record.instrument_run_id),
            orcabus_id: record.id,
        }
    }
}

impl FastqHttpClient {
    pub fn new(base_url: &str) -> Result<Self, GlueError> {
        let client = build_client(GlueError::FastqHttp)?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

impl FastqClient for FastqHttpClient {
    fn readsets_in_library(&self, library_id: &LibraryId) -> Result<Vec<ReadSet>, GlueError> {
        let url = format!("{}/fastq", self.base_url);
        let mut readsets = Vec::new();
        let mut page: Page<FastqRecord> = handle_json(
            self.client
                .get(&url)
                .query(&[("library", library_id.as_str())])
                .send(),
            GlueError::FastqHttp,
            |status, message| GlueError::FastqStatus { status, message },
        )?;
        loop {
            readsets.extend(page.results.drain(..).map(ReadSet::from));
            let Some(next) = page.next.take() else {
                return Ok(readsets);
            };
            page = handle_json(
                self.client.get(&next).send(),
                GlueError::FastqHttp,
                |status, message| GlueError::FastqStatus { status, message },
            )?;
        }
    }
}
