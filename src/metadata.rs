use reqwest::blocking::Client;
use serde::Deserialize;

use crate::domain::{Library, LibraryId};
use crate::error::GlueError;
use crate::workflow::{build_client, handle_json};

pub trait MetadataClient: Send + Sync {
    /// Library records for an explicit id list. Ids with no catalog entry
    /// are simply absent from the result.
    fn libraries_by_id(&self, ids: &[LibraryId]) -> Result<Vec<Library>, GlueError>;

    /// Full catalog scan, used to reason across sequencing runs.
    fn all_libraries(&self) -> Result<Vec<Library>, GlueError>;
}

#[derive(Clone)]
pub struct MetadataHttpClient {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct Page<T> {
    results: Vec<T>,
    #[serde(default)]
    next: Option<String>,
}

impl MetadataHttpClient {
    pub fn new(base_url: &str) -> Result<Self, GlueError> {
        let client = build_client(GlueError::MetadataHttp)?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn get_pages(&self, url: &str, query: &[(&str, String)]) -> Result<Vec<Library>, GlueError> {
        let mut results = Vec::new();
        let mut page: Page<Library> = handle_json(
            self.client.get(url).query(query).send(),
            GlueError::MetadataHttp,
            |status, message| GlueError::MetadataStatus { status, message },
        )?;
        loop {
            results.append(&mut page.results);
            let Some(next) = page.next.take() else {
                return Ok(results);
            };
            page = handle_json(
                self.client.get(&next).send(),
                GlueError::MetadataHttp,
                |status, message| GlueError::MetadataStatus { status, message },
            )?;
        }
    }
}

impl MetadataClient for MetadataHttpClient {
    fn libraries_by_id(&self, ids: &[LibraryId]) -> Result<Vec<Library>, GlueError> {
        let url = format!("{}/library", self.base_url);
        let id_list = ids
            .iter()
            .map(LibraryId::as_str)
            .collect::<Vec<_>>()
            .join(",");
        self.get_pages(&url, &[("libraryId", id_list)])
    }

    fn all_libraries(&self) -> Result<Vec<Library>, GlueError> {
        let url = format!("{}/library", self.base_url);
        self.get_pages(&url, &[])
    }
}
