use tracing::warn;

use crate::domain::{AnalysisUnit, LibraryId, ReadSet, Rgid};
use crate::error::GlueError;
use crate::workflow::{RunHistoryQuery, WorkflowClient, WorkflowSelector};

/// Best-effort idempotency key for one (workflow, analysis unit) candidate:
/// the workflow identity plus the sorted library ids and sorted rgids of the
/// unit. Two concurrent invocations can still both pass the check before
/// either write lands; exactly-once must be enforced downstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdempotencyKey {
    pub workflow_name: String,
    pub workflow_version: String,
    pub library_ids: Vec<LibraryId>,
    pub rgids: Vec<Rgid>,
}

impl IdempotencyKey {
    pub fn new(selector: &WorkflowSelector, unit: &AnalysisUnit, readsets: &[ReadSet]) -> Self {
        let mut library_ids = unit.library_ids();
        library_ids.sort();
        library_ids.dedup();

        let mut rgids: Vec<Rgid> = readsets.iter().map(|readset| readset.rgid.clone()).collect();
        rgids.sort();
        rgids.dedup();

        Self {
            workflow_name: selector.name.clone(),
            workflow_version: selector.version.clone(),
            library_ids,
            rgids,
        }
    }

    fn to_query(&self) -> RunHistoryQuery {
        RunHistoryQuery {
            workflow_name: self.workflow_name.clone(),
            workflow_version: self.workflow_version.clone(),
            library_ids: self.library_ids.clone(),
            rgids: self.rgids.clone(),
        }
    }
}

/// Read-only check against the workflow-run history. A prior run with the
/// same key suppresses emission; suppression is logged, never an error.
pub struct DedupFilter<'a, W: WorkflowClient> {
    client: &'a W,
}

impl<'a, W: WorkflowClient> DedupFilter<'a, W> {
    pub fn new(client: &'a W) -> Self {
        Self { client }
    }

    pub fn already_run(&self, key: &IdempotencyKey) -> Result<bool, GlueError> {
        let prior_runs = self.client.list_runs(&key.to_query())?;
        if let Some(prior) = prior_runs.first() {
            warn!(
                workflow = %key.workflow_name,
                version = %key.workflow_version,
                portal_run_id = %prior.portal_run_id,
                libraries = ?key.library_ids,
                "suppressing draft, workflow already run for this library/readset set"
            );
            return Ok(true);
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Library, OrcabusId, Phenotype, ProcessingClass, SampleType, SubjectRef};

    fn library(library_id: &str, suffix: &str) -> Library {
        Library {
            orcabus_id: OrcabusId::new(format!("lib.{suffix}")),
            library_id: library_id.parse().unwrap(),
            sample_type: SampleType::Wgs,
            phenotype: Phenotype::Tumor,
            processing_class: ProcessingClass::Research,
            subject: SubjectRef {
                orcabus_id: OrcabusId::new("sbj.0001"),
                subject_id: "SUBJ-001".to_string(),
            },
        }
    }

    #[test]
    fn key_sorts_and_dedups_identities() {
        let unit = AnalysisUnit::TumorNormal {
            tumor: library("L200", "0200"),
            normal: library("L100", "0100"),
        };
        let readsets = vec![
            ReadSet {
                orcabus_id: OrcabusId::new("fqr.0002"),
                rgid: Rgid::compose("CC", 2, "RUN1"),
            },
            ReadSet {
                orcabus_id: OrcabusId::new("fqr.0001"),
                rgid: Rgid::compose("AA", 1, "RUN1"),
            },
            ReadSet {
                orcabus_id: OrcabusId::new("fqr.0003"),
                rgid: Rgid::compose("AA", 1, "RUN1"),
            },
        ];

        let selector = WorkflowSelector::new("dragen-wgts-dna", "4.4.4");
        let key = IdempotencyKey::new(&selector, &unit, &readsets);
        assert_eq!(
            key.library_ids,
            vec!["L100".parse().unwrap(), "L200".parse().unwrap()]
        );
        assert_eq!(
            key.rgids,
            vec![Rgid::compose("AA", 1, "RUN1"), Rgid::compose("CC", 2, "RUN1")]
        );
    }
}
