use serde::{Deserialize, Serialize};

use crate::config::UnresolvedPolicy;
use crate::domain::{Library, LibraryId, OrcabusId, ReadSet};
use crate::error::GlueError;
use crate::workflow::{
    PortalRunId, WorkflowClient, WorkflowDescriptor, WorkflowSelector, workflow_run_name,
};

pub const DRAFT_STATUS: &str = "DRAFT";

/// The emitted artifact: an unconfirmed workflow-launch request handed to the
/// event transport. Wire shape is a stable contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowDraftEvent {
    pub status: String,
    pub workflow: WorkflowDescriptor,
    pub workflow_run_name: String,
    pub portal_run_id: PortalRunId,
    pub libraries: Vec<EventLibrary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<EventPayload>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventLibrary {
    pub library_id: LibraryId,
    pub orcabus_id: OrcabusId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readsets: Option<Vec<ReadSet>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventPayload {
    pub version: String,
    pub data: PayloadData,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadData {
    pub tags: PayloadTags,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayloadTags {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instrument_run_id: Option<String>,
    pub library_id_list: Vec<LibraryId>,
}

/// Per-draft build options, derived from the family (or run-QC) config and
/// the triggering request.
#[derive(Debug, Clone, Default)]
pub struct DraftOptions {
    pub attach_readsets: bool,
    pub payload_version: Option<String>,
    pub instrument_run_id: Option<String>,
    pub on_unresolved: UnresolvedPolicy,
}

/// Builds one canonical draft event per approved (workflow, analysis unit)
/// pair. Every build allocates a fresh portal run id; nothing is cached
/// across calls, so reprocessing the same unit yields structurally identical
/// drafts that differ only in `portalRunId`/`workflowRunName`.
pub struct DraftEventBuilder<'a, W: WorkflowClient> {
    workflow: &'a W,
}

impl<'a, W: WorkflowClient> DraftEventBuilder<'a, W> {
    pub fn new(workflow: &'a W) -> Self {
        Self { workflow }
    }

    pub fn build(
        &self,
        selector: &WorkflowSelector,
        libraries: &[(Library, Vec<ReadSet>)],
        options: &DraftOptions,
    ) -> Result<WorkflowDraftEvent, GlueError> {
        let workflow = match self.workflow.find_workflow(selector)? {
            Some(descriptor) => descriptor,
            None => match options.on_unresolved {
                UnresolvedPolicy::Fail => {
                    return Err(GlueError::WorkflowNotFound {
                        name: selector.name.clone(),
                        version: selector.version.clone(),
                    });
                }
                UnresolvedPolicy::Placeholder => WorkflowDescriptor::placeholder(selector),
            },
        };

        let portal_run_id = self.workflow.allocate_portal_run_id()?;
        let run_name = workflow_run_name(&selector.name, &selector.version, &portal_run_id);

        let event_libraries = libraries
            .iter()
            .filter_map(|(library, readsets)| {
                if options.attach_readsets {
                    // A library with no readsets never appears in an
                    // annotated draft.
                    if readsets.is_empty() {
                        return None;
                    }
                    Some(EventLibrary {
                        library_id: library.library_id.clone(),
                        orcabus_id: library.orcabus_id.clone(),
                        readsets: Some(readsets.clone()),
                    })
                } else {
                    Some(EventLibrary {
                        library_id: library.library_id.clone(),
                        orcabus_id: library.orcabus_id.clone(),
                        readsets: None,
                    })
                }
            })
            .collect();

        let payload = options.payload_version.as_ref().map(|version| EventPayload {
            version: version.clone(),
            data: PayloadData {
                tags: PayloadTags {
                    instrument_run_id: options.instrument_run_id.clone(),
                    library_id_list: libraries
                        .iter()
                        .map(|(library, _)| library.library_id.clone())
                        .collect(),
                },
            },
        });

        Ok(WorkflowDraftEvent {
            status: DRAFT_STATUS.to_string(),
            workflow,
            workflow_run_name: run_name,
            portal_run_id,
            libraries: event_libraries,
            payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use assert_matches::assert_matches;

    use super::*;
    use crate::domain::{Phenotype, ProcessingClass, Rgid, SampleType, SubjectRef};
    use crate::workflow::{RunHistoryQuery, WorkflowRunDetail};

    struct MockWorkflow {
        registered: bool,
        allocated: Mutex<u32>,
    }

    impl MockWorkflow {
        fn new(registered: bool) -> Self {
            Self {
                registered,
                allocated: Mutex::new(0),
            }
        }
    }

    impl WorkflowClient for MockWorkflow {
        fn find_workflow(
            &self,
            selector: &WorkflowSelector,
        ) -> Result<Option<WorkflowDescriptor>, GlueError> {
            if !self.registered {
                return Ok(None);
            }
            Ok(Some(WorkflowDescriptor {
                name: selector.name.clone(),
                version: selector.version.clone(),
                code_version: Some("abc123".to_string()),
                execution_engine: Some("seqera".to_string()),
                execution_engine_pipeline_id: None,
                validation_state: Some("validated".to_string()),
            }))
        }

        fn list_runs(&self, _query: &RunHistoryQuery) -> Result<Vec<WorkflowRunDetail>, GlueError> {
            Ok(Vec::new())
        }

        fn allocate_portal_run_id(&self) -> Result<PortalRunId, GlueError> {
            let mut guard = self.allocated.lock().unwrap();
            *guard += 1;
            format!("20250829{:08x}", *guard).parse()
        }
    }

    fn library(library_id: &str, suffix: &str) -> Library {
        Library {
            orcabus_id: OrcabusId::new(format!("lib.{suffix}")),
            library_id: library_id.parse().unwrap(),
            sample_type: SampleType::CtDna,
            phenotype: Phenotype::Tumor,
            processing_class: ProcessingClass::Research,
            subject: SubjectRef {
                orcabus_id: OrcabusId::new("sbj.0001"),
                subject_id: "SUBJ-001".to_string(),
            },
        }
    }

    fn readset(suffix: &str, index: &str) -> ReadSet {
        ReadSet {
            orcabus_id: OrcabusId::new(format!("fqr.{suffix}")),
            rgid: Rgid::compose(index, 1, "250101_A01052_0123_BHABCDXX"),
        }
    }

    #[test]
    fn builds_draft_with_resolved_workflow() {
        let client = MockWorkflow::new(true);
        let builder = DraftEventBuilder::new(&client);
        let selector = WorkflowSelector::new("dragen-tso500-ctdna", "2.6.1");
        let libraries = vec![(library("L1", "0001"), vec![readset("0001", "AA")])];

        let event = builder
            .build(&selector, &libraries, &DraftOptions::default())
            .unwrap();
        assert_eq!(event.status, "DRAFT");
        assert_eq!(event.workflow.code_version.as_deref(), Some("abc123"));
        assert_eq!(
            event.workflow_run_name,
            format!("dragen-tso500-ctdna--2.6.1--{}", event.portal_run_id)
        );
        assert_eq!(event.libraries.len(), 1);
        assert!(event.libraries[0].readsets.is_none());
        assert!(event.payload.is_none());
    }

    #[test]
    fn unresolved_workflow_fails_by_default() {
        let client = MockWorkflow::new(false);
        let builder = DraftEventBuilder::new(&client);
        let selector = WorkflowSelector::new("dragen-tso500-ctdna", "2.6.1");
        let libraries = vec![(library("L1", "0001"), Vec::new())];

        let err = builder
            .build(&selector, &libraries, &DraftOptions::default())
            .unwrap_err();
        assert_matches!(err, GlueError::WorkflowNotFound { .. });
    }

    #[test]
    fn unresolved_workflow_placeholder_policy_degrades() {
        let client = MockWorkflow::new(false);
        let builder = DraftEventBuilder::new(&client);
        let selector = WorkflowSelector::new("dragen-tso500-ctdna", "2.6.1");
        let libraries = vec![(library("L1", "0001"), Vec::new())];
        let options = DraftOptions {
            on_unresolved: UnresolvedPolicy::Placeholder,
            ..DraftOptions::default()
        };

        let event = builder.build(&selector, &libraries, &options).unwrap();
        assert_eq!(event.workflow.name, "dragen-tso500-ctdna");
        assert!(event.workflow.code_version.is_none());
    }

    #[test]
    fn annotated_draft_drops_libraries_without_readsets() {
        let client = MockWorkflow::new(true);
        let builder = DraftEventBuilder::new(&client);
        let selector = WorkflowSelector::new("dragen-tso500-ctdna", "2.6.1");
        let libraries = vec![
            (library("L1", "0001"), vec![readset("0001", "AA")]),
            (library("L2", "0002"), Vec::new()),
        ];
        let options = DraftOptions {
            attach_readsets: true,
            ..DraftOptions::default()
        };

        let event = builder.build(&selector, &libraries, &options).unwrap();
        assert_eq!(event.libraries.len(), 1);
        assert_eq!(event.libraries[0].library_id.as_str(), "L1");
        assert_eq!(
            event.libraries[0].readsets.as_ref().map(Vec::len),
            Some(1)
        );
    }

    #[test]
    fn payload_tags_carry_run_and_library_ids() {
        let client = MockWorkflow::new(true);
        let builder = DraftEventBuilder::new(&client);
        let selector = WorkflowSelector::new("bclconvert-interop-qc", "1.3.1");
        let libraries = vec![
            (library("L1", "0001"), Vec::new()),
            (library("L2", "0002"), Vec::new()),
        ];
        let options = DraftOptions {
            payload_version: Some("2024.07.01".to_string()),
            instrument_run_id: Some("250101_A01052_0123_BHABCDXX".to_string()),
            ..DraftOptions::default()
        };

        let event = builder.build(&selector, &libraries, &options).unwrap();
        let payload = event.payload.unwrap();
        assert_eq!(payload.version, "2024.07.01");
        assert_eq!(
            payload.data.tags.instrument_run_id.as_deref(),
            Some("250101_A01052_0123_BHABCDXX")
        );
        assert_eq!(payload.data.tags.library_id_list.len(), 2);
    }

    #[test]
    fn reprocessing_allocates_fresh_portal_run_id() {
        let client = MockWorkflow::new(true);
        let builder = DraftEventBuilder::new(&client);
        let selector = WorkflowSelector::new("sash", "0.6.0");
        let libraries = vec![(library("L1", "0001"), Vec::new())];

        let first = builder
            .build(&selector, &libraries, &DraftOptions::default())
            .unwrap();
        let second = builder
            .build(&selector, &libraries, &DraftOptions::default())
            .unwrap();
        assert_ne!(first.portal_run_id, second.portal_run_id);
        assert_ne!(first.workflow_run_name, second.workflow_run_name);
        assert_eq!(first.workflow, second.workflow);
        assert_eq!(first.libraries, second.libraries);
    }

    #[test]
    fn draft_serializes_to_wire_shape() {
        let client = MockWorkflow::new(true);
        let builder = DraftEventBuilder::new(&client);
        let selector = WorkflowSelector::new("dragen-tso500-ctdna", "2.6.1");
        let libraries = vec![(library("L1", "0001"), vec![readset("0001", "AA")])];
        let options = DraftOptions {
            attach_readsets: true,
            ..DraftOptions::default()
        };

        let event = builder.build(&selector, &libraries, &options).unwrap();
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["status"], "DRAFT");
        assert_eq!(value["workflow"]["name"], "dragen-tso500-ctdna");
        assert!(value["workflowRunName"].is_string());
        assert!(value["portalRunId"].is_string());
        assert_eq!(value["libraries"][0]["libraryId"], "L1");
        assert_eq!(
            value["libraries"][0]["readsets"][0]["rgid"],
            "AA.1.250101_A01052_0123_BHABCDXX"
        );
        assert!(value.get("payload").is_none());
    }
}
