use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{FamilyConfig, ResolvedConfig};
use crate::dedup::{DedupFilter, IdempotencyKey};
use crate::domain::{AnalysisUnit, Library, LibraryId, OrcabusId, ReadSet, SampleType};
use crate::error::GlueError;
use crate::event::{DraftEventBuilder, DraftOptions, WorkflowDraftEvent};
use crate::fastq::FastqClient;
use crate::metadata::MetadataClient;
use crate::pairing::PairingSelector;
use crate::sequence::SequenceClient;
use crate::workflow::{WorkflowClient, WorkflowSelector};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventListResponse {
    pub event_detail_list: Vec<WorkflowDraftEvent>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventResponse {
    pub event_detail: WorkflowDraftEvent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectListResponse {
    pub subject_id_list: Vec<String>,
}

/// The decision and emission engine. Stateless: every invocation is a pure
/// function of the request and the collaborator snapshots at call time, and
/// the only persisted truth it consults is the remote run history.
pub struct Engine<M, S, F, W> {
    config: ResolvedConfig,
    metadata: M,
    sequence: S,
    fastq: F,
    workflow: W,
}

impl<M, S, F, W> Engine<M, S, F, W>
where
    M: MetadataClient,
    S: SequenceClient,
    F: FastqClient,
    W: WorkflowClient,
{
    pub fn new(config: ResolvedConfig, metadata: M, sequence: S, fastq: F, workflow: W) -> Self {
        Self {
            config,
            metadata,
            sequence,
            fastq,
            workflow,
        }
    }

    /// Drafts for an explicit list of library business ids.
    pub fn trigger_libraries(
        &self,
        library_ids: &[LibraryId],
    ) -> Result<Vec<WorkflowDraftEvent>, GlueError> {
        if library_ids.is_empty() {
            return Err(GlueError::EmptyLibraryList);
        }
        let libraries = self.metadata.libraries_by_id(library_ids)?;
        if libraries.is_empty() {
            return Err(GlueError::UnknownLibraries(
                library_ids
                    .iter()
                    .map(LibraryId::as_str)
                    .collect::<Vec<_>>()
                    .join(", "),
            ));
        }
        self.trigger_resolved(libraries, None)
    }

    /// Drafts for every library on a sequencing run, optionally filtered to a
    /// set of sample types. A run whose libraries all fall outside the filter
    /// legitimately yields an empty list.
    pub fn trigger_run(
        &self,
        instrument_run_id: &str,
        sample_types: &[SampleType],
    ) -> Result<Vec<WorkflowDraftEvent>, GlueError> {
        let libraries = self.libraries_on_run(instrument_run_id, sample_types)?;
        self.trigger_resolved(libraries, Some(instrument_run_id))
    }

    /// Sorted, de-duplicated subject business ids on a run.
    pub fn list_subjects(
        &self,
        instrument_run_id: &str,
        sample_types: &[SampleType],
    ) -> Result<Vec<String>, GlueError> {
        let libraries = self.libraries_on_run(instrument_run_id, sample_types)?;
        let subjects: BTreeSet<String> = libraries
            .into_iter()
            .map(|library| library.subject.subject_id)
            .collect();
        Ok(subjects.into_iter().collect())
    }

    /// Single run-level QC draft covering every library on the run.
    pub fn run_qc_draft(&self, instrument_run_id: &str) -> Result<WorkflowDraftEvent, GlueError> {
        let run_qc = self
            .config
            .run_qc
            .as_ref()
            .ok_or(GlueError::RunQcNotConfigured)?;
        let libraries = self.libraries_on_run(instrument_run_id, &[])?;
        let with_readsets: Vec<(Library, Vec<ReadSet>)> = libraries
            .into_iter()
            .map(|library| (library, Vec::new()))
            .collect();

        let builder = DraftEventBuilder::new(&self.workflow);
        builder.build(
            &run_qc.workflow,
            &with_readsets,
            &DraftOptions {
                attach_readsets: false,
                payload_version: Some(run_qc.payload_version.clone()),
                instrument_run_id: Some(instrument_run_id.to_string()),
                on_unresolved: Default::default(),
            },
        )
    }

    fn libraries_on_run(
        &self,
        instrument_run_id: &str,
        sample_types: &[SampleType],
    ) -> Result<Vec<Library>, GlueError> {
        if instrument_run_id.trim().is_empty() {
            return Err(GlueError::InvalidInstrumentRunId(
                instrument_run_id.to_string(),
            ));
        }
        let mut ids = self.sequence.library_ids_on_run(instrument_run_id)?;
        ids.sort();
        ids.dedup();
        let libraries = self.metadata.libraries_by_id(&ids)?;
        if sample_types.is_empty() {
            return Ok(libraries);
        }
        Ok(libraries
            .into_iter()
            .filter(|library| sample_types.contains(&library.sample_type))
            .collect())
    }

    fn trigger_resolved(
        &self,
        libraries: Vec<Library>,
        instrument_run_id: Option<&str>,
    ) -> Result<Vec<WorkflowDraftEvent>, GlueError> {
        // The full catalog is the cross-run search space; fetched once per
        // request so every family sees the same snapshot.
        let catalog = self.metadata.all_libraries()?;

        let mut by_subject: BTreeMap<OrcabusId, Vec<Library>> = BTreeMap::new();
        for library in libraries {
            by_subject
                .entry(library.subject.orcabus_id.clone())
                .or_default()
                .push(library);
        }

        let mut events = Vec::new();
        for (subject_id, request_libraries) in &by_subject {
            let subject_history: Vec<Library> = catalog
                .iter()
                .filter(|library| &library.subject.orcabus_id == subject_id)
                .cloned()
                .collect();

            for family in &self.config.families {
                let selection =
                    PairingSelector::new(family).select(request_libraries, &subject_history);
                if selection.is_empty() {
                    continue;
                }
                debug!(
                    subject = %subject_id,
                    family = %family.name,
                    units = selection.units.len(),
                    baseline = selection.baseline.len(),
                    "emitting drafts"
                );

                for unit in &selection.baseline {
                    if let Some(baseline) = &family.baseline_workflow {
                        self.emit_unit(
                            unit,
                            std::slice::from_ref(baseline),
                            family,
                            instrument_run_id,
                            &mut events,
                        )?;
                    }
                }
                for unit in &selection.units {
                    self.emit_unit(unit, &family.workflows, family, instrument_run_id, &mut events)?;
                }
            }
        }
        Ok(events)
    }

    /// Dedup-then-build for one unit across a workflow set. Suppressed
    /// duplicates are omitted from the output, not emitted as nulls.
    fn emit_unit(
        &self,
        unit: &AnalysisUnit,
        workflows: &[WorkflowSelector],
        family: &FamilyConfig,
        instrument_run_id: Option<&str>,
        events: &mut Vec<WorkflowDraftEvent>,
    ) -> Result<(), GlueError> {
        let with_readsets = self.unit_readsets(unit)?;
        let all_readsets: Vec<ReadSet> = with_readsets
            .iter()
            .flat_map(|(_, readsets)| readsets.iter().cloned())
            .collect();

        let dedup = DedupFilter::new(&self.workflow);
        let builder = DraftEventBuilder::new(&self.workflow);
        let options = DraftOptions {
            attach_readsets: family.attach_readsets,
            payload_version: family.payload_version.clone(),
            instrument_run_id: instrument_run_id.map(str::to_string),
            on_unresolved: family.on_unresolved,
        };

        for selector in workflows {
            let key = IdempotencyKey::new(selector, unit, &all_readsets);
            if dedup.already_run(&key)? {
                continue;
            }
            events.push(builder.build(selector, &with_readsets, &options)?);
        }
        Ok(())
    }

    fn unit_readsets(&self, unit: &AnalysisUnit) -> Result<Vec<(Library, Vec<ReadSet>)>, GlueError> {
        unit.libraries()
            .into_iter()
            .map(|library| {
                let readsets = self.fastq.readsets_in_library(&library.library_id)?;
                Ok((library.clone(), readsets))
            })
            .collect()
    }
}
