use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::domain::{ProcessingClass, SampleType};
use crate::error::GlueError;
use crate::workflow::WorkflowSelector;

/// How the Pairing Selector combines libraries for a family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PairingMode {
    /// Every tumor of the family's sample type yields a solo unit.
    TumorOnly,
    /// Tumor/normal pairs, backfilled across runs when one side is missing.
    TumorNormal,
    /// Tumor DNA + normal DNA + tumor RNA triples.
    TumorNormalRna,
}

/// Policy for a registry lookup that matches no workflow. Hard fail is the
/// correct behavior; the placeholder fallback exists for early-phase call
/// sites and degrades the event to a name+version-only descriptor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UnresolvedPolicy {
    #[default]
    Fail,
    Placeholder,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub endpoints: Endpoints,
    #[serde(default)]
    pub families: Vec<FamilyEntry>,
    #[serde(default)]
    pub run_qc: Option<RunQcEntry>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoints {
    #[serde(default = "default_metadata_url")]
    pub metadata: String,
    #[serde(default = "default_sequence_url")]
    pub sequence: String,
    #[serde(default = "default_fastq_url")]
    pub fastq: String,
    #[serde(default = "default_workflow_url")]
    pub workflow: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            metadata: default_metadata_url(),
            sequence: default_sequence_url(),
            fastq: default_fastq_url(),
            workflow: default_workflow_url(),
        }
    }
}

fn default_metadata_url() -> String {
    "http://localhost:8100/api/v1".to_string()
}

fn default_sequence_url() -> String {
    "http://localhost:8200/api/v1".to_string()
}

fn default_fastq_url() -> String {
    "http://localhost:8300/api/v1".to_string()
}

fn default_workflow_url() -> String {
    "http://localhost:8400/api/v1".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FamilyEntry {
    pub name: String,
    pub sample_type: String,
    #[serde(default)]
    pub rna_sample_type: Option<String>,
    pub pairing: PairingMode,
    #[serde(default = "default_germline_only")]
    pub germline_only_classes: Vec<String>,
    pub workflows: Vec<WorkflowEntry>,
    #[serde(default)]
    pub baseline_workflow: Option<WorkflowEntry>,
    #[serde(default)]
    pub attach_readsets: bool,
    #[serde(default)]
    pub payload_version: Option<String>,
    #[serde(default)]
    pub on_unresolved: UnresolvedPolicy,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkflowEntry {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunQcEntry {
    pub workflow: WorkflowEntry,
    pub payload_version: String,
}

/// One sample-type family, fully resolved into domain types: which libraries
/// it selects, how it pairs them, and which workflows each unit launches.
#[derive(Debug, Clone)]
pub struct FamilyConfig {
    pub name: String,
    pub sample_type: SampleType,
    pub rna_sample_type: Option<SampleType>,
    pub pairing: PairingMode,
    pub germline_only_classes: Vec<ProcessingClass>,
    pub workflows: Vec<WorkflowSelector>,
    pub baseline_workflow: Option<WorkflowSelector>,
    pub attach_readsets: bool,
    pub payload_version: Option<String>,
    pub on_unresolved: UnresolvedPolicy,
}

impl FamilyConfig {
    pub fn is_germline_only(&self, class: &ProcessingClass) -> bool {
        self.germline_only_classes.contains(class)
    }
}

#[derive(Debug, Clone)]
pub struct RunQcConfig {
    pub workflow: WorkflowSelector,
    pub payload_version: String,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub endpoints: Endpoints,
    pub families: Vec<FamilyConfig>,
    pub run_qc: Option<RunQcConfig>,
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, GlueError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from("analysis-glue.json"),
        };

        if path.is_none() && !config_path.exists() {
            return Err(GlueError::MissingConfig);
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| GlueError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| GlueError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, GlueError> {
        let schema_version = config.schema_version.unwrap_or(1);

        let families = config
            .families
            .into_iter()
            .map(resolve_family)
            .collect::<Result<Vec<_>, GlueError>>()?;

        let run_qc = config.run_qc.map(|entry| RunQcConfig {
            workflow: WorkflowSelector::new(entry.workflow.name, entry.workflow.version),
            payload_version: entry.payload_version,
        });

        Ok(ResolvedConfig {
            schema_version,
            endpoints: config.endpoints,
            families,
            run_qc,
        })
    }
}

fn resolve_family(entry: FamilyEntry) -> Result<FamilyConfig, GlueError> {
    let sample_type: SampleType = entry.sample_type.parse()?;
    let rna_sample_type = entry
        .rna_sample_type
        .map(|value| value.parse::<SampleType>())
        .transpose()?;

    if entry.pairing == PairingMode::TumorNormalRna && rna_sample_type.is_none() {
        return Err(GlueError::ConfigParse(format!(
            "family {} uses tumorNormalRna pairing but has no rnaSampleType",
            entry.name
        )));
    }
    if entry.workflows.is_empty() {
        return Err(GlueError::ConfigParse(format!(
            "family {} has an empty workflow set",
            entry.name
        )));
    }

    Ok(FamilyConfig {
        name: entry.name,
        sample_type,
        rna_sample_type,
        pairing: entry.pairing,
        germline_only_classes: entry
            .germline_only_classes
            .into_iter()
            .map(ProcessingClass::from)
            .collect(),
        workflows: entry
            .workflows
            .into_iter()
            .map(|workflow| WorkflowSelector::new(workflow.name, workflow.version))
            .collect(),
        baseline_workflow: entry
            .baseline_workflow
            .map(|workflow| WorkflowSelector::new(workflow.name, workflow.version)),
        attach_readsets: entry.attach_readsets,
        payload_version: entry.payload_version,
        on_unresolved: entry.on_unresolved,
    })
}

pub fn default_germline_only() -> Vec<String> {
    vec![
        "BatchControl".to_string(),
        "control".to_string(),
        "germline".to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn resolve_family_config() {
        let config: Config = serde_json::from_str(
            r#"{
                "families": [
                    {
                        "name": "wgs",
                        "sampleType": "WGS",
                        "pairing": "tumorNormal",
                        "workflows": [
                            { "name": "dragen-wgts-dna", "version": "4.4.4" },
                            { "name": "oncoanalyser-wgts-dna", "version": "2.0.0" },
                            { "name": "sash", "version": "0.6.0" }
                        ],
                        "baselineWorkflow": { "name": "dragen-wgts-dna", "version": "4.4.4" }
                    }
                ]
            }"#,
        )
        .unwrap();

        let resolved = ConfigLoader::resolve_config(config).unwrap();
        assert_eq!(resolved.schema_version, 1);
        assert_eq!(resolved.families.len(), 1);

        let family = &resolved.families[0];
        assert_eq!(family.sample_type, SampleType::Wgs);
        assert_eq!(family.pairing, PairingMode::TumorNormal);
        assert_eq!(family.workflows.len(), 3);
        assert!(family.is_germline_only(&ProcessingClass::BatchControl));
        assert!(!family.is_germline_only(&ProcessingClass::Research));
        assert_eq!(family.on_unresolved, UnresolvedPolicy::Fail);
    }

    #[test]
    fn combined_family_requires_rna_sample_type() {
        let config: Config = serde_json::from_str(
            r#"{
                "families": [
                    {
                        "name": "wgts",
                        "sampleType": "WGS",
                        "pairing": "tumorNormalRna",
                        "workflows": [
                            { "name": "oncoanalyser-wgts-dna-rna", "version": "2.0.0" }
                        ]
                    }
                ]
            }"#,
        )
        .unwrap();

        assert_matches!(
            ConfigLoader::resolve_config(config),
            Err(GlueError::ConfigParse(_))
        );
    }

    #[test]
    fn endpoints_default_when_omitted() {
        let config: Config = serde_json::from_str(r#"{ "families": [] }"#).unwrap();
        let resolved = ConfigLoader::resolve_config(config).unwrap();
        assert_eq!(resolved.endpoints.metadata, "http://localhost:8100/api/v1");
        assert_eq!(resolved.endpoints.workflow, "http://localhost:8400/api/v1");
    }
}
