use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum GlueError {
    #[error("invalid library id: {0}")]
    InvalidLibraryId(String),

    #[error("invalid instrument run id: {0}")]
    InvalidInstrumentRunId(String),

    #[error("invalid portal run id: {0}")]
    InvalidPortalRunId(String),

    #[error("invalid workflow run name: {0}")]
    InvalidWorkflowRunName(String),

    #[error("request must supply at least one library id")]
    EmptyLibraryList,

    #[error("no libraries found in the metadata catalog for: {0}")]
    UnknownLibraries(String),

    #[error("no sequence found for instrument run id: {0}")]
    RunNotFound(String),

    #[error("workflow {name} version {version} not found in the workflow registry")]
    WorkflowNotFound { name: String, version: String },

    #[error("run QC workflow is not configured")]
    RunQcNotConfigured,

    #[error("missing config file analysis-glue.json in current directory")]
    MissingConfig,

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("metadata request failed: {0}")]
    MetadataHttp(String),

    #[error("metadata service returned status {status}: {message}")]
    MetadataStatus { status: u16, message: String },

    #[error("sequence request failed: {0}")]
    SequenceHttp(String),

    #[error("sequence service returned status {status}: {message}")]
    SequenceStatus { status: u16, message: String },

    #[error("fastq request failed: {0}")]
    FastqHttp(String),

    #[error("fastq service returned status {status}: {message}")]
    FastqStatus { status: u16, message: String },

    #[error("workflow request failed: {0}")]
    WorkflowHttp(String),

    #[error("workflow service returned status {status}: {message}")]
    WorkflowStatus { status: u16, message: String },
}
