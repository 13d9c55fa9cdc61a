use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use analysis_glue::config::ConfigLoader;
use analysis_glue::domain::{LibraryId, SampleType};
use analysis_glue::engine::{Engine, EventListResponse, EventResponse, SubjectListResponse};
use analysis_glue::error::GlueError;
use analysis_glue::fastq::FastqHttpClient;
use analysis_glue::metadata::MetadataHttpClient;
use analysis_glue::output::JsonOutput;
use analysis_glue::sequence::SequenceHttpClient;
use analysis_glue::workflow::WorkflowHttpClient;

#[derive(Parser)]
#[command(name = "analysis-glue")]
#[command(about = "Pairs sequenced libraries across runs and emits idempotent draft analysis events")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Emit draft events for libraries or a whole sequencing run")]
    Trigger(TriggerArgs),
    #[command(about = "List subject ids present on a sequencing run")]
    Subjects(SubjectsArgs),
    #[command(about = "Emit the run-level QC draft event for a sequencing run")]
    RunQc(RunQcArgs),
}

#[derive(Args)]
struct TriggerArgs {
    /// Library business ids, mutually exclusive with --instrument-run-id.
    #[arg(conflicts_with = "instrument_run_id")]
    library_ids: Vec<String>,

    #[arg(long)]
    instrument_run_id: Option<String>,

    /// Restrict a run trigger to these sample types (e.g. WGS, WTS, ctDNA).
    #[arg(long = "sample-type", requires = "instrument_run_id")]
    sample_types: Vec<String>,
}

#[derive(Args)]
struct SubjectsArgs {
    instrument_run_id: String,

    #[arg(long = "sample-type")]
    sample_types: Vec<String>,
}

#[derive(Args)]
struct RunQcArgs {
    instrument_run_id: String,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(glue) = report.downcast_ref::<GlueError>() {
            return ExitCode::from(map_exit_code(glue));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &GlueError) -> u8 {
    match error {
        GlueError::WorkflowNotFound { .. }
        | GlueError::RunQcNotConfigured
        | GlueError::MissingConfig
        | GlueError::ConfigRead(_)
        | GlueError::ConfigParse(_) => 2,
        GlueError::MetadataHttp(_)
        | GlueError::MetadataStatus { .. }
        | GlueError::SequenceHttp(_)
        | GlueError::SequenceStatus { .. }
        | GlueError::FastqHttp(_)
        | GlueError::FastqStatus { .. }
        | GlueError::WorkflowHttp(_)
        | GlueError::WorkflowStatus { .. } => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = ConfigLoader::resolve(cli.config.as_deref()).into_diagnostic()?;

    let metadata = MetadataHttpClient::new(&config.endpoints.metadata).into_diagnostic()?;
    let sequence = SequenceHttpClient::new(&config.endpoints.sequence).into_diagnostic()?;
    let fastq = FastqHttpClient::new(&config.endpoints.fastq).into_diagnostic()?;
    let workflow = WorkflowHttpClient::new(&config.endpoints.workflow).into_diagnostic()?;
    let engine = Engine::new(config, metadata, sequence, fastq, workflow);

    match cli.command {
        Commands::Trigger(args) => run_trigger(args, &engine),
        Commands::Subjects(args) => run_subjects(args, &engine),
        Commands::RunQc(args) => run_run_qc(args, &engine),
    }
}

fn run_trigger(
    args: TriggerArgs,
    engine: &Engine<MetadataHttpClient, SequenceHttpClient, FastqHttpClient, WorkflowHttpClient>,
) -> miette::Result<()> {
    let events = match args.instrument_run_id {
        Some(instrument_run_id) => {
            let sample_types = parse_sample_types(&args.sample_types);
            engine
                .trigger_run(&instrument_run_id, &sample_types)
                .into_diagnostic()?
        }
        None => {
            let library_ids = args
                .library_ids
                .iter()
                .map(|id| id.parse::<LibraryId>())
                .collect::<Result<Vec<_>, _>>()
                .into_diagnostic()?;
            engine.trigger_libraries(&library_ids).into_diagnostic()?
        }
    };

    JsonOutput::print_events(&EventListResponse {
        event_detail_list: events,
    })
    .into_diagnostic()
}

fn run_subjects(
    args: SubjectsArgs,
    engine: &Engine<MetadataHttpClient, SequenceHttpClient, FastqHttpClient, WorkflowHttpClient>,
) -> miette::Result<()> {
    let sample_types = parse_sample_types(&args.sample_types);
    let subjects = engine
        .list_subjects(&args.instrument_run_id, &sample_types)
        .into_diagnostic()?;

    JsonOutput::print_subjects(&SubjectListResponse {
        subject_id_list: subjects,
    })
    .into_diagnostic()
}

fn run_run_qc(
    args: RunQcArgs,
    engine: &Engine<MetadataHttpClient, SequenceHttpClient, FastqHttpClient, WorkflowHttpClient>,
) -> miette::Result<()> {
    let event = engine
        .run_qc_draft(&args.instrument_run_id)
        .into_diagnostic()?;

    JsonOutput::print_event(&EventResponse {
        event_detail: event,
    })
    .into_diagnostic()
}

fn parse_sample_types(raw: &[String]) -> Vec<SampleType> {
    raw.iter().map(|value| SampleType::from(value.clone())).collect()
}
