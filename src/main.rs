use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use lab_ingest::config::{ConfigError, IngestConfig, APP_VERSION};
use lab_ingest::db::{DatabaseError, SqliteLabStore};
use lab_ingest::models::Patient;
use lab_ingest::pipeline::extraction::{
    DocumentExtractor, ExtractionError, FileDocumentExtractor, HttpDocumentExtractor,
};
use lab_ingest::pipeline::labs::{CreateFromDocumentInput, IngestError, LabIngestor};
use lab_ingest::pipeline::CancelToken;

#[derive(Parser)]
#[command(name = "lab-ingest")]
#[command(about = "Ingest lab report documents into structured patient records")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a patient
    AddPatient {
        /// Full name
        full_name: String,
        /// Date of birth (YYYY-MM-DD)
        #[arg(long)]
        birth_date: Option<NaiveDate>,
    },
    /// Ingest one lab report document
    Ingest {
        patient_id: Uuid,
        /// User performing the upload
        uploaded_by: Uuid,
        /// Document location (extraction service URI or local path)
        document_uri: String,
        /// Guessed from the document extension when omitted
        #[arg(long)]
        mime_type: Option<String>,
        /// Abort the ingestion after this many seconds
        #[arg(long)]
        deadline_secs: Option<u64>,
    },
    /// Show one stored report
    Get { report_id: Uuid },
    /// List a patient's reports, newest first
    List {
        patient_id: Uuid,
        #[arg(long, default_value_t = 20)]
        limit: i64,
        #[arg(long, default_value_t = 0)]
        offset: i64,
        /// Full reports instead of summaries
        #[arg(long)]
        full: bool,
    },
    /// History of one parameter for a patient
    Timeline {
        patient_id: Uuid,
        parameter_name: String,
        #[arg(long, default_value_t = 50)]
        limit: i64,
        #[arg(long, default_value_t = 0)]
        offset: i64,
    },
}

#[derive(Error, Debug)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error("Cannot encode output: {0}")]
    Json(#[from] serde_json::Error),
}

fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = match IngestConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };
    lab_ingest::init_tracing(&config.log_filter);
    tracing::debug!(version = APP_VERSION, db = %config.db_path.display(), "lab-ingest starting");

    match run(cli.command, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(CliError::Ingest(e)) => {
            match serde_json::to_string_pretty(&e.to_body()) {
                Ok(body) => println!("{body}"),
                Err(_) => eprintln!("{}", e.public_message()),
            }
            ExitCode::FAILURE
        }
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Commands, config: &IngestConfig) -> Result<(), CliError> {
    let store = Arc::new(SqliteLabStore::open(&config.db_path)?);

    match command {
        Commands::AddPatient {
            full_name,
            birth_date,
        } => {
            let patient = Patient::new(full_name.trim(), birth_date);
            store.add_patient(&patient)?;
            print_json(&patient)
        }
        Commands::Ingest {
            patient_id,
            uploaded_by,
            document_uri,
            mime_type,
            deadline_secs,
        } => {
            let ingestor = LabIngestor::new(store.clone(), build_extractor(config)?, store);
            let mime_type = mime_type.unwrap_or_else(|| {
                mime_guess::from_path(&document_uri)
                    .first_or_octet_stream()
                    .essence_str()
                    .to_string()
            });
            let input = CreateFromDocumentInput {
                patient_id,
                document_uri,
                mime_type,
                uploaded_by_user_id: uploaded_by,
            };
            let cancel = match deadline_secs {
                Some(secs) => CancelToken::with_timeout(Duration::from_secs(secs)),
                None => CancelToken::new(),
            };
            print_json(&ingestor.execute(&input, &cancel)?)
        }
        Commands::Get { report_id } => {
            let ingestor = reader(store);
            print_json(&ingestor.get(&report_id)?)
        }
        Commands::List {
            patient_id,
            limit,
            offset,
            full,
        } => {
            let ingestor = reader(store);
            if full {
                print_json(&ingestor.list_full(&patient_id, limit, offset)?)
            } else {
                print_json(&ingestor.list_summaries(&patient_id, limit, offset)?)
            }
        }
        Commands::Timeline {
            patient_id,
            parameter_name,
            limit,
            offset,
        } => {
            let ingestor = reader(store);
            print_json(&ingestor.parameter_timeline(&patient_id, &parameter_name, limit, offset)?)
        }
    }
}

/// Ingestor for read commands. Reads never extract, so the extraction
/// service configuration is not consulted.
fn reader(store: Arc<SqliteLabStore>) -> LabIngestor {
    LabIngestor::new(store.clone(), Arc::new(FileDocumentExtractor::new(".")), store)
}

/// The configured extraction service, or local JSON graphs when none is set.
fn build_extractor(config: &IngestConfig) -> Result<Arc<dyn DocumentExtractor>, CliError> {
    match &config.extractor {
        Some(service) => {
            tracing::debug!(url = %service.base_url, processor = %service.processor_id, "Using extraction service");
            Ok(Arc::new(HttpDocumentExtractor::new(
                &service.base_url,
                &service.processor_id,
                service.timeout_secs,
            )?))
        }
        None => Ok(Arc::new(FileDocumentExtractor::new("."))),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use lab_ingest::config::ExtractorConfig;
    use lab_ingest::pipeline::labs::ErrorKind;

    use super::*;

    fn config_with_extractor(db_path: PathBuf) -> IngestConfig {
        IngestConfig {
            db_path,
            extractor: Some(ExtractorConfig {
                base_url: "http://127.0.0.1:1".into(),
                processor_id: "unused".into(),
                timeout_secs: 1,
            }),
            log_filter: "off".into(),
        }
    }

    #[test]
    fn read_commands_work_without_extraction() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_with_extractor(dir.path().join("labs.db"));
        let patient = Patient::new("Ana Souza", None);
        SqliteLabStore::open(&config.db_path)
            .unwrap()
            .add_patient(&patient)
            .unwrap();

        run(
            Commands::List {
                patient_id: patient.id,
                limit: 10,
                offset: 0,
                full: true,
            },
            &config,
        )
        .unwrap();
        run(
            Commands::Timeline {
                patient_id: patient.id,
                parameter_name: "Hemoglobina".into(),
                limit: 10,
                offset: 0,
            },
            &config,
        )
        .unwrap();

        match run(Commands::Get { report_id: Uuid::new_v4() }, &config) {
            Err(CliError::Ingest(e)) => assert_eq!(e.kind(), ErrorKind::NotFound),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn cli_parses_ingest_arguments() {
        let patient = Uuid::new_v4();
        let uploader = Uuid::new_v4();
        let cli = Cli::try_parse_from([
            "lab-ingest",
            "ingest",
            &patient.to_string(),
            &uploader.to_string(),
            "scan.pdf",
            "--deadline-secs",
            "30",
        ])
        .unwrap();
        match cli.command {
            Commands::Ingest {
                patient_id,
                document_uri,
                mime_type,
                deadline_secs,
                ..
            } => {
                assert_eq!(patient_id, patient);
                assert_eq!(document_uri, "scan.pdf");
                assert!(mime_type.is_none());
                assert_eq!(deadline_secs, Some(30));
            }
            _ => panic!("expected ingest"),
        }
    }
}
