use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use medscribe::{
    build_envelope, build_pipeline, write_envelope_to, AppConfig, Envelope, PipelineRequest,
    StageName,
};

#[derive(Parser)]
#[command(name = "medscribe")]
#[command(author, version, about = "Consultation audio and text to ICD-10 diagnoses and treatment plans", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline on audio, free text, or a JSON request file
    Run {
        /// Consultation text to analyze
        #[arg(long, conflicts_with_all = ["audio_url", "input"])]
        text: Option<String>,

        /// URL of consultation audio to transcribe first
        #[arg(long, conflicts_with = "input")]
        audio_url: Option<String>,

        /// JSON request file ({audio_url | text | medical_info, ...})
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Audio language (spanish, english, french, german, italian)
        #[arg(long)]
        language: Option<String>,

        /// Maximum audio duration in seconds
        #[arg(long)]
        max_duration: Option<u32>,

        /// Maximum number of diagnoses (1-5)
        #[arg(long)]
        max_diagnoses: Option<u8>,

        /// Only report the primary diagnosis
        #[arg(long)]
        no_differential: bool,

        /// Write the result envelope here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Report which remote services are configured
    Health {
        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = AppConfig::from_env().context("Failed to load configuration")?;

    match cli.command {
        Commands::Run {
            text,
            audio_url,
            input,
            language,
            max_duration,
            max_diagnoses,
            no_differential,
            output,
            verbose,
        } => {
            setup_logging(verbose, &config.log_level);
            let request = match input {
                Some(path) => {
                    info!("Loading request from {:?}", path);
                    PipelineRequest::from_file(&path)
                }
                None => Ok(PipelineRequest {
                    audio_url,
                    language,
                    max_duration,
                    text,
                    medical_info: None,
                    include_differential: Some(!no_differential),
                    max_diagnoses,
                }),
            };
            run_pipeline(&config, request, output).await
        }
        Commands::Health { verbose } => {
            setup_logging(verbose, &config.log_level);
            let pipeline = build_pipeline(&config)?;
            let report = pipeline.health();
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Logs go to stderr so stdout carries only the envelope
fn setup_logging(verbose: bool, log_level: &str) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_new(log_level.to_lowercase()).unwrap_or_else(|_| EnvFilter::new("info"))
    };
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();
}

async fn run_pipeline(
    config: &AppConfig,
    request: medscribe::PipelineResult<PipelineRequest>,
    output: Option<PathBuf>,
) -> Result<ExitCode> {
    let pipeline = build_pipeline(config)?;
    let health = pipeline.health();
    if !health.extractor_ready || !health.transcriber_ready {
        warn!("OPENAI_API_KEY not set; transcription, extraction and diagnosis are unavailable");
    }
    if !health.treatment_ready {
        warn!("PERPLEXITY_API_KEY not set; treatment recommendations are unavailable");
    }

    let envelope = match request.and_then(|r| r.validate(config.max_audio_duration)) {
        Ok((input, options)) => {
            let progress = |stage: StageName| {
                let step = match stage {
                    StageName::Transcription => 1,
                    StageName::Extraction => 2,
                    StageName::Diagnosis => 3,
                };
                info!("Step {}/3: {}", step, stage);
            };
            let run = pipeline.run(input, &options, Some(&progress)).await;
            build_envelope(&run)
        }
        Err(e) => {
            warn!("Rejected request: {}", e);
            Envelope::from_error(&e)
        }
    };

    write_envelope_to(&envelope, output.as_deref())?;
    if let Some(path) = &output {
        info!("Result written to {:?}", path);
    }

    let status = envelope.status_code();
    info!("Finished with status {}", status);
    Ok(if envelope.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
