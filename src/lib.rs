pub mod config;
pub mod error;
pub mod io;
pub mod llm;
pub mod models;
pub mod pipeline;
pub mod stages;

pub use config::{build_pipeline, AppConfig};
pub use error::{ErrorKind, PipelineError, PipelineResult};
pub use io::{write_envelope_to, PipelineRequest};
pub use llm::{ChatClient, ChatConfig};
pub use models::{
    AudioInput, Diagnosis, DiagnosisBundle, ExtractionResult, PipelineOptions, PipelineRun,
    StageName, Transcription, TreatmentItem,
};
pub use pipeline::{build_envelope, Envelope, HealthReport, Pipeline, PipelineInput, StageObserver};
pub use stages::{DiagnosisGenerator, Extractor, Transcriber, TreatmentRecommender};
