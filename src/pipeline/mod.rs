//! Stage sequencing and the caller-visible result envelope.

pub mod envelope;
pub mod orchestrator;

pub use envelope::*;
pub use orchestrator::*;
