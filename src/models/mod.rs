pub mod diagnosis;
pub mod patient;
pub mod run;
pub mod transcription;

pub use diagnosis::*;
pub use patient::*;
pub use run::*;
pub use transcription::*;
