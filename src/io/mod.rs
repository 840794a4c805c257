pub mod output;
pub mod request;

pub use output::{write_envelope, write_envelope_to};
pub use request::{PipelineRequest, SUPPORTED_LANGUAGES};
