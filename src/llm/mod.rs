pub mod client;
pub mod normalizer;
pub mod prompts;
pub mod validation;

pub use client::*;
pub use normalizer::*;
pub use prompts::*;
pub use validation::*;
