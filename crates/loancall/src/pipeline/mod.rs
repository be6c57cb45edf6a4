pub mod config;
pub mod context;
pub mod error;
pub mod outcome;
pub mod runner;

pub use config::PipelineConfig;
pub use context::PipelineContext;
pub use error::{PipelineError, StepFailure};
pub use outcome::{ProcessOutcome, RecoveryReport};
pub use runner::CallPipeline;
