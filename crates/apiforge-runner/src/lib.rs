//! apiforge-runner: spec resolution, test generation and live execution
//!
//! Pipeline: [`SpecResolver`] → [`HeuristicGenerator`] / [`LlmSynthesizer`]
//! → [`ExecutionEngine`].

pub mod datagen;
pub mod engine;
pub mod generate;
pub mod llm;
pub mod spec;

pub use datagen::{PayloadSynthesizer, SamplePayload};
pub use engine::{
    AuthProfile, CredentialDecryptor, DecryptionError, ExecutionEngine, ExecutionError,
    NoProgress, PlaintextCredentials, ProgressSink, ReplayOverrides, SuiteStatus,
};
pub use generate::HeuristicGenerator;
pub use llm::{GenerationError, LlmSynthesizer, TextGenerator};
pub use spec::{EndpointDescriptor, ReferenceError, ResolvedSpec, SchemaError, SpecResolver};

use apiforge_core::ConfigError;

/// Any failure of the generate/execute pipeline.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Reference(#[from] ReferenceError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error(transparent)]
    Decryption(#[from] DecryptionError),
    #[error(transparent)]
    Execution(#[from] ExecutionError),
}
