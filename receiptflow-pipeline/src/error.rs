//! Pipeline error types.

use receiptflow_core::CoreError;
use receiptflow_providers::FiscalLookupError;
use thiserror::Error;

use crate::events::ErrorStage;

/// Errors that end a pipeline invocation.
///
/// Enrichment failures are not among them: they degrade the receipt to
/// `failed` and still produce a result.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Input could not be understood. Raised before any external call or
    /// write.
    #[error("Invalid input: {0}")]
    Format(String),

    /// Every fiscal lookup attempt failed. Nothing was written.
    #[error(transparent)]
    FiscalLookup(#[from] FiscalLookupError),

    /// Repository failure.
    #[error("Repository error: {0}")]
    Repository(#[from] CoreError),
}

impl PipelineError {
    /// Returns the stage the error belongs to.
    pub fn stage(&self) -> ErrorStage {
        match self {
            PipelineError::Format(_) => ErrorStage::Validation,
            PipelineError::FiscalLookup(_) => ErrorStage::Fns,
            PipelineError::Repository(_) => ErrorStage::Storage,
        }
    }
}
