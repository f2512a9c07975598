use thiserror::Error;

use crate::types::{ConfigurationError, EvaluationError, RecursionLimitError};

/// Unified error type for rule processing and tree walking.
///
/// Returned by [`RuleEngine::process()`](crate::RuleEngine::process) and
/// [`FormWalker::walk()`](crate::FormWalker::walk).
#[derive(Debug, Error)]
pub enum FormRuleError {
    #[error(transparent)]
    Evaluation(#[from] EvaluationError),

    #[error(transparent)]
    RecursionLimit(#[from] RecursionLimitError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}
