use std::fmt;

use thiserror::Error;

use crate::parse::ParseError;

/// An expression could not be parsed or failed while running.
///
/// Always carries the offending expression text.
#[derive(Debug, Error)]
#[error("error evaluating expression `{expression}`: {kind}")]
pub struct EvaluationError {
    expression: String,
    kind: EvaluationErrorKind,
}

impl EvaluationError {
    pub(crate) fn new(expression: impl Into<String>, kind: EvaluationErrorKind) -> Self {
        Self {
            expression: expression.into(),
            kind,
        }
    }

    /// The expression text that failed.
    #[must_use]
    pub fn expression(&self) -> &str {
        &self.expression
    }

    #[must_use]
    pub fn kind(&self) -> &EvaluationErrorKind {
        &self.kind
    }
}

#[derive(Debug, Error)]
pub enum EvaluationErrorKind {
    #[error(transparent)]
    Syntax(#[from] ParseError),

    #[error("{name} is not defined")]
    UndefinedIdentifier { name: String },

    #[error("cannot read property '{property}' of {target}")]
    PropertyOfNullish {
        property: String,
        target: &'static str,
    },

    #[error("cannot set property '{property}' on {target}")]
    InvalidTarget {
        property: String,
        target: &'static str,
    },

    #[error("'{method}' is not a supported method of {receiver}")]
    UnknownMethod {
        method: String,
        receiver: &'static str,
    },

    #[error("expression is not callable")]
    NotCallable,

    #[error("'{method}' expects {expected}")]
    InvalidArgument {
        method: String,
        expected: &'static str,
    },

    #[error("arrow functions are only allowed as callback arguments")]
    BareArrowFunction,
}

/// Which recursive operation hit its depth limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Clone,
    Merge,
    Walk,
    Serialize,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Clone => write!(f, "clone"),
            Operation::Merge => write!(f, "merge"),
            Operation::Walk => write!(f, "walk"),
            Operation::Serialize => write!(f, "serialize"),
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("{operation} exceeded the maximum depth of {limit}")]
pub struct RecursionLimitError {
    operation: Operation,
    limit: usize,
}

impl RecursionLimitError {
    pub(crate) fn new(operation: Operation, limit: usize) -> Self {
        Self { operation, limit }
    }

    #[must_use]
    pub fn operation(&self) -> Operation {
        self.operation
    }

    #[must_use]
    pub fn limit(&self) -> usize {
        self.limit
    }
}

/// A rule list or rule record is malformed.
#[derive(Debug, Clone, Error)]
pub enum ConfigurationError {
    #[error("formRules must be a sequence of rules, found {found}")]
    RulesNotSequence { found: &'static str },

    #[error("rule #{index} is not a rule record: {reason}")]
    InvalidRule { index: usize, reason: String },

    #[error("rule #{index} defines `{present}` without `{missing}`")]
    IncompleteRule {
        index: usize,
        present: &'static str,
        missing: &'static str,
    },
}
