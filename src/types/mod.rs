mod config;
mod context;
mod error;
mod expr;
mod report;
mod rule;
mod value;

pub use config::{
    ArrayMerger, CloneOptions, DEFAULT_MAX_DEPTH, EngineConfig, MergeOptions, OPTIONS_KEY,
    RESERVED_KEYS, RULES_KEY, WalkOptions,
};
pub use context::{BINDING_NAMES, Context};
pub use error::{
    ConfigurationError, EvaluationError, EvaluationErrorKind, Operation, RecursionLimitError,
};
pub use expr::{BinaryOp, Expr, Literal, LogicalOp, Program, Property, UnaryOp};
pub use report::{ProcessReport, RuleOutcome};
pub use rule::FormRule;
pub use value::{Kind, Map, Mapping, Opaque, Sequence, Value};
