mod clone;
mod engine;
mod error;
mod evaluate;
mod merge;
pub mod parse;
mod types;
mod walk;

pub use clone::StructuralCloner;
pub use engine::RuleEngine;
pub use error::FormRuleError;
pub use evaluate::{ExpressionEvaluator, Interpreter, MAX_SEQUENCE_GROWTH};
pub use merge::{StructuralMerger, merge};
pub use parse::ParseError;
pub use types::{
    ArrayMerger, BINDING_NAMES, BinaryOp, CloneOptions, ConfigurationError, Context,
    DEFAULT_MAX_DEPTH, EngineConfig, EvaluationError, EvaluationErrorKind, Expr, FormRule, Kind,
    Literal, LogicalOp, Map, Mapping, MergeOptions, OPTIONS_KEY, Opaque, Operation, ProcessReport,
    Program, Property, RESERVED_KEYS, RULES_KEY, RecursionLimitError, RuleOutcome, Sequence,
    UnaryOp, Value, WalkOptions,
};
pub use walk::{FormWalker, NodeKind, PreVisitHook};
