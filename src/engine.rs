use std::time::Instant;

use tracing::{debug, trace};

use crate::clone::StructuralCloner;
use crate::error::FormRuleError;
use crate::evaluate::{ExpressionEvaluator, Interpreter};
use crate::types::{
    CloneOptions, ConfigurationError, Context, EngineConfig, FormRule, OPTIONS_KEY,
    ProcessReport, RULES_KEY, RecursionLimitError, RuleOutcome, Sequence, Value,
};

/// Bindings whose children are replaced by fresh clones before an expression
/// that mentions them runs.
const ISOLATED_BINDINGS: [&str; 4] = ["schema", "uiSchema", "arrayUiSchema", "data"];

/// Runs the rules attached to a form node.
///
/// Rules are read from `uiSchema["ui:options"].formRules` and evaluated in
/// sequence order. Their `then`/`else` expressions mutate the context's
/// bound graphs in place; the engine itself returns nothing but errors.
///
/// # Examples
///
/// ```
/// use formrule::{Context, RuleEngine, Value};
/// use serde_json::json;
///
/// let ctx = Context::new()
///     .with_ui_schema(json!({
///         "ui:options": {"formRules": [{
///             "if": "data.age >= 18",
///             "then": "uiSchema.job = {}",
///             "else": "delete uiSchema.job"
///         }]}
///     }))
///     .with_data(json!({"age": 19}));
///
/// RuleEngine::new().process(&ctx).unwrap();
/// assert_eq!(ctx.ui_schema.get("job"), Value::mapping());
/// ```
#[derive(Debug)]
pub struct RuleEngine<E = Interpreter> {
    evaluator: E,
    config: EngineConfig,
    cloner: StructuralCloner,
}

impl RuleEngine<Interpreter> {
    /// An engine with the built-in [`Interpreter`] and default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::with_evaluator(Interpreter::new())
    }

    #[must_use]
    pub fn configured(config: EngineConfig) -> Self {
        Self::new().with_config(config)
    }
}

impl Default for RuleEngine<Interpreter> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: ExpressionEvaluator> RuleEngine<E> {
    /// An engine that hands every expression to `evaluator`.
    pub fn with_evaluator(evaluator: E) -> Self {
        let config = EngineConfig::default();
        Self {
            evaluator,
            cloner: cloner_for(&config),
            config,
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.cloner = cloner_for(&config);
        self.config = config;
        self
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn evaluator(&self) -> &E {
        &self.evaluator
    }

    /// Runs the node's rules against `ctx`.
    ///
    /// # Errors
    ///
    /// Stops at the first failing rule. Returns [`FormRuleError::Evaluation`]
    /// when an expression fails, [`FormRuleError::Configuration`] for a
    /// malformed rule list and [`FormRuleError::RecursionLimit`] when binding
    /// isolation meets a graph nested too deeply.
    pub fn process(&self, ctx: &Context) -> Result<(), FormRuleError> {
        self.process_detailed(ctx).map(|_| ())
    }

    /// Like [`process`](Self::process), also reporting what each rule did.
    ///
    /// # Errors
    ///
    /// See [`process`](Self::process).
    pub fn process_detailed(&self, ctx: &Context) -> Result<ProcessReport, FormRuleError> {
        let started = Instant::now();
        let Some(rules) = rule_list(ctx)? else {
            return Ok(ProcessReport::new(Vec::new(), started.elapsed()));
        };

        let count = rules.len();
        let mut outcomes = Vec::with_capacity(count);
        for index in 0..count {
            // Read at its turn so earlier rules may edit later ones.
            let Some(record) = rules.get(index) else {
                break;
            };
            let outcome = if record.is_undefined() {
                RuleOutcome::Inactive
            } else {
                let rule = FormRule::from_value(&record, index)?;
                let outcome = self.apply(&rule, index, ctx)?;
                debug!(rule = index, desc = %rule.desc, %outcome, "rule processed");
                outcome
            };
            outcomes.push(outcome);
        }

        Ok(ProcessReport::new(outcomes, started.elapsed()))
    }

    /// Evaluates one expression against `ctx`, isolating the bindings it
    /// mentions first when configured to.
    ///
    /// # Errors
    ///
    /// Returns [`FormRuleError::Evaluation`] when the expression fails and
    /// [`FormRuleError::RecursionLimit`] when isolation fails.
    pub fn evaluate(&self, expression: &str, ctx: &Context) -> Result<Value, FormRuleError> {
        if self.config.isolate_bindings {
            self.isolate(expression, ctx)?;
        }
        Ok(self.evaluator.evaluate(expression, ctx)?)
    }

    fn apply(
        &self,
        rule: &FormRule,
        index: usize,
        ctx: &Context,
    ) -> Result<RuleOutcome, FormRuleError> {
        if !rule.active {
            return Ok(RuleOutcome::Inactive);
        }
        if self.config.strict_rules {
            check_complete(rule, index)?;
        }
        if !rule.gate.is_empty() && !self.evaluate(&rule.gate, ctx)?.truthy() {
            return Ok(RuleOutcome::GateClosed);
        }
        if rule.condition.is_empty() || rule.then.is_empty() {
            return Ok(RuleOutcome::NotConfigured);
        }

        if self.evaluate(&rule.condition, ctx)?.truthy() {
            self.evaluate(&rule.then, ctx)?;
            Ok(RuleOutcome::Then)
        } else if !rule.otherwise.is_empty() {
            self.evaluate(&rule.otherwise, ctx)?;
            Ok(RuleOutcome::Else)
        } else {
            Ok(RuleOutcome::NoBranch)
        }
    }

    fn isolate(&self, expression: &str, ctx: &Context) -> Result<(), RecursionLimitError> {
        for name in ISOLATED_BINDINGS {
            if !mentions(expression, name) {
                continue;
            }
            let binding = match name {
                "schema" => &ctx.schema,
                "uiSchema" => &ctx.ui_schema,
                "data" => &ctx.data,
                _ => match &ctx.array_ui_schema {
                    Some(value) => value,
                    None => continue,
                },
            };
            trace!(binding = name, "isolating binding");
            self.cloner.clone_children(binding)?;
        }
        Ok(())
    }
}

fn cloner_for(config: &EngineConfig) -> StructuralCloner {
    StructuralCloner::with_options(CloneOptions {
        max_depth: config.max_depth,
    })
}

/// The node's rule list, if it has one.
fn rule_list(ctx: &Context) -> Result<Option<Sequence>, ConfigurationError> {
    let rules = ctx.ui_schema.get(OPTIONS_KEY).get(RULES_KEY);
    match rules {
        Value::Sequence(seq) => Ok(Some(seq)),
        other if !other.truthy() => Ok(None),
        other => Err(ConfigurationError::RulesNotSequence {
            found: other.type_name(),
        }),
    }
}

fn check_complete(rule: &FormRule, index: usize) -> Result<(), ConfigurationError> {
    match (rule.condition.is_empty(), rule.then.is_empty()) {
        (false, true) => Err(ConfigurationError::IncompleteRule {
            index,
            present: "if",
            missing: "then",
        }),
        (true, false) => Err(ConfigurationError::IncompleteRule {
            index,
            present: "then",
            missing: "if",
        }),
        _ => Ok(()),
    }
}

/// Whether `word` occurs in `expression` as a whole word.
fn mentions(expression: &str, word: &str) -> bool {
    expression
        .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .any(|token| token == word)
}
