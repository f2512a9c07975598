use std::cell::RefCell;

use formrule::{
    ConfigurationError, Context, EngineConfig, EvaluationError, EvaluationErrorKind, FormRule,
    FormRuleError, RuleEngine, RuleOutcome, Value,
};
use serde_json::json;

fn with_rules(rules: serde_json::Value) -> Context {
    Context::new()
        .with_ui_schema(json!({"ui:options": {"formRules": rules}}))
        .with_data(json!({"log": []}))
}

#[test]
fn rules_run_in_list_order() {
    let ctx = with_rules(json!([
        {"if": "true", "then": "data.log.push('first')"},
        {"if": "true", "then": "data.log.push('second')"},
        {"if": "false", "then": "data.log.push('never')", "else": "data.log.push('third')"}
    ]));
    RuleEngine::new().process(&ctx).unwrap();
    assert_eq!(
        ctx.data.get("log"),
        Value::from_json(json!(["first", "second", "third"]))
    );
}

#[test]
fn later_rules_observe_earlier_mutations() {
    let ctx = with_rules(json!([
        {"if": "true", "then": "data.step = 1"},
        {"if": "data.step === 1", "then": "data.step = 2"}
    ]));
    RuleEngine::new().process(&ctx).unwrap();
    assert_eq!(ctx.data.get("step"), Value::from(2));
}

#[test]
fn then_and_else_are_mutually_exclusive() {
    let calls = RefCell::new(Vec::new());
    let evaluator = |expression: &str, _: &Context| -> Result<Value, EvaluationError> {
        calls.borrow_mut().push(expression.to_owned());
        Ok(Value::Bool(expression.starts_with("yes")))
    };
    let ctx = with_rules(json!([
        {"if": "yes", "then": "then-0", "else": "else-0"},
        {"if": "no", "then": "then-1", "else": "else-1"},
        {"if": "no", "then": "then-2"}
    ]));
    let report = RuleEngine::with_evaluator(&evaluator)
        .process_detailed(&ctx)
        .unwrap();

    assert_eq!(
        *calls.borrow(),
        ["yes", "then-0", "no", "else-1", "no"]
    );
    assert_eq!(
        report.outcomes(),
        [RuleOutcome::Then, RuleOutcome::Else, RuleOutcome::NoBranch]
    );
}

#[test]
fn inactive_rules_evaluate_nothing() {
    let calls = RefCell::new(0);
    let evaluator = |_: &str, _: &Context| -> Result<Value, EvaluationError> {
        *calls.borrow_mut() += 1;
        Ok(Value::Bool(true))
    };
    let ctx = with_rules(json!([
        {"context": "g", "if": "c", "then": "t", "active": false},
        {"if": "c", "then": "t", "active": null}
    ]));
    let report = RuleEngine::with_evaluator(&evaluator)
        .process_detailed(&ctx)
        .unwrap();
    assert_eq!(*calls.borrow(), 0);
    assert_eq!(report.applied(), 0);
}

#[test]
fn closed_gate_skips_condition() {
    let ctx = with_rules(json!([
        {"context": "data.enabled", "if": "data.log.push('evaluated')", "then": "1"}
    ]));
    let report = RuleEngine::new().process_detailed(&ctx).unwrap();
    assert_eq!(report.outcomes(), [RuleOutcome::GateClosed]);
    assert_eq!(ctx.data.get("log"), Value::from_json(json!([])));
}

#[test]
fn rules_can_deactivate_later_rules_without_isolation() {
    let ctx = with_rules(json!([
        {"if": "true", "then": "uiSchema['ui:options'].formRules[1].active = false"},
        {"if": "true", "then": "data.reached = true"}
    ]));
    let engine = RuleEngine::configured(EngineConfig::default().isolate_bindings(false));
    let report = engine.process_detailed(&ctx).unwrap();
    assert_eq!(report.outcomes(), [RuleOutcome::Then, RuleOutcome::Inactive]);
    assert!(ctx.data.get("reached").is_undefined());
}

#[test]
fn rules_can_rewrite_later_rules_without_isolation() {
    let ctx = with_rules(json!([
        {"if": "true", "then": "uiSchema['ui:options'].formRules[1].then = 'data.rewritten = true'"},
        {"if": "true", "then": "data.original = true"}
    ]));
    RuleEngine::configured(EngineConfig::default().isolate_bindings(false))
        .process(&ctx)
        .unwrap();
    assert_eq!(ctx.data.get("rewritten"), Value::Bool(true));
    assert!(ctx.data.get("original").is_undefined());
}

#[test]
fn appended_rules_wait_for_the_next_pass() {
    let ctx = with_rules(json!([
        {"if": "true", "then": "uiSchema['ui:options'].formRules.push({if: 'true', then: 'data.late = true'})"}
    ]));
    let engine = RuleEngine::configured(EngineConfig::default().isolate_bindings(false));
    let report = engine.process_detailed(&ctx).unwrap();
    assert_eq!(report.outcomes().len(), 1);
    assert!(ctx.data.get("late").is_undefined());

    engine.process(&ctx).unwrap();
    assert_eq!(ctx.data.get("late"), Value::Bool(true));
}

#[test]
fn removed_rules_end_the_pass() {
    let ctx = with_rules(json!([
        {"if": "true", "then": "uiSchema['ui:options'].formRules.length = 1"},
        {"if": "true", "then": "data.reached = true"}
    ]));
    let report = RuleEngine::configured(EngineConfig::default().isolate_bindings(false))
        .process_detailed(&ctx)
        .unwrap();
    assert_eq!(report.outcomes(), [RuleOutcome::Then]);
    assert!(ctx.data.get("reached").is_undefined());
}

#[test]
fn isolation_detaches_previously_shared_children() {
    let shared = Value::from_json(json!({"hidden": true}));
    let ctx = Context::new()
        .with_ui_schema(json!({"ui:options": {"formRules": [
            {"if": "true", "then": "uiSchema.a.hidden = false"}
        ]}}))
        .with_data(json!({}));
    let ui = ctx.ui_schema.as_mapping().unwrap();
    ui.insert("a", shared.clone());
    ui.insert("b", shared.clone());

    RuleEngine::new().process(&ctx).unwrap();
    assert_eq!(ctx.ui_schema.get("a").get("hidden"), Value::Bool(false));
    assert_eq!(ctx.ui_schema.get("b").get("hidden"), Value::Bool(true));
    assert_eq!(shared.get("hidden"), Value::Bool(true));
}

#[test]
fn shared_children_stay_shared_without_isolation() {
    let shared = Value::from_json(json!({"hidden": true}));
    let ctx = Context::new()
        .with_ui_schema(json!({"ui:options": {"formRules": [
            {"if": "true", "then": "uiSchema.a.hidden = false"}
        ]}}))
        .with_data(json!({}));
    let ui = ctx.ui_schema.as_mapping().unwrap();
    ui.insert("a", shared.clone());
    ui.insert("b", shared.clone());

    RuleEngine::configured(EngineConfig::default().isolate_bindings(false))
        .process(&ctx)
        .unwrap();
    assert_eq!(ctx.ui_schema.get("b").get("hidden"), Value::Bool(false));
    assert_eq!(shared.get("hidden"), Value::Bool(false));
}

#[test]
fn form_context_is_never_isolated() {
    let form_context = Value::from_json(json!({"user": {"role": "admin"}}));
    let role_holder = form_context.get("user");
    let ctx = with_rules(json!([
        {"if": "formContext.user.role === 'admin'", "then": "formContext.user.seen = true"}
    ]))
    .with_form_context(form_context.clone());

    RuleEngine::new().process(&ctx).unwrap();
    assert!(form_context.get("user").same(&role_holder));
    assert_eq!(role_holder.get("seen"), Value::Bool(true));
}

#[test]
fn syntax_errors_surface_with_expression_text() {
    let ctx = with_rules(json!([{"if": "data.age >=", "then": "1"}]));
    let err = RuleEngine::new().process(&ctx).unwrap_err();
    match err {
        FormRuleError::Evaluation(e) => {
            assert_eq!(e.expression(), "data.age >=");
            assert!(matches!(e.kind(), EvaluationErrorKind::Syntax(_)));
        }
        other => panic!("expected evaluation error, got {other:?}"),
    }
}

#[test]
fn unknown_identifiers_fail() {
    let ctx = with_rules(json!([{"if": "window.alert", "then": "1"}]));
    let err = RuleEngine::new().process(&ctx).unwrap_err();
    assert_eq!(
        err.to_string(),
        "error evaluating expression `window.alert`: window is not defined"
    );
}

#[test]
fn errors_leave_earlier_mutations_in_place() {
    let ctx = with_rules(json!([
        {"if": "true", "then": "data.first = true"},
        {"if": "true", "then": "data.missing.deep = 1"},
        {"if": "true", "then": "data.third = true"}
    ]));
    assert!(RuleEngine::new().process(&ctx).is_err());
    assert_eq!(ctx.data.get("first"), Value::Bool(true));
    assert!(ctx.data.get("third").is_undefined());
}

#[test]
fn null_rule_list_means_no_rules() {
    let ctx = Context::new().with_ui_schema(json!({"ui:options": {"formRules": null}}));
    let report = RuleEngine::new().process_detailed(&ctx).unwrap();
    assert!(report.outcomes().is_empty());
}

#[test]
fn object_rule_list_is_rejected() {
    let ctx = Context::new().with_ui_schema(json!({"ui:options": {"formRules": {"if": "1"}}}));
    let err = RuleEngine::new().process(&ctx).unwrap_err();
    assert!(matches!(
        err,
        FormRuleError::Configuration(ConfigurationError::RulesNotSequence { found: "object" })
    ));
}

#[test]
fn rules_built_in_code_round_trip_through_the_ui_schema() {
    let rules = [
        FormRule::new("data.age >= 18", "data.adult = true")
            .otherwise("data.adult = false")
            .described("adult flag"),
        FormRule::new("true", "data.skipped = true").inactive(),
    ];
    let list: Vec<Value> = rules.iter().map(FormRule::to_value).collect();
    let ctx = Context::new().with_data(json!({"age": 30}));
    let ui = Value::mapping();
    let options = Value::mapping();
    options.as_mapping().unwrap().insert("formRules", list);
    ui.as_mapping().unwrap().insert("ui:options", options);
    let ctx = Context { ui_schema: ui, ..ctx };

    RuleEngine::new().process(&ctx).unwrap();
    assert_eq!(ctx.data.get("adult"), Value::Bool(true));
    assert!(ctx.data.get("skipped").is_undefined());
}

#[test]
fn engine_config_loads_from_json() {
    let config: EngineConfig =
        serde_json::from_value(json!({"isolateBindings": false, "strictRules": true})).unwrap();
    assert!(!config.isolate_bindings);
    assert!(config.strict_rules);
    assert_eq!(config.max_depth, EngineConfig::default().max_depth);
}
