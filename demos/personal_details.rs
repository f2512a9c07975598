use formrule::{Context, FormRuleError, FormWalker, NodeKind, PreVisitHook, RuleEngine};
use serde_json::json;

/// Runs the engine on every node and prints what each rule did.
struct Reporting {
    engine: RuleEngine,
}

impl PreVisitHook for Reporting {
    fn pre_visit(&self, ctx: &Context) -> Result<(), FormRuleError> {
        let report = self.engine.process_detailed(ctx)?;
        if !report.outcomes().is_empty() {
            let id = ctx.id_schema.get("$id");
            println!("{:<16} {report}", id.as_str().unwrap_or("root"));
        }
        Ok(())
    }
}

fn main() {
    let form = Context::new()
        .with_schema(json!({
            "type": "object",
            "title": "Personal details",
            "properties": {
                "name": {"type": "string", "title": "Name"},
                "gender": {"type": "string", "title": "Gender", "enum": ["male", "female"]},
                "age": {"type": "number", "title": "Age"},
                "job": {"type": "string", "title": "Job"},
                "hobbies": {"type": "array", "title": "", "items": {"type": "string"}}
            }
        }))
        .with_ui_schema(json!({
            "gender": {"ui:widget": "radio", "ui:options": {"inline": true}},
            "job": {"ui:widget": "hidden"},
            "hobbies": {
                "ui:widget": "hidden",
                "ui:description": "Hobbies",
                "ui:help": "hint: add more than 3 hobbies",
                "ui:options": {"formRules": [{
                    "desc": "keep football",
                    "if": "data && data.some(d => d === 'football')",
                    "then": "uiSchema['ui:options'].removable = false; uiSchema['ui:description'] = 'Football is amazing! Keep it.'"
                }]},
                "items": {"ui:options": {"formRules": [{
                    "desc": "lock the football entry",
                    "if": "data === 'football'",
                    "then": "uiSchema['ui:disabled'] = true"
                }]}}
            },
            "ui:options": {"formRules": [
                {
                    "desc": "show job and hobbies for adults",
                    "if": "data.age && data.age >= 18",
                    "then": "delete uiSchema.job['ui:widget']; delete uiSchema.hobbies['ui:widget'];",
                    "else": "delete data.job; data.hobbies = ['']"
                },
                {
                    "desc": "too many hobbies for a job",
                    "if": "data.hobbies && (data.hobbies.length > 3)",
                    "then": "delete data.job; uiSchema.job['ui:disabled'] = true; uiSchema.hobbies['ui:help'] = 'hint: add football'"
                },
                {
                    "desc": "offer 'other' gender",
                    "if": "data.name && (data.name.toLowerCase() == 'other')",
                    "then": "schema.properties.gender.enum = ['male', 'female', 'other']",
                    "else": "schema.properties.gender.enum = ['male', 'female']"
                }
            ]}
        }))
        .with_data(json!({
            "name": "Other",
            "age": 19,
            "job": "dev",
            "hobbies": ["football", "chess", "go", "tennis"]
        }));

    let hook = Reporting {
        engine: RuleEngine::new(),
    };
    let mut disabled_items = Vec::new();
    FormWalker::new(&hook)
        .walk(&form, |kind, ctx| {
            if kind == NodeKind::ArrayItem && ctx.ui_schema.get("ui:disabled").truthy() {
                disabled_items.push(ctx.data.to_string());
            }
        })
        .expect("rules failed");

    let render = |value: &formrule::Value| {
        let json = value.to_json(64).expect("form is too deep");
        serde_json::to_string_pretty(&json).expect("JSON is always serializable")
    };
    println!();
    println!("data: {}", render(&form.data));
    println!("uiSchema: {}", render(&form.ui_schema));
    println!("gender choices: {}", form.schema.get("properties").get("gender").get("enum"));
    println!("disabled items: {disabled_items:?}");
}
