use formrule::{Context, FormWalker, NodeKind, RuleEngine, Value};
use serde_json::json;

fn personal_details_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "title": "Personal details",
        "properties": {
            "name": {"type": "string", "title": "Name"},
            "gender": {"type": "string", "title": "Gender", "enum": ["male", "female"]},
            "age": {"type": "number", "title": "Age"},
            "job": {"type": "string", "title": "Job"},
            "hobbies": {"type": "array", "title": "", "items": {"type": "string"}}
        }
    })
}

fn personal_details_ui() -> serde_json::Value {
    json!({
        "name": {"ui:placeholder": "hint: type 'other' to see other options"},
        "age": {"ui:placeholder": "hint: type at least 18 to show two further fields"},
        "gender": {"ui:widget": "radio", "ui:options": {"inline": true}},
        "job": {"ui:widget": "hidden"},
        "hobbies": {
            "ui:widget": "hidden",
            "ui:title": false,
            "ui:description": "Hobbies",
            "ui:help": "hint: add more than 3 hobbies",
            "ui:options": {
                "formRules": [{
                    "desc": "some final actions when 'football' has been typed",
                    "if": "data && data.some(d => d === 'football')",
                    "then": "uiSchema['ui:options'].removable = false; uiSchema['ui:description'] = 'Football is amazing! Keep it.'",
                    "active": true
                }]
            },
            "items": {
                "ui:options": {
                    "formRules": [{
                        "desc": "disabling input field as 'football' has been written",
                        "if": "data === 'football'",
                        "then": "uiSchema['ui:disabled'] = true",
                        "active": true
                    }]
                }
            }
        },
        "ui:options": {
            "formRules": [
                {
                    "desc": "showing the job and hobbies fields if age >= 18, else resets their data",
                    "if": "data.age && data.age >= 18",
                    "then": "delete uiSchema.job['ui:widget']; delete uiSchema.hobbies['ui:widget'];",
                    "else": "delete data.job; data.hobbies = ['']",
                    "active": true
                },
                {
                    "desc": "reseting + disabling job field if number of hobbies > 3",
                    "if": "data.hobbies && (data.hobbies.length > 3)",
                    "then": "delete data.job; uiSchema.hobbies['ui:description'] = 'You have a lot of time for hobbies! No way you do have a job:)'; uiSchema.job['ui:disabled'] = true; uiSchema.hobbies['ui:help'] = 'hint: add football'",
                    "active": true
                },
                {
                    "desc": "adding 'other' enum option when user name is 'other'",
                    "if": "data.name && (data.name.toLowerCase() == 'other')",
                    "then": "schema.properties.gender.enum = ['male', 'female', 'other']",
                    "else": "schema.properties.gender.enum = ['male', 'female']",
                    "active": true
                }
            ]
        }
    })
}

fn personal_details(data: serde_json::Value) -> Context {
    Context::new()
        .with_schema(personal_details_schema())
        .with_ui_schema(personal_details_ui())
        .with_data(data)
}

/// Every node a walk visited, in visiting order.
struct Rendered {
    nodes: Vec<(NodeKind, Context)>,
}

impl Rendered {
    fn node(&self, id: &str) -> &Context {
        self.nodes
            .iter()
            .map(|(_, ctx)| ctx)
            .find(|ctx| ctx.id_schema.get("$id").as_str() == Some(id))
            .unwrap_or_else(|| panic!("no node {id}"))
    }

    /// The UI schema each array item ended up with.
    fn items(&self) -> Vec<Value> {
        self.nodes
            .iter()
            .filter(|(kind, _)| *kind == NodeKind::ArrayItem)
            .map(|(_, ctx)| ctx.ui_schema.clone())
            .collect()
    }
}

/// Walks `root` with a default engine.
fn render(root: &Context) -> Rendered {
    let engine = RuleEngine::new();
    let mut nodes = Vec::new();
    FormWalker::new(&engine)
        .walk(root, |kind, ctx| nodes.push((kind, ctx.clone())))
        .unwrap();
    Rendered { nodes }
}

#[test]
fn adult_reveals_job_field() {
    let ctx = Context::new()
        .with_ui_schema(json!({
            "job": {"ui:widget": "hidden"},
            "ui:options": {"formRules": [{
                "if": "data.age >= 18",
                "then": "delete uiSchema.job['ui:widget']",
                "else": "delete data.job"
            }]}
        }))
        .with_data(json!({"age": 19, "job": "dev"}));
    RuleEngine::new().process(&ctx).unwrap();

    assert_eq!(ctx.ui_schema.get("job"), Value::mapping());
    assert_eq!(ctx.data.get("job"), Value::from("dev"));
}

#[test]
fn minor_loses_job_data() {
    let ctx = Context::new()
        .with_ui_schema(json!({
            "job": {"ui:widget": "hidden"},
            "ui:options": {"formRules": [{
                "if": "data.age >= 18",
                "then": "delete uiSchema.job['ui:widget']",
                "else": "delete data.job"
            }]}
        }))
        .with_data(json!({"age": 17, "job": "dev"}));
    RuleEngine::new().process(&ctx).unwrap();

    assert_eq!(ctx.ui_schema.get("job").get("ui:widget"), Value::from("hidden"));
    assert!(ctx.data.get("job").is_undefined());
    assert!(!ctx.data.as_mapping().unwrap().contains_key("job"));
}

#[test]
fn job_ui_schema_is_recreated_or_dropped() {
    let form = |age: u32| {
        Context::new()
            .with_ui_schema(json!({
                "job": {"ui:widget": "hidden"},
                "ui:options": {"formRules": [{
                    "if": "data.age >= 18",
                    "then": "uiSchema.job = {}",
                    "else": "delete uiSchema.job"
                }]}
            }))
            .with_data(json!({"age": age}))
    };

    let minor = form(17);
    RuleEngine::new().process(&minor).unwrap();
    assert!(!minor.ui_schema.as_mapping().unwrap().contains_key("job"));

    let adult = form(19);
    RuleEngine::new().process(&adult).unwrap();
    assert_eq!(adult.ui_schema.get("job"), Value::mapping());
}

#[test]
fn busy_adult_with_football() {
    let root = personal_details(json!({
        "name": "Other",
        "age": 19,
        "job": "dev",
        "hobbies": ["football", "chess", "go", "tennis"]
    }));
    let rendered = render(&root);

    let job = root.ui_schema.get("job");
    assert!(job.get("ui:widget").is_undefined());
    assert_eq!(job.get("ui:disabled"), Value::Bool(true));

    let hobbies = root.ui_schema.get("hobbies");
    assert!(hobbies.get("ui:widget").is_undefined());
    assert_eq!(hobbies.get("ui:help"), Value::from("hint: add football"));
    assert_eq!(
        hobbies.get("ui:description"),
        Value::from("You have a lot of time for hobbies! No way you do have a job:)")
    );
    assert!(hobbies.get("ui:options").get("removable").is_undefined());

    let hobbies_node = rendered.node("root_hobbies").ui_schema.clone();
    assert_eq!(hobbies_node.get("ui:help"), Value::from("hint: add football"));
    assert_eq!(
        hobbies_node.get("ui:description"),
        Value::from("Football is amazing! Keep it.")
    );
    assert_eq!(
        hobbies_node.get("ui:options").get("removable"),
        Value::Bool(false)
    );

    assert!(root.data.get("job").is_undefined());
    assert_eq!(
        root.schema.get("properties").get("gender").get("enum"),
        Value::from_json(json!(["male", "female", "other"]))
    );
    assert_eq!(
        rendered.node("root_gender").schema.get("enum"),
        Value::from_json(json!(["male", "female", "other"]))
    );

    let items = rendered.items();
    assert_eq!(items.len(), 4);
    assert_eq!(items[0].get("ui:disabled"), Value::Bool(true));
    for item in &items[1..] {
        assert!(item.get("ui:disabled").is_undefined());
    }
    assert!(hobbies_node.get("items").get("ui:disabled").is_undefined());
}

#[test]
fn minor_resets_hidden_fields() {
    let root = personal_details(json!({
        "name": "Ada",
        "age": 17,
        "job": "dev",
        "hobbies": ["chess", "go"]
    }));
    let items = render(&root).items();

    assert_eq!(root.ui_schema.get("job").get("ui:widget"), Value::from("hidden"));
    assert_eq!(root.ui_schema.get("hobbies").get("ui:widget"), Value::from("hidden"));
    assert!(root.data.get("job").is_undefined());
    assert_eq!(root.data.get("hobbies"), Value::from_json(json!([""])));
    assert_eq!(
        root.schema.get("properties").get("gender").get("enum"),
        Value::from_json(json!(["male", "female"]))
    );
    assert_eq!(items.len(), 1);
    assert!(items[0].get("ui:disabled").is_undefined());
}

#[test]
fn initial_form_state() {
    let root = personal_details(json!({"name": "", "hobbies": [""]}));
    let rendered = render(&root);

    assert_eq!(root.data.get("hobbies"), Value::from_json(json!([""])));
    assert_eq!(
        rendered.node("root_hobbies").ui_schema.get("ui:description"),
        Value::from("Hobbies")
    );
    assert_eq!(rendered.items().len(), 1);
}

fn tag_form(tags: serde_json::Value) -> Context {
    Context::new()
        .with_schema(json!({
            "type": "object",
            "properties": {"tags": {"type": "array", "items": {"type": "string"}}}
        }))
        .with_ui_schema(json!({
            "tags": {
                "ui:options": {"formRules": [{
                    "if": "data.includes('locked')",
                    "then": "uiSchema['ui:options'].removable = false"
                }]},
                "items": {"ui:options": {"formRules": [{
                    "context": "arrayUiSchema && arrayUiSchema['ui:options'].removable !== false",
                    "if": "data !== ''",
                    "then": "uiSchema['ui:removable'] = true"
                }]}}
            }
        }))
        .with_data(json!({"tags": tags}))
}

#[test]
fn item_rules_gate_on_parent_array_options() {
    let items = render(&tag_form(json!(["a", "b"]))).items();
    assert_eq!(items.len(), 2);
    for item in items {
        assert_eq!(item.get("ui:removable"), Value::Bool(true));
    }

    let items = render(&tag_form(json!(["a", "locked"]))).items();
    assert_eq!(items.len(), 2);
    for item in items {
        assert!(item.get("ui:removable").is_undefined());
    }
}

fn removable_list(removable: Option<bool>) -> Context {
    let mut tags_ui = json!({
        "items": {"ui:options": {"formRules": [{
            "context": "arrayUiSchema && arrayUiSchema.removable !== false",
            "if": "true",
            "then": "uiSchema['ui:removable'] = true"
        }]}}
    });
    if let Some(removable) = removable {
        tags_ui["removable"] = json!(removable);
    }
    Context::new()
        .with_schema(json!({
            "type": "object",
            "properties": {"tags": {"type": "array", "items": {"type": "string"}}}
        }))
        .with_ui_schema(json!({"tags": tags_ui}))
        .with_data(json!({"tags": ["a", "b"]}))
}

#[test]
fn item_rules_skip_when_array_is_not_removable() {
    let items = render(&removable_list(Some(false))).items();
    assert_eq!(items.len(), 2);
    for item in items {
        assert!(item.get("ui:removable").is_undefined());
    }

    for removable in [None, Some(true)] {
        let items = render(&removable_list(removable)).items();
        assert_eq!(items.len(), 2);
        for item in items {
            assert_eq!(item.get("ui:removable"), Value::Bool(true));
        }
    }
}

#[test]
fn rules_outside_the_walk_see_no_array_schema() {
    let ctx = Context::new()
        .with_ui_schema(json!({"ui:options": {"formRules": [{
            "if": "arrayUiSchema === undefined",
            "then": "data.standalone = true"
        }]}}))
        .with_data(json!({}));
    RuleEngine::new().process(&ctx).unwrap();
    assert_eq!(ctx.data.get("standalone"), Value::Bool(true));
}
