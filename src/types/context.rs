use super::value::Value;

/// Names under which a [`Context`]'s slots are visible to expressions.
pub const BINDING_NAMES: [&str; 6] = [
    "formContext",
    "idSchema",
    "schema",
    "uiSchema",
    "data",
    "arrayUiSchema",
];

/// Per-node record a node's rules are evaluated against.
///
/// Slots hold shared handles: mutating a container reachable from a slot
/// mutates the caller's tree.
#[derive(Debug, Clone, Default)]
pub struct Context {
    /// Form-wide value carried top-down. Never cloned.
    pub form_context: Value,
    pub id_schema: Value,
    pub schema: Value,
    /// Presentation description. Carries the node's own rule list.
    pub ui_schema: Value,
    pub data: Value,
    /// The parent array's UI schema, present only for array items.
    pub array_ui_schema: Option<Value>,
}

impl Context {
    /// Create an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_form_context(mut self, value: impl Into<Value>) -> Self {
        self.form_context = value.into();
        self
    }

    #[must_use]
    pub fn with_id_schema(mut self, value: impl Into<Value>) -> Self {
        self.id_schema = value.into();
        self
    }

    #[must_use]
    pub fn with_schema(mut self, value: impl Into<Value>) -> Self {
        self.schema = value.into();
        self
    }

    #[must_use]
    pub fn with_ui_schema(mut self, value: impl Into<Value>) -> Self {
        self.ui_schema = value.into();
        self
    }

    #[must_use]
    pub fn with_data(mut self, value: impl Into<Value>) -> Self {
        self.data = value.into();
        self
    }

    #[must_use]
    pub fn with_array_ui_schema(mut self, value: impl Into<Value>) -> Self {
        self.array_ui_schema = Some(value.into());
        self
    }

    /// Look up a slot by its binding name.
    ///
    /// An absent `arrayUiSchema` reads as [`Value::Undefined`]. Returns `None`
    /// for names that are not bindings.
    #[must_use]
    pub fn binding(&self, name: &str) -> Option<Value> {
        match name {
            "formContext" => Some(self.form_context.clone()),
            "idSchema" => Some(self.id_schema.clone()),
            "schema" => Some(self.schema.clone()),
            "uiSchema" => Some(self.ui_schema.clone()),
            "data" => Some(self.data.clone()),
            "arrayUiSchema" => Some(self.array_ui_schema.clone().unwrap_or_default()),
            _ => None,
        }
    }

    /// All six bindings in [`BINDING_NAMES`] order.
    #[must_use]
    pub fn bindings(&self) -> Vec<(&'static str, Value)> {
        BINDING_NAMES
            .iter()
            .map(|&name| (name, self.binding(name).unwrap_or_default()))
            .collect()
    }
}
