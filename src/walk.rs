use std::fmt;

use tracing::trace;

use crate::clone::StructuralCloner;
use crate::engine::RuleEngine;
use crate::error::FormRuleError;
use crate::evaluate::ExpressionEvaluator;
use crate::types::{
    CloneOptions, Context, Mapping, Operation, RecursionLimitError, Value, WalkOptions,
};

/// Called for every object, array and array-item node before the node is
/// used for anything else.
pub trait PreVisitHook {
    /// # Errors
    ///
    /// An error aborts the walk and is returned from [`FormWalker::walk`].
    fn pre_visit(&self, ctx: &Context) -> Result<(), FormRuleError>;
}

impl<E: ExpressionEvaluator> PreVisitHook for RuleEngine<E> {
    fn pre_visit(&self, ctx: &Context) -> Result<(), FormRuleError> {
        self.process(ctx)
    }
}

/// What a visited node is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Object,
    Array,
    /// One element of an array; its context carries `arrayUiSchema`.
    ArrayItem,
    /// Any other schema node. The hook is not called for these.
    Field,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Object => write!(f, "object"),
            NodeKind::Array => write!(f, "array"),
            NodeKind::ArrayItem => write!(f, "array item"),
            NodeKind::Field => write!(f, "field"),
        }
    }
}

type Visitor<'v> = dyn FnMut(NodeKind, &Context) + 'v;

/// Walks a form tree top-down, building a [`Context`] per node.
///
/// Object nodes descend into `schema.properties`, array nodes into the
/// elements of `data`. Every child gets its own deep clone of its `schema`
/// and `uiSchema`, taken after the parent's hook has run, so rules on one
/// node never leak into its parent or its siblings. Data stays shared.
pub struct FormWalker<'h, H: ?Sized> {
    hook: &'h H,
    options: WalkOptions,
    cloner: StructuralCloner,
}

impl<'h, H: PreVisitHook + ?Sized> FormWalker<'h, H> {
    pub fn new(hook: &'h H) -> Self {
        Self {
            hook,
            options: WalkOptions::default(),
            cloner: StructuralCloner::new(),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: WalkOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn with_clone_options(mut self, options: CloneOptions) -> Self {
        self.cloner = StructuralCloner::with_options(options);
        self
    }

    /// Walks the tree rooted at `root`, calling the hook and then `visitor`
    /// for each node.
    ///
    /// # Errors
    ///
    /// Returns the first hook error, or [`FormRuleError::RecursionLimit`]
    /// when the tree is deeper than the configured maximum depth.
    pub fn walk(
        &self,
        root: &Context,
        mut visitor: impl FnMut(NodeKind, &Context),
    ) -> Result<(), FormRuleError> {
        self.walk_node(root, 0, &mut visitor)
    }

    fn walk_node(
        &self,
        ctx: &Context,
        depth: usize,
        visitor: &mut Visitor<'_>,
    ) -> Result<(), FormRuleError> {
        self.check_depth(depth)?;
        let kind = node_kind(&ctx.schema);
        trace!(id = %node_id(ctx), %kind, depth, "visiting node");
        match kind {
            NodeKind::Object => {
                self.hook.pre_visit(ctx)?;
                visitor(kind, ctx);
                self.walk_properties(ctx, depth, visitor)
            }
            NodeKind::Array => {
                self.hook.pre_visit(ctx)?;
                visitor(kind, ctx);
                self.walk_items(ctx, depth, visitor)
            }
            _ => {
                visitor(kind, ctx);
                Ok(())
            }
        }
    }

    fn walk_properties(
        &self,
        ctx: &Context,
        depth: usize,
        visitor: &mut Visitor<'_>,
    ) -> Result<(), FormRuleError> {
        let Some(properties) = ctx.schema.get("properties").as_mapping().cloned() else {
            return Ok(());
        };
        for (key, schema) in properties.entries() {
            let child = Context {
                form_context: ctx.form_context.clone(),
                id_schema: child_id(ctx, &key),
                schema: self.cloner.deep_clone(&schema)?,
                ui_schema: self.private_ui_schema(&ctx.ui_schema.get(&key))?,
                data: ctx.data.get(&key),
                array_ui_schema: None,
            };
            self.walk_node(&child, depth + 1, visitor)?;
        }
        Ok(())
    }

    fn walk_items(
        &self,
        ctx: &Context,
        depth: usize,
        visitor: &mut Visitor<'_>,
    ) -> Result<(), FormRuleError> {
        let Some(items) = ctx.data.as_sequence().map(|seq| seq.items()) else {
            return Ok(());
        };
        let item_schema = ctx.schema.get("items");
        let item_ui_schema = ctx.ui_schema.get("items");
        for (index, data) in items.into_iter().enumerate() {
            self.check_depth(depth + 1)?;
            let item = Context {
                form_context: ctx.form_context.clone(),
                id_schema: child_id(ctx, &index.to_string()),
                schema: self.cloner.deep_clone(&item_schema)?,
                ui_schema: self.private_ui_schema(&item_ui_schema)?,
                data,
                array_ui_schema: Some(ctx.ui_schema.clone()),
            };
            trace!(id = %node_id(&item), index, "visiting array item");
            self.hook.pre_visit(&item)?;
            visitor(NodeKind::ArrayItem, &item);
            match node_kind(&item.schema) {
                NodeKind::Object => self.walk_properties(&item, depth + 1, visitor)?,
                NodeKind::Array => self.walk_items(&item, depth + 1, visitor)?,
                _ => {}
            }
        }
        Ok(())
    }

    fn private_ui_schema(&self, ui_schema: &Value) -> Result<Value, RecursionLimitError> {
        match ui_schema {
            ui @ Value::Mapping(_) => self.cloner.deep_clone(ui),
            _ => Ok(Value::mapping()),
        }
    }

    fn check_depth(&self, depth: usize) -> Result<(), RecursionLimitError> {
        if depth >= self.options.max_depth {
            return Err(RecursionLimitError::new(
                Operation::Walk,
                self.options.max_depth,
            ));
        }
        Ok(())
    }
}

fn node_kind(schema: &Value) -> NodeKind {
    match schema.get("type").as_str() {
        Some("object") => NodeKind::Object,
        Some("array") => NodeKind::Array,
        _ if schema.get("properties").as_mapping().is_some() => NodeKind::Object,
        _ => NodeKind::Field,
    }
}

fn node_id(ctx: &Context) -> String {
    ctx.id_schema
        .get("$id")
        .as_str()
        .unwrap_or("root")
        .to_owned()
}

fn child_id(parent: &Context, key: &str) -> Value {
    let id = Mapping::new();
    id.insert("$id", format!("{}_{key}", node_id(parent)));
    Value::Mapping(id)
}
