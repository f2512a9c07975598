use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use tracing::error;

use crate::parse::{self, ParseError};
use crate::types::{
    BinaryOp, Context, EvaluationError, EvaluationErrorKind, Expr, Literal, LogicalOp, Mapping,
    Program, Property, Sequence, UnaryOp, Value,
};

type Eval<T> = Result<T, EvaluationErrorKind>;

/// How far past its current length an assignment may grow a sequence.
pub const MAX_SEQUENCE_GROWTH: usize = 10_000;

/// Runs a single expression against a context's bindings.
///
/// The expression sees the six bindings by name and may mutate any container
/// reachable through them.
pub trait ExpressionEvaluator {
    /// # Errors
    ///
    /// Returns [`EvaluationError`] carrying the expression text when the
    /// expression cannot be parsed or fails while running.
    fn evaluate(&self, expression: &str, ctx: &Context) -> Result<Value, EvaluationError>;
}

impl<F> ExpressionEvaluator for F
where
    F: Fn(&str, &Context) -> Result<Value, EvaluationError>,
{
    fn evaluate(&self, expression: &str, ctx: &Context) -> Result<Value, EvaluationError> {
        self(expression, ctx)
    }
}

/// Tree-walking interpreter for the sandboxed expression language.
///
/// Parsed programs are cached by expression text. The cache keeps one entry
/// per distinct expression for the interpreter's lifetime; call
/// [`clear_cache`](Self::clear_cache) when expressions come from an
/// unbounded source.
#[derive(Debug, Default)]
pub struct Interpreter {
    cache: RefCell<HashMap<String, Rc<Program>>>,
}

impl Interpreter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct expressions parsed so far.
    #[must_use]
    pub fn cached_programs(&self) -> usize {
        self.cache.borrow().len()
    }

    /// Drops every cached program.
    pub fn clear_cache(&self) {
        self.cache.borrow_mut().clear();
    }

    fn program(&self, expression: &str) -> Result<Rc<Program>, ParseError> {
        if let Some(program) = self.cache.borrow().get(expression) {
            return Ok(Rc::clone(program));
        }
        let program = Rc::new(parse::parse(expression)?);
        self.cache
            .borrow_mut()
            .insert(expression.to_owned(), Rc::clone(&program));
        Ok(program)
    }
}

impl ExpressionEvaluator for Interpreter {
    fn evaluate(&self, expression: &str, ctx: &Context) -> Result<Value, EvaluationError> {
        let result = self
            .program(expression)
            .map_err(EvaluationErrorKind::from)
            .and_then(|program| {
                let mut scope = Scope::new(ctx);
                run(&program, &mut scope)
            });
        result.map_err(|kind| {
            error!(expression, error = %kind, "expression evaluation failed");
            EvaluationError::new(expression, kind)
        })
    }
}

/// Name lookup: the bindings first, then callback parameters on top.
struct Scope {
    frames: Vec<(String, Value)>,
}

impl Scope {
    fn new(ctx: &Context) -> Self {
        Self {
            frames: ctx
                .bindings()
                .into_iter()
                .map(|(name, value)| (name.to_owned(), value))
                .collect(),
        }
    }

    fn lookup(&self, name: &str) -> Option<Value> {
        self.frames
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
    }

    fn assign(&mut self, name: &str, value: Value) -> bool {
        match self.frames.iter_mut().rev().find(|(n, _)| n == name) {
            Some(slot) => {
                slot.1 = value;
                true
            }
            None => false,
        }
    }
}

fn run(program: &Program, scope: &mut Scope) -> Eval<Value> {
    let mut last = Value::Undefined;
    for statement in program.statements() {
        last = eval(statement, scope)?;
    }
    Ok(last)
}

fn eval(expr: &Expr, scope: &mut Scope) -> Eval<Value> {
    match expr {
        Expr::Literal(lit) => Ok(literal(lit)),
        Expr::Array(items) => {
            let values = items
                .iter()
                .map(|item| eval(item, scope))
                .collect::<Eval<Vec<_>>>()?;
            Ok(Value::from(values))
        }
        Expr::Object(entries) => {
            let mapping = Mapping::new();
            for (key, value) in entries {
                let value = eval(value, scope)?;
                mapping.insert(key.clone(), value);
            }
            Ok(Value::Mapping(mapping))
        }
        Expr::Ident(name) => scope
            .lookup(name)
            .ok_or_else(|| EvaluationErrorKind::UndefinedIdentifier { name: name.clone() }),
        Expr::Member { .. } | Expr::Call { .. } => {
            eval_chain(expr, scope).map(Option::unwrap_or_default)
        }
        Expr::Arrow { .. } => Err(EvaluationErrorKind::BareArrowFunction),
        Expr::Unary { op, operand } => eval_unary(*op, operand, scope),
        Expr::Binary { op, lhs, rhs } => {
            let lhs = eval(lhs, scope)?;
            let rhs = eval(rhs, scope)?;
            Ok(binary(*op, &lhs, &rhs))
        }
        Expr::Logical { op, lhs, rhs } => {
            let lhs = eval(lhs, scope)?;
            match (op, lhs.truthy()) {
                (LogicalOp::And, false) | (LogicalOp::Or, true) => Ok(lhs),
                _ => eval(rhs, scope),
            }
        }
        Expr::Conditional {
            test,
            consequent,
            alternate,
        } => {
            if eval(test, scope)?.truthy() {
                eval(consequent, scope)
            } else {
                eval(alternate, scope)
            }
        }
        Expr::Assign { target, value } => eval_assign(target, value, scope),
        Expr::Delete(target) => eval_delete(target, scope),
    }
}

fn literal(lit: &Literal) -> Value {
    match lit {
        Literal::Undefined => Value::Undefined,
        Literal::Null => Value::Null,
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Number(n) => Value::Number(*n),
        Literal::String(s) => Value::String(s.clone()),
    }
}

/// Evaluates a member/call chain. `None` means an optional link hit a
/// nullish value and the rest of the chain was skipped.
fn eval_chain(expr: &Expr, scope: &mut Scope) -> Eval<Option<Value>> {
    match expr {
        Expr::Member {
            object,
            property,
            optional,
        } => {
            let Some(base) = eval_chain(object, scope)? else {
                return Ok(None);
            };
            if *optional && base.is_nullish() {
                return Ok(None);
            }
            let key = property_key(property, scope)?;
            get_property(&base, &key).map(Some)
        }
        Expr::Call { callee, args } => {
            let Expr::Member {
                object,
                property,
                optional,
            } = &**callee
            else {
                eval(callee, scope)?;
                return Err(EvaluationErrorKind::NotCallable);
            };
            let Some(receiver) = eval_chain(object, scope)? else {
                return Ok(None);
            };
            if *optional && receiver.is_nullish() {
                return Ok(None);
            }
            let method = property_key(property, scope)?.to_display_string();
            call_method(&receiver, &method, args, scope).map(Some)
        }
        other => eval(other, scope).map(Some),
    }
}

fn property_key(property: &Property, scope: &mut Scope) -> Eval<Value> {
    match property {
        Property::Named(name) => Ok(Value::String(name.clone())),
        Property::Computed(key) => eval(key, scope),
    }
}

fn nullish_name(value: &Value) -> &'static str {
    if value.is_undefined() {
        "undefined"
    } else {
        "null"
    }
}

/// A key usable as a sequence index.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn as_index(key: &Value) -> Option<usize> {
    let n = match key {
        Value::Number(n) => *n,
        Value::String(s) => {
            let n: f64 = s.parse().ok()?;
            if Value::Number(n).to_display_string() != *s {
                return None;
            }
            n
        }
        _ => return None,
    };
    (n >= 0.0 && n.fract() == 0.0 && n < 4_294_967_295.0).then_some(n as usize)
}

fn get_property(object: &Value, key: &Value) -> Eval<Value> {
    match object {
        Value::Undefined | Value::Null => Err(EvaluationErrorKind::PropertyOfNullish {
            property: key.to_display_string(),
            target: nullish_name(object),
        }),
        Value::Mapping(m) => Ok(m.get(&key.to_display_string()).unwrap_or_default()),
        Value::Sequence(s) => {
            if let Some(index) = as_index(key) {
                return Ok(s.get(index).unwrap_or_default());
            }
            Ok(match key.as_str() {
                Some("length") => Value::from(s.len()),
                _ => Value::Undefined,
            })
        }
        Value::String(s) => {
            if let Some(index) = as_index(key) {
                return Ok(s
                    .encode_utf16()
                    .nth(index)
                    .map_or(Value::Undefined, |unit| {
                        Value::String(String::from_utf16_lossy(&[unit]))
                    }));
            }
            Ok(match key.as_str() {
                Some("length") => Value::from(s.encode_utf16().count()),
                _ => Value::Undefined,
            })
        }
        _ => Ok(Value::Undefined),
    }
}

fn check_growth(s: &Sequence, len: usize, property: &str) -> Eval<()> {
    if len > s.len().saturating_add(MAX_SEQUENCE_GROWTH) {
        return Err(EvaluationErrorKind::InvalidArgument {
            method: property.to_owned(),
            expected: "a length at most 10000 past the current one",
        });
    }
    Ok(())
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn set_property(object: &Value, key: &Value, value: Value) -> Eval<()> {
    let property = key.to_display_string();
    match object {
        Value::Mapping(m) => {
            m.insert(property, value);
            Ok(())
        }
        Value::Sequence(s) => {
            if let Some(index) = as_index(key) {
                check_growth(s, index + 1, &property)?;
                s.set(index, value);
                return Ok(());
            }
            if property != "length" {
                return Err(EvaluationErrorKind::InvalidTarget {
                    property,
                    target: "sequence",
                });
            }
            let len = value.to_number();
            if len < 0.0 || len.fract() != 0.0 || len.is_nan() {
                return Err(EvaluationErrorKind::InvalidArgument {
                    method: property,
                    expected: "a non-negative integer",
                });
            }
            let len = len as usize;
            check_growth(s, len, &property)?;
            s.resize(len);
            Ok(())
        }
        Value::Undefined | Value::Null => Err(EvaluationErrorKind::InvalidTarget {
            property,
            target: nullish_name(object),
        }),
        other => Err(EvaluationErrorKind::InvalidTarget {
            property,
            target: other.type_name(),
        }),
    }
}

fn eval_assign(target: &Expr, value: &Expr, scope: &mut Scope) -> Eval<Value> {
    match target {
        Expr::Ident(name) => {
            let value = eval(value, scope)?;
            if scope.assign(name, value.clone()) {
                Ok(value)
            } else {
                Err(EvaluationErrorKind::UndefinedIdentifier { name: name.clone() })
            }
        }
        Expr::Member {
            object, property, ..
        } => {
            let object = eval(object, scope)?;
            let key = property_key(property, scope)?;
            let value = eval(value, scope)?;
            set_property(&object, &key, value.clone())?;
            Ok(value)
        }
        _ => Err(EvaluationErrorKind::InvalidTarget {
            property: target.to_string(),
            target: "expression",
        }),
    }
}

fn eval_delete(target: &Expr, scope: &mut Scope) -> Eval<Value> {
    let Expr::Member {
        object,
        property,
        optional,
    } = target
    else {
        return Ok(Value::Bool(false));
    };
    let Some(object) = eval_chain(object, scope)? else {
        return Ok(Value::Bool(true));
    };
    if *optional && object.is_nullish() {
        return Ok(Value::Bool(true));
    }
    let key = property_key(property, scope)?;
    match &object {
        Value::Undefined | Value::Null => {
            return Err(EvaluationErrorKind::PropertyOfNullish {
                property: key.to_display_string(),
                target: nullish_name(&object),
            });
        }
        Value::Mapping(m) => {
            m.remove(&key.to_display_string());
        }
        Value::Sequence(s) => {
            if let Some(index) = as_index(&key)
                && index < s.len()
            {
                s.set(index, Value::Undefined);
            }
        }
        _ => {}
    }
    Ok(Value::Bool(true))
}

fn eval_unary(op: UnaryOp, operand: &Expr, scope: &mut Scope) -> Eval<Value> {
    if op == UnaryOp::TypeOf
        && let Expr::Ident(name) = operand
        && scope.lookup(name).is_none()
    {
        return Ok(Value::from("undefined"));
    }
    let value = eval(operand, scope)?;
    Ok(match op {
        UnaryOp::Not => Value::Bool(!value.truthy()),
        UnaryOp::Neg => Value::Number(-value.to_number()),
        UnaryOp::Plus => Value::Number(value.to_number()),
        UnaryOp::TypeOf => Value::from(value.type_name()),
    })
}

fn to_primitive(value: &Value) -> Value {
    if value.is_container() || matches!(value, Value::Opaque(_)) {
        Value::String(value.to_display_string())
    } else {
        value.clone()
    }
}

fn binary(op: BinaryOp, lhs: &Value, rhs: &Value) -> Value {
    match op {
        BinaryOp::Add => {
            let (lhs, rhs) = (to_primitive(lhs), to_primitive(rhs));
            if matches!(lhs, Value::String(_)) || matches!(rhs, Value::String(_)) {
                Value::String(lhs.to_display_string() + &rhs.to_display_string())
            } else {
                Value::Number(lhs.to_number() + rhs.to_number())
            }
        }
        BinaryOp::Sub => Value::Number(lhs.to_number() - rhs.to_number()),
        BinaryOp::Mul => Value::Number(lhs.to_number() * rhs.to_number()),
        BinaryOp::Div => Value::Number(lhs.to_number() / rhs.to_number()),
        BinaryOp::Rem => Value::Number(lhs.to_number() % rhs.to_number()),
        BinaryOp::Lt | BinaryOp::Lte | BinaryOp::Gt | BinaryOp::Gte => {
            Value::Bool(compare(op, lhs, rhs))
        }
        BinaryOp::Eq => Value::Bool(loose_eq(lhs, rhs)),
        BinaryOp::Neq => Value::Bool(!loose_eq(lhs, rhs)),
        BinaryOp::StrictEq => Value::Bool(lhs.same(rhs)),
        BinaryOp::StrictNeq => Value::Bool(!lhs.same(rhs)),
    }
}

fn compare(op: BinaryOp, lhs: &Value, rhs: &Value) -> bool {
    let (lhs, rhs) = (to_primitive(lhs), to_primitive(rhs));
    let ordering = match (&lhs, &rhs) {
        (Value::String(a), Value::String(b)) => Some(a.encode_utf16().cmp(b.encode_utf16())),
        _ => lhs.to_number().partial_cmp(&rhs.to_number()),
    };
    let Some(ordering) = ordering else {
        return false;
    };
    match op {
        BinaryOp::Lt => ordering.is_lt(),
        BinaryOp::Lte => ordering.is_le(),
        BinaryOp::Gt => ordering.is_gt(),
        _ => ordering.is_ge(),
    }
}

/// `==` equality.
fn loose_eq(lhs: &Value, rhs: &Value) -> bool {
    match (lhs, rhs) {
        (a, b) if a.is_nullish() || b.is_nullish() => a.is_nullish() && b.is_nullish(),
        (Value::Number(_), Value::String(_)) | (Value::String(_), Value::Number(_)) => {
            lhs.to_number() == rhs.to_number()
        }
        (Value::Bool(_), _) => loose_eq(&Value::Number(lhs.to_number()), rhs),
        (_, Value::Bool(_)) => loose_eq(lhs, &Value::Number(rhs.to_number())),
        (a, b) if a.is_container() && !b.is_container() => loose_eq(&to_primitive(a), b),
        (a, b) if b.is_container() && !a.is_container() => loose_eq(a, &to_primitive(b)),
        _ => lhs.same(rhs),
    }
}

/// `includes` equality: like `===` but `NaN` matches `NaN`.
fn same_value_zero(lhs: &Value, rhs: &Value) -> bool {
    match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) if a.is_nan() && b.is_nan() => true,
        _ => lhs.same(rhs),
    }
}

fn arg(args: &[Expr], index: usize, scope: &mut Scope) -> Eval<Value> {
    args.get(index)
        .map_or(Ok(Value::Undefined), |expr| eval(expr, scope))
}

fn callback<'a>(method: &str, args: &'a [Expr]) -> Eval<(&'a [String], &'a Expr)> {
    match args.first() {
        Some(Expr::Arrow { params, body }) => Ok((params.as_slice(), &**body)),
        _ => Err(EvaluationErrorKind::InvalidArgument {
            method: method.to_owned(),
            expected: "an arrow function",
        }),
    }
}

/// Calls an arrow body with `(item, index)` bound to its parameters.
fn invoke(
    params: &[String],
    body: &Expr,
    item: Value,
    index: usize,
    scope: &mut Scope,
) -> Eval<Value> {
    let depth = scope.frames.len();
    let mut args = [item, Value::from(index)].into_iter();
    for param in params {
        let value = args.next().unwrap_or_default();
        scope.frames.push((param.clone(), value));
    }
    let result = eval(body, scope);
    scope.frames.truncate(depth);
    result
}

fn call_method(receiver: &Value, method: &str, args: &[Expr], scope: &mut Scope) -> Eval<Value> {
    match receiver {
        Value::Undefined | Value::Null => Err(EvaluationErrorKind::PropertyOfNullish {
            property: method.to_owned(),
            target: nullish_name(receiver),
        }),
        Value::Sequence(seq) => sequence_method(seq, method, args, scope),
        Value::String(s) => string_method(s, method, args, scope),
        Value::Mapping(m) if method == "hasOwnProperty" => {
            let key = arg(args, 0, scope)?;
            Ok(Value::Bool(m.contains_key(&key.to_display_string())))
        }
        Value::Mapping(_) => Err(EvaluationErrorKind::UnknownMethod {
            method: method.to_owned(),
            receiver: "mapping",
        }),
        other => Err(EvaluationErrorKind::UnknownMethod {
            method: method.to_owned(),
            receiver: other.type_name(),
        }),
    }
}

fn sequence_method(
    seq: &Sequence,
    method: &str,
    args: &[Expr],
    scope: &mut Scope,
) -> Eval<Value> {
    match method {
        "some" | "every" | "find" | "filter" | "map" => {
            let (params, body) = callback(method, args)?;
            let items = seq.items();
            let mut mapped = Vec::new();
            for (index, item) in items.into_iter().enumerate() {
                let result = invoke(params, body, item.clone(), index, scope)?;
                match method {
                    "some" if result.truthy() => return Ok(Value::Bool(true)),
                    "every" if !result.truthy() => return Ok(Value::Bool(false)),
                    "find" if result.truthy() => return Ok(item),
                    "filter" if result.truthy() => mapped.push(item),
                    "map" => mapped.push(result),
                    _ => {}
                }
            }
            Ok(match method {
                "some" => Value::Bool(false),
                "every" => Value::Bool(true),
                "find" => Value::Undefined,
                _ => Value::from(mapped),
            })
        }
        "includes" => {
            let needle = arg(args, 0, scope)?;
            Ok(Value::Bool(
                seq.borrow().iter().any(|v| same_value_zero(v, &needle)),
            ))
        }
        "indexOf" => {
            let needle = arg(args, 0, scope)?;
            let position = seq.borrow().iter().position(|v| v.same(&needle));
            Ok(position.map_or(Value::Number(-1.0), Value::from))
        }
        "join" => {
            let separator = match arg(args, 0, scope)? {
                Value::Undefined => ",".to_owned(),
                other => other.to_display_string(),
            };
            let parts: Vec<String> = seq
                .items()
                .iter()
                .map(|v| {
                    if v.is_nullish() {
                        String::new()
                    } else {
                        v.to_display_string()
                    }
                })
                .collect();
            Ok(Value::String(parts.join(&separator)))
        }
        "push" => {
            for index in 0..args.len() {
                let value = arg(args, index, scope)?;
                seq.push(value);
            }
            Ok(Value::from(seq.len()))
        }
        _ => Err(EvaluationErrorKind::UnknownMethod {
            method: method.to_owned(),
            receiver: "sequence",
        }),
    }
}

fn utf16_index(haystack: &str, byte_offset: usize) -> usize {
    haystack[..byte_offset].encode_utf16().count()
}

fn string_method(s: &str, method: &str, args: &[Expr], scope: &mut Scope) -> Eval<Value> {
    match method {
        "toLowerCase" => Ok(Value::String(s.to_lowercase())),
        "toUpperCase" => Ok(Value::String(s.to_uppercase())),
        "trim" => Ok(Value::String(s.trim().to_owned())),
        "includes" | "startsWith" | "endsWith" | "indexOf" => {
            let needle = arg(args, 0, scope)?.to_display_string();
            Ok(match method {
                "includes" => Value::Bool(s.contains(needle.as_str())),
                "startsWith" => Value::Bool(s.starts_with(needle.as_str())),
                "endsWith" => Value::Bool(s.ends_with(needle.as_str())),
                _ => s
                    .find(needle.as_str())
                    .map_or(Value::Number(-1.0), |at| Value::from(utf16_index(s, at))),
            })
        }
        _ => Err(EvaluationErrorKind::UnknownMethod {
            method: method.to_owned(),
            receiver: "string",
        }),
    }
}
