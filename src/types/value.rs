use std::any::Any;
use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use super::error::{Operation, RecursionLimitError};

/// Ordered key/value storage behind a [`Mapping`] handle.
pub type Map = IndexMap<String, Value>;

/// A node of a form-description graph: schema, UI schema or data.
///
/// Containers are shared handles. Cloning a `Value` that holds a
/// [`Mapping`] or [`Sequence`] copies the handle, not the contents, so two
/// values can point at the same container. Use
/// [`StructuralCloner`](crate::StructuralCloner) to copy contents.
#[derive(Clone, Default)]
pub enum Value {
    /// The "absent" marker. Reads of missing keys produce it.
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Mapping(Mapping),
    Sequence(Sequence),
    /// A caller-owned value the engine never looks into.
    Opaque(Opaque),
}

/// Structural classification of a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Mapping,
    Sequence,
    Scalar,
    Opaque,
}

/// Shared, mutable, insertion-ordered mapping.
#[derive(Clone, Default)]
pub struct Mapping(Rc<RefCell<Map>>);

/// Shared, mutable sequence.
#[derive(Clone, Default)]
pub struct Sequence(Rc<RefCell<Vec<Value>>>);

/// Shared handle to an arbitrary caller value.
#[derive(Clone)]
pub struct Opaque(Rc<dyn Any>);

impl Mapping {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_map(map: Map) -> Self {
        Self(Rc::new(RefCell::new(map)))
    }

    /// Returns the value stored at `key`, sharing any container it holds.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        self.0.borrow().get(key).cloned()
    }

    pub fn insert(&self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.borrow_mut().insert(key.into(), value.into())
    }

    /// Removes `key`, keeping the order of the remaining entries.
    pub fn remove(&self, key: &str) -> Option<Value> {
        self.0.borrow_mut().shift_remove(key)
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.borrow().contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.0.borrow().keys().cloned().collect()
    }

    /// Snapshot of the entries. The mapping may be mutated while the
    /// snapshot is iterated.
    #[must_use]
    pub fn entries(&self) -> Vec<(String, Value)> {
        self.0
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn borrow(&self) -> Ref<'_, Map> {
        self.0.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, Map> {
        self.0.borrow_mut()
    }

    /// Reference identity.
    #[must_use]
    pub fn ptr_eq(&self, other: &Mapping) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn addr(&self) -> usize {
        Rc::as_ptr(&self.0).cast::<()>() as usize
    }
}

impl Sequence {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_vec(items: Vec<Value>) -> Self {
        Self(Rc::new(RefCell::new(items)))
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<Value> {
        self.0.borrow().get(index).cloned()
    }

    /// Stores `value` at `index`, padding with [`Value::Undefined`] when the
    /// index is past the end.
    pub fn set(&self, index: usize, value: impl Into<Value>) {
        let mut items = self.0.borrow_mut();
        if index >= items.len() {
            items.resize(index + 1, Value::Undefined);
        }
        items[index] = value.into();
    }

    pub fn push(&self, value: impl Into<Value>) {
        self.0.borrow_mut().push(value.into());
    }

    /// Truncates or pads with [`Value::Undefined`] to `len` elements.
    pub fn resize(&self, len: usize) {
        self.0.borrow_mut().resize(len, Value::Undefined);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    /// Snapshot of the elements.
    #[must_use]
    pub fn items(&self) -> Vec<Value> {
        self.0.borrow().clone()
    }

    pub fn borrow(&self) -> Ref<'_, Vec<Value>> {
        self.0.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, Vec<Value>> {
        self.0.borrow_mut()
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Sequence) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn addr(&self) -> usize {
        Rc::as_ptr(&self.0).cast::<()>() as usize
    }
}

impl Opaque {
    pub fn new<T: Any>(value: T) -> Self {
        Self(Rc::new(value))
    }

    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Opaque) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Value {
    /// A fresh, empty mapping.
    #[must_use]
    pub fn mapping() -> Self {
        Value::Mapping(Mapping::new())
    }

    /// A fresh, empty sequence.
    #[must_use]
    pub fn sequence() -> Self {
        Value::Sequence(Sequence::new())
    }

    #[must_use]
    pub fn kind(&self) -> Kind {
        match self {
            Value::Mapping(_) => Kind::Mapping,
            Value::Sequence(_) => Kind::Sequence,
            Value::Opaque(_) => Kind::Opaque,
            _ => Kind::Scalar,
        }
    }

    #[must_use]
    pub fn is_container(&self) -> bool {
        matches!(self, Value::Mapping(_) | Value::Sequence(_))
    }

    #[must_use]
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// `true` for `undefined` and `null`.
    #[must_use]
    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    #[must_use]
    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            Value::Mapping(m) => Some(m),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_sequence(&self) -> Option<&Sequence> {
        match self {
            Value::Sequence(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Looks up `key` when this is a mapping; [`Value::Undefined`] otherwise.
    #[must_use]
    pub fn get(&self, key: &str) -> Value {
        self.as_mapping()
            .and_then(|m| m.get(key))
            .unwrap_or_default()
    }

    /// Truthiness as used by rule conditions.
    #[must_use]
    pub fn truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Mapping(_) | Value::Sequence(_) | Value::Opaque(_) => true,
        }
    }

    /// The `typeof` name of this value.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Null | Value::Mapping(_) | Value::Sequence(_) | Value::Opaque(_) => "object",
        }
    }

    /// Strict identity: containers compare by reference, scalars by value.
    /// `NaN` is never the same as anything.
    #[must_use]
    pub fn same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Mapping(a), Value::Mapping(b)) => a.ptr_eq(b),
            (Value::Sequence(a), Value::Sequence(b)) => a.ptr_eq(b),
            (Value::Opaque(a), Value::Opaque(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// Address of the container, if this is one.
    pub(crate) fn container_addr(&self) -> Option<usize> {
        match self {
            Value::Mapping(m) => Some(m.addr()),
            Value::Sequence(s) => Some(s.addr()),
            _ => None,
        }
    }

    /// Numeric coercion.
    #[must_use]
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined | Value::Mapping(_) | Value::Opaque(_) => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Number(n) => *n,
            Value::String(s) => parse_number(s),
            Value::Sequence(_) => parse_number(&self.to_display_string()),
        }
    }

    /// String coercion.
    #[must_use]
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Undefined => "undefined".to_owned(),
            Value::Null => "null".to_owned(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::String(s) => s.clone(),
            Value::Sequence(s) => s
                .items()
                .iter()
                .map(|v| {
                    if v.is_nullish() {
                        String::new()
                    } else {
                        v.to_display_string()
                    }
                })
                .collect::<Vec<_>>()
                .join(","),
            Value::Mapping(_) | Value::Opaque(_) => "[object Object]".to_owned(),
        }
    }

    /// Builds a fresh value graph from JSON. Every container is new.
    #[must_use]
    pub fn from_json(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => Value::Sequence(Sequence::from_vec(
                items.into_iter().map(Value::from_json).collect(),
            )),
            serde_json::Value::Object(map) => Value::Mapping(Mapping::from_map(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from_json(v)))
                    .collect(),
            )),
        }
    }

    /// Plain JSON rendition of this value.
    ///
    /// `undefined` and opaque entries are dropped from mappings and become
    /// `null` inside sequences. Non-finite numbers become `null`.
    ///
    /// # Errors
    ///
    /// Returns [`RecursionLimitError`] when the graph is nested deeper than
    /// `max_depth`, which includes any cyclic graph.
    pub fn to_json(&self, max_depth: usize) -> Result<serde_json::Value, RecursionLimitError> {
        self.to_json_at(max_depth, 0)
    }

    fn to_json_at(
        &self,
        max_depth: usize,
        depth: usize,
    ) -> Result<serde_json::Value, RecursionLimitError> {
        if self.is_container() && depth >= max_depth {
            return Err(RecursionLimitError::new(Operation::Serialize, max_depth));
        }
        Ok(match self {
            Value::Undefined | Value::Null | Value::Opaque(_) => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => number_to_json(*n),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Sequence(seq) => serde_json::Value::Array(
                seq.items()
                    .iter()
                    .map(|v| v.to_json_at(max_depth, depth + 1))
                    .collect::<Result<_, _>>()?,
            ),
            Value::Mapping(map) => {
                let mut out = serde_json::Map::new();
                for (key, v) in map.entries() {
                    if matches!(v, Value::Undefined | Value::Opaque(_)) {
                        continue;
                    }
                    out.insert(key, v.to_json_at(max_depth, depth + 1)?);
                }
                serde_json::Value::Object(out)
            }
        })
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn number_to_json(n: f64) -> serde_json::Value {
    if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        serde_json::Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n).map_or(serde_json::Value::Null, serde_json::Value::Number)
    }
}

fn parse_number(s: &str) -> f64 {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    match trimmed {
        "Infinity" | "+Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        _ if trimmed.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') => {
            f64::NAN
        }
        _ => trimmed.parse().unwrap_or(f64::NAN),
    }
}

#[allow(clippy::cast_possible_truncation)]
pub(crate) fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_owned()
    } else if n.is_infinite() {
        (if n > 0.0 { "Infinity" } else { "-Infinity" }).to_owned()
    } else if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

impl PartialEq for Value {
    /// Deep structural equality. Not meant for cyclic graphs.
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Mapping(a), Value::Mapping(b)) => {
                if a.ptr_eq(b) {
                    return true;
                }
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| b.get(k).is_some_and(|other| v == other))
            }
            (Value::Sequence(a), Value::Sequence(b)) => {
                a.ptr_eq(b) || *a.borrow() == *b.borrow()
            }
            _ => self.same(other),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Number(v)
    }
}

impl From<i64> for Value {
    #[allow(clippy::cast_precision_loss)]
    fn from(v: i64) -> Self {
        Value::Number(v as f64)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Number(f64::from(v))
    }
}

impl From<usize> for Value {
    #[allow(clippy::cast_precision_loss)]
    fn from(v: usize) -> Self {
        Value::Number(v as f64)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Mapping> for Value {
    fn from(v: Mapping) -> Self {
        Value::Mapping(v)
    }
}

impl From<Sequence> for Value {
    fn from(v: Sequence) -> Self {
        Value::Sequence(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Sequence(Sequence::from_vec(v))
    }
}

impl From<Opaque> for Value {
    fn from(v: Opaque) -> Self {
        Value::Opaque(v)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value::from_json(v)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => f.write_str(&format_number(*n)),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Mapping(m) => fmt::Debug::fmt(m, f),
            Value::Sequence(s) => fmt::Debug::fmt(s, f),
            Value::Opaque(o) => fmt::Debug::fmt(o, f),
        }
    }
}

impl fmt::Debug for Mapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(map) => f.debug_map().entries(map.iter()).finish(),
            Err(_) => f.write_str("{<borrowed>}"),
        }
    }
}

impl fmt::Debug for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(items) => f.debug_list().entries(items.iter()).finish(),
            Err(_) => f.write_str("[<borrowed>]"),
        }
    }
}

impl fmt::Debug for Opaque {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Opaque(..)")
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            other => match other.to_json(super::config::DEFAULT_MAX_DEPTH) {
                Ok(json) => write!(f, "{json}"),
                Err(_) => f.write_str("[Circular]"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn from_json_builds_containers() {
        let v = Value::from_json(json!({"a": [1, "x", null], "b": {"c": true}}));
        assert_eq!(v.kind(), Kind::Mapping);
        assert_eq!(v.get("a").kind(), Kind::Sequence);
        assert_eq!(v.get("b").get("c"), Value::Bool(true));
        assert!(v.get("missing").is_undefined());
    }

    #[test]
    fn to_json_drops_undefined_entries() {
        let m = Mapping::new();
        m.insert("a", 1);
        m.insert("b", Value::Undefined);
        m.insert("c", Opaque::new(5_u8));
        let seq: Value = vec![Value::Undefined, Value::from(2)].into();
        m.insert("d", seq);
        let json = Value::Mapping(m).to_json(8).unwrap();
        assert_eq!(json, json!({"a": 1, "d": [null, 2]}));
    }

    #[test]
    fn to_json_integral_numbers_stay_integers() {
        assert_eq!(Value::from(3).to_json(1).unwrap(), json!(3));
        assert_eq!(Value::from(2.5).to_json(1).unwrap(), json!(2.5));
        assert_eq!(Value::from(f64::NAN).to_json(1).unwrap(), json!(null));
    }

    #[test]
    fn to_json_stops_on_cycles() {
        let m = Mapping::new();
        m.insert("self", m.clone());
        let err = Value::Mapping(m.clone()).to_json(16).unwrap_err();
        assert_eq!(err.limit(), 16);
        m.remove("self");
    }

    #[test]
    fn kind_classification() {
        assert_eq!(Value::mapping().kind(), Kind::Mapping);
        assert_eq!(Value::sequence().kind(), Kind::Sequence);
        assert_eq!(Value::from("s").kind(), Kind::Scalar);
        assert_eq!(Value::Null.kind(), Kind::Scalar);
        assert_eq!(Value::Undefined.kind(), Kind::Scalar);
        assert_eq!(Value::from(Opaque::new(1_u32)).kind(), Kind::Opaque);
    }

    #[test]
    fn truthiness() {
        assert!(!Value::Undefined.truthy());
        assert!(!Value::Null.truthy());
        assert!(!Value::from(0).truthy());
        assert!(!Value::from(f64::NAN).truthy());
        assert!(!Value::from("").truthy());
        assert!(Value::from("0").truthy());
        assert!(Value::mapping().truthy());
        assert!(Value::sequence().truthy());
    }

    #[test]
    fn same_is_identity_for_containers() {
        let a = Value::from_json(json!({"x": 1}));
        let b = Value::from_json(json!({"x": 1}));
        assert!(a.same(&a.clone()));
        assert!(!a.same(&b));
        assert_eq!(a, b);
    }

    #[test]
    fn same_nan_is_never_same() {
        let nan = Value::from(f64::NAN);
        assert!(!nan.same(&nan));
    }

    #[test]
    fn number_coercion() {
        assert_eq!(Value::from(" 42 ").to_number(), 42.0);
        assert_eq!(Value::from("").to_number(), 0.0);
        assert!(Value::from("abc").to_number().is_nan());
        assert_eq!(Value::Bool(true).to_number(), 1.0);
        assert_eq!(Value::Null.to_number(), 0.0);
        assert!(Value::Undefined.to_number().is_nan());
        let single: Value = vec![Value::from("7")].into();
        assert_eq!(single.to_number(), 7.0);
    }

    #[test]
    fn display_string_coercion() {
        assert_eq!(Value::from(3).to_display_string(), "3");
        assert_eq!(Value::from(0.5).to_display_string(), "0.5");
        let seq: Value = vec![Value::from(1), Value::Null, Value::from("a")].into();
        assert_eq!(seq.to_display_string(), "1,,a");
        assert_eq!(Value::mapping().to_display_string(), "[object Object]");
    }

    #[test]
    fn sequence_set_pads_with_undefined() {
        let s = Sequence::new();
        s.set(2, "c");
        assert_eq!(s.len(), 3);
        assert!(s.get(0).unwrap().is_undefined());
        assert_eq!(s.get(2), Some(Value::from("c")));
    }

    #[test]
    fn mapping_remove_keeps_order() {
        let m = Mapping::new();
        m.insert("a", 1);
        m.insert("b", 2);
        m.insert("c", 3);
        m.remove("b");
        assert_eq!(m.keys(), vec!["a".to_owned(), "c".to_owned()]);
    }

    #[test]
    fn display_renders_json() {
        let v = Value::from_json(json!({"a": [1, 2]}));
        assert_eq!(v.to_string(), r#"{"a":[1,2]}"#);
        assert_eq!(Value::Undefined.to_string(), "undefined");
    }

    #[test]
    fn opaque_downcast() {
        let o = Opaque::new(String::from("handle"));
        assert_eq!(o.downcast_ref::<String>().map(String::as_str), Some("handle"));
        assert!(o.downcast_ref::<u8>().is_none());
    }
}
