use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Deserializer};

use super::value::{Sequence, Value};

/// Default bound for every recursive operation.
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Reserved UI-schema key holding a node's options.
pub const OPTIONS_KEY: &str = "ui:options";

/// Key under [`OPTIONS_KEY`] holding the node's rule list.
pub const RULES_KEY: &str = "formRules";

/// Mapping keys the cloner and merger never copy.
pub const RESERVED_KEYS: [&str; 3] = ["__proto__", "constructor", "prototype"];

/// Settings for [`RuleEngine`](crate::RuleEngine).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Replace the children of every binding an expression mentions with
    /// fresh clones before evaluating it.
    pub isolate_bindings: bool,
    /// Reject rules that define only one of `if`/`then`.
    pub strict_rules: bool,
    /// Depth limit for binding isolation.
    pub max_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            isolate_bindings: true,
            strict_rules: false,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl EngineConfig {
    #[must_use]
    pub fn isolate_bindings(mut self, enabled: bool) -> Self {
        self.isolate_bindings = enabled;
        self
    }

    #[must_use]
    pub fn strict_rules(mut self, enabled: bool) -> Self {
        self.strict_rules = enabled;
        self
    }

    #[must_use]
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }
}

/// Settings for [`StructuralCloner`](crate::StructuralCloner).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CloneOptions {
    pub max_depth: usize,
}

impl Default for CloneOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Settings for [`FormWalker`](crate::FormWalker).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WalkOptions {
    pub max_depth: usize,
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self { max_depth: 64 }
    }
}

type Combinator = dyn Fn(&mut Vec<Value>, &[Value]);

/// How two sequences combine during a structural merge.
#[derive(Clone, Default)]
pub enum ArrayMerger {
    /// Replace the target's contents with the source's.
    #[default]
    Overwrite,
    /// Append the source's elements to the target.
    Append,
    Custom(Rc<Combinator>),
}

impl ArrayMerger {
    /// A caller-supplied combinator. It receives the target's elements and
    /// a snapshot of the source's.
    pub fn custom(f: impl Fn(&mut Vec<Value>, &[Value]) + 'static) -> Self {
        ArrayMerger::Custom(Rc::new(f))
    }

    pub(crate) fn combine(&self, target: &Sequence, source: &Sequence) {
        let incoming = source.items();
        let mut items = target.borrow_mut();
        match self {
            ArrayMerger::Overwrite => {
                items.clear();
                items.extend(incoming);
            }
            ArrayMerger::Append => items.extend(incoming),
            ArrayMerger::Custom(f) => f(&mut items, &incoming),
        }
    }
}

impl fmt::Debug for ArrayMerger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArrayMerger::Overwrite => f.write_str("Overwrite"),
            ArrayMerger::Append => f.write_str("Append"),
            ArrayMerger::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl<'de> Deserialize<'de> for ArrayMerger {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(rename_all = "lowercase")]
        enum Named {
            Overwrite,
            Append,
        }

        Ok(match Named::deserialize(deserializer)? {
            Named::Overwrite => ArrayMerger::Overwrite,
            Named::Append => ArrayMerger::Append,
        })
    }
}

/// Settings for [`StructuralMerger`](crate::StructuralMerger).
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MergeOptions {
    pub array_merger: ArrayMerger,
    /// Leave the target untouched where the source holds `undefined`.
    pub skip_undefined: bool,
    pub max_depth: usize,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            array_merger: ArrayMerger::Overwrite,
            skip_undefined: false,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl MergeOptions {
    #[must_use]
    pub fn array_merger(mut self, merger: ArrayMerger) -> Self {
        self.array_merger = merger;
        self
    }

    #[must_use]
    pub fn skip_undefined(mut self, enabled: bool) -> Self {
        self.skip_undefined = enabled;
        self
    }

    #[must_use]
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }
}
