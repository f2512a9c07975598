use crate::types::{
    CloneOptions, Mapping, Operation, RESERVED_KEYS, RecursionLimitError, Sequence, Value,
};

/// One container visited on the current branch and the copy made for it.
struct CloneRecord {
    original: usize,
    cloned: Value,
}

/// Deep-copies value graphs.
///
/// [`deep_clone`](Self::deep_clone) preserves identity along each branch: a
/// container that refers back to one of its ancestors is wired to that
/// ancestor's copy. A container shared by two sibling branches is copied once
/// per branch.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralCloner {
    options: CloneOptions,
}

impl StructuralCloner {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_options(options: CloneOptions) -> Self {
        Self { options }
    }

    #[must_use]
    pub fn options(&self) -> CloneOptions {
        self.options
    }

    /// Copies every mapping and sequence reachable from `value`.
    ///
    /// Scalars and opaque values are returned as-is. Reserved keys
    /// (`__proto__`, `constructor`, `prototype`) are not copied.
    ///
    /// # Errors
    ///
    /// Returns [`RecursionLimitError`] when containers nest deeper than the
    /// configured maximum depth.
    pub fn deep_clone(&self, value: &Value) -> Result<Value, RecursionLimitError> {
        let mut ancestors = Vec::new();
        self.clone_value(value, &mut ancestors)
    }

    /// Copies through the plain JSON representation.
    ///
    /// Faster for scalar-heavy payloads but lossy: opaque values and
    /// `undefined` mapping entries are dropped and shared containers are
    /// duplicated. A top-level `undefined` stays `undefined`.
    ///
    /// # Errors
    ///
    /// Returns [`RecursionLimitError`] when the graph is nested deeper than
    /// the configured maximum depth, which includes any cyclic graph.
    pub fn simple_clone(&self, value: &Value) -> Result<Value, RecursionLimitError> {
        if value.is_undefined() {
            return Ok(Value::Undefined);
        }
        let json = value
            .to_json(self.options.max_depth)
            .map_err(|_| RecursionLimitError::new(Operation::Clone, self.options.max_depth))?;
        Ok(Value::from_json(json))
    }

    /// Replaces every direct child of a container with a deep clone of
    /// itself, leaving the container's own handle in place.
    ///
    /// Non-containers are left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`RecursionLimitError`] when a child is nested too deeply.
    pub fn clone_children(&self, value: &Value) -> Result<(), RecursionLimitError> {
        match value {
            Value::Mapping(map) => {
                for (key, child) in map.entries() {
                    let copy = self.deep_clone(&child)?;
                    map.insert(key, copy);
                }
            }
            Value::Sequence(seq) => {
                for (index, child) in seq.items().iter().enumerate() {
                    let copy = self.deep_clone(child)?;
                    seq.set(index, copy);
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn clone_value(
        &self,
        value: &Value,
        ancestors: &mut Vec<CloneRecord>,
    ) -> Result<Value, RecursionLimitError> {
        let Some(addr) = value.container_addr() else {
            return Ok(value.clone());
        };
        if let Some(record) = ancestors.iter().rev().find(|r| r.original == addr) {
            return Ok(record.cloned.clone());
        }
        if ancestors.len() >= self.options.max_depth {
            return Err(RecursionLimitError::new(
                Operation::Clone,
                self.options.max_depth,
            ));
        }

        let depth = ancestors.len();
        let result = match value {
            Value::Mapping(source) => self.clone_mapping(source, addr, ancestors),
            Value::Sequence(source) => self.clone_sequence(source, addr, ancestors),
            _ => Ok(value.clone()),
        };
        ancestors.truncate(depth);
        result
    }

    fn clone_mapping(
        &self,
        source: &Mapping,
        addr: usize,
        ancestors: &mut Vec<CloneRecord>,
    ) -> Result<Value, RecursionLimitError> {
        let target = Mapping::new();
        ancestors.push(CloneRecord {
            original: addr,
            cloned: Value::Mapping(target.clone()),
        });
        for (key, child) in source.entries() {
            if RESERVED_KEYS.contains(&key.as_str()) {
                continue;
            }
            let copy = self.clone_value(&child, ancestors)?;
            target.insert(key, copy);
        }
        Ok(Value::Mapping(target))
    }

    fn clone_sequence(
        &self,
        source: &Sequence,
        addr: usize,
        ancestors: &mut Vec<CloneRecord>,
    ) -> Result<Value, RecursionLimitError> {
        let target = Sequence::new();
        ancestors.push(CloneRecord {
            original: addr,
            cloned: Value::Sequence(target.clone()),
        });
        for child in source.items() {
            let copy = self.clone_value(&child, ancestors)?;
            target.push(copy);
        }
        Ok(Value::Sequence(target))
    }
}
