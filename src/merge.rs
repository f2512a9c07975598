use crate::types::{
    Mapping, MergeOptions, Operation, RESERVED_KEYS, RecursionLimitError, Value,
};

/// Recursively merges value graphs into a target, in place.
#[derive(Debug, Clone, Default)]
pub struct StructuralMerger {
    options: MergeOptions,
}

impl StructuralMerger {
    #[must_use]
    pub fn new(options: MergeOptions) -> Self {
        Self { options }
    }

    #[must_use]
    pub fn options(&self) -> &MergeOptions {
        &self.options
    }

    /// Merges each source into `target` in order and returns `target`.
    ///
    /// Two mappings merge key by key, recursing wherever both sides hold a
    /// container and otherwise storing the source entry. Two sequences
    /// combine through the configured [`ArrayMerger`](crate::ArrayMerger).
    /// A mapping paired with a sequence leaves the target untouched, as does
    /// a source that is `target` itself.
    ///
    /// # Errors
    ///
    /// Returns [`RecursionLimitError`] when the merge nests deeper than the
    /// configured maximum depth.
    pub fn merge(&self, target: &Value, sources: &[Value]) -> Result<Value, RecursionLimitError> {
        for source in sources {
            if source.same(target) {
                continue;
            }
            self.merge_pair(target, source, 0)?;
        }
        Ok(target.clone())
    }

    fn merge_pair(
        &self,
        target: &Value,
        source: &Value,
        depth: usize,
    ) -> Result<(), RecursionLimitError> {
        if depth >= self.options.max_depth {
            return Err(RecursionLimitError::new(
                Operation::Merge,
                self.options.max_depth,
            ));
        }
        match (target, source) {
            (Value::Mapping(target), Value::Mapping(source)) => {
                self.merge_mapping(target, source, depth)?;
            }
            (Value::Sequence(target), Value::Sequence(source)) => {
                self.options.array_merger.combine(target, source);
            }
            _ => {}
        }
        Ok(())
    }

    fn merge_mapping(
        &self,
        target: &Mapping,
        source: &Mapping,
        depth: usize,
    ) -> Result<(), RecursionLimitError> {
        for (key, incoming) in source.entries() {
            if RESERVED_KEYS.contains(&key.as_str()) {
                continue;
            }
            let existing = target.get(&key).unwrap_or_default();
            if existing.is_container() && incoming.is_container() {
                if !existing.same(&incoming) {
                    self.merge_pair(&existing, &incoming, depth + 1)?;
                }
            } else if !(self.options.skip_undefined && incoming.is_undefined()) {
                target.insert(key, incoming);
            }
        }
        Ok(())
    }
}

/// Merges `sources` into `target` with `options`. See [`StructuralMerger::merge`].
///
/// # Errors
///
/// Returns [`RecursionLimitError`] when the merge nests deeper than
/// `options.max_depth`.
pub fn merge(
    options: &MergeOptions,
    target: &Value,
    sources: &[Value],
) -> Result<Value, RecursionLimitError> {
    StructuralMerger::new(options.clone()).merge(target, sources)
}
