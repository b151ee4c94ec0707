use std::collections::BTreeSet;

use super::scalar::ScalarKind;

/// Default recursion budget for [`RenderOptions`].
pub const DEFAULT_MAX_DEPTH: usize = 128;

/// Options controlling compilation.
#[derive(Debug, Clone)]
pub struct CompileOptions {
    primitives: BTreeSet<ScalarKind>,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            primitives: ScalarKind::BUILTINS.into_iter().collect(),
        }
    }
}

impl CompileOptions {
    /// Options recognising the built-in primitive kinds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an empty primitive set.
    #[must_use]
    pub fn without_builtins(mut self) -> Self {
        self.primitives.clear();
        self
    }

    /// Recognise `name` as a primitive placeholder target. Built-in names
    /// re-enable their validating kind; other names accept any scalar.
    #[must_use]
    pub fn with_primitive(mut self, name: &str) -> Self {
        self.primitives.insert(ScalarKind::from_name(name));
        self
    }

    /// Look up a primitive kind by type name.
    #[must_use]
    pub fn primitive(&self, name: &str) -> Option<&ScalarKind> {
        self.primitives.iter().find(|k| k.name() == name)
    }

    pub fn primitives(&self) -> impl Iterator<Item = &ScalarKind> {
        self.primitives.iter()
    }
}

/// Per-call render limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    max_depth: usize,
    max_output_len: Option<usize>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_output_len: None,
        }
    }
}

impl RenderOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Maximum number of nested rule invocations. The rule passed to
    /// `render` counts as depth 1.
    #[must_use]
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Maximum output length in bytes.
    #[must_use]
    pub fn max_output_len(mut self, len: usize) -> Self {
        self.max_output_len = Some(len);
        self
    }

    #[must_use]
    pub fn depth_limit(&self) -> usize {
        self.max_depth
    }

    #[must_use]
    pub fn output_limit(&self) -> Option<usize> {
        self.max_output_len
    }
}
