use std::fmt;

use thiserror::Error;

/// A placeholder whose target names neither a rule nor a known primitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedReference {
    pub rule: String,
    pub placeholder: String,
    pub target: String,
}

impl fmt::Display for UnresolvedReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' in rule '{}' -> '{}'", self.placeholder, self.rule, self.target)
    }
}

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("unresolved rule reference: {}", join(references))]
    UnresolvedRuleReference { references: Vec<UnresolvedReference> },

    #[error("duplicate rule name '{name}'")]
    DuplicateRule { name: String },

    #[error("rule '{name}' has no alternatives")]
    EmptyRule { name: String },

    #[error("undefined constant '{reference}' in define '{constant}'")]
    UndefinedConstant { constant: String, reference: String },

    #[error("cyclic constant definition: {}", path.join(" -> "))]
    CyclicConstant { path: Vec<String> },

    #[error("invalid regex '{pattern}' in rule '{rule}': {source}")]
    InvalidRegex {
        rule: String,
        pattern: String,
        source: regex::Error,
    },
}

/// Errors produced by a single render call. A failed render never yields
/// partial output.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("unknown rule '{name}'")]
    UnknownRule { name: String },

    #[error("no alternative of rule '{rule}' matches the input at {path}")]
    NoMatchingAlternative { rule: String, path: String },

    #[error("recursion limit of {limit} exceeded expanding rule '{rule}' at {path}")]
    RecursionLimitExceeded {
        rule: String,
        limit: usize,
        path: String,
    },

    #[error("output exceeds the limit of {limit} bytes")]
    OutputLimitExceeded { limit: usize },
}

fn join(references: &[UnresolvedReference]) -> String {
    references
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
