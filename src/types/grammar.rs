use std::collections::HashMap;
use std::fmt;

use super::error::{CompileError, RenderError};
use super::options::{CompileOptions, RenderOptions};
use super::rule::{
    Alternative, CompiledBody, CompiledRule, ConstantValue, Modifier, Placeholder, RuleBody,
    RuleDefinition, RuleHandle, Segment,
};
use super::value::RenderValue;
use crate::parse::RuleTable;

/// Name of the rule [`CompiledGrammar::render_main`] starts from.
pub const ENTRY_RULE: &str = "Main";

/// Builder for constructing a [`CompiledGrammar`] without grammar source.
///
/// # Example
///
/// ```
/// use tmpl::{GrammarBuilder, Modifier, RenderValue};
///
/// let grammar = GrammarBuilder::new()
///     .rule("Call", |r| {
///         r.alt(|a| {
///             a.slot("name", "ident")
///                 .lit("(")
///                 .slot_with("args", "ident", Modifier::separated(", "))
///                 .lit(")")
///         })
///     })
///     .compile()
///     .unwrap();
///
/// let input = RenderValue::record().set("name", "f").set("args", vec!["a", "b"]);
/// assert_eq!(grammar.render("Call", &input).unwrap(), "f(a, b)");
/// ```
#[derive(Debug, Default)]
pub struct GrammarBuilder {
    rules: Vec<RuleDefinition>,
}

/// Intermediate builder passed to the rule definition closure.
#[derive(Debug, Default)]
pub struct RuleBuilder {
    alternatives: Vec<Alternative>,
}

/// Builds the segments of one alternative, in order.
#[derive(Debug, Default)]
pub struct AlternativeBuilder {
    segments: Vec<Segment>,
}

impl GrammarBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Define a template rule. The closure adds alternatives with `.alt(..)`.
    ///
    /// A rule with no alternatives fails compilation with
    /// [`CompileError::EmptyRule`].
    #[must_use]
    pub fn rule(mut self, name: &str, f: impl FnOnce(RuleBuilder) -> RuleBuilder) -> Self {
        let builder = f(RuleBuilder::default());
        self.rules.push(RuleDefinition {
            name: name.to_owned(),
            body: RuleBody::Alternatives(builder.alternatives),
        });
        self
    }

    /// Define a constant, the builder form of `define NAME: VALUE;`.
    #[must_use]
    pub fn constant(mut self, name: &str, value: ConstantValue) -> Self {
        self.rules.push(RuleDefinition {
            name: name.to_owned(),
            body: RuleBody::Constant(value),
        });
        self
    }

    /// Collect the definitions into a [`RuleTable`].
    ///
    /// # Errors
    ///
    /// Returns [`CompileError::DuplicateRule`] if a name is defined twice.
    pub fn into_table(self) -> Result<RuleTable, CompileError> {
        let mut table = RuleTable::new();
        for rule in self.rules {
            table
                .insert(rule)
                .map_err(|dup| CompileError::DuplicateRule { name: dup.name })?;
        }
        Ok(table)
    }

    /// Compile with the default [`CompileOptions`].
    ///
    /// # Errors
    ///
    /// Returns [`CompileError`] if validation fails.
    pub fn compile(self) -> Result<CompiledGrammar, CompileError> {
        self.compile_with(&CompileOptions::default())
    }

    /// # Errors
    ///
    /// Returns [`CompileError`] if validation fails.
    pub fn compile_with(self, options: &CompileOptions) -> Result<CompiledGrammar, CompileError> {
        crate::compile::compile(self.into_table()?, options)
    }
}

impl RuleBuilder {
    /// Append an alternative. Alternatives are tried in the order added.
    #[must_use]
    pub fn alt(mut self, f: impl FnOnce(AlternativeBuilder) -> AlternativeBuilder) -> Self {
        let builder = f(AlternativeBuilder::default());
        self.alternatives.push(Alternative {
            segments: builder.segments,
        });
        self
    }
}

impl AlternativeBuilder {
    /// Literal text, emitted verbatim.
    #[must_use]
    pub fn lit(mut self, text: &str) -> Self {
        self.segments.push(Segment::Literal(text.to_owned()));
        self
    }

    /// `<name:target>`: exactly one value read from field `name`.
    #[must_use]
    pub fn slot(self, name: &str, target: &str) -> Self {
        self.slot_with(name, target, Modifier::Once)
    }

    /// `<name:target>` with a repetition or optionality modifier.
    #[must_use]
    pub fn slot_with(mut self, name: &str, target: &str, modifier: Modifier) -> Self {
        self.segments.push(Segment::Placeholder(Placeholder {
            name: Some(name.to_owned()),
            target: target.to_owned(),
            modifier,
        }));
        self
    }

    /// `<target>`: binds the whole value of the enclosing rule.
    #[must_use]
    pub fn inline(mut self, target: &str, modifier: Modifier) -> Self {
        self.segments.push(Segment::Placeholder(Placeholder {
            name: None,
            target: target.to_owned(),
            modifier,
        }));
        self
    }
}

/// A compiled, immutable grammar. Thread-safe and designed to live behind
/// `Arc`; any number of renders may run against it concurrently.
#[derive(Debug)]
pub struct CompiledGrammar {
    pub(crate) rules: Vec<CompiledRule>,
    pub(crate) rule_indices: HashMap<String, usize>,
    /// Per rule: whether it can reach itself through placeholders.
    pub(crate) recursive: Vec<bool>,
}

impl CompiledGrammar {
    /// Compile a parsed [`RuleTable`].
    ///
    /// # Errors
    ///
    /// Returns [`CompileError`] if any placeholder target is unresolved, a
    /// rule has no alternatives, or constants are undefined or cyclic.
    pub fn compile(table: RuleTable, options: &CompileOptions) -> Result<Self, CompileError> {
        crate::compile::compile(table, options)
    }

    /// Parse grammar source and compile it with the default options.
    ///
    /// # Errors
    ///
    /// Returns [`TmplError`](crate::TmplError) on syntax or compile failure.
    pub fn from_source(source: &str) -> Result<Self, crate::TmplError> {
        Self::from_source_with(source, &CompileOptions::default())
    }

    /// # Errors
    ///
    /// Returns [`TmplError`](crate::TmplError) on syntax or compile failure.
    pub fn from_source_with(
        source: &str,
        options: &CompileOptions,
    ) -> Result<Self, crate::TmplError> {
        let table = crate::parse::parse(source)?;
        Ok(crate::compile::compile(table, options)?)
    }

    /// Render `input` starting at `rule` with the default [`RenderOptions`].
    ///
    /// # Errors
    ///
    /// Returns [`RenderError`] if the rule is unknown, no alternative matches
    /// some part of the input, or a limit is exceeded. No partial output is
    /// returned.
    pub fn render(&self, rule: &str, input: &RenderValue) -> Result<String, RenderError> {
        self.render_with(rule, input, &RenderOptions::default())
    }

    /// # Errors
    ///
    /// See [`render`](Self::render).
    pub fn render_with(
        &self,
        rule: &str,
        input: &RenderValue,
        options: &RenderOptions,
    ) -> Result<String, RenderError> {
        crate::render::render(self, rule, input, options)
    }

    /// Render starting at the [`ENTRY_RULE`].
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::UnknownRule`] if the grammar defines no entry
    /// rule, otherwise as [`render`](Self::render).
    pub fn render_main(
        &self,
        input: &RenderValue,
        options: &RenderOptions,
    ) -> Result<String, RenderError> {
        self.render_with(ENTRY_RULE, input, options)
    }

    /// The entry rule name, if the grammar defines one.
    #[must_use]
    pub fn entry(&self) -> Option<&str> {
        self.rule_indices
            .contains_key(ENTRY_RULE)
            .then_some(ENTRY_RULE)
    }

    #[must_use]
    pub fn handle(&self, name: &str) -> Option<RuleHandle> {
        self.rule_indices.get(name).map(|&i| RuleHandle(i))
    }

    #[must_use]
    pub fn rule_name(&self, handle: RuleHandle) -> Option<&str> {
        self.rules.get(handle.0).map(|r| r.name.as_str())
    }

    /// Rule names in declaration order.
    #[must_use]
    pub fn rule_names(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.name.as_str()).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Whether the rule can reach itself through placeholder references.
    ///
    /// Returns `None` if the rule name is not found.
    #[must_use]
    pub fn is_recursive(&self, name: &str) -> Option<bool> {
        self.rule_indices.get(name).map(|&i| self.recursive[i])
    }

    /// Recursive rules in declaration order.
    #[must_use]
    pub fn recursive_rules(&self) -> Vec<&str> {
        self.rules
            .iter()
            .zip(&self.recursive)
            .filter(|(_, rec)| **rec)
            .map(|(r, _)| r.name.as_str())
            .collect()
    }

    /// Rules referenced directly by placeholders of `name`, first use first.
    ///
    /// Returns `None` if the rule name is not found.
    #[must_use]
    pub fn references_of(&self, name: &str) -> Option<Vec<&str>> {
        self.rule_indices.get(name).map(|&i| {
            crate::compile::rule_refs(&self.rules[i])
                .into_iter()
                .map(|idx| self.rules[idx].name.as_str())
                .collect()
        })
    }

    /// Resolved text of a `define` constant.
    #[must_use]
    pub fn constant(&self, name: &str) -> Option<&str> {
        let &i = self.rule_indices.get(name)?;
        match &self.rules[i].body {
            CompiledBody::Constant(text) => Some(text),
            CompiledBody::Alternatives(_) => None,
        }
    }
}

#[cfg(feature = "binary-cache")]
impl CompiledGrammar {
    /// Serialize this compiled grammar to a byte vector.
    ///
    /// The optional `source_text` is hashed (BLAKE3) and embedded in the
    /// payload metadata so callers can tell when the cache is stale.
    ///
    /// # Errors
    ///
    /// Returns [`SerializeError`](crate::serial::SerializeError) if encoding fails.
    pub fn to_bytes(
        &self,
        source_text: Option<&str>,
    ) -> Result<Vec<u8>, crate::serial::SerializeError> {
        crate::serial::encode(self, source_text)
    }

    /// Deserialize a grammar previously produced by [`to_bytes`](Self::to_bytes).
    ///
    /// # Errors
    ///
    /// Returns [`DeserializeError`](crate::serial::DeserializeError) on
    /// format, integrity, or validation failure.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, crate::serial::DeserializeError> {
        crate::serial::decode(bytes)
    }

    /// BLAKE3 digest of the source text recorded by [`to_bytes`](Self::to_bytes).
    ///
    /// # Errors
    ///
    /// Returns [`DeserializeError`](crate::serial::DeserializeError) if the
    /// blob is not a valid grammar cache.
    pub fn source_digest(bytes: &[u8]) -> Result<Option<[u8; 32]>, crate::serial::DeserializeError> {
        crate::serial::source_digest(bytes)
    }
}

impl fmt::Display for CompiledGrammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let constants = self
            .rules
            .iter()
            .filter(|r| matches!(r.body, CompiledBody::Constant(_)))
            .count();
        write!(
            f,
            "CompiledGrammar({} rules, {} constants, {} recursive)",
            self.rules.len(),
            constants,
            self.recursive.iter().filter(|r| **r).count(),
        )
    }
}
