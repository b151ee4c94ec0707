//! Grammar-driven template expansion.
//!
//! A grammar is a set of named rules. Each rule is an ordered list of
//! alternatives mixing literal text with typed placeholders such as
//! `<name:ident>` or `<args:Arg> ** ", "]`. Rendering walks a nested
//! [`RenderValue`] and, for each rule invocation, expands the first
//! alternative whose placeholders the value satisfies.
//!
//! ```
//! use tmpl::RenderValue;
//!
//! let grammar = tmpl::compile(
//!     r#"
//! List: "[" <items:ident> ** ","] "]";
//! ~~~
//! "#,
//! )
//! .unwrap();
//!
//! let input = RenderValue::record().set("items", vec!["a", "b", "c"]);
//! assert_eq!(grammar.render("List", &input).unwrap(), "[a,b,c]");
//! ```

mod bind;
mod compile;
mod error;
pub mod parse;
mod render;
#[cfg(feature = "binary-cache")]
pub mod serial;
mod types;

pub use error::TmplError;
#[cfg(feature = "binary-cache")]
pub use serial::{DeserializeError, SerializeError};
pub use types::{
    Alternative, AlternativeBuilder, CompileError, CompileOptions, CompiledGrammar, ConstantValue,
    DEFAULT_MAX_DEPTH, ENTRY_RULE, GrammarBuilder, Modifier, Pattern, Placeholder, RenderError,
    RenderOptions, RenderValue, RuleBody, RuleBuilder, RuleDefinition, RuleHandle, ScalarKind,
    Segment, UnresolvedReference,
};

/// Parse and compile grammar source with the default [`CompileOptions`].
///
/// # Errors
///
/// Returns [`TmplError::Syntax`] for malformed source and
/// [`TmplError::Compile`] for unresolved references or invalid constants.
pub fn compile(source: &str) -> Result<CompiledGrammar, TmplError> {
    CompiledGrammar::from_source(source)
}

/// Render `input` from `rule`, allowing at most `max_depth` nested rule
/// invocations.
///
/// # Errors
///
/// Returns [`RenderError`] on an unknown rule, unmatched input, or when the
/// depth limit is exceeded.
pub fn render(
    grammar: &CompiledGrammar,
    rule: &str,
    input: &RenderValue,
    max_depth: usize,
) -> Result<String, RenderError> {
    grammar.render_with(rule, input, &RenderOptions::new().max_depth(max_depth))
}
