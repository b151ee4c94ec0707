mod error;
mod grammar;
mod options;
mod rule;
mod scalar;
mod value;

pub use error::{CompileError, RenderError, UnresolvedReference};
pub use grammar::{AlternativeBuilder, CompiledGrammar, ENTRY_RULE, GrammarBuilder, RuleBuilder};
pub use options::{CompileOptions, DEFAULT_MAX_DEPTH, RenderOptions};
pub use rule::{
    Alternative, ConstantValue, Modifier, Placeholder, RuleBody, RuleDefinition, RuleHandle,
    Segment,
};
pub use scalar::{Pattern, ScalarKind};
pub use value::RenderValue;

pub(crate) use rule::{
    CompiledAlternative, CompiledBody, CompiledRule, CompiledSegment, CompiledSlot, Target,
};
