mod error;
mod grammar;
mod parser;

pub use error::GrammarSyntaxError;
pub use parser::RuleTable;

/// Parse grammar source into a [`RuleTable`].
///
/// # Errors
///
/// Returns [`GrammarSyntaxError`] with the line and column of the first
/// malformed construct, unterminated rule, or duplicate name.
pub fn parse(source: &str) -> Result<RuleTable, GrammarSyntaxError> {
    grammar::parse_grammar(source)
}
