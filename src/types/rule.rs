use std::fmt;

use super::scalar::ScalarKind;

/// A named rule: either a template with ordered alternatives or a constant
/// introduced by `define`.
///
/// Produced by [`parse`](crate::parse::parse) or by
/// [`GrammarBuilder`](super::GrammarBuilder); consumed by compilation.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleDefinition {
    pub name: String,
    pub body: RuleBody,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RuleBody {
    /// Alternatives in declaration order. The first one whose placeholders
    /// can be satisfied by the input is expanded.
    Alternatives(Vec<Alternative>),
    /// A zero-argument rule producing fixed text.
    Constant(ConstantValue),
}

impl RuleDefinition {
    #[must_use]
    pub fn alternatives(&self) -> &[Alternative] {
        match &self.body {
            RuleBody::Alternatives(alts) => alts,
            RuleBody::Constant(_) => &[],
        }
    }

    #[must_use]
    pub fn is_constant(&self) -> bool {
        matches!(self.body, RuleBody::Constant(_))
    }
}

/// One candidate expansion of a rule.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Alternative {
    pub segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Literal(String),
    Placeholder(Placeholder),
}

/// A typed slot, `<name:Type>` or `<Type>`.
///
/// An unnamed placeholder binds the whole value the enclosing rule is
/// rendering instead of one of its fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Placeholder {
    pub name: Option<String>,
    pub target: String,
    pub modifier: Modifier,
}

/// Repetition and optionality annotation on a placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Modifier {
    /// Exactly one value.
    #[default]
    Once,
    /// `?`: an absent value renders nothing.
    Optional,
    /// `*`: a sequence of any length, no separator.
    ZeroOrMore,
    /// `+`: a non-empty sequence, no separator.
    OneOrMore,
    /// `** sep]` (`allow_empty`) or `++ sep]`: a sequence rendered with
    /// `separator` between consecutive elements.
    OneOrMoreSeparated { separator: String, allow_empty: bool },
}

impl Modifier {
    /// `** sep]`: any number of elements, `separator` between them.
    #[must_use]
    pub fn separated(separator: &str) -> Self {
        Modifier::OneOrMoreSeparated {
            separator: separator.to_owned(),
            allow_empty: true,
        }
    }

    /// `++ sep]`: like [`separated`](Self::separated) but at least one element.
    #[must_use]
    pub fn separated_nonempty(separator: &str) -> Self {
        Modifier::OneOrMoreSeparated {
            separator: separator.to_owned(),
            allow_empty: false,
        }
    }

    #[must_use]
    pub fn is_repeated(&self) -> bool {
        matches!(
            self,
            Modifier::ZeroOrMore | Modifier::OneOrMore | Modifier::OneOrMoreSeparated { .. }
        )
    }

    /// Minimum sequence length accepted by a repeated modifier.
    #[must_use]
    pub fn min_len(&self) -> usize {
        match self {
            Modifier::OneOrMore
            | Modifier::OneOrMoreSeparated {
                allow_empty: false, ..
            } => 1,
            _ => 0,
        }
    }

    #[must_use]
    pub fn separator(&self) -> Option<&str> {
        match self {
            Modifier::OneOrMoreSeparated { separator, .. } => Some(separator),
            _ => None,
        }
    }
}

/// Value of a `define` declaration.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstantValue {
    Char(char),
    String(String),
    /// Integer literal, kept as written.
    Int(String),
    /// Float literal, kept as written.
    Float(String),
    Bool(bool),
    List(Vec<ConstantValue>),
    /// Reference to another constant by name.
    Ref(String),
}

/// Handle to a compiled rule: its index in the grammar's rule arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuleHandle(pub(crate) usize);

impl RuleHandle {
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

/// A rule after compilation: references resolved to handles and constants
/// resolved to text.
#[derive(Debug, Clone)]
pub(crate) struct CompiledRule {
    pub(crate) name: String,
    pub(crate) body: CompiledBody,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum CompiledBody {
    Alternatives(Vec<CompiledAlternative>),
    Constant(String),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CompiledAlternative {
    pub(crate) segments: Vec<CompiledSegment>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum CompiledSegment {
    Literal(String),
    Slot(CompiledSlot),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CompiledSlot {
    pub(crate) name: Option<String>,
    pub(crate) target: Target,
    pub(crate) modifier: Modifier,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Target {
    Primitive(ScalarKind),
    Rule(RuleHandle),
}

/// A string or char literal in grammar-source form. Only the escapes the
/// parser decodes are produced; every other character is written as is.
enum Quoted<'a> {
    String(&'a str),
    Char(char),
}

impl Quoted<'_> {
    fn write_char(f: &mut fmt::Formatter<'_>, c: char, quote: char) -> fmt::Result {
        match c {
            '\\' => f.write_str("\\\\"),
            '\n' => f.write_str("\\n"),
            '\t' => f.write_str("\\t"),
            c if c == quote => write!(f, "\\{c}"),
            c => write!(f, "{c}"),
        }
    }
}

impl fmt::Display for Quoted<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quoted::String(text) => {
                f.write_str("\"")?;
                for c in text.chars() {
                    Self::write_char(f, c, '"')?;
                }
                f.write_str("\"")
            }
            Quoted::Char(c) => {
                f.write_str("'")?;
                Self::write_char(f, *c, '\'')?;
                f.write_str("'")
            }
        }
    }
}

impl fmt::Display for Modifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Modifier::Once => Ok(()),
            Modifier::Optional => write!(f, "?"),
            Modifier::ZeroOrMore => write!(f, "*"),
            Modifier::OneOrMore => write!(f, "+"),
            Modifier::OneOrMoreSeparated {
                separator,
                allow_empty: true,
            } => write!(f, " ** {}]", Quoted::String(separator)),
            Modifier::OneOrMoreSeparated {
                separator,
                allow_empty: false,
            } => write!(f, " ++ {}]", Quoted::String(separator)),
        }
    }
}

impl fmt::Display for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "<{name}:{}>{}", self.target, self.modifier),
            None => write!(f, "<{}>{}", self.target, self.modifier),
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Literal(text) => write!(f, "{}", Quoted::String(text)),
            Segment::Placeholder(p) => write!(f, "{p}"),
        }
    }
}

impl fmt::Display for Alternative {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

impl fmt::Display for ConstantValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstantValue::Char(c) => write!(f, "{}", Quoted::Char(*c)),
            ConstantValue::String(s) => write!(f, "{}", Quoted::String(s)),
            ConstantValue::Int(v) | ConstantValue::Float(v) | ConstantValue::Ref(v) => {
                write!(f, "{v}")
            }
            ConstantValue::Bool(b) => write!(f, "{b}"),
            ConstantValue::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
        }
    }
}

/// Prints the definition back in grammar-source form.
impl fmt::Display for RuleDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.body {
            RuleBody::Constant(value) => write!(f, "define {}: {value};", self.name),
            RuleBody::Alternatives(alts) => {
                writeln!(f, "{}:", self.name)?;
                for (i, alt) in alts.iter().enumerate() {
                    if i == 0 {
                        writeln!(f, "    {alt}")?;
                    } else {
                        writeln!(f, "  | {alt}")?;
                    }
                }
                write!(f, "~~~")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(name: &str, target: &str, modifier: Modifier) -> Segment {
        Segment::Placeholder(Placeholder {
            name: Some(name.into()),
            target: target.into(),
            modifier,
        })
    }

    #[test]
    fn modifier_min_len() {
        assert_eq!(Modifier::ZeroOrMore.min_len(), 0);
        assert_eq!(Modifier::OneOrMore.min_len(), 1);
        let loose = Modifier::OneOrMoreSeparated {
            separator: ",".into(),
            allow_empty: true,
        };
        let strict = Modifier::OneOrMoreSeparated {
            separator: ",".into(),
            allow_empty: false,
        };
        assert_eq!(loose.min_len(), 0);
        assert_eq!(strict.min_len(), 1);
        assert_eq!(strict.separator(), Some(","));
        assert!(strict.is_repeated());
        assert!(!Modifier::Optional.is_repeated());
    }

    #[test]
    fn display_rule_in_source_form() {
        let rule = RuleDefinition {
            name: "List".into(),
            body: RuleBody::Alternatives(vec![
                Alternative {
                    segments: vec![
                        Segment::Literal("[".into()),
                        slot(
                            "items",
                            "ident",
                            Modifier::OneOrMoreSeparated {
                                separator: ",".into(),
                                allow_empty: true,
                            },
                        ),
                        Segment::Literal("]".into()),
                    ],
                },
                Alternative {
                    segments: vec![slot("one", "ident", Modifier::Optional)],
                },
            ]),
        };
        assert_eq!(
            rule.to_string(),
            "List:\n    \"[\" <items:ident> ** \",\"] \"]\"\n  | <one:ident>?\n~~~"
        );
    }

    #[test]
    fn display_escapes_only_what_the_parser_decodes() {
        let literal = Segment::Literal("a\rb\u{1}c\"d\\e\nf\tg'".into());
        assert_eq!(literal.to_string(), "\"a\rb\u{1}c\\\"d\\\\e\\nf\\tg'\"");

        let sep = Modifier::separated("\r\n");
        assert_eq!(sep.to_string(), " ** \"\r\\n\"]");

        assert_eq!(ConstantValue::Char('\'').to_string(), "'\\''");
        assert_eq!(ConstantValue::Char('\\').to_string(), "'\\\\'");
        assert_eq!(ConstantValue::Char('\0').to_string(), "'\0'");
    }

    #[test]
    fn display_constant() {
        let rule = RuleDefinition {
            name: "Seps".into(),
            body: RuleBody::Constant(ConstantValue::List(vec![
                ConstantValue::Char(','),
                ConstantValue::Int("3".into()),
            ])),
        };
        assert_eq!(rule.to_string(), "define Seps: [',', 3];");
        assert!(rule.is_constant());
        assert!(rule.alternatives().is_empty());
    }
}
