use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use regex::Regex;

/// A primitive placeholder target.
///
/// Built-in kinds check the scalar text during alternative selection, so
/// `<v:int> | <v:ident>` picks the alternative matching the value's form.
/// Consumer-defined kinds accept any scalar.
///
/// Three kinds are written inline in the placeholder rather than named:
/// `s/regex/` accepts scalars the regex matches in full, while `kw[word]`
/// and `sym[chars]` render fixed text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ScalarKind {
    Ident,
    Int,
    Float,
    Bool,
    Char,
    String,
    Custom(String),
    /// `s/regex/`
    Regex(Pattern),
    /// `kw[word]`
    Keyword(String),
    /// `sym[chars]`
    Symbol(String),
}

/// A compiled `s/regex/` target. Compared and hashed by its source text.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    /// Compile the text between the slashes of `s/.../`. `\/` stands for a
    /// literal slash. The regex must match the whole scalar.
    ///
    /// # Errors
    ///
    /// Returns [`regex::Error`] if the pattern is not a valid regex.
    pub fn new(source: &str) -> Result<Self, regex::Error> {
        let regex = Regex::new(&format!("^(?:{})$", unescape_slashes(source)))?;
        Ok(Self {
            source: source.to_owned(),
            regex,
        })
    }

    /// The pattern as written, without the surrounding `s/` and `/`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    #[must_use]
    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

fn unescape_slashes(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars();
    while let Some(c) = chars.next() {
        match (c, chars.clone().next()) {
            ('\\', Some('/')) => {
                out.push('/');
                chars.next();
            }
            ('\\', Some(next)) => {
                out.push('\\');
                out.push(next);
                chars.next();
            }
            (c, _) => out.push(c),
        }
    }
    out
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for Pattern {}

impl Hash for Pattern {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.source.hash(state);
    }
}

impl PartialOrd for Pattern {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Pattern {
    fn cmp(&self, other: &Self) -> Ordering {
        self.source.cmp(&other.source)
    }
}

impl ScalarKind {
    pub const BUILTINS: [ScalarKind; 6] = [
        ScalarKind::Ident,
        ScalarKind::Int,
        ScalarKind::Float,
        ScalarKind::Bool,
        ScalarKind::Char,
        ScalarKind::String,
    ];

    /// Map a type name to its kind. Unknown names become [`ScalarKind::Custom`].
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name {
            "ident" => ScalarKind::Ident,
            "int" => ScalarKind::Int,
            "float" => ScalarKind::Float,
            "bool" => ScalarKind::Bool,
            "char" => ScalarKind::Char,
            "string" => ScalarKind::String,
            other => ScalarKind::Custom(other.to_owned()),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            ScalarKind::Ident => "ident",
            ScalarKind::Int => "int",
            ScalarKind::Float => "float",
            ScalarKind::Bool => "bool",
            ScalarKind::Char => "char",
            ScalarKind::String => "string",
            ScalarKind::Custom(name) => name,
            ScalarKind::Regex(_) => "regex",
            ScalarKind::Keyword(_) => "kw",
            ScalarKind::Symbol(_) => "sym",
        }
    }

    /// Parse an inline target: `s/regex/`, `kw[word]` or `sym[chars]`.
    /// Returns `None` for anything else.
    #[must_use]
    pub fn inline(target: &str) -> Option<Result<Self, regex::Error>> {
        if let Some(body) = target.strip_prefix("s/").and_then(|t| t.strip_suffix('/')) {
            return Some(Pattern::new(body).map(ScalarKind::Regex));
        }
        let bracketed = |prefix: &str| {
            target
                .strip_prefix(prefix)
                .and_then(|t| t.strip_suffix(']'))
                .map(|t| t.trim().to_owned())
        };
        if let Some(word) = bracketed("kw[") {
            return Some(Ok(ScalarKind::Keyword(word)));
        }
        bracketed("sym[").map(|chars| Ok(ScalarKind::Symbol(chars)))
    }

    /// Map a placeholder target as written in grammar source to its kind:
    /// an inline target, otherwise a name as in [`from_name`](Self::from_name).
    ///
    /// # Errors
    ///
    /// Returns [`regex::Error`] for an invalid `s/regex/` target.
    pub fn from_target(target: &str) -> Result<Self, regex::Error> {
        Self::inline(target).unwrap_or_else(|| Ok(Self::from_name(target)))
    }

    /// Text rendered by `kw[..]` and `sym[..]` regardless of input.
    #[must_use]
    pub fn fixed_text(&self) -> Option<&str> {
        match self {
            ScalarKind::Keyword(text) | ScalarKind::Symbol(text) => Some(text),
            _ => None,
        }
    }

    /// Whether `text` is a valid scalar of this kind.
    #[must_use]
    pub fn accepts(&self, text: &str) -> bool {
        match self {
            ScalarKind::Ident => is_ident(text),
            ScalarKind::Int => text.parse::<i64>().is_ok(),
            ScalarKind::Float => text.parse::<f64>().is_ok(),
            ScalarKind::Bool => text == "true" || text == "false",
            ScalarKind::Char => text.chars().count() == 1,
            ScalarKind::String | ScalarKind::Custom(_) => true,
            ScalarKind::Regex(pattern) => pattern.is_match(text),
            ScalarKind::Keyword(word) | ScalarKind::Symbol(word) => text == word,
        }
    }
}

pub(crate) fn is_ident(text: &str) -> bool {
    let mut chars = text.chars();
    chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_')
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarKind::Regex(pattern) => write!(f, "s/{}/", pattern.as_str()),
            ScalarKind::Keyword(word) => write!(f, "kw[{word}]"),
            ScalarKind::Symbol(chars) => write!(f, "sym[{chars}]"),
            other => f.write_str(other.name()),
        }
    }
}
