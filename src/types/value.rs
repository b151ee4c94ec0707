use std::collections::BTreeMap;
use std::fmt;

/// Structured input rendered by a grammar.
///
/// Built by the caller (typically an AST-construction layer) and only ever
/// read by the engine.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum RenderValue {
    /// A leaf value, rendered as its text.
    Scalar(String),
    /// Named fields, looked up by placeholder name.
    Record(BTreeMap<String, RenderValue>),
    /// An ordered list, consumed by repetition placeholders.
    Sequence(Vec<RenderValue>),
    /// An explicitly missing value. Satisfies optional placeholders only.
    #[default]
    Absent,
}

impl RenderValue {
    /// Create an empty record.
    #[must_use]
    pub fn record() -> Self {
        RenderValue::Record(BTreeMap::new())
    }

    /// Create a sequence from anything convertible into values.
    #[must_use]
    pub fn sequence<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<RenderValue>,
    {
        RenderValue::Sequence(items.into_iter().map(Into::into).collect())
    }

    /// Set a field, returning the updated record.
    ///
    /// Calling this on a non-record value replaces it with a record holding
    /// only the new field.
    #[must_use]
    pub fn set(mut self, name: &str, value: impl Into<RenderValue>) -> Self {
        self.insert(name, value.into());
        self
    }

    /// Insert a field (mutable reference version of [`set`](Self::set)).
    pub fn insert(&mut self, name: &str, value: RenderValue) {
        if !matches!(self, RenderValue::Record(_)) {
            *self = RenderValue::record();
        }
        if let RenderValue::Record(fields) = self {
            fields.insert(name.to_owned(), value);
        }
    }

    /// Look up a record field. Returns `None` for missing fields and for
    /// values that are not records.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&RenderValue> {
        match self {
            RenderValue::Record(fields) => fields.get(name),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            RenderValue::Scalar(text) => Some(text),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_sequence(&self) -> Option<&[RenderValue]> {
        match self {
            RenderValue::Sequence(items) => Some(items),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_absent(&self) -> bool {
        matches!(self, RenderValue::Absent)
    }
}

impl From<&str> for RenderValue {
    fn from(v: &str) -> Self {
        RenderValue::Scalar(v.to_owned())
    }
}

impl From<String> for RenderValue {
    fn from(v: String) -> Self {
        RenderValue::Scalar(v)
    }
}

impl From<i64> for RenderValue {
    fn from(v: i64) -> Self {
        RenderValue::Scalar(v.to_string())
    }
}

impl From<f64> for RenderValue {
    fn from(v: f64) -> Self {
        RenderValue::Scalar(v.to_string())
    }
}

impl From<bool> for RenderValue {
    fn from(v: bool) -> Self {
        RenderValue::Scalar(v.to_string())
    }
}

impl From<char> for RenderValue {
    fn from(v: char) -> Self {
        RenderValue::Scalar(v.to_string())
    }
}

impl<T: Into<RenderValue>> From<Vec<T>> for RenderValue {
    fn from(v: Vec<T>) -> Self {
        RenderValue::sequence(v)
    }
}

impl<T: Into<RenderValue>> From<Option<T>> for RenderValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(RenderValue::Absent, Into::into)
    }
}

#[cfg(feature = "json")]
impl From<serde_json::Value> for RenderValue {
    fn from(v: serde_json::Value) -> Self {
        use serde_json::Value as Json;
        match v {
            Json::Null => RenderValue::Absent,
            Json::Bool(b) => RenderValue::Scalar(b.to_string()),
            Json::Number(n) => RenderValue::Scalar(n.to_string()),
            Json::String(s) => RenderValue::Scalar(s),
            Json::Array(items) => RenderValue::sequence(items),
            Json::Object(fields) => RenderValue::Record(
                fields.into_iter().map(|(k, v)| (k, v.into())).collect(),
            ),
        }
    }
}

impl fmt::Display for RenderValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderValue::Scalar(text) => write!(f, "{text:?}"),
            RenderValue::Record(fields) => {
                write!(f, "{{")?;
                for (i, (name, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{name}: {value}")?;
                }
                write!(f, "}}")
            }
            RenderValue::Sequence(items) => {
                write!(f, "[")?;
                for (i, value) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{value}")?;
                }
                write!(f, "]")
            }
            RenderValue::Absent => write!(f, "absent"),
        }
    }
}
