use thiserror::Error;

use crate::parse::GrammarSyntaxError;
use crate::{CompileError, RenderError};

/// Unified error type covering parsing, compilation, and rendering.
///
/// Returned by convenience entry points like
/// [`CompiledGrammar::from_source()`](crate::CompiledGrammar::from_source).
#[derive(Debug, Error)]
pub enum TmplError {
    #[error(transparent)]
    Syntax(#[from] GrammarSyntaxError),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[cfg(feature = "binary-cache")]
    #[error(transparent)]
    Serialize(#[from] crate::serial::SerializeError),

    #[cfg(feature = "binary-cache")]
    #[error(transparent)]
    Deserialize(#[from] crate::serial::DeserializeError),
}
