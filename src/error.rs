use thiserror::Error;

/// Error kinds per `spec.md` §7. Lex/parse/type errors surface to the
/// request boundary unmodified with their message; index/eval/storage
/// errors abort the current query. There is no partial-result mode.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    #[error("lex error: {0}")]
    LexError(String),

    #[error("parse error: {0}")]
    ParseError(String),

    #[error("type check error: {0}")]
    TypeCheckError(String),

    #[error("index error: {0}")]
    IndexError(String),

    #[error("eval error: {0}")]
    EvalError(String),

    #[error("storage error: {0}")]
    IoError(String),
}

pub type EngineResult<T> = Result<T, EngineError>;

impl EngineError {
    /// The envelope `status`/HTTP class a caller should map this to, per
    /// `spec.md` §6: lex/parse/type/index/eval errors are client errors
    /// (400), storage failures are internal (500).
    pub fn is_client_error(&self) -> bool {
        !matches!(self, EngineError::IoError(_))
    }
}
