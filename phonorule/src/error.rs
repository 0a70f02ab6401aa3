// Error taxonomy for the rule engine.
//
// Every failure the engine can report is a variant of `EngineError`. Parse
// errors carry the 1-based column and offending token so notation authors can
// find the problem; application errors carry enough context to say which
// affix or span was at fault. All operations are deterministic, so nothing
// here is retryable: the same input fails the same way every time.

use thiserror::Error;

/// Errors reported by parsing, inventory construction, and application.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed rule, affix, condition, or word notation.
    #[error("syntax error at column {column} near `{token}`: {message}")]
    Syntax {
        /// 1-based character column of the offending token.
        column: usize,
        /// The token (or remaining text) where parsing stopped.
        token: String,
        /// What the parser expected.
        message: String,
    },

    /// Two multi-feature descriptor lists face each other across `->`
    /// without a declared pairing, or a replacement slot has nothing to
    /// correlate with.
    #[error("ambiguous correlation between `{target}` and `{replacement}`: {message}")]
    AmbiguousCorrelation {
        target: String,
        replacement: String,
        message: String,
    },

    /// A class, abbreviation, or descriptor tag that is not registered.
    #[error("unknown descriptor or class `{0}`")]
    UnknownDescriptor(String),

    /// A phoneme symbol that is not registered in the inventory.
    #[error("unknown phoneme `{0}`")]
    UnknownPhoneme(String),

    /// No branch of a condition-guarded affix applies to the stem.
    #[error("no branch of `{affix}` applies to `{word}`")]
    NoApplicableAffixRule { affix: String, word: String },

    /// A located span falls outside the word or stem.
    #[error("span {start}..{end} is outside the stem ({len} segments): {message}")]
    Bounds {
        start: usize,
        end: usize,
        len: usize,
        message: String,
    },

    /// A strategy that is recognized but deliberately left unresolved.
    #[error("not implemented: {0}")]
    NotImplemented(&'static str),

    /// Inventory construction violated a structural invariant.
    #[error("invalid inventory: {0}")]
    InvalidInventory(String),

    /// Malformed JSON inventory or configuration.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl EngineError {
    /// Convenience constructor for syntax errors.
    pub fn syntax(column: usize, token: impl Into<String>, message: impl Into<String>) -> Self {
        EngineError::Syntax {
            column,
            token: token.into(),
            message: message.into(),
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, EngineError>;
