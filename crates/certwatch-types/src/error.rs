//! Error types shared across all certwatch crates.

/// Errors that can occur across the certwatch runtime.
///
/// Parse and load failures abort a rule reload without touching the
/// published engine; ingest failures map to HTTP statuses; store failures
/// are logged per batch and never stall the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum CertwatchError {
    /// Keyword expression was empty or all whitespace.
    #[error("empty expression")]
    EmptyExpression,

    /// Keyword expression failed to parse.
    #[error("expression parse error: {0}")]
    ParseError(String),

    /// A rule in the rule file failed validation.
    #[error("invalid rule {name:?}: {reason}")]
    InvalidRule {
        /// Name of the offending rule (may be empty if the name itself is missing).
        name: String,
        /// Human-readable reason for the rejection.
        reason: String,
    },

    /// A rule with this name already exists.
    #[error("rule {0:?} already exists")]
    DuplicateRule(String),

    /// No rule with this name exists.
    #[error("rule {0:?} not found")]
    RuleNotFound(String),

    /// A non-empty rule set produced no positive keywords for the automaton.
    #[error("rule set contains no positive keywords")]
    NoKeywords,

    /// SQLite store read/write failure.
    #[error("store error: {0}")]
    StoreError(String),

    /// The bounded match bus is full; the record was dropped.
    #[error("match bus full")]
    BusFull,

    /// Malformed request body or parameters.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Wrong HTTP method for the endpoint.
    #[error("method not allowed")]
    MethodNotAllowed,
}
