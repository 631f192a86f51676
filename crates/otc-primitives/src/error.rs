use thiserror::Error;

/// Errors the deal lifecycle engine can surface.
///
/// Variants map onto the error kinds in the error-handling design: the
/// first three are rejected at the boundary and never mutate state, the
/// rest describe conditions the engine itself discovers mid-flight.
#[derive(Error, Debug)]
pub enum OtcError {
    /// Bad asset, bad address, malformed amount.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Missing or already-used token.
    #[error("authorization failed: {0}")]
    Authorization(String),

    /// Stage/locking precondition not met.
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// Deal not found.
    #[error("deal not found: {0}")]
    DealNotFound(String),

    /// Underlying store error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Underlying chain plugin error.
    #[error("plugin error: {0}")]
    Plugin(#[from] PluginError),

    /// An invariant the engine relies on was violated. Fatal for the
    /// affected deal; the stage is left unchanged and the deal is
    /// excluded from further ticks until an operator intervenes.
    #[error("invariant violated: {0}")]
    Invariant(String),
}

/// Errors from the persistent store (C3).
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("backend error: {0}")]
    Backend(String),

    #[error("encode/decode error: {0}")]
    Codec(String),

    #[error("required column family missing: {0}")]
    MissingTable(String),

    #[error("not found")]
    NotFound,
}

/// Errors from a chain plugin invocation (C1).
#[derive(Error, Debug)]
pub enum PluginError {
    #[error("transient: {0}")]
    Transient(String),

    #[error("terminal: {0}")]
    Terminal(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),
}
