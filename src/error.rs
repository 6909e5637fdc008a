//! Error kinds for the variable and parameter-expansion core.
//!
//! One struct-plus-enum shape per condition, expressed with `thiserror`
//! instead of hand-written `Display`/`Error` impls, since every one of
//! these errors is a plain data-carrying leaf with no control-flow
//! semantics of its own (unlike `break`/`continue`/`return`, which stay
//! out of this crate's scope).

use thiserror::Error;

/// Errors produced by the value store, scope stack, nameref resolver, and
/// environment projector.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Error {
    #[error("`{0}': not a valid identifier")]
    InvalidIdentifier(String),

    #[error("`{name}': invalid nameref target `{target}'")]
    InvalidNameref { name: String, target: String },

    #[error("`{0}': circular nameref reference")]
    CircularNameref(String),

    #[error("`{0}': readonly variable")]
    ReadOnly(String),

    #[error("`{0}': cannot assign")]
    NoAssign(String),

    #[error("`{0}': cannot convert between scalar and array implicitly")]
    IncompatibleType(String),

    #[error("`{0}': arithmetic evaluation failed")]
    ArithmeticError(String),

    #[error("`{0}': BASH_COMPAT value out of range")]
    CompatRange(String),

    #[error("`{0}': BASH_XTRACEFD: invalid file descriptor")]
    FdInvalid(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// The "no-long-jump" flag: whether a failed operation should surface as a
/// clean `Err` (`Strict`, the default) or fall through to a degraded
/// fallback behavior instead of unwinding (`Degraded`) — used by
/// integer-attributed assignment, where a `Degraded` arithmetic failure
/// assigns the literal right-hand side rather than propagating
/// [`Error::ArithmeticError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResolutionMode {
    #[default]
    Strict,
    Degraded,
}
