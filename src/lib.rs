//! shvars - variable storage, scoping, and parameter-expansion pattern
//! engine for a POSIX-style shell.
//!
//! This crate implements the data model and algorithms a shell interpreter
//! needs to hold variables, resolve namerefs, dispatch dynamic variables,
//! project an exported environment, and perform glob-pattern substring
//! removal/substitution. It does not parse or execute shell scripts; those
//! stay the caller's concern, reached only through [`scope::ScopeStack`]'s
//! public API and the collaborator traits in [`dynamic`]/[`environment`].

pub mod driver;
pub mod dynamic;
pub mod environment;
pub mod error;
pub mod hooks;
pub mod ident;
pub mod nameref;
pub mod pattern;
pub mod scope;
pub mod substitution;
pub mod variable;

pub use driver::{ExpansionDriver, LookupFlags, LookupResult, ScopeDriver, VariantTag};
pub use error::{Error, ResolutionMode, Result};
pub use scope::{Frame, ScopeGuard, ScopeStack};
pub use variable::{Attributes, Payload, Variable};
