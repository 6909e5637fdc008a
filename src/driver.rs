//! Collaborator interfaces to the expansion driver.
//!
//! The command parser and the outer expansion pipeline (tilde expansion,
//! arithmetic, command substitution, field splitting, word splitting) live
//! outside this crate's scope; this module only defines the trait boundary
//! they are expected to implement against the variable/pattern core, plus a
//! [`ScopeDriver`] reference implementation atop [`crate::scope::ScopeStack`]
//! that exercises the boundary end to end for this crate's own tests.

use crate::ident::split_subscript;
use crate::nameref::resolve_nameref_for_read;
use crate::scope::ScopeStack;
use crate::variable::Payload;

/// Which expansion form produced a `${...}` reference, as returned by
/// `get_var_and_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariantTag {
    /// `$name` / `${name}`.
    Scalar,
    /// `$1`..`$9`, `$@`, `$*`.
    PositionalParameters,
    /// `${arr[i]}`.
    ArrayMember,
    /// `${arr[@]}` / `${arr[*]}`.
    WholeArray,
    /// The `[*]`/`[@]` distinction that controls join-with-IFS-first-char
    /// vs. field-per-element behavior when the context is quoted.
    StarSubscriptVariant,
}

/// Flags modifying a `get_var_and_type` lookup.
#[derive(Debug, Clone, Copy, Default)]
pub struct LookupFlags {
    /// The reference occurred inside double quotes (controls `$*` joining
    /// and array operator field semantics).
    pub quoted: bool,
    /// The subscript, if any, used the `@` form rather than `*`
    /// (`${arr[@]}` vs `${arr[*]}`).
    pub at_subscript: bool,
}

/// The result of a `get_var_and_type` lookup: which form matched, and the
/// fully resolved value(s) after nameref indirection and dynamic-getter
/// dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupResult {
    pub variant: VariantTag,
    /// The concrete variable name this resolved to (after nameref chasing),
    /// standing in for an opaque payload handle — this crate's payloads are
    /// always reachable by name through the `ScopeStack` that produced this
    /// result.
    pub resolved_name: String,
    /// The scalarized value for `Scalar`/`ArrayMember`/`PositionalParameters`
    /// (single positional index); for `WholeArray`/`StarSubscriptVariant`,
    /// each element as a separate field.
    pub values: Vec<String>,
}

/// The interface an outer expansion driver is expected to implement against
/// this crate's variable store and pattern engine.
pub trait ExpansionDriver {
    /// Resolve `name[subscript]` (subscript absent for a plain scalar or
    /// positional reference) to its variant tag, resolved binding name, and
    /// value(s).
    fn get_var_and_type(&self, name: &str, subscript: Option<&str>, flags: LookupFlags) -> LookupResult;

    /// Re-quote an already-expanded string so it round-trips through the
    /// pattern engine as the literal text it names rather than being
    /// reinterpreted as glob syntax (backslash-escape every glob
    /// metacharacter: `*?[]\`).
    fn quote_string_for_globbing(&self, raw: &str) -> String;

    /// Expand `raw` into the word list used as a pattern or replacement
    /// operand, honoring `quoted` (an unquoted expansion is subject to this
    /// driver's field splitting; a quoted one is always a single field).
    fn expand_string_for_pat(&self, raw: &str, quoted: bool) -> Vec<String>;
}

/// A minimal [`ExpansionDriver`] implemented directly atop a
/// [`ScopeStack`], with IFS-based field splitting on whitespace (the common
/// case; an embedding shell with a live `IFS` hook context would substitute
/// its own splitter).
pub struct ScopeDriver<'a> {
    pub scope: &'a ScopeStack,
}

impl<'a> ScopeDriver<'a> {
    pub fn new(scope: &'a ScopeStack) -> Self {
        ScopeDriver { scope }
    }
}

impl ExpansionDriver for ScopeDriver<'_> {
    fn get_var_and_type(&self, name: &str, subscript: Option<&str>, flags: LookupFlags) -> LookupResult {
        if let Some(index) = name.parse::<usize>().ok().filter(|_| subscript.is_none()) {
            let positional = self.scope.positional_params();
            let value = if index == 0 {
                String::new()
            } else {
                positional.get(index - 1).cloned().unwrap_or_default()
            };
            return LookupResult {
                variant: VariantTag::PositionalParameters,
                resolved_name: index.to_string(),
                values: vec![value],
            };
        }
        if name == "@" || name == "*" {
            return LookupResult {
                variant: VariantTag::PositionalParameters,
                resolved_name: name.to_string(),
                values: self.scope.positional_params().to_vec(),
            };
        }

        let resolved = resolve_nameref_for_read(self.scope, name);
        let var = self.scope.lookup(&resolved);

        match (subscript, var) {
            (Some(sub), Some(v)) if sub == "@" || sub == "*" => {
                let variant = if flags.at_subscript || sub == "@" {
                    VariantTag::WholeArray
                } else {
                    VariantTag::StarSubscriptVariant
                };
                let values = match v.payload() {
                    Payload::IndexedArray(m) => m.values().cloned().collect(),
                    Payload::AssocArray(m) => m.values().cloned().collect(),
                    other => vec![other.scalarize()],
                };
                LookupResult { variant, resolved_name: resolved, values }
            }
            (Some(sub), Some(v)) => {
                let value = match v.payload() {
                    Payload::IndexedArray(m) => sub
                        .parse::<i64>()
                        .ok()
                        .and_then(|i| m.get(&i).cloned())
                        .unwrap_or_default(),
                    Payload::AssocArray(m) => m.get(sub).cloned().unwrap_or_default(),
                    other => other.scalarize(),
                };
                LookupResult {
                    variant: VariantTag::ArrayMember,
                    resolved_name: resolved,
                    values: vec![value],
                }
            }
            (None, Some(v)) => LookupResult {
                variant: VariantTag::Scalar,
                resolved_name: resolved,
                values: vec![v.payload().scalarize()],
            },
            (_, None) => LookupResult {
                variant: VariantTag::Scalar,
                resolved_name: resolved,
                values: vec![String::new()],
            },
        }
    }

    fn quote_string_for_globbing(&self, raw: &str) -> String {
        let mut out = String::with_capacity(raw.len());
        for c in raw.chars() {
            if matches!(c, '*' | '?' | '[' | ']' | '\\') {
                out.push('\\');
            }
            out.push(c);
        }
        out
    }

    fn expand_string_for_pat(&self, raw: &str, quoted: bool) -> Vec<String> {
        if quoted {
            vec![raw.to_string()]
        } else {
            raw.split_whitespace().map(str::to_string).collect()
        }
    }
}

/// Split `name[subscript]` (already-expanded `${...}` text) into the bare
/// name and subscript text, reusing [`split_subscript`]'s
/// identifier-grammar rules.
pub fn split_name_and_subscript(reference: &str) -> (&str, Option<&str>) {
    match split_subscript(reference) {
        Some((name, sub)) => (name, Some(sub)),
        None => (reference, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(s: &str) -> crate::error::Result<String> {
        Ok(s.to_string())
    }

    #[test]
    fn scalar_lookup_resolves_through_nameref() {
        let mut scope = ScopeStack::new();
        scope.bind("target").unwrap().assign_scalar("value", false, noop).unwrap();
        scope
            .bind("ref")
            .unwrap()
            .set_payload_raw(Payload::NamerefTarget("target".to_string()));
        let driver = ScopeDriver::new(&scope);
        let result = driver.get_var_and_type("ref", None, LookupFlags::default());
        assert_eq!(result.variant, VariantTag::Scalar);
        assert_eq!(result.resolved_name, "target");
        assert_eq!(result.values, vec!["value".to_string()]);
    }

    #[test]
    fn whole_array_lookup_returns_every_element() {
        let mut scope = ScopeStack::new();
        let var = scope.bind("arr").unwrap();
        var.insert_indexed(0, "a", false, noop).unwrap();
        var.insert_indexed(1, "b", false, noop).unwrap();
        let driver = ScopeDriver::new(&scope);
        let result = driver.get_var_and_type("arr", Some("@"), LookupFlags { quoted: true, at_subscript: true });
        assert_eq!(result.variant, VariantTag::WholeArray);
        assert_eq!(result.values, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn positional_parameter_by_index() {
        let mut scope = ScopeStack::new();
        scope.positional_params_mut().push("first".to_string());
        scope.positional_params_mut().push("second".to_string());
        let driver = ScopeDriver::new(&scope);
        let result = driver.get_var_and_type("2", None, LookupFlags::default());
        assert_eq!(result.variant, VariantTag::PositionalParameters);
        assert_eq!(result.values, vec!["second".to_string()]);
    }

    #[test]
    fn quote_string_for_globbing_escapes_metacharacters() {
        let scope = ScopeStack::new();
        let driver = ScopeDriver::new(&scope);
        assert_eq!(driver.quote_string_for_globbing("a*b?c"), "a\\*b\\?c");
    }

    #[test]
    fn expand_string_for_pat_splits_only_when_unquoted() {
        let scope = ScopeStack::new();
        let driver = ScopeDriver::new(&scope);
        assert_eq!(driver.expand_string_for_pat("a b c", false), vec!["a", "b", "c"]);
        assert_eq!(driver.expand_string_for_pat("a b c", true), vec!["a b c"]);
    }

    #[test]
    fn split_name_and_subscript_parses_array_reference() {
        assert_eq!(split_name_and_subscript("arr[3]"), ("arr", Some("3")));
        assert_eq!(split_name_and_subscript("plain"), ("plain", None));
    }
}
