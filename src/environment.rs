//! Environment projector — flattens the scope stack into a `NAME=VALUE`
//! export list and imports one back.
//!
//! Built on dirty-flag caching plus per-scope export-attribute bookkeeping
//! (`mark_exported`/`is_exported`). Function/array/assoc values are carried
//! through the synthetic `BASH_FUNC_*`/`BASH_ARRAY_*`/`BASH_ASSOC_*` names
//! the same way bash itself serializes them into a real process
//! environment, since a POSIX environment block only holds flat strings.

use std::collections::HashMap;

use indexmap::IndexMap;
use log::trace;

use crate::scope::ScopeStack;
use crate::variable::{Payload, Variable};

const FUNC_PREFIX: &str = "BASH_FUNC_";
const FUNC_SUFFIX: &str = "%%";
const ARRAY_PREFIX: &str = "BASH_ARRAY_";
const ASSOC_PREFIX: &str = "BASH_ASSOC_";

/// Projects a [`ScopeStack`] into the flattened form a child process expects,
/// caching the result until something marks it dirty.
pub struct EnvironmentProjector {
    dirty: bool,
    cache: IndexMap<String, String>,
    /// Names that arrived on import but did not parse as valid identifiers;
    /// round-tripped verbatim on the next export.
    invisible: HashMap<String, String>,
}

impl Default for EnvironmentProjector {
    fn default() -> Self {
        Self::new()
    }
}

impl EnvironmentProjector {
    pub fn new() -> Self {
        EnvironmentProjector {
            dirty: true,
            cache: IndexMap::new(),
            invisible: HashMap::new(),
        }
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// `PWD`/`OLDPWD`/`_` are updated so frequently that marking the whole
    /// projection dirty on every `cd` would be wasteful; the fast
    /// path writes the single entry through directly.
    pub fn fast_path_update(&mut self, name: &str, value: &str) {
        if !self.dirty {
            self.cache.insert(name.to_string(), value.to_string());
        }
        trace!("environment: fast-path update {name}={value}");
    }

    /// Flatten `scope`'s exported variables, innermost frame to global so a
    /// function-local export shadows an outer one of the same name, plus any
    /// still-pending invisible entries from a prior import.
    pub fn export(&mut self, scope: &ScopeStack) -> &IndexMap<String, String> {
        if self.dirty {
            trace!("environment: rebuilding export projection");
            let mut out = IndexMap::new();
            let mut seen = std::collections::HashSet::new();
            for frame in scope.iter_frames() {
                for var in frame_exported_vars(frame) {
                    if seen.contains(&var.name) {
                        continue;
                    }
                    seen.insert(var.name.clone());
                    if let Some(rendered) = var.export_string() {
                        insert_rendered(&mut out, &var.name, &rendered);
                    }
                }
            }
            for (name, value) in &self.invisible {
                out.entry(name.clone()).or_insert_with(|| value.clone());
            }
            self.cache = out;
            self.dirty = false;
        }
        &self.cache
    }

    /// Parse a real process environment (`NAME=VALUE` pairs) back into
    /// bindings, recognizing the `BASH_FUNC_*`/`BASH_ARRAY_*`/`BASH_ASSOC_*`
    /// encodings and marking anything that isn't a valid identifier as
    /// invisible rather than rejecting it outright.
    pub fn import(&mut self, scope: &mut ScopeStack, entries: &[(String, String)]) {
        for (key, value) in entries {
            if let Some(name) = key.strip_prefix(FUNC_PREFIX).and_then(|s| s.strip_suffix(FUNC_SUFFIX)) {
                if crate::ident::is_valid_identifier(name) {
                    if let Ok(var) = scope.bind_global(name) {
                        var.set_payload_raw(Payload::FunctionBody(value.clone()));
                        var.attributes.insert(crate::variable::Attributes::IMPORTED);
                    }
                    continue;
                }
            }
            if let Some(name) = key.strip_prefix(ARRAY_PREFIX).and_then(|s| s.strip_suffix(FUNC_SUFFIX)) {
                if crate::ident::is_valid_identifier(name) {
                    if let Ok(var) = scope.bind_global(name) {
                        var.set_payload_raw(Payload::IndexedArray(parse_compound_indexed(value)));
                        var.attributes.insert(crate::variable::Attributes::IMPORTED);
                    }
                    continue;
                }
            }
            if let Some(name) = key.strip_prefix(ASSOC_PREFIX).and_then(|s| s.strip_suffix(FUNC_SUFFIX)) {
                if crate::ident::is_valid_identifier(name) {
                    if let Ok(var) = scope.bind_global(name) {
                        var.set_payload_raw(Payload::AssocArray(parse_compound_assoc(value)));
                        var.attributes.insert(crate::variable::Attributes::IMPORTED);
                    }
                    continue;
                }
            }
            if crate::ident::is_valid_identifier(key) {
                if let Ok(var) = scope.bind_global(key) {
                    let _ = var.assign_scalar(value.clone(), true, |s| Ok(s.to_string()));
                    var.attributes.insert(crate::variable::Attributes::EXPORTED);
                    var.attributes.insert(crate::variable::Attributes::IMPORTED);
                }
            } else {
                self.invisible.insert(key.clone(), value.clone());
            }
        }
        self.mark_dirty();
    }
}

fn frame_exported_vars(frame: &crate::scope::Frame) -> Vec<&Variable> {
    // `Frame`'s variable map is private; this helper relies on a crate-local
    // accessor added alongside `Frame` for exactly this use.
    frame.exported_vars()
}

fn insert_rendered(out: &mut IndexMap<String, String>, name: &str, rendered: &str) {
    match rendered.split_once('=') {
        Some((k, v)) => {
            out.insert(k.to_string(), v.to_string());
        }
        None => {
            out.insert(name.to_string(), rendered.to_string());
        }
    }
}

fn parse_compound_indexed(body: &str) -> std::collections::BTreeMap<i64, String> {
    let mut out = std::collections::BTreeMap::new();
    let inner = body.trim().trim_start_matches('(').trim_end_matches(')');
    for entry in split_compound_entries(inner) {
        if let Some((idx, val)) = parse_compound_entry(&entry) {
            if let Ok(i) = idx.parse::<i64>() {
                out.insert(i, val);
            }
        }
    }
    out
}

fn parse_compound_assoc(body: &str) -> std::collections::BTreeMap<String, String> {
    let mut out = std::collections::BTreeMap::new();
    let inner = body.trim().trim_start_matches('(').trim_end_matches(')');
    for entry in split_compound_entries(inner) {
        if let Some((key, val)) = parse_compound_entry(&entry) {
            out.insert(key, val);
        }
    }
    out
}

fn split_compound_entries(inner: &str) -> Vec<String> {
    let mut entries = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' if in_quotes => {
                current.push(c);
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            ' ' if !in_quotes => {
                if !current.is_empty() {
                    entries.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(c),
        }
    }
    if !current.is_empty() {
        entries.push(current);
    }
    entries
}

fn parse_compound_entry(entry: &str) -> Option<(String, String)> {
    let close = entry.find(']')?;
    if !entry.starts_with('[') {
        return None;
    }
    let key = &entry[1..close];
    let rest = &entry[close + 1..];
    let rest = rest.strip_prefix('=')?;
    let value = rest
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(rest);
    let value = value.replace("\\\"", "\"").replace("\\\\", "\\");
    Some((key.to_string(), value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(s: &str) -> crate::error::Result<String> {
        Ok(s.to_string())
    }

    #[test]
    fn export_includes_only_exported_scalars() {
        let mut scope = ScopeStack::new();
        scope.bind("EXPORTED").unwrap().assign_scalar("1", false, noop).unwrap();
        scope.bind_global("EXPORTED").unwrap().attributes.insert(crate::variable::Attributes::EXPORTED);
        scope.bind("LOCAL_ONLY").unwrap().assign_scalar("2", false, noop).unwrap();

        let mut projector = EnvironmentProjector::new();
        let exported = projector.export(&scope);
        assert_eq!(exported.get("EXPORTED"), Some(&"1".to_string()));
        assert!(!exported.contains_key("LOCAL_ONLY"));
    }

    #[test]
    fn cache_is_not_rebuilt_until_dirtied() {
        let mut scope = ScopeStack::new();
        scope.bind("X").unwrap().assign_scalar("1", false, noop).unwrap();
        scope.bind_global("X").unwrap().attributes.insert(crate::variable::Attributes::EXPORTED);
        let mut projector = EnvironmentProjector::new();
        projector.export(&scope);
        scope.bind_global("X").unwrap().assign_scalar("2", false, noop).unwrap();
        // Without marking dirty, the stale cached value is still returned.
        assert_eq!(projector.export(&scope).get("X"), Some(&"1".to_string()));
        projector.mark_dirty();
        assert_eq!(projector.export(&scope).get("X"), Some(&"2".to_string()));
    }

    #[test]
    fn import_recognizes_function_encoding() {
        let mut scope = ScopeStack::new();
        let mut projector = EnvironmentProjector::new();
        projector.import(
            &mut scope,
            &[("BASH_FUNC_greet%%".to_string(), "() { echo hi; }".to_string())],
        );
        assert!(matches!(scope.lookup_global("greet").unwrap().payload(), Payload::FunctionBody(_)));
    }

    #[test]
    fn import_keeps_invalid_identifiers_invisible() {
        let mut scope = ScopeStack::new();
        let mut projector = EnvironmentProjector::new();
        projector.import(&mut scope, &[("not-an-ident".to_string(), "x".to_string())]);
        assert!(scope.lookup_global("not-an-ident").is_none());
        assert_eq!(projector.invisible.get("not-an-ident"), Some(&"x".to_string()));
    }

    #[test]
    fn parses_compound_indexed_array() {
        let m = parse_compound_indexed(r#"([0]="a" [1]="b c")"#);
        assert_eq!(m.get(&0), Some(&"a".to_string()));
        assert_eq!(m.get(&1), Some(&"b c".to_string()));
    }

    #[test]
    fn parses_compound_assoc_array() {
        let m = parse_compound_assoc(r#"([k]="v")"#);
        assert_eq!(m.get("k"), Some(&"v".to_string()));
    }
}
