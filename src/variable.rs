//! Value store — the payload and attribute model for a single shell variable.
//!
//! Attributes are a `bitflags`-based set, in the style of `pkgcraft-scallop`'s
//! `Attr`, collapsed into one tagged struct rather than a family of parallel
//! `HashSet<String>` membership tables: each variable owns its own attributes
//! and payload, so "array and assoc mirror the payload; they never disagree"
//! is enforced by construction rather than by convention across a dozen
//! sibling sets.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use bitflags::bitflags;

use crate::error::{Error, ResolutionMode, Result};

bitflags! {
    /// Attribute bitset for a [`Variable`]. Named after the POSIX/bash
    /// attribute letters (`declare -x`, `-r`, `-i`, ...).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Attributes: u32 {
        const EXPORTED   = 1 << 0;
        const READONLY   = 1 << 1;
        const INTEGER    = 1 << 2;
        const LOWERCASE  = 1 << 3;
        const UPPERCASE  = 1 << 4;
        const CAPCASE    = 1 << 5;
        const ARRAY      = 1 << 6;
        const ASSOC      = 1 << 7;
        const FUNCTION   = 1 << 8;
        const NAMEREF    = 1 << 9;
        const TEMPVAR    = 1 << 10;
        const PROPAGATE  = 1 << 11;
        const LOCAL      = 1 << 12;
        const INVISIBLE  = 1 << 13;
        const IMPORTED   = 1 << 14;
        const REGENERATE = 1 << 15;
        const NOASSIGN   = 1 << 16;
        const NOUNSET    = 1 << 17;
        const NOFREE     = 1 << 18;
    }
}

impl Attributes {
    /// At most one of lower/upper/capcase may be active.
    pub fn case_mode(self) -> Option<CaseMode> {
        if self.contains(Attributes::LOWERCASE) {
            Some(CaseMode::Lower)
        } else if self.contains(Attributes::UPPERCASE) {
            Some(CaseMode::Upper)
        } else if self.contains(Attributes::CAPCASE) {
            Some(CaseMode::Cap)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseMode {
    Lower,
    Upper,
    Cap,
}

/// Apply a variable's case-modifying attribute to a freshly assigned scalar.
pub fn apply_case_mode(mode: CaseMode, s: &str) -> String {
    match mode {
        CaseMode::Lower => s.to_lowercase(),
        CaseMode::Upper => s.to_uppercase(),
        CaseMode::Cap => {
            let mut out = String::with_capacity(s.len());
            let mut start_of_word = true;
            for c in s.chars() {
                if start_of_word && c.is_alphabetic() {
                    out.extend(c.to_uppercase());
                    start_of_word = false;
                } else {
                    out.push(c);
                    if !c.is_alphanumeric() {
                        start_of_word = true;
                    }
                }
            }
            out
        }
    }
}

/// A getter hook: recomputes the effective value of a dynamic variable on
/// every read. Implemented as `Fn` (not `FnMut`) so several readers can share
/// one `Rc`-wrapped hook and so interior state (e.g. a PRNG) lives behind a
/// `RefCell` owned by the closure's captures, matching the single-threaded
/// resource model this crate assumes throughout.
pub type Getter = Rc<dyn Fn() -> Payload>;

/// A setter hook: invoked instead of the default store when present. Returns
/// the `Payload` that should actually be stored (the hook may transform the
/// incoming value, e.g. `RANDOM`'s setter reseeds rather than storing a
/// literal string).
pub type Setter = Rc<dyn Fn(Payload) -> Payload>;

/// The payload a [`Variable`] currently holds. At most one variant is active
/// per variable.
#[derive(Clone)]
pub enum Payload {
    Unset,
    Scalar(String),
    IndexedArray(BTreeMap<i64, String>),
    AssocArray(BTreeMap<String, String>),
    /// Opaque command-tree handle; the parser/executor (out of scope here)
    /// owns the actual AST and hands this crate only an identity string used
    /// for export serialization (`BASH_FUNC_name%%=`).
    FunctionBody(String),
    NamerefTarget(String),
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Unset => write!(f, "Unset"),
            Payload::Scalar(s) => f.debug_tuple("Scalar").field(s).finish(),
            Payload::IndexedArray(m) => f.debug_tuple("IndexedArray").field(m).finish(),
            Payload::AssocArray(m) => f.debug_tuple("AssocArray").field(m).finish(),
            Payload::FunctionBody(s) => f.debug_tuple("FunctionBody").field(s).finish(),
            Payload::NamerefTarget(s) => f.debug_tuple("NamerefTarget").field(s).finish(),
        }
    }
}

impl PartialEq for Payload {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Payload::Unset, Payload::Unset) => true,
            (Payload::Scalar(a), Payload::Scalar(b)) => a == b,
            (Payload::IndexedArray(a), Payload::IndexedArray(b)) => a == b,
            (Payload::AssocArray(a), Payload::AssocArray(b)) => a == b,
            (Payload::FunctionBody(a), Payload::FunctionBody(b)) => a == b,
            (Payload::NamerefTarget(a), Payload::NamerefTarget(b)) => a == b,
            _ => false,
        }
    }
}

impl Payload {
    pub fn is_unset(&self) -> bool {
        matches!(self, Payload::Unset)
    }

    /// Render the payload the way bash renders it for a plain `$name`
    /// expansion: a scalar as itself, index-0 of an array, or empty.
    pub fn scalarize(&self) -> String {
        match self {
            Payload::Unset => String::new(),
            Payload::Scalar(s) => s.clone(),
            Payload::IndexedArray(m) => m.get(&0).cloned().unwrap_or_default(),
            Payload::AssocArray(m) => m.get("0").cloned().unwrap_or_default(),
            Payload::FunctionBody(_) => String::new(),
            Payload::NamerefTarget(s) => s.clone(),
        }
    }
}

/// A named shell variable: payload, attributes, and (for dynamic variables)
/// hook closures.
#[derive(Clone)]
pub struct Variable {
    pub name: String,
    payload: Payload,
    pub attributes: Attributes,
    pub scope_depth: u32,
    getter: Option<Getter>,
    setter: Option<Setter>,
    /// Cached `NAME=VALUE` export string, invalidated whenever the payload
    /// or export attribute changes ("Exported environment snapshot").
    export_cache: RefCell<Option<String>>,
}

impl fmt::Debug for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Variable")
            .field("name", &self.name)
            .field("payload", &self.payload)
            .field("attributes", &self.attributes)
            .field("scope_depth", &self.scope_depth)
            .field("has_getter", &self.getter.is_some())
            .field("has_setter", &self.setter.is_some())
            .finish()
    }
}

impl Variable {
    pub fn new(name: impl Into<String>) -> Self {
        Variable {
            name: name.into(),
            payload: Payload::Unset,
            attributes: Attributes::empty(),
            scope_depth: 0,
            getter: None,
            setter: None,
            export_cache: RefCell::new(None),
        }
    }

    pub fn scalar(name: impl Into<String>, value: impl Into<String>) -> Self {
        let mut v = Self::new(name);
        v.payload = Payload::Scalar(value.into());
        v
    }

    pub fn is_readonly(&self) -> bool {
        self.attributes.contains(Attributes::READONLY)
    }

    pub fn is_exported(&self) -> bool {
        self.attributes.contains(Attributes::EXPORTED)
    }

    pub fn is_invisible(&self) -> bool {
        self.attributes.contains(Attributes::INVISIBLE)
    }

    pub fn is_nameref(&self) -> bool {
        self.attributes.contains(Attributes::NAMEREF)
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Whether a read of this variable should be treated as unbound for the
    /// purposes of `set -u`: unset, or an empty array/assoc with no elements
    /// at all.
    pub fn display_value_for_unset_check(&self) -> bool {
        match &self.payload {
            Payload::Unset => true,
            Payload::IndexedArray(m) => m.is_empty(),
            Payload::AssocArray(m) => m.is_empty(),
            _ => false,
        }
    }

    pub fn set_getter(&mut self, getter: Getter) {
        self.getter = Some(getter);
    }

    pub fn set_setter(&mut self, setter: Setter) {
        self.setter = Some(setter);
    }

    pub fn has_dynamic_getter(&self) -> bool {
        self.getter.is_some()
    }

    /// Read the effective payload, invoking the dynamic getter if present.
    /// The getter is invoked on every read; it may recompute the payload
    /// in place.
    pub fn effective_payload(&mut self) -> &Payload {
        if let Some(getter) = self.getter.clone() {
            self.payload = getter();
            self.invalidate_export_cache();
        }
        &self.payload
    }

    fn invalidate_export_cache(&self) {
        *self.export_cache.borrow_mut() = None;
    }

    /// Unconditionally replace the payload, bypassing readonly/attribute
    /// checks. Used internally once those checks have already passed, and by
    /// the nameref/environment-import paths that construct fully-formed
    /// variables directly.
    pub fn set_payload_raw(&mut self, payload: Payload) {
        match &payload {
            Payload::IndexedArray(_) => self.attributes.insert(Attributes::ARRAY),
            Payload::AssocArray(_) => self.attributes.insert(Attributes::ASSOC),
            Payload::FunctionBody(_) => self.attributes.insert(Attributes::FUNCTION),
            Payload::NamerefTarget(_) => self.attributes.insert(Attributes::NAMEREF),
            _ => {}
        }
        self.payload = payload;
        self.invalidate_export_cache();
    }

    /// Assign a scalar value, honoring readonly/noassign/integer/case
    /// attributes . `force` bypasses the readonly check (used by
    /// `declare -g -r` re-assignment-at-creation and similar internal paths).
    pub fn assign_scalar(
        &mut self,
        value: impl Into<String>,
        force: bool,
        eval_arith: impl FnOnce(&str) -> Result<String>,
    ) -> Result<()> {
        self.assign_scalar_with_mode(value, force, ResolutionMode::Strict, eval_arith)
    }

    /// Same as [`Variable::assign_scalar`], but takes the "no-long-jump"
    /// flag explicitly: in [`ResolutionMode::Degraded`], an
    /// [`Error::ArithmeticError`] from an integer-attributed assignment does
    /// not unwind — the literal, unevaluated right-hand side is stored
    /// instead.
    pub fn assign_scalar_with_mode(
        &mut self,
        value: impl Into<String>,
        force: bool,
        mode: ResolutionMode,
        eval_arith: impl FnOnce(&str) -> Result<String>,
    ) -> Result<()> {
        if self.attributes.contains(Attributes::NOASSIGN) {
            return Err(Error::NoAssign(self.name.clone()));
        }
        if self.is_readonly() && !force {
            return Err(Error::ReadOnly(self.name.clone()));
        }
        let mut value = value.into();

        // Arrays/assoc arrays reject scalar assignment by routing it to index
        // 0 instead: bash's actual behavior for `arr=x` on an existing array
        // is "assign to arr[0]".
        match &self.payload {
            Payload::IndexedArray(_) => {
                return self.insert_indexed(0, value, false, eval_arith);
            }
            Payload::AssocArray(_) => {
                return self.insert_assoc("0".to_string(), value, false, eval_arith);
            }
            _ => {}
        }

        if self.attributes.contains(Attributes::INTEGER) {
            match eval_arith(&value) {
                Ok(evaluated) => value = evaluated,
                Err(e) if mode == ResolutionMode::Degraded => {
                    log::warn!(
                        "variable: arithmetic evaluation failed for `{}' ({e}), falling through to literal assignment",
                        self.name
                    );
                }
                Err(e) => return Err(e),
            }
        }
        if let Some(mode) = self.attributes.case_mode() {
            value = apply_case_mode(mode, &value);
        }

        if let Some(setter) = self.setter.clone() {
            self.payload = setter(Payload::Scalar(value));
        } else {
            self.payload = Payload::Scalar(value);
        }
        self.invalidate_export_cache();
        Ok(())
    }

    /// Append to a scalar (`var+=value`). Growth margin is left to
    /// `String`'s own amortized-doubling `push_str`, which already gives
    /// amortized-O(n) appends; an explicit `reserve` before the push avoids a
    /// realloc on the common single-append case.
    pub fn append_scalar(
        &mut self,
        suffix: &str,
        eval_arith: impl FnOnce(&str) -> Result<String>,
    ) -> Result<()> {
        if self.is_readonly() {
            return Err(Error::ReadOnly(self.name.clone()));
        }
        let is_integer = self.attributes.contains(Attributes::INTEGER);
        let existing_before = self.payload.scalarize();
        match &mut self.payload {
            Payload::IndexedArray(_) | Payload::AssocArray(_) => {
                // Arrays/assoc route scalar append to index 0 too.
                let mut combined = existing_before.clone();
                combined.reserve(suffix.len());
                combined.push_str(suffix);
                return self.insert_indexed_or_assoc_zero(combined, eval_arith);
            }
            Payload::Scalar(s) => {
                s.reserve(suffix.len());
                s.push_str(suffix);
            }
            Payload::Unset => {
                self.payload = Payload::Scalar(suffix.to_string());
            }
            _ => {}
        }
        if is_integer {
            // `declare -i x=5; x+=3` is arithmetic addition, not string
            // concatenation: evaluate "old+(suffix)" rather than evaluating
            // the concatenated literal "53".
            let evaluated = eval_arith(&format!("{existing_before}+({suffix})"))?;
            self.payload = Payload::Scalar(evaluated);
        } else if let Some(mode) = self.attributes.case_mode() {
            let combined = self.payload.scalarize();
            self.payload = Payload::Scalar(apply_case_mode(mode, &combined));
        }
        self.invalidate_export_cache();
        Ok(())
    }

    fn insert_indexed_or_assoc_zero(
        &mut self,
        value: String,
        eval_arith: impl FnOnce(&str) -> Result<String>,
    ) -> Result<()> {
        match &self.payload {
            Payload::AssocArray(_) => self.insert_assoc("0".to_string(), value, false, eval_arith),
            _ => self.insert_indexed(0, value, false, eval_arith),
        }
    }

    /// Convert this variable's payload to an indexed array. A scalar becomes
    /// a one-element array at index 0; an existing assoc array is rejected
    /// unless `force` (used by `declare -a` applied to an already-associative
    /// variable, which bash itself rejects with `IncompatibleType`).
    pub fn convert_to_array(&mut self, force: bool) -> Result<()> {
        if self.attributes.contains(Attributes::ASSOC) && !force {
            return Err(Error::IncompatibleType(self.name.clone()));
        }
        self.payload = match std::mem::replace(&mut self.payload, Payload::Unset) {
            Payload::Unset => Payload::IndexedArray(BTreeMap::new()),
            Payload::Scalar(s) => {
                let mut m = BTreeMap::new();
                m.insert(0, s);
                Payload::IndexedArray(m)
            }
            Payload::IndexedArray(m) => Payload::IndexedArray(m),
            Payload::AssocArray(m) => {
                // Force-convert: re-key by insertion order starting at 0.
                let mut out = BTreeMap::new();
                for (i, (_, v)) in m.into_iter().enumerate() {
                    out.insert(i as i64, v);
                }
                Payload::IndexedArray(out)
            }
            other => other,
        };
        self.attributes.remove(Attributes::ASSOC);
        self.attributes.insert(Attributes::ARRAY);
        self.invalidate_export_cache();
        Ok(())
    }

    /// Convert this variable's payload to an associative array.
    pub fn convert_to_assoc(&mut self, force: bool) -> Result<()> {
        if self.attributes.contains(Attributes::ARRAY) && !force {
            return Err(Error::IncompatibleType(self.name.clone()));
        }
        self.payload = match std::mem::replace(&mut self.payload, Payload::Unset) {
            Payload::Unset => Payload::AssocArray(BTreeMap::new()),
            Payload::Scalar(s) => {
                let mut m = BTreeMap::new();
                m.insert("0".to_string(), s);
                Payload::AssocArray(m)
            }
            Payload::AssocArray(m) => Payload::AssocArray(m),
            Payload::IndexedArray(m) => {
                let mut out = BTreeMap::new();
                for (k, v) in m {
                    out.insert(k.to_string(), v);
                }
                Payload::AssocArray(out)
            }
            other => other,
        };
        self.attributes.remove(Attributes::ARRAY);
        self.attributes.insert(Attributes::ASSOC);
        self.invalidate_export_cache();
        Ok(())
    }

    /// Insert a value at an index of an indexed array, converting an unset
    /// or scalar payload into an array first ("insert-at-index").
    pub fn insert_indexed(
        &mut self,
        index: i64,
        value: impl Into<String>,
        append: bool,
        eval_arith: impl FnOnce(&str) -> Result<String>,
    ) -> Result<()> {
        if self.is_readonly() {
            return Err(Error::ReadOnly(self.name.clone()));
        }
        if !matches!(self.payload, Payload::IndexedArray(_)) {
            self.convert_to_array(true)?;
        }
        let mut value = value.into();
        if self.attributes.contains(Attributes::INTEGER) {
            value = eval_arith(&value)?;
        }
        if let Some(mode) = self.attributes.case_mode() {
            value = apply_case_mode(mode, &value);
        }
        if append {
            if let Payload::IndexedArray(m) = &self.payload {
                if let Some(existing) = m.get(&index) {
                    value = format!("{existing}{value}");
                }
            }
        }
        if let Some(setter) = self.setter.clone() {
            let mut single = BTreeMap::new();
            single.insert(index, value.clone());
            setter(Payload::IndexedArray(single));
        }
        if let Payload::IndexedArray(m) = &mut self.payload {
            m.insert(index, value);
        }
        self.invalidate_export_cache();
        Ok(())
    }

    /// Insert a value at a key of an associative array.
    pub fn insert_assoc(
        &mut self,
        key: String,
        value: impl Into<String>,
        append: bool,
        eval_arith: impl FnOnce(&str) -> Result<String>,
    ) -> Result<()> {
        if self.is_readonly() {
            return Err(Error::ReadOnly(self.name.clone()));
        }
        if !matches!(self.payload, Payload::AssocArray(_)) {
            self.convert_to_assoc(true)?;
        }
        let mut value = value.into();
        if self.attributes.contains(Attributes::INTEGER) {
            value = eval_arith(&value)?;
        }
        if let Some(mode) = self.attributes.case_mode() {
            value = apply_case_mode(mode, &value);
        }
        if let Payload::AssocArray(m) = &mut self.payload {
            if append {
                let existing = m.entry(key).or_default();
                existing.push_str(&value);
            } else {
                m.insert(key, value);
            }
        }
        self.invalidate_export_cache();
        Ok(())
    }

    pub fn read_indexed(&self, index: i64) -> Option<&str> {
        match &self.payload {
            Payload::IndexedArray(m) => m.get(&index).map(String::as_str),
            _ => None,
        }
    }

    pub fn read_assoc(&self, key: &str) -> Option<&str> {
        match &self.payload {
            Payload::AssocArray(m) => m.get(key).map(String::as_str),
            _ => None,
        }
    }

    pub fn delete_at_index(&mut self, index: i64) -> Result<Option<String>> {
        if self.is_readonly() {
            return Err(Error::ReadOnly(self.name.clone()));
        }
        let removed = match &mut self.payload {
            Payload::IndexedArray(m) => m.remove(&index),
            _ => None,
        };
        self.invalidate_export_cache();
        Ok(removed)
    }

    pub fn delete_at_key(&mut self, key: &str) -> Result<Option<String>> {
        if self.is_readonly() {
            return Err(Error::ReadOnly(self.name.clone()));
        }
        let removed = match &mut self.payload {
            Payload::AssocArray(m) => m.remove(key),
            _ => None,
        };
        self.invalidate_export_cache();
        Ok(removed)
    }

    /// Serialize this variable's value for the exported environment, caching
    /// the result until the payload changes.
    pub fn export_string(&self) -> Option<String> {
        if !self.is_exported() {
            return None;
        }
        if let Some(cached) = self.export_cache.borrow().as_ref() {
            return Some(cached.clone());
        }
        let rendered = match &self.payload {
            Payload::Unset => return None,
            Payload::Scalar(s) => format!("{}={}", self.name, s),
            Payload::IndexedArray(m) => {
                let body = m
                    .iter()
                    .map(|(i, v)| format!("[{}]=\"{}\"", i, escape_for_compound(v)))
                    .collect::<Vec<_>>()
                    .join(" ");
                format!("BASH_ARRAY_{}%%=({})", self.name, body)
            }
            Payload::AssocArray(m) => {
                let body = m
                    .iter()
                    .map(|(k, v)| format!("[{}]=\"{}\"", k, escape_for_compound(v)))
                    .collect::<Vec<_>>()
                    .join(" ");
                format!("BASH_ASSOC_{}%%=({})", self.name, body)
            }
            Payload::FunctionBody(body) => format!("BASH_FUNC_{}%%=() {{ {} }}", self.name, body),
            Payload::NamerefTarget(target) => format!("{}={}", self.name, target),
        };
        *self.export_cache.borrow_mut() = Some(rendered.clone());
        Some(rendered)
    }

    pub fn clone_variable(&self) -> Variable {
        self.clone()
    }

    pub fn dispose(self) {
        // Variables own no external resources; dropping is sufficient. Kept
        // as an explicit operation so scope teardown has a symmetrical call
        // site alongside `propagate`.
        drop(self);
    }
}

fn escape_for_compound(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop_arith(s: &str) -> Result<String> {
        Ok(s.to_string())
    }

    #[test]
    fn scalar_assign_and_readonly() {
        let mut v = Variable::new("x");
        v.assign_scalar("1", false, noop_arith).unwrap();
        assert_eq!(v.payload().scalarize(), "1");
        v.attributes.insert(Attributes::READONLY);
        let err = v.assign_scalar("2", false, noop_arith).unwrap_err();
        assert_eq!(err, Error::ReadOnly("x".to_string()));
        // force bypasses readonly
        v.assign_scalar("2", true, noop_arith).unwrap();
        assert_eq!(v.payload().scalarize(), "2");
    }

    #[test]
    fn degraded_mode_falls_through_to_literal_on_arith_failure() {
        let mut v = Variable::new("n");
        v.attributes.insert(Attributes::INTEGER);
        let result = v.assign_scalar_with_mode("not an expr", false, crate::error::ResolutionMode::Degraded, |_| {
            Err(Error::ArithmeticError("not an expr".to_string()))
        });
        assert!(result.is_ok());
        assert_eq!(v.payload().scalarize(), "not an expr");
    }

    #[test]
    fn strict_mode_propagates_arith_failure() {
        let mut v = Variable::new("n");
        v.attributes.insert(Attributes::INTEGER);
        let err = v
            .assign_scalar("not an expr", false, |_| Err(Error::ArithmeticError("not an expr".to_string())))
            .unwrap_err();
        assert_eq!(err, Error::ArithmeticError("not an expr".to_string()));
    }

    #[test]
    fn integer_attribute_evaluates_arith() {
        let mut v = Variable::new("n");
        v.attributes.insert(Attributes::INTEGER);
        v.assign_scalar("40+2", false, |s| {
            Ok(s.replace("40+2", "42"))
        })
        .unwrap();
        assert_eq!(v.payload().scalarize(), "42");
    }

    #[test]
    fn case_mode_applies_on_assignment() {
        let mut v = Variable::new("s");
        v.attributes.insert(Attributes::UPPERCASE);
        v.assign_scalar("hello", false, noop_arith).unwrap();
        assert_eq!(v.payload().scalarize(), "HELLO");
    }

    #[test]
    fn append_amortized() {
        let mut v = Variable::scalar("s", "a");
        v.append_scalar("b", noop_arith).unwrap();
        v.append_scalar("c", noop_arith).unwrap();
        assert_eq!(v.payload().scalarize(), "abc");
    }

    #[test]
    fn integer_append_adds_rather_than_concatenates() {
        let mut v = Variable::new("n");
        v.attributes.insert(Attributes::INTEGER);
        v.assign_scalar("5", false, noop_arith).unwrap();
        v.append_scalar("3", |s| Ok(s.replace("5+(3)", "8"))).unwrap();
        assert_eq!(v.payload().scalarize(), "8");
    }

    #[test]
    fn scalar_assign_on_array_routes_to_index_zero() {
        let mut v = Variable::new("arr");
        v.insert_indexed(0, "zero", false, noop_arith).unwrap();
        v.insert_indexed(5, "five", false, noop_arith).unwrap();
        v.assign_scalar("replaced", false, noop_arith).unwrap();
        assert_eq!(v.read_indexed(0), Some("replaced"));
        assert_eq!(v.read_indexed(5), Some("five"));
    }

    #[test]
    fn convert_to_array_then_assoc_rejected_without_force() {
        let mut v = Variable::new("a");
        v.convert_to_array(false).unwrap();
        let err = v.convert_to_assoc(false).unwrap_err();
        assert_eq!(err, Error::IncompatibleType("a".to_string()));
        v.convert_to_assoc(true).unwrap();
        assert!(v.attributes.contains(Attributes::ASSOC));
    }

    #[test]
    fn export_string_caches_until_mutation() {
        let mut v = Variable::scalar("x", "1");
        v.attributes.insert(Attributes::EXPORTED);
        assert_eq!(v.export_string(), Some("x=1".to_string()));
        assert_eq!(v.export_string(), Some("x=1".to_string()));
        v.assign_scalar("2", false, noop_arith).unwrap();
        assert_eq!(v.export_string(), Some("x=2".to_string()));
    }

    #[test]
    fn dynamic_getter_recomputes_on_read() {
        let counter = Rc::new(RefCell::new(0));
        let counter2 = counter.clone();
        let mut v = Variable::new("N");
        v.set_getter(Rc::new(move || {
            *counter2.borrow_mut() += 1;
            Payload::Scalar(counter2.borrow().to_string())
        }));
        assert_eq!(v.effective_payload().scalarize(), "1");
        assert_eq!(v.effective_payload().scalarize(), "2");
    }
}
