//! Nameref resolution — following `declare -n`-style indirection chains.
//!
//! A bounded-depth walk with a seen-set for cycle detection, a regex-free
//! validity check on each hop's target name, and two resolution variants
//! (stop at the last resolvable name for creation/assignment vs. walk
//! through to a concrete, non-nameref binding for reads).

use std::collections::HashSet;

use log::warn;

use crate::ident::is_valid_identifier;
use crate::scope::ScopeStack;
use crate::variable::Payload;

/// Bash's own bound on nameref chain length; exceeding it is treated as a
/// cycle.
pub const NAMEREF_MAX: usize = 8;

/// Outcome of resolving a nameref for assignment (`declare -n ref=target`, or
/// assigning through an existing nameref).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamerefAssignmentResult {
    /// Assignment should land on this concrete variable name.
    Target(String),
    /// The assignment should be skipped (e.g. target names the nameref
    /// itself — bash silently refuses self-reference).
    Skip,
    /// The chain cycles; `String` is the name at which the cycle was
    /// detected, for diagnostics.
    Circular(String),
}

fn target_name_valid(target: &str) -> bool {
    // A nameref target may itself carry a subscript (`declare -n r=arr[0]`);
    // validity is checked against the bare identifier portion.
    match crate::ident::split_subscript(target) {
        Some((name, _)) => is_valid_identifier(name),
        None => is_valid_identifier(target),
    }
}

/// Walk a nameref chain starting at `name`, following `declare -n` targets
/// until a non-nameref binding (or an unbound name) is reached. Used for
/// value *reads*: `$ref` always resolves all the way through.
///
/// Returns the final name in the chain. A cycle, or a chain exceeding
/// [`NAMEREF_MAX`], resolves back to `name` itself and logs a warning,
/// matching bash's fail-safe behavior of treating the nameref as if it were
/// unset rather than aborting.
pub fn resolve_nameref_for_read(scope: &ScopeStack, name: &str) -> String {
    let mut current = name.to_string();
    let mut seen = HashSet::new();
    seen.insert(current.clone());

    for _ in 0..NAMEREF_MAX {
        let var = match scope.lookup(&current) {
            Some(v) => v,
            None => return current,
        };
        let target = match var.payload() {
            Payload::NamerefTarget(t) => t.clone(),
            _ => return current,
        };
        if !target_name_valid(&target) {
            return current;
        }
        if seen.contains(&target) {
            warn!("nameref: circular reference detected resolving `{name}' (at `{target}')");
            return name.to_string();
        }
        seen.insert(target.clone());
        current = target;
    }
    warn!("nameref: chain for `{name}' exceeded NAMEREF_MAX ({NAMEREF_MAX})");
    name.to_string()
}

/// Resolve a nameref chain for the purposes of *creating or assigning a new
/// binding* (`declare -n ref=target`, or `ref=value` where `ref` is itself a
/// nameref). Unlike [`resolve_nameref_for_read`], this stops at the last
/// *resolvable* name in the chain rather than requiring the final target to
/// already exist — the assignment is what will bring it into existence.
pub fn resolve_nameref_for_assignment(
    scope: &ScopeStack,
    name: &str,
    target: &str,
) -> NamerefAssignmentResult {
    if !target_name_valid(target) {
        return NamerefAssignmentResult::Target(target.to_string());
    }
    let bare_target = crate::ident::split_subscript(target)
        .map(|(n, _)| n)
        .unwrap_or(target);
    if bare_target == name {
        return NamerefAssignmentResult::Skip;
    }

    let mut current = target.to_string();
    let mut seen = HashSet::new();
    seen.insert(name.to_string());
    seen.insert(current.clone());

    for _ in 0..NAMEREF_MAX {
        let bare = crate::ident::split_subscript(&current)
            .map(|(n, _)| n.to_string())
            .unwrap_or_else(|| current.clone());
        let var = match scope.lookup(&bare) {
            Some(v) => v,
            None => return NamerefAssignmentResult::Target(current),
        };
        let next = match var.payload() {
            Payload::NamerefTarget(t) => t.clone(),
            _ => return NamerefAssignmentResult::Target(current),
        };
        if !target_name_valid(&next) {
            return NamerefAssignmentResult::Target(current);
        }
        if seen.contains(&next) {
            warn!("nameref: circular reference assigning `{name}' -> `{target}' (at `{next}')");
            return NamerefAssignmentResult::Circular(next);
        }
        seen.insert(next.clone());
        current = next;
    }
    warn!("nameref: assignment chain for `{name}' exceeded NAMEREF_MAX ({NAMEREF_MAX})");
    NamerefAssignmentResult::Circular(current)
}
