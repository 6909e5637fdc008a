//! Matching engine — exact full-match primitive plus the longest/shortest
//! anchor-then-shrink search used by substring-removal and substitution.
//!
//! This is a from-scratch recursive matcher, not a regex translation: the
//! explicit longest-match-then-shrink discipline it implements is something
//! a backtracking regex engine doesn't expose as a primitive the caller can
//! control ("try this exact length, then this shorter one").

use super::parser::{ExtKind, PatternElem};

/// Where a match must be anchored when searching within a longer string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    /// Anchored at the start of the string (`#`/`##`, `${v/#pat/rep}`).
    Begin,
    /// Anchored at the end of the string (`%`/`%%`, `${v/%pat/rep}`).
    End,
    /// May occur anywhere (`${v/pat/rep}`).
    Free,
}

/// Whether to prefer the longest or shortest matching span once more than
/// one length at a given anchor point matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Greediness {
    Longest,
    Shortest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchSpan {
    pub start: usize,
    pub end: usize,
}

/// Whether `pattern` matches `text` in its entirety (the fnmatch-equivalent
/// primitive everything else is built from).
pub fn matches_full(pattern: &[PatternElem], text: &[char]) -> bool {
    match_from(pattern, 0, text, 0)
}

fn match_from(pattern: &[PatternElem], pi: usize, text: &[char], ti: usize) -> bool {
    if pi == pattern.len() {
        return ti == text.len();
    }
    match &pattern[pi] {
        PatternElem::Literal(c) => {
            ti < text.len() && text[ti] == *c && match_from(pattern, pi + 1, text, ti + 1)
        }
        PatternElem::AnyChar => ti < text.len() && match_from(pattern, pi + 1, text, ti + 1),
        PatternElem::Bracket(b) => {
            ti < text.len() && b.matches(text[ti]) && match_from(pattern, pi + 1, text, ti + 1)
        }
        PatternElem::AnyStar => {
            // Try consuming 0..=remaining characters, longest first — the
            // common case succeeds on the first attempt instead of the last.
            for take in (0..=(text.len() - ti)).rev() {
                if match_from(pattern, pi + 1, text, ti + take) {
                    return true;
                }
            }
            false
        }
        PatternElem::ExtGlob(kind, alternatives) => {
            match_extglob(*kind, alternatives, pattern, pi, text, ti)
        }
    }
}

fn match_extglob(
    kind: ExtKind,
    alternatives: &[Vec<PatternElem>],
    pattern: &[PatternElem],
    pi: usize,
    text: &[char],
    ti: usize,
) -> bool {
    match kind {
        ExtKind::ZeroOrOne => {
            if match_from(pattern, pi + 1, text, ti) {
                return true;
            }
            alternatives
                .iter()
                .any(|alt| match_alt_then_rest(alt, pattern, pi, text, ti))
        }
        ExtKind::ExactlyOne => alternatives
            .iter()
            .any(|alt| match_alt_then_rest(alt, pattern, pi, text, ti)),
        ExtKind::ZeroOrMore => match_repeat(alternatives, pattern, pi, text, ti, true),
        ExtKind::OneOrMore => match_repeat(alternatives, pattern, pi, text, ti, false),
        ExtKind::Negate => {
            // !(alts): try every split point; the prefix up to that point
            // must NOT fully match any alternative, and the remainder must
            // match the rest of the pattern.
            for take in 0..=(text.len() - ti) {
                let slice = &text[ti..ti + take];
                let any_alt_matches = alternatives.iter().any(|alt| matches_full(alt, slice));
                if !any_alt_matches && match_from(pattern, pi + 1, text, ti + take) {
                    return true;
                }
            }
            false
        }
    }
}

/// Try matching one alternative fully at some length, then continue with the
/// rest of the outer pattern from that point.
fn match_alt_then_rest(
    alt: &[PatternElem],
    pattern: &[PatternElem],
    pi: usize,
    text: &[char],
    ti: usize,
) -> bool {
    for take in (0..=(text.len() - ti)).rev() {
        let slice = &text[ti..ti + take];
        if matches_full(alt, slice) && match_from(pattern, pi + 1, text, ti + take) {
            return true;
        }
    }
    false
}

fn match_repeat(
    alternatives: &[Vec<PatternElem>],
    pattern: &[PatternElem],
    pi: usize,
    text: &[char],
    ti: usize,
    allow_zero: bool,
) -> bool {
    if allow_zero && match_from(pattern, pi + 1, text, ti) {
        return true;
    }
    // One pass through an alternative, then either stop (if the rest of the
    // pattern matches from here) or repeat.
    for alt in alternatives {
        for take in 1..=(text.len() - ti) {
            let slice = &text[ti..ti + take];
            if !matches_full(alt, slice) {
                continue;
            }
            if match_from(pattern, pi + 1, text, ti + take) {
                return true;
            }
            if match_repeat(alternatives, pattern, pi, text, ti + take, true) {
                return true;
            }
        }
    }
    false
}

/// A rough, cheap-to-compute lower bound on how many characters `pattern`
/// must consume to match anything, used to prune obviously-too-short
/// candidate spans before invoking the expensive exact matcher.
fn minimum_consumption(pattern: &[PatternElem]) -> usize {
    pattern
        .iter()
        .map(|elem| match elem {
            PatternElem::AnyStar => 0,
            PatternElem::ExtGlob(ExtKind::ZeroOrOne, _) | PatternElem::ExtGlob(ExtKind::ZeroOrMore, _) => 0,
            PatternElem::ExtGlob(ExtKind::Negate, _) => 0,
            _ => 1,
        })
        .sum()
}

/// Search for `pattern` within `text`, honoring `anchor` and `greediness`.
/// For a Begin anchor this scans candidate end offsets (longest-first or
/// shortest-first); for an End anchor it scans candidate start offsets; for
/// Free it scans every start position left-to-right and, at each, every
/// candidate length in the requested order, matching bash's own
/// leftmost-then-longest (or leftmost-then-shortest) tie-break.
pub fn find_match(
    pattern: &[PatternElem],
    text: &[char],
    anchor: Anchor,
    greediness: Greediness,
) -> Option<MatchSpan> {
    let min_len = minimum_consumption(pattern);
    match anchor {
        Anchor::Begin => {
            let lengths = ordered_lengths(0, text.len(), greediness, min_len);
            for len in lengths {
                if matches_full(pattern, &text[0..len]) {
                    return Some(MatchSpan { start: 0, end: len });
                }
            }
            None
        }
        Anchor::End => {
            let lengths = ordered_lengths(0, text.len(), greediness, min_len);
            for len in lengths {
                let start = text.len() - len;
                if matches_full(pattern, &text[start..]) {
                    return Some(MatchSpan { start, end: text.len() });
                }
            }
            None
        }
        Anchor::Free => {
            for start in 0..=text.len() {
                let remaining = text.len() - start;
                let lengths = ordered_lengths(0, remaining, greediness, min_len);
                for len in lengths {
                    if matches_full(pattern, &text[start..start + len]) {
                        return Some(MatchSpan { start, end: start + len });
                    }
                }
            }
            None
        }
    }
}

fn ordered_lengths(min: usize, max: usize, greediness: Greediness, floor: usize) -> Vec<usize> {
    let floor = floor.min(max);
    let mut v: Vec<usize> = (min.max(floor)..=max).collect();
    if matches!(greediness, Greediness::Longest) {
        v.reverse();
    }
    v
}
