//! Substring-removal (`#`/`##`/`%`/`%%`) and substitution (`${v/pat/rep}`)
//! parameter-expansion operators, built atop [`crate::pattern`].

use crate::pattern::{Anchor, Greediness, Pattern};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalSide {
    /// `#pattern` — shortest match anchored at the start.
    PrefixShortest,
    /// `##pattern` — longest match anchored at the start.
    PrefixLongest,
    /// `%pattern` — shortest match anchored at the end.
    SuffixShortest,
    /// `%%pattern` — longest match anchored at the end.
    SuffixLongest,
}

/// Remove the matched span described by `side` from `value`, returning the
/// remainder. An empty pattern never matches: removing nothing leaves the
/// value unchanged.
pub fn remove(value: &str, pattern: &Pattern, side: RemovalSide) -> String {
    if pattern.source().is_empty() {
        return value.to_string();
    }
    let (anchor, greediness) = match side {
        RemovalSide::PrefixShortest => (Anchor::Begin, Greediness::Shortest),
        RemovalSide::PrefixLongest => (Anchor::Begin, Greediness::Longest),
        RemovalSide::SuffixShortest => (Anchor::End, Greediness::Shortest),
        RemovalSide::SuffixLongest => (Anchor::End, Greediness::Longest),
    };
    match pattern.find(value, anchor, greediness) {
        Some(span) => {
            let mut out = String::with_capacity(value.len() - (span.end - span.start));
            out.push_str(&value[..span.start]);
            out.push_str(&value[span.end..]);
            out
        }
        None => value.to_string(),
    }
}

/// Apply `remove` elementwise across an array/positional-parameter value
/// set. Each element is treated as a separate field; `$*`/`$@` joining is
/// the caller's concern once this returns the per-element results.
pub fn remove_each<'a>(
    values: impl IntoIterator<Item = &'a str>,
    pattern: &Pattern,
    side: RemovalSide,
) -> Vec<String> {
    values.into_iter().map(|v| remove(v, pattern, side)).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubstMode {
    /// `${v/pat/rep}` — first match anywhere.
    First,
    /// `${v//pat/rep}` — every non-overlapping match.
    Global,
    /// `${v/#pat/rep}` — anchored at the start.
    Begin,
    /// `${v/%pat/rep}` — anchored at the end.
    End,
}

/// Substitute occurrences of `pattern` in `value` with `replacement`.
///
/// - `&` in `replacement` is expanded to the matched text unless
///   `allow_ampersand_escape` is set and it is preceded by a backslash (a
///   compatibility toggle gated by `BASH_COMPAT`).
/// - A zero-length match advances by one codepoint after substitution so
///   `Global` mode cannot loop forever on patterns like `${v//x*/y}` applied
///   to an empty match.
pub fn substitute(
    value: &str,
    pattern: &Pattern,
    replacement: &str,
    mode: SubstMode,
    allow_ampersand_escape: bool,
) -> String {
    if pattern.source().is_empty() {
        return match mode {
            SubstMode::Begin => {
                let mut out = String::with_capacity(value.len() + replacement.len());
                out.push_str(replacement);
                out.push_str(value);
                out
            }
            SubstMode::End => {
                let mut out = String::with_capacity(value.len() + replacement.len());
                out.push_str(value);
                out.push_str(replacement);
                out
            }
            _ => value.to_string(),
        };
    }

    let (anchor, greediness) = match mode {
        SubstMode::First | SubstMode::Global => (Anchor::Free, Greediness::Longest),
        SubstMode::Begin => (Anchor::Begin, Greediness::Longest),
        SubstMode::End => (Anchor::End, Greediness::Longest),
    };

    let mut out = String::with_capacity(value.len());
    let mut cursor = 0usize;
    loop {
        let remaining = &value[cursor..];
        if remaining.is_empty() && cursor > 0 {
            break;
        }
        let found = pattern.find(remaining, anchor, greediness);
        match found {
            Some(span) if span.start == span.end && remaining.is_empty() => {
                // Empty haystack with a zero-length match: substitute once,
                // then stop (there is nothing left to advance over).
                out.push_str(&expand_ampersand(replacement, "", allow_ampersand_escape));
                break;
            }
            Some(span) => {
                out.push_str(&remaining[..span.start]);
                let matched_text = &remaining[span.start..span.end];
                out.push_str(&expand_ampersand(replacement, matched_text, allow_ampersand_escape));
                if span.end == span.start {
                    // Zero-length match: copy one codepoint forward so we
                    // make progress, then keep scanning (Global) or stop.
                    let mut chars = remaining[span.end..].char_indices();
                    match chars.next() {
                        Some((_, c)) => {
                            out.push(c);
                            cursor += span.end + c.len_utf8();
                        }
                        None => {
                            cursor = value.len();
                        }
                    }
                } else {
                    cursor += span.end;
                }
                if !matches!(mode, SubstMode::Global) {
                    out.push_str(&value[cursor..]);
                    break;
                }
                if cursor >= value.len() {
                    break;
                }
            }
            None => {
                out.push_str(remaining);
                break;
            }
        }
    }
    out
}

/// Expand `&` backreferences in `replacement`: a bare `&` always expands to
/// the matched text, with no compatibility flag involved. `allow_escape`
/// gates whether a backslash preceding `&` or another backslash suppresses
/// that special meaning — without the flag,
/// backslash has no special role in the replacement text at all.
fn expand_ampersand(replacement: &str, matched_text: &str, allow_escape: bool) -> String {
    let mut out = String::with_capacity(replacement.len());
    let mut chars = replacement.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' && allow_escape && matches!(chars.peek(), Some(&'&') | Some(&'\\')) {
            out.push(*chars.peek().unwrap());
            chars.next();
        } else if c == '&' {
            out.push_str(matched_text);
        } else {
            out.push(c);
        }
    }
    out
}

/// Apply `substitute` elementwise across an array value set; each
/// substituted element is emitted as a separate field.
pub fn substitute_each<'a>(
    values: impl IntoIterator<Item = &'a str>,
    pattern: &Pattern,
    replacement: &str,
    mode: SubstMode,
    allow_ampersand_escape: bool,
) -> Vec<String> {
    values
        .into_iter()
        .map(|v| substitute(v, pattern, replacement, mode, allow_ampersand_escape))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removes_longest_prefix() {
        let p = Pattern::compile("*/");
        assert_eq!(remove("/usr/local/bin", &p, RemovalSide::PrefixLongest), "bin");
    }

    #[test]
    fn removes_shortest_prefix() {
        let p = Pattern::compile("*/");
        assert_eq!(remove("/usr/local/bin", &p, RemovalSide::PrefixShortest), "usr/local/bin");
    }

    #[test]
    fn removes_longest_suffix() {
        let p = Pattern::compile("/*");
        assert_eq!(remove("/usr/local/bin", &p, RemovalSide::SuffixLongest), "");
    }

    #[test]
    fn removes_shortest_suffix() {
        let p = Pattern::compile("/*");
        assert_eq!(remove("/usr/local/bin", &p, RemovalSide::SuffixShortest), "/usr/local");
    }

    #[test]
    fn empty_pattern_removes_nothing() {
        let p = Pattern::compile("");
        assert_eq!(remove("abc", &p, RemovalSide::PrefixLongest), "abc");
    }

    #[test]
    fn substitutes_first_occurrence() {
        let p = Pattern::compile("o");
        assert_eq!(substitute("foo boo", &p, "0", SubstMode::First, false), "f0o boo");
    }

    #[test]
    fn substitutes_all_occurrences() {
        let p = Pattern::compile("o");
        assert_eq!(substitute("foo boo", &p, "0", SubstMode::Global, false), "f00 b00");
    }

    #[test]
    fn substitutes_with_ampersand_backreference() {
        let p = Pattern::compile("o+(o)");
        assert_eq!(substitute("foo", &p, "[&]", SubstMode::First, false), "f[oo]");
    }

    #[test]
    fn backslash_ampersand_is_literal_without_compat_flag() {
        // Without the escape flag, backslash has no special meaning, so
        // `\&` becomes `\` followed by the expanded match.
        let p = Pattern::compile("o+(o)");
        assert_eq!(substitute("foo", &p, "[\\&]", SubstMode::First, false), "f[\\oo]");
    }

    #[test]
    fn backslash_ampersand_escapes_when_flag_on() {
        let p = Pattern::compile("o+(o)");
        assert_eq!(substitute("foo", &p, "[\\&]", SubstMode::First, true), "f[&]");
    }

    #[test]
    fn anchored_begin_substitution_prepends_on_empty_pattern() {
        let p = Pattern::compile("");
        assert_eq!(substitute("bar", &p, "foo", SubstMode::Begin, false), "foobar");
    }

    #[test]
    fn anchored_end_substitution_appends_on_empty_pattern() {
        let p = Pattern::compile("");
        assert_eq!(substitute("foo", &p, "bar", SubstMode::End, false), "foobar");
    }

    #[test]
    fn zero_length_match_advances_without_infinite_loop() {
        let p = Pattern::compile("x*");
        let result = substitute("abc", &p, "-", SubstMode::Global, false);
        // "x*" never matches a literal 'x', but the trailing empty position
        // still matches (x* can consume zero), exercising the zero-length
        // advance path without looping forever.
        assert!(result.len() >= "abc".len());
    }
}
