//! Pattern parsing — turns a glob string into a [`PatternElem`] sequence.
//!
//! The bracket-expression and extglob-group boundary finding follows the
//! same `find_char_class_end`/`convert_char_class`/`find_matching_paren`/
//! `split_extglob_alternatives` shape used elsewhere for this kind of
//! scanning, but feeds a from-scratch matcher instead of a translated
//! regex, so the longest/shortest-match anchor-then-shrink discipline
//! stays intact.

use super::classes::CharClass;

#[derive(Debug, Clone, PartialEq)]
pub enum BracketItem {
    Char(char),
    Range(char, char),
    Class(CharClass),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bracket {
    pub negate: bool,
    pub items: Vec<BracketItem>,
}

impl Bracket {
    pub fn matches(&self, c: char) -> bool {
        let hit = self.items.iter().any(|item| match item {
            BracketItem::Char(x) => *x == c,
            BracketItem::Range(lo, hi) => *lo <= c && c <= *hi,
            BracketItem::Class(class) => class.contains(c),
        });
        hit != self.negate
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtKind {
    /// `?(pattern-list)` — zero or one occurrence of any alternative.
    ZeroOrOne,
    /// `*(pattern-list)` — zero or more.
    ZeroOrMore,
    /// `+(pattern-list)` — one or more.
    OneOrMore,
    /// `@(pattern-list)` — exactly one.
    ExactlyOne,
    /// `!(pattern-list)` — anything that doesn't match any alternative.
    Negate,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PatternElem {
    Literal(char),
    AnyChar,
    AnyStar,
    Bracket(Bracket),
    ExtGlob(ExtKind, Vec<Vec<PatternElem>>),
}

/// Parse a glob pattern. Unterminated bracket expressions or extglob groups
/// are not hard errors: an unterminated construct degrades to its literal
/// source characters, which then simply fails to match anything interesting
/// rather than panicking.
pub fn parse(pattern: &str) -> Vec<PatternElem> {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            '\\' if i + 1 < chars.len() => {
                out.push(PatternElem::Literal(chars[i + 1]));
                i += 2;
            }
            '\\' => {
                // Trailing unescaped backslash: emit a literal backslash
                // that cannot match anything in a well-formed input stream
                // ending without one.
                out.push(PatternElem::Literal('\\'));
                i += 1;
            }
            '?' | '*' | '+' | '@' | '!' if chars.get(i + 1) == Some(&'(') => {
                if let Some((alternatives, next)) = parse_extglob_group(&chars, i + 1) {
                    let kind = match c {
                        '?' => ExtKind::ZeroOrOne,
                        '*' => ExtKind::ZeroOrMore,
                        '+' => ExtKind::OneOrMore,
                        '@' => ExtKind::ExactlyOne,
                        '!' => ExtKind::Negate,
                        _ => unreachable!(),
                    };
                    out.push(PatternElem::ExtGlob(kind, alternatives));
                    i = next;
                } else if c == '?' {
                    out.push(PatternElem::AnyChar);
                    i += 1;
                } else if c == '*' {
                    out.push(PatternElem::AnyStar);
                    i += 1;
                } else {
                    out.push(PatternElem::Literal(c));
                    i += 1;
                }
            }
            '?' => {
                out.push(PatternElem::AnyChar);
                i += 1;
            }
            '*' => {
                out.push(PatternElem::AnyStar);
                i += 1;
            }
            '[' => {
                if let Some((bracket, next)) = parse_bracket(&chars, i) {
                    out.push(PatternElem::Bracket(bracket));
                    i = next;
                } else {
                    out.push(PatternElem::Literal('['));
                    i += 1;
                }
            }
            _ => {
                out.push(PatternElem::Literal(c));
                i += 1;
            }
        }
    }
    out
}

/// Find the end of a bracket expression starting at `chars[start] == '['`:
/// the first unescaped `]` counts as a literal member if it is the first
/// character after an optional leading `^`/`!`.
fn parse_bracket(chars: &[char], start: usize) -> Option<(Bracket, usize)> {
    let mut i = start + 1;
    let negate = matches!(chars.get(i), Some('^') | Some('!'));
    if negate {
        i += 1;
    }
    let mut items = Vec::new();
    let mut first = true;
    loop {
        let c = *chars.get(i)?;
        if c == ']' && !first {
            return Some((Bracket { negate, items }, i + 1));
        }
        first = false;
        if c == '[' && chars.get(i + 1) == Some(&':') {
            if let Some(end) = find_class_end(chars, i + 2) {
                let name: String = chars[i + 2..end].iter().collect();
                if let Some(class) = CharClass::by_name(&name) {
                    items.push(BracketItem::Class(class));
                    i = end + 2;
                    continue;
                }
            }
        }
        // range a-z, but not when '-' is the last char before ']'
        if chars.get(i + 1) == Some(&'-') && chars.get(i + 2).map(|c| *c != ']').unwrap_or(false) {
            let lo = c;
            let hi = chars[i + 2];
            items.push(BracketItem::Range(lo, hi));
            i += 3;
            continue;
        }
        items.push(BracketItem::Char(c));
        i += 1;
    }
}

fn find_class_end(chars: &[char], start: usize) -> Option<usize> {
    let mut i = start;
    while i + 1 < chars.len() {
        if chars[i] == ':' && chars[i + 1] == ']' {
            return Some(i);
        }
        i += 1;
    }
    None
}

/// Parse an extglob group body starting at `chars[open] == '('`, splitting
/// top-level `|` alternatives and recursively parsing each, generalized to
/// recursion instead of regex emission.
fn parse_extglob_group(chars: &[char], open: usize) -> Option<(Vec<Vec<PatternElem>>, usize)> {
    let close = find_matching_paren(chars, open)?;
    let body = &chars[open + 1..close];
    let alternatives = split_top_level(body, '|');
    let parsed = alternatives
        .into_iter()
        .map(|alt| parse(&alt.into_iter().collect::<String>()))
        .collect();
    Some((parsed, close + 1))
}

fn find_matching_paren(chars: &[char], open: usize) -> Option<usize> {
    let mut depth = 0i32;
    let mut i = open;
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 1,
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

fn split_top_level(chars: &[char], sep: char) -> Vec<Vec<char>> {
    let mut out = Vec::new();
    let mut current = Vec::new();
    let mut depth = 0i32;
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '\\' => {
                current.push(chars[i]);
                if i + 1 < chars.len() {
                    current.push(chars[i + 1]);
                    i += 1;
                }
            }
            '(' => {
                depth += 1;
                current.push('(');
            }
            ')' => {
                depth -= 1;
                current.push(')');
            }
            c if c == sep && depth == 0 => {
                out.push(std::mem::take(&mut current));
            }
            c => current.push(c),
        }
        i += 1;
    }
    out.push(current);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_literal_and_wildcards() {
        let elems = parse("a?*b");
        assert_eq!(
            elems,
            vec![
                PatternElem::Literal('a'),
                PatternElem::AnyChar,
                PatternElem::AnyStar,
                PatternElem::Literal('b'),
            ]
        );
    }

    #[test]
    fn parses_bracket_range_and_negation() {
        let elems = parse("[^a-z0]");
        assert_eq!(
            elems,
            vec![PatternElem::Bracket(Bracket {
                negate: true,
                items: vec![BracketItem::Range('a', 'z'), BracketItem::Char('0')],
            })]
        );
    }

    #[test]
    fn parses_posix_class() {
        let elems = parse("[[:digit:]]");
        assert_eq!(
            elems,
            vec![PatternElem::Bracket(Bracket {
                negate: false,
                items: vec![BracketItem::Class(CharClass::Digit)],
            })]
        );
    }

    #[test]
    fn parses_extglob_alternatives() {
        let elems = parse("@(foo|bar)");
        match &elems[0] {
            PatternElem::ExtGlob(ExtKind::ExactlyOne, alts) => {
                assert_eq!(alts.len(), 2);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unescaped_trailing_backslash_is_literal() {
        let elems = parse("abc\\");
        assert_eq!(elems.last(), Some(&PatternElem::Literal('\\')));
    }
}
