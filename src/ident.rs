//! Shell identifier syntax.
//!
//! An identifier is `[a-zA-Z_][a-zA-Z0-9_]*`, the same grammar a command
//! parser uses when recognizing `NAME=VALUE` assignment words.

/// Whether `name` matches shell identifier syntax.
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

/// Splits `name[subscript]` into its parts, if `name` has a subscript.
///
/// Returns `None` for a bare identifier. Does not validate the subscript
/// expression itself: that is the arithmetic/expansion driver's job.
pub fn split_subscript(target: &str) -> Option<(&str, &str)> {
    let open = target.find('[')?;
    if !target.ends_with(']') {
        return None;
    }
    let (name, rest) = target.split_at(open);
    if !is_valid_identifier(name) {
        return None;
    }
    let subscript = &rest[1..rest.len() - 1];
    Some((name, subscript))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_identifiers() {
        assert!(is_valid_identifier("foo"));
        assert!(is_valid_identifier("_foo_1"));
        assert!(is_valid_identifier("A"));
    }

    #[test]
    fn rejects_non_identifiers() {
        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier("1foo"));
        assert!(!is_valid_identifier("foo-bar"));
        assert!(!is_valid_identifier("foo bar"));
        assert!(!is_valid_identifier("foo[0]"));
    }

    #[test]
    fn splits_subscripts() {
        assert_eq!(split_subscript("arr[0]"), Some(("arr", "0")));
        assert_eq!(split_subscript("arr[x + 1]"), Some(("arr", "x + 1")));
        assert_eq!(split_subscript("arr"), None);
        assert_eq!(split_subscript("1[0]"), None);
    }
}
