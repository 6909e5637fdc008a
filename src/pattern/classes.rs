//! POSIX character class names usable inside bracket expressions
//! (`[[:alpha:]]` and friends).

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharClass {
    Alpha,
    Digit,
    Alnum,
    Space,
    Upper,
    Lower,
    Punct,
    Print,
    Graph,
    Cntrl,
    Blank,
    Xdigit,
}

impl CharClass {
    pub fn by_name(name: &str) -> Option<Self> {
        Some(match name {
            "alpha" => CharClass::Alpha,
            "digit" => CharClass::Digit,
            "alnum" => CharClass::Alnum,
            "space" => CharClass::Space,
            "upper" => CharClass::Upper,
            "lower" => CharClass::Lower,
            "punct" => CharClass::Punct,
            "print" => CharClass::Print,
            "graph" => CharClass::Graph,
            "cntrl" => CharClass::Cntrl,
            "blank" => CharClass::Blank,
            "xdigit" => CharClass::Xdigit,
            _ => return None,
        })
    }

    pub fn contains(self, c: char) -> bool {
        match self {
            CharClass::Alpha => c.is_alphabetic(),
            CharClass::Digit => c.is_ascii_digit(),
            CharClass::Alnum => c.is_alphanumeric(),
            CharClass::Space => c.is_whitespace(),
            CharClass::Upper => c.is_uppercase(),
            CharClass::Lower => c.is_lowercase(),
            CharClass::Punct => c.is_ascii_punctuation(),
            CharClass::Print => !c.is_control(),
            CharClass::Graph => !c.is_control() && !c.is_whitespace(),
            CharClass::Cntrl => c.is_control(),
            CharClass::Blank => c == ' ' || c == '\t',
            CharClass::Xdigit => c.is_ascii_hexdigit(),
        }
    }
}
