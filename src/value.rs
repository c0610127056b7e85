//! The typed value system used throughout the command and rule languages.
//!
//! A small sealed enum with pattern-matched behavior rather than runtime
//! reflection: every capability (equality, ordering, containment) is a method
//! on the enum, not a downcast.

use std::collections::BTreeMap;
use std::fmt;

use regex::Regex;

/// A typed value. `Regex` stores only the source pattern (not a compiled
/// `Regex`) so that `Value` stays `Clone + PartialEq + Debug` without extra
/// ceremony; callers needing to match recompile via [`Value::as_regex`].
#[derive(Clone, Debug)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    /// text plus the quote rune used in the source (`'\0'` if unquoted).
    String(String, char),
    Regex(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    /// `name[index]`, resolved against an environment's list binding.
    ListElement(String, usize),
    /// `name['key']`, resolved against an environment's map binding.
    MapElement(String, String),
    /// An identifier that could not be resolved against the environment.
    /// Compares unequal to everything, including another `Unknown`.
    Unknown(String),
}

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Value::String(s.into(), '\0')
    }

    /// The plain text content, regardless of variant (used for display and
    /// for cross-type comparisons against strings).
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::String(s, _) => Some(s),
            _ => None,
        }
    }

    pub fn as_regex(&self) -> Option<Regex> {
        match self {
            Value::Regex(pattern) => Regex::new(pattern).ok(),
            _ => None,
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Value equality. `Unknown` never equals anything, including itself.
    pub fn equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Unknown(_), _) | (_, Value::Unknown(_)) => false,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::String(a, _), Value::String(b, _)) => a == b,
            (Value::Regex(a), Value::Regex(b)) => a == b,
            (Value::List(a), Value::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.equals(y))
            }
            (Value::Map(a), Value::Map(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| b.get(k).map(|ov| v.equals(ov)).unwrap_or(false))
            }
            _ => match (self.as_f64(), other.as_f64()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }

    /// `LessThan(Value) -> bool`. Cross-type ordering is only defined for
    /// values sharing a numeric kind (mixed numeric promotes to `Float`) or
    /// two strings (lexical); everything else is `false`.
    pub fn less_than(&self, other: &Value) -> bool {
        if let (Value::String(a, _), Value::String(b, _)) = (self, other) {
            return a < b;
        }
        match (self.as_f64(), other.as_f64()) {
            (Some(a), Some(b)) => a < b,
            _ => false,
        }
    }

    /// A single list/map element "matches as a member" of a collection: a
    /// `Regex` item matches a `String` value via pattern match, otherwise
    /// plain `Equals`. This is how `in` treats `['wubba', /^f.*/, 10]`.
    fn matches_member(&self, value: &Value) -> bool {
        if let (Value::Regex(pattern), Value::String(text, _)) = (self, value) {
            return Regex::new(pattern).map(|r| r.is_match(text)).unwrap_or(false);
        }
        self.equals(value)
    }

    /// Membership test, valid for `List`/`Map` only.
    pub fn contains(&self, value: &Value) -> bool {
        match self {
            Value::List(items) => items.iter().any(|item| item.matches_member(value)),
            Value::Map(entries) => {
                entries.values().any(|v| v.matches_member(value))
                    || matches!(value.as_text(), Some(key) if entries.contains_key(key))
            }
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::String(s, _) => write!(f, "{s}"),
            Value::Regex(p) => write!(f, "/{p}/"),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Map(entries) => {
                write!(f, "{{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
            Value::ListElement(name, idx) => write!(f, "{name}[{idx}]"),
            Value::MapElement(name, key) => write!(f, "{name}['{key}']"),
            Value::Unknown(name) => write!(f, "{name}"),
        }
    }
}

/// Infer a `Value` from a bare token string, the rule used throughout the
/// command parser and the rule condition parser.
/// Total over its domain: quoted strings, `/regex/`, booleans, integers,
/// floats, bracketed lists/maps, and otherwise a bare (unquoted) string.
pub fn infer(token: &str) -> Value {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return Value::text(trimmed);
    }

    if let Some(quote) = leading_quote(trimmed) {
        if trimmed.len() >= 2 && trimmed.ends_with(normalize_quote(quote)) {
            let inner = &trimmed[quote.len_utf8()..trimmed.len() - normalize_quote(quote).len_utf8()];
            return Value::String(inner.to_owned(), normalize_quote(quote));
        }
    }

    if trimmed.len() >= 2 && trimmed.starts_with('/') && trimmed.ends_with('/') {
        return Value::Regex(trimmed[1..trimmed.len() - 1].to_owned());
    }

    if trimmed == "true" {
        return Value::Bool(true);
    }
    if trimmed == "false" {
        return Value::Bool(false);
    }

    if let Ok(i) = trimmed.parse::<i64>() {
        return Value::Int(i);
    }
    if looks_like_float(trimmed) {
        if let Ok(f) = trimmed.parse::<f64>() {
            return Value::Float(f);
        }
    }

    if trimmed.starts_with('[') && trimmed.ends_with(']') {
        let inner = &trimmed[1..trimmed.len() - 1];
        let items = split_top_level(inner, ',')
            .into_iter()
            .map(|s| infer(s.trim()))
            .collect();
        return Value::List(items);
    }

    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        let inner = &trimmed[1..trimmed.len() - 1];
        let mut map = BTreeMap::new();
        for pair in split_top_level(inner, ',') {
            if let Some((key, value)) = split_once_top_level(pair.trim(), ':') {
                let key = key.trim().trim_matches(|c| c == '"' || c == '\'').to_owned();
                map.insert(key, infer(value.trim()));
            }
        }
        return Value::Map(map);
    }

    Value::String(trimmed.to_owned(), '\0')
}

fn looks_like_float(s: &str) -> bool {
    let body = s.strip_prefix(['+', '-']).unwrap_or(s);
    body.contains('.') && body.chars().all(|c| c.is_ascii_digit() || c == '.')
}

const DOUBLE_QUOTES: &[char] = &['"', '\u{201C}', '\u{201D}', '\u{201E}'];
const SINGLE_QUOTES: &[char] = &['\'', '\u{2018}', '\u{2019}'];

fn leading_quote(s: &str) -> Option<char> {
    let c = s.chars().next()?;
    if DOUBLE_QUOTES.contains(&c) || SINGLE_QUOTES.contains(&c) {
        Some(c)
    } else {
        None
    }
}

fn normalize_quote(c: char) -> char {
    if DOUBLE_QUOTES.contains(&c) {
        '"'
    } else {
        '\''
    }
}

/// Split `s` on `sep` at bracket/brace/quote nesting depth zero.
fn split_top_level(s: &str, sep: char) -> Vec<&str> {
    let mut out = Vec::new();
    let mut depth = 0i32;
    let mut in_quote: Option<char> = None;
    let mut start = 0usize;
    for (idx, ch) in s.char_indices() {
        if let Some(q) = in_quote {
            if ch == q {
                in_quote = None;
            }
            continue;
        }
        match ch {
            '"' | '\'' => in_quote = Some(ch),
            '[' | '{' => depth += 1,
            ']' | '}' => depth -= 1,
            c if c == sep && depth == 0 => {
                out.push(&s[start..idx]);
                start = idx + c.len_utf8();
            }
            _ => {}
        }
    }
    if start <= s.len() {
        let tail = &s[start..];
        if !tail.is_empty() || !out.is_empty() || start == 0 {
            out.push(tail);
        }
    }
    out.into_iter().filter(|s| !s.trim().is_empty()).collect()
}

fn split_once_top_level(s: &str, sep: char) -> Option<(&str, &str)> {
    let mut depth = 0i32;
    let mut in_quote: Option<char> = None;
    for (idx, ch) in s.char_indices() {
        if let Some(q) = in_quote {
            if ch == q {
                in_quote = None;
            }
            continue;
        }
        match ch {
            '"' | '\'' => in_quote = Some(ch),
            '[' | '{' => depth += 1,
            ']' | '}' => depth -= 1,
            c if c == sep && depth == 0 => return Some((&s[..idx], &s[idx + c.len_utf8()..])),
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infers_bool_int_float() {
        assert!(matches!(infer("true"), Value::Bool(true)));
        assert!(matches!(infer("false"), Value::Bool(false)));
        assert!(matches!(infer("42"), Value::Int(42)));
        assert!(matches!(infer("-3"), Value::Int(-3)));
        assert!(matches!(infer("3.14"), Value::Float(f) if (f - 3.14).abs() < 1e-9));
    }

    #[test]
    fn infers_quoted_and_regex() {
        match infer("\"foo bar\"") {
            Value::String(s, q) => {
                assert_eq!(s, "foo bar");
                assert_eq!(q, '"');
            }
            _ => panic!("expected string"),
        }
        match infer("/^f.*/") {
            Value::Regex(p) => assert_eq!(p, "^f.*"),
            _ => panic!("expected regex"),
        }
    }

    #[test]
    fn infers_bare_string() {
        match infer("localhost") {
            Value::String(s, q) => {
                assert_eq!(s, "localhost");
                assert_eq!(q, '\0');
            }
            _ => panic!("expected bare string"),
        }
    }

    #[test]
    fn infers_nested_list_and_map() {
        match infer("['wubba', /^f.*/, 10]") {
            Value::List(items) => {
                assert_eq!(items.len(), 3);
                assert!(matches!(items[2], Value::Int(10)));
            }
            _ => panic!("expected list"),
        }
        match infer("{delete: true, name: \"bob\"}") {
            Value::Map(m) => {
                assert!(matches!(m.get("delete"), Some(Value::Bool(true))));
                assert!(matches!(m.get("name"), Some(Value::String(s, _)) if s == "bob"));
            }
            _ => panic!("expected map"),
        }
    }

    #[test]
    fn equals_is_reflexive_for_inferred_values() {
        for token in ["true", "42", "3.14", "\"hi\"", "/f.*/", "[1, 2]", "{a: 1}", "bare"] {
            let v = infer(token);
            assert!(v.equals(&v), "not reflexive for {token}");
        }
    }

    #[test]
    fn unknown_never_equals_anything() {
        let u = Value::Unknown("x".to_owned());
        assert!(!u.equals(&u));
        assert!(!u.equals(&Value::Int(1)));
    }

    #[test]
    fn regex_in_list_matches_as_member() {
        let list = infer("['wubba', /^f.*/, 10]");
        assert!(list.contains(&Value::text("foo")));
        assert!(!list.contains(&Value::text("zzz")));
    }

    #[test]
    fn mixed_numeric_promotes_to_float() {
        assert!(Value::Int(1).less_than(&Value::Float(1.5)));
        assert!(Value::Int(1).equals(&Value::Float(1.0)));
    }
}
