//! Splits a rule string into its command anchor, condition clauses, and
//! permission clauses. A small state machine over whitespace-separated
//! words, keyed on the `with`/`and`/`or`/`must`/`have` keywords.

use crate::error::{GortError, Result};

/// Raw, un-parsed clauses straight out of the rule string. `conditions` and
/// `permissions` interleave clause text with the literal `"and"`/`"or"`
/// connective words, preserving order for the parser.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RuleTokens {
    pub command: String,
    pub conditions: Vec<String>,
    pub permissions: Vec<String>,
}

const KEYWORDS: &[&str] = &["with", "and", "or", "must", "have", "allow"];

fn is_keyword(word: &str) -> bool {
    KEYWORDS.contains(&word)
}

pub fn tokenize(input: &str) -> Result<RuleTokens> {
    let words: Vec<&str> = input.split_whitespace().collect();
    if words.is_empty() {
        return Err(GortError::parse("empty rule", 0));
    }
    if is_keyword(words[0]) {
        return Err(GortError::parse(
            format!("rule must start with a command, found keyword '{}'", words[0]),
            1,
        ));
    }

    let command = words[0].to_owned();
    let mut idx = 1usize;
    let mut conditions = Vec::new();

    if words.get(idx) == Some(&"with") {
        idx += 1;
        idx = scan_clauses(&words, idx, &mut conditions, &["must", "allow"])?;
    }

    let permissions = match words.get(idx) {
        Some(&"allow") => {
            idx += 1;
            if idx != words.len() {
                return Err(GortError::parse("unexpected tokens after 'allow'", idx + 1));
            }
            Vec::new()
        }
        Some(&"must") => {
            idx += 1;
            if words.get(idx) != Some(&"have") {
                return Err(GortError::parse("expected 'have' after 'must'", idx + 1));
            }
            idx += 1;
            let mut permissions = Vec::new();
            idx = scan_clauses(&words, idx, &mut permissions, &[])?;
            if idx != words.len() {
                return Err(GortError::parse("unexpected trailing tokens", idx + 1));
            }
            permissions
        }
        Some(other) => {
            return Err(GortError::parse(
                format!("unexpected token '{other}', expected 'must' or 'allow'"),
                idx + 1,
            ))
        }
        None => return Err(GortError::parse("expected 'must have' or 'allow'", idx + 1)),
    };

    Ok(RuleTokens {
        command,
        conditions,
        permissions,
    })
}

/// Accumulate words into `out`, flushing on `and`/`or` (pushed through as
/// their own entries) and stopping just before any of `stop_words`.
fn scan_clauses(words: &[&str], mut idx: usize, out: &mut Vec<String>, stop_words: &[&str]) -> Result<usize> {
    let mut buf: Vec<&str> = Vec::new();
    loop {
        match words.get(idx) {
            None => {
                if stop_words.is_empty() {
                    if buf.is_empty() {
                        return Err(GortError::parse("expected a clause", idx + 1));
                    }
                    out.push(buf.join(" "));
                    return Ok(idx);
                }
                return Err(GortError::parse("unexpected end of rule", idx + 1));
            }
            Some(&word) if stop_words.contains(&word) => {
                if buf.is_empty() {
                    return Err(GortError::parse(format!("expected a clause before '{word}'"), idx + 1));
                }
                out.push(buf.join(" "));
                return Ok(idx);
            }
            Some(&"and") | Some(&"or") => {
                if buf.is_empty() {
                    return Err(GortError::parse("'and'/'or' with no preceding clause", idx + 1));
                }
                out.push(buf.join(" "));
                out.push(words[idx].to_owned());
                buf.clear();
                idx += 1;
            }
            Some(&word) => {
                buf.push(word);
                idx += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_with_condition_and_must_have() {
        let tokens = tokenize("foo:bar with option['delete'] == true must have foo:destroy").unwrap();
        assert_eq!(tokens.command, "foo:bar");
        assert_eq!(tokens.conditions, vec!["option['delete'] == true"]);
        assert_eq!(tokens.permissions, vec!["foo:destroy"]);
    }

    #[test]
    fn tokenizes_allow_rule() {
        let tokens = tokenize("foo:bar allow").unwrap();
        assert!(tokens.conditions.is_empty());
        assert!(tokens.permissions.is_empty());
    }

    #[test]
    fn tokenizes_multiple_permissions() {
        let tokens = tokenize("foo:bar must have foo:read and foo:write").unwrap();
        assert_eq!(tokens.permissions, vec!["foo:read", "and", "foo:write"]);
    }

    #[test]
    fn keyword_out_of_place_is_an_error() {
        assert!(tokenize("with option == true").is_err());
        assert!(tokenize("foo:bar with must have foo:read").is_err());
    }
}
