//! Parses `RuleTokens` clauses into a [`Rule`]. Condition
//! operands get their own inference pass: a bare identifier such as `arg` or
//! `option['delete']` denotes an environment reference rather than a string
//! literal, layered on top of [`crate::value::infer`]'s literal forms.

use crate::error::{GortError, Result};
use crate::rule::tokenizer::{self, RuleTokens};
use crate::value::{infer, Value};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operator {
    Equals,
    NotEquals,
    LessThan,
    LessThanOrEqualTo,
    GreaterThan,
    GreaterThanOrEqualTo,
    In,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Modifier {
    One,
    Any,
    All,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Logical {
    Undefined,
    And,
    Or,
}

#[derive(Clone, Debug)]
pub struct Expression {
    pub a: Value,
    pub b: Value,
    pub operator: Operator,
    pub modifier: Modifier,
    pub logical: Logical,
}

#[derive(Clone, Debug)]
pub struct PermissionClause {
    pub name: String,
    pub logical: Logical,
}

/// A tokenized, parsed permission clause scoped to one command.
#[derive(Clone, Debug)]
pub struct Rule {
    pub command: String,
    pub conditions: Vec<Expression>,
    pub permissions: Vec<PermissionClause>,
}

pub fn parse(input: &str) -> Result<Rule> {
    let tokens = tokenizer::tokenize(input)?;
    build_rule(tokens)
}

fn build_rule(tokens: RuleTokens) -> Result<Rule> {
    let conditions = parse_conditions(&tokens.conditions)?;
    let permissions = parse_permissions(&tokens.permissions)?;
    Ok(Rule {
        command: tokens.command,
        conditions,
        permissions,
    })
}

fn parse_conditions(raw: &[String]) -> Result<Vec<Expression>> {
    let mut out = Vec::new();
    let mut pending = Logical::Undefined;
    for entry in raw {
        match entry.as_str() {
            "and" => pending = Logical::And,
            "or" => pending = Logical::Or,
            text => {
                let mut expr = parse_condition(text)?;
                expr.logical = pending;
                out.push(expr);
                pending = Logical::Undefined;
            }
        }
    }
    Ok(out)
}

fn parse_permissions(raw: &[String]) -> Result<Vec<PermissionClause>> {
    let mut out = Vec::new();
    let mut pending = Logical::Undefined;
    let mut seen_and = false;
    let mut seen_or = false;
    for entry in raw {
        match entry.as_str() {
            "and" => {
                pending = Logical::And;
                seen_and = true;
            }
            "or" => {
                pending = Logical::Or;
                seen_or = true;
            }
            name => {
                out.push(PermissionClause {
                    name: name.to_owned(),
                    logical: pending,
                });
                pending = Logical::Undefined;
            }
        }
    }
    if seen_and && seen_or {
        return Err(GortError::RuleLoadError(
            "mixed 'and'/'or' in permission expression requires parentheses, which are not supported".to_owned(),
        ));
    }
    Ok(out)
}

fn parse_condition(text: &str) -> Result<Expression> {
    let tokens = split_whitespace_toplevel(text);
    let mut idx = 0usize;

    let modifier = match tokens.first().copied() {
        Some("any") => {
            idx += 1;
            Modifier::Any
        }
        Some("all") => {
            idx += 1;
            Modifier::All
        }
        _ => Modifier::One,
    };

    let a_tok = tokens
        .get(idx)
        .ok_or_else(|| GortError::parse(format!("malformed condition '{text}'"), 0))?;
    idx += 1;
    let op_tok = tokens
        .get(idx)
        .ok_or_else(|| GortError::parse(format!("condition '{text}' is missing an operator"), 0))?;
    idx += 1;
    let operator = match *op_tok {
        "==" => Operator::Equals,
        "!=" => Operator::NotEquals,
        "<" => Operator::LessThan,
        "<=" => Operator::LessThanOrEqualTo,
        ">" => Operator::GreaterThan,
        ">=" => Operator::GreaterThanOrEqualTo,
        "in" => Operator::In,
        other => return Err(GortError::parse(format!("unknown operator '{other}'"), 0)),
    };
    if idx >= tokens.len() {
        return Err(GortError::parse(format!("condition '{text}' is missing a right operand"), 0));
    }
    let b_text = tokens[idx..].join(" ");

    Ok(Expression {
        a: parse_operand(a_tok),
        b: parse_operand(&b_text),
        operator,
        modifier,
        logical: Logical::Undefined,
    })
}

/// `name`, `name[0]`, and `name['key']` denote environment references;
/// everything else is a literal inferred the usual way.
fn parse_operand(token: &str) -> Value {
    if let Some(open) = token.find('[') {
        if token.ends_with(']') && open > 0 {
            let name = &token[..open];
            let inner = &token[open + 1..token.len() - 1];
            if is_identifier(name) {
                if let Ok(index) = inner.parse::<usize>() {
                    return Value::ListElement(name.to_owned(), index);
                }
                let trimmed = inner.trim();
                if trimmed.len() >= 2
                    && ((trimmed.starts_with('\'') && trimmed.ends_with('\''))
                        || (trimmed.starts_with('"') && trimmed.ends_with('"')))
                {
                    let key = &trimmed[1..trimmed.len() - 1];
                    return Value::MapElement(name.to_owned(), key.to_owned());
                }
            }
        }
    }
    if is_identifier(token) && token != "true" && token != "false" {
        return Value::Unknown(token.to_owned());
    }
    infer(token)
}

fn is_identifier(token: &str) -> bool {
    !token.is_empty()
        && token
            .chars()
            .next()
            .map(|c| c.is_alphabetic() || c == '_')
            .unwrap_or(false)
        && token.chars().all(|c| c.is_alphanumeric() || c == '_' || c == ':')
}

/// Split on whitespace, but never inside brackets or quotes — so a bracketed
/// list right operand like `['wubba', /^f.*/, 10]` stays one token.
fn split_whitespace_toplevel(s: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut start: Option<usize> = None;
    let mut last_end = 0usize;

    for (idx, ch) in s.char_indices() {
        last_end = idx + ch.len_utf8();
        if let Some(q) = quote {
            if ch == q {
                quote = None;
            }
            continue;
        }
        match ch {
            '"' | '\'' => {
                quote = Some(ch);
                start.get_or_insert(idx);
            }
            '[' | '{' => {
                depth += 1;
                start.get_or_insert(idx);
            }
            ']' | '}' => depth -= 1,
            c if c.is_whitespace() && depth == 0 => {
                if let Some(st) = start.take() {
                    out.push(&s[st..idx]);
                }
            }
            _ => {
                start.get_or_insert(idx);
            }
        }
    }
    if let Some(st) = start {
        out.push(&s[st..last_end]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_map_element_condition() {
        let rule = parse("foo:bar with option['delete'] == true must have foo:destroy").unwrap();
        assert_eq!(rule.command, "foo:bar");
        assert_eq!(rule.conditions.len(), 1);
        let cond = &rule.conditions[0];
        assert!(matches!(&cond.a, Value::MapElement(name, key) if name == "option" && key == "delete"));
        assert!(matches!(cond.b, Value::Bool(true)));
        assert_eq!(cond.operator, Operator::Equals);
        assert_eq!(rule.permissions.len(), 1);
        assert_eq!(rule.permissions[0].name, "foo:destroy");
    }

    #[test]
    fn parses_any_in_list_with_regex_element() {
        let rule = parse("foo:bar with any arg in ['wubba', /^f.*/, 10] must have foo:read").unwrap();
        let cond = &rule.conditions[0];
        assert_eq!(cond.modifier, Modifier::Any);
        assert!(matches!(&cond.a, Value::Unknown(name) if name == "arg"));
        assert_eq!(cond.operator, Operator::In);
        assert!(matches!(&cond.b, Value::List(items) if items.len() == 3));
    }

    #[test]
    fn allow_rule_has_no_permissions() {
        let rule = parse("foo:bar allow").unwrap();
        assert!(rule.permissions.is_empty());
    }

    #[test]
    fn mixed_and_or_permissions_rejected() {
        let err = parse("foo:bar must have foo:read and foo:write or foo:admin").unwrap_err();
        assert!(matches!(err, GortError::RuleLoadError(_)));
    }

    #[test]
    fn zero_conditions_parse_cleanly() {
        let rule = parse("foo:bar must have foo:read").unwrap();
        assert!(rule.conditions.is_empty());
    }
}
