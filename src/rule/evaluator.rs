//! Evaluates parsed rules against an environment and a user's permission set,
//! including the top-level authorization check used by the dispatch engine.

use std::collections::BTreeMap;

use crate::command::CommandOption;
use crate::error::{GortError, Result};
use crate::rule::parser::{self, Expression, Logical, Modifier, Operator, Rule};
use crate::value::Value;

/// `"option"`/`"arg"` (and anything else) bound for one evaluation.
#[derive(Clone, Debug, Default)]
pub struct Environment(BTreeMap<String, Value>);

impl Environment {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.0.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// The conventional environment for a parsed command: `option` is a map
    /// of its options, `arg` is the positional parameter list.
    pub fn from_command(options: &BTreeMap<String, CommandOption>, parameters: &[Value]) -> Self {
        let mut env = Self::new();
        let option_map = options.iter().map(|(k, v)| (k.clone(), v.value.clone())).collect();
        env.insert("option", Value::Map(option_map));
        env.insert("arg", Value::List(parameters.to_vec()));
        env
    }
}

fn resolve(value: &Value, env: &Environment) -> Value {
    match value {
        Value::Unknown(name) => env
            .get(name)
            .cloned()
            .unwrap_or_else(|| Value::Unknown(name.clone())),
        Value::ListElement(name, index) => match env.get(name) {
            Some(Value::List(items)) => items
                .get(*index)
                .cloned()
                .unwrap_or_else(|| Value::Unknown(format!("{name}[{index}]"))),
            _ => Value::Unknown(format!("{name}[{index}]")),
        },
        Value::MapElement(name, key) => match env.get(name) {
            Some(Value::Map(entries)) => entries
                .get(key)
                .cloned()
                .unwrap_or_else(|| Value::Unknown(format!("{name}['{key}']"))),
            _ => Value::Unknown(format!("{name}['{key}']")),
        },
        other => other.clone(),
    }
}

fn apply_operator(operator: Operator, a: &Value, b: &Value) -> bool {
    match operator {
        Operator::Equals => a.equals(b),
        Operator::NotEquals => !a.equals(b),
        Operator::LessThan => a.less_than(b),
        Operator::LessThanOrEqualTo => a.less_than(b) || a.equals(b),
        Operator::GreaterThan => b.less_than(a),
        Operator::GreaterThanOrEqualTo => b.less_than(a) || a.equals(b),
        Operator::In => b.contains(a),
    }
}

fn as_collection(value: &Value) -> Option<Vec<Value>> {
    match value {
        Value::List(items) => Some(items.clone()),
        Value::Map(entries) => Some(entries.values().cloned().collect()),
        _ => None,
    }
}

impl Expression {
    /// Evaluates one condition against the environment, applying the
    /// `any`/`all` collection modifier if one is set.
    pub fn evaluate(&self, env: &Environment) -> bool {
        let a = resolve(&self.a, env);
        let b = resolve(&self.b, env);
        match self.modifier {
            Modifier::One => apply_operator(self.operator, &a, &b),
            Modifier::Any => as_collection(&a)
                .unwrap_or_else(|| vec![a.clone()])
                .iter()
                .any(|item| apply_operator(self.operator, item, &b)),
            Modifier::All => as_collection(&a)
                .unwrap_or_else(|| vec![a.clone()])
                .iter()
                .all(|item| apply_operator(self.operator, item, &b)),
        }
    }
}

/// Left-fold a chain of `(bool, Logical)` pairs the way both conditions and
/// permission clauses are combined. An empty chain is `true`.
fn fold_logical<T>(items: &[T], value_of: impl Fn(&T) -> bool, logical_of: impl Fn(&T) -> Logical) -> bool {
    let mut iter = items.iter();
    let Some(first) = iter.next() else {
        return true;
    };
    let mut result = value_of(first);
    for item in iter {
        result = match logical_of(item) {
            Logical::And => result && value_of(item),
            Logical::Or => result || value_of(item),
            Logical::Undefined => value_of(item),
        };
    }
    result
}

impl Rule {
    /// `Rule.Matches(env)`. A rule with zero conditions matches everything.
    pub fn matches(&self, env: &Environment) -> bool {
        fold_logical(&self.conditions, |e| e.evaluate(env), |e| e.logical)
    }

    /// `Rule.Allowed(userPermissions)`. Empty `Permissions` is an `allow` rule.
    pub fn allowed(&self, user_permissions: &[String]) -> bool {
        fold_logical(
            &self.permissions,
            |p| user_permissions.iter().any(|perm| perm == &p.name),
            |p| p.logical,
        )
    }
}

/// The top-level authorization check. `rules` are the raw rule-string bodies
/// attached to a `BundleCommand` (without the `bundle:name` prefix, which is
/// prepended here); `user_permissions` must already be loaded from the
/// `DataAccess` port.
pub fn authorize(
    bundle: &str,
    name: &str,
    rules: &[String],
    options: &BTreeMap<String, CommandOption>,
    parameters: &[Value],
    user_permissions: &[String],
) -> Result<bool> {
    if rules.is_empty() {
        return Err(GortError::NoRulesDefined(format!("{bundle}:{name}")));
    }

    let env = Environment::from_command(options, parameters);
    let mut allowed = false;
    let mut matched = false;

    for raw in rules {
        let full = format!("{bundle}:{name} {raw}");
        let rule = parser::parse(&full)?;
        if rule.matches(&env) {
            matched = true;
            allowed = rule.allowed(user_permissions);
            if !allowed {
                return Ok(false);
            }
        }
    }

    Ok(matched && allowed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::parse as parse_command;
    use crate::command::tokenize;
    use crate::command::ParseDirectives;

    #[test]
    fn rule_with_zero_conditions_matches_every_environment() {
        let rule = parser::parse("foo:bar must have foo:read").unwrap();
        assert!(rule.matches(&Environment::new()));
    }

    #[test]
    fn any_modifier_matches_regex_member() {
        let rule = parser::parse("foo:bar with any arg in ['wubba', /^f.*/, 10] must have foo:read").unwrap();
        let mut env = Environment::new();
        env.insert(
            "arg",
            Value::List(vec![Value::text("foo"), Value::text("bar")]),
        );
        assert!(rule.matches(&env));
    }

    #[test]
    fn empty_user_permissions_denies_nonempty_permission_rule() {
        let rule = parser::parse("foo:bar must have foo:destroy").unwrap();
        assert!(!rule.allowed(&[]));
    }

    #[test]
    fn allow_rule_is_always_allowed() {
        let rule = parser::parse("foo:bar allow").unwrap();
        assert!(rule.allowed(&[]));
    }

    #[test]
    fn authorize_denies_with_no_rules() {
        let tokens = tokenize("foo:bar").unwrap();
        let cmd = parse_command(&tokens, &ParseDirectives::default()).unwrap();
        let err = authorize("foo", "bar", &[], &cmd.options, &cmd.parameters, &[]).unwrap_err();
        assert!(matches!(err, GortError::NoRulesDefined(_)));
    }

    #[test]
    fn authorize_allows_when_user_has_permission() {
        let tokens = tokenize("foo:bar --delete").unwrap();
        let cmd = parse_command(&tokens, &ParseDirectives::default()).unwrap();
        let rules = vec!["must have foo:destroy".to_owned()];
        let allowed = authorize(
            "foo",
            "bar",
            &rules,
            &cmd.options,
            &cmd.parameters,
            &["foo:destroy".to_owned()],
        )
        .unwrap();
        assert!(allowed);
    }

    #[test]
    fn authorize_denies_by_default_when_no_rule_matches() {
        let tokens = tokenize("foo:bar").unwrap();
        let cmd = parse_command(&tokens, &ParseDirectives::default()).unwrap();
        let rules = vec!["with option['delete'] == true must have foo:destroy".to_owned()];
        let allowed = authorize("foo", "bar", &rules, &cmd.options, &cmd.parameters, &[]).unwrap();
        assert!(!allowed);
    }
}
