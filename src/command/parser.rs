//! Turns a token sequence into a structured [`Command`]: a bundle:name
//! pair, GNU-style clustered short options, and leftover positional
//! parameters, governed by a per-command set of `ParseDirectives`.

use std::collections::BTreeMap;

use crate::error::{GortError, Result};
use crate::value::{infer, Value};

/// A single per-bundle-command parsing directive.
#[derive(Clone, Debug, PartialEq)]
pub enum ParseDirective {
    AgnosticDashes(bool),
    AssumeOptionArguments(bool),
    OptionHasArgument(String, bool),
    OptionAlias(String, String),
}

/// The full set of directives governing one command's parse, in declaration
/// order (later directives of the same kind win, matching a straightforward
/// "apply in order" reading of a bundle's YAML list).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParseDirectives(pub Vec<ParseDirective>);

impl ParseDirectives {
    pub fn agnostic_dashes(&self) -> bool {
        self.0
            .iter()
            .rev()
            .find_map(|d| match d {
                ParseDirective::AgnosticDashes(b) => Some(*b),
                _ => None,
            })
            .unwrap_or(false)
    }

    pub fn assume_option_arguments(&self) -> bool {
        self.0
            .iter()
            .rev()
            .find_map(|d| match d {
                ParseDirective::AssumeOptionArguments(b) => Some(*b),
                _ => None,
            })
            .unwrap_or(false)
    }

    pub fn has_argument(&self, name: &str) -> bool {
        self.0.iter().rev().find_map(|d| match d {
            ParseDirective::OptionHasArgument(n, b) if n == name => Some(*b),
            _ => None,
        }).unwrap_or(false)
    }

    /// Rewrite an option name per a matching `OptionAlias(short, long)`.
    pub fn resolve_alias(&self, name: &str) -> String {
        self.0
            .iter()
            .find_map(|d| match d {
                ParseDirective::OptionAlias(short, long) if short == name => Some(long.clone()),
                _ => None,
            })
            .unwrap_or_else(|| name.to_owned())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CommandOption {
    pub name: String,
    pub value: Value,
}

/// A fully parsed invocation. Immutable once built.
#[derive(Clone, Debug)]
pub struct Command {
    pub bundle: String,
    pub name: String,
    pub options: BTreeMap<String, CommandOption>,
    pub parameters: Vec<Value>,
    pub original: String,
}

fn is_option_token(token: &str, terminated: bool) -> bool {
    !terminated && token.len() > 1 && token.starts_with('-') && token != "--"
}

/// Parse a token sequence into a [`Command`]. `directives` comes from the
/// resolved `CommandEntry`, or [`ParseDirectives::default`] for a
/// freestanding parse.
pub fn parse(tokens: &[String], directives: &ParseDirectives) -> Result<Command> {
    if tokens.is_empty() {
        return Err(GortError::parse("empty command", 0));
    }

    let original = tokens.join(" ");
    let (bundle, name) = match tokens[0].split_once(':') {
        Some((b, n)) => (b.to_owned(), n.to_owned()),
        None => (String::new(), tokens[0].clone()),
    };

    let mut options = BTreeMap::new();
    let mut parameters = Vec::new();
    let mut terminated = false;

    let mut i = 1usize;
    while i < tokens.len() {
        let token = &tokens[i];

        if !terminated && token == "--" {
            terminated = true;
            i += 1;
            continue;
        }

        if is_option_token(token, terminated) {
            i = parse_option(tokens, i, directives, &mut options)?;
            continue;
        }

        parameters.push(infer(token));
        i += 1;
    }

    Ok(Command {
        bundle,
        name,
        options,
        parameters,
        original,
    })
}

/// Parse the option starting at `tokens[i]`, returning the index of the next
/// unconsumed token. Handles long options (`--name`), single-char short
/// options, bundled short clusters (`-Ik`), and `AgnosticDashes`.
fn parse_option(
    tokens: &[String],
    i: usize,
    directives: &ParseDirectives,
    options: &mut BTreeMap<String, CommandOption>,
) -> Result<usize> {
    let token = &tokens[i];

    if directives.agnostic_dashes() {
        let name = directives.resolve_alias(token.trim_start_matches('-'));
        return Ok(consume_value(tokens, i, &name, directives, options));
    }

    if let Some(long) = token.strip_prefix("--") {
        let name = directives.resolve_alias(long);
        return Ok(consume_value(tokens, i, &name, directives, options));
    }

    // Single-dash: either one short flag or a bundled cluster like `-Ik`.
    let cluster: Vec<char> = token.trim_start_matches('-').chars().collect();
    let mut next = i + 1;
    let mut j = 0usize;
    while j < cluster.len() {
        let name = directives.resolve_alias(&cluster[j].to_string());
        if directives.has_argument(&name) {
            let rest: String = cluster[j + 1..].iter().collect();
            if !rest.is_empty() {
                options.insert(
                    name.clone(),
                    CommandOption {
                        name,
                        value: infer(&rest),
                    },
                );
                return Ok(next);
            }
            next = consume_value(tokens, i, &name, directives, options);
            return Ok(next);
        }
        options.insert(
            name.clone(),
            CommandOption {
                name,
                value: Value::Bool(true),
            },
        );
        j += 1;
    }
    Ok(next)
}

/// After an option name has been identified, decide whether the next token
/// is its value (per `OptionHasArgument`/`AssumeOptionArguments`) or whether
/// it's a bare boolean flag, and insert accordingly. Returns the index past
/// whatever was consumed.
fn consume_value(
    tokens: &[String],
    i: usize,
    name: &str,
    directives: &ParseDirectives,
    options: &mut BTreeMap<String, CommandOption>,
) -> usize {
    let next_token = tokens.get(i + 1);
    let wants_argument = directives.has_argument(name);
    let assumes_argument = directives.assume_option_arguments();

    let take_next = match next_token {
        Some(t) if wants_argument => Some(t),
        Some(t) if assumes_argument && t != "--" && !t.starts_with('-') => Some(t),
        _ => None,
    };

    match take_next {
        Some(value_token) => {
            options.insert(
                name.to_owned(),
                CommandOption {
                    name: name.to_owned(),
                    value: infer(value_token),
                },
            );
            i + 2
        }
        None => {
            options.insert(
                name.to_owned(),
                CommandOption {
                    name: name.to_owned(),
                    value: Value::Bool(true),
                },
            );
            i + 1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::tokenizer::tokenize;

    #[test]
    fn parses_bundle_name_and_short_cluster() {
        let tokens = tokenize("foo:curl -Ik -- --ssl localhost").unwrap();
        let cmd = parse(&tokens, &ParseDirectives::default()).unwrap();
        assert_eq!(cmd.bundle, "foo");
        assert_eq!(cmd.name, "curl");
        assert!(matches!(cmd.options.get("I"), Some(o) if o.value.equals(&Value::Bool(true))));
        assert!(matches!(cmd.options.get("k"), Some(o) if o.value.equals(&Value::Bool(true))));
        assert_eq!(cmd.parameters.len(), 2);
        assert!(cmd.parameters[0].equals(&Value::text("--ssl")));
        assert!(cmd.parameters[1].equals(&Value::text("localhost")));
    }

    #[test]
    fn no_bundle_prefix_leaves_bundle_empty() {
        let tokens = tokenize("echo hello").unwrap();
        let cmd = parse(&tokens, &ParseDirectives::default()).unwrap();
        assert_eq!(cmd.bundle, "");
        assert_eq!(cmd.name, "echo");
    }

    #[test]
    fn option_has_argument_consumes_next_token() {
        let tokens = tokenize("foo:bar -n 5").unwrap();
        let directives = ParseDirectives(vec![ParseDirective::OptionHasArgument(
            "n".to_owned(),
            true,
        )]);
        let cmd = parse(&tokens, &directives).unwrap();
        assert!(matches!(cmd.options.get("n"), Some(o) if o.value.equals(&Value::Int(5))));
    }

    #[test]
    fn agnostic_dashes_merges_short_and_long() {
        let directives = ParseDirectives(vec![ParseDirective::AgnosticDashes(true)]);
        let tokens = tokenize("foo:bar -verbose").unwrap();
        let cmd = parse(&tokens, &directives).unwrap();
        assert!(cmd.options.contains_key("verbose"));
    }

    #[test]
    fn empty_token_list_is_an_error() {
        assert!(parse(&[], &ParseDirectives::default()).is_err());
    }
}
