//! Looks up the `CommandEntry` a request applies to, by name or by trigger.
//! Resolution fans out over every registered [`CommandEntryFinder`] — in
//! practice just the `DataAccess` port, but the contract allows more than
//! one (e.g. a static built-in bundle finder ahead of the database-backed
//! one).

use async_trait::async_trait;

use crate::bundle::CommandEntry;
use crate::error::{GortError, Result};

/// Anything that can look up installed, enabled commands. Implementations
/// must only return enabled entries.
#[async_trait]
pub trait CommandEntryFinder: Send + Sync {
    async fn find_command_entry(&self, bundle: &str, name: &str) -> Result<Vec<CommandEntry>>;
    async fn find_command_entry_by_trigger(&self, tokens: &[String]) -> Result<Vec<CommandEntry>>;
}

fn label(bundle: &str, name: &str) -> String {
    if bundle.is_empty() {
        name.to_owned()
    } else {
        format!("{bundle}:{name}")
    }
}

/// `ResolveByName`. Empty `bundle` is a wildcard; multiple matches across
/// bundles in that case is an error, since the caller must disambiguate.
pub async fn resolve_by_name(
    finders: &[&dyn CommandEntryFinder],
    bundle: &str,
    name: &str,
) -> Result<CommandEntry> {
    let mut matches = Vec::new();
    for finder in finders {
        matches.extend(finder.find_command_entry(bundle, name).await?);
    }
    match matches.len() {
        0 => Err(GortError::NoSuchCommand(label(bundle, name))),
        1 => Ok(matches.remove(0)),
        _ if bundle.is_empty() => Err(GortError::MultipleCommands(name.to_owned())),
        _ => Ok(matches.remove(0)),
    }
}

/// `ResolveByTrigger`: match the raw token sequence against every bundle's
/// trigger patterns. Per spec.md §9's open question on unmatched triggers,
/// this resolves to explicit silence: zero matches is `Ok(None)`, not an
/// error — an arbitrary chat line is not expected to match any trigger, and
/// that's not a failure the way an unresolvable named invocation is.
pub async fn resolve_by_trigger(
    finders: &[&dyn CommandEntryFinder],
    tokens: &[String],
) -> Result<Option<CommandEntry>> {
    let mut matches = Vec::new();
    for finder in finders {
        matches.extend(finder.find_command_entry_by_trigger(tokens).await?);
    }
    match matches.len() {
        0 => Ok(None),
        1 => Ok(Some(matches.remove(0))),
        _ => Err(GortError::MultipleCommands(tokens.join(" "))),
    }
}

/// `ResolveByNameOrTrigger`: name first, falling back to trigger matching
/// only when the name lookup raised `NoSuchCommand`. Unlike a bare trigger
/// lookup, a failure at this level is always reported — the caller already
/// committed to treating the input as a command invocation.
pub async fn resolve_by_name_or_trigger(
    finders: &[&dyn CommandEntryFinder],
    bundle: &str,
    name: &str,
    tokens: &[String],
) -> Result<CommandEntry> {
    match resolve_by_name(finders, bundle, name).await {
        Ok(entry) => Ok(entry),
        Err(GortError::NoSuchCommand(original)) => {
            match resolve_by_trigger(finders, tokens).await? {
                Some(entry) => Ok(entry),
                None => Err(GortError::NoSuchCommand(original)),
            }
        }
        Err(other) => Err(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::parse_bundle;

    struct StaticFinder(Vec<CommandEntry>);

    #[async_trait]
    impl CommandEntryFinder for StaticFinder {
        async fn find_command_entry(&self, bundle: &str, name: &str) -> Result<Vec<CommandEntry>> {
            Ok(self
                .0
                .iter()
                .filter(|e| (bundle.is_empty() || e.bundle.name == bundle) && e.command.name == name)
                .cloned()
                .collect())
        }

        async fn find_command_entry_by_trigger(&self, tokens: &[String]) -> Result<Vec<CommandEntry>> {
            let joined = tokens.join(" ");
            Ok(self
                .0
                .iter()
                .filter(|e| {
                    e.bundle
                        .triggers
                        .iter()
                        .any(|t| regex::Regex::new(&t.pattern).map(|r| r.is_match(&joined)).unwrap_or(false))
                })
                .cloned()
                .collect())
        }
    }

    const SAMPLE: &str = r#"
name: gort
version: "1.0.0"
docker:
  image: gort/gort
  tag: latest
commands:
  echo:
    executable: ["echo"]
    rules: ["allow"]
"#;

    #[tokio::test]
    async fn no_match_is_no_such_command() {
        let bundle = parse_bundle(SAMPLE.as_bytes()).unwrap();
        let entry = bundle.command_entry("echo").unwrap();
        let finder = StaticFinder(vec![entry]);
        let finders: Vec<&dyn CommandEntryFinder> = vec![&finder];
        let err = resolve_by_name(&finders, "", "missing").await.unwrap_err();
        assert!(matches!(err, GortError::NoSuchCommand(_)));
    }

    #[tokio::test]
    async fn exact_match_resolves() {
        let bundle = parse_bundle(SAMPLE.as_bytes()).unwrap();
        let entry = bundle.command_entry("echo").unwrap();
        let finder = StaticFinder(vec![entry]);
        let finders: Vec<&dyn CommandEntryFinder> = vec![&finder];
        let resolved = resolve_by_name(&finders, "", "echo").await.unwrap();
        assert_eq!(resolved.command.name, "echo");
    }

    #[tokio::test]
    async fn trigger_with_no_match_is_silent() {
        let bundle = parse_bundle(SAMPLE.as_bytes()).unwrap();
        let entry = bundle.command_entry("echo").unwrap();
        let finder = StaticFinder(vec![entry]);
        let finders: Vec<&dyn CommandEntryFinder> = vec![&finder];
        let resolved = resolve_by_trigger(&finders, &["just".to_owned(), "chatting".to_owned()])
            .await
            .unwrap();
        assert!(resolved.is_none());
    }
}
