//! The bundle model: declared commands, their parse directives, and rule
//! strings. Loading follows the same `serde` + file-read shape as
//! [`crate::config::reload_from_path`], just without the atomic-swap
//! lifecycle — a bundle is installed once per `DataAccess` transaction, not
//! hot-reloaded.

use std::collections::HashMap;
use std::path::Path;

use dashmap::DashMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::command::{ParseDirective, ParseDirectives};
use crate::error::{GortError, Result};

#[derive(Clone, Serialize, Deserialize, Debug, Default)]
pub struct DockerImage {
    pub image: String,
    pub tag: String,
}

#[derive(Clone, Serialize, Deserialize, Debug, Default)]
pub struct Templates {
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub command_error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub message_error: Option<String>,
}

#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct Trigger {
    #[serde(rename = "match")]
    pub pattern: String,
    pub command_string: String,
}

/// Every bundle's trigger pattern is recompiled on each incoming line unless
/// cached; a `DashMap` keyed by pattern text avoids paying `Regex::new`
/// again for patterns already seen, the same insert-then-reuse registry
/// idiom as [`crate::adapter::AdapterManager`].
static TRIGGER_REGEX_CACHE: Lazy<DashMap<String, Regex>> = Lazy::new(DashMap::new);

impl Trigger {
    /// The compiled form of `pattern`, compiling and caching it on first use.
    /// `None` if the pattern is not a valid regex.
    pub fn compiled(&self) -> Option<Regex> {
        if let Some(cached) = TRIGGER_REGEX_CACHE.get(&self.pattern) {
            return Some(cached.clone());
        }
        let compiled = Regex::new(&self.pattern).ok()?;
        TRIGGER_REGEX_CACHE.insert(self.pattern.clone(), compiled.clone());
        Some(compiled)
    }
}

/// One `parse_options` entry in a bundle's YAML, translated into the
/// [`ParseDirective`]s the command parser understands.
#[derive(Clone, Serialize, Deserialize, Debug, Default)]
pub struct RawParseOptions {
    #[serde(default)]
    pub agnostic_dashes: Option<bool>,
    #[serde(default)]
    pub assume_option_arguments: Option<bool>,
    #[serde(default)]
    pub option_has_argument: HashMap<String, bool>,
    #[serde(default)]
    pub option_alias: HashMap<String, String>,
}

impl RawParseOptions {
    fn into_directives(self) -> ParseDirectives {
        let mut directives = Vec::new();
        if let Some(v) = self.agnostic_dashes {
            directives.push(ParseDirective::AgnosticDashes(v));
        }
        if let Some(v) = self.assume_option_arguments {
            directives.push(ParseDirective::AssumeOptionArguments(v));
        }
        for (name, has_arg) in self.option_has_argument {
            directives.push(ParseDirective::OptionHasArgument(name, has_arg));
        }
        for (short, long) in self.option_alias {
            directives.push(ParseDirective::OptionAlias(short, long));
        }
        ParseDirectives(directives)
    }
}

#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct RawBundleCommand {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub long_description: String,
    pub executable: Vec<String>,
    #[serde(default)]
    pub rules: Vec<String>,
    #[serde(default)]
    pub templates: Templates,
    #[serde(default)]
    pub triggers: Vec<Trigger>,
    #[serde(default)]
    pub parse_options: RawParseOptions,
}

#[derive(Clone, Debug)]
pub struct BundleCommand {
    pub name: String,
    pub description: String,
    pub long_description: String,
    pub executable: Vec<String>,
    pub rules: Vec<String>,
    pub templates: Templates,
    pub parse_directives: ParseDirectives,
}

#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct RawBundle {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub homepage: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub long_description: String,
    #[serde(default)]
    pub permissions: Vec<String>,
    pub docker: DockerImage,
    pub commands: HashMap<String, RawBundleCommand>,
    #[serde(default)]
    pub templates: Templates,
}

/// `{Bundle, BundleCommand}`, the pair a request resolves to.
#[derive(Clone, Debug)]
pub struct CommandEntry {
    pub bundle: Bundle,
    pub command: BundleCommand,
}

#[derive(Clone, Debug)]
pub struct Bundle {
    pub name: String,
    pub version: String,
    pub author: String,
    pub homepage: String,
    pub description: String,
    pub long_description: String,
    pub permissions: Vec<String>,
    pub docker: DockerImage,
    pub commands: HashMap<String, BundleCommand>,
    pub templates: Templates,
    pub triggers: Vec<Trigger>,
}

/// Parse bundle YAML bytes, duplicating each map key into its command's
/// `name` field.
pub fn parse_bundle(bytes: &[u8]) -> Result<Bundle> {
    let raw: RawBundle = serde_yaml::from_slice(bytes)?;
    let mut triggers = Vec::new();
    let mut commands = HashMap::with_capacity(raw.commands.len());
    for (name, raw_command) in raw.commands {
        triggers.extend(raw_command.triggers.iter().cloned());
        commands.insert(
            name.clone(),
            BundleCommand {
                name,
                description: raw_command.description,
                long_description: raw_command.long_description,
                executable: raw_command.executable,
                rules: raw_command.rules,
                templates: raw_command.templates,
                parse_directives: raw_command.parse_options.into_directives(),
            },
        );
    }
    Ok(Bundle {
        name: raw.name,
        version: raw.version,
        author: raw.author,
        homepage: raw.homepage,
        description: raw.description,
        long_description: raw.long_description,
        permissions: raw.permissions,
        docker: raw.docker,
        commands,
        templates: raw.templates,
        triggers,
    })
}

/// Load and parse a bundle file from disk.
pub async fn load_bundle(path: &Path) -> Result<Bundle> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|_| GortError::ConfigFileNotFound(path.display().to_string()))?;
    parse_bundle(&bytes)
}

impl Bundle {
    pub fn command_entry(&self, command_name: &str) -> Option<CommandEntry> {
        self.commands.get(command_name).map(|command| CommandEntry {
            bundle: self.clone(),
            command: command.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
name: gort
version: "1.0.0"
author: gort
description: built-in commands
docker:
  image: gort/gort
  tag: latest
commands:
  echo:
    description: echo arguments back
    executable: ["echo"]
    rules:
      - allow
  destroy:
    description: tear something down
    executable: ["destroy"]
    rules:
      - "with option['delete'] == true must have gort:destroy"
    parse_options:
      option_has_argument:
        name: true
"#;

    #[test]
    fn parses_sample_bundle() {
        let bundle = parse_bundle(SAMPLE.as_bytes()).unwrap();
        assert_eq!(bundle.name, "gort");
        assert_eq!(bundle.commands.len(), 2);
        let echo = &bundle.commands["echo"];
        assert_eq!(echo.name, "echo");
        assert_eq!(echo.executable, vec!["echo".to_owned()]);
        let destroy = &bundle.commands["destroy"];
        assert!(destroy.parse_directives.has_argument("name"));
    }

    #[test]
    fn command_entry_pairs_bundle_and_command() {
        let bundle = parse_bundle(SAMPLE.as_bytes()).unwrap();
        let entry = bundle.command_entry("echo").unwrap();
        assert_eq!(entry.bundle.name, "gort");
        assert_eq!(entry.command.name, "echo");
    }
}
