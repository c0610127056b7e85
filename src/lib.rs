//! # Gort: a ChatOps command engine.
//!
//! Gort validates, authorizes, and dispatches chat-issued commands to
//! sandboxed workers, streaming their output back to the channel the command
//! came from. This crate is the core pipeline: the command and rule
//! languages, the authorization evaluator, the resolver, the worker
//! abstraction, and the dispatch engine that ties them together. Chat
//! provider transports, the REST administration API, and TLS termination are
//! out of scope; the ports they'd plug into ([`adapter`]) are specified and
//! left for a caller to implement.

/// The chat-provider port and the registry that fans events in from many of them.
pub mod adapter;

/// Declared commands, their parse directives, and rule strings, loaded from bundle YAML.
pub mod bundle;

/// The command text language: tokenizer and parser.
pub mod command;

/// Process-wide, hot-reloadable configuration.
pub mod config;

/// The persistence port: user/group/permission CRUD, bundle state, and the audit log.
pub mod dataaccess;

/// The request/response pump: resolves, authorizes, and runs each inbound command.
pub mod dispatch;

/// Unified error handling and the exit-code taxonomy.
pub mod error;

/// Internal logger framework; external code should just use the `log` crate.
mod logger;

/// Metrics exposition.
pub mod metrics;

/// Sea-orm entity models backing the `DataAccess` port.
pub mod persist;

/// The rule language: tokenizer, parser, and evaluator.
pub mod rule;

/// Looks up the enabled `CommandEntry` a request applies to, by name or trigger.
pub mod resolver;

/// Parses a rendered template's tagged-marker stream into an `OutputElements` tree.
pub mod template;

/// The typed value system used by the command and rule languages.
pub mod value;

/// The worker abstraction: a one-shot sandboxed process per command.
pub mod worker;

#[cfg(not(test))]
pub use logger::setup_log;
