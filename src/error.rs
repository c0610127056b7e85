//! Unified error handling for the command pipeline.
//!
//! A single `thiserror`-derived enum wraps every external failure mode, with
//! each variant also mapping to an exit-code taxonomy so the dispatch engine
//! can report a `CommandResponse::status` without re-deriving it at every
//! call site.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, GortError>;

/// Every error kind surfaced to a user or logged by the dispatch engine.
#[derive(Debug, Error)]
pub enum GortError {
    // -- ResolutionError --
    #[error("no command found matching {0}")]
    NoSuchCommand(String),
    #[error("multiple commands match {0}, specify a bundle")]
    MultipleCommands(String),
    #[error("invalid bundle:command pair {0}")]
    InvalidBundleCommandPair(String),

    // -- AuthorizationError --
    #[error("command {0} has no rules defined")]
    NoRulesDefined(String),
    #[error("user {0} is not permitted to run this command")]
    NotAllowed(String),
    #[error("failed to load rule: {0}")]
    RuleLoadError(String),

    // -- ParseError (tokenizer/parser, command or rule text) --
    #[error("{message} at position {position}")]
    Parse { message: String, position: usize },

    // -- DataAccessError --
    #[error("no such user: {0}")]
    NoSuchUser(String),
    #[error("data access error: {0}")]
    DataAccess(String),

    // -- WorkerError --
    #[error("worker error: {0}")]
    Worker(String),
    #[error("docker error: {0}")]
    Docker(#[from] bollard::errors::Error),

    // -- TimeoutError --
    #[error("command timed out")]
    Timeout,
    #[error("shutting down")]
    Shutdown,

    // -- ConfigError --
    #[error("config file not found: {0}")]
    ConfigFileNotFound(String),
    #[error("failed to hash config file: {0}")]
    HashFailure(String),
    #[error("config could not be loaded: {0}")]
    ConfigUnloadable(String),

    #[error("metrics server error: {0}")]
    Metrics(#[from] hyper::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("db error: {0}")]
    Db(#[from] sea_orm::DbErr),
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Generic(String),
}

impl GortError {
    /// Maps this error onto the process exit-code taxonomy.
    pub fn exit_code(&self) -> i32 {
        match self {
            GortError::NoSuchCommand(_) => 127,
            GortError::MultipleCommands(_) => 1,
            GortError::InvalidBundleCommandPair(_) => 1,
            GortError::NoRulesDefined(_) => 77,
            GortError::NotAllowed(_) => 77,
            GortError::RuleLoadError(_) => 70,
            GortError::Parse { .. } => 76,
            GortError::NoSuchUser(_) => 67,
            GortError::DataAccess(_) => 75,
            GortError::Worker(_) => 126,
            GortError::Docker(_) => 126,
            GortError::Timeout => 72,
            GortError::Shutdown => 130,
            GortError::ConfigFileNotFound(_) => 71,
            GortError::HashFailure(_) => 71,
            GortError::ConfigUnloadable(_) => 71,
            GortError::Metrics(_) => 1,
            GortError::Io(_) => 74,
            GortError::Db(_) => 75,
            GortError::Yaml(_) => 76,
            GortError::Json(_) => 76,
            GortError::Generic(_) => 1,
        }
    }

    pub fn generic<T: ToString>(text: T) -> Self {
        Self::Generic(text.to_string())
    }

    pub fn parse<T: Into<String>>(message: T, position: usize) -> Self {
        Self::Parse {
            message: message.into(),
            position,
        }
    }
}
