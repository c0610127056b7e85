//! Logging setup built on `nonblock_logger`, reading the level out of the
//! reloadable [`crate::config`] snapshot instead of a static, init-once
//! config.

use std::str::FromStr;

use nonblock_logger::log::LevelFilter;
use strum::EnumString;

#[cfg(not(test))]
use nonblock_logger::{BaseConsumer, BaseFilter, BaseFormater, JoinHandle, NonblockLogger};

#[cfg(not(test))]
use std::io;

/// `logging.level` as configured, parsed via `strum` rather than a
/// hand-written match; an unrecognized level falls back to `Info`.
#[derive(Clone, Copy, Debug, EnumString)]
#[strum(ascii_case_insensitive)]
enum ConfiguredLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<ConfiguredLevel> for LevelFilter {
    fn from(level: ConfiguredLevel) -> Self {
        match level {
            ConfiguredLevel::Off => LevelFilter::Off,
            ConfiguredLevel::Error => LevelFilter::Error,
            ConfiguredLevel::Warn => LevelFilter::Warn,
            ConfiguredLevel::Info => LevelFilter::Info,
            ConfiguredLevel::Debug => LevelFilter::Debug,
            ConfiguredLevel::Trace => LevelFilter::Trace,
        }
    }
}

fn level_from_str(level: &str) -> LevelFilter {
    ConfiguredLevel::from_str(level).map(LevelFilter::from).unwrap_or(LevelFilter::Info)
}

/// Setup logging and start the logger thread.
#[cfg(not(test))]
pub fn setup_log() -> JoinHandle {
    let level = level_from_str(&crate::config::current().logging.level);

    let formater = BaseFormater::new().local(true).color(true).level(4);

    let filter = BaseFilter::new().starts_with(true).max_level(level);
    let consumer = BaseConsumer::stdout(filter.max_level_get())
        .chain(LevelFilter::Error, io::stderr())
        .unwrap();

    let logger = NonblockLogger::new()
        .formater(formater)
        .filter(filter)
        .and_then(|l| l.consumer(consumer))
        .unwrap();
    logger
        .spawn()
        .map_err(|e| eprintln!("failed to init nonblock_logger: {:?}", e))
        .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_levels_case_insensitively() {
        assert!(matches!(level_from_str("DEBUG"), LevelFilter::Debug));
        assert!(matches!(level_from_str("warn"), LevelFilter::Warn));
    }

    #[test]
    fn unknown_level_falls_back_to_info() {
        assert!(matches!(level_from_str("chatty"), LevelFilter::Info));
    }
}
