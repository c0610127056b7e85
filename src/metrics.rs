//! Metrics exposition: the `prometheus` default registry served by
//! `prometheus_hyper::Server`, serving on the reloadable
//! `logging.metrics_hook` socket instead of a fixed one, with the
//! command-pipeline counters/histograms registered on top of the default
//! registry.

use lazy_static::lazy_static;
use prometheus::{register_histogram_vec, register_int_counter_vec, HistogramVec, IntCounterVec};
use prometheus_hyper::Server;
use tokio::sync::Notify;

use crate::error::Result;

lazy_static! {
    /// Count of commands dispatched, labeled by bundle:command and final status.
    pub static ref COMMANDS_DISPATCHED: IntCounterVec = register_int_counter_vec!(
        "gort_commands_dispatched_total",
        "total commands dispatched, by command and status",
        &["command", "status"]
    )
    .unwrap();

    /// Wall-clock time spent executing a command, end to end.
    pub static ref COMMAND_DURATION: HistogramVec = register_histogram_vec!(
        "gort_command_duration_seconds",
        "time spent executing a command, from Received to Reported",
        &["command"]
    )
    .unwrap();

    /// Authorization decisions, labeled by allow/deny.
    pub static ref AUTHORIZATION_DECISIONS: IntCounterVec = register_int_counter_vec!(
        "gort_authorization_decisions_total",
        "authorization decisions, by command and outcome",
        &["command", "outcome"]
    )
    .unwrap();

    /// Worker starts, labeled by outcome (started/timed_out/failed).
    pub static ref WORKER_STARTS: IntCounterVec = register_int_counter_vec!(
        "gort_worker_starts_total",
        "worker start attempts, by outcome",
        &["outcome"]
    )
    .unwrap();
}

/// Serve the default registry over HTTP until the process exits, against the
/// reloadable config.
pub fn serve() -> tokio::task::JoinHandle<Result<()>> {
    let addr = crate::config::current().logging.metrics_hook;
    tokio::spawn(async move {
        Server::run(prometheus::default_registry(), addr, Notify::new().notified()).await?;
        Ok(())
    })
}
