//! An in-process `Worker` standing in for a real sandbox in tests, the same
//! canned-response role `sea_orm::MockDatabase` plays for a real connection.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};

use crate::error::Result;
use crate::worker::{Worker, WorkerFactory, WorkerSpec};

pub struct MockWorker {
    lines: Vec<String>,
    exit_status: i32,
    stopped: Mutex<bool>,
}

impl MockWorker {
    pub fn new(lines: Vec<String>, exit_status: i32) -> Self {
        Self {
            lines,
            exit_status,
            stopped: Mutex::new(false),
        }
    }
}

/// Hands out canned [`MockWorker`]s, ignoring the requested [`WorkerSpec`]
/// beyond recording it was asked for. Used to drive the dispatch engine in
/// tests without a Docker daemon.
pub struct MockWorkerFactory {
    lines: Vec<String>,
    exit_status: i32,
}

impl MockWorkerFactory {
    pub fn new(lines: Vec<String>, exit_status: i32) -> Self {
        Self { lines, exit_status }
    }
}

#[async_trait]
impl WorkerFactory for MockWorkerFactory {
    async fn spawn(&self, _spec: WorkerSpec) -> Result<Arc<dyn Worker>> {
        Ok(Arc::new(MockWorker::new(self.lines.clone(), self.exit_status)))
    }
}

#[async_trait]
impl Worker for MockWorker {
    async fn start(&self) -> Result<mpsc::Receiver<String>> {
        let (tx, rx) = mpsc::channel(self.lines.len().max(1));
        for line in &self.lines {
            tx.send(line.clone()).await.ok();
        }
        Ok(rx)
    }

    async fn stop(&self, _timeout: Duration) -> Result<()> {
        *self.stopped.lock().await = true;
        Ok(())
    }

    async fn stopped(&self) -> Result<i32> {
        Ok(self.exit_status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn streams_canned_output_then_reports_exit_status() {
        let worker = MockWorker::new(vec!["hello".to_owned()], 0);
        let mut rx = worker.start().await.unwrap();
        assert_eq!(rx.recv().await, Some("hello".to_owned()));
        assert_eq!(worker.stopped().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn worker_that_exits_before_output_has_empty_stream() {
        let worker = MockWorker::new(vec![], 7);
        let mut rx = worker.start().await.unwrap();
        assert_eq!(rx.recv().await, None);
        assert_eq!(worker.stopped().await.unwrap(), 7);
    }
}
