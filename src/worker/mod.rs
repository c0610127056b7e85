//! The worker abstraction: a one-shot sandboxed process executing a single
//! command. The core is agnostic to the sandbox; Docker is the only concrete
//! implementation here, with Kubernetes left as a named but unimplemented
//! config section.

pub mod docker;
pub mod mock;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::Result;

/// Everything a `Worker` needs to run one command.
#[derive(Clone, Debug)]
pub struct WorkerSpec {
    pub image: String,
    pub tag: String,
    pub executable: Vec<String>,
    pub parameters: Vec<String>,
    pub env: BTreeMap<String, String>,
}

/// The sandbox environment block set on every worker.
#[derive(Clone, Debug, Default)]
pub struct SandboxContext {
    pub adapter: String,
    pub bundle: String,
    pub command: String,
    pub chat_id: String,
    pub invocation_id: String,
    pub room: String,
    pub service_token: String,
    pub services_root: String,
    pub user: String,
    pub dynamic_configuration: BTreeMap<String, String>,
}

impl SandboxContext {
    pub fn into_env(self) -> BTreeMap<String, String> {
        let mut env = self.dynamic_configuration;
        env.insert("GORT_ADAPTER".to_owned(), self.adapter);
        env.insert("GORT_BUNDLE".to_owned(), self.bundle);
        env.insert("GORT_COMMAND".to_owned(), self.command);
        env.insert("GORT_CHAT_ID".to_owned(), self.chat_id);
        env.insert("GORT_INVOCATION_ID".to_owned(), self.invocation_id);
        env.insert("GORT_ROOM".to_owned(), self.room);
        env.insert("GORT_SERVICE_TOKEN".to_owned(), self.service_token);
        env.insert("GORT_SERVICES_ROOT".to_owned(), self.services_root);
        env.insert("GORT_USER".to_owned(), self.user);
        env
    }
}

/// `Worker` contract. Each request gets its own worker, and no worker
/// outlives its `CommandRequest`.
#[async_trait]
pub trait Worker: Send + Sync {
    /// Start the container/pod; returns the merged stdout/stderr stream,
    /// line by line, closed at EOF.
    async fn start(&self) -> Result<mpsc::Receiver<String>>;

    /// Request graceful termination, force-killing after `timeout`. Cleans
    /// up all created resources. Idempotent.
    async fn stop(&self, timeout: Duration) -> Result<()>;

    /// The exit status, populated exactly once, even on the stream-error
    /// path (status 500).
    async fn stopped(&self) -> Result<i32>;
}

/// Builds a fresh [`Worker`] per request. The dispatch engine is generic over
/// this rather than constructing `DockerWorker` directly, so the sandbox
/// backend (Docker, Kubernetes, or a test double) is swappable without
/// touching the engine.
#[async_trait]
pub trait WorkerFactory: Send + Sync {
    async fn spawn(&self, spec: WorkerSpec) -> Result<Arc<dyn Worker>>;
}

/// Builds [`docker::DockerWorker`]s against one shared `bollard::Docker`
/// client handle.
pub struct DockerWorkerFactory {
    client: bollard::Docker,
}

impl DockerWorkerFactory {
    pub fn new(client: bollard::Docker) -> Self {
        Self { client }
    }
}

#[async_trait]
impl WorkerFactory for DockerWorkerFactory {
    async fn spawn(&self, spec: WorkerSpec) -> Result<Arc<dyn Worker>> {
        Ok(Arc::new(docker::DockerWorker::new(self.client.clone(), spec)))
    }
}
