//! Docker-backed [`Worker`]: wraps a `bollard::Docker` client handle in a
//! struct that owns request-scoped state behind a `Mutex`/`watch` pair.

use std::time::Duration;

use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, LogsOptions, RemoveContainerOptions, StartContainerOptions,
    StopContainerOptions, WaitContainerOptions,
};
use bollard::image::CreateImageOptions;
use bollard::Docker;
use futures::StreamExt;
use tokio::sync::{mpsc, watch, Mutex};

use crate::error::{GortError, Result};
use crate::worker::{Worker, WorkerSpec};

pub struct DockerWorker {
    client: Docker,
    spec: WorkerSpec,
    container_id: Mutex<Option<String>>,
    exit_tx: Mutex<Option<watch::Sender<Option<i32>>>>,
    exit_rx: watch::Receiver<Option<i32>>,
}

impl DockerWorker {
    pub fn new(client: Docker, spec: WorkerSpec) -> Self {
        let (exit_tx, exit_rx) = watch::channel(None);
        Self {
            client,
            spec,
            container_id: Mutex::new(None),
            exit_tx: Mutex::new(Some(exit_tx)),
            exit_rx,
        }
    }

    async fn ensure_image(&self) -> Result<()> {
        let options = Some(CreateImageOptions {
            from_image: self.spec.image.as_str(),
            tag: self.spec.tag.as_str(),
            ..Default::default()
        });
        let mut stream = self.client.create_image(options, None, None);
        while let Some(progress) = stream.next().await {
            progress.map_err(GortError::from)?;
        }
        Ok(())
    }
}

#[async_trait]
impl Worker for DockerWorker {
    async fn start(&self) -> Result<mpsc::Receiver<String>> {
        self.ensure_image().await?;

        let image = format!("{}:{}", self.spec.image, self.spec.tag);
        let cmd: Vec<String> = self
            .spec
            .executable
            .iter()
            .chain(self.spec.parameters.iter())
            .cloned()
            .collect();
        let env: Vec<String> = self.spec.env.iter().map(|(k, v)| format!("{k}={v}")).collect();

        let config = Config {
            image: Some(image),
            cmd: Some(cmd),
            env: Some(env),
            ..Default::default()
        };

        let created = self
            .client
            .create_container(None::<CreateContainerOptions<String>>, config)
            .await
            .map_err(GortError::from)?;
        let container_id = created.id;

        self.client
            .start_container(&container_id, None::<StartContainerOptions<String>>)
            .await
            .map_err(GortError::from)?;
        *self.container_id.lock().await = Some(container_id.clone());

        let (tx, rx) = mpsc::channel(64);
        let logs_client = self.client.clone();
        let logs_container_id = container_id.clone();
        tokio::spawn(async move {
            let options = Some(LogsOptions::<String> {
                follow: true,
                stdout: true,
                stderr: true,
                ..Default::default()
            });
            let mut stream = logs_client.logs(&logs_container_id, options);
            while let Some(chunk) = stream.next().await {
                match chunk {
                    Ok(output) => {
                        for line in output.to_string().lines() {
                            if tx.send(line.to_owned()).await.is_err() {
                                return;
                            }
                        }
                    }
                    Err(_) => return,
                }
            }
        });

        let wait_client = self.client.clone();
        let wait_container_id = container_id.clone();
        let exit_tx = self.exit_tx.lock().await.take();
        tokio::spawn(async move {
            let mut stream = wait_client.wait_container(&wait_container_id, None::<WaitContainerOptions<String>>);
            let status = match stream.next().await {
                Some(Ok(result)) => result.status_code as i32,
                _ => 500,
            };
            if let Some(tx) = exit_tx {
                let _ = tx.send(Some(status));
            }
        });

        Ok(rx)
    }

    async fn stop(&self, timeout: Duration) -> Result<()> {
        let Some(container_id) = self.container_id.lock().await.clone() else {
            return Ok(());
        };
        let options = Some(StopContainerOptions {
            t: timeout.as_secs() as i64,
        });
        match self.client.stop_container(&container_id, options).await {
            Ok(())
            | Err(bollard::errors::Error::DockerResponseServerError { status_code: 304, .. })
            | Err(bollard::errors::Error::DockerResponseServerError { status_code: 404, .. }) => {}
            Err(err) => return Err(err.into()),
        }
        match self
            .client
            .remove_container(&container_id, Some(RemoveContainerOptions { force: true, ..Default::default() }))
            .await
        {
            Ok(()) | Err(bollard::errors::Error::DockerResponseServerError { status_code: 404, .. }) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    async fn stopped(&self) -> Result<i32> {
        let mut rx = self.exit_rx.clone();
        loop {
            if let Some(status) = *rx.borrow() {
                return Ok(status);
            }
            rx.changed().await.map_err(|_| GortError::Worker("exit channel closed".to_owned()))?;
        }
    }
}
