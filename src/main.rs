#![deny(rust_2018_idioms)]

use std::sync::Arc;

use clap::Parser;
use gort::adapter::AdapterManager;
use gort::config::{self, Args};
use gort::dataaccess::orm::OrmDataAccess;
use gort::dispatch::Engine;
use gort::error::Result;
use gort::worker::DockerWorkerFactory;
use tokio::sync::mpsc;

async fn async_main() -> Result<()> {
    let args = Args::parse();
    config::reload_from_path(&args.config).await?;

    let _log_handle = gort::setup_log();
    let metrics_handle = gort::metrics::serve();

    let cfg = config::current();
    let poll_path = args.config.clone();
    config::spawn_reload_watcher(poll_path.clone(), std::time::Duration::from_secs(30));
    #[cfg(unix)]
    config::spawn_signal_watcher(poll_path);

    let docker = match &cfg.docker.host {
        Some(host) => bollard::Docker::connect_with_http(host, 120, bollard::API_DEFAULT_VERSION)?,
        None => bollard::Docker::connect_with_local_defaults()?,
    };
    let worker_factory: Arc<dyn gort::worker::WorkerFactory> = Arc::new(DockerWorkerFactory::new(docker));

    let data_access = Arc::new(OrmDataAccess::connect(&cfg.database.connection_string()).await?);
    let adapters = AdapterManager::new();

    // Adapter-side transports (Slack/Discord sockets) are out of scope; this
    // channel is where such glue would feed resolved `RawCommandRequest`s in.
    let (_requests_tx, requests_rx) = mpsc::channel(256);

    let engine = Arc::new(Engine::new(data_access, adapters, worker_factory));
    let dispatch_handle = tokio::spawn(engine.run(requests_rx));

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            log::info!("shutting down");
        }
        result = metrics_handle => {
            if let Ok(Err(err)) = result {
                log::error!("metrics server exited: {}", err);
            }
        }
        _ = dispatch_handle => {
            log::warn!("dispatch engine exited");
        }
    }

    Ok(())
}

fn main() {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("create tokio runtime");
    if let Err(err) = runtime.block_on(async_main()) {
        eprintln!("fatal: {err}");
        std::process::exit(err.exit_code());
    }
}
