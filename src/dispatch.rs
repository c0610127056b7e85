//! The dispatch engine: one task per inbound request, no serialization
//! across requests. Every request is walked through `Received → Resolving →
//! Authorizing → Running → {Succeeded | Failed} → Reported`; the final
//! transition is always taken.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, Semaphore};
use tokio::time::timeout as with_timeout;
use tokio_util::sync::CancellationToken;

use crate::adapter::AdapterManager;
use crate::command;
use crate::dataaccess::{CommandRequest, CommandResponse, DataAccess, User};
use crate::error::GortError;
use crate::resolver::resolve_by_name_or_trigger;
use crate::rule::authorize;
use crate::worker::{SandboxContext, WorkerFactory, WorkerSpec};

/// A raw chat message, as produced by an adapter's `Listen` loop, before the
/// dispatch engine has tokenized, resolved, or assigned it a `RequestID`.
#[derive(Clone, Debug)]
pub struct RawCommandRequest {
    pub adapter: String,
    pub channel_id: String,
    pub user_id: String,
    pub user_name: String,
    pub user_email: Option<String>,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub trace_context: String,
}

/// Ties the handful of collaborators a request needs together: data access,
/// the adapter registry, and the worker factory, with no process-global
/// state to reach for instead.
pub struct Engine<D: DataAccess> {
    data_access: Arc<D>,
    adapters: AdapterManager,
    worker_factory: Arc<dyn WorkerFactory>,
    shutdown: CancellationToken,
    concurrency: Arc<Semaphore>,
}

impl<D: DataAccess + 'static> Engine<D> {
    pub fn new(data_access: Arc<D>, adapters: AdapterManager, worker_factory: Arc<dyn WorkerFactory>) -> Self {
        Self::with_shutdown(data_access, adapters, worker_factory, CancellationToken::new())
    }

    /// Like [`Engine::new`], but sharing a caller-owned [`CancellationToken`]
    /// so in-flight worker waits can be unblocked on shutdown.
    pub fn with_shutdown(
        data_access: Arc<D>,
        adapters: AdapterManager,
        worker_factory: Arc<dyn WorkerFactory>,
        shutdown: CancellationToken,
    ) -> Self {
        let permits = crate::config::current().global.worker_concurrency.max(1);
        Self {
            data_access,
            adapters,
            worker_factory,
            shutdown,
            concurrency: Arc::new(Semaphore::new(permits)),
        }
    }

    /// Consumes `requests_from`, spawning one independent task per request so
    /// that no single slow command blocks the channel. Intake is never
    /// throttled: the permit wait happens inside the spawned task, after the
    /// request has already been taken off the channel, so only the actual
    /// `dispatch_request` work is bounded to `global.worker_concurrency`
    /// requests running at once. Stops accepting new requests once
    /// `shutdown` fires; in-flight requests still run to completion or their
    /// own timeout.
    pub async fn run(self: Arc<Self>, mut requests_from: mpsc::Receiver<RawCommandRequest>) {
        loop {
            let raw = tokio::select! {
                raw = requests_from.recv() => raw,
                _ = self.shutdown.cancelled() => None,
            };
            let Some(raw) = raw else {
                break;
            };
            let engine = self.clone();
            tokio::spawn(async move {
                let Ok(_permit) = engine.concurrency.acquire().await else {
                    return;
                };
                engine.dispatch_request(raw).await;
            });
        }
    }

    /// Runs one request through the full `Received -> ... -> Reported`
    /// pipeline: resolve, authorize, run the worker, record the audit log,
    /// forward the reply to the originating adapter, and return the
    /// response that was sent.
    pub async fn dispatch_request(&self, raw: RawCommandRequest) -> CommandResponse {
        let started = Instant::now();
        log::debug!("received request from {} in {}: {:?}", raw.user_name, raw.channel_id, raw.text);
        let response = self.process(&raw, started).await;
        crate::metrics::COMMAND_DURATION
            .with_label_values(&[&response.title])
            .observe(response.duration.as_secs_f64());
        crate::metrics::COMMANDS_DISPATCHED
            .with_label_values(&[&response.title, &response.status.to_string()])
            .inc();
        let elapsed = humantime::format_duration(response.duration);
        if response.status == 0 {
            log::info!("request {} ({}) succeeded in {}", response.request_id, response.title, elapsed);
        } else {
            log::warn!(
                "request {} ({}) finished with status {} in {}: {:?}",
                response.request_id,
                response.title,
                response.status,
                elapsed,
                response.error
            );
        }
        if let Some(adapter) = self.adapters.get(&raw.adapter) {
            if let Err(err) = adapter.send_text(&raw.channel_id, &response.output.join("\n")).await {
                log::error!("failed to send response to adapter {}: {}", raw.adapter, err);
            }
        }
        if let Err(err) = self.data_access.request_close(&response).await {
            log::error!("failed to record request-close for {}: {}", response.request_id, err);
        }
        response
    }

    async fn process(&self, raw: &RawCommandRequest, started: Instant) -> CommandResponse {
        let mut request_id = 0i64;
        match self.try_process(raw, started, &mut request_id).await {
            Ok(response) => response,
            Err(err) => {
                log::error!("request from {} failed: {}", raw.user_name, err);
                CommandResponse {
                    request_id,
                    status: err.exit_code(),
                    title: "error".to_owned(),
                    output: vec![err.to_string()],
                    error: Some(err.to_string()),
                    duration: started.elapsed(),
                    structured: false,
                    payload: None,
                }
            }
        }
    }

    /// `request_id_out` is set as soon as `RequestBegin` succeeds, so that
    /// `process`'s error branch can report the real `RequestID` even when a
    /// later step (user load, resolution, authorization) fails. Before that
    /// point there is no audit row yet and `process` falls back to the `0`
    /// sentinel.
    async fn try_process(
        &self,
        raw: &RawCommandRequest,
        started: Instant,
        request_id_out: &mut i64,
    ) -> Result<CommandResponse, GortError> {
        // Received -> Resolving
        let tokens = command::tokenize(&raw.text)?;
        // A bundle's own `ParseDirectives` aren't known until it's resolved, so
        // the bundle:name split is done once generically, then the options are
        // re-parsed against the resolved command's directives below.
        let generic = command::parse(&tokens, &Default::default())?;
        log::debug!("tokenized and parsed generic command {}:{}", generic.bundle, generic.name);

        // Adapters that don't carry their own distributed-tracing header
        // (the mock adapter, plain IRC-style transports) leave `trace_context`
        // empty; mint one here so every stored request still carries a trace
        // id to correlate worker logs against.
        let trace_context = if raw.trace_context.is_empty() {
            uuid::Uuid::new_v4().to_string()
        } else {
            raw.trace_context.clone()
        };

        // Step 1: allocate the RequestID and open the audit row before doing
        // anything that can fail, so a denied or unresolvable request is
        // still logged.
        let request = CommandRequest {
            request_id: 0,
            bundle_name: generic.bundle.clone(),
            command_name: generic.name.clone(),
            adapter: raw.adapter.clone(),
            channel_id: raw.channel_id.clone(),
            user_id: raw.user_id.clone(),
            user_name: raw.user_name.clone(),
            user_email: raw.user_email.clone(),
            parameters: generic.parameters.iter().map(|v| v.to_string()).collect(),
            timestamp: raw.timestamp,
            trace_context,
        };
        let request_id = self.data_access.request_begin(&request).await?;
        *request_id_out = request_id;

        // Step 2: load the user.
        let user = match self.data_access.user_get(&raw.user_name).await? {
            Some(user) => user,
            None if crate::config::current().gort.allow_self_registration => {
                log::info!("self-registering new user {}", raw.user_name);
                let user = User {
                    name: raw.user_name.clone(),
                    email: raw.user_email.clone(),
                    full_name: None,
                };
                self.data_access.user_create(user.clone()).await?;
                user
            }
            None => {
                log::warn!("no such user: {}", raw.user_name);
                return Err(GortError::NoSuchUser(raw.user_name.clone()));
            }
        };

        // Step 3: resolve.
        let finders: Vec<&dyn crate::resolver::CommandEntryFinder> = vec![self.data_access.as_ref()];
        let entry = resolve_by_name_or_trigger(&finders, &generic.bundle, &generic.name, &tokens)
            .await
            .inspect_err(|err| log::warn!("resolution failed for {:?}: {}", raw.text, err))?;
        let parsed = command::parse(&tokens, &entry.command.parse_directives)?;
        log::debug!("resolved to {}:{}", entry.bundle.name, entry.command.name);

        // Step 4: authorize.
        let permissions = self.data_access.user_permission_list(&user.name).await?;
        let allowed = authorize(
            &entry.bundle.name,
            &entry.command.name,
            &entry.command.rules,
            &parsed.options,
            &parsed.parameters,
            &permissions,
        )?;
        crate::metrics::AUTHORIZATION_DECISIONS
            .with_label_values(&[
                &format!("{}:{}", entry.bundle.name, entry.command.name),
                if allowed { "allow" } else { "deny" },
            ])
            .inc();
        if !allowed {
            log::warn!("user {} denied for {}:{}", user.name, entry.bundle.name, entry.command.name);
            return Err(GortError::NotAllowed(format!("{}:{}", entry.bundle.name, entry.command.name)));
        }

        // Authorizing -> Running
        let sandbox = SandboxContext {
            adapter: raw.adapter.clone(),
            bundle: entry.bundle.name.clone(),
            command: entry.command.name.clone(),
            chat_id: raw.channel_id.clone(),
            invocation_id: request_id.to_string(),
            room: raw.channel_id.clone(),
            service_token: String::new(),
            services_root: crate::config::current().gort.api_url_base.clone(),
            user: raw.user_name.clone(),
            dynamic_configuration: Default::default(),
        };
        let spec = WorkerSpec {
            image: entry.bundle.docker.image.clone(),
            tag: entry.bundle.docker.tag.clone(),
            executable: entry.command.executable.clone(),
            parameters: parsed.parameters.iter().map(|v| v.to_string()).collect(),
            env: sandbox.into_env(),
        };

        let worker = self.worker_factory.spawn(spec).await?;
        let mut lines = match worker.start().await {
            Ok(lines) => {
                crate::metrics::WORKER_STARTS.with_label_values(&["started"]).inc();
                lines
            }
            Err(err) => {
                crate::metrics::WORKER_STARTS.with_label_values(&["failed"]).inc();
                log::error!("worker failed to start for {}:{}: {}", entry.bundle.name, entry.command.name, err);
                return Err(err);
            }
        };
        let mut output = Vec::new();
        let command_timeout = Duration::from_secs(crate::config::current().global.command_timeout);

        let run_to_completion = async {
            while let Some(line) = lines.recv().await {
                output.push(line);
            }
            worker.stopped().await
        };

        let status = tokio::select! {
            result = with_timeout(command_timeout, run_to_completion) => match result {
                Ok(result) => result?,
                Err(_) => {
                    crate::metrics::WORKER_STARTS.with_label_values(&["timed_out"]).inc();
                    log::warn!("command {}:{} timed out after {:?}", entry.bundle.name, entry.command.name, command_timeout);
                    worker.stop(Duration::ZERO).await?;
                    return Ok(CommandResponse {
                        request_id,
                        status: GortError::Timeout.exit_code(),
                        title: format!("{}:{}", entry.bundle.name, entry.command.name),
                        output,
                        error: Some(GortError::Timeout.to_string()),
                        duration: started.elapsed(),
                        structured: false,
                        payload: None,
                    });
                }
            },
            _ = self.shutdown.cancelled() => {
                worker.stop(Duration::ZERO).await?;
                return Ok(CommandResponse {
                    request_id,
                    status: GortError::Shutdown.exit_code(),
                    title: format!("{}:{}", entry.bundle.name, entry.command.name),
                    output,
                    error: Some(GortError::Shutdown.to_string()),
                    duration: started.elapsed(),
                    structured: false,
                    payload: None,
                });
            }
        };
        worker.stop(Duration::from_secs(5)).await?;

        // Running -> {Succeeded | Failed} -> Reported
        Ok(CommandResponse {
            request_id,
            status,
            title: format!("{}:{}", entry.bundle.name, entry.command.name),
            output,
            error: None,
            duration: started.elapsed(),
            structured: false,
            payload: None,
        })
    }
}
