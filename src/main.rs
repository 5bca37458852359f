// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::{Context as _, Result};
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Router};
use capdo::{
    capi::{Cluster, Machine},
    cloud::{client::DoClient, CloudServices},
    config::{Config, LogFormat},
    constants::{CONTROLLER_NAME, TOKIO_WORKER_THREADS},
    context::Context,
    crd::{DOCluster, DOKSCluster, DOKSControlPlane, DOKSNodePool, DOMachine},
    dns::PropagationChecker,
    errors::ReconcileError,
    events::KubeEventPublisher,
    labels::CLUSTER_NAME_LABEL,
    metrics,
    reconcilers::{
        reconcile_docluster, reconcile_doks_cluster, reconcile_doks_control_plane,
        reconcile_doks_node_pool, reconcile_domachine, retry::throttled_requeue,
        retry::ErrorBackoff, Outcome,
    },
    webhook,
};
use clap::Parser;
use futures::{Future, StreamExt};
use k8s_openapi::api::core::v1::ObjectReference;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::NamespaceResourceScope;
use kube::{
    runtime::{
        controller::{self, Action},
        reflector::{ObjectRef, Store},
        watcher, Controller,
    },
    Api, Client, Resource, ResourceExt,
};
use kube_lease_manager::LeaseManagerBuilder;
use std::fmt::Debug;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

fn main() -> Result<()> {
    let config = Config::parse();

    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(TOKIO_WORKER_THREADS)
        .thread_name("capdo-controller")
        .enable_all()
        .build()?;

    runtime.block_on(async_main(config))
}

/// Initialize logging.
///
/// Format: timestamp file:line LEVEL message, or one JSON object per line.
/// Respects `RUST_LOG`, defaulting to `info`.
fn init_logging(format: LogFormat) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    match format {
        LogFormat::Json => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }
}

async fn async_main(config: Config) -> Result<()> {
    init_logging(config.log_format);
    info!(version = env!("CARGO_PKG_VERSION"), "Starting DigitalOcean Cluster API provider");

    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("failed to install the rustls crypto provider"))?;

    let client = Client::try_default().await?;
    debug!("Kubernetes client initialized successfully");

    let cloud = CloudServices::from_client(
        DoClient::from_env(&config.do_api_url).context("failed to create DigitalOcean client")?,
    );

    let dns = match PropagationChecker::from_resolv_conf(&config.resolv_conf).await {
        Ok(checker) => {
            info!(resolver = %checker.resolver(), "DNS propagation checks enabled");
            Some(Arc::new(checker))
        }
        Err(e) => {
            warn!(path = %config.resolv_conf.display(), error = %e, "No resolver for DNS propagation checks");
            None
        }
    };

    let ctx = Arc::new(Context {
        client: client.clone(),
        cloud,
        dns,
        events: Arc::new(KubeEventPublisher::new(client.clone(), CONTROLLER_NAME)),
        settings: config.reconcile_settings(),
        backoff: Arc::new(ErrorBackoff::new()),
    });

    let ready = Arc::new(AtomicBool::new(false));
    tokio::spawn(serve_health(config.health_probe_bind_address, ready.clone()));
    if let Some(addr) = config.metrics_addr().context("invalid --metrics-bind-address")? {
        tokio::spawn(serve_metrics(addr));
    }
    if config.disable_webhooks {
        info!("Webhooks disabled");
    } else {
        let addr = config.webhook_addr();
        let cert_dir = config.webhook_cert_dir.clone();
        let cert_name = config.webhook_cert_name.clone();
        let key_name = config.webhook_key_name.clone();
        tokio::spawn(async move {
            if let Err(e) = webhook::serve(addr, &cert_dir, &cert_name, &key_name).await {
                error!(error = ?e, "Webhook server stopped");
            }
        });
    }
    ready.store(true, Ordering::SeqCst);

    tokio::select! {
        result = run(ctx, &config) => result,
        result = shutdown_signal() => {
            result?;
            info!("Graceful shutdown completed successfully");
            Ok(())
        }
    }
}

/// Run the controllers, behind the lease when leader election is enabled.
async fn run(ctx: Arc<Context>, config: &Config) -> Result<()> {
    if !config.leader_elect {
        return run_controllers(ctx, config).await;
    }

    let identity = std::env::var("POD_NAME")
        .unwrap_or_else(|_| format!("capdo-{:08x}", rand::random::<u32>()));
    let manager = LeaseManagerBuilder::new(ctx.client.clone(), &config.leader_election_id)
        .with_namespace(config.lease_namespace())
        .with_identity(&identity)
        .with_duration(config.lease_duration_secs)
        .with_grace(config.renew_deadline_secs)
        .build()
        .await
        .context("failed to create lease manager")?;
    let (mut leader, _task) = manager.watch().await;

    info!(identity = %identity, lease = %config.leader_election_id, "Waiting for leadership");
    while !*leader.borrow_and_update() {
        leader.changed().await.context("lease manager stopped")?;
    }
    info!(identity = %identity, "Leadership acquired");
    metrics::record_leader_elected(&identity);

    tokio::select! {
        result = run_controllers(ctx, config) => result,
        _ = async {
            while *leader.borrow_and_update() {
                if leader.changed().await.is_err() {
                    break;
                }
            }
        } => {
            metrics::record_leader_lost(&identity);
            anyhow::bail!("lost leadership of lease {}", config.leader_election_id)
        }
    }
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result?;
                info!("Received SIGINT, initiating graceful shutdown");
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM (pod termination), initiating graceful shutdown");
            }
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received SIGINT, initiating graceful shutdown");
    }
    Ok(())
}

/// Run every controller; any of them exiting is fatal.
async fn run_controllers(ctx: Arc<Context>, config: &Config) -> Result<()> {
    info!(namespace = ?config.namespace, doks = config.enable_doks, "Starting all controllers");

    let doks = async {
        if config.enable_doks {
            tokio::join!(
                run_doks_cluster_controller(ctx.clone(), config),
                run_doks_control_plane_controller(ctx.clone(), config),
                run_doks_node_pool_controller(ctx.clone(), config),
            );
        } else {
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        () = run_docluster_controller(ctx.clone(), config) => {
            anyhow::bail!("DOCluster controller exited unexpectedly")
        }
        () = run_domachine_controller(ctx.clone(), config) => {
            anyhow::bail!("DOMachine controller exited unexpectedly")
        }
        () = doks => {
            anyhow::bail!("DOKS controllers exited unexpectedly")
        }
    }
}

fn api<K>(client: &Client, namespace: Option<&str>) -> Api<K>
where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>,
{
    match namespace {
        Some(ns) => Api::namespaced(client.clone(), ns),
        None => Api::all(client.clone()),
    }
}

fn controller_config(config: &Config) -> controller::Config {
    controller::Config::default().concurrency(config.concurrency)
}

/// Object named by a reference, if it is of kind `K`.
fn referenced<K>(reference: Option<&ObjectReference>, namespace: Option<String>) -> Option<ObjectRef<K>>
where
    K: Resource<DynamicType = ()>,
{
    let reference = reference?;
    if reference.kind.as_deref() != Some(K::kind(&()).as_ref()) {
        return None;
    }
    let name = reference.name.as_deref()?;
    let namespace = reference.namespace.clone().or(namespace)?;
    Some(ObjectRef::new(name).within(&namespace))
}

/// Cached objects labelled with the same cluster as `meta`.
fn same_cluster<K>(store: &Store<K>, meta: &ObjectMeta) -> Vec<ObjectRef<K>>
where
    K: Resource<DynamicType = ()> + Clone + 'static,
{
    let Some(cluster) = meta.labels.as_ref().and_then(|l| l.get(CLUSTER_NAME_LABEL)) else {
        return Vec::new();
    };
    store
        .state()
        .into_iter()
        .filter(|obj| obj.meta().namespace == meta.namespace)
        .filter(|obj| obj.labels().get(CLUSTER_NAME_LABEL) == Some(cluster))
        .map(|obj| ObjectRef::from_obj(obj.as_ref()))
        .collect()
}

/// Run the `DOCluster` controller
async fn run_docluster_controller(ctx: Arc<Context>, config: &Config) {
    info!("Starting DOCluster controller");
    let client = ctx.client.clone();
    let ns = config.namespace.as_deref();

    Controller::new(api::<DOCluster>(&client, ns), watcher::Config::default())
        .with_config(controller_config(config))
        .watches(api::<Cluster>(&client, ns), watcher::Config::default(), |cluster| {
            referenced::<DOCluster>(cluster.spec.infrastructure_ref.as_ref(), cluster.namespace())
        })
        .run(reconcile_docluster_wrapper, error_policy, ctx)
        .for_each(log_result)
        .await;
}

/// Run the `DOMachine` controller
async fn run_domachine_controller(ctx: Arc<Context>, config: &Config) {
    info!("Starting DOMachine controller");
    let client = ctx.client.clone();
    let ns = config.namespace.as_deref();

    let controller = Controller::new(api::<DOMachine>(&client, ns), watcher::Config::default())
        .with_config(controller_config(config));
    let store = controller.store();
    controller
        .watches(api::<Machine>(&client, ns), watcher::Config::default(), |machine| {
            referenced::<DOMachine>(Some(&machine.spec.infrastructure_ref), machine.namespace())
        })
        .watches(api::<DOCluster>(&client, ns), watcher::Config::default(), move |do_cluster| {
            same_cluster(&store, &do_cluster.metadata)
        })
        .run(reconcile_domachine_wrapper, error_policy, ctx)
        .for_each(log_result)
        .await;
}

/// Run the `DOKSCluster` controller
async fn run_doks_cluster_controller(ctx: Arc<Context>, config: &Config) {
    info!("Starting DOKSCluster controller");
    let client = ctx.client.clone();
    let ns = config.namespace.as_deref();

    Controller::new(api::<DOKSCluster>(&client, ns), watcher::Config::default())
        .with_config(controller_config(config))
        .watches(api::<Cluster>(&client, ns), watcher::Config::default(), |cluster| {
            referenced::<DOKSCluster>(cluster.spec.infrastructure_ref.as_ref(), cluster.namespace())
        })
        .run(reconcile_doks_cluster_wrapper, error_policy, ctx)
        .for_each(log_result)
        .await;
}

/// Run the `DOKSControlPlane` controller
async fn run_doks_control_plane_controller(ctx: Arc<Context>, config: &Config) {
    info!("Starting DOKSControlPlane controller");
    let client = ctx.client.clone();
    let ns = config.namespace.as_deref();

    let controller =
        Controller::new(api::<DOKSControlPlane>(&client, ns), watcher::Config::default())
            .with_config(controller_config(config));
    let store = controller.store();
    controller
        .watches(api::<Cluster>(&client, ns), watcher::Config::default(), |cluster| {
            referenced::<DOKSControlPlane>(cluster.spec.control_plane_ref.as_ref(), cluster.namespace())
        })
        .watches(api::<DOKSCluster>(&client, ns), watcher::Config::default(), move |doks| {
            same_cluster(&store, &doks.metadata)
        })
        .run(reconcile_doks_control_plane_wrapper, error_policy, ctx)
        .for_each(log_result)
        .await;
}

/// Run the `DOKSNodePool` controller
async fn run_doks_node_pool_controller(ctx: Arc<Context>, config: &Config) {
    info!("Starting DOKSNodePool controller");
    let client = ctx.client.clone();
    let ns = config.namespace.as_deref();

    let controller = Controller::new(api::<DOKSNodePool>(&client, ns), watcher::Config::default())
        .with_config(controller_config(config));
    let store = controller.store();
    controller
        .watches(api::<DOKSCluster>(&client, ns), watcher::Config::default(), move |doks| {
            same_cluster(&store, &doks.metadata)
        })
        .run(reconcile_doks_node_pool_wrapper, error_policy, ctx)
        .for_each(log_result)
        .await;
}

async fn log_result<K, E>(result: Result<(ObjectRef<K>, Action), E>)
where
    K: Resource<DynamicType = ()>,
    E: Debug,
{
    match result {
        Ok((obj, action)) => debug!(object = %obj, action = ?action, "Reconciled"),
        Err(e) => debug!(error = ?e, "Reconcile failed"),
    }
}

/// Key of an object in the error backoff.
fn backoff_key<K: Resource<DynamicType = ()>>(obj: &K) -> String {
    format!(
        "{}/{}/{}",
        K::kind(&()),
        obj.namespace().unwrap_or_default(),
        obj.name_any()
    )
}

/// Bound a reconcile by the timeout and record its outcome.
async fn instrumented<K, Fut>(obj: &K, ctx: &Context, reconcile: Fut) -> Result<Action, ReconcileError>
where
    K: Resource<DynamicType = ()>,
    Fut: Future<Output = Result<Outcome, ReconcileError>>,
{
    let kind = K::kind(&());
    let timeout = ctx.settings.reconcile_timeout;
    let start = Instant::now();

    let result = tokio::time::timeout(timeout, reconcile)
        .await
        .unwrap_or(Err(ReconcileError::Timeout(timeout)));

    match result {
        Ok(outcome) => {
            ctx.backoff.reset(&backoff_key(obj));
            metrics::record_reconciliation_success(&kind, start.elapsed());
            let reason = if outcome.is_requeue() { "pending" } else { "resync" };
            metrics::record_reconciliation_requeue(&kind, reason);
            debug!(kind = %kind, name = %obj.name_any(), outcome = ?outcome, "Successfully reconciled");
            Ok(outcome.into_action(ctx.settings.sync_period))
        }
        Err(e) => {
            metrics::record_reconciliation_error(&kind, start.elapsed());
            metrics::record_error(&kind, e.metric_label());
            error!(kind = %kind, namespace = ?obj.namespace(), name = %obj.name_any(), error = %e, "Failed to reconcile");
            Err(e)
        }
    }
}

async fn reconcile_docluster_wrapper(
    obj: Arc<DOCluster>,
    ctx: Arc<Context>,
) -> Result<Action, ReconcileError> {
    instrumented(obj.as_ref(), &ctx, reconcile_docluster(ctx.clone(), obj.clone())).await
}

async fn reconcile_domachine_wrapper(
    obj: Arc<DOMachine>,
    ctx: Arc<Context>,
) -> Result<Action, ReconcileError> {
    instrumented(obj.as_ref(), &ctx, reconcile_domachine(ctx.clone(), obj.clone())).await
}

async fn reconcile_doks_cluster_wrapper(
    obj: Arc<DOKSCluster>,
    ctx: Arc<Context>,
) -> Result<Action, ReconcileError> {
    instrumented(obj.as_ref(), &ctx, reconcile_doks_cluster(ctx.clone(), obj.clone())).await
}

async fn reconcile_doks_control_plane_wrapper(
    obj: Arc<DOKSControlPlane>,
    ctx: Arc<Context>,
) -> Result<Action, ReconcileError> {
    instrumented(obj.as_ref(), &ctx, reconcile_doks_control_plane(ctx.clone(), obj.clone())).await
}

async fn reconcile_doks_node_pool_wrapper(
    obj: Arc<DOKSNodePool>,
    ctx: Arc<Context>,
) -> Result<Action, ReconcileError> {
    instrumented(obj.as_ref(), &ctx, reconcile_doks_node_pool(ctx.clone(), obj.clone())).await
}

/// Error policy shared by every controller.
///
/// Throttled cloud calls get a short jittered requeue, everything else backs
/// off exponentially per object.
fn error_policy<K>(obj: Arc<K>, err: &ReconcileError, ctx: Arc<Context>) -> Action
where
    K: Resource<DynamicType = ()>,
{
    let kind = K::kind(&());
    if err.is_throttled() {
        metrics::record_reconciliation_requeue(&kind, "throttled");
        return Action::requeue(throttled_requeue());
    }
    let key = backoff_key(obj.as_ref());
    let delay = ctx.backoff.next_delay(&key);
    metrics::record_reconciliation_requeue(&kind, "error");
    debug!(
        key = %key,
        failures = ctx.backoff.failures(&key),
        tracked = ctx.backoff.tracked(),
        delay = ?delay,
        "Requeueing after error"
    );
    Action::requeue(delay)
}

/// Serve `/healthz` and `/readyz`.
async fn serve_health(addr: SocketAddr, ready: Arc<AtomicBool>) {
    let app = health_router(ready);
    info!(addr = %addr, "Starting health probe server");
    let result = async {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await
    }
    .await;
    if let Err(e) = result {
        error!(addr = %addr, error = %e, "Health probe server stopped");
    }
}

fn health_router(ready: Arc<AtomicBool>) -> Router {
    Router::new()
        .route("/healthz", get(|| async { (StatusCode::OK, "ok") }))
        .route("/readyz", get(readiness_handler))
        .with_state(ready)
}

async fn readiness_handler(State(ready): State<Arc<AtomicBool>>) -> impl IntoResponse {
    if ready.load(Ordering::SeqCst) {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "starting")
    }
}

/// Serve Prometheus metrics on `/metrics`.
async fn serve_metrics(addr: SocketAddr) {
    let app = Router::new().route("/metrics", get(metrics_handler));
    info!(addr = %addr, "Starting metrics server");
    let result = async {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await
    }
    .await;
    if let Err(e) = result {
        error!(addr = %addr, error = %e, "Metrics server stopped");
    }
}

async fn metrics_handler() -> impl IntoResponse {
    match metrics::gather_metrics() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}
