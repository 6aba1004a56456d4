use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use confd_core::config::ConfdConfig;
use confd_sync::{
    diff_all, ConfigSource, DiffReport, LoadSummary, ProcessHookRunner, Reconciler,
};

use crate::apollo::ApolloClient;
use crate::error::{io_err, DaemonError};

/// Env var selecting the log format; `json` switches to JSON lines.
pub const LOG_FORMAT_ENV: &str = "CONFD_LOG_FORMAT";

fn build(config: &ConfdConfig) -> (Arc<ApolloClient>, Arc<Reconciler>) {
    let client = Arc::new(ApolloClient::new(&config.apollo));
    let reconciler = Arc::new(Reconciler::from_config(
        config,
        client.clone(),
        Arc::new(ProcessHookRunner),
    ));
    (client, reconciler)
}

/// Start the agent and block the current thread until it exits.
pub fn start_blocking(config: ConfdConfig) -> Result<(), DaemonError> {
    init_tracing();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(config))
}

/// Initial load, then poll for changes until ctrl-c.
pub async fn run(config: ConfdConfig) -> Result<(), DaemonError> {
    let (client, reconciler) = build(&config);

    let loader = reconciler.clone();
    let summary = tokio::task::spawn_blocking(move || loader.initial_load())
        .await
        .map_err(|err| DaemonError::Runtime(format!("initial load join error: {err}")))??;
    tracing::info!(
        rendered = summary.rendered,
        changed = summary.changed,
        failed = summary.failed,
        "agent started",
    );

    client.subscribe(reconciler);

    let (shutdown_tx, _) = broadcast::channel::<()>(16);

    let poll_handle = {
        let shutdown = shutdown_tx.clone();
        let client = client.clone();
        let interval = config.apollo.poll_interval();
        tokio::spawn(async move {
            let result = poll_task(client, interval, shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result
        })
    };

    let signal_handle = {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            let mut shutdown_rx = shutdown.subscribe();
            tokio::select! {
                _ = shutdown_rx.recv() => Ok(()),
                signal = tokio::signal::ctrl_c() => {
                    match signal {
                        Ok(()) => {
                            tracing::info!("received ctrl-c, shutting down");
                            let _ = shutdown.send(());
                            Ok(())
                        }
                        Err(err) => Err(DaemonError::Runtime(format!("ctrl-c handler failed: {err}"))),
                    }
                }
            }
        })
    };

    let (poll_result, signal_result) = tokio::join!(poll_handle, signal_handle);
    handle_join("poller", poll_result)?;
    handle_join("signal_handler", signal_result)?;
    Ok(())
}

/// Poll the config service every `interval` until shutdown.
pub async fn poll_task(
    client: Arc<ApolloClient>,
    interval: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    ticker.tick().await; // the initial load already covered t=0

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = ticker.tick() => {
                let client = client.clone();
                let delivered = tokio::task::spawn_blocking(move || client.poll_once())
                    .await
                    .map_err(|err| DaemonError::Runtime(format!("poll join error: {err}")))?;
                tracing::debug!(delivered, "poll complete");
            }
        }
    }
    Ok(())
}

/// Initial load and full render, no hooks, no watching.
pub fn run_once(config: &ConfdConfig) -> Result<LoadSummary, DaemonError> {
    let (_client, reconciler) = build(config);
    Ok(reconciler.initial_load()?)
}

/// Fetch every namespace and diff the in-memory render against disk.
pub fn preview_diff(config: &ConfdConfig) -> Result<DiffReport, DaemonError> {
    let (_client, reconciler) = build(config);
    for namespace in reconciler.namespaces() {
        reconciler.load_namespace(namespace)?;
    }
    Ok(diff_all(&reconciler))
}

fn handle_join(
    task: &str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(DaemonError::Runtime(format!(
            "{task} task join failure: {err}"
        ))),
    }
}

/// Install the global `tracing` subscriber on stderr. `RUST_LOG` filters,
/// default `info`.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var(LOG_FORMAT_ENV).is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let _ = if json {
        fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .try_init()
    } else {
        fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .try_init()
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use confd_core::config::{ApolloConfig, GroupConfig, WatchConfig};
    use tempfile::TempDir;

    fn unreachable_config(out: &TempDir) -> ConfdConfig {
        ConfdConfig {
            apollo: ApolloConfig {
                api: "http://127.0.0.1:1".to_string(),
                app_id: "demo".to_string(),
                cluster: "default".to_string(),
                namespaces: vec!["app".to_string()],
                secret: String::new(),
                poll_interval_secs: 1,
                timeout_secs: 1,
            },
            watch: vec![WatchConfig {
                on_change: String::new(),
                groups: vec![GroupConfig {
                    path: out.path().to_path_buf(),
                    keys: vec!["app:app.conf".to_string()],
                }],
            }],
        }
    }

    #[tokio::test]
    async fn poll_task_stops_on_shutdown() {
        let out = TempDir::new().unwrap();
        let client = Arc::new(ApolloClient::new(&unreachable_config(&out).apollo));
        let (tx, _) = broadcast::channel::<()>(4);
        let rx = tx.subscribe();
        let handle = tokio::spawn(poll_task(client, Duration::from_secs(3600), rx));
        tx.send(()).unwrap();
        handle.await.unwrap().expect("poll task exits cleanly");
    }

    #[tokio::test(start_paused = true)]
    async fn poll_task_survives_failing_polls() {
        let out = TempDir::new().unwrap();
        let client = Arc::new(ApolloClient::new(&unreachable_config(&out).apollo));
        let (tx, _) = broadcast::channel::<()>(4);
        let handle = tokio::spawn(poll_task(client, Duration::from_secs(1), tx.subscribe()));

        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert!(!handle.is_finished(), "failed polls must not end the task");

        tx.send(()).unwrap();
        handle.await.unwrap().unwrap();
    }

    #[test]
    fn once_fails_when_source_unreachable() {
        let out = TempDir::new().unwrap();
        let err = run_once(&unreachable_config(&out)).unwrap_err();
        assert!(matches!(err, DaemonError::Sync(_)), "got: {err}");
        assert!(!out.path().join("app.conf").exists());
    }

    #[tokio::test]
    async fn run_fails_fast_when_initial_load_fails() {
        let out = TempDir::new().unwrap();
        let err = run(unreachable_config(&out)).await.unwrap_err();
        assert!(matches!(err, DaemonError::Sync(_)), "got: {err}");
    }

    #[test]
    fn join_errors_are_reported() {
        assert!(handle_join("x", Ok(Ok(()))).is_ok());
        let err = handle_join("x", Ok(Err(DaemonError::Runtime("boom".into())))).unwrap_err();
        assert!(err.to_string().contains("boom"));
    }
}
