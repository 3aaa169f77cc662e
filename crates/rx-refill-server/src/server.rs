//! Server lifecycle: bind, serve, sweep reminders, shut down.

use std::net::SocketAddr;
use std::time::Duration;

use chrono::Utc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use rx_refill_core::RefillCore;

use crate::config::ServerConfig;
use crate::router::build_router;
use crate::state::AppState;

/// Handle to a running server.
pub struct RefillServer {
    pub addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    serve_task: JoinHandle<std::io::Result<()>>,
    sweep_task: JoinHandle<()>,
}

impl RefillServer {
    /// Signal graceful shutdown and wait for in-flight requests.
    pub async fn shutdown(mut self) -> std::io::Result<()> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
            tracing::info!("server shutdown signal sent");
        }
        self.sweep_task.abort();
        match self.serve_task.await {
            Ok(result) => result,
            Err(e) => Err(std::io::Error::new(std::io::ErrorKind::Other, e)),
        }
    }
}

/// Bind to `config.bind` and serve in background tasks.
pub async fn start(config: &ServerConfig, core: RefillCore) -> std::io::Result<RefillServer> {
    let listener = TcpListener::bind(config.bind).await?;
    let addr = listener.local_addr()?;

    let state = AppState::new(core);
    let sweep_task = spawn_reminder_sweep(state.core.clone(), config.reminder_sweep_interval);
    let app = build_router(state);

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let serve_task = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    tracing::info!(%addr, "rx-refill server listening");
    Ok(RefillServer {
        addr,
        shutdown_tx: Some(shutdown_tx),
        serve_task,
        sweep_task,
    })
}

/// Run the reminder sweep every `interval`, starting immediately.
fn spawn_reminder_sweep(core: RefillCore, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let core = core.clone();
            let today = Utc::now().date_naive();
            // SQLite work stays off the async workers
            match tokio::task::spawn_blocking(move || core.run_reminder_sweep(today)).await {
                Ok(Ok(summary)) => tracing::debug!(sent = summary.sent, "reminder sweep tick"),
                Ok(Err(e)) => tracing::error!(error = %e, "reminder sweep failed"),
                Err(e) => tracing::error!(error = %e, "reminder sweep task panicked"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn start_and_shutdown() {
        let config = ServerConfig {
            bind: SocketAddr::from(([127, 0, 0, 1], 0)),
            ..ServerConfig::default()
        };
        let server = start(&config, RefillCore::open_in_memory().unwrap())
            .await
            .unwrap();
        assert_ne!(server.addr.port(), 0);
        server.shutdown().await.unwrap();
    }
}
