//! contador CoAP server.
//!
//! - UDP endpoint (default 0.0.0.0:5683), resource `/contador`
//! - GET returns the counter; Observe registrations receive a notification
//!   every `notify_interval_ms`
//! - Ctrl-C / SIGTERM stops the loop and tears the resource down
//!
//! Usage: `contador-server [config.yaml]`

use std::process::ExitCode;

use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use contador_server::{config, run_server_task};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let path = std::env::args().nth(1);
    let cfg = match config::load(path.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!(error = %e, "config load failed");
            return ExitCode::FAILURE;
        }
    };

    let (stop_tx, stop_rx) = watch::channel(false);
    let mut task = tokio::spawn(run_server_task(cfg, stop_rx));

    let result = tokio::select! {
        res = &mut task => res,
        _ = shutdown_signal() => {
            let _ = stop_tx.send(true);
            task.await
        }
    };

    match result {
        Ok(Ok(())) => ExitCode::SUCCESS,
        Ok(Err(e)) => {
            tracing::error!(error = %e, "coap server task terminated");
            ExitCode::FAILURE
        }
        Err(e) => {
            tracing::error!(error = %e, "coap server task panicked");
            ExitCode::FAILURE
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("signal received, stopping coap server");
}
