use tokio_util::sync::CancellationToken;
use tracing::info;

/// Ожидает SIGTERM или SIGINT и отменяет корневой токен процесса.
/// Все воркеры и серверы завершаются по этому токену.
pub async fn cancel_on_signal(root: CancellationToken) {
    wait_for_signal().await;
    info!("shutdown signal received");
    root.cancel();
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
