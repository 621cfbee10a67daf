use tracing::{error, info};
use vacation_rescheduler::components::google_calendar::token::remove_token_file;
use vacation_rescheduler::config::Config;

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};
#[cfg(windows)]
use tokio::signal::windows::{ctrl_break, ctrl_c};

/// Remove a token file that was seeded from the environment
pub fn cleanup(config: &Config) {
    if config.google_token_json.is_none() {
        return;
    }

    let path = &config.token_file;
    match remove_token_file(path) {
        Ok(true) => info!("{} has been successfully deleted.", path.display()),
        Ok(false) => {}
        Err(e) => error!("Failed to delete {}: {}", path.display(), e),
    }
}

/// Platform-specific signal handling implementation
#[cfg(unix)]
pub async fn wait_for_signal() {
    // Handle SIGTERM and SIGINT (Ctrl+C)
    let (mut sigterm, mut sigint) = match (
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
    ) {
        (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
        _ => {
            error!("Failed to install signal handlers");
            return std::future::pending().await;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => {
            info!("Received SIGTERM signal, stopping");
        }
        _ = sigint.recv() => {
            info!("Received SIGINT signal, stopping");
        }
    }
}

/// Platform-specific signal handling implementation
#[cfg(windows)]
pub async fn wait_for_signal() {
    let (mut ctrlc, mut ctrlbreak) = match (ctrl_c(), ctrl_break()) {
        (Ok(ctrlc), Ok(ctrlbreak)) => (ctrlc, ctrlbreak),
        _ => {
            error!("Failed to install signal handlers");
            return std::future::pending().await;
        }
    };

    tokio::select! {
        _ = ctrlc.recv() => {
            info!("Received Ctrl+C signal, stopping");
        }
        _ = ctrlbreak.recv() => {
            info!("Received Ctrl+Break signal, stopping");
        }
    }
}
