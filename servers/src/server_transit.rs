use anyhow::Result;
use tokio::signal;
use tokio_util::sync::CancellationToken;

mod transit_logic;
use transit_logic::{config, downstream, logger, state, upstream};

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is not an error
    let _ = dotenvy::dotenv();

    let settings = config::load_config()?;
    logger::setup_logging(&settings.log_dir, &settings.log_level)?;
    log::info!(
        "Polling {} every {:?} (fetch timeout {:?})",
        settings.feed_url,
        settings.poller.poll_interval,
        settings.poller.fetch_timeout
    );

    let shutdown = CancellationToken::new();
    let app_state = state::AppState::new(settings.outbox_capacity, shutdown.clone());
    let poller = upstream::build_poller(&settings, &app_state)?;

    let upstream_handle = tokio::spawn(upstream::run(poller, app_state.clone()));
    let downstream_handle = tokio::spawn(downstream::run(settings.clone(), app_state.clone()));

    // Wait for shutdown signal
    tokio::select! {
        _ = signal::ctrl_c() => {
            log::info!("Ctrl-C received, initiating shutdown.");
        }
        _ = terminate() => {
            log::info!("SIGTERM received, initiating shutdown.");
        }
        _ = shutdown.cancelled() => {}
    }

    shutdown.cancel();

    let (upstream_result, downstream_result) = tokio::join!(upstream_handle, downstream_handle);
    if let Err(e) = upstream_result {
        log::error!("Upstream task failed: {}", e);
    }
    match downstream_result {
        Ok(Err(e)) => log::error!("Downstream server failed: {:#}", e),
        Err(e) => log::error!("Downstream task failed: {}", e),
        Ok(Ok(())) => {}
    }

    log::info!("Shutdown complete.");
    Ok(())
}

async fn terminate() {
    #[cfg(unix)]
    {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut term_signal) => {
                term_signal.recv().await;
            }
            Err(e) => {
                log::warn!("Could not install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        // On non-unix platforms, just wait forever.
        std::future::pending::<()>().await;
    }
}
