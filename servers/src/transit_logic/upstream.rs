use crate::transit_logic::config::Settings;
use crate::transit_logic::state::AppState;
use anyhow::{Context, Result};
use lib_common::ingestors::Poller;
use lib_common::retrieve::ClientOptions;
use lib_common::transit::{GtfsRealtimeDecoder, HttpFeedSource};
use std::sync::Arc;

/// Wires the HTTP feed source and the GTFS-Realtime decoder to the shared
/// store, distributor and counters of `app_state`.
pub fn build_poller(settings: &Settings, app_state: &AppState) -> Result<Poller> {
    let options = ClientOptions {
        timeout: settings.poller.fetch_timeout,
        max_retries: settings.fetch_retries,
        ..ClientOptions::default()
    };
    let source = HttpFeedSource::new(&settings.feed_url, settings.api_key.clone(), &options)
        .with_context(|| format!("invalid feed URL {}", settings.feed_url))?;

    Ok(Poller::new(
        settings.poller,
        Arc::new(source),
        Arc::new(GtfsRealtimeDecoder),
        Arc::clone(&app_state.store),
        Arc::clone(&app_state.distributor),
        Arc::clone(&app_state.stats),
    ))
}

pub async fn run(poller: Poller, app_state: AppState) {
    poller.run(app_state.shutdown.clone()).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_util::sync::CancellationToken;

    fn settings(feed_url: String) -> Settings {
        Settings {
            port: 0,
            log_dir: "./logs".into(),
            log_level: "info".to_string(),
            feed_url,
            api_key: "k".to_string(),
            poller: lib_common::ingestors::PollerConfig::from_secs(10.0, 2.0).unwrap(),
            fetch_retries: 0,
            outbox_capacity: 4,
        }
    }

    #[tokio::test]
    async fn poller_records_into_the_shared_counters() {
        let app_state = AppState::new(4, CancellationToken::new());
        // A port nobody listens on, so the cycle fails fast
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let settings = settings(format!("http://127.0.0.1:{}/feed.pb", port));
        let mut poller = build_poller(&settings, &app_state).unwrap();

        poller.run_cycle().await;

        let view = app_state.stats.view();
        assert_eq!(view.fetch_failures, 1);
        assert_eq!(view.consecutive_failures, 1);
        assert!(Arc::ptr_eq(&poller.stats(), &app_state.stats));
    }
}
