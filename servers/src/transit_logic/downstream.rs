use crate::transit_logic::config::Settings;
use crate::transit_logic::model::{ServerMessage, StatusReport};
use crate::transit_logic::state::AppState;
use anyhow::{Context, Result};
use axum::{
    Json, Router,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
};
use lib_common::core::Latest;
use std::net::SocketAddr;
use tower_http::cors::CorsLayer;

const INDEX_HTML: &str = include_str!("index.html");

pub fn router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/api/vehicle_positions", get(vehicle_positions_handler))
        .route("/api/status", get(status_handler))
        .route("/ws", get(ws_handler))
        .route("/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .with_state(app_state)
}

pub async fn run(settings: Settings, app_state: AppState) -> Result<()> {
    let shutdown = app_state.shutdown.clone();
    let result = serve(settings, app_state).await;
    if result.is_err() {
        // Nothing left to serve clients, stop the poller too
        shutdown.cancel();
    }
    result
}

async fn serve(settings: Settings, app_state: AppState) -> Result<()> {
    let shutdown = app_state.shutdown.clone();
    let app = router(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], settings.port));
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    log::info!("Downstream server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.cancelled().await;
            log::info!("Downstream server shutting down.");
        })
        .await?;
    Ok(())
}

async fn index_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn vehicle_positions_handler(State(state): State<AppState>) -> Response {
    match state.store.latest() {
        latest @ Latest::Ready(_) => (StatusCode::OK, Json(latest)).into_response(),
        Latest::NoDataYet => (StatusCode::SERVICE_UNAVAILABLE, Json(Latest::NoDataYet)).into_response(),
    }
}

async fn status_handler(State(state): State<AppState>) -> Json<StatusReport> {
    Json(StatusReport {
        poll: state.stats.view(),
        subscribers: state.subscriber_count(),
        sequence: state.store.sequence(),
    })
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn handle_socket(mut socket: WebSocket, state: AppState) {
    let mut subscription = state.distributor.subscribe();
    let client_id = subscription.id();
    log::info!("Client {} connected", client_id);

    loop {
        tokio::select! {
            _ = state.shutdown.cancelled() => break,
            pushed = subscription.recv() => {
                // None once the distributor dropped this client
                let Some(snapshot) = pushed else { break };
                match serde_json::to_string(&ServerMessage::vehicle_update(&snapshot)) {
                    Ok(json_str) => {
                        if socket.send(Message::Text(json_str.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => log::error!("Failed to encode snapshot {}: {}", snapshot.sequence, e),
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    // Inbound frames carry no commands
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    state.distributor.unsubscribe(client_id);
    log::info!("Client {} disconnected", client_id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use chrono::{TimeZone, Utc};
    use futures_util::StreamExt;
    use lib_common::core::{Snapshot, VehicleRecord};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio_tungstenite::{connect_async, tungstenite};
    use tokio_util::sync::CancellationToken;
    use tower::ServiceExt;

    fn app_state() -> AppState {
        AppState::new(4, CancellationToken::new())
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null))
    }

    #[tokio::test]
    async fn pull_reports_no_data_before_first_install() {
        let (status, body) = get(router(app_state()), "/api/vehicle_positions").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body, serde_json::json!({ "status": "no-data-yet" }));
    }

    #[tokio::test]
    async fn pull_returns_the_installed_snapshot() {
        let state = app_state();
        let fetched_at = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        state.store.replace(Arc::new(Snapshot::new(
            vec![VehicleRecord::new("v1", 28.6, 77.2)],
            1,
            fetched_at,
            None,
        )));

        let (status, body) = get(router(state.clone()), "/api/vehicle_positions").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["sequence"], 1);
        assert_eq!(body["records"][0]["id"], "v1");

        // Repeated reads without an install are identical
        let (_, again) = get(router(state), "/api/vehicle_positions").await;
        assert_eq!(body, again);
    }

    #[tokio::test]
    async fn status_counts_subscribers() {
        let state = app_state();
        let _subscription = state.distributor.subscribe();
        let (status, body) = get(router(state), "/api/status").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["subscribers"], 1);
        assert_eq!(body["sequence"], 0);
        assert_eq!(body["poll"]["installed"], 0);
    }

    #[tokio::test]
    async fn health_and_index_respond() {
        let app = router(app_state());
        let response = app
            .clone()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"OK");

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    async fn next_frame<S>(ws: &mut S) -> serde_json::Value
    where
        S: futures_util::Stream<Item = Result<tungstenite::Message, tungstenite::Error>> + Unpin,
    {
        loop {
            let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
                .await
                .expect("no frame within 5s")
                .expect("socket closed")
                .unwrap();
            if let tungstenite::Message::Text(text) = msg {
                return serde_json::from_str(text.as_str()).unwrap();
            }
        }
    }

    #[tokio::test]
    async fn websocket_client_gets_catch_up_then_pushes_and_is_removed_on_close() {
        let state = app_state();
        state.store.replace(Arc::new(Snapshot::new(
            vec![VehicleRecord::new("v1", 28.6, 77.2)],
            1,
            Utc::now(),
            None,
        )));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = router(state.clone());
        tokio::spawn(async move { axum::serve(listener, app).await });

        let (mut ws, _) = connect_async(format!("ws://{}/ws", addr)).await.unwrap();

        let first = next_frame(&mut ws).await;
        assert_eq!(first["type"], "vehicle_update");
        assert_eq!(first["sequence"], 1);
        assert_eq!(first["records"][0]["id"], "v1");
        assert_eq!(state.subscriber_count(), 1);

        let next = Arc::new(Snapshot::new(vec![VehicleRecord::new("v2", 1.0, 2.0)], 2, Utc::now(), None));
        state.store.replace(Arc::clone(&next));
        assert_eq!(state.distributor.on_snapshot_changed(&next), 1);
        let pushed = next_frame(&mut ws).await;
        assert_eq!(pushed["sequence"], 2);

        ws.close(None).await.unwrap();
        for _ in 0..100 {
            if state.subscriber_count() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(state.subscriber_count(), 0);
    }

    #[test]
    fn push_frame_flattens_the_snapshot() {
        let snapshot = Snapshot::new(vec![VehicleRecord::new("v1", 1.0, 2.0)], 3, Utc::now(), None);
        let value = serde_json::to_value(ServerMessage::vehicle_update(&snapshot)).unwrap();
        assert_eq!(value["type"], "vehicle_update");
        assert_eq!(value["sequence"], 3);
        assert_eq!(value["records"][0]["lat"], 1.0);
    }
}
