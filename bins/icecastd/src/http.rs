use crate::icy::IcyInterleaver;
use crate::mux::ProducerMux;
use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use bytes::Bytes;
use icecast_stream::Broadcaster;
use std::convert::Infallible;
use std::sync::Arc;
use tokio_stream::StreamExt;
use tracing::info;

/// Listener-egress configuration relevant to the HTTP surface, trimmed
/// down from `icecast_config::MetadataConfig`/`ServerConfig`.
#[derive(Clone)]
pub struct ListenerHttpConfig {
    pub mount_point: String,
    pub enable_icy: bool,
    pub icy_metaint: usize,
}

#[derive(Clone)]
struct AppState {
    broadcaster: Arc<Broadcaster>,
    mux: Arc<ProducerMux>,
    config: ListenerHttpConfig,
}

/// Builds the axum router exposing exactly one route: `GET <mount_point>`.
///
/// Any other path is someone else's concern (§1's status/stats endpoints
/// are explicitly out of scope here) and falls through to axum's default
/// 404.
#[must_use]
pub fn router(broadcaster: Arc<Broadcaster>, mux: Arc<ProducerMux>, config: ListenerHttpConfig) -> Router {
    let mount_point = config.mount_point.clone();
    let state = AppState {
        broadcaster,
        mux,
        config,
    };
    Router::new()
        .route(&mount_point, get(stream_handler))
        .with_state(state)
}

async fn stream_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let (guard, receiver_stream) = match state.broadcaster.register_stream(None) {
        Ok(pair) => pair,
        Err(err) => {
            return (StatusCode::SERVICE_UNAVAILABLE, err.to_string()).into_response();
        }
    };
    info!("listener connected");

    let client_wants_icy = headers
        .get("Icy-MetaData")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim() == "1")
        .unwrap_or(false);
    let icy_active = state.config.enable_icy && client_wants_icy;

    let mut icy = icy_active.then(|| IcyInterleaver::new(state.config.icy_metaint));
    let mux = Arc::clone(&state.mux);
    let stream = receiver_stream.map(move |chunk: Bytes| {
        let _keep_listener_registered = &guard;
        let payload = match &mut icy {
            Some(interleaver) => {
                interleaver.set_metadata(&mux.title());
                interleaver.interleave(&chunk)
            }
            None => chunk,
        };
        Ok::<Bytes, Infallible>(payload)
    });

    let mut response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "audio/mpeg");
    if icy_active {
        response = response.header("icy-metaint", state.config.icy_metaint.to_string());
    }

    response
        .body(Body::from_stream(stream))
        .expect("response built from static headers and a streaming body cannot fail")
}
