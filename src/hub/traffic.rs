//! Traffic streaming endpoint
//!
//! One JSON object per second with the up/down byte delta of that second.

use super::AppState;
use crate::statistic::TrafficSampler;
use axum::body::Body;
use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use bytes::Bytes;
use serde_json::json;
use std::convert::Infallible;
use std::time::Duration;

/// GET /traffic - chunked stream of `{"up":n,"down":n}` lines.
///
/// Each caller gets its own sampler, so concurrent streams report full rates.
pub async fn traffic_stream(State(state): State<AppState>) -> impl IntoResponse {
    let sampler = TrafficSampler::new(state.tunnel.traffic().clone());
    let ticker = tokio::time::interval(Duration::from_secs(1));

    let stream = futures::stream::unfold((sampler, ticker), |(mut sampler, mut ticker)| async move {
        ticker.tick().await;
        let (up, down) = sampler.delta();
        let mut line = serde_json::to_vec(&json!({ "up": up, "down": down })).ok()?;
        line.push(b'\n');
        Some((Ok::<_, Infallible>(Bytes::from(line)), (sampler, ticker)))
    });

    (
        [(header::CONTENT_TYPE, "application/json")],
        Body::from_stream(stream),
    )
}
