//! Log streaming endpoint
//!
//! Subscribes the caller to the tunnel's log bus, filtered to a minimum
//! severity. The subscription is released when the caller goes away.

use super::common::{ApiError, ApiResult};
use super::AppState;
use crate::tunnel::LogLevel;
use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use bytes::Bytes;
use serde::Deserialize;
use std::convert::Infallible;

#[derive(Debug, Default, Deserialize)]
pub struct LogParams {
    pub level: Option<String>,
}

/// GET /logs?level= - chunked stream of `{"type":level,"payload":msg}` lines
pub async fn logs_stream(
    Query(params): Query<LogParams>,
    State(state): State<AppState>,
) -> ApiResult<impl IntoResponse> {
    let level = match params.level.as_deref() {
        None | Some("") => LogLevel::Info,
        Some(s) => s
            .parse()
            .map_err(|_| ApiError::bad_request(format!("invalid log level: {}", s)))?,
    };

    let sub = state
        .tunnel
        .log()
        .subscribe()
        .map_err(|e| ApiError::internal(e.to_string()))?;

    let stream = futures::stream::unfold((sub, level), |(mut sub, level)| async move {
        loop {
            let event = sub.recv().await?;
            if event.level < level {
                continue;
            }
            let mut line = serde_json::to_vec(&event).ok()?;
            line.push(b'\n');
            return Some((Ok::<_, Infallible>(Bytes::from(line)), (sub, level)));
        }
    });

    Ok((
        [(header::CONTENT_TYPE, "application/json")],
        Body::from_stream(stream),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_level_is_info() {
        let params = LogParams::default();
        assert!(params.level.is_none());
        // handler maps a missing level to Info
        assert_eq!("info".parse::<LogLevel>().unwrap(), LogLevel::Info);
    }

    #[test]
    fn test_unknown_level_is_rejected() {
        assert!("loud".parse::<LogLevel>().is_err());
    }
}
