//! `POST /api/chat`.

use crate::models::{ChatRequest, ChatResponse};
use crate::startup::AppState;
use axum::{
    extract::{rejection::JsonRejection, ConnectInfo, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use service_core::middleware::tracing::RequestId;
use std::any::Any;
use std::net::SocketAddr;

const FORWARDED_FOR: &str = "x-forwarded-for";

/// Caller address: first `X-Forwarded-For` hop, then the socket peer.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    headers
        .get(FORWARDED_FOR)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .or_else(|| peer.map(|p| p.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

/// Send a message to the bot and return its replies.
pub async fn chat_with_bot(
    State(state): State<AppState>,
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    request_id: Option<Extension<RequestId>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Response {
    let request_id = request_id
        .map(|Extension(RequestId(id))| id)
        .unwrap_or_else(|| "-".to_string());

    let Json(request) = match payload {
        Ok(json) => json,
        Err(rejection) => {
            tracing::debug!(request_id = %request_id, error = %rejection, "Rejected chat payload");
            return (
                StatusCode::BAD_REQUEST,
                Json(ChatResponse::rejected("No JSON data received")),
            )
                .into_response();
        }
    };

    let ip = client_ip(&headers, peer.map(|ConnectInfo(addr)| addr));
    tracing::info!(request_id = %request_id, client_ip = %ip, "Chat request received");

    match state.relay.handle(&request, &state.sender_resolver, &ip).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(rejected) => (
            StatusCode::BAD_REQUEST,
            Json(ChatResponse::rejected(rejected.to_string())),
        )
            .into_response(),
    }
}

/// Last-resort 500 in the chat response shape for a panicking handler.
pub fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    tracing::error!(panic = %detail, "Handler panicked");

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ChatResponse::server_error(&detail)),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forwarded_header_wins_over_peer() {
        let mut headers = HeaderMap::new();
        headers.insert(FORWARDED_FOR, "203.0.113.7, 10.0.0.1".parse().unwrap());
        let peer: SocketAddr = "127.0.0.1:4000".parse().unwrap();

        assert_eq!(client_ip(&headers, Some(peer)), "203.0.113.7");
        assert_eq!(client_ip(&HeaderMap::new(), Some(peer)), "127.0.0.1");
        assert_eq!(client_ip(&HeaderMap::new(), None), "unknown");
    }

    #[test]
    fn panic_response_is_500_with_error_fragment() {
        let response = handle_panic(Box::new("boom"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
