use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::error;
use wadjet_core::RequestError;
use wadjet_slack::SlashResponse;

const JSON_CONTENT_TYPE: &str = "application/json";

/// Error body written for every failed request.
#[derive(Debug, Serialize)]
pub struct ErrorBody<'a> {
    pub code: u16,
    pub error: &'a str,
}

/// Serializes `value` as the response body. A value that cannot be encoded
/// becomes a 500 error body instead.
pub fn json<T: Serialize>(status: StatusCode, value: &T) -> Response {
    match serde_json::to_vec(value) {
        Ok(body) => json_bytes(status, body),
        Err(source) => {
            error!(
                event_name = "http.response.encode_failed",
                error = %source,
                "could not encode response body"
            );
            let message = format!("unable to encode response: {source}");
            let fallback = serde_json::to_vec(&ErrorBody { code: 500, error: &message })
                .unwrap_or_else(|_| br#"{"code":500,"error":"unable to encode response"}"#.to_vec());
            json_bytes(StatusCode::INTERNAL_SERVER_ERROR, fallback)
        }
    }
}

fn json_bytes(status: StatusCode, body: Vec<u8>) -> Response {
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
    response
}

pub fn error(error: &RequestError) -> Response {
    let status =
        StatusCode::from_u16(error.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    json(status, &ErrorBody { code: status.as_u16(), error: error.message() })
}

/// Success with nothing to say: 200 and no body.
pub fn empty() -> Response {
    StatusCode::OK.into_response()
}

pub fn slash(response: SlashResponse) -> Response {
    match response {
        SlashResponse::Empty => empty(),
        SlashResponse::Reply(reply) => json(StatusCode::OK, &reply),
        SlashResponse::Error(request_error) => error(&request_error),
    }
}

/// Method fallback for routes that only accept `POST`.
pub async fn post_only() -> Response {
    let mut response = error(&RequestError::with_status(405, "method not allowed"));
    response.headers_mut().insert(header::ALLOW, HeaderValue::from_static("POST"));
    response
}
