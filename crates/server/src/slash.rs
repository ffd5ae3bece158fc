//! `POST /v1/slack/slash`: the HTTP side of a slash command.
//!
//! Order of checks: headers and verifier, form body (read through the
//! verifier), signature, then argument parsing, lookup and invocation. Each
//! step ends the request on failure and nothing after it runs.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, State},
    http::{header, HeaderMap},
    response::Response,
    routing::post,
    Router,
};
use chrono::Utc;
use secrecy::SecretString;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;
use wadjet_core::{AppConfig, RequestError};
use wadjet_slack::dispatch::{synthesize, Dispatcher, SlashResponse};
use wadjet_slack::payload::{check_content_type, SlashCommand};
use wadjet_slack::signature::{SignatureVerifier, SIGNATURE_HEADER, TIMESTAMP_HEADER};
use wadjet_slack::CommandRegistry;

use crate::respond;

#[derive(Clone)]
pub struct SlashState {
    inner: Arc<SlashSettings>,
}

struct SlashSettings {
    dispatcher: Dispatcher,
    signing_secret: Option<SecretString>,
    tolerance_secs: u64,
}

impl SlashState {
    pub fn new(
        registry: Arc<CommandRegistry>,
        signing_secret: Option<SecretString>,
        tolerance_secs: u64,
        request_timeout: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(SlashSettings {
                dispatcher: Dispatcher::new(registry, request_timeout),
                signing_secret,
                tolerance_secs,
            }),
        }
    }

    pub fn from_config(config: &AppConfig, registry: Arc<CommandRegistry>) -> Self {
        Self::new(
            registry,
            config.slack.signing_secret.clone(),
            config.slack.timestamp_tolerance_secs,
            Duration::from_secs(config.server.request_timeout_secs),
        )
    }
}

pub fn router(path: &str, state: SlashState) -> Router {
    Router::new()
        .route(path, post(handle).fallback(respond::post_only))
        .with_state(state)
}

pub async fn handle(
    State(state): State<SlashState>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let started = Instant::now();

    // Cancels the handler context if the client goes away mid-request.
    let cancellation = CancellationToken::new();
    let _guard = cancellation.clone().drop_guard();

    let response = match read_body(&request_id, body)
        .and_then(|body| authenticate(&state.inner, &headers, &body))
    {
        Ok(slash) => synthesize(state.inner.dispatcher.dispatch(slash, &request_id, cancellation).await),
        Err(error) => SlashResponse::Error(error),
    };

    log_outcome(&request_id, &response, started);
    respond::slash(response)
}

/// An oversized or unreadable body is a malformed request like any other.
fn read_body(request_id: &str, body: Result<Bytes, BytesRejection>) -> Result<Bytes, RequestError> {
    body.map_err(|rejection| {
        debug!(
            event_name = "slash.request.body_rejected",
            correlation_id = %request_id,
            rejection_status = rejection.status().as_u16(),
            error = %rejection.body_text(),
            "could not read request body"
        );
        RequestError::bad_request("invalid slash request")
    })
}

/// Parses the form body through the signature verifier and checks that the
/// MAC covers every byte of it.
fn authenticate(
    settings: &SlashSettings,
    headers: &HeaderMap,
    body: &Bytes,
) -> Result<SlashCommand, RequestError> {
    check_content_type(headers.get(header::CONTENT_TYPE).map(|value| value.as_bytes()))?;

    let mut verifier = SignatureVerifier::new(
        settings.signing_secret.as_ref(),
        header_value(headers, TIMESTAMP_HEADER),
        header_value(headers, SIGNATURE_HEADER),
        settings.tolerance_secs,
    )?;

    let slash = SlashCommand::parse(verifier.tee(body.as_ref()))?;
    verifier.finalize_complete(body.len(), Utc::now().timestamp())?;
    Ok(slash)
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

fn log_outcome(request_id: &str, response: &SlashResponse, started: Instant) {
    let status = response.status_code();
    let elapsed_ms = started.elapsed().as_millis() as u64;

    match response {
        SlashResponse::Error(error) if !error.is_client_error() => warn!(
            event_name = "slash.request.failed",
            correlation_id = %request_id,
            status,
            elapsed_ms,
            error = %error,
            "slash request failed"
        ),
        SlashResponse::Error(error) => info!(
            event_name = "slash.request.rejected",
            correlation_id = %request_id,
            status,
            elapsed_ms,
            error = %error,
            "slash request rejected"
        ),
        _ => info!(
            event_name = "slash.request.completed",
            correlation_id = %request_id,
            status,
            elapsed_ms,
            "slash request completed"
        ),
    }
}
