use std::collections::BTreeMap;
use std::io::{self, Read};

use serde::Deserialize;
use thiserror::Error;
use wadjet_core::RequestError;

pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// A slash command invocation as posted by Slack.
///
/// `command` and `text` are required; every other form field (`user_id`,
/// `channel_id`, `response_url`, ...) is kept verbatim in `metadata`.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct SlashCommand {
    pub command: String,
    pub text: String,
    #[serde(flatten)]
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("could not read request body: {0}")]
    Read(#[source] io::Error),
    #[error("request body is not valid UTF-8")]
    InvalidUtf8,
    #[error("malformed form body: {0}")]
    Form(String),
    #[error("required field `{0}` is empty")]
    EmptyField(&'static str),
    #[error("unsupported content type `{0}`")]
    ContentType(String),
}

impl From<PayloadError> for RequestError {
    fn from(_: PayloadError) -> Self {
        RequestError::bad_request("invalid slash request")
    }
}

impl SlashCommand {
    /// Reads `reader` to the end and parses it as a form body. The reader may
    /// be a signature tee; this function does not care.
    pub fn parse<R: Read>(mut reader: R) -> Result<Self, PayloadError> {
        let mut body = Vec::new();
        reader.read_to_end(&mut body).map_err(PayloadError::Read)?;
        Self::from_form(&body)
    }

    pub fn from_form(body: &[u8]) -> Result<Self, PayloadError> {
        if std::str::from_utf8(body).is_err() {
            return Err(PayloadError::InvalidUtf8);
        }

        let command: Self = serde_urlencoded::from_bytes(body)
            .map_err(|error| PayloadError::Form(error.to_string()))?;
        if command.command.trim().is_empty() {
            return Err(PayloadError::EmptyField("command"));
        }

        Ok(command)
    }

    /// Registry key for this invocation: leading slash stripped, lower-cased.
    pub fn name(&self) -> String {
        normalize_command_name(&self.command)
    }

    pub fn metadata(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    pub fn user_id(&self) -> Option<&str> {
        self.metadata("user_id")
    }

    pub fn user_name(&self) -> Option<&str> {
        self.metadata("user_name")
    }

    pub fn channel_id(&self) -> Option<&str> {
        self.metadata("channel_id")
    }

    pub fn team_id(&self) -> Option<&str> {
        self.metadata("team_id")
    }

    pub fn response_url(&self) -> Option<&str> {
        self.metadata("response_url")
    }

    pub fn trigger_id(&self) -> Option<&str> {
        self.metadata("trigger_id")
    }
}

pub fn normalize_command_name(raw: &str) -> String {
    let trimmed = raw.trim();
    trimmed.strip_prefix('/').unwrap_or(trimmed).to_ascii_lowercase()
}

/// Accepts a missing content type; rejects anything that is not a form post,
/// including header values that are not text.
pub fn check_content_type(content_type: Option<&[u8]>) -> Result<(), PayloadError> {
    let Some(raw) = content_type else {
        return Ok(());
    };
    let content_type = std::str::from_utf8(raw)
        .map_err(|_| PayloadError::ContentType(String::from_utf8_lossy(raw).into_owned()))?;

    let essence = content_type.split(';').next().unwrap_or_default().trim();
    if essence.eq_ignore_ascii_case(FORM_CONTENT_TYPE) {
        Ok(())
    } else {
        Err(PayloadError::ContentType(content_type.to_owned()))
    }
}
