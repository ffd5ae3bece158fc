//! Slack request signing.
//!
//! Slack signs every request with `HMAC-SHA256("v0:{timestamp}:{body}", signing_secret)`
//! and sends the result as `X-Slack-Signature: v0=<hex>`. [`SignatureVerifier`]
//! accumulates the MAC over exactly the bytes that are read through its
//! [`TeeReader`], so the bytes handed to the form parser are the bytes that get
//! authenticated.
//!
//! Ordering hazard: [`SignatureVerifier::finalize`] only covers what has been
//! read so far. Finalizing before the body is drained authenticates a prefix,
//! not the request. Callers must drain the reader first and should compare
//! [`SignatureVerifier::bytes_consumed`] against the body length.

use std::io::{self, Read};

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;
use wadjet_core::RequestError;

type HmacSha256 = Hmac<Sha256>;

pub const TIMESTAMP_HEADER: &str = "x-slack-request-timestamp";
pub const SIGNATURE_HEADER: &str = "x-slack-signature";
pub const SIGNATURE_VERSION: &str = "v0";

/// Maximum clock skew accepted between Slack and this server.
pub const DEFAULT_TOLERANCE_SECS: u64 = 300;

const SIGNATURE_LEN: usize = 32;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum VerifyError {
    #[error("missing `{0}` header")]
    MissingHeader(&'static str),
    #[error("malformed signature header: {0}")]
    MalformedSignature(String),
    #[error("malformed timestamp header `{0}`")]
    MalformedTimestamp(String),
    #[error("signing key rejected by hmac")]
    InvalidKey,
    #[error("request timestamp is {skew_secs}s from server time (tolerance {tolerance_secs}s)")]
    StaleTimestamp { skew_secs: u64, tolerance_secs: u64 },
    #[error("signature covers {consumed} of {expected} body bytes")]
    IncompleteBody { consumed: usize, expected: usize },
    #[error("signature does not match request")]
    Mismatch,
}

impl VerifyError {
    /// Header problems are the caller's fault (400); everything that reached
    /// the MAC comparison is an authentication failure (401).
    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            Self::StaleTimestamp { .. } | Self::IncompleteBody { .. } | Self::Mismatch
        )
    }
}

impl From<VerifyError> for RequestError {
    fn from(value: VerifyError) -> Self {
        if value.is_unauthorized() {
            RequestError::unauthorized("signature does not match request")
        } else if matches!(value, VerifyError::InvalidKey) {
            RequestError::internal(value.to_string())
        } else {
            RequestError::bad_request(value.to_string())
        }
    }
}

struct VerificationState {
    mac: HmacSha256,
    expected: Vec<u8>,
    timestamp: i64,
    tolerance_secs: u64,
}

/// Per-request signature check. A verifier built without a secret is disabled
/// and accepts everything.
pub struct SignatureVerifier {
    state: Option<VerificationState>,
    consumed: usize,
}

impl SignatureVerifier {
    pub fn disabled() -> Self {
        Self { state: None, consumed: 0 }
    }

    pub fn new(
        secret: Option<&SecretString>,
        timestamp: Option<&str>,
        signature: Option<&str>,
        tolerance_secs: u64,
    ) -> Result<Self, VerifyError> {
        let Some(secret) = secret else {
            return Ok(Self::disabled());
        };

        let timestamp_raw = timestamp.ok_or(VerifyError::MissingHeader(TIMESTAMP_HEADER))?;
        let signature_raw = signature.ok_or(VerifyError::MissingHeader(SIGNATURE_HEADER))?;

        let timestamp = parse_timestamp(timestamp_raw)?;
        let expected = decode_signature(signature_raw)?;

        let mut mac = HmacSha256::new_from_slice(secret.expose_secret().as_bytes())
            .map_err(|_| VerifyError::InvalidKey)?;
        mac.update(format!("{SIGNATURE_VERSION}:{timestamp}:").as_bytes());

        Ok(Self {
            state: Some(VerificationState { mac, expected, timestamp, tolerance_secs }),
            consumed: 0,
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.state.is_some()
    }

    pub fn bytes_consumed(&self) -> usize {
        self.consumed
    }

    pub fn update(&mut self, bytes: &[u8]) {
        self.consumed += bytes.len();
        if let Some(state) = self.state.as_mut() {
            state.mac.update(bytes);
        }
    }

    /// Wraps `reader` so every byte read through it is also fed to the MAC.
    pub fn tee<R: Read>(&mut self, reader: R) -> TeeReader<'_, R> {
        TeeReader { inner: reader, verifier: self }
    }

    /// Checks the timestamp window and the MAC over everything read so far.
    pub fn finalize(self, now_unix_secs: i64) -> Result<(), VerifyError> {
        let Some(state) = self.state else {
            return Ok(());
        };

        let skew_secs = now_unix_secs.abs_diff(state.timestamp);
        if skew_secs > state.tolerance_secs {
            return Err(VerifyError::StaleTimestamp {
                skew_secs,
                tolerance_secs: state.tolerance_secs,
            });
        }

        let computed = state.mac.finalize().into_bytes();
        if bool::from(computed.as_slice().ct_eq(&state.expected)) {
            Ok(())
        } else {
            Err(VerifyError::Mismatch)
        }
    }

    /// Like [`finalize`](Self::finalize), but first refuses to accept a
    /// verifier that has not seen all `body_len` bytes.
    pub fn finalize_complete(self, body_len: usize, now_unix_secs: i64) -> Result<(), VerifyError> {
        if self.is_enabled() && self.consumed != body_len {
            return Err(VerifyError::IncompleteBody { consumed: self.consumed, expected: body_len });
        }
        self.finalize(now_unix_secs)
    }
}

pub struct TeeReader<'a, R> {
    inner: R,
    verifier: &'a mut SignatureVerifier,
}

impl<R: Read> Read for TeeReader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let read = self.inner.read(buf)?;
        self.verifier.update(&buf[..read]);
        Ok(read)
    }
}

/// Produces the `X-Slack-Signature` value for `body` at `timestamp`.
pub fn sign(secret: &str, timestamp: i64, body: &[u8]) -> Result<String, VerifyError> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| VerifyError::InvalidKey)?;
    mac.update(format!("{SIGNATURE_VERSION}:{timestamp}:").as_bytes());
    mac.update(body);
    Ok(format!("{SIGNATURE_VERSION}={}", hex::encode(mac.finalize().into_bytes())))
}

fn parse_timestamp(raw: &str) -> Result<i64, VerifyError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.len() > 20 {
        return Err(VerifyError::MalformedTimestamp(raw.to_owned()));
    }
    trimmed.parse::<i64>().map_err(|_| VerifyError::MalformedTimestamp(raw.to_owned()))
}

fn decode_signature(raw: &str) -> Result<Vec<u8>, VerifyError> {
    let Some(encoded) = raw.trim().strip_prefix("v0=") else {
        return Err(VerifyError::MalformedSignature(format!(
            "expected `{SIGNATURE_VERSION}=<hex>`"
        )));
    };

    let decoded =
        hex::decode(encoded).map_err(|error| VerifyError::MalformedSignature(error.to_string()))?;
    if decoded.len() != SIGNATURE_LEN {
        return Err(VerifyError::MalformedSignature(format!(
            "expected {SIGNATURE_LEN} signature bytes, got {}",
            decoded.len()
        )));
    }

    Ok(decoded)
}
