//! Shell-style splitting of slash command text.

use thiserror::Error;
use wadjet_core::RequestError;

#[derive(Debug, Error)]
#[error(transparent)]
pub struct TokenizeError(#[from] shell_words::ParseError);

impl From<TokenizeError> for RequestError {
    fn from(value: TokenizeError) -> Self {
        RequestError::bad_request(format!("unable to parse command arguments: {value}"))
    }
}

/// Splits `input` into arguments using POSIX shell quoting rules. A `#` at
/// the start of a word comments out the rest of the line.
pub fn split(input: &str) -> Result<Vec<String>, TokenizeError> {
    Ok(shell_words::split(input)?)
}
