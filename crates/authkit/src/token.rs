//! MFA token sources.

use crate::error::{Error, Result};
use regex::Regex;
use std::sync::LazyLock;

static TOKEN_FORMAT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{6}$").expect("valid token regex"));

/// Whether `token` is a well-formed 6-digit time-based code.
pub fn is_valid_token(token: &str) -> bool {
    TOKEN_FORMAT.is_match(token)
}

/// Source of MFA tokens.
///
/// Interactive sources block until the operator answers.
pub trait TokenSource {
    /// Produce a token for the given prompt.
    fn next_token(&mut self, prompt: &str) -> Result<String>;

    /// Whether asking again after a malformed token can give a different answer.
    fn can_retry(&self) -> bool {
        true
    }
}

/// A token supplied out of band (flag or environment variable).
#[derive(Debug, Clone)]
pub struct StaticToken {
    token: String,
}

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Result<Self> {
        let token = token.into();
        if !is_valid_token(&token) {
            return Err(Error::InvalidToken);
        }
        Ok(Self { token })
    }
}

impl TokenSource for StaticToken {
    fn next_token(&mut self, _prompt: &str) -> Result<String> {
        Ok(self.token.clone())
    }

    fn can_retry(&self) -> bool {
        false
    }
}

/// Used when no MFA token can be supplied.
pub struct NoToken;

impl TokenSource for NoToken {
    fn next_token(&mut self, _prompt: &str) -> Result<String> {
        Err(Error::Prompt("no MFA token source available".to_string()))
    }

    fn can_retry(&self) -> bool {
        false
    }
}
