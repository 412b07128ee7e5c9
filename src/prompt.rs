//! Where MFA tokens come from when a session must be minted.

use authkit::{NoToken, StaticToken, TokenSource, is_valid_token};
use dialoguer::Input;
use std::io::IsTerminal;

/// Interactive prompt on the terminal.
pub struct PromptToken;

impl TokenSource for PromptToken {
    fn next_token(&mut self, prompt: &str) -> authkit::Result<String> {
        Input::<String>::new()
            .with_prompt(prompt)
            .validate_with(|input: &String| -> Result<(), &'static str> {
                if is_valid_token(input.trim()) {
                    Ok(())
                } else {
                    Err("MFA token must be exactly 6 digits")
                }
            })
            .interact_text()
            .map(|token| token.trim().to_string())
            .map_err(|e| authkit::Error::Prompt(e.to_string()))
    }
}

/// Token source picked for a run.
pub enum Tokens {
    /// Given with `--mfa-token` or `SGCZAR_MFA_TOKEN`
    Flag(StaticToken),
    Prompt(PromptToken),
    /// No terminal and no flag
    Unavailable(NoToken),
}

impl Tokens {
    pub fn select(flag: Option<&str>) -> authkit::Result<Self> {
        if let Some(token) = flag {
            return Ok(Tokens::Flag(StaticToken::new(token)?));
        }
        if std::io::stdin().is_terminal() {
            Ok(Tokens::Prompt(PromptToken))
        } else {
            Ok(Tokens::Unavailable(NoToken))
        }
    }
}

impl TokenSource for Tokens {
    fn next_token(&mut self, prompt: &str) -> authkit::Result<String> {
        match self {
            Tokens::Flag(source) => source.next_token(prompt),
            Tokens::Prompt(source) => source.next_token(prompt),
            Tokens::Unavailable(source) => source.next_token(prompt),
        }
    }

    fn can_retry(&self) -> bool {
        match self {
            Tokens::Flag(source) => source.can_retry(),
            Tokens::Prompt(source) => source.can_retry(),
            Tokens::Unavailable(source) => source.can_retry(),
        }
    }
}
