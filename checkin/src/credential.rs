//! Credential codec.
//!
//! A scanned or typed credential has the form `<DISCRIMINATOR>|<token>`:
//!
//! | discriminator          | namespace  |
//! |------------------------|------------|
//! | `GENERAL`              | general    |
//! | `SPH` (or `WORKSHOP`)  | workshop   |
//!
//! Discriminators are case-insensitive, tokens are not. Whitespace around the
//! payload and around each part is ignored since scanners commonly append a
//! line terminator. Parsing happens once; everything downstream works with the
//! typed [`Credential`].

use crate::types::{Namespace, ReasonCode, TicketToken};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Separator between discriminator and token
pub const SEPARATOR: char = '|';

/// Longest token accepted, in bytes
pub const MAX_TOKEN_LEN: usize = 256;

/// A parsed credential
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Credential {
    /// General-event ticket
    General(TicketToken),
    /// Workshop ticket
    Workshop(TicketToken),
}

impl Credential {
    /// Namespace the credential belongs to
    #[must_use]
    pub const fn namespace(&self) -> Namespace {
        match self {
            Self::General(_) => Namespace::General,
            Self::Workshop(_) => Namespace::Workshop,
        }
    }

    /// Ticket token
    #[must_use]
    pub const fn token(&self) -> &TicketToken {
        match self {
            Self::General(token) | Self::Workshop(token) => token,
        }
    }

    /// Build a credential from its parts
    #[must_use]
    pub const fn from_parts(namespace: Namespace, token: TicketToken) -> Self {
        match namespace {
            Namespace::General => Self::General(token),
            Namespace::Workshop => Self::Workshop(token),
        }
    }

    const fn discriminator(&self) -> &'static str {
        match self {
            Self::General(_) => "GENERAL",
            Self::Workshop(_) => "SPH",
        }
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{SEPARATOR}{}", self.discriminator(), self.token())
    }
}

/// Why a payload is not a credential.
///
/// Every variant is reported to the operator as `MISSING_QR`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Nothing but whitespace
    #[error("credential is empty")]
    Empty,

    /// No `DISCRIMINATOR|` prefix
    #[error("credential has no namespace discriminator")]
    MissingDiscriminator,

    /// Discriminator names no known namespace
    #[error("unknown namespace discriminator `{0}`")]
    UnknownNamespace(String),

    /// Discriminator present, token empty
    #[error("credential token is empty")]
    EmptyToken,

    /// Token longer than [`MAX_TOKEN_LEN`]
    #[error("credential token is {0} bytes long")]
    TokenTooLong(usize),
}

impl ParseError {
    /// Reason code reported for this error
    #[must_use]
    pub const fn reason(&self) -> ReasonCode {
        ReasonCode::MissingQr
    }
}

/// Parse a raw scanned or typed string
///
/// # Errors
///
/// Returns a [`ParseError`] when the payload is empty, has no known
/// discriminator, or carries an empty or oversized token.
pub fn parse(raw: &str) -> Result<Credential, ParseError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ParseError::Empty);
    }

    let (discriminator, token) = raw
        .split_once(SEPARATOR)
        .ok_or(ParseError::MissingDiscriminator)?;

    let discriminator = discriminator.trim();
    let namespace = match discriminator.to_ascii_uppercase().as_str() {
        "" => return Err(ParseError::MissingDiscriminator),
        "GENERAL" => Namespace::General,
        "SPH" | "WORKSHOP" => Namespace::Workshop,
        _ => return Err(ParseError::UnknownNamespace(discriminator.to_string())),
    };

    let token = token.trim();
    if token.is_empty() {
        return Err(ParseError::EmptyToken);
    }
    if token.len() > MAX_TOKEN_LEN {
        return Err(ParseError::TokenTooLong(token.len()));
    }

    Ok(Credential::from_parts(namespace, TicketToken::new(token)))
}

impl FromStr for Credential {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse(s)
    }
}
