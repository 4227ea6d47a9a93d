use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Access tokens guard the write routes; refresh tokens only buy a new pair.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        })
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("not a {expected} token, got {found}")]
pub struct WrongTokenKind {
    pub expected: TokenKind,
    pub found: TokenKind,
}

/// Signed payload; `sub` is the user the token speaks for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub iat: usize, // unix seconds
    pub exp: usize, // unix seconds
    pub iss: String,
    pub aud: String,
    pub kind: TokenKind,
}

impl Claims {
    pub fn expect_kind(self, expected: TokenKind) -> Result<Self, WrongTokenKind> {
        if self.kind == expected {
            Ok(self)
        } else {
            Err(WrongTokenKind {
                expected,
                found: self.kind,
            })
        }
    }
}
