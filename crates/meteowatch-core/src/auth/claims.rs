//! Decoding of the signed-claims payload carried by session tokens.
//!
//! Tokens are three dot-separated segments (`header.payload.signature`).
//! Only the payload is read here; the signature is the server's business.

use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Number of dot-separated segments in a well-formed token
const TOKEN_SEGMENTS: usize = 3;

/// Claims read from the token payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: i64,
    pub username: String,
    /// Expiry as epoch seconds
    pub exp: i64,
    #[serde(default)]
    pub iat: Option<i64>,
}

/// Identity of the signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
}

impl Claims {
    /// Decode the payload segment of `token`.
    ///
    /// Returns `None` for anything that is not a three-segment token whose
    /// middle segment is base64 JSON with the expected fields. Both the
    /// URL-safe and the standard alphabet are accepted, padded or not.
    pub fn decode(token: &str) -> Option<Self> {
        let segments: Vec<&str> = token.split('.').collect();
        if segments.len() != TOKEN_SEGMENTS {
            return None;
        }

        let normalized: String = segments[1]
            .trim_end_matches('=')
            .chars()
            .map(|c| match c {
                '-' => '+',
                '_' => '/',
                other => other,
            })
            .collect();

        let bytes = STANDARD_NO_PAD.decode(normalized).ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    /// True while `exp` lies strictly after `now`, compared in milliseconds.
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        self.exp
            .checked_mul(1000)
            .map(|exp_ms| exp_ms > now.timestamp_millis())
            .unwrap_or(false)
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.exp, 0).single()
    }

    /// Remaining lifetime at `now`, zero once expired
    pub fn expires_in(&self, now: DateTime<Utc>) -> Duration {
        self.expires_at()
            .map(|at| (at - now).max(Duration::zero()))
            .unwrap_or_else(Duration::zero)
    }

    pub fn user(&self) -> User {
        User {
            id: self.user_id,
            username: self.username.clone(),
        }
    }
}
