// src/auth.rs
//! Trigger credential check.
//!
//! A run may be triggered with `Authorization: Bearer <secret>` or
//! `?secret=<secret>`. Without a configured `CRON_SECRET` every trigger is
//! refused, unless the development bypass is on:
//! `TERMINATOR_DEV_TRIGGER_BYPASS=1` AND a dev environment (debug build OR
//! `SHUTTLE_ENV` in {local, development, dev}).

use sha2::{Digest, Sha256};

pub const ENV_CRON_SECRET: &str = "CRON_SECRET";
pub const ENV_DEV_BYPASS: &str = "TERMINATOR_DEV_TRIGGER_BYPASS";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("trigger secret is not configured")]
    NotConfigured,
    #[error("missing trigger credential")]
    Missing,
    #[error("trigger credential does not match")]
    Mismatch,
}

/// Which channel carried the credential that passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granted {
    Bearer,
    QueryParam,
    DevBypass,
}

#[derive(Clone, Default)]
pub struct TriggerAuth {
    secret_digest: Option<[u8; 32]>,
    dev_bypass: bool,
}

impl std::fmt::Debug for TriggerAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TriggerAuth")
            .field("configured", &self.secret_digest.is_some())
            .field("dev_bypass", &self.dev_bypass)
            .finish()
    }
}

fn digest(s: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(s.as_bytes());
    hasher.finalize().into()
}

/// Compare fixed-size digests without an early exit.
fn digests_match(a: &[u8; 32], b: &[u8; 32]) -> bool {
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

pub fn is_dev_env() -> bool {
    cfg!(debug_assertions)
        || matches!(
            std::env::var("SHUTTLE_ENV")
                .unwrap_or_default()
                .to_ascii_lowercase()
                .as_str(),
            "local" | "development" | "dev"
        )
}

impl TriggerAuth {
    pub fn new(secret: Option<&str>) -> Self {
        let secret_digest = secret.map(str::trim).filter(|s| !s.is_empty()).map(digest);
        Self {
            secret_digest,
            dev_bypass: false,
        }
    }

    /// Turn the bypass on. Has no effect outside a dev environment.
    pub fn with_dev_bypass(mut self, on: bool) -> Self {
        self.dev_bypass = on && is_dev_env();
        if self.dev_bypass {
            tracing::warn!(target: "auth", "trigger auth bypass enabled (dev only)");
        }
        self
    }

    pub fn from_env() -> Self {
        let secret = std::env::var(ENV_CRON_SECRET).ok();
        let bypass = std::env::var(ENV_DEV_BYPASS)
            .ok()
            .is_some_and(|v| v == "1");
        Self::new(secret.as_deref()).with_dev_bypass(bypass)
    }

    pub fn is_configured(&self) -> bool {
        self.secret_digest.is_some()
    }

    /// Check a raw `Authorization` header value and the `secret` query value.
    /// Either channel matching is enough.
    pub fn check(
        &self,
        authorization: Option<&str>,
        query_secret: Option<&str>,
    ) -> Result<Granted, AuthError> {
        if self.dev_bypass {
            return Ok(Granted::DevBypass);
        }
        let Some(expected) = self.secret_digest.as_ref() else {
            tracing::warn!(target: "auth", "trigger refused: no secret configured");
            return Err(AuthError::NotConfigured);
        };

        let bearer = authorization
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(str::trim);
        let query_secret = query_secret.map(str::trim);

        if bearer.is_none() && query_secret.is_none() {
            tracing::warn!(target: "auth", "trigger refused: no credential");
            return Err(AuthError::Missing);
        }
        if bearer.is_some_and(|b| digests_match(&digest(b), expected)) {
            return Ok(Granted::Bearer);
        }
        if query_secret.is_some_and(|q| digests_match(&digest(q), expected)) {
            return Ok(Granted::QueryParam);
        }

        tracing::warn!(
            target: "auth",
            bearer = bearer.is_some(),
            query = query_secret.is_some(),
            "trigger refused: credential mismatch"
        );
        Err(AuthError::Mismatch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn either_channel_is_enough() {
        let auth = TriggerAuth::new(Some("s3cret"));
        assert_eq!(auth.check(Some("Bearer s3cret"), None), Ok(Granted::Bearer));
        assert_eq!(auth.check(None, Some("s3cret")), Ok(Granted::QueryParam));
        assert_eq!(
            auth.check(Some("Bearer nope"), Some("s3cret")),
            Ok(Granted::QueryParam)
        );
    }

    #[test]
    fn wrong_or_missing_credential_is_refused() {
        let auth = TriggerAuth::new(Some("s3cret"));
        assert_eq!(auth.check(None, None), Err(AuthError::Missing));
        assert_eq!(auth.check(Some("Basic s3cret"), None), Err(AuthError::Missing));
        assert_eq!(auth.check(Some("Bearer nope"), None), Err(AuthError::Mismatch));
    }

    #[test]
    fn unconfigured_secret_refuses_everything() {
        let auth = TriggerAuth::new(Some("   "));
        assert!(!auth.is_configured());
        assert_eq!(auth.check(Some("Bearer "), Some("")), Err(AuthError::NotConfigured));
    }

    #[test]
    fn bypass_is_honoured_in_debug_builds() {
        if !is_dev_env() {
            return;
        }
        let auth = TriggerAuth::new(None).with_dev_bypass(true);
        assert_eq!(auth.check(None, None), Ok(Granted::DevBypass));
    }
}
