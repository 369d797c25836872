//! Semantic checks over a materialized [`AppConfig`].

use std::time::Duration;

use thiserror::Error;

use super::{AppConfig, defaults::DEFAULT_JWT_SECRET};

/// A single broken configuration invariant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Violation {
    #[error("JWT secret must be set and not default")]
    MissingOrDefaultSecret,
    #[error("server port must be between 1 and 65535, got {0}")]
    PortOutOfRange(i64),
    #[error("JWT access token duration must be positive")]
    NonPositiveAccessTokenDuration,
    #[error("JWT refresh token duration must be positive")]
    NonPositiveRefreshTokenDuration,
}

/// Returns every violation found in `config`; an empty list means it is usable.
pub fn validate(config: &AppConfig) -> Vec<Violation> {
    let mut violations = Vec::new();

    if config.jwt.secret.is_empty() || config.jwt.secret == DEFAULT_JWT_SECRET {
        violations.push(Violation::MissingOrDefaultSecret);
    }

    if !(1..=65535).contains(&config.www.port) {
        violations.push(Violation::PortOutOfRange(config.www.port));
    }

    if config.jwt.access_token_duration == Duration::ZERO {
        violations.push(Violation::NonPositiveAccessTokenDuration);
    }

    if config.jwt.refresh_token_duration == Duration::ZERO {
        violations.push(Violation::NonPositiveRefreshTokenDuration);
    }

    violations
}
