//! Security module for input validation and rate limiting.

use crate::config::SecurityConfig;
use crate::engine::registry::ConnectionId;
use crate::error::ProtocolError;
use serde_json::Value;

pub mod input_validation;
pub mod rate_limiter;

pub use input_validation::{parse_uuid, sanitize_username};

/// Identity a message is counted against: the bound display name, or the
/// connection itself while no name has been announced yet.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RateKey {
    Name(String),
    Connection(ConnectionId),
}

/// Gatekeeper applied to every inbound frame before it is dispatched.
#[derive(Debug)]
pub struct SecurityManager {
    config: SecurityConfig,
    rate_limiter: rate_limiter::RateLimiter<RateKey>,
}

impl SecurityManager {
    /// Creates a new security manager with the given configuration
    pub fn new(config: SecurityConfig) -> Self {
        let rate_limiter = rate_limiter::RateLimiter::new(
            config.max_messages_per_window,
            config.rate_limit_window(),
        );
        Self { config, rate_limiter }
    }

    /// Rate-limits and structurally validates an inbound message
    pub fn admit(&mut self, key: RateKey, message: &str) -> Result<Value, ProtocolError> {
        if self.config.enable_rate_limiting && !self.rate_limiter.check(key) {
            return Err(ProtocolError::RateLimited);
        }
        input_validation::parse_json_message(message, &self.config)
    }

    /// Releases per-connection tracking once a connection is gone
    pub fn on_disconnect(&mut self, connection_id: ConnectionId) {
        self.rate_limiter.forget(&RateKey::Connection(connection_id));
    }

    /// Cleans up closed rate-limit windows
    pub fn cleanup(&mut self) {
        self.rate_limiter.cleanup_old_entries();
    }

    pub fn rate_limited_messages(&self) -> u64 {
        self.rate_limiter.blocked_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_admit_counts_by_key() {
        let mut security = SecurityManager::new(SecurityConfig {
            max_messages_per_window: 2,
            ..SecurityConfig::default()
        });
        let alice = RateKey::Name("alice".into());

        assert!(security.admit(alice.clone(), "{}").is_ok());
        assert!(matches!(
            security.admit(alice.clone(), "garbage"),
            Err(ProtocolError::MalformedMessage(_))
        ));
        assert_eq!(security.admit(alice, "{}"), Err(ProtocolError::RateLimited));
        assert_eq!(security.rate_limited_messages(), 1);

        assert!(security.admit(RateKey::Connection(1), "{}").is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limiting_can_be_disabled() {
        let mut security = SecurityManager::new(SecurityConfig {
            enable_rate_limiting: false,
            max_messages_per_window: 1,
            ..SecurityConfig::default()
        });
        for _ in 0..5 {
            assert!(security.admit(RateKey::Connection(3), "{}").is_ok());
        }
    }
}
