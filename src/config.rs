//! Configuration types.

use crate::topic::TopicPolicy;

/// Default ceiling on notification body size, in bytes.
pub const DEFAULT_MAX_BODY_BYTES: usize = 4096;

/// Gateway configuration, built once at startup from environment
/// variables and threaded explicitly into the components that need it.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the SMTP listener binds to.
    pub listen_addr: String,
    /// Required domain of recipient addresses (e.g. `push.example.com`).
    pub domain: String,
    /// Optional local-part prefix stripped from recipients (e.g. `alert-`).
    pub addr_prefix: String,
    /// Base URL of the pub/sub endpoint notifications are published to.
    pub base_url: String,
    /// Maximum notification body size in bytes.
    pub max_body_bytes: usize,
}

impl Config {
    /// Build config from environment variables.
    /// Returns `None` if `MAILPUSH_DOMAIN` is not set (gateway disabled).
    pub fn from_env() -> Option<Self> {
        let domain = std::env::var("MAILPUSH_DOMAIN").ok()?;

        let listen_addr =
            std::env::var("MAILPUSH_LISTEN").unwrap_or_else(|_| "0.0.0.0:25".to_string());

        let addr_prefix = std::env::var("MAILPUSH_ADDR_PREFIX").unwrap_or_default();

        let base_url = std::env::var("MAILPUSH_BASE_URL")
            .unwrap_or_else(|_| format!("https://{domain}"));

        let max_body_bytes: usize = std::env::var("MAILPUSH_MAX_BODY_BYTES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_MAX_BODY_BYTES);

        Some(Self {
            listen_addr,
            domain,
            addr_prefix,
            base_url,
            max_body_bytes,
        })
    }

    /// The recipient policy slice of this config.
    pub fn topic_policy(&self) -> TopicPolicy {
        TopicPolicy {
            domain: self.domain.clone(),
            prefix: self.addr_prefix.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_from_env_returns_none_when_no_domain() {
        // SAFETY: This test runs in isolation; no other thread reads
        // MAILPUSH_DOMAIN concurrently.
        unsafe { std::env::remove_var("MAILPUSH_DOMAIN") };
        assert!(Config::from_env().is_none());
    }

    #[test]
    fn topic_policy_carries_domain_and_prefix() {
        let config = Config {
            listen_addr: "127.0.0.1:2525".into(),
            domain: "push.example.com".into(),
            addr_prefix: "alert-".into(),
            base_url: "https://push.example.com".into(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        };
        let policy = config.topic_policy();
        assert_eq!(policy.domain, "push.example.com");
        assert_eq!(policy.prefix, "alert-");
    }
}
