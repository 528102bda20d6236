//! Configuration management for Slidegate.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use crate::error::{GateError, Result};
use crate::ratelimit::Policy;
use crate::verification::CodeSettings;

/// Prefix for environment variable overrides, e.g. `SLIDEGATE__REDIS__URL`.
const ENV_PREFIX: &str = "SLIDEGATE";

/// Main configuration for the Slidegate service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Shared store configuration
    #[serde(default)]
    pub redis: RedisConfig,

    /// Request rate limits
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Verification code limits and settings
    #[serde(default)]
    pub verification: VerificationConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP listen address
    #[serde(default = "default_http_addr")]
    pub http_addr: SocketAddr,

    /// Proxies whose `X-Forwarded-For` header is believed
    #[serde(default)]
    pub trusted_proxies: Vec<IpAddr>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: default_http_addr(),
            trusted_proxies: Vec::new(),
        }
    }
}

fn default_http_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

/// Shared store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Redis URL, or `memory://` for a process-local store
    #[serde(default = "default_redis_url")]
    pub url: String,

    /// Upper bound on a single store command in milliseconds
    #[serde(default = "default_command_timeout")]
    pub command_timeout_ms: u64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            command_timeout_ms: default_command_timeout(),
        }
    }
}

impl RedisConfig {
    /// Whether the process-local store was requested.
    pub fn is_memory(&self) -> bool {
        self.url.starts_with("memory://")
    }

    /// The command timeout as a duration.
    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_command_timeout() -> u64 {
    500
}

/// One rate limit policy as written in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Store key prefix
    pub prefix: String,
    /// Window length in milliseconds
    pub interval_ms: u64,
    /// Admitted events per window
    pub rate: u64,
}

impl PolicyConfig {
    fn new(prefix: &str, interval_ms: u64, rate: u64) -> Self {
        Self {
            prefix: prefix.to_string(),
            interval_ms,
            rate,
        }
    }

    /// Validate into a [`Policy`].
    pub fn to_policy(&self) -> Result<Policy> {
        Policy::new(
            self.prefix.clone(),
            Duration::from_millis(self.interval_ms),
            self.rate,
        )
    }
}

/// Request rate limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Per client IP limit applied to every request
    #[serde(default = "default_ip_policy")]
    pub ip: PolicyConfig,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            ip: default_ip_policy(),
        }
    }
}

fn default_ip_policy() -> PolicyConfig {
    PolicyConfig::new("ip-limiter", 1000, 100)
}

/// Verification code limits and settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationConfig {
    /// Limit on codes sent per `(biz_type, phone)`
    #[serde(default = "default_send_policy")]
    pub send: PolicyConfig,

    /// Limit on code checks per `(biz_type, phone)`
    #[serde(default = "default_check_policy")]
    pub check: PolicyConfig,

    /// SMS template carrying the code
    #[serde(default = "default_template_id")]
    pub template_id: String,

    /// Code lifetime in milliseconds
    #[serde(default = "default_code_ttl")]
    pub code_ttl_ms: u64,

    /// Business types codes may be issued for
    #[serde(default = "default_biz_types")]
    pub biz_types: Vec<String>,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            send: default_send_policy(),
            check: default_check_policy(),
            template_id: default_template_id(),
            code_ttl_ms: default_code_ttl(),
            biz_types: default_biz_types(),
        }
    }
}

impl VerificationConfig {
    /// Settings for the code service.
    pub fn code_settings(&self) -> CodeSettings {
        CodeSettings {
            template_id: self.template_id.clone(),
            code_ttl: Duration::from_millis(self.code_ttl_ms),
            biz_types: self.biz_types.clone(),
        }
    }
}

fn default_send_policy() -> PolicyConfig {
    PolicyConfig::new("code-send", 60_000, 1)
}

fn default_check_policy() -> PolicyConfig {
    PolicyConfig::new("code-check", 600_000, 3)
}

fn default_template_id() -> String {
    "verification-code".to_string()
}

fn default_code_ttl() -> u64 {
    600_000
}

fn default_biz_types() -> Vec<String> {
    vec!["login".to_string()]
}

impl AppConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| GateError::InvalidConfig(e.to_string()))
    }

    /// Load configuration from an optional YAML file, then apply
    /// `SLIDEGATE__*` environment overrides on top.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let base = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        let invalid = |e: ::config::ConfigError| GateError::InvalidConfig(e.to_string());

        ::config::Config::builder()
            .add_source(::config::Config::try_from(&base).map_err(invalid)?)
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("server.trusted_proxies")
                    .with_list_parse_key("verification.biz_types"),
            )
            .build()
            .and_then(|settings| settings.try_deserialize())
            .map_err(invalid)
    }

    /// Check every policy can be built, that no two share a prefix, and
    /// that the business type list is usable.
    pub fn validate(&self) -> Result<()> {
        if self.verification.biz_types.is_empty() {
            return Err(GateError::InvalidConfig(
                "verification.biz_types must not be empty".to_string(),
            ));
        }
        if let Some(bad) = self
            .verification
            .biz_types
            .iter()
            .find(|biz| biz.is_empty() || biz.contains(':'))
        {
            return Err(GateError::InvalidConfig(format!(
                "biz_type '{}' must be non-empty and must not contain ':'",
                bad
            )));
        }

        let policies = [
            self.limits.ip.to_policy()?,
            self.verification.send.to_policy()?,
            self.verification.check.to_policy()?,
        ];

        for (i, a) in policies.iter().enumerate() {
            for b in &policies[i + 1..] {
                if a.prefix() == b.prefix() {
                    return Err(GateError::InvalidConfig(format!(
                        "policy prefix '{}' is used more than once",
                        a.prefix()
                    )));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();

        assert_eq!(
            config.server.http_addr,
            "127.0.0.1:8080".parse::<SocketAddr>().unwrap()
        );
        assert_eq!(config.redis.url, "redis://localhost:6379");
        assert_eq!(config.limits.ip, PolicyConfig::new("ip-limiter", 1000, 100));
        assert_eq!(config.verification.send.rate, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_yaml_partial() {
        let yaml = r#"
server:
  trusted_proxies: ["10.0.0.1"]
redis:
  url: "memory://"
limits:
  ip:
    prefix: edge
    interval_ms: 2000
    rate: 5
"#;
        let config = AppConfig::from_yaml(yaml).unwrap();

        assert!(config.redis.is_memory());
        assert_eq!(config.redis.command_timeout(), Duration::from_millis(500));
        assert_eq!(config.server.trusted_proxies, vec!["10.0.0.1".parse::<IpAddr>().unwrap()]);

        let policy = config.limits.ip.to_policy().unwrap();
        assert_eq!(policy.prefix(), "edge");
        assert_eq!(policy.interval(), Duration::from_secs(2));
        assert_eq!(policy.rate(), 5);

        // Untouched sections keep their defaults
        assert_eq!(config.verification.check.prefix, "code-check");
    }

    #[test]
    fn test_validate_rejects_zero_rate() {
        let mut config = AppConfig::default();
        config.verification.send.rate = 0;

        assert!(matches!(config.validate(), Err(GateError::InvalidConfig(_))));
    }

    #[test]
    fn test_validate_rejects_shared_prefix() {
        let mut config = AppConfig::default();
        config.verification.check.prefix = "ip-limiter".to_string();

        assert!(matches!(config.validate(), Err(GateError::InvalidConfig(_))));
    }

    #[test]
    fn test_invalid_yaml() {
        assert!(matches!(
            AppConfig::from_yaml("limits: 42"),
            Err(GateError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_code_settings() {
        let settings = VerificationConfig::default().code_settings();
        assert_eq!(settings.code_ttl, Duration::from_secs(600));
        assert_eq!(settings.template_id, "verification-code");
    }

    #[test]
    fn test_validate_rejects_bad_biz_types() {
        let mut config = AppConfig::default();
        config.verification.biz_types.clear();
        assert!(matches!(config.validate(), Err(GateError::InvalidConfig(_))));

        config.verification.biz_types = vec!["login".to_string(), "a:b".to_string()];
        assert!(matches!(config.validate(), Err(GateError::InvalidConfig(_))));
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("slidegate-{}.yaml", uuid::Uuid::new_v4()));
        std::fs::write(
            &path,
            "verification:\n  biz_types: [login, register]\n  code_ttl_ms: 30000\n",
        )
        .unwrap();

        let config = AppConfig::load(path.to_str()).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.verification.biz_types, vec!["login", "register"]);
        assert_eq!(config.verification.code_ttl_ms, 30_000);
        assert_eq!(config.limits.ip.rate, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            AppConfig::load(Some("/nonexistent/slidegate.yaml")),
            Err(GateError::Io(_))
        ));
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let config = AppConfig::load(None).unwrap();
        assert_eq!(config.limits.ip.prefix, "ip-limiter");
    }
}
