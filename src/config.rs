//! SDK configuration and base URLs.
//!
//! Credentials can be passed explicitly or picked up from `MPESA_*`
//! environment variables; explicit values always win.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::env;
use std::fmt;

use crate::error::{MpesaError, MpesaResult};

/// Environment variable names consulted when a config value is not provided.
pub mod env_keys {
    pub const CONSUMER_KEY: &str = "MPESA_CONSUMER_KEY";
    pub const CONSUMER_SECRET: &str = "MPESA_CONSUMER_SECRET";
    pub const ENVIRONMENT: &str = "MPESA_ENVIRONMENT";
    pub const SHORT_CODE: &str = "MPESA_SHORT_CODE";
    pub const PASS_KEY: &str = "MPESA_PASS_KEY";
    pub const INITIATOR_NAME: &str = "MPESA_INITIATOR_NAME";
    pub const SECURITY_CREDENTIAL: &str = "MPESA_SECURITY_CREDENTIAL";
}

const SANDBOX_BASE_URL: &str = "https://sandbox.safaricom.co.ke";
const PRODUCTION_BASE_URL: &str = "https://api.safaricom.co.ke";

/// Daraja deployment to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Sandbox,
    Production,
}

impl Environment {
    /// Anything other than "production" (case-insensitive) selects the sandbox.
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("production") {
            Environment::Production
        } else {
            Environment::Sandbox
        }
    }

    /// `MPESA_ENVIRONMENT`, defaulting to the sandbox.
    pub fn from_env() -> Self {
        env::var(env_keys::ENVIRONMENT)
            .map(|value| Environment::parse(&value))
            .unwrap_or_default()
    }

    pub fn base_url(&self) -> &'static str {
        match self {
            Environment::Sandbox => SANDBOX_BASE_URL,
            Environment::Production => PRODUCTION_BASE_URL,
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Sandbox => write!(f, "sandbox"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Caller-supplied configuration. Unset fields fall back to the environment.
#[derive(Debug, Clone, Default)]
pub struct MpesaConfig {
    /// Consumer key from the Daraja portal
    pub consumer_key: Option<String>,
    /// Consumer secret from the Daraja portal
    pub consumer_secret: Option<String>,
    pub environment: Option<Environment>,
    /// Paybill or till number
    pub short_code: Option<String>,
    /// Lipa Na M-Pesa passkey
    pub pass_key: Option<String>,
    /// Initiator name for B2C, balance and status calls
    pub initiator_name: Option<String>,
    /// Encrypted initiator password
    pub security_credential: Option<String>,
}

/// Configuration with every field settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub environment: Environment,
    pub short_code: String,
    pub pass_key: String,
    pub initiator_name: String,
    pub security_credential: String,
}

/// `MPESA_*` variables as read through the `config` crate.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct EnvOverrides {
    consumer_key: Option<String>,
    consumer_secret: Option<String>,
    environment: Option<String>,
    short_code: Option<String>,
    pass_key: Option<String>,
    initiator_name: Option<String>,
    security_credential: Option<String>,
}

impl EnvOverrides {
    pub(crate) fn load() -> MpesaResult<Self> {
        let settings = config::Config::builder()
            .add_source(config::Environment::with_prefix("MPESA"))
            .build()
            .map_err(|e| MpesaError::validation(format!("Failed to read environment: {}", e)))?;

        let raw: EnvOverrides = settings
            .try_deserialize()
            .map_err(|e| MpesaError::validation(format!("Failed to read environment: {}", e)))?;

        Ok(raw.trimmed())
    }

    fn trimmed(self) -> Self {
        fn clean(value: Option<String>) -> Option<String> {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        }

        Self {
            consumer_key: clean(self.consumer_key),
            consumer_secret: clean(self.consumer_secret),
            environment: clean(self.environment),
            short_code: clean(self.short_code),
            pass_key: clean(self.pass_key),
            initiator_name: clean(self.initiator_name),
            security_credential: clean(self.security_credential),
        }
    }
}

impl MpesaConfig {
    pub fn new(consumer_key: impl Into<String>, consumer_secret: impl Into<String>) -> Self {
        Self {
            consumer_key: Some(consumer_key.into()),
            consumer_secret: Some(consumer_secret.into()),
            ..Default::default()
        }
    }

    pub fn environment(mut self, environment: Environment) -> Self {
        self.environment = Some(environment);
        self
    }

    pub fn short_code(mut self, short_code: impl Into<String>) -> Self {
        self.short_code = Some(short_code.into());
        self
    }

    pub fn pass_key(mut self, pass_key: impl Into<String>) -> Self {
        self.pass_key = Some(pass_key.into());
        self
    }

    pub fn initiator(
        mut self,
        initiator_name: impl Into<String>,
        security_credential: impl Into<String>,
    ) -> Self {
        self.initiator_name = Some(initiator_name.into());
        self.security_credential = Some(security_credential.into());
        self
    }

    /// Merge explicit values with the process environment.
    pub fn resolve(self) -> MpesaResult<ResolvedConfig> {
        let env = EnvOverrides::load()?;
        self.resolve_with(env)
    }

    pub(crate) fn resolve_with(self, env: EnvOverrides) -> MpesaResult<ResolvedConfig> {
        let consumer_key = self.consumer_key.or(env.consumer_key).unwrap_or_default();
        let consumer_secret = self
            .consumer_secret
            .or(env.consumer_secret)
            .unwrap_or_default();

        if consumer_key.is_empty() || consumer_secret.is_empty() {
            return Err(MpesaError::validation(format!(
                "Missing required credentials: set consumer_key and consumer_secret in config or {} and {} in the environment.",
                env_keys::CONSUMER_KEY,
                env_keys::CONSUMER_SECRET
            )));
        }

        let environment = match self.environment {
            Some(environment) => environment,
            None => env
                .environment
                .as_deref()
                .map(Environment::parse)
                .unwrap_or_default(),
        };

        Ok(ResolvedConfig {
            consumer_key,
            consumer_secret,
            environment,
            short_code: self.short_code.or(env.short_code).unwrap_or_default(),
            pass_key: self.pass_key.or(env.pass_key).unwrap_or_default(),
            initiator_name: self.initiator_name.or(env.initiator_name).unwrap_or_default(),
            security_credential: self
                .security_credential
                .or(env.security_credential)
                .unwrap_or_default(),
        })
    }
}

/// Listener settings for the callback server binary.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        let config = ServerConfig {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .context("PORT must be a valid number")?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(anyhow!("HOST cannot be empty"));
        }

        if self.port == 0 {
            return Err(anyhow!("PORT must be greater than 0"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env_with_credentials() -> EnvOverrides {
        EnvOverrides {
            consumer_key: Some("env-key".to_string()),
            consumer_secret: Some("env-secret".to_string()),
            environment: Some("PRODUCTION".to_string()),
            short_code: Some("600000".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_environment_base_urls() {
        assert_eq!(
            Environment::Sandbox.base_url(),
            "https://sandbox.safaricom.co.ke"
        );
        assert_eq!(
            Environment::Production.base_url(),
            "https://api.safaricom.co.ke"
        );
    }

    #[test]
    fn test_environment_parse_defaults_to_sandbox() {
        assert_eq!(Environment::parse("Production"), Environment::Production);
        assert_eq!(Environment::parse("live"), Environment::Sandbox);
        assert_eq!(Environment::parse(""), Environment::Sandbox);
    }

    #[test]
    fn test_explicit_values_take_precedence() {
        let resolved = MpesaConfig::new("key", "secret")
            .environment(Environment::Sandbox)
            .short_code("174379")
            .resolve_with(env_with_credentials())
            .unwrap();

        assert_eq!(resolved.consumer_key, "key");
        assert_eq!(resolved.consumer_secret, "secret");
        assert_eq!(resolved.environment, Environment::Sandbox);
        assert_eq!(resolved.short_code, "174379");
    }

    #[test]
    fn test_environment_fills_missing_values() {
        let resolved = MpesaConfig::default()
            .resolve_with(env_with_credentials())
            .unwrap();

        assert_eq!(resolved.consumer_key, "env-key");
        assert_eq!(resolved.environment, Environment::Production);
        assert_eq!(resolved.short_code, "600000");
        assert_eq!(resolved.pass_key, "");
    }

    #[test]
    fn test_missing_credentials_is_validation_error() {
        let err = MpesaConfig::default()
            .resolve_with(EnvOverrides::default())
            .unwrap_err();
        assert!(err.is_validation());
        assert!(err.message.contains("MPESA_CONSUMER_KEY"));
    }

    #[test]
    fn test_explicit_empty_secret_is_not_replaced() {
        let err = MpesaConfig::new("key", "")
            .resolve_with(env_with_credentials())
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_server_config_rejects_port_zero() {
        let config = ServerConfig {
            host: "0.0.0.0".to_string(),
            port: 0,
        };
        assert!(config.validate().is_err());
    }
}
