use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{ConfigError, ConfigResult, defaults};

/// Top-level configuration file.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    pub dispatcher: DispatcherSettings,
    #[serde(default)]
    pub judge: JudgeSettings,
    /// One judger (dispatcher connection + backend session) per account.
    pub accounts: Vec<AccountSettings>,
}

impl Settings {
    pub(crate) fn validate(&self) -> ConfigResult<()> {
        self.dispatcher.validate()?;
        self.judge.validate()?;
        if self.accounts.is_empty() {
            return Err(ConfigError::invalid(
                "accounts",
                "at least one account is required",
            ));
        }
        for (index, account) in self.accounts.iter().enumerate() {
            if account.username.trim().is_empty() {
                return Err(ConfigError::invalid(
                    format!("accounts[{}].username", index),
                    "must not be empty",
                ));
            }
        }
        Ok(())
    }
}

#[derive(Clone, Deserialize, Serialize)]
pub struct DispatcherSettings {
    pub host: String,
    pub port: u16,
    /// Pre-shared secret written raw right after connecting.
    pub secret: String,
    #[serde(default = "defaults::reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    /// A dispatcher that stops reading for this long is treated as gone.
    #[serde(default = "defaults::write_timeout_ms")]
    pub write_timeout_ms: u64,
}

impl DispatcherSettings {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::invalid("dispatcher.host", "must not be empty"));
        }
        if self.port == 0 {
            return Err(ConfigError::invalid("dispatcher.port", "must be non-zero"));
        }
        if self.secret.is_empty() {
            return Err(ConfigError::invalid("dispatcher.secret", "must not be empty"));
        }
        if self.write_timeout_ms == 0 {
            return Err(ConfigError::invalid(
                "dispatcher.write_timeout_ms",
                "must be non-zero",
            ));
        }
        Ok(())
    }
}

// Keep the secret out of logs.
impl fmt::Debug for DispatcherSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatcherSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("secret", &"<redacted>")
            .field("reconnect_delay_ms", &self.reconnect_delay_ms)
            .field("write_timeout_ms", &self.write_timeout_ms)
            .finish()
    }
}

/// Timing policy shared by the pipeline and the backends.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JudgeSettings {
    #[serde(default = "defaults::poll_timeout_ms")]
    pub poll_timeout_ms: u64,
    #[serde(default = "defaults::poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "defaults::submit_backoff_ms")]
    pub submit_backoff_ms: u64,
    #[serde(default = "defaults::request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for JudgeSettings {
    fn default() -> Self {
        Self {
            poll_timeout_ms: defaults::POLL_TIMEOUT_MS,
            poll_interval_ms: defaults::POLL_INTERVAL_MS,
            submit_backoff_ms: defaults::SUBMIT_BACKOFF_MS,
            request_timeout_ms: defaults::REQUEST_TIMEOUT_MS,
        }
    }
}

impl JudgeSettings {
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn submit_backoff(&self) -> Duration {
        Duration::from_millis(self.submit_backoff_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::invalid(
                "judge.poll_interval_ms",
                "must be non-zero",
            ));
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::invalid(
                "judge.request_timeout_ms",
                "must be non-zero",
            ));
        }
        if self.poll_interval_ms >= self.poll_timeout_ms {
            return Err(ConfigError::invalid(
                "judge.poll_interval_ms",
                "must be shorter than judge.poll_timeout_ms",
            ));
        }
        Ok(())
    }
}

/// Remote judges a judger can drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Hdu,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Hdu => f.write_str("hdu"),
        }
    }
}

#[derive(Clone, Deserialize, Serialize)]
pub struct AccountSettings {
    pub backend: BackendKind,
    pub username: String,
    pub password: String,
    /// Overrides the backend's default site URL.
    #[serde(default)]
    pub base_url: Option<String>,
}

impl fmt::Debug for AccountSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountSettings")
            .field("backend", &self.backend)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn dispatcher() -> DispatcherSettings {
        DispatcherSettings {
            host: "localhost".to_string(),
            port: 5907,
            secret: "s3cret".to_string(),
            reconnect_delay_ms: defaults::RECONNECT_DELAY_MS,
            write_timeout_ms: defaults::WRITE_TIMEOUT_MS,
        }
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let account = AccountSettings {
            backend: BackendKind::Hdu,
            username: "alice".to_string(),
            password: "hunter2".to_string(),
            base_url: None,
        };

        let rendered = format!("{:?} {:?}", dispatcher(), account);
        assert!(!rendered.contains("s3cret"), "{}", rendered);
        assert!(!rendered.contains("hunter2"), "{}", rendered);
        assert!(rendered.contains("alice"));
    }

    #[rstest]
    #[case::empty_host("", 5907, "s3cret", "dispatcher.host")]
    #[case::zero_port("localhost", 0, "s3cret", "dispatcher.port")]
    #[case::empty_secret("localhost", 5907, "", "dispatcher.secret")]
    fn dispatcher_validation_names_field(
        #[case] host: &str,
        #[case] port: u16,
        #[case] secret: &str,
        #[case] expected_field: &str,
    ) {
        let settings = DispatcherSettings {
            host: host.to_string(),
            port,
            secret: secret.to_string(),
            ..dispatcher()
        };

        match settings.validate() {
            Err(ConfigError::Invalid { field, .. }) => assert_eq!(field, expected_field),
            other => panic!("expected Invalid {}, got {:?}", expected_field, other),
        }
    }

    #[test]
    fn zero_write_timeout_is_rejected() {
        let settings = DispatcherSettings {
            write_timeout_ms: 0,
            ..dispatcher()
        };
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::Invalid { field, .. }) if field == "dispatcher.write_timeout_ms"
        ));
    }

    #[rstest]
    #[case::zero_interval(1000, 0, 500)]
    #[case::interval_not_shorter(1000, 1000, 500)]
    #[case::zero_request_timeout(1000, 100, 0)]
    fn judge_validation_rejects_bad_timing(
        #[case] timeout: u64,
        #[case] interval: u64,
        #[case] request_timeout: u64,
    ) {
        let settings = JudgeSettings {
            poll_timeout_ms: timeout,
            poll_interval_ms: interval,
            request_timeout_ms: request_timeout,
            ..JudgeSettings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn default_judge_settings_are_valid() {
        assert!(JudgeSettings::default().validate().is_ok());
    }
}
