//! Provider configuration
//!
//! Values are taken, in priority order, from explicit settings, the
//! `SAKURACLOUD_*` environment variables and finally a usacloud profile
//! stored at `<base>/.usacloud/<profile>/config.json`, where `<base>` is
//! `SAKURACLOUD_PROFILE_DIR` or the home directory. A lower source only fills
//! a field that is still empty or at its default.

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_ZONE: &str = "is1b";
pub const DEFAULT_ZONES: [&str; 5] = ["is1a", "is1b", "tk1a", "tk1b", "tk1v"];
pub const DEFAULT_PROFILE: &str = "default";
pub const DEFAULT_RETRY_MAX: u32 = 10;
pub const DEFAULT_API_REQUEST_TIMEOUT: u32 = 300;
pub const DEFAULT_API_REQUEST_RATE_LIMIT: u32 = 10;

/// Provider settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// usacloud profile name; empty means `default`
    pub profile: String,
    pub access_token: String,
    pub access_token_secret: String,
    /// Zone used by resources that do not name one
    pub zone: String,
    /// Zones resources may name; empty means every public zone
    pub zones: Vec<String>,
    /// `api`, `http`, or anything else for both
    pub trace_mode: String,
    pub accept_language: String,
    pub api_root_url: String,
    pub retry_max: u32,
    /// Seconds
    pub retry_wait_min: u32,
    /// Seconds
    pub retry_wait_max: u32,
    /// Seconds
    pub api_request_timeout: u32,
    /// Requests per second
    pub api_request_rate_limit: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            profile: String::new(),
            access_token: String::new(),
            access_token_secret: String::new(),
            zone: DEFAULT_ZONE.to_string(),
            zones: Vec::new(),
            trace_mode: String::new(),
            accept_language: String::new(),
            api_root_url: String::new(),
            retry_max: DEFAULT_RETRY_MAX,
            retry_wait_min: 0,
            retry_wait_max: 0,
            api_request_timeout: DEFAULT_API_REQUEST_TIMEOUT,
            api_request_rate_limit: DEFAULT_API_REQUEST_RATE_LIMIT,
        }
    }
}

/// usacloud profile file
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
struct ProfileValue {
    #[serde(rename = "AccessToken")]
    access_token: String,
    #[serde(rename = "AccessTokenSecret")]
    access_token_secret: String,
    #[serde(rename = "Zone")]
    zone: String,
    #[serde(rename = "Zones")]
    zones: Vec<String>,
    #[serde(rename = "TraceMode")]
    trace_mode: String,
    #[serde(rename = "AcceptLanguage")]
    accept_language: String,
    #[serde(rename = "APIRootURL")]
    api_root_url: String,
    #[serde(rename = "RetryMax")]
    retry_max: u32,
    #[serde(rename = "RetryWaitMin")]
    retry_wait_min: u32,
    #[serde(rename = "RetryWaitMax")]
    retry_wait_max: u32,
    #[serde(rename = "HTTPRequestTimeout")]
    http_request_timeout: u32,
    #[serde(rename = "HTTPRequestRateLimit")]
    http_request_rate_limit: u32,
}

fn fill(target: &mut String, value: String) {
    if target.is_empty() && !value.is_empty() {
        *target = value;
    }
}

fn fill_default(target: &mut String, default: &str, value: String) {
    if (target.is_empty() || target == default) && !value.is_empty() {
        *target = value;
    }
}

fn fill_number(target: &mut u32, default: u32, value: u32) {
    if (*target == 0 || *target == default) && value > 0 {
        *target = value;
    }
}

fn env_string(name: &str) -> String {
    std::env::var(name).unwrap_or_default()
}

fn env_number(name: &str) -> Result<u32> {
    match std::env::var(name) {
        Ok(raw) if !raw.is_empty() => raw.parse().map_err(|_| ConfigError::InvalidEnv {
            name: name.to_string(),
            value: raw,
        }),
        _ => Ok(0),
    }
}

/// Directory holding the `.usacloud` profiles
pub fn profile_base_dir() -> Result<PathBuf> {
    match std::env::var("SAKURACLOUD_PROFILE_DIR") {
        Ok(dir) if !dir.is_empty() => Ok(PathBuf::from(dir)),
        _ => dirs::home_dir().ok_or(ConfigError::HomeDirNotFound),
    }
}

/// Path of the `config.json` of `profile`
pub fn profile_path(profile: &str) -> Result<PathBuf> {
    Ok(profile_base_dir()?
        .join(".usacloud")
        .join(profile)
        .join("config.json"))
}

impl Config {
    /// Fill unset fields from `SAKURACLOUD_*` environment variables
    pub fn apply_env(&mut self) -> Result<()> {
        fill(&mut self.profile, env_string("SAKURACLOUD_PROFILE"));
        fill(&mut self.access_token, env_string("SAKURACLOUD_ACCESS_TOKEN"));
        fill(
            &mut self.access_token_secret,
            env_string("SAKURACLOUD_ACCESS_TOKEN_SECRET"),
        );
        fill_default(&mut self.zone, DEFAULT_ZONE, env_string("SAKURACLOUD_ZONE"));
        if self.zones.is_empty() {
            self.zones = env_string("SAKURACLOUD_ZONES")
                .split(',')
                .map(str::trim)
                .filter(|z| !z.is_empty())
                .map(String::from)
                .collect();
        }
        fill(&mut self.trace_mode, env_string("SAKURACLOUD_TRACE"));
        fill(
            &mut self.accept_language,
            env_string("SAKURACLOUD_ACCEPT_LANGUAGE"),
        );
        fill(&mut self.api_root_url, env_string("SAKURACLOUD_API_ROOT_URL"));
        fill_number(
            &mut self.retry_max,
            DEFAULT_RETRY_MAX,
            env_number("SAKURACLOUD_RETRY_MAX")?,
        );
        fill_number(
            &mut self.retry_wait_min,
            0,
            env_number("SAKURACLOUD_RETRY_WAIT_MIN")?,
        );
        fill_number(
            &mut self.retry_wait_max,
            0,
            env_number("SAKURACLOUD_RETRY_WAIT_MAX")?,
        );
        fill_number(
            &mut self.api_request_timeout,
            DEFAULT_API_REQUEST_TIMEOUT,
            env_number("SAKURACLOUD_API_REQUEST_TIMEOUT")?,
        );
        fill_number(
            &mut self.api_request_rate_limit,
            DEFAULT_API_REQUEST_RATE_LIMIT,
            env_number("SAKURACLOUD_API_REQUEST_RATE_LIMIT")?,
        );
        Ok(())
    }

    /// Fill unset fields from the usacloud profile
    ///
    /// A missing `default` profile is not an error; a missing named profile is.
    pub fn load_from_profile(&mut self) -> Result<()> {
        if self.profile.is_empty() {
            self.profile = DEFAULT_PROFILE.to_string();
        }
        if self.profile != DEFAULT_PROFILE {
            tracing::debug!("Using profile {:?}", self.profile);
        }

        let path = profile_path(&self.profile)?;
        if !path.exists() {
            if self.profile == DEFAULT_PROFILE {
                return Ok(());
            }
            return Err(ConfigError::Profile {
                profile: self.profile.clone(),
                reason: format!("{} not found", path.display()),
            });
        }

        let content = std::fs::read_to_string(&path)?;
        let pv: ProfileValue =
            serde_json::from_str(&content).map_err(|e| ConfigError::Profile {
                profile: self.profile.clone(),
                reason: e.to_string(),
            })?;

        fill(&mut self.access_token, pv.access_token);
        fill(&mut self.access_token_secret, pv.access_token_secret);
        fill_default(&mut self.zone, DEFAULT_ZONE, pv.zone);
        if !pv.zones.is_empty() && (self.zones.is_empty() || self.has_default_zones()) {
            self.zones = pv.zones;
        }
        fill(&mut self.trace_mode, pv.trace_mode);
        fill(&mut self.accept_language, pv.accept_language);
        fill(&mut self.api_root_url, pv.api_root_url);
        fill_number(&mut self.retry_max, DEFAULT_RETRY_MAX, pv.retry_max);
        fill_number(&mut self.retry_wait_min, 0, pv.retry_wait_min);
        fill_number(&mut self.retry_wait_max, 0, pv.retry_wait_max);
        fill_number(
            &mut self.api_request_timeout,
            DEFAULT_API_REQUEST_TIMEOUT,
            pv.http_request_timeout,
        );
        fill_number(
            &mut self.api_request_rate_limit,
            DEFAULT_API_REQUEST_RATE_LIMIT,
            pv.http_request_rate_limit,
        );
        Ok(())
    }

    fn has_default_zones(&self) -> bool {
        let mut configured: Vec<&str> = self.zones.iter().map(String::as_str).collect();
        configured.sort_unstable();
        let mut defaults = DEFAULT_ZONES.to_vec();
        defaults.sort_unstable();
        configured == defaults
    }

    /// Every missing credential is reported at once
    pub fn validate(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.access_token.is_empty() {
            missing.push("AccessToken is required".to_string());
        }
        if self.access_token_secret.is_empty() {
            missing.push("AccessTokenSecret is required".to_string());
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::MissingCredentials(missing))
        }
    }

    /// Zones resources may name
    pub fn effective_zones(&self) -> Vec<String> {
        if self.zones.is_empty() {
            DEFAULT_ZONES.iter().map(|z| z.to_string()).collect()
        } else {
            self.zones.clone()
        }
    }

    /// Environment, then profile, then validation
    pub fn resolve(mut self) -> Result<Self> {
        self.apply_env()?;
        self.load_from_profile()?;
        self.validate()?;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;

    const ENV_KEYS: [&str; 6] = [
        "SAKURACLOUD_PROFILE",
        "SAKURACLOUD_ACCESS_TOKEN",
        "SAKURACLOUD_ACCESS_TOKEN_SECRET",
        "SAKURACLOUD_ZONE",
        "SAKURACLOUD_ZONES",
        "SAKURACLOUD_RETRY_MAX",
    ];

    fn write_profile(base: &std::path::Path, name: &str, body: &str) {
        let dir = base.join(".usacloud").join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("config.json"), body).unwrap();
    }

    fn with_clean_env<F: FnOnce()>(base: &std::path::Path, vars: &[(&str, &str)], f: F) {
        let mut all: Vec<(&str, Option<&str>)> = ENV_KEYS.iter().map(|k| (*k, None)).collect();
        all.push(("SAKURACLOUD_PROFILE_DIR", base.to_str()));
        for (k, v) in vars {
            all.retain(|(key, _)| key != k);
            all.push((*k, Some(*v)));
        }
        temp_env::with_vars(all, f);
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.zone, "is1b");
        assert_eq!(config.retry_max, 10);
        assert_eq!(config.api_request_timeout, 300);
        assert_eq!(config.effective_zones().len(), 5);
    }

    #[test]
    fn test_validate_reports_every_missing_credential() {
        let err = Config::default().validate().unwrap_err();
        let message = err.to_string();
        assert!(message.contains("AccessToken is required"));
        assert!(message.contains("AccessTokenSecret is required"));
    }

    #[test]
    #[serial]
    fn test_env_fills_unset_fields() {
        let base = tempfile::tempdir().unwrap();
        with_clean_env(
            base.path(),
            &[
                ("SAKURACLOUD_ACCESS_TOKEN", "token-from-env"),
                ("SAKURACLOUD_ACCESS_TOKEN_SECRET", "secret-from-env"),
                ("SAKURACLOUD_ZONE", "tk1a"),
                ("SAKURACLOUD_ZONES", "tk1a, is1b"),
            ],
            || {
                let config = Config {
                    access_token: "explicit".into(),
                    ..Default::default()
                }
                .resolve()
                .unwrap();
                assert_eq!(config.access_token, "explicit");
                assert_eq!(config.access_token_secret, "secret-from-env");
                assert_eq!(config.zone, "tk1a");
                assert_eq!(config.zones, vec!["tk1a", "is1b"]);
            },
        );
    }

    #[test]
    #[serial]
    fn test_invalid_numeric_env() {
        let base = tempfile::tempdir().unwrap();
        with_clean_env(base.path(), &[("SAKURACLOUD_RETRY_MAX", "many")], || {
            let err = Config::default().apply_env().unwrap_err();
            assert!(matches!(err, ConfigError::InvalidEnv { .. }));
        });
    }

    #[test]
    #[serial]
    fn test_profile_fills_remaining_fields() {
        let base = tempfile::tempdir().unwrap();
        write_profile(
            base.path(),
            "default",
            r#"{"AccessToken": "p-token", "AccessTokenSecret": "p-secret", "Zone": "tk1b", "RetryMax": 3}"#,
        );
        with_clean_env(
            base.path(),
            &[("SAKURACLOUD_ACCESS_TOKEN", "env-token")],
            || {
                let config = Config::default().resolve().unwrap();
                assert_eq!(config.access_token, "env-token");
                assert_eq!(config.access_token_secret, "p-secret");
                assert_eq!(config.zone, "tk1b");
                assert_eq!(config.retry_max, 3);
            },
        );
    }

    #[test]
    #[serial]
    fn test_missing_default_profile_is_ok() {
        let base = tempfile::tempdir().unwrap();
        with_clean_env(base.path(), &[], || {
            let mut config = Config::default();
            assert!(config.load_from_profile().is_ok());
            assert_eq!(config.profile, "default");
        });
    }

    #[test]
    #[serial]
    fn test_missing_named_profile_is_an_error() {
        let base = tempfile::tempdir().unwrap();
        with_clean_env(base.path(), &[("SAKURACLOUD_PROFILE", "staging")], || {
            let err = Config::default().resolve().unwrap_err();
            assert!(err.to_string().contains("staging"));
        });
    }

    #[test]
    #[serial]
    fn test_broken_profile() {
        let base = tempfile::tempdir().unwrap();
        write_profile(base.path(), "default", "{ not json");
        with_clean_env(base.path(), &[], || {
            let err = Config::default().load_from_profile().unwrap_err();
            assert!(matches!(err, ConfigError::Profile { .. }));
        });
    }
}
