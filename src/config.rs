//! Verifier configuration.
//!
//! Values come from serde (any format the caller deserializes) with defaults
//! filled in per field, and can be overlaid from `DKIC_*` environment
//! variables.

use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::common::http::HttpError;
use crate::dkic::KeyEncoding;

pub const DEFAULT_DNS_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_FETCH_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value:?} ({reason})")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
    #[error("HTTP client setup failed: {0}")]
    Client(#[from] HttpError),
}

/// Well-known DNS-over-HTTPS resolvers with a JSON API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DohProvider {
    Cloudflare,
    Google,
    Quad9,
}

impl DohProvider {
    pub fn url(self) -> &'static str {
        match self {
            DohProvider::Cloudflare => "https://cloudflare-dns.com/dns-query",
            DohProvider::Google => "https://dns.google/resolve",
            DohProvider::Quad9 => "https://dns.quad9.net:5053/dns-query",
        }
    }
}

impl fmt::Display for DohProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DohProvider::Cloudflare => "cloudflare",
            DohProvider::Google => "google",
            DohProvider::Quad9 => "quad9",
        })
    }
}

impl FromStr for DohProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cloudflare" => Ok(DohProvider::Cloudflare),
            "google" => Ok(DohProvider::Google),
            "quad9" => Ok(DohProvider::Quad9),
            other => Err(format!(
                "unknown DoH provider {:?} (expected cloudflare, google or quad9)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifierConfig {
    /// DNS-over-HTTPS JSON endpoint (default: Cloudflare)
    #[serde(default = "default_doh_url")]
    pub doh_url: String,

    /// Timeout for the DoH query in milliseconds (default: 5000)
    #[serde(default = "default_dns_timeout_ms")]
    pub dns_timeout_ms: u64,

    /// Timeout for each document fetch in milliseconds (default: 10000)
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,

    #[serde(default)]
    pub key_encoding: KeyEncoding,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_doh_url() -> String {
    DohProvider::Cloudflare.url().to_string()
}

fn default_dns_timeout_ms() -> u64 {
    DEFAULT_DNS_TIMEOUT_MS
}

fn default_fetch_timeout_ms() -> u64 {
    DEFAULT_FETCH_TIMEOUT_MS
}

fn default_user_agent() -> String {
    concat!("dkic-rs/", env!("CARGO_PKG_VERSION")).to_string()
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            doh_url: default_doh_url(),
            dns_timeout_ms: default_dns_timeout_ms(),
            fetch_timeout_ms: default_fetch_timeout_ms(),
            key_encoding: KeyEncoding::default(),
            user_agent: default_user_agent(),
        }
    }
}

impl VerifierConfig {
    /// Defaults overlaid with `DKIC_DOH_URL`, `DKIC_DNS_TIMEOUT_MS`,
    /// `DKIC_FETCH_TIMEOUT_MS` and `DKIC_KEY_ENCODING`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().overlay(|name| env::var(name).ok())
    }

    /// Apply overrides from `lookup`, keyed by environment variable name.
    pub fn overlay<L>(mut self, lookup: L) -> Result<Self, ConfigError>
    where
        L: Fn(&'static str) -> Option<String>,
    {
        if let Some(url) = lookup("DKIC_DOH_URL") {
            url::Url::parse(&url).map_err(|e| ConfigError::Invalid {
                name: "DKIC_DOH_URL",
                value: url.clone(),
                reason: e.to_string(),
            })?;
            self.doh_url = url;
        }
        if let Some(ms) = lookup("DKIC_DNS_TIMEOUT_MS") {
            self.dns_timeout_ms = parse_millis("DKIC_DNS_TIMEOUT_MS", ms)?;
        }
        if let Some(ms) = lookup("DKIC_FETCH_TIMEOUT_MS") {
            self.fetch_timeout_ms = parse_millis("DKIC_FETCH_TIMEOUT_MS", ms)?;
        }
        if let Some(encoding) = lookup("DKIC_KEY_ENCODING") {
            self.key_encoding = encoding.parse().map_err(|reason| ConfigError::Invalid {
                name: "DKIC_KEY_ENCODING",
                value: encoding.clone(),
                reason,
            })?;
        }
        Ok(self)
    }

    /// Reject values no verifier can run with, however they were loaded.
    pub fn validate(&self) -> Result<(), ConfigError> {
        url::Url::parse(&self.doh_url).map_err(|e| ConfigError::Invalid {
            name: "doh_url",
            value: self.doh_url.clone(),
            reason: e.to_string(),
        })?;
        for (name, ms) in [
            ("dns_timeout_ms", self.dns_timeout_ms),
            ("fetch_timeout_ms", self.fetch_timeout_ms),
        ] {
            if ms == 0 {
                return Err(ConfigError::Invalid {
                    name,
                    value: ms.to_string(),
                    reason: "timeout must be positive".into(),
                });
            }
        }
        Ok(())
    }

    pub fn dns_timeout(&self) -> Duration {
        Duration::from_millis(self.dns_timeout_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}

fn parse_millis(name: &'static str, value: String) -> Result<u64, ConfigError> {
    let parsed = value.trim().parse::<u64>();
    match parsed {
        Ok(0) => Err(ConfigError::Invalid {
            name,
            value,
            reason: "timeout must be positive".into(),
        }),
        Ok(ms) => Ok(ms),
        Err(e) => Err(ConfigError::Invalid {
            name,
            reason: e.to_string(),
            value,
        }),
    }
}
