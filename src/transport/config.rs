//! Transport settings: one request timeout plus an optional proxy.

use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::time::Duration;
use url::Url;

use crate::{Error, ErrorContext, Result};

const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyKind {
    Http,
    Https,
    Socks5,
    /// SOCKS5 with host names resolved by the proxy.
    Socks5h,
}

impl ProxyKind {
    fn scheme(&self) -> &'static str {
        match self {
            ProxyKind::Http => "http",
            ProxyKind::Https => "https",
            ProxyKind::Socks5 => "socks5",
            ProxyKind::Socks5h => "socks5h",
        }
    }
}

/// Proxy applied uniformly to every provider.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyConfig {
    pub kind: ProxyKind,
    pub host: String,
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl fmt::Debug for ProxyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyConfig")
            .field("kind", &self.kind)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl ProxyConfig {
    pub fn new(kind: ProxyKind, host: impl Into<String>, port: u16) -> Self {
        Self {
            kind,
            host: host.into(),
            port,
            username: None,
            password: None,
        }
    }

    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Parse `http://[user:pass@]host:port`, `https://...`, `socks5://...` or `socks5h://...`.
    pub fn parse(raw: &str) -> Result<Self> {
        let invalid = |msg: String| {
            Error::configuration_with_context(
                msg,
                ErrorContext::new()
                    .with_field_path("proxy")
                    .with_source("transport_config"),
            )
        };
        let url = Url::parse(raw).map_err(|e| invalid(format!("invalid proxy URL: {}", e)))?;
        let kind = match url.scheme() {
            "http" => ProxyKind::Http,
            "https" => ProxyKind::Https,
            "socks5" => ProxyKind::Socks5,
            "socks5h" => ProxyKind::Socks5h,
            other => return Err(invalid(format!("unsupported proxy scheme '{}'", other))),
        };
        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| invalid("proxy URL has no host".to_string()))?
            .to_string();
        let port = match (url.port_or_known_default(), kind) {
            (Some(p), _) => p,
            (None, ProxyKind::Socks5 | ProxyKind::Socks5h) => 1080,
            (None, _) => return Err(invalid("proxy URL has no port".to_string())),
        };
        let username = Some(url.username())
            .filter(|u| !u.is_empty())
            .map(String::from);
        let password = url.password().map(String::from);
        Ok(Self {
            kind,
            host,
            port,
            username,
            password,
        })
    }

    /// Proxy URL without credentials.
    pub fn url(&self) -> Result<Url> {
        Url::parse(&format!("{}://{}:{}", self.kind.scheme(), self.host, self.port)).map_err(
            |e| {
                Error::configuration_with_context(
                    format!("invalid proxy address: {}", e),
                    ErrorContext::new()
                        .with_field_path("proxy.host")
                        .with_source("transport_config"),
                )
            },
        )
    }

    fn url_with_credentials(&self) -> Result<Url> {
        let mut url = self.url()?;
        if let Some(user) = &self.username {
            url.set_username(user)
                .and_then(|_| url.set_password(self.password.as_deref()))
                .map_err(|_| {
                    Error::configuration_with_context(
                        "proxy credentials cannot be embedded in the proxy URL",
                        ErrorContext::new()
                            .with_field_path("proxy.username")
                            .with_source("transport_config"),
                    )
                })?;
        }
        Ok(url)
    }

    pub(crate) fn to_reqwest(&self) -> Result<reqwest::Proxy> {
        let to_err = |e: reqwest::Error| {
            Error::configuration_with_context(
                format!("invalid proxy configuration: {}", e),
                ErrorContext::new().with_source("transport_config"),
            )
        };
        match self.kind {
            // SOCKS credentials only travel inside the URL.
            ProxyKind::Socks5 | ProxyKind::Socks5h => {
                reqwest::Proxy::all(self.url_with_credentials()?.as_str()).map_err(to_err)
            }
            ProxyKind::Http | ProxyKind::Https => {
                let proxy = reqwest::Proxy::all(self.url()?.as_str()).map_err(to_err)?;
                Ok(match &self.username {
                    Some(user) => {
                        proxy.basic_auth(user, self.password.as_deref().unwrap_or_default())
                    }
                    None => proxy,
                })
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    /// Deadline for connecting plus receiving a full (non-streaming) response, and
    /// the maximum gap between chunks of a streaming response.
    pub timeout: Duration,
    pub proxy: Option<ProxyConfig>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            proxy: None,
        }
    }
}

impl TransportConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_proxy(mut self, proxy: ProxyConfig) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Defaults overridden by `LLM_HTTP_TIMEOUT_SECS` and `LLM_PROXY_URL`.
    pub fn from_env() -> Result<Self> {
        let mut cfg = Self::default();
        if let Ok(raw) = env::var("LLM_HTTP_TIMEOUT_SECS") {
            let secs = raw.trim().parse::<u64>().ok().filter(|s| *s > 0).ok_or_else(|| {
                Error::configuration_with_context(
                    format!("LLM_HTTP_TIMEOUT_SECS must be a positive integer, got '{}'", raw),
                    ErrorContext::new()
                        .with_field_path("LLM_HTTP_TIMEOUT_SECS")
                        .with_source("transport_config"),
                )
            })?;
            cfg.timeout = Duration::from_secs(secs);
        }
        if let Ok(raw) = env::var("LLM_PROXY_URL") {
            if !raw.trim().is_empty() {
                cfg.proxy = Some(ProxyConfig::parse(raw.trim())?);
            }
        }
        Ok(cfg)
    }
}
