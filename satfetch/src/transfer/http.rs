//! HTTP client abstraction for testability

use std::fmt;
use std::io::{self, Read};
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use super::error::{TransferError, TransferResult};

/// Default connect/read timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Per-request options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestOptions {
    /// Ask for the byte range `[start, end)` with `Range: bytes={start}-`.
    pub range_start: Option<u64>,
    /// Value of the `Authorization` header.
    pub authorization: Option<String>,
}

impl RequestOptions {
    pub fn with_authorization(authorization: Option<&str>) -> Self {
        Self {
            range_start: None,
            authorization: authorization.map(str::to_string),
        }
    }

    pub fn range_from(mut self, start: u64) -> Self {
        self.range_start = Some(start);
        self
    }
}

/// An open response whose body has not been read yet.
pub struct HttpResponse {
    pub status: u16,
    /// `Content-Length` of this response, if the server sent one.
    pub content_length: Option<u64>,
    body: Box<dyn Read + Send>,
}

impl HttpResponse {
    pub fn new(status: u16, content_length: Option<u64>, body: Box<dyn Read + Send>) -> Self {
        Self {
            status,
            content_length,
            body,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn body(&mut self) -> &mut (dyn Read + Send) {
        self.body.as_mut()
    }

    /// Read the whole body as UTF-8 text.
    pub fn text(mut self, url: &str) -> TransferResult<String> {
        let mut text = String::new();
        self.body
            .read_to_string(&mut text)
            .map_err(|e| TransferError::Request {
                url: url.to_string(),
                reason: format!("failed to read response: {}", e),
            })?;
        Ok(text)
    }
}

impl fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Trait for HTTP client operations.
///
/// This abstraction allows for dependency injection and easier testing
/// by enabling mock HTTP clients in tests. Implementations return every
/// status as a response; only transport failures are errors.
pub trait HttpClient: Send + Sync {
    /// Opens a GET request and returns once headers are available.
    fn get(&self, url: &str, options: &RequestOptions) -> TransferResult<HttpResponse>;

    /// Connect/read timeout, reported in timeout errors.
    fn timeout(&self) -> Duration {
        Duration::from_secs(DEFAULT_TIMEOUT_SECS)
    }
}

/// Basic-auth credentials for a catalog.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

impl Credentials {
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
        }
    }

    /// `Authorization` header value.
    pub fn basic_token(&self) -> String {
        format!(
            "Basic {}",
            STANDARD.encode(format!("{}:{}", self.user, self.password))
        )
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"***")
            .finish()
    }
}

/// Proxy scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProxyKind {
    #[default]
    Http,
    Https,
}

impl std::str::FromStr for ProxyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "http" => Ok(ProxyKind::Http),
            "https" => Ok(ProxyKind::Https),
            other => Err(format!("unsupported proxy type: {}", other)),
        }
    }
}

/// HTTP(S) proxy applied to every connection of a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    pub kind: ProxyKind,
    pub host: String,
    pub port: u16,
    pub credentials: Option<Credentials>,
}

impl ProxyConfig {
    pub fn url(&self) -> String {
        let scheme = match self.kind {
            ProxyKind::Http => "http",
            ProxyKind::Https => "https",
        };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }
}

/// Network settings for one client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkConfig {
    pub timeout: Duration,
    pub proxy: Option<ProxyConfig>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            proxy: None,
        }
    }
}

/// Real HTTP client implementation using reqwest.
pub struct ReqwestClient {
    client: reqwest::blocking::Client,
    timeout: Duration,
}

impl ReqwestClient {
    /// Creates a new ReqwestClient with default configuration.
    pub fn new() -> TransferResult<Self> {
        Self::with_config(&NetworkConfig::default())
    }

    /// Creates a client honoring the timeout and proxy of `config`.
    pub fn with_config(config: &NetworkConfig) -> TransferResult<Self> {
        let mut builder = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.timeout)
            .user_agent(concat!("satfetch/", env!("CARGO_PKG_VERSION")));

        if let Some(proxy) = &config.proxy {
            let mut reqwest_proxy = reqwest::Proxy::all(proxy.url())
                .map_err(|e| TransferError::Client(format!("invalid proxy: {}", e)))?;
            if let Some(credentials) = &proxy.credentials {
                reqwest_proxy = reqwest_proxy.basic_auth(&credentials.user, &credentials.password);
            }
            builder = builder.proxy(reqwest_proxy);
        }

        let client = builder
            .build()
            .map_err(|e| TransferError::Client(e.to_string()))?;

        Ok(Self {
            client,
            timeout: config.timeout,
        })
    }
}

impl HttpClient for ReqwestClient {
    fn get(&self, url: &str, options: &RequestOptions) -> TransferResult<HttpResponse> {
        let mut request = self.client.get(url);
        if let Some(auth) = &options.authorization {
            request = request.header(reqwest::header::AUTHORIZATION, auth);
        }
        if let Some(start) = options.range_start {
            request = request.header(reqwest::header::RANGE, format!("bytes={}-", start));
        }

        let response = request.send().map_err(|e| {
            if e.is_timeout() {
                TransferError::Timeout {
                    url: url.to_string(),
                    timeout_secs: self.timeout.as_secs(),
                }
            } else {
                TransferError::Request {
                    url: url.to_string(),
                    reason: e.to_string(),
                }
            }
        })?;

        let status = response.status().as_u16();
        let content_length = response.content_length();
        Ok(HttpResponse::new(status, content_length, Box::new(response)))
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Whether a body read failed because the connection timed out.
pub(crate) fn is_timeout_error(error: &io::Error) -> bool {
    if error.kind() == io::ErrorKind::TimedOut {
        return true;
    }
    error
        .get_ref()
        .and_then(|inner| inner.downcast_ref::<reqwest::Error>())
        .is_some_and(|e| e.is_timeout())
}
