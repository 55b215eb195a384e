use domus_core::error::AppError;
use url::Url;

pub const DEFAULT_PROXY_ENDPOINT: &str = "https://api.scraperapi.com/";
pub const DEFAULT_COUNTRY_CODE: &str = "ro";

/// Rendering-proxy transport.
///
/// Target pages are not visited directly: the browser navigates to the
/// proxy endpoint with the target URL, the API key and the country code as
/// query parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    endpoint: String,
    api_key: Option<String>,
    country_code: String,
}

impl ProxyConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            endpoint: DEFAULT_PROXY_ENDPOINT.to_string(),
            api_key: Some(api_key.into()),
            country_code: DEFAULT_COUNTRY_CODE.to_string(),
        }
    }

    /// No proxy: targets are visited directly.
    pub fn direct() -> Self {
        Self {
            endpoint: DEFAULT_PROXY_ENDPOINT.to_string(),
            api_key: None,
            country_code: DEFAULT_COUNTRY_CODE.to_string(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_country_code(mut self, country_code: impl Into<String>) -> Self {
        self.country_code = country_code.into();
        self
    }

    pub fn is_direct(&self) -> bool {
        self.api_key.is_none()
    }

    /// URL the browser should navigate to for `target`.
    pub fn proxied_url(&self, target: &str) -> Result<String, AppError> {
        let Some(api_key) = &self.api_key else {
            return Ok(target.to_string());
        };

        let mut url = Url::parse(&self.endpoint)
            .map_err(|e| AppError::ConfigError(format!("Invalid proxy endpoint: {e}")))?;
        url.query_pairs_mut()
            .append_pair("api_key", api_key)
            .append_pair("url", target)
            .append_pair("country_code", &self.country_code);
        Ok(url.into())
    }
}
