use reqwest::blocking::Client;
use reqwest::redirect;
use url::Url;

use crate::config::AppConfig;
use crate::error::AppResult;

/// Response metadata and body as seen by the fetcher.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    /// Status line for error messages, e.g. "404 Not Found".
    pub status_line: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl TransportResponse {
    /// Case-insensitive header lookup, first match wins.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Blocking HTTP GET with caller-supplied headers. Redirects must not be
/// followed by the implementation; the fetcher inspects them itself.
pub trait Transport {
    fn get(
        &self,
        url: &Url,
        headers: &[(&'static str, String)],
        basic_auth: Option<(&str, &str)>,
    ) -> AppResult<TransportResponse>;
}

/// Production transport backed by a blocking reqwest client.
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(config: &AppConfig) -> AppResult<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .connect_timeout(config.connect_timeout)
            .timeout(config.timeout)
            .redirect(redirect::Policy::none())
            .build()?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn get(
        &self,
        url: &Url,
        headers: &[(&'static str, String)],
        basic_auth: Option<(&str, &str)>,
    ) -> AppResult<TransportResponse> {
        let mut request = self.client.get(url.clone());
        for (name, value) in headers {
            request = request.header(*name, value);
        }
        if let Some((username, password)) = basic_auth {
            request = request.basic_auth(username, Some(password));
        }

        let response = request.send()?;
        let status = response.status();
        let status_line = match status.canonical_reason() {
            Some(reason) => format!("{} {}", status.as_u16(), reason),
            None => status.as_u16().to_string(),
        };
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.bytes()?.to_vec();

        Ok(TransportResponse {
            status: status.as_u16(),
            status_line,
            headers,
            body,
        })
    }
}
