//! Resource Fetcher
//!
//! Retrieves a calendar resource over HTTP with conditional-GET semantics,
//! or from the local filesystem. Redirects are followed manually so that a
//! permanent redirect can be reported back as the new canonical URL.

pub mod http_date;
pub mod transport;

use std::fs;
use std::path::Path;

use lazy_static::lazy_static;
use regex::Regex;
use url::Url;

use crate::error::{AppResult, SyncError};
use crate::models::Credential;

pub use transport::{HttpTransport, Transport, TransportResponse};

pub const MIME_CALENDAR_OR_OTHER: &str = "text/calendar, */*;q=0.9";
pub const MAX_REDIRECT_COUNT: u32 = 5;

lazy_static! {
    static ref CHARSET_RE: Regex = Regex::new(r#"(?i)charset="?([^";\s]+)"?"#).unwrap();
}

/// One fetch attempt for a subscription's resource.
#[derive(Debug, Clone, Copy, Default)]
pub struct FetchRequest<'a> {
    /// http(s) URL, file:// URL or plain filesystem path.
    pub uri: &'a str,
    pub credential: Option<&'a Credential>,
    /// ETag from the last successful sync, sent as `If-None-Match`.
    pub if_none_match: Option<&'a str>,
    /// Last-Modified (epoch ms) from the last successful sync, sent as
    /// `If-Modified-Since`.
    pub if_modified_since: Option<i64>,
}

/// A successfully retrieved resource.
#[derive(Debug, Clone)]
pub struct FetchedResource {
    pub data: Vec<u8>,
    pub content_type: Option<String>,
    pub etag: Option<String>,
    /// Last-Modified response header as epoch milliseconds.
    pub last_modified: Option<i64>,
    /// File name for local resources; servers don't provide one.
    pub display_name: Option<String>,
}

impl FetchedResource {
    /// Charset label from the Content-Type header, if any.
    pub fn charset(&self) -> Option<String> {
        let content_type = self.content_type.as_deref()?;
        CHARSET_RE
            .captures(content_type)
            .map(|captures| captures[1].to_string())
    }
}

#[derive(Debug, Clone)]
pub enum FetchOutcome {
    Success(FetchedResource),
    /// HTTP 304: the resource is unchanged since the conditional tokens were
    /// issued. The caller must not re-parse or re-reconcile.
    NotModified,
}

#[derive(Debug, Clone)]
pub struct Fetched {
    pub outcome: FetchOutcome,
    /// Set when a permanent redirect (301/308) was seen before any temporary
    /// one; the caller should persist this as the subscription's new URL.
    pub permanent_url: Option<Url>,
}

/// Fetches the resource named by `request`.
///
/// Network errors, HTTP error statuses and the redirect cap all surface as
/// `Err`; an unchanged resource (304) is the `NotModified` outcome, not an
/// error.
pub fn fetch(transport: &dyn Transport, request: &FetchRequest) -> AppResult<Fetched> {
    let uri = request.uri.trim();
    let lower = uri.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        fetch_network(transport, request)
    } else if lower.starts_with("file://") {
        let url = Url::parse(uri)?;
        let path = url
            .to_file_path()
            .map_err(|_| SyncError::config(format!("not a file path: {uri}")))?;
        fetch_local(&path)
    } else {
        fetch_local(Path::new(uri))
    }
}

fn fetch_network(transport: &dyn Transport, request: &FetchRequest) -> AppResult<Fetched> {
    let mut url = Url::parse(request.uri)?;
    let mut permanent_url: Option<Url> = None;
    let mut followed_temp_redirect = false;
    let mut redirects: u32 = 0;

    loop {
        log::info!("Fetching remote resource {url}");

        let mut headers: Vec<(&'static str, String)> =
            vec![("Accept", MIME_CALENDAR_OR_OTHER.to_string())];
        if let Some(etag) = request.if_none_match {
            headers.push(("If-None-Match", etag.to_string()));
        }
        if let Some(timestamp) = request.if_modified_since {
            headers.push(("If-Modified-Since", http_date::format_http_date(timestamp)));
        }
        let auth = request
            .credential
            .map(|c| (c.username.as_str(), c.password.as_str()));

        let response = transport.get(&url, &headers, auth)?;

        match response.status {
            200..=299 => {
                let resource = FetchedResource {
                    content_type: response.header("Content-Type").map(str::to_string),
                    etag: response.header("ETag").map(str::to_string),
                    last_modified: response
                        .header("Last-Modified")
                        .and_then(http_date::parse_http_date),
                    display_name: None,
                    data: response.body,
                };
                return Ok(Fetched {
                    outcome: FetchOutcome::Success(resource),
                    permanent_url,
                });
            }

            304 => {
                return Ok(Fetched {
                    outcome: FetchOutcome::NotModified,
                    permanent_url,
                })
            }

            300..=399 => {
                let location = response.header("Location").ok_or_else(|| {
                    SyncError::network(format!("Got {} without Location", response.status_line))
                })?;
                let target = url
                    .join(location)
                    .map_err(|e| SyncError::network(format!("Invalid redirect target: {e}")))?;
                log::debug!("Got redirect {} to {target}", response.status);

                redirects += 1;
                if redirects > MAX_REDIRECT_COUNT {
                    return Err(SyncError::network(format!(
                        "More than {MAX_REDIRECT_COUNT} redirects"
                    )));
                }

                // never downgrade from HTTPS to a potentially insecure scheme
                if url.scheme() == "https" && target.scheme() != "https" {
                    return Err(SyncError::network(format!(
                        "Received redirect from HTTPS to {}",
                        target.scheme()
                    )));
                }

                // a permanent redirect only becomes the canonical URL while
                // no temporary redirect has been followed yet
                if !followed_temp_redirect {
                    if response.status == 301 || response.status == 308 {
                        log::info!("Got permanent redirect to {target}");
                        permanent_url = Some(target.clone());
                    } else {
                        followed_temp_redirect = true;
                    }
                }

                url = target;
            }

            _ => return Err(SyncError::HttpStatus(response.status_line)),
        }
    }
}

/// Local files have no conditional-request semantics; they are always
/// treated as modified.
fn fetch_local(path: &Path) -> AppResult<Fetched> {
    log::info!("Fetching local file {}", path.display());
    let data = fs::read(path)?;
    let display_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned());
    Ok(Fetched {
        outcome: FetchOutcome::Success(FetchedResource {
            data,
            content_type: None,
            etag: None,
            last_modified: None,
            display_name,
        }),
        permanent_url: None,
    })
}
