// NetBox REST HTTP client
//
// Wraps `reqwest::Client` with NetBox URL construction, status mapping and
// limit/offset pagination. Endpoint methods live in `dcim.rs` and
// `virtualization.rs` as inherent impls to keep this module focused on
// transport mechanics.

use secrecy::SecretString;
use serde::de::DeserializeOwned;
use tracing::{debug, trace};
use url::Url;

use crate::error::Error;
use crate::models::Page;
use crate::transport::TransportConfig;

/// Page size requested from list endpoints.
pub const DEFAULT_PAGE_SIZE: u32 = 1000;

/// Raw HTTP client for the NetBox REST API.
///
/// List methods always return the complete collection: every page is
/// fetched before returning, and any failing page fails the whole call.
pub struct NetBoxClient {
    http: reqwest::Client,
    base_url: Url,
    page_size: u32,
}

impl NetBoxClient {
    /// Create a client from a base URL, API token and transport settings.
    ///
    /// A bare host (`netbox.example.com`) is accepted and gets `https://`.
    pub fn new(
        base_url: &str,
        token: &SecretString,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client(token)?;
        Ok(Self::with_client(http, normalize_base_url(base_url)?))
    }

    /// Wrap a pre-built `reqwest::Client` (caller manages auth headers).
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self {
            http,
            base_url,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Override the pagination page size.
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// The NetBox base URL (always ends with `/`).
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── URL builder ──────────────────────────────────────────────────

    /// Build `{base}/api/{path}`.
    pub(crate) fn api_url(&self, path: &str) -> Result<Url, Error> {
        Ok(self.base_url.join("api/")?.join(path)?)
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Verify that NetBox is reachable and the token is accepted.
    ///
    /// `GET /api/status/`
    pub async fn test_connection(&self) -> Result<(), Error> {
        let url = self.api_url("status/")?;
        debug!("GET {url}");

        let resp = self.http.get(url).send().await?;
        check_status("status/", resp).await.map(drop)
    }

    async fn get_page<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        offset: usize,
    ) -> Result<Page<T>, Error> {
        let url = self.api_url(path)?;
        trace!(%url, offset, "GET page");

        let resp = self
            .http
            .get(url)
            .query(query)
            .query(&[
                ("limit", self.page_size.to_string()),
                ("offset", offset.to_string()),
            ])
            .send()
            .await?;

        let resp = check_status(path, resp).await?;
        let body = resp.text().await?;
        serde_json::from_str(&body).map_err(|e| {
            let preview = &body[..body.len().min(200)];
            Error::Deserialization {
                endpoint: path.to_owned(),
                message: format!("{e} (body preview: {preview:?})"),
                body: body.clone(),
            }
        })
    }

    /// Collect all pages of a list endpoint into a single `Vec<T>`.
    pub(crate) async fn paginate_all<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>, Error> {
        let mut all = Vec::new();

        loop {
            let page: Page<T> = self.get_page(path, query, all.len()).await?;
            let received = page.results.len();
            all.extend(page.results);

            let page_size = usize::try_from(self.page_size).unwrap_or(usize::MAX);
            if page.next.is_none() || received == 0 || received < page_size {
                break;
            }
        }

        debug!(endpoint = path, count = all.len(), "fetched collection");
        Ok(all)
    }
}

/// Map non-success statuses into typed errors.
async fn check_status(endpoint: &str, resp: reqwest::Response) -> Result<reqwest::Response, Error> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Err(Error::Authentication {
            message: format!("NetBox rejected the API token (HTTP {status})"),
        });
    }

    let body = resp.text().await.unwrap_or_default();
    Err(Error::Api {
        endpoint: endpoint.to_owned(),
        status: status.as_u16(),
        message: if body.is_empty() {
            status.to_string()
        } else {
            body.chars().take(200).collect()
        },
    })
}

/// Accept `host`, `host/prefix`, or a full URL; always return a URL whose
/// path ends in `/` so relative joins stay beneath it.
pub fn normalize_base_url(raw: &str) -> Result<Url, Error> {
    let raw = raw.trim();
    let mut url = if raw.contains("://") {
        Url::parse(raw)?
    } else {
        Url::parse(&format!("https://{raw}"))?
    };

    let path = url.path().trim_end_matches('/').to_owned();
    let path = path.strip_suffix("/api").unwrap_or(&path).to_owned();
    url.set_path(&format!("{path}/"));
    Ok(url)
}
