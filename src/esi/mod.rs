//! ESI market client: paginated order fetching, expiry probes, name lookups.
//!
//! A full fetch walks `page = 1, 2, 3, ...` and hands every decoded page to a
//! [`PageSink`] as soon as it arrives, so a snapshot is never buffered whole.
//! Each page gets its own retry budget; once exhausted the whole fetch fails
//! and pages already handed to the sink are left to the caller to clean up.
//!
//! The cache expiry of a snapshot is taken from the `Expires` header of page 1.
//! Later pages' expiry headers are ignored.

pub mod tokens;


use crate::config::{EsiConfig, RetryConfig};
use crate::error::{AuthError, Error, Result};
use crate::retry::fetch_with_retry;
use crate::types::{Location, LocationKind, MarketOrder};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{EXPIRES, HeaderMap};
use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

pub use tokens::{AccessToken, TokenManager, TokenReader, TokenResponse};

/// One decoded page of a snapshot
#[derive(Clone, Debug)]
pub struct SnapshotPage {
    /// Location the page belongs to
    pub location: Location,
    /// 1-based page number
    pub page: u32,
    /// Orders in upstream order
    pub orders: Vec<MarketOrder>,
    /// Expiry of the snapshot (from page 1)
    pub expiry: DateTime<Utc>,
}

/// Consumer of snapshot pages
///
/// Returning an error aborts the fetch.
#[async_trait]
pub trait PageSink: Send {
    /// Accept the next page of the snapshot
    async fn accept(&mut self, page: SnapshotPage) -> Result<()>;
}

/// Outcome of a completed multi-page fetch
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FetchSummary {
    /// Number of pages handed to the sink
    pub pages: u32,
    /// Number of orders across all pages
    pub orders: usize,
    /// Expiry of the snapshot
    pub expiry: DateTime<Utc>,
}

/// HTTP client for the ESI market endpoints
#[derive(Clone)]
pub struct EsiClient {
    http: reqwest::Client,
    base_url: Url,
    datasource: String,
    page_size: usize,
    retry: RetryConfig,
    tokens: Option<TokenReader>,
}

impl EsiClient {
    /// Create a client for the configured ESI endpoint
    ///
    /// `tokens` must be provided when structures are fetched.
    pub fn new(
        http: reqwest::Client,
        esi: &EsiConfig,
        retry: RetryConfig,
        tokens: Option<TokenReader>,
    ) -> Result<Self> {
        let mut base = esi.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }

        Ok(Self {
            http,
            base_url: Url::parse(&base)?,
            datasource: esi.datasource.clone(),
            page_size: esi.page_size,
            retry,
            tokens,
        })
    }

    /// Build the shared reqwest client from configuration
    pub fn http_client(esi: &EsiConfig) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(esi.request_timeout)
            .user_agent(esi.user_agent.clone())
            .build()
            .map_err(Error::Network)
    }

    /// URL of one page of a location's order book
    pub fn orders_url(&self, location: Location, page: u32) -> Result<Url> {
        let path = match location.kind {
            LocationKind::Region => format!("markets/{}/orders/", location.id),
            LocationKind::Structure => format!("markets/structures/{}/", location.id),
        };

        let mut url = self.base_url.join(&path)?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("datasource", &self.datasource);
            if location.kind == LocationKind::Region {
                query.append_pair("order_type", "all");
            }
            query.append_pair("page", &page.to_string());
        }
        Ok(url)
    }

    fn name_url(&self, location: Location) -> Result<Url> {
        let path = match location.kind {
            LocationKind::Region => format!("universe/regions/{}/", location.id),
            LocationKind::Structure => format!("universe/structures/{}/", location.id),
        };

        let mut url = self.base_url.join(&path)?;
        url.query_pairs_mut()
            .append_pair("datasource", &self.datasource);
        Ok(url)
    }

    /// Attach the bearer token for access-controlled locations
    fn authorize(
        &self,
        request: reqwest::RequestBuilder,
        location: Location,
    ) -> Result<reqwest::RequestBuilder> {
        if !location.kind.requires_auth() {
            return Ok(request);
        }

        let token = self
            .tokens
            .as_ref()
            .and_then(TokenReader::current)
            .ok_or(AuthError::MissingToken)?;
        Ok(request.bearer_auth(token))
    }

    /// Probe a location's cache expiry without fetching the order book
    pub async fn get_expiry(&self, location: Location) -> Result<DateTime<Utc>> {
        let url = self.orders_url(location, 1)?;
        let response = self
            .authorize(self.http.head(url.clone()), location)?
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        parse_expires(response.headers())
    }

    /// Fetch every page of a location's order book into `sink`
    pub async fn fetch_orders<S>(&self, location: Location, sink: &mut S) -> Result<FetchSummary>
    where
        S: PageSink + ?Sized,
    {
        let mut page: u32 = 1;
        let mut snapshot_expiry: Option<DateTime<Utc>> = None;
        let mut total_orders = 0usize;

        loop {
            let url = self.orders_url(location, page)?;
            let first = snapshot_expiry.is_none();

            let (orders, page_expiry) =
                fetch_with_retry(&self.retry, || self.get_page(location, &url, first)).await?;

            let expiry = match (snapshot_expiry, page_expiry) {
                (Some(expiry), _) => expiry,
                (None, Some(expiry)) => {
                    snapshot_expiry = Some(expiry);
                    expiry
                }
                (None, None) => {
                    return Err(Error::Decode(format!(
                        "first page of {location} carried no expiry"
                    )));
                }
            };

            let count = orders.len();
            total_orders += count;
            debug!(location_id = location.id, page, orders = count, "Fetched order page");

            sink.accept(SnapshotPage {
                location,
                page,
                orders,
                expiry,
            })
            .await?;

            if count < self.page_size {
                info!(
                    location_id = location.id,
                    pages = page,
                    orders = total_orders,
                    expiry = %expiry,
                    "Fetched order book"
                );
                return Ok(FetchSummary {
                    pages: page,
                    orders: total_orders,
                    expiry,
                });
            }

            page += 1;
        }
    }

    /// Single attempt at one page; the expiry is only read when asked for
    async fn get_page(
        &self,
        location: Location,
        url: &Url,
        read_expiry: bool,
    ) -> Result<(Vec<MarketOrder>, Option<DateTime<Utc>>)> {
        let response = self
            .authorize(self.http.get(url.clone()), location)?
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let expiry = if read_expiry {
            Some(parse_expires(response.headers())?)
        } else {
            None
        };

        let body = response.bytes().await?;
        let orders: Vec<MarketOrder> = serde_json::from_slice(&body)
            .map_err(|e| Error::Decode(format!("order page from {url}: {e}")))?;

        Ok((orders, expiry))
    }

    /// Resolve the display name of a region or structure
    pub async fn get_location_name(&self, location: Location) -> Result<String> {
        #[derive(Deserialize)]
        struct Named {
            name: String,
        }

        let url = self.name_url(location)?;
        let response = self
            .authorize(self.http.get(url.clone()), location)?
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response.bytes().await?;
        let named: Named = serde_json::from_slice(&body)
            .map_err(|e| Error::Decode(format!("location name from {url}: {e}")))?;
        Ok(named.name)
    }
}

/// Read the cache expiry from an `Expires` header (RFC 1123 / HTTP-date)
pub fn parse_expires(headers: &HeaderMap) -> Result<DateTime<Utc>> {
    let raw = headers
        .get(EXPIRES)
        .ok_or_else(|| Error::Decode("response has no Expires header".into()))?
        .to_str()
        .map_err(|e| Error::Decode(format!("unreadable Expires header: {e}")))?;

    DateTime::parse_from_rfc2822(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Decode(format!("invalid Expires header {raw:?}: {e}")))
}
