use crate::config::Upstreams;
use crate::context::RequestContext;
use crate::errors::{Error, Result};
use crate::metrics::{UPSTREAM_FAILURES_TOTAL, UPSTREAM_LATENCY_SECONDS, UPSTREAM_REQUESTS_TOTAL};
use crate::paging::QueryParams;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, error, trace};
use url::Url;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meta {
    #[serde(default)]
    pub total_records: u64,
    #[serde(default)]
    pub count: u64,
    pub offset: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Links {
    #[serde(rename = "self")]
    pub this: Option<String>,
    pub first: Option<String>,
    pub prev: Option<String>,
    pub next: Option<String>,
    pub last: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Resource {
    pub id: String,
    #[serde(rename = "type")]
    pub resource_type: String,
}

/// Response envelope shared by all upstream services. `data` is decoded by the caller.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Envelope {
    pub meta: Option<Meta>,
    #[serde(default)]
    pub data: serde_json::Value,
    pub links: Option<Links>,
    #[serde(default)]
    pub included: Vec<Resource>,
}

impl Envelope {
    fn empty_list() -> Self {
        Envelope {
            meta: None,
            data: serde_json::Value::Array(Vec::new()),
            links: None,
            included: Vec::new(),
        }
    }

    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(T::deserialize(&self.data)?)
    }

    pub fn total_records(&self) -> u64 {
        self.meta.as_ref().map(|m| m.total_records).unwrap_or(0)
    }
}

const JSON: &str = "application/json";

/// Joins a base url and a relative path, dropping stray slashes.
pub fn join_url(base: &str, path: &str) -> Result<Url> {
    let path = path.trim_matches('/');
    let joined = format!("{}/{}", base.trim_end_matches('/'), path);
    Ok(Url::parse(joined.trim_end_matches('/'))?)
}

/// HTTP client for the upstream services. Cheap to clone; clones share one connection pool.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    http: reqwest::Client,
}

impl UpstreamClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(UpstreamClient { http })
    }

    async fn send(
        &self,
        ctx: &RequestContext,
        method: Method,
        url: &str,
        body: Option<(&str, Vec<u8>)>,
        accept: Option<&str>,
    ) -> Result<(StatusCode, Vec<u8>)> {
        debug!(method = %method, url = %url, "upstream request");
        UPSTREAM_REQUESTS_TOTAL.inc();
        let start = Instant::now();

        let mut request = self
            .http
            .request(method, url)
            .bearer_auth(ctx.token());
        if let Some((content_type, body)) = body {
            request = request
                .header(reqwest::header::CONTENT_TYPE, content_type)
                .body(body);
        }
        if let Some(accept) = accept {
            request = request.header(reqwest::header::ACCEPT, accept);
        }

        let result = async {
            let response = request.send().await?;
            let status = response.status();
            let body = response.bytes().await?;
            Ok::<_, reqwest::Error>((status, body.to_vec()))
        }
        .await;

        UPSTREAM_LATENCY_SECONDS.observe(start.elapsed().as_secs_f64());

        match result {
            Ok(ok) => Ok(ok),
            Err(e) => {
                UPSTREAM_FAILURES_TOTAL.inc();
                error!(url = %url, "Upstream request failed: {}", e);
                Err(Error::Http(e))
            }
        }
    }

    fn status_error(url: &str, status: StatusCode) -> Error {
        UPSTREAM_FAILURES_TOTAL.inc();
        match status {
            StatusCode::UNAUTHORIZED => {
                error!(url = %url, "Upstream request not authorized");
                Error::Unauthorized
            }
            StatusCode::NOT_FOUND => {
                error!(url = %url, "Upstream resource not found");
                Error::NotFound
            }
            _ => {
                error!(url = %url, status = status.as_u16(), "Upstream request failed");
                Error::RequestFailed(status)
            }
        }
    }

    fn check_status(url: &str, status: StatusCode, accepted: &[StatusCode]) -> Result<()> {
        if accepted.contains(&status) {
            Ok(())
        } else {
            Err(Self::status_error(url, status))
        }
    }

    pub async fn get(
        &self,
        ctx: &RequestContext,
        base: &str,
        path: &str,
        query: &QueryParams,
    ) -> Result<Envelope> {
        let mut url = join_url(base, path)?;
        if !query.is_empty() {
            url.set_query(Some(&query.encode()));
        }
        let url = String::from(url);

        let (status, body) = self.send(ctx, Method::GET, &url, None, None).await?;

        if status.is_client_error() || status.is_server_error() {
            return Err(Self::status_error(&url, status));
        }

        if body.as_slice() == b"[]" {
            return Ok(Envelope::empty_list());
        }

        let envelope: Envelope = serde_json::from_slice(&body).map_err(|e| {
            UPSTREAM_FAILURES_TOTAL.inc();
            error!(url = %url, "Failed to decode upstream response: {}", e);
            Error::Decode(e)
        })?;

        trace!(url = %url, data = %envelope.data, "upstream response");

        Ok(envelope)
    }

    pub async fn post<B: Serialize>(&self, ctx: &RequestContext, base: &str, body: &B) -> Result<()> {
        let url = String::from(join_url(base, "")?);
        let body = serde_json::to_vec(body)?;
        debug!(url = %url, body = %String::from_utf8_lossy(&body), "POST");

        let (status, _) = self
            .send(ctx, Method::POST, &url, Some((JSON, body)), None)
            .await?;
        Self::check_status(&url, status, &[StatusCode::OK, StatusCode::CREATED])
    }

    pub async fn patch<B: Serialize>(
        &self,
        ctx: &RequestContext,
        base: &str,
        id: &str,
        body: &B,
    ) -> Result<()> {
        let url = String::from(join_url(base, id)?);
        let body = serde_json::to_vec(body)?;
        debug!(url = %url, body = %String::from_utf8_lossy(&body), "PATCH");

        let (status, _) = self
            .send(ctx, Method::PATCH, &url, Some((JSON, body)), None)
            .await?;
        Self::check_status(&url, status, &[StatusCode::OK, StatusCode::NO_CONTENT])
    }

    pub async fn delete(&self, ctx: &RequestContext, base: &str, id: &str) -> Result<()> {
        let url = String::from(join_url(base, id)?);
        debug!(url = %url, "DELETE");

        let (status, _) = self.send(ctx, Method::DELETE, &url, None, None).await?;
        Self::check_status(&url, status, &[StatusCode::OK, StatusCode::NO_CONTENT])
    }

    /// GET without the JSON envelope, e.g. a file export.
    pub async fn get_bytes(
        &self,
        ctx: &RequestContext,
        base: &str,
        path: &str,
        query: &QueryParams,
        accept: &str,
    ) -> Result<Vec<u8>> {
        let mut url = join_url(base, path)?;
        if !query.is_empty() {
            url.set_query(Some(&query.encode()));
        }
        let url = String::from(url);

        let (status, body) = self
            .send(ctx, Method::GET, &url, None, Some(accept))
            .await?;
        Self::check_status(&url, status, &[StatusCode::OK])?;
        Ok(body)
    }

    /// POST of an opaque body, e.g. an uploaded file.
    pub async fn post_bytes(
        &self,
        ctx: &RequestContext,
        base: &str,
        path: &str,
        query: &QueryParams,
        content_type: &str,
        body: Vec<u8>,
    ) -> Result<()> {
        let mut url = join_url(base, path)?;
        if !query.is_empty() {
            url.set_query(Some(&query.encode()));
        }
        let url = String::from(url);
        debug!(url = %url, bytes = body.len(), content_type = %content_type, "POST");

        let (status, _) = self
            .send(ctx, Method::POST, &url, Some((content_type, body)), None)
            .await?;
        Self::check_status(
            &url,
            status,
            &[StatusCode::OK, StatusCode::CREATED, StatusCode::NO_CONTENT],
        )
    }
}

/// Upstream services behind one handle. Operations live in `devices` and `things`.
#[derive(Debug, Clone)]
pub struct Upstream {
    pub(crate) client: UpstreamClient,
    pub(crate) urls: Upstreams,
}

impl Upstream {
    pub fn new(client: UpstreamClient, urls: Upstreams) -> Self {
        Upstream { client, urls }
    }

    pub fn urls(&self) -> &Upstreams {
        &self.urls
    }
}
