//! HTTP client for the registry REST API.

use reqwest::{RequestBuilder, Response};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};
use url::Url;

use crate::error::{Operation, RegistryError};
use crate::models::{EntryList, RegistryEntry, ServerConfig};
use crate::namespace::Namespace;

/// Page size used when the caller does not pick one.
pub const DEFAULT_LIMIT: u32 = 50;

fn build_http_client() -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .user_agent(concat!("mcpreg/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// Filters for [`RegistryClient::list_entries`].
#[derive(Debug, Clone)]
pub struct ListQuery<'a> {
    pub text: Option<&'a str>,
    pub tools: &'a [String],
    pub limit: u32,
}

impl Default for ListQuery<'_> {
    fn default() -> Self {
        Self {
            text: None,
            tools: &[],
            limit: DEFAULT_LIMIT,
        }
    }
}

/// Client for one registry base URL.
///
/// Read calls accept an optional bearer token since the registry may allow
/// anonymous reads. Mutating calls require one; callers check for it first.
#[derive(Debug, Clone)]
pub struct RegistryClient {
    base_url: Url,
    http: reqwest::Client,
}

impl RegistryClient {
    pub fn new(base_url: &str) -> Result<Self, RegistryError> {
        let http = build_http_client().map_err(RegistryError::HttpClient)?;
        Self::with_client(base_url, http)
    }

    pub fn with_client(base_url: &str, http: reqwest::Client) -> Result<Self, RegistryError> {
        let base_url = Url::parse(base_url.trim())?;
        if base_url.cannot_be_a_base() {
            return Err(RegistryError::InvalidBaseUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase));
        }
        Ok(Self { base_url, http })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `GET /v0/servers`.
    pub async fn list_entries(
        &self,
        query: &ListQuery<'_>,
        token: Option<&str>,
    ) -> Result<EntryList, RegistryError> {
        let mut url = self.endpoint(&["v0", "servers"]);
        {
            let mut pairs = url.query_pairs_mut();
            if let Some(q) = query.text.filter(|q| !q.is_empty()) {
                pairs.append_pair("q", q);
            }
            if !query.tools.is_empty() {
                pairs.append_pair("tools", &query.tools.join(","));
            }
            pairs.append_pair("limit", &query.limit.to_string());
        }

        debug!(%url, "listing registry entries");
        let resp = self.send(authorize(self.http.get(url), token)).await?;
        let resp = ensure_success(Operation::ListEntries, resp, false).await?;
        resp.json().await.map_err(RegistryError::Decode)
    }

    /// `GET /v0/servers/{id}`.
    pub async fn get_entry(&self, id: &str, token: Option<&str>) -> Result<RegistryEntry, RegistryError> {
        let url = self.endpoint(&["v0", "servers", id]);
        debug!(%url, "fetching registry entry");
        let resp = self.send(authorize(self.http.get(url), token)).await?;
        let resp = ensure_success(Operation::GetEntry, resp, false).await?;
        resp.json().await.map_err(RegistryError::Decode)
    }

    /// `POST /v0/servers` with the config plus its computed id. Returns the id.
    pub async fn publish_entry(
        &self,
        config: &ServerConfig,
        namespace: &Namespace,
        token: &str,
    ) -> Result<String, RegistryError> {
        let (id, body) = publish_body(config, namespace);
        let url = self.endpoint(&["v0", "servers"]);
        debug!(%url, %id, "publishing registry entry");
        let resp = self
            .send(self.http.post(url).bearer_auth(token).json(&body))
            .await?;
        ensure_success(Operation::PublishEntry, resp, true).await?;
        Ok(id)
    }

    /// `PUT /v0/servers/{id}` with a partial update.
    pub async fn update_entry(
        &self,
        id: &str,
        updates: &Map<String, Value>,
        token: &str,
    ) -> Result<(), RegistryError> {
        let url = self.endpoint(&["v0", "servers", id]);
        debug!(%url, fields = updates.len(), "updating registry entry");
        let resp = self
            .send(self.http.put(url).bearer_auth(token).json(updates))
            .await?;
        ensure_success(Operation::UpdateEntry, resp, true).await?;
        Ok(())
    }

    /// `DELETE /v0/servers/{id}`.
    pub async fn delete_entry(&self, id: &str, token: &str) -> Result<(), RegistryError> {
        let url = self.endpoint(&["v0", "servers", id]);
        debug!(%url, "deleting registry entry");
        let resp = self.send(self.http.delete(url).bearer_auth(token)).await?;
        ensure_success(Operation::DeleteEntry, resp, true).await?;
        Ok(())
    }

    /// Bootstrap token from `GET /dev/token`. Only served by registries
    /// running in development mode.
    pub async fn get_dev_token(&self) -> Result<String, RegistryError> {
        #[derive(Deserialize)]
        struct DevToken {
            access_token: String,
        }

        let url = self.endpoint(&["dev", "token"]);
        debug!(%url, "requesting development token");
        let resp = self.send(self.http.get(url)).await?;
        let resp = ensure_success(Operation::DevToken, resp, false).await?;
        let token: DevToken = resp.json().await.map_err(RegistryError::Decode)?;
        Ok(token.access_token)
    }

    /// True iff `GET /v0/health` answers 2xx. Never fails.
    pub async fn check_health(&self) -> bool {
        let url = self.endpoint(&["v0", "health"]);
        match self.http.get(url.clone()).send().await {
            Ok(resp) => {
                debug!(%url, status = resp.status().as_u16(), "health check");
                resp.status().is_success()
            }
            Err(e) => {
                warn!(%url, error = %e, "registry health check failed");
                false
            }
        }
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // Base URLs are checked in the constructor, so this cannot fail.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, RegistryError> {
        request.send().await.map_err(RegistryError::Network)
    }
}

fn authorize(request: RequestBuilder, token: Option<&str>) -> RequestBuilder {
    match token.filter(|t| !t.is_empty()) {
        Some(t) => request.bearer_auth(t),
        None => request,
    }
}

async fn ensure_success(
    operation: Operation,
    resp: Response,
    with_body: bool,
) -> Result<Response, RegistryError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = if with_body {
        match resp.text().await {
            Ok(text) => Some(text),
            Err(e) => {
                warn!("Failed to read {} error body: {}", operation, e);
                Some(String::new())
            }
        }
    } else {
        None
    };
    Err(RegistryError::RequestFailed {
        operation,
        status: status.as_u16(),
        status_text: status.canonical_reason().unwrap_or("").to_string(),
        body,
    })
}

/// Request body for a publish: the config's fields, its name, the computed
/// id, and `metadata` (the config itself) when the config carries none.
pub fn publish_body(config: &ServerConfig, namespace: &Namespace) -> (String, Map<String, Value>) {
    let id = namespace.entry_id(&config.name);

    let mut body = config.fields.clone();
    body.insert("name".to_string(), Value::String(config.name.clone()));
    body.remove("id");

    if !matches!(body.get("metadata"), Some(Value::Object(_))) {
        body.remove("metadata");
        let metadata = Value::Object(body.clone());
        body.insert("metadata".to_string(), metadata);
    }

    body.insert("id".to_string(), Value::String(id.clone()));
    (id, body)
}
