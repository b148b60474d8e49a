// ABOUTME: HTTP client for the Rancher control plane
// Lists running containers by name and requests execute grants with basic auth

use super::error::ResolveError;
use super::models::{
    ContainerCandidate, ContainerList, Credentials, ExecRequest, ExecResponse, ExecutionGrant,
};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::{debug, info};

/// Wildcard token understood by the `name_like` listing filter.
pub const LISTING_WILDCARD: char = '%';

/// Translates shell-style `*` wildcards into the listing API's own token.
pub fn translate_wildcards(pattern: &str) -> String {
    pattern.replace('*', &LISTING_WILDCARD.to_string())
}

/// Strips exactly one trailing slash from the endpoint.
pub fn normalize_endpoint(endpoint: &str) -> &str {
    endpoint.strip_suffix('/').unwrap_or(endpoint)
}

pub struct RancherClient {
    http: reqwest::Client,
    credentials: Credentials,
}

impl RancherClient {
    pub fn new(credentials: Credentials) -> Self {
        Self::with_http(reqwest::Client::new(), credentials)
    }

    pub fn with_http(http: reqwest::Client, credentials: Credentials) -> Self {
        Self { http, credentials }
    }

    /// Endpoint with its trailing slash removed; also the `Origin` for dialing.
    pub fn endpoint(&self) -> &str {
        normalize_endpoint(&self.credentials.endpoint)
    }

    /// Joins `path` (which must start with `/`) onto the endpoint.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint(), path)
    }

    /// Running containers whose name matches `pattern`.
    pub async fn list_running_containers(
        &self,
        pattern: &str,
    ) -> Result<Vec<ContainerCandidate>, ResolveError> {
        let name_like = translate_wildcards(pattern);
        info!("Listing running containers matching {}", name_like);

        let request = self
            .request(Method::GET, &self.url("/containers/"))
            .query(&[
                ("name_like", name_like.as_str()),
                ("state", "running"),
                ("kind", "container"),
            ]);
        let list: ContainerList = self.send(request).await?;
        debug!("Listing returned {} record(s)", list.data.len());

        list.data
            .into_iter()
            .map(ContainerCandidate::try_from)
            .collect()
    }

    /// Endpoint of a single container, trailing slash included.
    pub fn container_url(&self, container_id: &str) -> String {
        self.url(&format!("/containers/{container_id}/"))
    }

    /// Asks the control plane for an execute grant on `container_id`.
    pub async fn request_exec(
        &self,
        container_id: &str,
        body: &ExecRequest,
    ) -> Result<ExecutionGrant, ResolveError> {
        info!("Requesting execute grant for container {}", container_id);

        let request = self
            .request(Method::POST, &self.container_url(container_id))
            .query(&[("action", "execute")])
            .json(body);
        let response: ExecResponse = self.send(request).await?;
        ExecutionGrant::try_from(response)
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.http
            .request(method, url)
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json")
            .basic_auth(&self.credentials.user, Some(&self.credentials.password))
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ResolveError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(ResolveError::Communication(format!(
                "HTTP {}: {}",
                status,
                body.trim()
            )));
        }

        serde_json::from_str(&body).map_err(|e| ResolveError::Protocol(e.to_string()))
    }
}
