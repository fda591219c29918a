//! HTTP client for native export/import endpoints.

use std::time::Duration;

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use reqwest::{Body, Client, Response};
use serde::Deserialize;
use tracing::debug;

use crate::core::{format_rfc3339, ByteStream, DestinationEndpoint, Filter, SourceEndpoint};
use crate::error::{MigrateError, Result};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = concat!("native-migrate/", env!("CARGO_PKG_VERSION"));

/// `{"status":"success","data":[...]}` envelope used by the listing APIs.
#[derive(Debug, Deserialize)]
struct ListResponse {
    status: String,
    #[serde(default)]
    data: Vec<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Client for one endpoint address.
///
/// Implements both [`SourceEndpoint`] and [`DestinationEndpoint`]; the
/// underlying connection pool is safe for concurrent use.
#[derive(Debug, Clone)]
pub struct NativeClient {
    addr: String,
    client: Client,
}

impl NativeClient {
    pub fn new(addr: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self::with_client(addr, client))
    }

    /// Wrap an existing reqwest client.
    pub fn with_client(addr: impl Into<String>, client: Client) -> Self {
        Self {
            addr: addr.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    async fn get_list(&self, url: &str, query: &[(&str, String)]) -> Result<Vec<String>> {
        debug!(url, "listing");
        let response = self.client.get(url).query(query).send().await?;
        let response = check_status(url, response).await?;
        let body: ListResponse = response.json().await?;
        if body.status != "success" {
            return Err(MigrateError::endpoint(
                url,
                format!(
                    "unexpected response status {:?}: {}",
                    body.status,
                    body.error.unwrap_or_default()
                ),
            ));
        }
        Ok(body.data)
    }
}

#[async_trait]
impl SourceEndpoint for NativeClient {
    fn addr(&self) -> &str {
        &self.addr
    }

    async fn discover_tenants(&self, filter: &Filter) -> Result<Vec<String>> {
        let url = format!("{}/admin/tenants", self.addr);
        let mut query = Vec::new();
        if let Some(start) = &filter.time_start {
            query.push(("start", format_rfc3339(start)));
        }
        if let Some(end) = &filter.time_end {
            query.push(("end", format_rfc3339(end)));
        }
        self.get_list(&url, &query).await
    }

    async fn list_metric_names(&self, filter: &Filter, tenant: &str) -> Result<Vec<String>> {
        let url = if tenant.is_empty() {
            format!("{}/api/v1/label/__name__/values", self.addr)
        } else {
            format!(
                "{}/select/{}/prometheus/api/v1/label/__name__/values",
                self.addr, tenant
            )
        };
        self.get_list(&url, &filter.query_params()).await
    }

    async fn open_export_stream(&self, url: &str, filter: &Filter) -> Result<ByteStream> {
        let response = self
            .client
            .get(url)
            .query(&filter.query_params())
            .send()
            .await?;
        let response = check_status(url, response).await?;
        Ok(response.bytes_stream().map_err(MigrateError::from).boxed())
    }

    async fn health(&self) -> Result<()> {
        probe(&self.client, &self.addr).await
    }
}

#[async_trait]
impl DestinationEndpoint for NativeClient {
    fn addr(&self) -> &str {
        &self.addr
    }

    async fn import_stream(&self, url: &str, body: ByteStream) -> Result<()> {
        let response = self
            .client
            .post(url)
            .body(Body::wrap_stream(body))
            .send()
            .await?;
        check_status(url, response).await?;
        Ok(())
    }

    async fn health(&self) -> Result<()> {
        probe(&self.client, &self.addr).await
    }
}

async fn probe(client: &Client, addr: &str) -> Result<()> {
    let url = format!("{}/health", addr);
    let response = client.get(&url).send().await?;
    check_status(&url, response).await?;
    Ok(())
}

/// 4xx is the caller's fault and never retried; anything else non-2xx is.
async fn check_status(url: &str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    if status.is_client_error() {
        Err(MigrateError::BadRequest {
            url: url.to_string(),
            status: status.as_u16(),
            body,
        })
    } else {
        Err(MigrateError::endpoint(
            url,
            format!("unexpected status {}: {}", status, body),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use chrono::DateTime;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn filter() -> Filter {
        Filter {
            match_expr: "{__name__=\"up\"}".into(),
            time_start: Some(DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z").unwrap()),
            time_end: Some(DateTime::parse_from_rfc3339("2024-01-02T00:00:00Z").unwrap()),
        }
    }

    #[tokio::test]
    async fn test_discover_tenants() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/admin/tenants"))
            .and(query_param("start", "2024-01-01T00:00:00Z"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "success",
                "data": ["0:0", "1:0"]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = NativeClient::new(server.uri()).unwrap();
        let tenants = client.discover_tenants(&filter()).await.unwrap();
        assert_eq!(tenants, vec!["0:0", "1:0"]);
    }

    #[tokio::test]
    async fn test_list_metric_names_for_tenant() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/select/1:0/prometheus/api/v1/label/__name__/values"))
            .and(query_param("match[]", "{__name__=\"up\"}"))
            .and(query_param("end", "2024-01-02T00:00:00Z"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "success",
                "data": ["up"]
            })))
            .mount(&server)
            .await;

        let client = NativeClient::new(server.uri()).unwrap();
        let names = client.list_metric_names(&filter(), "1:0").await.unwrap();
        assert_eq!(names, vec!["up"]);
    }

    #[tokio::test]
    async fn test_error_envelope_is_endpoint_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/label/__name__/values"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "error",
                "error": "boom"
            })))
            .mount(&server)
            .await;

        let client = NativeClient::new(server.uri()).unwrap();
        let err = client.list_metric_names(&filter(), "").await.unwrap_err();
        assert!(matches!(err, MigrateError::Endpoint { .. }));
        assert!(err.to_string().contains("boom"));
    }

    #[tokio::test]
    async fn test_export_streams_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/export/native"))
            .and(query_param("match[]", "{__name__=\"up\"}"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"native-payload".to_vec()))
            .mount(&server)
            .await;

        let client = NativeClient::new(server.uri()).unwrap();
        let url = format!("{}/api/v1/export/native", server.uri());
        let stream = client.open_export_stream(&url, &filter()).await.unwrap();
        let chunks: Vec<Bytes> = stream.try_collect().await.unwrap();
        assert_eq!(chunks.concat(), b"native-payload");
    }

    #[tokio::test]
    async fn test_import_posts_streamed_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/import/native"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let client = NativeClient::new(server.uri()).unwrap();
        let url = format!("{}/api/v1/import/native", server.uri());
        let body = futures::stream::iter(vec![Ok(Bytes::from("ab")), Ok(Bytes::from("cd"))]).boxed();
        client.import_stream(&url, body).await.unwrap();

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests[0].body, b"abcd");
    }

    #[tokio::test]
    async fn test_status_classification() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/export/native"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad match"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/select/0:0/prometheus/api/v1/export/native"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = NativeClient::new(server.uri()).unwrap();

        let bad = client
            .open_export_stream(&format!("{}/api/v1/export/native", server.uri()), &filter())
            .await
            .err()
            .unwrap();
        assert!(matches!(bad, MigrateError::BadRequest { status: 400, .. }));
        assert!(!bad.is_retryable());

        let unavailable = client
            .open_export_stream(
                &format!("{}/select/0:0/prometheus/api/v1/export/native", server.uri()),
                &filter(),
            )
            .await
            .err()
            .unwrap();
        assert!(matches!(unavailable, MigrateError::Endpoint { .. }));
        assert!(unavailable.is_retryable());
    }

    #[tokio::test]
    async fn test_health() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200).set_body_string("OK"))
            .mount(&server)
            .await;

        let client = NativeClient::new(format!("{}/", server.uri())).unwrap();
        SourceEndpoint::health(&client).await.unwrap();
        DestinationEndpoint::health(&client).await.unwrap();
    }
}
