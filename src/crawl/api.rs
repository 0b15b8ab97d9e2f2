//! HTTP JSON API crawling

use super::CrawlOutcome;
use crate::config::HttpConfig;
use crate::error::{Error, Result};
use crate::infer::SchemaInferrer;
use crate::lineage::{LineageOp, NodeType};
use crate::meta::{ApiMetadata, MetadataRecord, RecordPayload, SourceType};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};
use url::Url;

/// Fetches one endpoint and infers the schema of its JSON body
pub struct ApiCrawler {
    client: Client,
    inferrer: SchemaInferrer,
}

impl ApiCrawler {
    pub fn new(config: &HttpConfig, inferrer: SchemaInferrer) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout())
            .gzip(true)
            .brotli(true)
            .build()?;
        Ok(Self { client, inferrer })
    }

    pub async fn crawl(&self, url: &str, headers: &BTreeMap<String, String>) -> CrawlOutcome {
        info!("Crawling API: {}", url);
        match self.fetch(url, headers).await {
            Ok((status_code, body)) => {
                let schema = self.inferrer.infer_json(&body);
                debug!("Inferred {} fields from {}", schema.len(), url);

                let lineage = vec![LineageOp::Node {
                    name: endpoint_name(url),
                    node_type: NodeType::Api,
                    source: url.to_string(),
                }];
                let record = MetadataRecord::new(RecordPayload::Api(ApiMetadata {
                    url: url.to_string(),
                    status_code,
                    schema,
                }));
                CrawlOutcome::succeeded(
                    SourceType::Api,
                    record,
                    lineage,
                    format!("Successfully crawled API: {}", url),
                )
            }
            Err(e) => {
                warn!("API crawl of {} failed: {}", url, e);
                CrawlOutcome::failed(SourceType::Api, Vec::new(), e)
            }
        }
    }

    async fn fetch(
        &self,
        url: &str,
        headers: &BTreeMap<String, String>,
    ) -> Result<(u16, serde_json::Value)> {
        let parsed = Url::parse(url)?;
        let response = self
            .client
            .get(parsed)
            .headers(build_header_map(headers)?)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let bytes = response.bytes().await?;
        let body = serde_json::from_slice(&bytes)?;
        Ok((status.as_u16(), body))
    }
}

/// Lineage name of an endpoint: its last path segment, or `root`
pub fn endpoint_name(url: &str) -> String {
    let last = match Url::parse(url) {
        Ok(parsed) => parsed
            .path_segments()
            .and_then(|mut segments| segments.next_back().map(str::to_string)),
        Err(_) => url.rsplit('/').next().map(str::to_string),
    };
    match last {
        Some(segment) if !segment.is_empty() => segment,
        _ => "root".to_string(),
    }
}

fn build_header_map(headers: &BTreeMap<String, String>) -> Result<HeaderMap> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (key, value) in headers {
        let name = HeaderName::from_bytes(key.as_bytes())
            .map_err(|e| Error::InvalidHeader(format!("{}: {}", key, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| Error::InvalidHeader(format!("{}: {}", key, e)))?;
        map.insert(name, value);
    }
    Ok(map)
}

/// Parse `KEY=VALUE` header arguments
pub fn parse_header_pairs<S: AsRef<str>>(pairs: &[S]) -> Result<BTreeMap<String, String>> {
    let mut headers = BTreeMap::new();
    for pair in pairs {
        let pair = pair.as_ref();
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| Error::InvalidHeader(format!("expected KEY=VALUE, got '{}'", pair)))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(Error::InvalidHeader(format!("empty header name in '{}'", pair)));
        }
        headers.insert(key.to_string(), value.trim().to_string());
    }
    Ok(headers)
}

/// Parse headers given as a JSON object of strings
pub fn parse_header_json(text: &str) -> Result<BTreeMap<String, String>> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(BTreeMap::new());
    }
    serde_json::from_str(text)
        .map_err(|e| Error::InvalidHeader(format!("headers must be a JSON object of strings: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infer::ValueKind;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn crawler() -> ApiCrawler {
        ApiCrawler::new(&HttpConfig::default(), SchemaInferrer::default()).unwrap()
    }

    #[tokio::test]
    async fn test_crawl_json_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/users"))
            .and(header("authorization", "Bearer t0ken"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "users": [{"id": 1, "name": "Ada"}],
                "total": 1
            })))
            .mount(&server)
            .await;

        let url = format!("{}/v1/users", server.uri());
        let headers = parse_header_pairs(&["Authorization=Bearer t0ken"]).unwrap();
        let outcome = crawler().crawl(&url, &headers).await;

        assert!(outcome.is_success());
        assert_eq!(
            outcome.status().message,
            format!("Successfully crawled API: {}", url)
        );
        let RecordPayload::Api(meta) = &outcome.record.as_ref().unwrap().payload else {
            panic!("expected api payload");
        };
        assert_eq!(meta.status_code, 200);
        assert_eq!(meta.schema["users"].kind, ValueKind::Array);
        assert_eq!(meta.schema["users.name"].kind, ValueKind::String);
        assert_eq!(meta.schema["total"].kind, ValueKind::Number);
        assert_eq!(
            outcome.lineage,
            vec![LineageOp::Node {
                name: "users".to_string(),
                node_type: NodeType::Api,
                source: url.clone(),
            }]
        );
    }

    #[tokio::test]
    async fn test_non_success_status_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let url = format!("{}/missing", server.uri());
        let outcome = crawler().crawl(&url, &BTreeMap::new()).await;

        assert!(!outcome.is_success());
        assert!(outcome.record.is_none());
        assert!(outcome.lineage.is_empty());
        assert!(outcome.status().message.starts_with("API crawl error:"));
    }

    #[tokio::test]
    async fn test_invalid_json_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/html"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .mount(&server)
            .await;

        let outcome = crawler()
            .crawl(&format!("{}/html", server.uri()), &BTreeMap::new())
            .await;
        assert!(matches!(outcome.result, Err(Error::Json(_))));
    }

    #[tokio::test]
    async fn test_unreachable_host_fails() {
        let outcome = crawler()
            .crawl("http://127.0.0.1:9/unreachable", &BTreeMap::new())
            .await;
        assert!(!outcome.is_success());
        assert!(!outcome.status().message.is_empty());
    }

    #[test]
    fn test_endpoint_name() {
        assert_eq!(endpoint_name("https://api.example.com/v1/orders"), "orders");
        assert_eq!(endpoint_name("https://api.example.com/v1/orders?page=2"), "orders");
        assert_eq!(endpoint_name("https://api.example.com/"), "root");
        assert_eq!(endpoint_name("https://api.example.com"), "root");
        assert_eq!(endpoint_name("https://api.example.com/v1/"), "root");
    }

    #[test]
    fn test_parse_header_pairs() {
        let headers = parse_header_pairs(&["Accept=application/json", "X-Token = a=b"]).unwrap();
        assert_eq!(headers["Accept"], "application/json");
        assert_eq!(headers["X-Token"], "a=b");

        assert!(parse_header_pairs(&["no-equals"]).is_err());
        assert!(parse_header_pairs(&["=value"]).is_err());
    }

    #[test]
    fn test_parse_header_json() {
        let headers = parse_header_json(r#"{"Accept": "application/json"}"#).unwrap();
        assert_eq!(headers["Accept"], "application/json");
        assert!(parse_header_json("").unwrap().is_empty());
        assert!(matches!(
            parse_header_json(r#"{"Retries": 3}"#),
            Err(Error::InvalidHeader(_))
        ));
    }

    #[test]
    fn test_invalid_header_name() {
        let mut headers = BTreeMap::new();
        headers.insert("bad header".to_string(), "x".to_string());
        assert!(matches!(build_header_map(&headers), Err(Error::InvalidHeader(_))));
    }
}
