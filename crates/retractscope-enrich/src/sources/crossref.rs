use async_trait::async_trait;
use serde_json::Value;

use retractscope_core::{RegistryConfig, WorkMetadata, WorkStatus};

use crate::error::{EnrichError, Result};
use crate::http::RateLimitedClient;
use crate::identifiers::Doi;
use crate::registry::{Lookup, Registry};

pub const BASE_URL: &str = "https://api.crossref.org";

pub struct CrossRefSource {
    client: RateLimitedClient,
    base_url: String,
}

impl CrossRefSource {
    pub fn new(config: &RegistryConfig) -> Result<Self> {
        Ok(Self::with_params(
            config.base_url.as_deref().unwrap_or(BASE_URL),
            RateLimitedClient::from_config(config)?,
        ))
    }

    pub fn with_params(base_url: &str, client: RateLimitedClient) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn client(&self) -> &RateLimitedClient {
        &self.client
    }

    /// `GET /works/{doi}`. Non-2xx answers surface as `EnrichError::Status`.
    pub async fn fetch_by_doi(&self, doi: &Doi) -> Result<Value> {
        let path = doi
            .normalized
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        let url = format!("{}/works/{path}", self.base_url);
        let mut val: Value = self.client.get_json(&url).await?;
        val.get_mut("message")
            .map(Value::take)
            .ok_or_else(|| EnrichError::Parse("Missing message in CrossRef response".to_string()))
    }
}

/// Map a CrossRef `message` object onto the row for `key`.
pub fn work_from_message(key: &str, doi: &Doi, message: &Value) -> WorkMetadata {
    let container = match &message["container-title"] {
        Value::Array(titles) => titles.iter().find_map(Value::as_str).map(ToOwned::to_owned),
        Value::String(title) => Some(title.clone()),
        _ => None,
    };

    let prefix = message["prefix"]
        .as_str()
        .map(ToOwned::to_owned)
        .or_else(|| Some(doi.prefix().to_string()));

    WorkMetadata {
        doi: key.to_string(),
        status: WorkStatus::Found,
        work_type: message["type"].as_str().map(ToOwned::to_owned),
        container,
        publisher: message["publisher"].as_str().map(ToOwned::to_owned),
        prefix,
    }
}

#[async_trait]
impl Registry for CrossRefSource {
    type Row = WorkMetadata;

    fn name(&self) -> &'static str {
        "crossref"
    }

    async fn lookup(&self, key: &str) -> Result<Lookup<WorkMetadata>> {
        let Ok(doi) = Doi::parse(key) else {
            return Ok(Lookup::NotFound);
        };

        match self.fetch_by_doi(&doi).await {
            Ok(message) => Ok(Lookup::Found(work_from_message(key, &doi, &message))),
            Err(err) if err.is_definitive_miss() => Ok(Lookup::NotFound),
            Err(err) => Err(err),
        }
    }

    fn not_found_row(&self, key: &str) -> Option<WorkMetadata> {
        Some(WorkMetadata::not_found(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;
    use std::time::Duration;

    fn source(base_url: &str) -> CrossRefSource {
        let client =
            RateLimitedClient::new(20, Duration::ZERO, Duration::from_secs(5), "test").unwrap();
        CrossRefSource::with_params(base_url, client)
    }

    #[tokio::test]
    async fn test_crossref_lookup_extracts_fields() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/works/10.1038/nature14539")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                "status": "ok",
                "message": {
                    "DOI": "10.1038/nature14539",
                    "type": "journal-article",
                    "container-title": ["Nature", "Nature (London)"],
                    "publisher": "Springer Science and Business Media LLC",
                    "prefix": "10.1038"
                }
            }"#,
            )
            .create_async()
            .await;

        let source = source(&server.url());
        let result = source.lookup("10.1038/NATURE14539").await.unwrap();

        let Lookup::Found(work) = result else {
            panic!("expected a match");
        };
        assert_eq!(work.doi, "10.1038/NATURE14539");
        assert_eq!(work.work_type.as_deref(), Some("journal-article"));
        assert_eq!(work.container.as_deref(), Some("Nature"));
        assert_eq!(
            work.publisher.as_deref(),
            Some("Springer Science and Business Media LLC")
        );
        assert_eq!(work.prefix.as_deref(), Some("10.1038"));
    }

    #[test]
    fn test_container_title_as_plain_string() {
        let doi = Doi::parse("10.5555/abc").unwrap();
        let message = serde_json::json!({
            "type": "book-chapter",
            "container-title": "Proceedings",
        });
        let work = work_from_message("10.5555/abc", &doi, &message);
        assert_eq!(work.container.as_deref(), Some("Proceedings"));
        assert_eq!(work.prefix.as_deref(), Some("10.5555"));
        assert!(work.publisher.is_none());
    }

    #[tokio::test]
    async fn test_crossref_404_is_not_found() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/works/10.1/missing")
            .with_status(404)
            .with_body("Resource not found.")
            .create_async()
            .await;

        let source = source(&server.url());
        assert_eq!(
            source.lookup("10.1/missing").await.unwrap(),
            Lookup::NotFound
        );
        assert_eq!(
            source.not_found_row("10.1/missing").unwrap().status,
            WorkStatus::NotFound
        );
    }

    #[tokio::test]
    async fn test_doi_suffix_is_percent_encoded() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("GET", "/works/10.1002/abc%23x%3Fy")
            .with_status(200)
            .with_body(r#"{"message": {"type": "journal-article"}}"#)
            .expect(1)
            .create_async()
            .await;

        let source = source(&server.url());
        let result = source.lookup("10.1002/ABC#x?y").await.unwrap();

        assert!(matches!(result, Lookup::Found(_)));
        m.assert_async().await;
    }

    #[tokio::test]
    async fn test_crossref_server_error_is_transient() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/works/10.1/flaky")
            .with_status(502)
            .create_async()
            .await;

        let source = source(&server.url());
        let err = source.lookup("10.1/flaky").await.unwrap_err();
        assert!(matches!(err, EnrichError::Status { status: 502, .. }));
    }
}
