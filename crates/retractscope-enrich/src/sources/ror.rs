use async_trait::async_trait;
use serde::Deserialize;

use retractscope_core::{OrganizationMatch, RegistryConfig};

use crate::error::Result;
use crate::http::RateLimitedClient;
use crate::registry::{Lookup, Registry};

pub const BASE_URL: &str = "https://api.ror.org/v2";

// ─── Response types ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RorSearchResponse {
    #[serde(default)]
    pub number_of_results: u64,
    #[serde(default)]
    pub items: Vec<RorOrganization>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RorOrganization {
    pub id: String,
    /// v1 responses carry a flat `name`.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub names: Vec<RorName>,
    #[serde(default)]
    pub locations: Vec<RorLocation>,
    #[serde(default)]
    pub country: Option<RorCountry>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RorName {
    pub value: String,
    #[serde(default)]
    pub types: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RorLocation {
    #[serde(default)]
    pub geonames_details: Option<GeonamesDetails>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct GeonamesDetails {
    pub country_name: Option<String>,
    pub country_subdivision_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RorCountry {
    pub country_name: Option<String>,
}

impl RorOrganization {
    pub fn display_name(&self) -> Option<&str> {
        self.names
            .iter()
            .find(|n| n.types.iter().any(|t| t == "ror_display"))
            .map(|n| n.value.as_str())
            .or(self.name.as_deref())
            .or_else(|| self.names.first().map(|n| n.value.as_str()))
    }

    fn geonames(&self) -> Option<&GeonamesDetails> {
        self.locations.first()?.geonames_details.as_ref()
    }

    pub fn country_name(&self) -> Option<&str> {
        self.geonames()
            .and_then(|g| g.country_name.as_deref())
            .or_else(|| self.country.as_ref()?.country_name.as_deref())
    }

    pub fn region_name(&self) -> Option<&str> {
        self.geonames()?.country_subdivision_name.as_deref()
    }

    /// Match row for the institution string `raw`.
    pub fn to_match(&self, raw: &str) -> OrganizationMatch {
        OrganizationMatch {
            raw: raw.to_string(),
            ror: self.id.clone(),
            name: self.display_name().unwrap_or_default().to_string(),
            country: self.country_name().map(ToOwned::to_owned),
            region: self.region_name().map(ToOwned::to_owned),
        }
    }
}

// ─── RorSource ────────────────────────────────────────────────────────────────

pub struct RorSource {
    client: RateLimitedClient,
    base_url: String,
}

impl RorSource {
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

    pub async fn search(&self, text: &str) -> Result<RorSearchResponse> {
        let url = format!(
            "{}/organizations?query={}",
            self.base_url,
            urlencoding::encode(text)
        );
        self.client.get_json(&url).await
    }
}

#[async_trait]
impl Registry for RorSource {
    type Row = OrganizationMatch;

    fn name(&self) -> &'static str {
        "ror"
    }

    /// Top-ranked organization for the free-text institution name.
    async fn lookup(&self, key: &str) -> Result<Lookup<OrganizationMatch>> {
        let response = self.search(key).await?;
        Ok(match response.items.first() {
            Some(org) => Lookup::Found(org.to_match(key)),
            None => Lookup::NotFound,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EnrichError;
    use mockito::{Matcher, Server};
    use std::time::Duration;

    fn source(base_url: &str) -> RorSource {
        let client =
            RateLimitedClient::new(20, Duration::ZERO, Duration::from_secs(5), "test").unwrap();
        RorSource::with_params(base_url, client)
    }

    const MIT: &str = r#"{
        "number_of_results": 2,
        "items": [
            {
                "id": "https://ror.org/042nb2s44",
                "names": [
                    {"value": "MIT", "types": ["acronym"], "lang": null},
                    {"value": "Massachusetts Institute of Technology", "types": ["ror_display", "label"], "lang": "en"}
                ],
                "locations": [
                    {
                        "geonames_id": 4931972,
                        "geonames_details": {
                            "country_code": "US",
                            "country_name": "United States",
                            "country_subdivision_name": "Massachusetts",
                            "name": "Cambridge"
                        }
                    }
                ]
            },
            {
                "id": "https://ror.org/000000000",
                "names": [{"value": "Other", "types": ["ror_display"]}]
            }
        ]
    }"#;

    #[tokio::test]
    async fn test_ror_lookup_takes_first_item() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/organizations")
            .match_query(Matcher::UrlEncoded(
                "query".into(),
                "Massachusetts Institute of Technology, Cambridge".into(),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(MIT)
            .expect(1)
            .create_async()
            .await;

        let source = source(&server.url());
        let key = "Massachusetts Institute of Technology, Cambridge";
        let Lookup::Found(org) = source.lookup(key).await.unwrap() else {
            panic!("expected a match");
        };

        assert_eq!(org.raw, key);
        assert_eq!(org.ror, "https://ror.org/042nb2s44");
        assert_eq!(org.name, "Massachusetts Institute of Technology");
        assert_eq!(org.country.as_deref(), Some("United States"));
        assert_eq!(org.region.as_deref(), Some("Massachusetts"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_ror_empty_result_is_not_recorded() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/organizations")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"number_of_results": 0, "items": []}"#)
            .create_async()
            .await;

        let source = source(&server.url());
        assert_eq!(source.lookup("Nowhere").await.unwrap(), Lookup::NotFound);
        assert!(source.not_found_row("Nowhere").is_none());
    }

    #[tokio::test]
    async fn test_ror_rate_limited_is_error() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/organizations")
            .match_query(Matcher::Any)
            .with_status(429)
            .create_async()
            .await;

        let source = source(&server.url());
        let err = source.lookup("MIT").await.unwrap_err();
        assert!(matches!(err, EnrichError::Status { status: 429, .. }));
        assert!(!err.is_definitive_miss());
    }

    #[test]
    fn test_display_name_fallbacks() {
        let v1: RorOrganization = serde_json::from_str(
            r#"{"id": "https://ror.org/1", "name": "Old Style", "country": {"country_name": "France"}}"#,
        )
        .unwrap();
        assert_eq!(v1.display_name(), Some("Old Style"));
        assert_eq!(v1.country_name(), Some("France"));
        assert_eq!(v1.region_name(), None);

        let unlabeled: RorOrganization = serde_json::from_str(
            r#"{"id": "https://ror.org/2", "names": [{"value": "Only Alias", "types": ["alias"]}]}"#,
        )
        .unwrap();
        assert_eq!(unlabeled.display_name(), Some("Only Alias"));
    }
}
