use crate::error::{EnrichError, Result};
use serde::{Deserialize, Serialize};

const RESOLVER_PREFIXES: &[&str] = &[
    "https://doi.org/",
    "http://doi.org/",
    "https://dx.doi.org/",
    "http://dx.doi.org/",
    "doi:",
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Doi {
    pub raw: String,
    pub normalized: String,
}

impl Doi {
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();

        let lower = input.to_lowercase();
        let stripped = RESOLVER_PREFIXES
            .iter()
            .find_map(|prefix| lower.strip_prefix(prefix))
            .unwrap_or(&lower)
            .trim_start();

        // Must look like `10.<registrant>/<suffix>`
        let Some((registrant, suffix)) = stripped.split_once('/') else {
            return Err(EnrichError::InvalidDoi(input.to_string()));
        };
        if !registrant.starts_with("10.") || registrant.len() < 4 || suffix.is_empty() {
            return Err(EnrichError::InvalidDoi(input.to_string()));
        }

        Ok(Self {
            raw: input.to_string(),
            normalized: stripped.to_string(),
        })
    }

    /// Registrant prefix, e.g. `10.1038`.
    pub fn prefix(&self) -> &str {
        self.normalized
            .split_once('/')
            .map(|(prefix, _)| prefix)
            .unwrap_or(&self.normalized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_doi() {
        let doi = Doi::parse("10.1000/xyz123").unwrap();
        assert_eq!(doi.normalized, "10.1000/xyz123");
        assert_eq!(doi.prefix(), "10.1000");
    }

    #[test]
    fn doi_with_resolver_prefix() {
        let doi = Doi::parse("https://doi.org/10.1000/xyz123").unwrap();
        assert_eq!(doi.normalized, "10.1000/xyz123");
        let doi = Doi::parse("http://dx.doi.org/10.1000/xyz123").unwrap();
        assert_eq!(doi.normalized, "10.1000/xyz123");
    }

    #[test]
    fn doi_with_label() {
        let doi = Doi::parse("DOI: 10.1000/XYZ123").unwrap();
        assert_eq!(doi.normalized, "10.1000/xyz123");
        assert_eq!(doi.raw, "DOI: 10.1000/XYZ123");
    }

    #[test]
    fn reject_placeholders_and_fragments() {
        assert!(Doi::parse("unavailable").is_err());
        assert!(Doi::parse("10.1000").is_err());
        assert!(Doi::parse("10.1000/").is_err());
        assert!(Doi::parse("").is_err());
    }
}
