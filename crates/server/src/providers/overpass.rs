//! Overpass API adapter: nodes around a point, optionally filtered by OSM
//! tag selectors (`amenity`, `tourism=museum`).

use super::{HttpSettings, base_url, fetch_json};
use async_trait::async_trait;
use geopin::enrichment::{PoiProvider, PoiResult};
use geopin::{GeopinError, Result};
use geopin_types::Location;
use reqwest::{Client, Url};
use serde::Deserialize;
use std::collections::BTreeMap;

const PROVIDER: &str = "overpass";
const QUERY_TIMEOUT_SECONDS: u32 = 25;

pub struct OverpassPoiProvider {
    client: Client,
    endpoint: Url,
}

impl OverpassPoiProvider {
    /// `endpoint` is the full interpreter URL, e.g.
    /// `https://overpass-api.de/api/interpreter`.
    pub fn new(endpoint: &str, settings: &HttpSettings) -> Result<Self> {
        Ok(Self {
            client: settings.client()?,
            endpoint: base_url(PROVIDER, endpoint)?,
        })
    }
}

pub fn build_query(location: &Location, radius_m: f64, categories: &[String]) -> Result<String> {
    let selectors = if categories.is_empty() {
        vec!["[\"name\"]".to_string()]
    } else {
        categories
            .iter()
            .map(|c| build_tag_selector(c))
            .collect::<Result<Vec<_>>>()?
    };

    let around = format!("(around:{:.0},{:.6},{:.6})", radius_m, location.lat, location.lon);
    let lines = selectors
        .iter()
        .map(|selector| format!("  node{selector}{around};"))
        .collect::<Vec<_>>()
        .join("\n");

    Ok(format!(
        "[out:json][timeout:{QUERY_TIMEOUT_SECONDS}];\n(\n{lines}\n);\nout body;"
    ))
}

fn build_tag_selector(tag: &str) -> Result<String> {
    let trimmed = tag.trim();
    let (key, value) = match trimmed.split_once('=') {
        Some((key, value)) => (key.trim(), Some(value.trim())),
        None => (trimmed, None),
    };
    if key.is_empty() {
        return Err(GeopinError::InvalidInput(format!(
            "Category '{}' has no tag key",
            tag
        )));
    }

    match value {
        Some("") => Err(GeopinError::InvalidInput(format!(
            "Category '{}' has an empty tag value",
            tag
        ))),
        Some(value) => Ok(format!("[\"{}\"=\"{}\"]", escape_quoted(key), escape_quoted(value))),
        None => Ok(format!("[\"{}\"]", escape_quoted(key))),
    }
}

fn escape_quoted(raw: &str) -> String {
    raw.replace('\\', r"\\").replace('"', "\\\"")
}

#[derive(Deserialize)]
struct OverpassResponse {
    #[serde(default)]
    elements: Vec<OverpassElement>,
}

#[derive(Deserialize)]
struct OverpassElement {
    #[serde(rename = "type")]
    kind: String,
    id: u64,
    lat: Option<f64>,
    lon: Option<f64>,
    #[serde(default)]
    tags: BTreeMap<String, String>,
}

fn into_pois(response: OverpassResponse) -> Vec<PoiResult> {
    response
        .elements
        .into_iter()
        .filter_map(|element| {
            let location = Location::new(element.lat?, element.lon?).ok()?;
            let name = element
                .tags
                .get("name")
                .cloned()
                .unwrap_or_else(|| "Unnamed".to_string());
            Some(PoiResult {
                id: Some(format!("{}/{}", element.kind, element.id)),
                name,
                location,
                tags: element.tags,
            })
        })
        .collect()
}

#[async_trait]
impl PoiProvider for OverpassPoiProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn find_pois(
        &self,
        location: &Location,
        radius_m: f64,
        categories: &[String],
    ) -> Result<Vec<PoiResult>> {
        let query = build_query(location, radius_m, categories)?;
        let response: OverpassResponse = fetch_json(
            PROVIDER,
            self.client
                .post(self.endpoint.clone())
                .form(&[("data", query)]),
        )
        .await?;
        Ok(into_pois(response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geopin_types::Category;

    #[test]
    fn test_build_query() {
        let location = Location::new(55.9533, -3.1883).unwrap();
        let query = build_query(
            &location,
            500.0,
            &["tourism=museum".to_string(), "historic".to_string()],
        )
        .unwrap();

        assert!(query.starts_with("[out:json][timeout:25];"));
        assert!(query.contains("node[\"tourism\"=\"museum\"](around:500,55.953300,-3.188300);"));
        assert!(query.contains("node[\"historic\"](around:500,55.953300,-3.188300);"));
        assert!(query.ends_with("out body;"));

        let named = build_query(&location, 100.0, &[]).unwrap();
        assert!(named.contains("node[\"name\"](around:100,"));
    }

    #[test]
    fn test_selector_escaping_and_validation() {
        assert_eq!(
            build_tag_selector("name=coffee \"bar\"").unwrap(),
            "[\"name\"=\"coffee \\\"bar\\\"\"]"
        );
        assert!(build_tag_selector("=museum").is_err());
        assert!(build_tag_selector("tourism=").is_err());
    }

    #[test]
    fn test_parse_elements() {
        let json = r#"{
            "elements": [
                {"type": "node", "id": 42, "lat": 55.9486, "lon": -3.1999,
                 "tags": {"name": "Edinburgh Castle", "historic": "castle"}},
                {"type": "node", "id": 43, "lat": 55.95, "lon": -3.19, "tags": {}},
                {"type": "way", "id": 7, "tags": {"name": "No coordinates"}}
            ]
        }"#;
        let pois = into_pois(serde_json::from_str(json).unwrap());

        assert_eq!(pois.len(), 2);
        assert_eq!(pois[0].id.as_deref(), Some("node/42"));
        assert_eq!(pois[0].category(), Category::Historical);
        assert_eq!(pois[1].name, "Unnamed");
    }
}
