//! A thin `reqwest` client for the alternative.me Fear&Greed index — the
//! one unauthenticated, dependency-free external read named as an
//! exception to the "no real collaborators" scope (spec §1), matching
//! the teacher's own single-endpoint sentiment client.

use serde::Deserialize;

const ENDPOINT: &str = "https://api.alternative.me/fng/?limit=1";

#[derive(Debug, Deserialize)]
struct FngResponse {
    data: Vec<FngEntry>,
}

#[derive(Debug, Deserialize)]
struct FngEntry {
    value: String,
}

/// Fetches today's Fear&Greed value (0-100). Any network or parse
/// failure degrades to `None` — per spec, sentiment is "no opinion" on
/// failure, never a propagated error.
pub async fn fetch_fear_greed(client: &reqwest::Client) -> Option<u8> {
    let response = client.get(ENDPOINT).send().await.ok()?;
    let parsed: FngResponse = response.json().await.ok()?;
    let entry = parsed.data.first()?;
    entry.value.parse::<u8>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_response() {
        let raw = r#"{"data":[{"value":"42","value_classification":"Fear"}]}"#;
        let parsed: FngResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.data[0].value, "42");
    }
}
