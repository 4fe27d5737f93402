use bazaar_common::Attribute;
use serde_json::Value;
use std::time::Duration;

/// Off-chain token metadata, normalized to the stored shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenMetadata {
    pub name: String,
    pub description: String,
    pub image_url: String,
    pub attributes: Vec<Attribute>,
}

impl Default for TokenMetadata {
    fn default() -> Self {
        Self {
            name: "unnamed".to_string(),
            description: String::new(),
            image_url: String::new(),
            attributes: Vec::new(),
        }
    }
}

/// Outcome of a metadata resolution. `fetched` is false when neither
/// gateway produced a usable document and the defaults were substituted.
#[derive(Debug, Clone)]
pub struct ResolvedMetadata {
    pub metadata: TokenMetadata,
    pub fetched: bool,
}

/// Resolves content-addressed token URIs through an HTTP gateway, with a
/// fallback gateway behind it. Failure is absorbed into default values;
/// this component never returns an error.
#[derive(Clone)]
pub struct MetadataFetcher {
    client: reqwest::Client,
    primary_gateway: String,
    fallback_gateway: String,
}

impl MetadataFetcher {
    pub fn new(primary_gateway: &str, fallback_gateway: &str) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            primary_gateway: primary_gateway.to_string(),
            fallback_gateway: fallback_gateway.to_string(),
        })
    }

    /// Resolve a token URI to normalized metadata, trying the primary
    /// gateway then the fallback.
    pub async fn fetch(&self, token_uri: &str) -> ResolvedMetadata {
        match self.fetch_via(&self.primary_gateway, token_uri).await {
            Ok(metadata) => ResolvedMetadata { metadata, fetched: true },
            Err(primary_err) => {
                tracing::debug!("primary gateway failed for {token_uri}: {primary_err}");
                match self.fetch_via(&self.fallback_gateway, token_uri).await {
                    Ok(metadata) => ResolvedMetadata { metadata, fetched: true },
                    Err(fallback_err) => {
                        tracing::debug!(
                            "fallback gateway failed for {token_uri}: {fallback_err}"
                        );
                        ResolvedMetadata { metadata: TokenMetadata::default(), fetched: false }
                    }
                }
            }
        }
    }

    async fn fetch_via(&self, gateway: &str, token_uri: &str) -> Result<TokenMetadata, String> {
        let url = resolve_uri(token_uri, gateway);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| format!("request error: {e}"))?;
        if !response.status().is_success() {
            return Err(format!("HTTP {}", response.status()));
        }
        let doc: Value = response
            .json()
            .await
            .map_err(|e| format!("JSON parse error: {e}"))?;
        Ok(normalize(&doc, gateway))
    }
}

/// Map a raw metadata document to the stored shape. An embedded image URI
/// is rewritten with the gateway that served the document.
fn normalize(doc: &Value, gateway: &str) -> TokenMetadata {
    let name = doc
        .get("name")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .unwrap_or("unnamed")
        .to_string();

    let description = doc
        .get("description")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let image_url = doc
        .get("image")
        .or_else(|| doc.get("image_url"))
        .and_then(Value::as_str)
        .map(|img| resolve_uri(img, gateway))
        .unwrap_or_default();

    let attributes = doc
        .get("attributes")
        .and_then(Value::as_array)
        .map(|list| {
            list.iter()
                .filter_map(|entry| {
                    let trait_type = entry.get("trait_type")?.as_str()?.to_string();
                    let value = match entry.get("value")? {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    Some(Attribute { trait_type, value })
                })
                .collect()
        })
        .unwrap_or_default();

    TokenMetadata { name, description, image_url, attributes }
}

/// Resolve an `ipfs://` URI through a gateway; other schemes pass through.
pub fn resolve_uri(uri: &str, gateway: &str) -> String {
    match uri.strip_prefix("ipfs://") {
        Some(hash) => format!("{gateway}{hash}"),
        None => uri.to_string(),
    }
}
