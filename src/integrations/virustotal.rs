//! VirusTotal v3 reputation lookups.
//!
//! Without an API key every action answers with deterministic mock data
//! flagged `mock_data: true`, so playbooks can be exercised offline.

use crate::config::IntegrationConfig;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use serde_json::{json, Map, Value as JsonValue};
use std::time::Duration;
use tracing::{debug, warn};

use super::{failure, Integration};

pub const DEFAULT_BASE_URL: &str = "https://www.virustotal.com/api/v3";

const ACTIONS: &[&str] = &["check_ip", "check_domain", "check_hash"];
const SUSPICIOUS_KEYWORDS: &[&str] = &["malware", "phishing", "suspicious", "hack"];

pub struct VirusTotalIntegration {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
}

impl VirusTotalIntegration {
    pub fn new(api_key: Option<String>, base_url: Option<String>, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| AppError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key: api_key.filter(|key| !key.is_empty()),
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
        })
    }

    pub fn from_config(config: &IntegrationConfig) -> Result<Self> {
        Self::new(config.api_key.clone(), config.base_url.clone(), config.timeout_secs)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check IP address reputation
    pub async fn check_ip(&self, ip: &str) -> JsonValue {
        let Some(api_key) = &self.api_key else {
            return mock_result(mock_ip(ip));
        };

        match self.fetch(&format!("ip_addresses/{}", ip), api_key).await {
            Ok(body) => {
                let mut result = stats_result(&body);
                result.insert("ip".to_string(), json!(ip));
                result.insert("reputation".to_string(), reputation(&body));
                JsonValue::Object(result)
            }
            Err(e) => request_failure(e),
        }
    }

    /// Check domain reputation
    pub async fn check_domain(&self, domain: &str) -> JsonValue {
        let Some(api_key) = &self.api_key else {
            return mock_result(mock_domain(domain));
        };

        match self.fetch(&format!("domains/{}", domain), api_key).await {
            Ok(body) => {
                let mut result = stats_result(&body);
                result.insert("domain".to_string(), json!(domain));
                JsonValue::Object(result)
            }
            Err(e) => request_failure(e),
        }
    }

    /// Check file hash reputation
    pub async fn check_hash(&self, hash: &str) -> JsonValue {
        let Some(api_key) = &self.api_key else {
            return mock_result(mock_hash(hash));
        };

        match self.fetch(&format!("files/{}", hash), api_key).await {
            Ok(body) => {
                let mut result = stats_result(&body);
                result.insert("hash".to_string(), json!(hash));
                JsonValue::Object(result)
            }
            Err(e) => request_failure(e),
        }
    }

    async fn fetch(&self, path: &str, api_key: &str) -> Result<JsonValue> {
        let url = format!("{}/{}", self.base_url, path);
        debug!(url = %url, "VirusTotal request");

        let response = self
            .client
            .get(&url)
            .header("x-apikey", api_key)
            .send()
            .await
            .map_err(|e| AppError::Network(format!("API request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Network(format!(
                "API returned error: {}",
                response.status()
            )));
        }

        response
            .json::<JsonValue>()
            .await
            .map_err(|e| AppError::Network(format!("Failed to parse response: {}", e)))
    }
}

#[async_trait]
impl Integration for VirusTotalIntegration {
    fn name(&self) -> &str {
        "virustotal"
    }

    fn available_actions(&self) -> Vec<&'static str> {
        ACTIONS.to_vec()
    }

    fn has_credentials(&self) -> bool {
        self.api_key.is_some()
    }

    async fn execute_action(&self, action: &str, params: &Map<String, JsonValue>) -> JsonValue {
        let param = |name: &str| params.get(name).and_then(JsonValue::as_str).filter(|v| !v.is_empty());
        let missing = |name: &str| failure(format!("Missing required parameter: {}", name));

        match action {
            "check_ip" => match param("ip") {
                Some(ip) => self.check_ip(ip).await,
                None => missing("ip"),
            },
            "check_domain" => match param("domain") {
                Some(domain) => self.check_domain(domain).await,
                None => missing("domain"),
            },
            "check_hash" => match param("hash") {
                Some(hash) => self.check_hash(hash).await,
                None => missing("hash"),
            },
            other => failure(format!("Unknown action: {}", other)),
        }
    }
}

fn request_failure(error: AppError) -> JsonValue {
    warn!(error = %error, "VirusTotal request failed");
    json!({
        "success": false,
        "error": error.to_string(),
        "data": null,
    })
}

fn mock_result(data: JsonValue) -> JsonValue {
    json!({
        "success": false,
        "error": "VirusTotal API key not configured",
        "mock_data": true,
        "data": data,
    })
}

/// Analysis counters from `data.attributes.last_analysis_stats`, missing ones as 0
fn stats_result(body: &JsonValue) -> Map<String, JsonValue> {
    let stats = body.pointer("/data/attributes/last_analysis_stats");
    let count = |key: &str| {
        stats
            .and_then(|s| s.get(key))
            .and_then(JsonValue::as_i64)
            .unwrap_or(0)
    };

    let mut result = Map::new();
    result.insert("success".to_string(), json!(true));
    for key in ["malicious", "suspicious", "harmless", "undetected"] {
        result.insert(key.to_string(), json!(count(key)));
    }
    result
}

fn reputation(body: &JsonValue) -> JsonValue {
    let value = body
        .pointer("/data/attributes/reputation")
        .or_else(|| body.pointer("/data/attributes/last_analysis_stats/reputation"))
        .and_then(JsonValue::as_i64)
        .unwrap_or(0);
    json!(value)
}

fn mock_ip(ip: &str) -> JsonValue {
    let (malicious, reputation) = if ip.starts_with("192.168") || ip.starts_with("10.") {
        (0, 100)
    } else {
        (5, -20)
    };

    json!({
        "ip": ip,
        "malicious": malicious,
        "suspicious": 2,
        "harmless": 50,
        "undetected": 20,
        "reputation": reputation,
    })
}

fn mock_domain(domain: &str) -> JsonValue {
    let lowered = domain.to_lowercase();
    let flagged = SUSPICIOUS_KEYWORDS.iter().any(|kw| lowered.contains(kw));

    json!({
        "domain": domain,
        "malicious": if flagged { 10 } else { 0 },
        "suspicious": if flagged { 3 } else { 0 },
        "harmless": 40,
        "undetected": 15,
    })
}

fn mock_hash(hash: &str) -> JsonValue {
    json!({
        "hash": hash,
        "malicious": if hash.len() == 32 { 15 } else { 2 },
        "suspicious": 5,
        "harmless": 35,
        "undetected": 10,
    })
}
