//! Ensembl VEP REST client.
//!
//! Posts a batch of variant ids to `/vep/{species}/id` and maps each returned
//! record to an `AnnotationResult`. Ids that Ensembl does not know are simply
//! absent from the response.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use super::{LookupConfig, LookupError, LookupService};
use crate::models::AnnotationResult;

/// VEP request body.
#[derive(Debug, Serialize)]
struct VepRequest<'a> {
    ids: &'a [String],
}

/// The subset of a VEP record we read. The full record is kept as payload.
#[derive(Debug, Deserialize)]
struct VepRecord {
    #[serde(default)]
    input: Option<String>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    most_severe_consequence: Option<String>,
    #[serde(default)]
    transcript_consequences: Vec<TranscriptConsequence>,
}

#[derive(Debug, Deserialize)]
struct TranscriptConsequence {
    #[serde(default)]
    gene_symbol: Option<String>,
    #[serde(default)]
    gene_id: Option<String>,
    #[serde(default)]
    transcript_id: Option<String>,
    #[serde(default)]
    canonical: Option<u8>,
}

/// Lookup client for the Ensembl Variant Effect Predictor.
pub struct EnsemblVepClient {
    config: LookupConfig,
    client: Client,
    url: Url,
}

impl EnsemblVepClient {
    /// Create a new client with the given configuration.
    pub fn new(config: LookupConfig) -> Result<Self, LookupError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| LookupError::Unavailable(e.to_string()))?;

        let url = vep_url(&config.endpoint, &config.species)?;

        Ok(Self {
            config,
            client,
            url,
        })
    }

    /// Get the config.
    pub fn config(&self) -> &LookupConfig {
        &self.config
    }
}

#[async_trait]
impl LookupService for EnsemblVepClient {
    fn name(&self) -> &str {
        "Ensembl VEP"
    }

    async fn lookup(&self, identifiers: &[String]) -> Result<Vec<AnnotationResult>, LookupError> {
        if identifiers.is_empty() {
            return Ok(Vec::new());
        }

        debug!("VEP lookup for {} identifiers", identifiers.len());
        let resp = self
            .client
            .post(self.url.clone())
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&VepRequest { ids: identifiers })
            .send()
            .await
            .map_err(|e| LookupError::Connection(e.to_string()))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| LookupError::Connection(e.to_string()))?;

        if !status.is_success() {
            return Err(LookupError::Api {
                status: status.as_u16(),
                message: api_error_message(&body),
            });
        }

        parse_vep_response(&body)
    }
}

/// Build `{endpoint}/vep/{species}/id`, keeping any path prefix on the endpoint.
fn vep_url(endpoint: &str, species: &str) -> Result<Url, LookupError> {
    let base = if endpoint.ends_with('/') {
        endpoint.to_string()
    } else {
        format!("{}/", endpoint)
    };
    Url::parse(&base)
        .and_then(|u| u.join(&format!("vep/{}/id", species)))
        .map_err(|e| LookupError::Unavailable(format!("invalid endpoint {}: {}", endpoint, e)))
}

/// Ensembl reports errors as `{"error": "..."}`; fall back to the raw body.
fn api_error_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: String,
    }

    serde_json::from_str::<ErrorBody>(body)
        .map(|e| e.error)
        .unwrap_or_else(|_| body.chars().take(200).collect())
}

/// Map a VEP JSON array to annotation results.
fn parse_vep_response(body: &str) -> Result<Vec<AnnotationResult>, LookupError> {
    let raw: Vec<serde_json::Value> =
        serde_json::from_str(body).map_err(|e| LookupError::Parse(e.to_string()))?;

    let mut results = Vec::with_capacity(raw.len());
    for value in raw {
        let record: VepRecord = serde_json::from_value(value.clone())
            .map_err(|e| LookupError::Parse(e.to_string()))?;

        let Some(identifier) = record.input.clone().or_else(|| record.id.clone()) else {
            continue;
        };

        let transcript = record
            .transcript_consequences
            .iter()
            .find(|t| t.canonical == Some(1))
            .or_else(|| record.transcript_consequences.first());

        results.push(AnnotationResult {
            identifier,
            consequence: record.most_severe_consequence,
            gene: transcript.and_then(|t| t.gene_symbol.clone().or_else(|| t.gene_id.clone())),
            transcript_id: transcript.and_then(|t| t.transcript_id.clone()),
            payload: value,
        });
    }

    Ok(results)
}
