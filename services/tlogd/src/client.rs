//! `LogApi` over HTTP, for peer logs served by another tlogd.

use std::time::Duration;

use aggregator::{ApiError, LogApi, MapValue};
use async_trait::async_trait;
use chrono::Utc;
use serde::de::DeserializeOwned;
use tlog::{Hash32, SignedTreeHead};
use tracing::debug;

use crate::auth::{sign_payload, SIGNATURE_HEADER, TIMESTAMP_HEADER};
use crate::wire::{EntriesDto, ErrorBody, MapValueDto, ProofDto, SthDto, SubmitRequest, WireError};

pub struct HttpLogClient {
    base_url: String,
    http: reqwest::Client,
    submit_secret: Option<String>,
}

impl HttpLogClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
            submit_secret: None,
        })
    }

    pub fn with_submit_secret(mut self, secret: Option<String>) -> Self {
        self.submit_secret = secret;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T, ApiError> {
        debug!(url = %self.url(path), "http_log: GET");
        let resp = self.http.get(self.url(path)).query(query).send().await.map_err(transport)?;
        read_json(resp).await
    }
}

fn transport(e: reqwest::Error) -> ApiError {
    if e.is_timeout() {
        ApiError::Timeout
    } else {
        ApiError::Transport(e.to_string())
    }
}

fn malformed(e: WireError) -> ApiError {
    ApiError::Transport(format!("malformed response: {e}"))
}

async fn read_json<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, ApiError> {
    let status = resp.status();
    if status.is_success() {
        return resp.json::<T>().await.map_err(transport);
    }
    let text = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text).map(|b| b.error).unwrap_or(text);
    Err(ApiError::Remote { status: status.as_u16(), message })
}

#[async_trait]
impl LogApi for HttpLogClient {
    async fn get_sth(&self) -> Result<SignedTreeHead, ApiError> {
        let dto: SthDto = self.get_json("/sth", &[]).await?;
        SignedTreeHead::try_from(dto).map_err(malformed)
    }

    async fn get_log_consistency_proof(&self, first: u64, second: u64) -> Result<Vec<Hash32>, ApiError> {
        let dto: ProofDto = self
            .get_json(
                "/log/consistency",
                &[("first", first.to_string()), ("second", second.to_string())],
            )
            .await?;
        dto.into_hashes().map_err(malformed)
    }

    async fn get_log_audit_proof(&self, index: u64, tree_size: u64) -> Result<Vec<Hash32>, ApiError> {
        let dto: ProofDto = self
            .get_json(
                "/log/audit",
                &[("index", index.to_string()), ("tree_size", tree_size.to_string())],
            )
            .await?;
        dto.into_hashes().map_err(malformed)
    }

    async fn get_log_entries(&self, start: u64, finish: u64) -> Result<Vec<Vec<u8>>, ApiError> {
        let dto: EntriesDto = self
            .get_json(
                "/log/entries",
                &[("start", start.to_string()), ("finish", finish.to_string())],
            )
            .await?;
        dto.entries
            .iter()
            .map(|e| hex::decode(e).map_err(|_| malformed(WireError::Hex { field: "entries" })))
            .collect()
    }

    async fn get_map_value(&self, key: &[u8], map_root: &Hash32) -> Result<MapValue, ApiError> {
        let dto: MapValueDto = self
            .get_json(
                "/map/value",
                &[("key", hex::encode(key)), ("map_root", hex::encode(map_root))],
            )
            .await?;
        MapValue::try_from(dto).map_err(malformed)
    }

    async fn submit(&self, items: Vec<(Vec<u8>, Vec<u8>)>) -> Result<SignedTreeHead, ApiError> {
        let body = serde_json::to_vec(&SubmitRequest::from_pairs(&items))
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        let mut req = self
            .http
            .post(self.url("/submit"))
            .header("Content-Type", "application/json");
        if let Some(secret) = &self.submit_secret {
            let ts = Utc::now().timestamp();
            req = req
                .header(TIMESTAMP_HEADER, ts.to_string())
                .header(SIGNATURE_HEADER, sign_payload(secret, ts, &body));
        }

        let resp = req.body(body).send().await.map_err(transport)?;
        let dto: SthDto = read_json(resp).await?;
        SignedTreeHead::try_from(dto).map_err(malformed)
    }
}
