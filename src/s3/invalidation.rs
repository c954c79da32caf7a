//! 批量失效提交
//!
//! Batch path-invalidation submission against the distribution endpoint.
//! This is the only operation in the storage layer that retries: the
//! endpoint throttles aggressively, so 5xx, 429 and the documented
//! throttling error codes back off linearly (attempt × base delay) up to a
//! small fixed attempt count. Every submission carries a fresh caller
//! reference so the endpoint can deduplicate replays of the same batch.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{FsError, FsResult};

use super::signer::{Credentials, RequestSigner};
use super::transport::{HttpRequest, HttpTransport};
use super::types::ApiErrorBody;

/// Error codes the endpoint uses for rate limiting / 限流错误码
const THROTTLING_CODES: &[&str] = &[
    "Throttling",
    "ThrottlingException",
    "TooManyInvalidationsInProgress",
    "ServiceUnavailable",
    "SlowDown",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvalidationConfig {
    pub distribution_id: String,
    /// Endpoint host; the distribution API is global and lives in one
    /// region / 失效接口端点
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Base delay; attempt N sleeps N × this / 重试基础延迟（毫秒）
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

fn default_endpoint() -> String {
    "https://cloudfront.amazonaws.com".to_string()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    500
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InvalidationResponse {
    #[serde(default)]
    id: String,
}

pub struct InvalidationClient {
    config: InvalidationConfig,
    signer: RequestSigner,
    transport: Arc<dyn HttpTransport>,
}

impl InvalidationClient {
    pub fn new(
        config: InvalidationConfig,
        credentials: Credentials,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        let signer = RequestSigner::new(credentials, "us-east-1", "cloudfront");
        Self {
            config,
            signer,
            transport,
        }
    }

    /// Submit one batch of paths; returns the invalidation id. The batch
    /// body (including its caller reference) is fixed across retries of the
    /// same submission. / 提交一批失效路径
    pub async fn submit(&self, paths: &[String]) -> FsResult<String> {
        if paths.is_empty() {
            return Err(FsError::InvalidArgument(
                "invalidation batch must contain at least one path".into(),
            ));
        }

        let body = Bytes::from(build_batch_body(paths));
        let url = format!(
            "{}/2020-05-31/distribution/{}/invalidation",
            self.config.endpoint.trim_end_matches('/'),
            self.config.distribution_id
        );

        let mut attempt = 0;
        loop {
            attempt += 1;
            let response = self.execute_signed(&url, body.clone()).await?;
            if response.status == 200 || response.status == 201 {
                let parsed: InvalidationResponse =
                    quick_xml::de::from_str(&response.body_text()).unwrap_or(
                        InvalidationResponse { id: String::new() },
                    );
                return Ok(parsed.id);
            }

            let code = quick_xml::de::from_str::<ApiErrorBody>(&response.body_text())
                .map(|e| e.code)
                .unwrap_or_default();
            let retryable = response.status >= 500
                || response.status == 429
                || THROTTLING_CODES.contains(&code.as_str());

            if retryable && attempt < self.config.max_attempts {
                let delay = self.config.retry_delay_ms * attempt as u64;
                tracing::debug!(
                    "invalidation attempt {} got {} ({}), retrying in {}ms",
                    attempt,
                    response.status,
                    code,
                    delay
                );
                tokio::time::sleep(Duration::from_millis(delay)).await;
                continue;
            }

            return Err(FsError::Api {
                operation: "invalidate",
                status: response.status,
                message: code,
            });
        }
    }

    async fn execute_signed(
        &self,
        url: &str,
        body: Bytes,
    ) -> FsResult<super::transport::HttpResponse> {
        let payload_hash = hex::encode(Sha256::digest(&body));
        let mut headers: BTreeMap<String, String> = BTreeMap::new();
        headers.insert("content-type".into(), "text/xml".into());
        let authorization =
            self.signer
                .sign_headers("POST", url, Some(&payload_hash), &mut headers, Utc::now())?;
        let mut header_list: Vec<(String, String)> = headers.into_iter().collect();
        header_list.push(("authorization".into(), authorization));

        self.transport
            .execute(HttpRequest {
                method: "POST".into(),
                url: url.to_string(),
                headers: header_list,
                body,
            })
            .await
    }
}

/// The caller reference is a fresh v4 UUID per batch; uniqueness matters,
/// the value itself does not participate in the signing structure.
/// / 每批一个新的调用引用
fn build_batch_body(paths: &[String]) -> String {
    let items: String = paths
        .iter()
        .map(|path| format!("<Path>{}</Path>", escape_xml(path)))
        .collect();
    format!(
        "<InvalidationBatch xmlns=\"http://cloudfront.amazonaws.com/doc/2020-05-31/\">\
         <CallerReference>{}</CallerReference>\
         <Paths><Quantity>{}</Quantity><Items>{}</Items></Paths>\
         </InvalidationBatch>",
        uuid::Uuid::new_v4(),
        paths.len(),
        items
    )
}

fn escape_xml(raw: &str) -> String {
    raw.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}
