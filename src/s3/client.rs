//! 对象存储客户端
//!
//! Object-level operations over the signed HTTP surface. Each call is one
//! blocking round trip translated into a typed result; status handling is
//! deliberately strict (for example a 201 on a plain upload is rejected so
//! a silently-degraded backend cannot pass for a healthy one). Nothing here
//! retries; the one retried operation lives in `invalidation.rs`.

use std::collections::BTreeMap;
use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use sha2::{Digest, Sha256};

use crate::error::{FsError, FsResult};

use super::config::StorageConfig;
use super::signer::RequestSigner;
use super::transport::{HttpRequest, HttpResponse, HttpTransport};
use super::types::{parse_timestamp, ApiErrorBody, HeadObject, ListBucketResult, ListPage, ObjectSummary};

/// Hard cap of the listing API / 列表接口单页上限
pub const MAX_LIST_KEYS: usize = 1000;

pub struct StorageClient {
    config: StorageConfig,
    signer: RequestSigner,
    transport: Arc<dyn HttpTransport>,
}

impl StorageClient {
    pub fn new(config: StorageConfig, transport: Arc<dyn HttpTransport>) -> Self {
        let signer = RequestSigner::new(config.credentials(), config.region.clone(), "s3");
        Self {
            config,
            signer,
            transport,
        }
    }

    pub fn bucket(&self) -> &str {
        &self.config.bucket
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Apply the configured root prefix / 应用桶内根路径前缀
    fn full_key(&self, key: &str) -> String {
        let root = self.config.root_path.trim_matches('/');
        let key = key.trim_start_matches('/');
        if root.is_empty() {
            key.to_string()
        } else if key.is_empty() {
            format!("{}/", root)
        } else {
            format!("{}/{}", root, key)
        }
    }

    fn strip_root<'a>(&self, key: &'a str) -> &'a str {
        let root = self.config.root_path.trim_matches('/');
        if root.is_empty() {
            return key;
        }
        key.strip_prefix(root)
            .map(|rest| rest.trim_start_matches('/'))
            .unwrap_or(key)
    }

    /// Bucket endpoint without object key / 桶端点地址
    fn base_url(&self) -> String {
        if self.config.endpoint.is_empty() {
            return format!(
                "https://{}.s3.{}.amazonaws.com",
                self.config.bucket, self.config.region
            );
        }
        let endpoint = self.config.endpoint.trim_end_matches('/');
        if self.config.force_path_style {
            format!("{}/{}", endpoint, self.config.bucket)
        } else {
            match endpoint.split_once("://") {
                Some((scheme, rest)) => format!("{}://{}.{}", scheme, self.config.bucket, rest),
                None => format!("https://{}.{}", self.config.bucket, endpoint),
            }
        }
    }

    fn object_url(&self, key: &str) -> String {
        let encoded: Vec<String> = self
            .full_key(key)
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect();
        format!("{}/{}", self.base_url(), encoded.join("/"))
    }

    /// Sign and execute one request / 签名并执行一次请求
    async fn send(
        &self,
        method: &'static str,
        url: String,
        body: Option<Bytes>,
        extra_headers: &[(&str, String)],
    ) -> FsResult<HttpResponse> {
        let payload_hash = body.as_ref().map(|b| hex::encode(Sha256::digest(b)));
        let mut headers: BTreeMap<String, String> = extra_headers
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect();
        let authorization = self.signer.sign_headers(
            method,
            &url,
            payload_hash.as_deref(),
            &mut headers,
            Utc::now(),
        )?;

        let mut header_list: Vec<(String, String)> = headers.into_iter().collect();
        header_list.push(("authorization".to_string(), authorization));

        tracing::debug!("storage request: {} {}", method, url);
        self.transport
            .execute(HttpRequest {
                method: method.to_string(),
                url,
                headers: header_list,
                body: body.unwrap_or_default(),
            })
            .await
    }

    fn unexpected(
        operation: &'static str,
        key: &str,
        response: &HttpResponse,
    ) -> FsError {
        if response.status == 404 {
            return FsError::NotFound(key.to_string());
        }
        let message = match quick_xml::de::from_str::<ApiErrorBody>(&response.body_text()) {
            Ok(body) if !body.code.is_empty() => format!("{}: {}", body.code, body.message),
            _ => response.body_text().chars().take(200).collect(),
        };
        FsError::Api {
            operation,
            status: response.status,
            message,
        }
    }

    /// Download the whole object / 下载整个对象
    pub async fn get(&self, key: &str) -> FsResult<Bytes> {
        let response = self.send("GET", self.object_url(key), None, &[]).await?;
        if response.status != 200 {
            return Err(Self::unexpected("get", key, &response));
        }
        Ok(response.body)
    }

    /// Object metadata / 对象元数据
    pub async fn head(&self, key: &str) -> FsResult<HeadObject> {
        let response = self.send("HEAD", self.object_url(key), None, &[]).await?;
        if response.status != 200 {
            return Err(Self::unexpected("head", key, &response));
        }
        Ok(HeadObject {
            size: response
                .header("content-length")
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
            last_modified: response
                .header("last-modified")
                .map(parse_timestamp)
                .unwrap_or(0),
            content_type: response.header("content-type").unwrap_or("").to_string(),
        })
    }

    /// Upload an object. Only 200 counts as success; a 201 would mean the
    /// backend did something other than a plain replace. / 上传对象
    pub async fn put(&self, key: &str, body: Bytes, content_type: &str) -> FsResult<()> {
        let mut extra: Vec<(&str, String)> = Vec::new();
        if !content_type.is_empty() {
            extra.push(("content-type", content_type.to_string()));
        }
        let response = self
            .send("PUT", self.object_url(key), Some(body), &extra)
            .await?;
        if response.status != 200 {
            return Err(Self::unexpected("put", key, &response));
        }
        Ok(())
    }

    /// Delete an object; the API answers 204 on success / 删除对象
    pub async fn delete(&self, key: &str) -> FsResult<()> {
        let response = self.send("DELETE", self.object_url(key), None, &[]).await?;
        if response.status != 204 {
            return Err(Self::unexpected("delete", key, &response));
        }
        Ok(())
    }

    /// Server-side copy, used by rename / 服务端复制（重命名使用）
    pub async fn copy(&self, source_key: &str, target_key: &str) -> FsResult<()> {
        let source = format!(
            "/{}/{}",
            self.config.bucket,
            self.full_key(source_key)
                .split('/')
                .map(|segment| urlencoding::encode(segment).into_owned())
                .collect::<Vec<_>>()
                .join("/")
        );
        let response = self
            .send(
                "PUT",
                self.object_url(target_key),
                None,
                &[("x-amz-copy-source", source)],
            )
            .await?;
        if response.status != 200 {
            return Err(Self::unexpected("copy", source_key, &response));
        }
        Ok(())
    }

    /// One page of object listing. `max_keys` is validated against the API
    /// cap; callers use `list(prefix, 2)` to cheaply test directory
    /// emptiness. / 列出一页对象
    pub async fn list(&self, prefix: &str, max_keys: usize) -> FsResult<Vec<ObjectSummary>> {
        Ok(self.list_page(prefix, max_keys, None).await?.objects)
    }

    pub(crate) async fn list_page(
        &self,
        prefix: &str,
        max_keys: usize,
        continuation_token: Option<&str>,
    ) -> FsResult<ListPage> {
        if max_keys > MAX_LIST_KEYS {
            return Err(FsError::InvalidArgument(format!(
                "max_keys must be between 0 and {}, got {}",
                MAX_LIST_KEYS, max_keys
            )));
        }

        let mut query = vec![
            ("list-type".to_string(), "2".to_string()),
            ("max-keys".to_string(), max_keys.to_string()),
            ("prefix".to_string(), self.full_key(prefix)),
        ];
        if let Some(token) = continuation_token {
            query.push(("continuation-token".to_string(), token.to_string()));
        }
        let query_string = query
            .iter()
            .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        let url = format!("{}?{}", self.base_url(), query_string);

        let response = self.send("GET", url, None, &[]).await?;
        if response.status != 200 {
            return Err(Self::unexpected("list", prefix, &response));
        }
        if response.body.is_empty() {
            return Err(FsError::Api {
                operation: "list",
                status: response.status,
                message: "empty listing response body".to_string(),
            });
        }

        let parsed: ListBucketResult = quick_xml::de::from_str(&response.body_text())
            .map_err(|e| FsError::Api {
                operation: "list",
                status: response.status,
                message: format!("unparseable listing body: {}", e),
            })?;

        let objects = parsed
            .contents
            .into_iter()
            .map(|entry| ObjectSummary {
                key: self.strip_root(&entry.key).to_string(),
                size: entry.size,
                last_modified: parse_timestamp(&entry.last_modified),
            })
            .collect();
        Ok(ListPage {
            objects,
            next_token: if parsed.is_truncated {
                parsed.next_continuation_token
            } else {
                None
            },
        })
    }

    /// Exhaustive listing following continuation tokens / 遍历全部分页
    pub async fn list_all(&self, prefix: &str) -> FsResult<Vec<ObjectSummary>> {
        let mut objects = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let page = self
                .list_page(prefix, MAX_LIST_KEYS, token.as_deref())
                .await?;
            objects.extend(page.objects);
            match page.next_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }
        Ok(objects)
    }

    /// Existence probe. Every failure, including transient transport
    /// errors, maps to `false` — absence and unreachability are conflated
    /// here on purpose; callers that need the distinction must use `head`.
    /// / 存在性探测（故意吞掉所有错误）
    pub async fn exists(&self, key: &str) -> bool {
        self.head(key).await.is_ok()
    }

    /// Query-authenticated upload URL for external uploaders. The public
    /// tier bakes a public-read ACL header into the signature.
    /// / 生成预签名上传URL
    pub fn presigned_upload_url(&self, key: &str) -> FsResult<String> {
        let url = self.object_url(key);
        let acl: &[(&str, &str)] = if self.config.public_acl {
            &[("x-amz-acl", "public-read")]
        } else {
            &[]
        };
        self.signer
            .presign_url(&url, "PUT", acl, self.config.presign_expire_secs, Utc::now())
    }
}
