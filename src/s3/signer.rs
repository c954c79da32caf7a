//! 请求签名器：canonical request -> string-to-sign -> 链式HMAC签名
//!
//! Implements the version-4 style signing protocol: a canonical request is
//! hashed into a string-to-sign, which is signed with a key derived from the
//! secret through date/region/service scoped HMAC chaining. Header signing
//! and query-string (presigned URL) signing share the same core.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use url::Url;

use crate::error::{FsError, FsResult};

type HmacSha256 = Hmac<Sha256>;

/// SHA-256 of the empty string; the protocol's fallback payload hash for
/// bodyless requests / 空请求体的占位哈希
pub const EMPTY_PAYLOAD_SHA256: &str =
    "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

/// Payload sentinel for presigned URLs (the body is not known at signing
/// time) / 预签名URL的负载占位符
pub const UNSIGNED_PAYLOAD: &str = "UNSIGNED-PAYLOAD";

const ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// Signing credentials, immutable for the lifetime of a client
/// / 签名凭证，在客户端生命周期内不可变
#[derive(Debug, Clone)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    /// Session token for temporary credentials / 临时凭证的会话令牌
    pub session_token: Option<String>,
}

impl Credentials {
    pub fn new(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        session_token: Option<String>,
    ) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token: session_token.filter(|t| !t.is_empty()),
        }
    }
}

/// Builds authentication material for storage API requests. Pure: the same
/// inputs always produce the same signature. / 请求签名器
pub struct RequestSigner {
    credentials: Credentials,
    region: String,
    service: String,
}

impl RequestSigner {
    pub fn new(
        credentials: Credentials,
        region: impl Into<String>,
        service: impl Into<String>,
    ) -> Self {
        Self {
            credentials,
            region: region.into(),
            service: service.into(),
        }
    }

    /// Sign a request by headers. Inserts the protocol headers (`host`,
    /// `x-amz-date`, `x-amz-content-sha256`, optional security token) into
    /// `headers`, lower-cases and sorts everything, and returns the
    /// `authorization` header value. The caller must transmit exactly the
    /// headers left in the map. / 通过请求头签名
    ///
    /// `payload_hash` is the hex SHA-256 of the body; `None` falls back to
    /// the empty-body sentinel.
    pub fn sign_headers(
        &self,
        method: &str,
        url: &str,
        payload_hash: Option<&str>,
        headers: &mut BTreeMap<String, String>,
        now: DateTime<Utc>,
    ) -> FsResult<String> {
        let parsed = parse_request_url(url)?;
        let host_value = host_with_port(&parsed)?;
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date_stamp = now.format("%Y%m%d").to_string();
        let payload_hash = payload_hash.unwrap_or(EMPTY_PAYLOAD_SHA256);

        // 全部小写并排序（BTreeMap 天然有序）
        let mut canonical: BTreeMap<String, String> = headers
            .iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v.trim().to_string()))
            .collect();
        canonical.insert("host".into(), host_value);
        canonical.insert("x-amz-date".into(), amz_date.clone());
        canonical.insert("x-amz-content-sha256".into(), payload_hash.to_string());
        if let Some(token) = &self.credentials.session_token {
            canonical.insert("x-amz-security-token".into(), token.clone());
        }

        let signed_headers = canonical.keys().cloned().collect::<Vec<_>>().join(";");
        let canonical_headers: String = canonical
            .iter()
            .map(|(k, v)| format!("{}:{}\n", k, v))
            .collect();

        let canonical_request = format!(
            "{}\n{}\n{}\n{}\n{}\n{}",
            method,
            parsed.path(),
            canonical_query_string(&parsed),
            canonical_headers,
            signed_headers,
            payload_hash
        );

        let scope = format!(
            "{}/{}/{}/aws4_request",
            date_stamp, self.region, self.service
        );
        let string_to_sign = format!(
            "{}\n{}\n{}\n{}",
            ALGORITHM,
            amz_date,
            scope,
            hex::encode(Sha256::digest(canonical_request.as_bytes()))
        );
        let signature = hex::encode(hmac_sha256(
            &self.signing_key(&date_stamp),
            string_to_sign.as_bytes(),
        ));

        *headers = canonical;

        Ok(format!(
            "{} Credential={}/{}, SignedHeaders={}, Signature={}",
            ALGORITHM, self.credentials.access_key_id, scope, signed_headers, signature
        ))
    }

    /// Build a query-string authenticated URL. `extra_headers` (for example
    /// an ACL header) are folded into the signed-header list and must be
    /// sent verbatim by whoever uses the URL. / 生成预签名URL
    pub fn presign_url(
        &self,
        url: &str,
        method: &str,
        extra_headers: &[(&str, &str)],
        expires_secs: u64,
        now: DateTime<Utc>,
    ) -> FsResult<String> {
        let parsed = parse_request_url(url)?;
        let host_value = host_with_port(&parsed)?;
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date_stamp = now.format("%Y%m%d").to_string();
        let scope = format!(
            "{}/{}/{}/aws4_request",
            date_stamp, self.region, self.service
        );

        let mut canonical_headers: BTreeMap<String, String> = extra_headers
            .iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v.trim().to_string()))
            .collect();
        canonical_headers.insert("host".into(), host_value.clone());
        let signed_headers = canonical_headers
            .keys()
            .cloned()
            .collect::<Vec<_>>()
            .join(";");
        let canonical_header_block: String = canonical_headers
            .iter()
            .map(|(k, v)| format!("{}:{}\n", k, v))
            .collect();

        let mut params: Vec<(String, String)> = parsed
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        params.push(("X-Amz-Algorithm".into(), ALGORITHM.into()));
        params.push((
            "X-Amz-Credential".into(),
            format!("{}/{}", self.credentials.access_key_id, scope),
        ));
        params.push(("X-Amz-Date".into(), amz_date));
        params.push(("X-Amz-Expires".into(), expires_secs.to_string()));
        params.push(("X-Amz-SignedHeaders".into(), signed_headers.clone()));
        if let Some(token) = &self.credentials.session_token {
            params.push(("X-Amz-Security-Token".into(), token.clone()));
        }

        let mut encoded: Vec<String> = params
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect();
        encoded.sort();
        let canonical_query = encoded.join("&");

        let canonical_request = format!(
            "{}\n{}\n{}\n{}\n{}\n{}",
            method,
            parsed.path(),
            canonical_query,
            canonical_header_block,
            signed_headers,
            UNSIGNED_PAYLOAD
        );
        let string_to_sign = format!(
            "{}\n{}\n{}\n{}",
            ALGORITHM,
            now.format("%Y%m%dT%H%M%SZ"),
            scope,
            hex::encode(Sha256::digest(canonical_request.as_bytes()))
        );
        let signature = hex::encode(hmac_sha256(
            &self.signing_key(&date_stamp),
            string_to_sign.as_bytes(),
        ));

        // 签名参数必须位于末尾 / signature goes last
        Ok(format!(
            "{}://{}{}?{}&X-Amz-Signature={}",
            parsed.scheme(),
            host_value,
            parsed.path(),
            canonical_query,
            signature
        ))
    }

    /// Chained HMAC key derivation scoped by date, region and service
    /// / 按日期、区域、服务派生签名密钥
    fn signing_key(&self, date_stamp: &str) -> Vec<u8> {
        let k_date = hmac_sha256(
            format!("AWS4{}", self.credentials.secret_access_key).as_bytes(),
            date_stamp.as_bytes(),
        );
        let k_region = hmac_sha256(&k_date, self.region.as_bytes());
        let k_service = hmac_sha256(&k_region, self.service.as_bytes());
        hmac_sha256(&k_service, b"aws4_request")
    }
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// A request URI without host or path component is a programming error and
/// fails fast, never retried. / 无效URI直接报错
fn parse_request_url(url: &str) -> FsResult<Url> {
    let parsed =
        Url::parse(url).map_err(|e| FsError::InvalidPath(format!("{}: {}", url, e)))?;
    if parsed.cannot_be_a_base() || parsed.host_str().is_none() {
        return Err(FsError::InvalidPath(format!(
            "request URI is missing host or path: {}",
            url
        )));
    }
    Ok(parsed)
}

fn host_with_port(url: &Url) -> FsResult<String> {
    let host = url
        .host_str()
        .ok_or_else(|| FsError::InvalidPath(format!("request URI has no host: {}", url)))?;
    Ok(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}

fn canonical_query_string(url: &Url) -> String {
    let mut pairs: Vec<String> = url
        .query_pairs()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(&k), urlencoding::encode(&v)))
        .collect();
    pairs.sort();
    pairs.join("&")
}
