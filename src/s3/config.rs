//! 存储客户端配置
//!
//! Deserialized from the host's provider settings; every optional field has
//! a serde default so partial configs stay valid.

use serde::{Deserialize, Serialize};

use super::signer::Credentials;

/// Object storage client configuration / 对象存储配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Bucket name / 存储桶名称
    pub bucket: String,
    /// Endpoint override for S3-compatible stores (MinIO, OSS, COS).
    /// Empty means the provider-hosted `https://{bucket}.s3.{region}.amazonaws.com`
    /// / 自定义端点，留空使用官方地址
    #[serde(default)]
    pub endpoint: String,
    /// Region / 区域
    #[serde(default = "default_region")]
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    /// Session token for temporary credentials / 临时凭证会话令牌
    #[serde(default)]
    pub session_token: String,
    /// Key prefix inside the bucket / 桶内根路径
    #[serde(default)]
    pub root_path: String,
    /// Path-style addressing instead of virtual-hosted (MinIO needs this)
    /// / 强制路径风格
    #[serde(default)]
    pub force_path_style: bool,
    /// Request public-read ACL on presigned upload URLs (the public tier
    /// sets this) / 预签名上传URL是否带公开读ACL
    #[serde(default)]
    pub public_acl: bool,
    /// Presigned upload URL lifetime in seconds / 预签名URL有效期（秒）
    #[serde(default = "default_presign_expire")]
    pub presign_expire_secs: u64,
    /// HTTP connect timeout in seconds / 连接超时（秒）
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// HTTP total request timeout in seconds / 请求总超时（秒）
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_presign_expire() -> u64 {
    // 15 minutes, long enough for an external uploader
    900
}

fn default_connect_timeout() -> u64 {
    5
}

fn default_request_timeout() -> u64 {
    30
}

impl StorageConfig {
    pub fn credentials(&self) -> Credentials {
        Credentials::new(
            self.access_key_id.clone(),
            self.secret_access_key.clone(),
            if self.session_token.is_empty() {
                None
            } else {
                Some(self.session_token.clone())
            },
        )
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            endpoint: String::new(),
            region: default_region(),
            access_key_id: String::new(),
            secret_access_key: String::new(),
            session_token: String::new(),
            root_path: String::new(),
            force_path_style: false,
            public_acl: false,
            presign_expire_secs: default_presign_expire(),
            connect_timeout_secs: default_connect_timeout(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_with_defaults() {
        let config: StorageConfig = serde_json::from_value(serde_json::json!({
            "bucket": "media",
            "access_key_id": "AKID",
            "secret_access_key": "secret"
        }))
        .unwrap();
        assert_eq!(config.region, "us-east-1");
        assert_eq!(config.connect_timeout_secs, 5);
        assert!(!config.force_path_style);
        assert!(config.credentials().session_token.is_none());
    }
}
