//! 文件系统提供者注册表
//!
//! An explicit scheme → filesystem map, built once per execution and
//! injected into whatever serves requests — no ambient global registration
//! state. The usual setup registers two tiers of the same filesystem:
//! a public bucket whose presigned upload URLs carry a public-read ACL,
//! and a private one that does not.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::{FsError, FsResult};
use crate::s3::{ReqwestTransport, StorageClient, StorageConfig};
use crate::vfs::{ObjectFs, StatCache, StreamFilesystem};

/// Split `scheme://rest` / 拆分协议前缀
pub fn split_scheme(path: &str) -> FsResult<(&str, &str)> {
    path.split_once("://")
        .filter(|(scheme, _)| !scheme.is_empty())
        .ok_or_else(|| FsError::InvalidPath(format!("path has no scheme prefix: {:?}", path)))
}

/// Configuration for one registered tier / 单个层级的配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierConfig {
    /// Scheme the tier is registered under / 注册的协议名
    pub scheme: String,
    #[serde(flatten)]
    pub storage: StorageConfig,
}

pub struct FsRegistry {
    providers: HashMap<String, Arc<ObjectFs>>,
}

impl FsRegistry {
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
        }
    }

    pub fn register(&mut self, fs: Arc<ObjectFs>) {
        tracing::info!("registered filesystem provider: {}://", fs.scheme());
        self.providers.insert(fs.scheme().to_string(), fs);
    }

    pub fn get(&self, scheme: &str) -> Option<Arc<ObjectFs>> {
        self.providers.get(scheme).cloned()
    }

    /// Resolve a full path to its provider / 根据路径解析提供者
    pub fn resolve(&self, path: &str) -> FsResult<Arc<ObjectFs>> {
        let (scheme, _) = split_scheme(path)?;
        self.get(scheme)
            .ok_or_else(|| FsError::InvalidPath(format!("no provider for scheme {:?}", scheme)))
    }

    pub fn schemes(&self) -> Vec<String> {
        self.providers.keys().cloned().collect()
    }
}

impl Default for FsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Build one tier: transport, client and an execution-scoped cache.
/// / 构建单个层级
pub fn build_tier(config: TierConfig) -> Result<Arc<ObjectFs>> {
    if config.scheme.is_empty() {
        return Err(anyhow!("tier scheme must not be empty"));
    }
    if config.storage.bucket.is_empty() {
        return Err(anyhow!("tier {:?} has no bucket configured", config.scheme));
    }
    let transport = ReqwestTransport::new(
        config.storage.connect_timeout_secs,
        config.storage.request_timeout_secs,
    )
    .with_context(|| format!("building HTTP transport for {:?}", config.scheme))?;
    let client = Arc::new(StorageClient::new(config.storage, Arc::new(transport)));
    Ok(Arc::new(ObjectFs::new(
        config.scheme,
        client,
        Arc::new(StatCache::new()),
    )))
}

/// Parse a tier from the host's raw settings value / 从原始配置解析层级
pub fn tier_from_value(value: serde_json::Value) -> Result<TierConfig> {
    serde_json::from_value(value).context("invalid tier configuration")
}

/// The standard two-tier setup. The public tier gets the public-read
/// presign ACL regardless of what the raw config says; the private tier
/// never does. / 标准双层注册
pub fn build_two_tier(mut public: TierConfig, mut private: TierConfig) -> Result<FsRegistry> {
    if public.scheme == private.scheme {
        return Err(anyhow!(
            "public and private tiers must use distinct schemes, both are {:?}",
            public.scheme
        ));
    }
    public.storage.public_acl = true;
    private.storage.public_acl = false;

    let mut registry = FsRegistry::new();
    registry.register(build_tier(public)?);
    registry.register(build_tier(private)?);
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tier(scheme: &str) -> TierConfig {
        TierConfig {
            scheme: scheme.to_string(),
            storage: StorageConfig {
                bucket: format!("{}-bucket", scheme),
                access_key_id: "AKID".into(),
                secret_access_key: "secret".into(),
                ..StorageConfig::default()
            },
        }
    }

    #[test]
    fn split_scheme_paths() {
        assert_eq!(split_scheme("store://a/b.txt").unwrap(), ("store", "a/b.txt"));
        assert_eq!(split_scheme("store://").unwrap(), ("store", ""));
        assert!(split_scheme("/local/path").is_err());
        assert!(split_scheme("://x").is_err());
    }

    #[test]
    fn two_tier_acl_split() {
        let registry = build_two_tier(tier("store"), tier("store-private")).unwrap();

        let public = registry.get("store").unwrap();
        let url = public.presigned_upload_url("store://up.bin").unwrap();
        assert!(url.contains("x-amz-acl"));

        let private = registry.get("store-private").unwrap();
        let url = private.presigned_upload_url("store-private://up.bin").unwrap();
        assert!(!url.contains("x-amz-acl"));
    }

    #[test]
    fn resolve_by_scheme() {
        let registry = build_two_tier(tier("store"), tier("store-private")).unwrap();
        assert_eq!(registry.resolve("store://x").unwrap().scheme(), "store");
        assert!(matches!(
            registry.resolve("unknown://x").unwrap_err(),
            FsError::InvalidPath(_)
        ));
    }

    #[test]
    fn duplicate_schemes_rejected() {
        assert!(build_two_tier(tier("store"), tier("store")).is_err());
    }

    #[test]
    fn tier_from_raw_settings() {
        let config = tier_from_value(serde_json::json!({
            "scheme": "store",
            "bucket": "media",
            "access_key_id": "AKID",
            "secret_access_key": "secret",
            "region": "ap-southeast-2"
        }))
        .unwrap();
        assert_eq!(config.scheme, "store");
        assert_eq!(config.storage.region, "ap-southeast-2");
    }
}
