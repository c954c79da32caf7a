//! 存储API报文模型（quick-xml + serde）

use chrono::DateTime;
use serde::Deserialize;

/// One object from a listing / 列表中的一个对象
#[derive(Debug, Clone)]
pub struct ObjectSummary {
    pub key: String,
    pub size: u64,
    /// Unix seconds / Unix时间戳（秒）
    pub last_modified: i64,
}

/// Metadata returned by a head lookup / head查询返回的元数据
#[derive(Debug, Clone)]
pub struct HeadObject {
    pub size: u64,
    pub last_modified: i64,
    pub content_type: String,
}

/// One page of listing results / 一页列表结果
#[derive(Debug, Clone)]
pub struct ListPage {
    pub objects: Vec<ObjectSummary>,
    pub next_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct ListBucketResult {
    #[serde(default)]
    pub contents: Vec<ListedObject>,
    #[serde(default)]
    pub is_truncated: bool,
    pub next_continuation_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct ListedObject {
    pub key: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub last_modified: String,
}

/// Structured error body / 结构化错误响应体
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct ApiErrorBody {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

/// Parse either the RFC 3339 form used in XML bodies or the RFC 2822 form
/// used in `Last-Modified` headers. Unparseable input maps to 0 rather than
/// failing the whole operation. / 解析两种时间格式
pub(crate) fn parse_timestamp(raw: &str) -> i64 {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return ts.timestamp();
    }
    if let Ok(ts) = DateTime::parse_from_rfc2822(raw) {
        return ts.timestamp();
    }
    0
}
