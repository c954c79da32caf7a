//! Object storage backend: signing, transport and the object client
//! / 对象存储后端：签名、传输与对象客户端

pub mod client;
pub mod config;
pub mod invalidation;
pub mod signer;
pub mod transport;
pub mod types;

pub use client::{StorageClient, MAX_LIST_KEYS};
pub use config::StorageConfig;
pub use invalidation::{InvalidationClient, InvalidationConfig};
pub use signer::{Credentials, RequestSigner, EMPTY_PAYLOAD_SHA256, UNSIGNED_PAYLOAD};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
pub use types::{HeadObject, ListPage, ObjectSummary};
