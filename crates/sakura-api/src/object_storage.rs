//! Object storage APIs
//!
//! Buckets are managed through the control-plane API; objects go through an
//! S3-compatible endpoint reached with per-resource credentials.

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Endpoint used when the configuration does not name one
pub const DEFAULT_S3_ENDPOINT: &str = "s3.isk01.sakurastorage.jp";

/// Content type used when none is given
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bucket {
    #[serde(rename = "Name")]
    pub name: String,

    #[serde(rename = "SiteID")]
    pub site_id: String,

    #[serde(rename = "CreatedAt")]
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait ObjectStorageApi: Send + Sync {
    async fn create_bucket(&self, site_id: &str, name: &str) -> Result<Bucket>;

    async fn read_bucket(&self, site_id: &str, name: &str) -> Result<Bucket>;

    async fn delete_bucket(&self, site_id: &str, name: &str) -> Result<()>;
}

/// Credentials for an S3-compatible endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Credentials {
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
}

/// Metadata of a stored object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    pub key: String,
    pub etag: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
    /// Empty when the bucket is not versioned
    pub version_id: String,
    pub content_type: String,
    pub storage_class: String,
}

/// Upload request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PutObject {
    pub bucket: String,
    pub key: String,
    pub body: Vec<u8>,
    pub content_type: String,
    pub cache_control: Option<String>,
    pub user_metadata: BTreeMap<String, String>,
}

#[async_trait]
pub trait S3Api: Send + Sync {
    async fn put_object(&self, request: PutObject) -> Result<()>;

    async fn stat_object(&self, bucket: &str, key: &str) -> Result<ObjectInfo>;

    /// Remove every version of `key` when `version_id` is set
    async fn delete_object(&self, bucket: &str, key: &str, version_id: Option<&str>) -> Result<()>;
}

/// Builds S3 clients from per-resource credentials
pub trait S3ClientFactory: Send + Sync {
    fn connect(&self, credentials: &S3Credentials) -> Result<Arc<dyn S3Api>>;
}
