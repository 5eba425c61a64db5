//! SSH key API (global)

use crate::error::Result;
use crate::search::{FindCondition, Searchable};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Registered public key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SshKey {
    #[serde(rename = "ID")]
    pub id: String,

    #[serde(rename = "Name")]
    pub name: String,

    #[serde(rename = "Description", default)]
    pub description: String,

    #[serde(rename = "PublicKey")]
    pub public_key: String,

    /// Computed by the API
    #[serde(rename = "Fingerprint")]
    pub fingerprint: String,

    #[serde(rename = "CreatedAt")]
    pub created_at: DateTime<Utc>,
}

impl Searchable for SshKey {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SshKeyCreateRequest {
    #[serde(rename = "Name")]
    pub name: String,

    #[serde(rename = "Description")]
    pub description: String,

    #[serde(rename = "PublicKey")]
    pub public_key: String,
}

/// The public key itself cannot be changed in place
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SshKeyUpdateRequest {
    #[serde(rename = "Name")]
    pub name: String,

    #[serde(rename = "Description")]
    pub description: String,
}

#[async_trait]
pub trait SshKeyApi: Send + Sync {
    async fn find(&self, condition: &FindCondition) -> Result<Vec<SshKey>>;

    async fn create(&self, request: SshKeyCreateRequest) -> Result<SshKey>;

    async fn read(&self, id: &str) -> Result<SshKey>;

    async fn update(&self, id: &str, request: SshKeyUpdateRequest) -> Result<SshKey>;

    async fn delete(&self, id: &str) -> Result<()>;
}
