//! Bridge API (zoned)

use crate::error::Result;
use crate::search::{FindCondition, Searchable};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Bridge record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bridge {
    #[serde(rename = "ID")]
    pub id: String,

    #[serde(rename = "Name")]
    pub name: String,

    #[serde(rename = "Description", default)]
    pub description: String,

    #[serde(rename = "CreatedAt")]
    pub created_at: DateTime<Utc>,
}

impl Searchable for Bridge {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BridgeCreateRequest {
    #[serde(rename = "Name")]
    pub name: String,

    #[serde(rename = "Description")]
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BridgeUpdateRequest {
    #[serde(rename = "Name")]
    pub name: String,

    #[serde(rename = "Description")]
    pub description: String,
}

#[async_trait]
pub trait BridgeApi: Send + Sync {
    async fn find(&self, zone: &str, condition: &FindCondition) -> Result<Vec<Bridge>>;

    async fn create(&self, zone: &str, request: BridgeCreateRequest) -> Result<Bridge>;

    async fn read(&self, zone: &str, id: &str) -> Result<Bridge>;

    async fn update(&self, zone: &str, id: &str, request: BridgeUpdateRequest) -> Result<Bridge>;

    async fn delete(&self, zone: &str, id: &str) -> Result<()>;
}
