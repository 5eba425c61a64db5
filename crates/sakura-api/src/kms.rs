//! KMS API

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sakura_framework::Named;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where the key material came from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyOrigin {
    #[default]
    Generated,
    Imported,
}

impl KeyOrigin {
    pub const NAMES: [&'static str; 2] = ["generated", "imported"];

    pub fn as_str(&self) -> &'static str {
        match self {
            KeyOrigin::Generated => "generated",
            KeyOrigin::Imported => "imported",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "generated" => Some(KeyOrigin::Generated),
            "imported" => Some(KeyOrigin::Imported),
            _ => None,
        }
    }
}

impl fmt::Display for KeyOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyStatus {
    #[default]
    Active,
    Restricted,
    PendingDestruction,
}

impl KeyStatus {
    /// Statuses a user may request
    pub const NAMES: [&'static str; 2] = ["active", "restricted"];

    pub fn as_str(&self) -> &'static str {
        match self {
            KeyStatus::Active => "active",
            KeyStatus::Restricted => "restricted",
            KeyStatus::PendingDestruction => "pending_destruction",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(KeyStatus::Active),
            "restricted" => Some(KeyStatus::Restricted),
            "pending_destruction" => Some(KeyStatus::PendingDestruction),
            _ => None,
        }
    }
}

impl fmt::Display for KeyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// KMS key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Key {
    #[serde(rename = "ID")]
    pub id: String,

    #[serde(rename = "Name")]
    pub name: String,

    #[serde(rename = "Description", default)]
    pub description: String,

    #[serde(rename = "Tags", default)]
    pub tags: Vec<String>,

    #[serde(rename = "KeyOrigin")]
    pub key_origin: KeyOrigin,

    #[serde(rename = "Status")]
    pub status: KeyStatus,

    /// Material version, bumped by rotation
    #[serde(rename = "LatestVersion")]
    pub latest_version: i64,

    #[serde(rename = "CreatedAt")]
    pub created_at: DateTime<Utc>,

    #[serde(rename = "ModifiedAt")]
    pub modified_at: DateTime<Utc>,
}

impl Named for Key {
    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateKey {
    #[serde(rename = "Name")]
    pub name: String,

    #[serde(rename = "Description")]
    pub description: Option<String>,

    #[serde(rename = "Tags")]
    pub tags: Vec<String>,

    #[serde(rename = "KeyOrigin")]
    pub key_origin: KeyOrigin,

    /// Only for imported keys
    #[serde(rename = "PlainKey")]
    pub plain_key: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateKey {
    #[serde(rename = "Name")]
    pub name: String,

    #[serde(rename = "Description")]
    pub description: String,

    #[serde(rename = "Tags")]
    pub tags: Vec<String>,

    #[serde(rename = "KeyOrigin")]
    pub key_origin: KeyOrigin,
}

#[async_trait]
pub trait KmsApi: Send + Sync {
    async fn list(&self) -> Result<Vec<Key>>;

    async fn create(&self, request: CreateKey) -> Result<Key>;

    async fn read(&self, id: &str) -> Result<Key>;

    async fn update(&self, id: &str, request: UpdateKey) -> Result<Key>;

    async fn delete(&self, id: &str) -> Result<()>;

    async fn change_status(&self, id: &str, status: KeyStatus) -> Result<()>;

    async fn rotate(&self, id: &str) -> Result<Key>;

    /// Destroy the key after `days` instead of immediately
    async fn schedule_destruction(&self, id: &str, days: u32) -> Result<()>;
}
