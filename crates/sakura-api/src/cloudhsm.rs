//! CloudHSM API
//!
//! Every call is scoped to a zone; only a few zones offer the service.

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sakura_framework::Named;
use serde::{Deserialize, Serialize};

/// Zones where CloudHSM is offered
pub const CLOUDHSM_ZONES: [&str; 2] = ["is1b", "tk1a"];

/// Zone used when the provider default is not a CloudHSM zone
pub const CLOUDHSM_DEFAULT_ZONE: &str = "is1b";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudHsmLocalRouter {
    #[serde(rename = "ResourceID")]
    pub resource_id: String,

    #[serde(rename = "SecretKey")]
    pub secret_key: String,
}

/// CloudHSM appliance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudHsm {
    #[serde(rename = "ID")]
    pub id: String,

    #[serde(rename = "Name")]
    pub name: String,

    #[serde(rename = "Description", default)]
    pub description: String,

    #[serde(rename = "Tags", default)]
    pub tags: Vec<String>,

    #[serde(rename = "Ipv4NetworkAddress")]
    pub ipv4_network_address: String,

    #[serde(rename = "Ipv4PrefixLength")]
    pub ipv4_prefix_length: u8,

    /// Assigned by the service
    #[serde(rename = "Ipv4Address", default)]
    pub ipv4_address: String,

    #[serde(rename = "LocalRouter")]
    pub local_router: Option<CloudHsmLocalRouter>,

    #[serde(rename = "Availability")]
    pub availability: String,

    #[serde(rename = "CreatedAt")]
    pub created_at: DateTime<Utc>,

    #[serde(rename = "ModifiedAt")]
    pub modified_at: DateTime<Utc>,
}

impl Named for CloudHsm {
    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudHsmParams {
    #[serde(rename = "Name")]
    pub name: String,

    #[serde(rename = "Description")]
    pub description: Option<String>,

    #[serde(rename = "Tags")]
    pub tags: Vec<String>,

    #[serde(rename = "Ipv4NetworkAddress")]
    pub ipv4_network_address: String,

    #[serde(rename = "Ipv4PrefixLength")]
    pub ipv4_prefix_length: u8,
}

/// Client certificate registered with an HSM
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudHsmClient {
    #[serde(rename = "ID")]
    pub id: String,

    #[serde(rename = "Name")]
    pub name: String,

    #[serde(rename = "Certificate")]
    pub certificate: String,

    #[serde(rename = "Availability")]
    pub availability: String,

    #[serde(rename = "CreatedAt")]
    pub created_at: DateTime<Utc>,

    #[serde(rename = "ModifiedAt")]
    pub modified_at: DateTime<Utc>,
}

impl Named for CloudHsmClient {
    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudHsmClientParams {
    #[serde(rename = "Name")]
    pub name: String,

    #[serde(rename = "Certificate")]
    pub certificate: String,
}

#[async_trait]
pub trait CloudHsmApi: Send + Sync {
    async fn list(&self, zone: &str) -> Result<Vec<CloudHsm>>;

    async fn create(&self, zone: &str, params: CloudHsmParams) -> Result<CloudHsm>;

    async fn read(&self, zone: &str, id: &str) -> Result<CloudHsm>;

    async fn update(&self, zone: &str, id: &str, params: CloudHsmParams) -> Result<CloudHsm>;

    async fn delete(&self, zone: &str, id: &str) -> Result<()>;

    async fn list_clients(&self, zone: &str, hsm_id: &str) -> Result<Vec<CloudHsmClient>>;

    async fn create_client(
        &self,
        zone: &str,
        hsm_id: &str,
        params: CloudHsmClientParams,
    ) -> Result<CloudHsmClient>;

    async fn read_client(&self, zone: &str, hsm_id: &str, id: &str) -> Result<CloudHsmClient>;

    /// Only the name can change
    async fn update_client(
        &self,
        zone: &str,
        hsm_id: &str,
        id: &str,
        name: &str,
    ) -> Result<CloudHsmClient>;

    async fn delete_client(&self, zone: &str, hsm_id: &str, id: &str) -> Result<()>;
}
