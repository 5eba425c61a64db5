//! Local router API (global)
//!
//! A local router is created bare and then configured through
//! [`LocalRouterApi::update_settings`].

use crate::error::Result;
use crate::search::{FindCondition, Searchable};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalRouterSwitch {
    /// Resource ID of the connected switch
    #[serde(rename = "Code")]
    pub code: String,

    #[serde(rename = "Category")]
    pub category: String,

    #[serde(rename = "ZoneID")]
    pub zone_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalRouterInterface {
    #[serde(rename = "VirtualIPAddress")]
    pub virtual_ip_address: String,

    #[serde(rename = "IPAddress")]
    pub ip_addresses: Vec<String>,

    #[serde(rename = "NetworkMaskLen")]
    pub network_mask_len: u8,

    #[serde(rename = "VRID")]
    pub vrid: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalRouterPeer {
    #[serde(rename = "ID")]
    pub id: String,

    #[serde(rename = "SecretKey")]
    pub secret_key: String,

    #[serde(rename = "Enabled")]
    pub enabled: bool,

    #[serde(rename = "Description", default)]
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalRouterStaticRoute {
    #[serde(rename = "Prefix")]
    pub prefix: String,

    #[serde(rename = "NextHop")]
    pub next_hop: String,
}

/// Local router record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalRouter {
    #[serde(rename = "ID")]
    pub id: String,

    #[serde(rename = "Name")]
    pub name: String,

    #[serde(rename = "Description", default)]
    pub description: String,

    #[serde(rename = "Tags", default)]
    pub tags: Vec<String>,

    #[serde(rename = "IconID", default)]
    pub icon_id: String,

    #[serde(rename = "Switch")]
    pub switch: Option<LocalRouterSwitch>,

    #[serde(rename = "Interface")]
    pub interface: Option<LocalRouterInterface>,

    #[serde(rename = "Peers", default)]
    pub peers: Vec<LocalRouterPeer>,

    #[serde(rename = "StaticRoutes", default)]
    pub static_routes: Vec<LocalRouterStaticRoute>,

    /// Keys other routers use to peer with this one
    #[serde(rename = "SecretKeys", default)]
    pub secret_keys: Vec<String>,
}

impl Searchable for LocalRouter {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn tags(&self) -> &[String] {
        &self.tags
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalRouterCreateRequest {
    #[serde(rename = "Name")]
    pub name: String,

    #[serde(rename = "Description")]
    pub description: String,

    #[serde(rename = "Tags")]
    pub tags: Vec<String>,

    #[serde(rename = "IconID")]
    pub icon_id: String,
}

pub type LocalRouterUpdateRequest = LocalRouterCreateRequest;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalRouterSettings {
    #[serde(rename = "Switch")]
    pub switch: Option<LocalRouterSwitch>,

    #[serde(rename = "Interface")]
    pub interface: Option<LocalRouterInterface>,

    #[serde(rename = "Peers")]
    pub peers: Vec<LocalRouterPeer>,

    #[serde(rename = "StaticRoutes")]
    pub static_routes: Vec<LocalRouterStaticRoute>,
}

#[async_trait]
pub trait LocalRouterApi: Send + Sync {
    async fn find(&self, condition: &FindCondition) -> Result<Vec<LocalRouter>>;

    async fn create(&self, request: LocalRouterCreateRequest) -> Result<LocalRouter>;

    async fn read(&self, id: &str) -> Result<LocalRouter>;

    async fn update(&self, id: &str, request: LocalRouterUpdateRequest) -> Result<LocalRouter>;

    async fn update_settings(&self, id: &str, settings: LocalRouterSettings) -> Result<LocalRouter>;

    async fn delete(&self, id: &str) -> Result<()>;
}
