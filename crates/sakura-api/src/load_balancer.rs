//! Load balancer API (zoned)

use crate::error::Result;
use crate::search::{FindCondition, Searchable};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Appliance availability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Availability {
    #[default]
    Available,
    Migrating,
    Failed,
}

impl Availability {
    pub fn is_failed(&self) -> bool {
        matches!(self, Availability::Failed)
    }
}

/// Load balancer plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LoadBalancerPlan {
    #[default]
    #[serde(rename = "1")]
    Standard,
    #[serde(rename = "2")]
    HighSpec,
}

impl LoadBalancerPlan {
    pub const NAMES: [&'static str; 2] = ["standard", "highspec"];

    pub fn name(&self) -> &'static str {
        match self {
            LoadBalancerPlan::Standard => "standard",
            LoadBalancerPlan::HighSpec => "highspec",
        }
    }

    /// Anything other than `standard` is treated as `highspec`
    pub fn from_name(name: &str) -> Self {
        if name == "standard" {
            LoadBalancerPlan::Standard
        } else {
            LoadBalancerPlan::HighSpec
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthCheckProtocol {
    #[default]
    Http,
    Https,
    Tcp,
    Ping,
}

impl HealthCheckProtocol {
    pub const NAMES: [&'static str; 4] = ["http", "https", "tcp", "ping"];

    pub fn as_str(&self) -> &'static str {
        match self {
            HealthCheckProtocol::Http => "http",
            HealthCheckProtocol::Https => "https",
            HealthCheckProtocol::Tcp => "tcp",
            HealthCheckProtocol::Ping => "ping",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "http" => Some(HealthCheckProtocol::Http),
            "https" => Some(HealthCheckProtocol::Https),
            "tcp" => Some(HealthCheckProtocol::Tcp),
            "ping" => Some(HealthCheckProtocol::Ping),
            _ => None,
        }
    }

    /// Path and response code only apply to HTTP(S) checks
    pub fn uses_http(&self) -> bool {
        matches!(self, HealthCheckProtocol::Http | HealthCheckProtocol::Https)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheck {
    #[serde(rename = "Protocol")]
    pub protocol: HealthCheckProtocol,

    /// Empty for non-HTTP protocols
    #[serde(rename = "Path", default)]
    pub path: String,

    /// Zero for non-HTTP protocols
    #[serde(rename = "Status", default)]
    pub response_code: u16,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadBalancerServer {
    #[serde(rename = "IPAddress")]
    pub ip_address: String,

    #[serde(rename = "Port")]
    pub port: u16,

    #[serde(rename = "Enabled")]
    pub enabled: bool,

    #[serde(rename = "HealthCheck")]
    pub health_check: HealthCheck,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadBalancerVip {
    #[serde(rename = "VirtualIPAddress")]
    pub virtual_ip_address: String,

    #[serde(rename = "Port")]
    pub port: u16,

    #[serde(rename = "DelayLoop")]
    pub delay_loop: u32,

    #[serde(rename = "SorryServer", default)]
    pub sorry_server: String,

    #[serde(rename = "Description", default)]
    pub description: String,

    #[serde(rename = "Servers", default)]
    pub servers: Vec<LoadBalancerServer>,
}

/// Load balancer appliance
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadBalancer {
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

    #[serde(rename = "PlanID")]
    pub plan: LoadBalancerPlan,

    #[serde(rename = "SwitchID")]
    pub switch_id: String,

    #[serde(rename = "VRID")]
    pub vrid: i64,

    #[serde(rename = "IPAddresses")]
    pub ip_addresses: Vec<String>,

    #[serde(rename = "NetworkMaskLen")]
    pub network_mask_len: u8,

    #[serde(rename = "DefaultRoute", default)]
    pub default_route: String,

    #[serde(rename = "VirtualIPAddresses", default)]
    pub virtual_ip_addresses: Vec<LoadBalancerVip>,

    #[serde(rename = "Availability", default)]
    pub availability: Availability,

    /// Optimistic concurrency token for updates
    #[serde(rename = "SettingsHash", default)]
    pub settings_hash: String,
}

impl Searchable for LoadBalancer {
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
pub struct LoadBalancerCreateRequest {
    #[serde(rename = "SwitchID")]
    pub switch_id: String,

    #[serde(rename = "PlanID")]
    pub plan: LoadBalancerPlan,

    #[serde(rename = "VRID")]
    pub vrid: i64,

    #[serde(rename = "IPAddresses")]
    pub ip_addresses: Vec<String>,

    #[serde(rename = "NetworkMaskLen")]
    pub network_mask_len: u8,

    #[serde(rename = "DefaultRoute")]
    pub default_route: String,

    #[serde(rename = "Name")]
    pub name: String,

    #[serde(rename = "Description")]
    pub description: String,

    #[serde(rename = "Tags")]
    pub tags: Vec<String>,

    #[serde(rename = "IconID")]
    pub icon_id: String,

    #[serde(rename = "VirtualIPAddresses")]
    pub virtual_ip_addresses: Vec<LoadBalancerVip>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadBalancerUpdateRequest {
    #[serde(rename = "Name")]
    pub name: String,

    #[serde(rename = "Description")]
    pub description: String,

    #[serde(rename = "Tags")]
    pub tags: Vec<String>,

    #[serde(rename = "IconID")]
    pub icon_id: String,

    #[serde(rename = "VirtualIPAddresses")]
    pub virtual_ip_addresses: Vec<LoadBalancerVip>,

    #[serde(rename = "SettingsHash")]
    pub settings_hash: String,
}

#[async_trait]
pub trait LoadBalancerApi: Send + Sync {
    async fn find(&self, zone: &str, condition: &FindCondition) -> Result<Vec<LoadBalancer>>;

    async fn create(&self, zone: &str, request: LoadBalancerCreateRequest) -> Result<LoadBalancer>;

    async fn read(&self, zone: &str, id: &str) -> Result<LoadBalancer>;

    async fn update(
        &self,
        zone: &str,
        id: &str,
        request: LoadBalancerUpdateRequest,
    ) -> Result<LoadBalancer>;

    /// Push the stored settings to the running appliance
    async fn apply_config(&self, zone: &str, id: &str) -> Result<()>;

    async fn shutdown(&self, zone: &str, id: &str, force: bool) -> Result<()>;

    async fn delete(&self, zone: &str, id: &str) -> Result<()>;
}
