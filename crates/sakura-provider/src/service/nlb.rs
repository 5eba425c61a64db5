//! `sakura_nlb` resource
//!
//! Layer 4 load balancer appliance. Every settings change is stored first and
//! then pushed to the running appliance with `apply_config`.

use crate::client::ApiClient;
use crate::common::{
    expand_tags, flatten_icon_id, flatten_tags, schema_description, schema_icon_id, schema_id,
    schema_name, schema_tags, schema_timeouts, schema_zone,
};
use async_trait::async_trait;
use sakura_api::{
    HealthCheck, HealthCheckProtocol, LoadBalancer, LoadBalancerApi, LoadBalancerCreateRequest,
    LoadBalancerPlan, LoadBalancerServer, LoadBalancerUpdateRequest, LoadBalancerVip,
};
use sakura_framework::{
    Attribute, AttributeKind, Diagnostic, IpVersion, Observed, OpContext, Operation,
    ResourceHandler, ResourceModel, Schema, TIMEOUT_5MIN, TIMEOUT_20MIN, Timeouts, Validator,
    Value, observe,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_DELAY_LOOP: i64 = 10;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NlbInterfaceModel {
    pub vswitch_id: Value<String>,
    pub vrid: Value<i64>,
    pub ip_addresses: Value<Vec<String>>,
    pub netmask: Value<i64>,
    pub gateway: Value<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NlbServerModel {
    pub ip_address: Value<String>,
    pub protocol: Value<String>,
    pub path: Value<String>,
    pub status: Value<i64>,
    pub enabled: Value<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NlbVipModel {
    pub vip: Value<String>,
    pub port: Value<i64>,
    pub delay_loop: Value<i64>,
    pub sorry_server: Value<String>,
    pub description: Value<String>,
    pub server: Value<Vec<NlbServerModel>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NlbModel {
    pub id: Value<String>,
    pub name: Value<String>,
    pub description: Value<String>,
    pub tags: Value<Vec<String>>,
    pub icon_id: Value<String>,
    pub zone: Value<String>,
    pub plan: Value<String>,
    pub network_interface: Value<NlbInterfaceModel>,
    pub vip: Value<Vec<NlbVipModel>>,
    pub timeouts: Value<Timeouts>,
}

impl ResourceModel for NlbModel {
    fn timeouts(&self) -> Option<&Timeouts> {
        self.timeouts.as_known()
    }
}

impl NlbVipModel {
    fn expand(&self) -> LoadBalancerVip {
        let port = u16::try_from(self.port.value_or_default()).unwrap_or_default();
        let servers = self
            .server
            .as_known()
            .into_iter()
            .flatten()
            .map(|s| {
                let protocol = s
                    .protocol
                    .as_str()
                    .and_then(HealthCheckProtocol::parse)
                    .unwrap_or_default();
                LoadBalancerServer {
                    ip_address: s.ip_address.value_or_default(),
                    port,
                    enabled: s.enabled.as_known().copied().unwrap_or(true),
                    health_check: HealthCheck {
                        protocol,
                        path: s.path.value_or_default(),
                        response_code: u16::try_from(s.status.value_or_default())
                            .unwrap_or_default(),
                    },
                }
            })
            .collect();
        LoadBalancerVip {
            virtual_ip_address: self.vip.value_or_default(),
            port,
            delay_loop: u32::try_from(
                self.delay_loop
                    .as_known()
                    .copied()
                    .unwrap_or(DEFAULT_DELAY_LOOP),
            )
            .unwrap_or_default(),
            sorry_server: self.sorry_server.value_or_default(),
            description: self.description.value_or_default(),
            servers,
        }
    }

    fn flatten(vip: &LoadBalancerVip) -> Self {
        let servers = vip
            .servers
            .iter()
            .map(|s| NlbServerModel {
                ip_address: Value::known(s.ip_address.as_str()),
                protocol: Value::known(s.health_check.protocol.as_str()),
                path: Value::string_or_null(s.health_check.path.as_str()),
                status: Value::non_zero(i64::from(s.health_check.response_code)),
                enabled: Value::Known(s.enabled),
            })
            .collect();
        Self {
            vip: Value::known(vip.virtual_ip_address.as_str()),
            port: Value::Known(i64::from(vip.port)),
            delay_loop: Value::Known(i64::from(vip.delay_loop)),
            sorry_server: Value::string_or_null(vip.sorry_server.as_str()),
            description: Value::string_or_null(vip.description.as_str()),
            server: Value::Known(servers),
        }
    }
}

impl NlbModel {
    fn expand_vips(&self) -> Vec<LoadBalancerVip> {
        self.vip
            .as_known()
            .into_iter()
            .flatten()
            .map(NlbVipModel::expand)
            .collect()
    }

    fn expand_create(&self) -> LoadBalancerCreateRequest {
        let nic = self.network_interface.value_or_default();
        LoadBalancerCreateRequest {
            switch_id: nic.vswitch_id.value_or_default(),
            plan: LoadBalancerPlan::from_name(self.plan.as_str().unwrap_or("standard")),
            vrid: nic.vrid.value_or_default(),
            ip_addresses: nic.ip_addresses.value_or_default(),
            network_mask_len: u8::try_from(nic.netmask.value_or_default()).unwrap_or_default(),
            default_route: nic.gateway.value_or_default(),
            name: self.name.value_or_default(),
            description: self.description.value_or_default(),
            tags: expand_tags(&self.tags),
            icon_id: self.icon_id.value_or_default(),
            virtual_ip_addresses: self.expand_vips(),
        }
    }

    fn expand_update(&self, settings_hash: &str) -> LoadBalancerUpdateRequest {
        LoadBalancerUpdateRequest {
            name: self.name.value_or_default(),
            description: self.description.value_or_default(),
            tags: expand_tags(&self.tags),
            icon_id: self.icon_id.value_or_default(),
            virtual_ip_addresses: self.expand_vips(),
            settings_hash: settings_hash.to_string(),
        }
    }

    fn flatten(&mut self, lb: &LoadBalancer, zone: &str) {
        self.id = Value::known(lb.id.as_str());
        self.name = Value::known(lb.name.as_str());
        self.description = Value::known(lb.description.as_str());
        self.tags = flatten_tags(&lb.tags);
        self.icon_id = flatten_icon_id(&lb.icon_id);
        self.zone = Value::known(zone);
        self.plan = Value::known(lb.plan.name());
        self.network_interface = Value::Known(NlbInterfaceModel {
            vswitch_id: Value::known(lb.switch_id.as_str()),
            vrid: Value::Known(lb.vrid),
            ip_addresses: Value::Known(lb.ip_addresses.clone()),
            netmask: Value::Known(i64::from(lb.network_mask_len)),
            gateway: Value::string_or_null(lb.default_route.as_str()),
        });
        self.vip = Value::Known(
            lb.virtual_ip_addresses
                .iter()
                .map(NlbVipModel::flatten)
                .collect(),
        );
    }
}

fn failed_state(id: &str) -> String {
    format!("got unexpected state: NLB[{}].Availability is failed", id)
}

fn schema_network_interface() -> Attribute {
    Attribute::object([
        (
            "vswitch_id",
            Attribute::string()
                .required()
                .requires_replace()
                .validator(Validator::SakuraId)
                .description("The id of the switch to which the NLB connects"),
        ),
        (
            "vrid",
            Attribute::int()
                .required()
                .requires_replace()
                .description("The Virtual Router Identifier"),
        ),
        (
            "ip_addresses",
            Attribute::list_of(AttributeKind::String)
                .required()
                .requires_replace()
                .validator(Validator::SizeBetween(1, 2))
                .validator(Validator::IpAddress(IpVersion::V4))
                .description("A list of IP address to assign to the NLB"),
        ),
        (
            "netmask",
            Attribute::int()
                .required()
                .requires_replace()
                .validator(Validator::IntBetween(8, 29))
                .description("The bit length of the subnet assigned to the NLB. This must be in the range [8-29]"),
        ),
        (
            "gateway",
            Attribute::string()
                .optional()
                .requires_replace()
                .validator(Validator::IpAddress(IpVersion::V4))
                .description("The IP address of the gateway used by NLB"),
        ),
    ])
    .required()
    .requires_replace()
    .description("The network interface of the NLB")
}

fn schema_vip() -> Attribute {
    let server = Attribute::list_nested([
        (
            "ip_address",
            Attribute::string()
                .required()
                .validator(Validator::IpAddress(IpVersion::V4))
                .description("The IP address of the destination server"),
        ),
        (
            "protocol",
            Attribute::string()
                .required()
                .validator(Validator::one_of(HealthCheckProtocol::NAMES))
                .description(format!(
                    "The protocol used for health checks. This must be one of [{}]",
                    HealthCheckProtocol::NAMES.join("/")
                )),
        ),
        (
            "path",
            Attribute::string()
                .optional()
                .description("The path used when checking by HTTP/HTTPS"),
        ),
        (
            "status",
            Attribute::int()
                .optional()
                .description("The response code to expect when checking by HTTP/HTTPS"),
        ),
        (
            "enabled",
            Attribute::bool()
                .default_value(true)
                .description("The flag to enable as destination of load balancing"),
        ),
    ])
    .optional()
    .validator(Validator::SizeBetween(0, 40))
    .description("One or more `server` blocks");

    Attribute::list_nested([
        (
            "vip",
            Attribute::string()
                .required()
                .validator(Validator::IpAddress(IpVersion::V4))
                .description("The virtual IP address"),
        ),
        (
            "port",
            Attribute::int()
                .required()
                .validator(Validator::IntBetween(1, 65535))
                .description("The target port number for load-balancing"),
        ),
        (
            "delay_loop",
            Attribute::int()
                .default_value(DEFAULT_DELAY_LOOP)
                .validator(Validator::IntBetween(10, 2147483647))
                .description("The interval in seconds between checks. This must be in the range [10-2147483647]"),
        ),
        (
            "sorry_server",
            Attribute::string()
                .optional()
                .validator(Validator::IpAddress(IpVersion::V4))
                .description("The IP address of the SorryServer. This will be used when all servers under this VIP are down"),
        ),
        ("description", schema_description("VIP")),
        ("server", server),
    ])
    .optional()
    .validator(Validator::SizeBetween(0, 20))
    .description("One or more `vip` blocks")
}

/// Network load balancer
pub struct NlbResource {
    client: ApiClient,
}

impl NlbResource {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    fn api(&self) -> &Arc<dyn LoadBalancerApi> {
        &self.client.services().load_balancer
    }

    async fn read_remote(
        &self,
        ctx: &OpContext,
        zone: &str,
        id: &str,
    ) -> Result<Observed<LoadBalancer>, Diagnostic> {
        observe(ctx.call(self.api().read(zone, id)).await, || {
            format!("NLB[{}]", id)
        })
    }
}

#[async_trait]
impl ResourceHandler for NlbResource {
    type Model = NlbModel;

    fn type_suffix(&self) -> &'static str {
        "nlb"
    }

    fn schema(&self) -> Schema {
        Schema::new("Manages a NLB (Network Load Balancer).")
            .attribute("id", schema_id("NLB"))
            .attribute("name", schema_name("NLB"))
            .attribute("description", schema_description("NLB"))
            .attribute("tags", schema_tags("NLB"))
            .attribute("icon_id", schema_icon_id("NLB"))
            .attribute("zone", schema_zone("NLB"))
            .attribute(
                "plan",
                Attribute::string()
                    .default_value("standard")
                    .requires_replace()
                    .validator(Validator::one_of(LoadBalancerPlan::NAMES))
                    .description(format!(
                        "The plan name of the NLB. This must be one of [{}]",
                        LoadBalancerPlan::NAMES.join("/")
                    )),
            )
            .attribute("network_interface", schema_network_interface())
            .attribute("vip", schema_vip())
            .attribute("timeouts", schema_timeouts())
    }

    fn default_timeout(&self, op: Operation) -> Option<Duration> {
        match op {
            Operation::Create | Operation::Update => Some(TIMEOUT_20MIN),
            Operation::Delete => Some(TIMEOUT_5MIN),
            Operation::Read | Operation::Import => None,
        }
    }

    fn lock_key(&self, op: Operation, model: &NlbModel) -> Option<String> {
        match op {
            Operation::Update | Operation::Delete => model.id.as_known().cloned(),
            _ => None,
        }
    }

    async fn create(
        &self,
        ctx: &mut OpContext,
        mut plan: NlbModel,
    ) -> Result<NlbModel, Diagnostic> {
        let zone = self.client.zone(&plan.zone)?;
        let lb = ctx
            .call(self.api().create(&zone, plan.expand_create()))
            .await
            .map_err(|e| {
                Diagnostic::error("Create: API Error", format!("failed to create NLB: {}", e))
            })?;

        let mut partial = plan.clone();
        partial.flatten(&lb, &zone);
        ctx.keep_partial(&partial);

        ctx.call(self.api().apply_config(&zone, &lb.id))
            .await
            .map_err(|e| {
                Diagnostic::error(
                    "Create: API Error",
                    format!("failed to apply configuration to NLB[{}]: {}", lb.id, e),
                )
            })?;

        let lb = match self.read_remote(ctx, &zone, &lb.id).await? {
            Observed::Present(lb) => lb,
            Observed::Gone => {
                return Err(Diagnostic::error(
                    "Create: API Error",
                    format!("NLB[{}] disappeared right after creation", lb.id),
                ));
            }
        };
        if lb.availability.is_failed() {
            return Err(Diagnostic::error("Create: State Error", failed_state(&lb.id)));
        }
        plan.flatten(&lb, &zone);
        Ok(plan)
    }

    async fn read(
        &self,
        ctx: &mut OpContext,
        mut state: NlbModel,
    ) -> Result<Observed<NlbModel>, Diagnostic> {
        let zone = self.client.zone(&state.zone)?;
        let id = state.id.value_or_default();
        let Observed::Present(lb) = self.read_remote(ctx, &zone, &id).await? else {
            return Ok(Observed::Gone);
        };
        if lb.availability.is_failed() {
            return Err(Diagnostic::error("State Error", failed_state(&id)));
        }
        state.flatten(&lb, &zone);
        Ok(Observed::Present(state))
    }

    async fn update(
        &self,
        ctx: &mut OpContext,
        mut plan: NlbModel,
        _prior: NlbModel,
    ) -> Result<Observed<NlbModel>, Diagnostic> {
        let zone = self.client.zone(&plan.zone)?;
        let id = plan.id.value_or_default();
        let Observed::Present(current) = self.read_remote(ctx, &zone, &id).await? else {
            return Ok(Observed::Gone);
        };

        let failed = |e: sakura_api::ApiError| {
            Diagnostic::error(
                "Update: API Error",
                format!("failed to configure NLB[{}]: {}", id, e),
            )
        };
        ctx.call(self.api().update(&zone, &id, plan.expand_update(&current.settings_hash)))
            .await
            .map_err(failed)?;
        ctx.call(self.api().apply_config(&zone, &id))
            .await
            .map_err(failed)?;

        let Observed::Present(lb) = self.read_remote(ctx, &zone, &id).await? else {
            return Ok(Observed::Gone);
        };
        plan.flatten(&lb, &zone);
        Ok(Observed::Present(plan))
    }

    async fn delete(&self, ctx: &mut OpContext, state: NlbModel) -> Result<(), Diagnostic> {
        let zone = self.client.zone(&state.zone)?;
        let id = state.id.value_or_default();
        if self.read_remote(ctx, &zone, &id).await?.is_gone() {
            return Ok(());
        }

        let failed = |e: sakura_api::ApiError| {
            Diagnostic::error(
                "Delete: API Error",
                format!("failed to delete NLB[{}]: {}", id, e),
            )
        };
        ctx.call(self.api().shutdown(&zone, &id, true))
            .await
            .map_err(failed)?;
        ctx.call(self.api().delete(&zone, &id)).await.map_err(failed)
    }
}
