//! `sakura_local_router` resource and data source
//!
//! A local router is created bare and then configured with a second call.
//! Once the first call succeeds the router exists, so a failing second
//! call leaves a partial state behind rather than an orphan.

use crate::client::ApiClient;
use crate::common::{
    FilterBlock, expand_tags, filter_no_result, find_condition, flatten_icon_id, flatten_tags,
    schema_data_source_computed, schema_data_source_id, schema_data_source_name,
    schema_data_source_tags, schema_description, schema_filter, schema_icon_id, schema_id,
    schema_name, schema_tags, schema_timeouts,
};
use async_trait::async_trait;
use sakura_api::{
    LocalRouter, LocalRouterApi, LocalRouterCreateRequest, LocalRouterInterface, LocalRouterPeer,
    LocalRouterSettings, LocalRouterStaticRoute, LocalRouterSwitch,
};
use sakura_framework::{
    Attribute, AttributeKind, DataSourceHandler, Diagnostic, IpVersion, Observed, OpContext,
    Operation, ResourceHandler, ResourceModel, Schema, Timeouts, Validator, Value, observe,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const DEFAULT_SWITCH_CATEGORY: &str = "cloud";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwitchModel {
    pub code: Value<String>,
    pub category: Value<String>,
    pub zone: Value<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkInterfaceModel {
    pub vip: Value<String>,
    pub ip_addresses: Value<Vec<String>>,
    pub netmask: Value<i64>,
    pub vrid: Value<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeerModel {
    pub peer_id: Value<String>,
    pub secret_key: Value<String>,
    pub enabled: Value<bool>,
    pub description: Value<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticRouteModel {
    pub prefix: Value<String>,
    pub next_hop: Value<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalRouterModel {
    pub id: Value<String>,
    pub name: Value<String>,
    pub description: Value<String>,
    pub tags: Value<Vec<String>>,
    pub icon_id: Value<String>,
    pub switch: Value<SwitchModel>,
    pub network_interface: Value<NetworkInterfaceModel>,
    pub peer: Value<Vec<PeerModel>>,
    pub static_route: Value<Vec<StaticRouteModel>>,
    pub secret_keys: Value<Vec<String>>,
    pub timeouts: Value<Timeouts>,
}

impl ResourceModel for LocalRouterModel {
    fn timeouts(&self) -> Option<&Timeouts> {
        self.timeouts.as_known()
    }
}

impl LocalRouterModel {
    fn expand_request(&self) -> LocalRouterCreateRequest {
        LocalRouterCreateRequest {
            name: self.name.value_or_default(),
            description: self.description.value_or_default(),
            tags: expand_tags(&self.tags),
            icon_id: self.icon_id.value_or_default(),
        }
    }

    fn expand_settings(&self) -> LocalRouterSettings {
        let switch = self.switch.as_known().map(|s| LocalRouterSwitch {
            code: s.code.value_or_default(),
            category: s
                .category
                .as_str()
                .unwrap_or(DEFAULT_SWITCH_CATEGORY)
                .to_string(),
            zone_id: s.zone.value_or_default(),
        });
        let interface = self
            .network_interface
            .as_known()
            .map(|nic| LocalRouterInterface {
                virtual_ip_address: nic.vip.value_or_default(),
                ip_addresses: nic.ip_addresses.value_or_default(),
                network_mask_len: u8::try_from(nic.netmask.value_or_default()).unwrap_or_default(),
                vrid: nic.vrid.value_or_default(),
            });
        let peers = self
            .peer
            .as_known()
            .into_iter()
            .flatten()
            .map(|p| LocalRouterPeer {
                id: p.peer_id.value_or_default(),
                secret_key: p.secret_key.value_or_default(),
                enabled: p.enabled.as_known().copied().unwrap_or(true),
                description: p.description.value_or_default(),
            })
            .collect();
        let static_routes = self
            .static_route
            .as_known()
            .into_iter()
            .flatten()
            .map(|r| LocalRouterStaticRoute {
                prefix: r.prefix.value_or_default(),
                next_hop: r.next_hop.value_or_default(),
            })
            .collect();

        LocalRouterSettings {
            switch,
            interface,
            peers,
            static_routes,
        }
    }

    fn flatten(&mut self, router: &LocalRouter) {
        self.id = Value::known(router.id.as_str());
        self.name = Value::known(router.name.as_str());
        self.description = Value::known(router.description.as_str());
        self.tags = flatten_tags(&router.tags);
        self.icon_id = flatten_icon_id(&router.icon_id);

        if let Some(switch) = &router.switch {
            self.switch = Value::Known(SwitchModel {
                code: Value::known(switch.code.as_str()),
                category: Value::known(switch.category.as_str()),
                zone: Value::known(switch.zone_id.as_str()),
            });
        }
        if let Some(nic) = &router.interface {
            self.network_interface = Value::Known(NetworkInterfaceModel {
                vip: Value::known(nic.virtual_ip_address.as_str()),
                ip_addresses: Value::Known(nic.ip_addresses.clone()),
                netmask: Value::Known(i64::from(nic.network_mask_len)),
                vrid: Value::Known(nic.vrid),
            });
        }
        // an empty remote list keeps whatever the configuration said
        if !router.peers.is_empty() {
            self.peer = Value::Known(
                router
                    .peers
                    .iter()
                    .map(|p| PeerModel {
                        peer_id: Value::known(p.id.as_str()),
                        secret_key: Value::known(p.secret_key.as_str()),
                        enabled: Value::Known(p.enabled),
                        description: Value::string_or_null(p.description.as_str()),
                    })
                    .collect(),
            );
        }
        if !router.static_routes.is_empty() {
            self.static_route = Value::Known(
                router
                    .static_routes
                    .iter()
                    .map(|r| StaticRouteModel {
                        prefix: Value::known(r.prefix.as_str()),
                        next_hop: Value::known(r.next_hop.as_str()),
                    })
                    .collect(),
            );
        }
        self.secret_keys = Value::Known(router.secret_keys.clone());
    }
}

fn schema_switch() -> Attribute {
    Attribute::object([
        (
            "code",
            Attribute::string()
                .required()
                .validator(Validator::SakuraId)
                .description("The resource ID of the Switch"),
        ),
        (
            "category",
            Attribute::string()
                .default_value(DEFAULT_SWITCH_CATEGORY)
                .description("The category name of connected services (e.g. `cloud`, `vps`)"),
        ),
        (
            "zone",
            Attribute::string()
                .required()
                .description("The name of the zone. Valid value is one of the following: [\"is1a\", \"is1b\", \"tk1a\", \"tk1b\", \"tk1v\"]"),
        ),
    ])
    .required()
    .description("The switch to connect")
}

fn schema_network_interface() -> Attribute {
    Attribute::object([
        (
            "vip",
            Attribute::string()
                .required()
                .validator(Validator::IpAddress(IpVersion::V4))
                .description("The virtual IP address"),
        ),
        (
            "ip_addresses",
            Attribute::list_of(AttributeKind::String)
                .required()
                .validator(Validator::SizeBetween(2, 2))
                .validator(Validator::IpAddress(IpVersion::V4))
                .description("The list of IP address assigned to the LocalRouter"),
        ),
        (
            "netmask",
            Attribute::int()
                .required()
                .validator(Validator::IntBetween(8, 29))
                .description("The bit length of the subnet assigned to the LocalRouter. This must be in the range [8-29]"),
        ),
        (
            "vrid",
            Attribute::int()
                .required()
                .description("The Virtual Router Identifier"),
        ),
    ])
    .required()
    .description("The network interface of the LocalRouter")
}

fn schema_peer() -> Attribute {
    Attribute::list_nested([
        (
            "peer_id",
            Attribute::string()
                .required()
                .validator(Validator::SakuraId)
                .description("The ID of the peer LocalRouter"),
        ),
        (
            "secret_key",
            Attribute::string()
                .required()
                .sensitive()
                .description("The secret key of the peer LocalRouter"),
        ),
        (
            "enabled",
            Attribute::bool()
                .default_value(true)
                .description("The flag to enable the LocalRouter"),
        ),
        (
            "description",
            Attribute::string()
                .optional()
                .description("The description of the LocalRouter"),
        ),
    ])
    .optional()
}

fn schema_static_route() -> Attribute {
    Attribute::list_nested([
        (
            "prefix",
            Attribute::string()
                .required()
                .validator(Validator::Cidr)
                .description("The CIDR block of destination"),
        ),
        (
            "next_hop",
            Attribute::string()
                .required()
                .validator(Validator::IpAddress(IpVersion::V4))
                .description("The IP address of the next hop"),
        ),
    ])
    .optional()
}

/// Same shape as the resource attribute, filled in by the lookup
fn read_only(attribute: Attribute) -> Attribute {
    Attribute {
        required: false,
        optional: false,
        computed: true,
        default: None,
        ..attribute
    }
}

pub struct LocalRouterResource {
    client: ApiClient,
}

impl LocalRouterResource {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    fn api(&self) -> &Arc<dyn LocalRouterApi> {
        &self.client.services().local_router
    }

    async fn read_back(
        &self,
        ctx: &OpContext,
        mut model: LocalRouterModel,
        id: &str,
    ) -> Result<Observed<LocalRouterModel>, Diagnostic> {
        let found = observe(ctx.call(self.api().read(id)).await, || {
            format!("LocalRouter[{}]", id)
        })?;
        Ok(found.map(|router| {
            model.flatten(&router);
            model
        }))
    }
}

#[async_trait]
impl ResourceHandler for LocalRouterResource {
    type Model = LocalRouterModel;

    fn type_suffix(&self) -> &'static str {
        "local_router"
    }

    fn schema(&self) -> Schema {
        Schema::new("Manages a Local Router.")
            .attribute("id", schema_id("LocalRouter"))
            .attribute("name", schema_name("LocalRouter"))
            .attribute("description", schema_description("LocalRouter"))
            .attribute("tags", schema_tags("LocalRouter"))
            .attribute("icon_id", schema_icon_id("LocalRouter"))
            .attribute("switch", schema_switch())
            .attribute("network_interface", schema_network_interface())
            .attribute("peer", schema_peer())
            .attribute("static_route", schema_static_route())
            .attribute(
                "secret_keys",
                Attribute::list_of(AttributeKind::String)
                    .computed()
                    .sensitive()
                    .description("A list of secret key used for peering from other LocalRouters"),
            )
            .attribute("timeouts", schema_timeouts())
    }

    fn lock_key(&self, op: Operation, model: &LocalRouterModel) -> Option<String> {
        match op {
            Operation::Update | Operation::Delete => model.id.as_known().cloned(),
            _ => None,
        }
    }

    async fn create(
        &self,
        ctx: &mut OpContext,
        mut plan: LocalRouterModel,
    ) -> Result<LocalRouterModel, Diagnostic> {
        let settings = plan.expand_settings();
        let router = ctx
            .call(self.api().create(plan.expand_request()))
            .await
            .map_err(|e| {
                Diagnostic::error(
                    "Create: API Error",
                    format!("failed to create LocalRouter: {}", e),
                )
            })?;

        let mut partial = plan.clone();
        partial.flatten(&router);
        ctx.keep_partial(&partial);

        let router = ctx
            .call(self.api().update_settings(&router.id, settings))
            .await
            .map_err(|e| {
                Diagnostic::error(
                    "Create: API Error",
                    format!("failed to configure LocalRouter[{}]: {}", router.id, e),
                )
            })?;
        plan.flatten(&router);
        Ok(plan)
    }

    async fn read(
        &self,
        ctx: &mut OpContext,
        state: LocalRouterModel,
    ) -> Result<Observed<LocalRouterModel>, Diagnostic> {
        let id = state.id.value_or_default();
        self.read_back(ctx, state, &id).await
    }

    async fn update(
        &self,
        ctx: &mut OpContext,
        plan: LocalRouterModel,
        _prior: LocalRouterModel,
    ) -> Result<Observed<LocalRouterModel>, Diagnostic> {
        let id = plan.id.value_or_default();
        let failed = |e: sakura_api::ApiError| {
            Diagnostic::error(
                "Update: API Error",
                format!("failed to update LocalRouter[{}]: {}", id, e),
            )
        };
        ctx.call(self.api().update(&id, plan.expand_request()))
            .await
            .map_err(failed)?;
        ctx.call(self.api().update_settings(&id, plan.expand_settings()))
            .await
            .map_err(failed)?;
        self.read_back(ctx, plan, &id).await
    }

    async fn delete(&self, ctx: &mut OpContext, state: LocalRouterModel) -> Result<(), Diagnostic> {
        let id = state.id.value_or_default();
        let found = observe(ctx.call(self.api().read(&id)).await, || {
            format!("LocalRouter[{}]", id)
        })?;
        if found.is_gone() {
            return Ok(());
        }
        ctx.call(self.api().delete(&id)).await.map_err(|e| {
            Diagnostic::error(
                "Delete: API Error",
                format!("failed to delete LocalRouter[{}]: {}", id, e),
            )
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalRouterDataSourceModel {
    pub id: Value<String>,
    pub name: Value<String>,
    pub description: Value<String>,
    pub tags: Value<Vec<String>>,
    pub icon_id: Value<String>,
    pub switch: Value<SwitchModel>,
    pub network_interface: Value<NetworkInterfaceModel>,
    pub peer: Value<Vec<PeerModel>>,
    pub static_route: Value<Vec<StaticRouteModel>>,
    pub secret_keys: Value<Vec<String>>,
    pub filter: Value<FilterBlock>,
}

pub struct LocalRouterDataSource {
    client: ApiClient,
}

impl LocalRouterDataSource {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DataSourceHandler for LocalRouterDataSource {
    type Model = LocalRouterDataSourceModel;

    fn type_suffix(&self) -> &'static str {
        "local_router"
    }

    fn schema(&self) -> Schema {
        Schema::new("Get information about an existing Local Router.")
            .attribute("id", schema_data_source_id("LocalRouter"))
            .attribute("name", schema_data_source_name("LocalRouter"))
            .attribute(
                "description",
                schema_data_source_computed("The description of the LocalRouter.".into()),
            )
            .attribute("tags", schema_data_source_tags("LocalRouter"))
            .attribute(
                "icon_id",
                schema_data_source_computed("The icon id attached to the LocalRouter".into()),
            )
            .attribute("switch", read_only(schema_switch()))
            .attribute("network_interface", read_only(schema_network_interface()))
            .attribute("peer", read_only(schema_peer()))
            .attribute("static_route", read_only(schema_static_route()))
            .attribute(
                "secret_keys",
                Attribute::list_of(AttributeKind::String)
                    .computed()
                    .sensitive()
                    .description("A list of secret key used for peering from other LocalRouters"),
            )
            .attribute("filter", schema_filter())
    }

    async fn read(
        &self,
        ctx: &mut OpContext,
        config: LocalRouterDataSourceModel,
    ) -> Result<LocalRouterDataSourceModel, Diagnostic> {
        let condition = find_condition(&config.filter);
        let found = ctx
            .call(self.client.services().local_router.find(&condition))
            .await
            .map_err(|e| {
                Diagnostic::error(
                    "Read Error",
                    format!("could not find SakuraCloud LocalRouter resource: {}", e),
                )
            })?;
        let router = found.first().ok_or_else(filter_no_result)?;

        let mut model = LocalRouterModel::default();
        model.flatten(router);
        Ok(LocalRouterDataSourceModel {
            id: model.id,
            name: model.name,
            description: model.description,
            tags: model.tags,
            icon_id: model.icon_id,
            switch: model.switch,
            network_interface: model.network_interface,
            peer: model.peer,
            static_route: model.static_route,
            secret_keys: model.secret_keys,
            filter: config.filter,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::test_client;
    use sakura_api::{ApiError, FakeCloud};
    use sakura_framework::Deadline;
    use serde_json::json;

    fn ctx(op: Operation) -> OpContext {
        OpContext::new(op, Deadline::unbounded())
    }

    fn plan() -> LocalRouterModel {
        LocalRouterModel {
            id: Value::Unknown,
            name: Value::known("lr"),
            switch: Value::Known(SwitchModel {
                code: Value::known("113000000099"),
                category: Value::Null,
                zone: Value::known("is1a"),
            }),
            network_interface: Value::Known(NetworkInterfaceModel {
                vip: Value::known("192.168.11.1"),
                ip_addresses: Value::Known(vec!["192.168.11.11".into(), "192.168.11.12".into()]),
                netmask: Value::Known(24),
                vrid: Value::Known(101),
            }),
            static_route: Value::Known(vec![StaticRouteModel {
                prefix: Value::known("10.0.0.0/24"),
                next_hop: Value::known("192.168.11.2"),
            }]),
            secret_keys: Value::Unknown,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_configures_router() {
        let fake = FakeCloud::new();
        let resource = LocalRouterResource::new(test_client(&fake));
        let created = resource.create(&mut ctx(Operation::Create), plan()).await.unwrap();

        let id = created.id.as_str().unwrap();
        let remote = fake.local_router(id).unwrap();
        assert_eq!(remote.switch.unwrap().category, "cloud");
        assert_eq!(remote.interface.unwrap().network_mask_len, 24);
        assert_eq!(created.secret_keys, Value::Known(vec![format!("secret-{}", id)]));
        assert_eq!(created.peer, Value::Null);
        assert_eq!(created.icon_id, Value::Null);
    }

    #[tokio::test]
    async fn test_failed_settings_leave_router_behind() {
        let fake = FakeCloud::new();
        fake.fail_next(
            "local_router.update_settings",
            ApiError::InvalidRequest("vrid in use".into()),
        );
        let resource = LocalRouterResource::new(test_client(&fake));
        let diag = resource
            .create(&mut ctx(Operation::Create), plan())
            .await
            .unwrap_err();
        assert_eq!(diag.summary, "Create: API Error");
        assert!(diag.detail.contains("failed to configure LocalRouter["));

        // no rollback: the bare router still exists
        assert_eq!(fake.call_count("local_router.delete"), 0);
        assert!(fake.local_router("113000000001").is_some());
    }

    #[tokio::test]
    async fn test_update_applies_peers() {
        let fake = FakeCloud::new();
        let resource = LocalRouterResource::new(test_client(&fake));
        let created = resource.create(&mut ctx(Operation::Create), plan()).await.unwrap();

        let planned = LocalRouterModel {
            peer: Value::Known(vec![PeerModel {
                peer_id: Value::known("113000000050"),
                secret_key: Value::known("s3cret"),
                enabled: Value::Known(false),
                description: Value::Null,
            }]),
            ..created.clone()
        };
        let updated = resource
            .update(&mut ctx(Operation::Update), planned, created)
            .await
            .unwrap()
            .present()
            .unwrap();
        let peers = updated.peer.as_known().unwrap();
        assert_eq!(peers.len(), 1);
        assert_eq!(peers[0].enabled, Value::Known(false));
        assert_eq!(peers[0].description, Value::Null);
    }

    #[test]
    fn test_lock_key_follows_own_id() {
        let resource = LocalRouterResource::new(test_client(&FakeCloud::new()));
        let state = LocalRouterModel {
            id: Value::known("113000000001"),
            ..plan()
        };
        assert_eq!(resource.lock_key(Operation::Create, &plan()), None);
        assert_eq!(
            resource.lock_key(Operation::Update, &state).as_deref(),
            Some("113000000001")
        );
        assert_eq!(
            resource.lock_key(Operation::Delete, &state).as_deref(),
            Some("113000000001")
        );
    }

    #[test]
    fn test_schema_rejects_bad_interface() {
        let resource = LocalRouterResource::new(test_client(&FakeCloud::new()));
        let diags = resource.schema().validate(&json!({
            "name": "lr",
            "switch": {"code": "113000000099", "zone": "is1a"},
            "network_interface": {
                "vip": "192.168.11.1",
                "ip_addresses": ["192.168.11.11"],
                "netmask": 30,
                "vrid": 1
            }
        }));
        let attributes: Vec<_> = diags
            .errors()
            .filter_map(|d| d.attribute.clone())
            .collect();
        assert!(attributes.contains(&"network_interface.ip_addresses".to_string()));
        assert!(attributes.contains(&"network_interface.netmask".to_string()));
    }

    #[tokio::test]
    async fn test_data_source_flattens_settings() {
        let fake = FakeCloud::new();
        let client = test_client(&fake);
        LocalRouterResource::new(client.clone())
            .create(&mut ctx(Operation::Create), plan())
            .await
            .unwrap();

        let found = LocalRouterDataSource::new(client)
            .read(&mut ctx(Operation::Read), LocalRouterDataSourceModel::default())
            .await
            .unwrap();
        assert_eq!(found.name, Value::known("lr"));
        let routes = found.static_route.as_known().unwrap();
        assert_eq!(routes[0].next_hop, Value::known("192.168.11.2"));
    }
}
