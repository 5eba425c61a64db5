//! `sakura_bridge` resource and data source

use crate::client::ApiClient;
use crate::common::{
    FilterBlock, filter_no_result, find_condition, schema_data_source_computed,
    schema_data_source_id, schema_data_source_name, schema_data_source_zone, schema_description,
    schema_filter, schema_id, schema_name, schema_timeouts, schema_zone,
};
use async_trait::async_trait;
use sakura_api::{Bridge, BridgeApi, BridgeCreateRequest, BridgeUpdateRequest};
use sakura_framework::{
    DataSourceHandler, Diagnostic, Observed, OpContext, ResourceHandler, ResourceModel, Schema,
    Timeouts, Value, observe,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeModel {
    pub id: Value<String>,
    pub name: Value<String>,
    pub description: Value<String>,
    pub zone: Value<String>,
    pub timeouts: Value<Timeouts>,
}

impl ResourceModel for BridgeModel {
    fn timeouts(&self) -> Option<&Timeouts> {
        self.timeouts.as_known()
    }
}

impl BridgeModel {
    fn expand_create(&self) -> BridgeCreateRequest {
        BridgeCreateRequest {
            name: self.name.value_or_default(),
            description: self.description.value_or_default(),
        }
    }

    fn expand_update(&self) -> BridgeUpdateRequest {
        BridgeUpdateRequest {
            name: self.name.value_or_default(),
            description: self.description.value_or_default(),
        }
    }

    fn flatten(&mut self, bridge: &Bridge, zone: &str) {
        self.id = Value::known(bridge.id.as_str());
        self.name = Value::known(bridge.name.as_str());
        self.description = Value::known(bridge.description.as_str());
        self.zone = Value::known(zone);
    }
}

/// Zoned layer-2 bridge between switches
pub struct BridgeResource {
    client: ApiClient,
}

impl BridgeResource {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    fn api(&self) -> &Arc<dyn BridgeApi> {
        &self.client.services().bridge
    }
}

#[async_trait]
impl ResourceHandler for BridgeResource {
    type Model = BridgeModel;

    fn type_suffix(&self) -> &'static str {
        "bridge"
    }

    fn schema(&self) -> Schema {
        Schema::new("Manages a Bridge.")
            .attribute("id", schema_id("Bridge"))
            .attribute("name", schema_name("Bridge"))
            .attribute("description", schema_description("Bridge"))
            .attribute("zone", schema_zone("Bridge"))
            .attribute("timeouts", schema_timeouts())
    }

    async fn create(
        &self,
        ctx: &mut OpContext,
        mut plan: BridgeModel,
    ) -> Result<BridgeModel, Diagnostic> {
        let zone = self.client.zone(&plan.zone)?;
        let bridge = ctx
            .call(self.api().create(&zone, plan.expand_create()))
            .await
            .map_err(|e| {
                Diagnostic::error("Create Error", format!("Could not create Bridge: {}", e))
            })?;
        plan.flatten(&bridge, &zone);
        Ok(plan)
    }

    async fn read(
        &self,
        ctx: &mut OpContext,
        mut state: BridgeModel,
    ) -> Result<Observed<BridgeModel>, Diagnostic> {
        let zone = self.client.zone(&state.zone)?;
        let id = state.id.value_or_default();
        let found = observe(ctx.call(self.api().read(&zone, &id)).await, || {
            format!("Bridge[{}]", id)
        })?;
        Ok(found.map(|bridge| {
            state.flatten(&bridge, &zone);
            state
        }))
    }

    async fn update(
        &self,
        ctx: &mut OpContext,
        mut plan: BridgeModel,
        _prior: BridgeModel,
    ) -> Result<Observed<BridgeModel>, Diagnostic> {
        let zone = self.client.zone(&plan.zone)?;
        let id = plan.id.value_or_default();
        let bridge = ctx
            .call(self.api().update(&zone, &id, plan.expand_update()))
            .await
            .map_err(|e| {
                Diagnostic::error("Update Error", format!("Could not update Bridge: {}", e))
            })?;
        plan.flatten(&bridge, &zone);
        Ok(Observed::Present(plan))
    }

    async fn delete(&self, ctx: &mut OpContext, state: BridgeModel) -> Result<(), Diagnostic> {
        let zone = self.client.zone(&state.zone)?;
        let id = state.id.value_or_default();
        let found = observe(ctx.call(self.api().read(&zone, &id)).await, || {
            format!("Bridge[{}]", id)
        })?;
        if found.is_gone() {
            return Ok(());
        }

        let api = self.api().clone();
        self.client
            .delete_while_referenced(ctx, || {
                let api = api.clone();
                let zone = zone.clone();
                let id = id.clone();
                async move { api.delete(&zone, &id).await }
            })
            .await
            .map_err(|e| {
                Diagnostic::error("Delete Error", format!("Could not delete Bridge[{}]: {}", id, e))
            })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeDataSourceModel {
    pub id: Value<String>,
    pub name: Value<String>,
    pub description: Value<String>,
    pub zone: Value<String>,
    pub filter: Value<FilterBlock>,
}

/// Looks up a bridge by filter; the first match wins
pub struct BridgeDataSource {
    client: ApiClient,
}

impl BridgeDataSource {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DataSourceHandler for BridgeDataSource {
    type Model = BridgeDataSourceModel;

    fn type_suffix(&self) -> &'static str {
        "bridge"
    }

    fn schema(&self) -> Schema {
        Schema::new("Get information about an existing Bridge.")
            .attribute("id", schema_data_source_id("Bridge"))
            .attribute("name", schema_data_source_name("Bridge"))
            .attribute(
                "description",
                schema_data_source_computed("The description of the Bridge.".into()),
            )
            .attribute("zone", schema_data_source_zone("Bridge"))
            .attribute("filter", schema_filter())
    }

    async fn read(
        &self,
        ctx: &mut OpContext,
        mut config: BridgeDataSourceModel,
    ) -> Result<BridgeDataSourceModel, Diagnostic> {
        let zone = self.client.zone(&config.zone)?;
        let condition = find_condition(&config.filter);
        let found = ctx
            .call(self.client.services().bridge.find(&zone, &condition))
            .await
            .map_err(|e| {
                Diagnostic::error(
                    "Read Error",
                    format!("could not find SakuraCloud Bridge: {}", e),
                )
            })?;
        let bridge = found.first().ok_or_else(filter_no_result)?;

        config.id = Value::known(bridge.id.as_str());
        config.name = Value::known(bridge.name.as_str());
        config.description = Value::known(bridge.description.as_str());
        config.zone = Value::known(zone);
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::test_client;
    use sakura_api::{ApiError, FakeCloud};
    use sakura_framework::{Deadline, Operation};

    fn ctx(op: Operation) -> OpContext {
        OpContext::new(op, Deadline::unbounded())
    }

    fn plan(name: &str, description: &str) -> BridgeModel {
        BridgeModel {
            id: Value::Unknown,
            name: Value::known(name),
            description: Value::known(description),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_flattens_remote_bridge() {
        let fake = FakeCloud::new();
        let resource = BridgeResource::new(test_client(&fake));
        let created = resource
            .create(&mut ctx(Operation::Create), plan("foo", "d"))
            .await
            .unwrap();

        assert_eq!(created.name, Value::known("foo"));
        assert_eq!(created.description, Value::known("d"));
        assert_eq!(created.zone, Value::known("is1b"));
        assert!(created.id.as_str().is_some_and(|id| !id.is_empty()));
    }

    #[tokio::test]
    async fn test_expand_then_flatten_keeps_configured_fields() {
        let fake = FakeCloud::new();
        let resource = BridgeResource::new(test_client(&fake));
        let planned = BridgeModel {
            zone: Value::known("tk1a"),
            ..plan("bridge", "between zones")
        };
        let created = resource
            .create(&mut ctx(Operation::Create), planned.clone())
            .await
            .unwrap();
        assert_eq!(created.name, planned.name);
        assert_eq!(created.description, planned.description);
        assert_eq!(created.zone, planned.zone);
    }

    #[tokio::test]
    async fn test_read_of_missing_bridge_is_gone() {
        let fake = FakeCloud::new();
        let resource = BridgeResource::new(test_client(&fake));
        let created = resource
            .create(&mut ctx(Operation::Create), plan("foo", "d"))
            .await
            .unwrap();
        assert!(fake.delete_out_of_band(created.id.as_str().unwrap()));

        let observed = resource.read(&mut ctx(Operation::Read), created).await.unwrap();
        assert!(observed.is_gone());
    }

    #[tokio::test]
    async fn test_create_error_is_reported() {
        let fake = FakeCloud::new();
        fake.fail_next("bridge.create", ApiError::QuotaExceeded("bridge".into()));
        let resource = BridgeResource::new(test_client(&fake));
        let diag = resource
            .create(&mut ctx(Operation::Create), plan("foo", "d"))
            .await
            .unwrap_err();
        assert_eq!(diag.summary, "Create Error");
        assert!(diag.detail.contains("Quota exceeded"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_waits_while_referenced() {
        let fake = FakeCloud::new();
        let resource = BridgeResource::new(test_client(&fake));
        let created = resource
            .create(&mut ctx(Operation::Create), plan("foo", "d"))
            .await
            .unwrap();
        fake.fail_next("bridge.delete", ApiError::Conflict("switch connected".into()));

        resource
            .delete(&mut ctx(Operation::Delete), created)
            .await
            .unwrap();
        assert_eq!(fake.call_count("bridge.delete"), 2);
    }

    #[tokio::test]
    async fn test_data_source_uses_first_match() {
        let fake = FakeCloud::new();
        let client = test_client(&fake);
        let resource = BridgeResource::new(client.clone());
        for name in ["web-a", "web-b", "db"] {
            resource
                .create(&mut ctx(Operation::Create), plan(name, "d"))
                .await
                .unwrap();
        }

        let data_source = BridgeDataSource::new(client);
        let config = BridgeDataSourceModel {
            filter: Value::Known(FilterBlock {
                names: Value::Known(vec!["web".into()]),
                ..Default::default()
            }),
            ..Default::default()
        };
        let found = data_source
            .read(&mut ctx(Operation::Read), config.clone())
            .await
            .unwrap();
        assert_eq!(found.name, Value::known("web-a"));

        let config = BridgeDataSourceModel {
            filter: Value::Known(FilterBlock {
                names: Value::Known(vec!["nothing".into()]),
                ..Default::default()
            }),
            ..config
        };
        let diag = data_source
            .read(&mut ctx(Operation::Read), config)
            .await
            .unwrap_err();
        assert_eq!(diag.summary, "Filter No Result");
    }
}
