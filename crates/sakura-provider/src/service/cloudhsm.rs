//! `sakura_cloudhsm` resource and data source
//!
//! CloudHSM lives in its own API and only a couple of zones offer it. The
//! API has no server-side search, so lookups by name list every HSM in the
//! zone and filter exactly.

use crate::client::ApiClient;
use crate::common::{
    expand_tags, flatten_tags, flatten_time, schema_data_source_computed, schema_data_source_tags,
    schema_description, schema_id, schema_name, schema_tags, schema_timeouts,
};
use async_trait::async_trait;
use sakura_api::{CLOUDHSM_DEFAULT_ZONE, CLOUDHSM_ZONES, CloudHsm, CloudHsmApi, CloudHsmParams};
use sakura_framework::{
    Attribute, DataSourceHandler, Diagnostic, FilterError, IpVersion, Observed, OpContext,
    Operation, ResourceHandler, ResourceModel, Schema, TIMEOUT_5MIN, Timeouts, Validator, Value,
    filter_by_name, observe,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// The single HSM named `name`
///
/// Zero matches and more than one match are both errors.
pub fn filter_cloud_hsm_by_name<'a>(
    items: &'a [CloudHsm],
    name: &str,
) -> Result<&'a CloudHsm, FilterError> {
    filter_by_name(items, name, "CloudHSM")
}

/// Zone to run a CloudHSM call in
///
/// A configured zone is used as is. Otherwise the provider default is used
/// when it offers CloudHSM, and `is1b` with a warning when it does not.
pub(crate) fn hsm_zone(client: &ApiClient, ctx: &mut OpContext, zone: &Value<String>) -> String {
    if let Some(zone) = zone.as_known() {
        return zone.clone();
    }
    let default = client.default_zone();
    if CLOUDHSM_ZONES.contains(&default) {
        return default.to_string();
    }
    ctx.warn(
        "Zone Validation Warning",
        format!(
            "Default zone is not valid with CloudHSM. Use {} instead: {}",
            CLOUDHSM_DEFAULT_ZONE, default
        ),
    );
    CLOUDHSM_DEFAULT_ZONE.to_string()
}

pub(crate) fn schema_hsm_zone(name: &str) -> Attribute {
    Attribute::string()
        .optional()
        .computed()
        .requires_replace()
        .validator(Validator::one_of(CLOUDHSM_ZONES))
        .description(format!(
            "The name of zone that the {} will be created. This must be one of [{}]",
            name,
            CLOUDHSM_ZONES.join("/")
        ))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HsmLocalRouterModel {
    pub id: Value<String>,
    pub secret_key: Value<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudHsmModel {
    pub id: Value<String>,
    pub name: Value<String>,
    pub description: Value<String>,
    pub tags: Value<Vec<String>>,
    pub zone: Value<String>,
    pub ipv4_network_address: Value<String>,
    pub ipv4_netmask: Value<i64>,
    pub ipv4_address: Value<String>,
    pub local_router: Value<HsmLocalRouterModel>,
    pub availability: Value<String>,
    pub created_at: Value<String>,
    pub modified_at: Value<String>,
    pub timeouts: Value<Timeouts>,
}

impl ResourceModel for CloudHsmModel {
    fn timeouts(&self) -> Option<&Timeouts> {
        self.timeouts.as_known()
    }
}

impl CloudHsmModel {
    fn expand(&self) -> CloudHsmParams {
        CloudHsmParams {
            name: self.name.value_or_default(),
            description: self.description.as_known().cloned(),
            tags: expand_tags(&self.tags),
            ipv4_network_address: self.ipv4_network_address.value_or_default(),
            ipv4_prefix_length: u8::try_from(self.ipv4_netmask.value_or_default())
                .unwrap_or_default(),
        }
    }

    fn flatten(&mut self, hsm: &CloudHsm, zone: &str) {
        self.id = Value::known(hsm.id.as_str());
        self.name = Value::known(hsm.name.as_str());
        self.description = Value::known(hsm.description.as_str());
        self.tags = flatten_tags(&hsm.tags);
        self.zone = Value::known(zone);
        self.ipv4_network_address = Value::known(hsm.ipv4_network_address.as_str());
        self.ipv4_netmask = Value::Known(i64::from(hsm.ipv4_prefix_length));
        self.ipv4_address = Value::known(hsm.ipv4_address.as_str());
        self.local_router = match &hsm.local_router {
            Some(router) => Value::Known(HsmLocalRouterModel {
                id: Value::known(router.resource_id.as_str()),
                secret_key: Value::known(router.secret_key.as_str()),
            }),
            None => Value::Null,
        };
        self.availability = Value::known(hsm.availability.as_str());
        self.created_at = flatten_time(&hsm.created_at);
        self.modified_at = flatten_time(&hsm.modified_at);
    }
}

fn schema_local_router() -> Attribute {
    Attribute::object([
        (
            "id",
            Attribute::string()
                .computed()
                .description("The ID of the Local Router connected to the CloudHSM"),
        ),
        (
            "secret_key",
            Attribute::string()
                .computed()
                .sensitive()
                .description("The secret key of the Local Router connected to the CloudHSM"),
        ),
    ])
    .computed()
    .description("The Local Router the CloudHSM is reachable through")
}

pub struct CloudHsmResource {
    client: ApiClient,
}

impl CloudHsmResource {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    fn api(&self) -> &Arc<dyn CloudHsmApi> {
        &self.client.services().cloudhsm
    }
}

#[async_trait]
impl ResourceHandler for CloudHsmResource {
    type Model = CloudHsmModel;

    fn type_suffix(&self) -> &'static str {
        "cloudhsm"
    }

    fn schema(&self) -> Schema {
        Schema::new("Manages a CloudHSM.")
            .attribute("id", schema_id("CloudHSM"))
            .attribute("name", schema_name("CloudHSM"))
            .attribute("description", schema_description("CloudHSM"))
            .attribute("tags", schema_tags("CloudHSM"))
            .attribute("zone", schema_hsm_zone("CloudHSM"))
            .attribute(
                "ipv4_network_address",
                Attribute::string()
                    .required()
                    .requires_replace()
                    .validator(Validator::IpAddress(IpVersion::V4))
                    .description("The IPv4 network address of the CloudHSM"),
            )
            .attribute(
                "ipv4_netmask",
                Attribute::int()
                    .required()
                    .requires_replace()
                    .validator(Validator::IntBetween(8, 29))
                    .description("The IPv4 netmask of the CloudHSM"),
            )
            .attribute(
                "ipv4_address",
                Attribute::string()
                    .computed()
                    .description("The IPv4 address assigned to the CloudHSM"),
            )
            .attribute("local_router", schema_local_router())
            .attribute(
                "availability",
                Attribute::string()
                    .computed()
                    .description("The availability of the CloudHSM"),
            )
            .attribute(
                "created_at",
                Attribute::string()
                    .computed()
                    .description("The creation date of the CloudHSM"),
            )
            .attribute(
                "modified_at",
                Attribute::string()
                    .computed()
                    .description("The modification date of the CloudHSM"),
            )
            .attribute("timeouts", schema_timeouts())
    }

    fn default_timeout(&self, op: Operation) -> Option<Duration> {
        op.is_mutating().then_some(TIMEOUT_5MIN)
    }

    async fn create(
        &self,
        ctx: &mut OpContext,
        mut plan: CloudHsmModel,
    ) -> Result<CloudHsmModel, Diagnostic> {
        let zone = hsm_zone(&self.client, ctx, &plan.zone);
        let hsm = ctx
            .call(self.api().create(&zone, plan.expand()))
            .await
            .map_err(|e| {
                Diagnostic::error("Create: API Error", format!("failed to create CloudHSM: {}", e))
            })?;
        plan.flatten(&hsm, &zone);
        Ok(plan)
    }

    async fn read(
        &self,
        ctx: &mut OpContext,
        mut state: CloudHsmModel,
    ) -> Result<Observed<CloudHsmModel>, Diagnostic> {
        let zone = hsm_zone(&self.client, ctx, &state.zone);
        let id = state.id.value_or_default();
        let found = observe(ctx.call(self.api().read(&zone, &id)).await, || {
            format!("CloudHSM[{}]", id)
        })?;
        Ok(found.map(|hsm| {
            state.flatten(&hsm, &zone);
            state
        }))
    }

    async fn update(
        &self,
        ctx: &mut OpContext,
        mut plan: CloudHsmModel,
        _prior: CloudHsmModel,
    ) -> Result<Observed<CloudHsmModel>, Diagnostic> {
        let zone = hsm_zone(&self.client, ctx, &plan.zone);
        let id = plan.id.value_or_default();
        let hsm = ctx
            .call(self.api().update(&zone, &id, plan.expand()))
            .await
            .map_err(|e| {
                Diagnostic::error(
                    "Update: API Error",
                    format!("failed to update CloudHSM[{}]: {}", id, e),
                )
            })?;
        plan.flatten(&hsm, &zone);
        Ok(Observed::Present(plan))
    }

    async fn delete(&self, ctx: &mut OpContext, state: CloudHsmModel) -> Result<(), Diagnostic> {
        let zone = hsm_zone(&self.client, ctx, &state.zone);
        let id = state.id.value_or_default();
        let found = observe(ctx.call(self.api().read(&zone, &id)).await, || {
            format!("CloudHSM[{}]", id)
        })?;
        if found.is_gone() {
            return Ok(());
        }
        ctx.call(self.api().delete(&zone, &id)).await.map_err(|e| {
            Diagnostic::error(
                "Delete: API Error",
                format!("failed to delete CloudHSM[{}]: {}", id, e),
            )
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudHsmDataSourceModel {
    pub id: Value<String>,
    pub name: Value<String>,
    pub description: Value<String>,
    pub tags: Value<Vec<String>>,
    pub zone: Value<String>,
    pub ipv4_network_address: Value<String>,
    pub ipv4_netmask: Value<i64>,
    pub ipv4_address: Value<String>,
    pub local_router: Value<HsmLocalRouterModel>,
    pub availability: Value<String>,
    pub created_at: Value<String>,
    pub modified_at: Value<String>,
}

/// Looks up an HSM by ID or by exact name
pub struct CloudHsmDataSource {
    client: ApiClient,
}

impl CloudHsmDataSource {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DataSourceHandler for CloudHsmDataSource {
    type Model = CloudHsmDataSourceModel;

    fn type_suffix(&self) -> &'static str {
        "cloudhsm"
    }

    fn schema(&self) -> Schema {
        let computed = |text: &str| schema_data_source_computed(text.to_string());
        Schema::new("Get information about an existing CloudHSM.")
            .attribute(
                "id",
                Attribute::string()
                    .optional()
                    .computed()
                    .validator(Validator::SakuraId)
                    .description("The ID of the CloudHSM. Either `id` or `name` must be specified"),
            )
            .attribute(
                "name",
                Attribute::string()
                    .optional()
                    .computed()
                    .description("The name of the CloudHSM. Either `id` or `name` must be specified"),
            )
            .attribute("description", computed("The description of the CloudHSM"))
            .attribute("tags", schema_data_source_tags("CloudHSM"))
            .attribute("zone", schema_hsm_zone("CloudHSM"))
            .attribute("ipv4_network_address", computed("The IPv4 network address of the CloudHSM"))
            .attribute(
                "ipv4_netmask",
                Attribute::int()
                    .computed()
                    .description("The IPv4 netmask of the CloudHSM"),
            )
            .attribute("ipv4_address", computed("The IPv4 address assigned to the CloudHSM"))
            .attribute("local_router", schema_local_router())
            .attribute("availability", computed("The availability of the CloudHSM"))
            .attribute("created_at", computed("The creation date of the CloudHSM"))
            .attribute("modified_at", computed("The modification date of the CloudHSM"))
    }

    async fn read(
        &self,
        ctx: &mut OpContext,
        config: CloudHsmDataSourceModel,
    ) -> Result<CloudHsmDataSourceModel, Diagnostic> {
        let api = &self.client.services().cloudhsm;
        let zone = hsm_zone(&self.client, ctx, &config.zone);

        let hsm = if let Some(id) = config.id.as_str().filter(|id| !id.is_empty()) {
            ctx.call(api.read(&zone, id)).await.map_err(|e| {
                Diagnostic::error(
                    "Read: API Error",
                    format!("failed to read CloudHSM[{}]: {}", id, e),
                )
            })?
        } else if let Some(name) = config.name.as_str().filter(|name| !name.is_empty()) {
            let all = ctx.call(api.list(&zone)).await.map_err(|e| {
                Diagnostic::error(
                    "Read: API Error",
                    format!("failed to find CloudHSM resource: {}", e),
                )
            })?;
            filter_cloud_hsm_by_name(&all, name)
                .map_err(|e| {
                    Diagnostic::error(
                        "Read: Search Error",
                        format!("failed to filter CloudHSM resource by name: {}", e),
                    )
                })?
                .clone()
        } else {
            return Err(Diagnostic::error(
                "Read: Attribute Error",
                "either 'id' or 'name' must be specified.",
            ));
        };

        let mut model = CloudHsmModel::default();
        model.flatten(&hsm, &zone);
        Ok(CloudHsmDataSourceModel {
            id: model.id,
            name: model.name,
            description: model.description,
            tags: model.tags,
            zone: model.zone,
            ipv4_network_address: model.ipv4_network_address,
            ipv4_netmask: model.ipv4_netmask,
            ipv4_address: model.ipv4_address,
            local_router: model.local_router,
            availability: model.availability,
            created_at: model.created_at,
            modified_at: model.modified_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Services;
    use crate::config::Config;
    use crate::service::test_client;
    use chrono::Utc;
    use sakura_api::FakeCloud;
    use sakura_framework::Deadline;

    fn ctx(op: Operation) -> OpContext {
        OpContext::new(op, Deadline::unbounded())
    }

    fn hsm(id: &str, name: &str) -> CloudHsm {
        let now = Utc::now();
        CloudHsm {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            tags: vec![],
            ipv4_network_address: "192.168.0.0".into(),
            ipv4_prefix_length: 24,
            ipv4_address: "192.168.0.1".into(),
            local_router: None,
            availability: "available".into(),
            created_at: now,
            modified_at: now,
        }
    }

    fn plan(name: &str) -> CloudHsmModel {
        CloudHsmModel {
            id: Value::Unknown,
            name: Value::known(name),
            ipv4_network_address: Value::known("192.168.100.0"),
            ipv4_netmask: Value::Known(28),
            ..Default::default()
        }
    }

    #[test]
    fn test_filter_by_name_returns_single_match() {
        let items = [hsm("1", "a"), hsm("2", "b")];
        assert_eq!(filter_cloud_hsm_by_name(&items, "a").unwrap().id, "1");
    }

    #[test]
    fn test_filter_by_name_without_match() {
        let items = [hsm("1", "a"), hsm("2", "b")];
        assert_eq!(
            filter_cloud_hsm_by_name(&items, "c").unwrap_err(),
            FilterError::NoResult
        );
    }

    #[test]
    fn test_filter_by_name_with_duplicates() {
        let items = [hsm("1", "a"), hsm("2", "a")];
        let err = filter_cloud_hsm_by_name(&items, "a").unwrap_err();
        assert!(matches!(err, FilterError::Multiple { .. }));
        assert!(err.to_string().starts_with("multiple CloudHSM resources"));
    }

    #[tokio::test]
    async fn test_create_flattens_computed_fields() {
        let fake = FakeCloud::new();
        let resource = CloudHsmResource::new(test_client(&fake));
        let created = resource
            .create(&mut ctx(Operation::Create), plan("hsm"))
            .await
            .unwrap();

        assert_eq!(created.zone, Value::known("is1b"));
        assert_eq!(created.ipv4_address, Value::known("192.168.100.1"));
        let router = created.local_router.as_known().unwrap();
        assert!(router.secret_key.as_str().unwrap().starts_with("secret-"));
        assert!(created.created_at.as_str().unwrap().ends_with('Z'));
    }

    #[tokio::test]
    async fn test_unsupported_default_zone_falls_back_with_warning() {
        let fake = FakeCloud::new();
        let config = Config {
            zone: "tk1v".into(),
            ..Default::default()
        };
        let client = ApiClient::new(&config, Services::from_backend(Arc::new(fake.clone())));
        let resource = CloudHsmResource::new(client);

        let mut ctx = ctx(Operation::Create);
        let created = resource.create(&mut ctx, plan("hsm")).await.unwrap();
        assert_eq!(created.zone, Value::known("is1b"));
        let warning = ctx.diagnostics().warnings().next().unwrap();
        assert_eq!(warning.summary, "Zone Validation Warning");
    }

    #[tokio::test]
    async fn test_data_source_by_name() {
        let fake = FakeCloud::new();
        let client = test_client(&fake);
        let resource = CloudHsmResource::new(client.clone());
        for name in ["hsm-a", "hsm-b", "hsm-b"] {
            resource
                .create(&mut ctx(Operation::Create), plan(name))
                .await
                .unwrap();
        }
        let data_source = CloudHsmDataSource::new(client);

        let found = data_source
            .read(
                &mut ctx(Operation::Read),
                CloudHsmDataSourceModel {
                    name: Value::known("hsm-a"),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(found.name, Value::known("hsm-a"));

        let diag = data_source
            .read(
                &mut ctx(Operation::Read),
                CloudHsmDataSourceModel {
                    name: Value::known("hsm-b"),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(diag.summary, "Read: Search Error");

        let diag = data_source
            .read(&mut ctx(Operation::Read), CloudHsmDataSourceModel::default())
            .await
            .unwrap_err();
        assert_eq!(diag.summary, "Read: Attribute Error");
    }
}
