//! `sakura_kms` resource and data source

use crate::client::ApiClient;
use crate::common::{
    expand_tags, flatten_tags, flatten_time, schema_data_source_computed, schema_data_source_tags,
    schema_description, schema_id, schema_name, schema_tags, schema_timeouts,
};
use async_trait::async_trait;
use sakura_api::{CreateKey, Key, KeyOrigin, KeyStatus, KmsApi, UpdateKey};
use sakura_framework::{
    Attribute, DataSourceHandler, Diagnostic, Observed, OpContext, Operation, ResourceHandler,
    ResourceModel, Schema, TIMEOUT_5MIN, Timeouts, Validator, Value, filter_by_name, observe,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KmsModel {
    pub id: Value<String>,
    pub name: Value<String>,
    pub description: Value<String>,
    pub tags: Value<Vec<String>>,
    pub key_origin: Value<String>,
    pub plain_key: Value<String>,
    pub status: Value<String>,
    /// Bumping this rotates the key material
    pub rotate_version: Value<i64>,
    pub latest_version: Value<i64>,
    /// Destroy after this many days instead of immediately
    pub schedule_destruction_days: Value<i64>,
    pub created_at: Value<String>,
    pub modified_at: Value<String>,
    pub timeouts: Value<Timeouts>,
}

impl ResourceModel for KmsModel {
    fn timeouts(&self) -> Option<&Timeouts> {
        self.timeouts.as_known()
    }
}

impl KmsModel {
    fn key_origin(&self) -> KeyOrigin {
        self.key_origin
            .as_str()
            .and_then(KeyOrigin::parse)
            .unwrap_or_default()
    }

    fn requested_status(&self) -> Option<KeyStatus> {
        self.status.as_str().and_then(KeyStatus::parse)
    }

    fn expand_create(&self) -> Result<CreateKey, String> {
        let key_origin = self.key_origin();
        let plain_key = self.plain_key.as_known().filter(|k| !k.is_empty()).cloned();
        if key_origin == KeyOrigin::Imported && plain_key.is_none() {
            return Err("plain_key is required when key_origin is 'imported'".into());
        }
        Ok(CreateKey {
            name: self.name.value_or_default(),
            description: self.description.as_known().cloned(),
            tags: expand_tags(&self.tags),
            key_origin,
            plain_key,
        })
    }

    fn expand_update(&self) -> UpdateKey {
        UpdateKey {
            name: self.name.value_or_default(),
            description: self.description.value_or_default(),
            tags: expand_tags(&self.tags),
            key_origin: self.key_origin(),
        }
    }

    fn flatten(&mut self, key: &Key) {
        self.id = Value::known(key.id.as_str());
        self.name = Value::known(key.name.as_str());
        self.description = Value::known(key.description.as_str());
        self.tags = flatten_tags(&key.tags);
        self.key_origin = Value::known(key.key_origin.as_str());
        self.status = Value::known(key.status.as_str());
        self.latest_version = Value::Known(key.latest_version);
        self.created_at = flatten_time(&key.created_at);
        self.modified_at = flatten_time(&key.modified_at);
    }
}

pub struct KmsResource {
    client: ApiClient,
}

impl KmsResource {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    fn api(&self) -> &Arc<dyn KmsApi> {
        &self.client.services().kms
    }

    async fn read_back(
        &self,
        ctx: &mut OpContext,
        id: &str,
        summary: &str,
    ) -> Result<Key, Diagnostic> {
        ctx.call(self.api().read(id)).await.map_err(|e| {
            Diagnostic::error(summary, format!("failed to read KMS key[{}]: {}", id, e))
        })
    }
}

#[async_trait]
impl ResourceHandler for KmsResource {
    type Model = KmsModel;

    fn type_suffix(&self) -> &'static str {
        "kms"
    }

    fn schema(&self) -> Schema {
        Schema::new("Manages a KMS key.")
            .attribute("id", schema_id("KMS key"))
            .attribute("name", schema_name("KMS key"))
            .attribute("description", schema_description("KMS key"))
            .attribute("tags", schema_tags("KMS key"))
            .attribute(
                "key_origin",
                Attribute::string()
                    .default_value(KeyOrigin::Generated.as_str())
                    .requires_replace()
                    .validator(Validator::one_of(KeyOrigin::NAMES))
                    .description(format!(
                        "The origin of the key material. This must be one of [{}]",
                        KeyOrigin::NAMES.join("/")
                    )),
            )
            .attribute(
                "plain_key",
                Attribute::string()
                    .optional()
                    .sensitive()
                    .requires_replace()
                    .description("The key material to import. Required when `key_origin` is `imported`"),
            )
            .attribute(
                "status",
                Attribute::string()
                    .optional()
                    .computed()
                    .validator(Validator::one_of(KeyStatus::NAMES))
                    .description(format!(
                        "The status of the KMS key. This must be one of [{}]",
                        KeyStatus::NAMES.join("/")
                    )),
            )
            .attribute(
                "rotate_version",
                Attribute::int()
                    .optional()
                    .description("Changing this value rotates the key material"),
            )
            .attribute(
                "latest_version",
                Attribute::int()
                    .computed()
                    .description("The latest version of the key material"),
            )
            .attribute(
                "schedule_destruction_days",
                Attribute::int()
                    .optional()
                    .validator(Validator::IntBetween(7, 90))
                    .description(
                        "Schedule the destruction of the key this many days after deletion instead of destroying it immediately",
                    ),
            )
            .attribute(
                "created_at",
                Attribute::string()
                    .computed()
                    .description("The creation date of the KMS key"),
            )
            .attribute(
                "modified_at",
                Attribute::string()
                    .computed()
                    .description("The modification date of the KMS key"),
            )
            .attribute("timeouts", schema_timeouts())
    }

    fn default_timeout(&self, op: Operation) -> Option<Duration> {
        op.is_mutating().then_some(TIMEOUT_5MIN)
    }

    async fn create(
        &self,
        ctx: &mut OpContext,
        mut plan: KmsModel,
    ) -> Result<KmsModel, Diagnostic> {
        let request = plan
            .expand_create()
            .map_err(|e| Diagnostic::error("Create: Expand Error", e))?;
        let requested = plan.requested_status();
        let key = ctx.call(self.api().create(request)).await.map_err(|e| {
            Diagnostic::error("Create: API Error", format!("failed to create KMS key: {}", e))
        })?;
        plan.flatten(&key);

        if let Some(status) = requested.filter(|s| *s != key.status) {
            ctx.keep_partial(&plan);
            ctx.call(self.api().change_status(&key.id, status))
                .await
                .map_err(|e| {
                    Diagnostic::error(
                        "Create: API Error",
                        format!("failed to change status of KMS key[{}]: {}", key.id, e),
                    )
                })?;
            let key = self.read_back(ctx, &key.id, "Create: API Error").await?;
            plan.flatten(&key);
        }
        Ok(plan)
    }

    async fn read(
        &self,
        ctx: &mut OpContext,
        mut state: KmsModel,
    ) -> Result<Observed<KmsModel>, Diagnostic> {
        let id = state.id.value_or_default();
        let found = observe(ctx.call(self.api().read(&id)).await, || format!("KMS key[{}]", id))?;
        Ok(found.map(|key| {
            state.flatten(&key);
            state
        }))
    }

    async fn update(
        &self,
        ctx: &mut OpContext,
        mut plan: KmsModel,
        prior: KmsModel,
    ) -> Result<Observed<KmsModel>, Diagnostic> {
        let id = plan.id.value_or_default();
        let failed = |e: sakura_api::ApiError| {
            Diagnostic::error(
                "Update: API Error",
                format!("failed to update KMS key[{}]: {}", id, e),
            )
        };

        let before = match observe(ctx.call(self.api().read(&id)).await, || {
            format!("KMS key[{}]", id)
        })? {
            Observed::Present(key) => key,
            Observed::Gone => return Ok(Observed::Gone),
        };

        ctx.call(self.api().update(&id, plan.expand_update()))
            .await
            .map_err(failed)?;

        // rotation is decided by the status before this update and has to
        // run while the key is still active
        if plan.rotate_version.is_known() && plan.rotate_version != prior.rotate_version {
            if before.status == KeyStatus::Active {
                tracing::info!("Rotating KMS key[{}]", id);
                ctx.call(self.api().rotate(&id)).await.map_err(failed)?;
            } else {
                ctx.warn(
                    "Rotate Warning",
                    format!("Can't rotate KMS key[{}] when status is not 'active'", id),
                );
            }
        }

        if let Some(status) = plan.requested_status().filter(|s| *s != before.status) {
            ctx.call(self.api().change_status(&id, status))
                .await
                .map_err(failed)?;
        }

        let key = self.read_back(ctx, &id, "Update: API Error").await?;
        plan.flatten(&key);
        Ok(Observed::Present(plan))
    }

    async fn delete(&self, ctx: &mut OpContext, state: KmsModel) -> Result<(), Diagnostic> {
        let id = state.id.value_or_default();
        if observe(ctx.call(self.api().read(&id)).await, || format!("KMS key[{}]", id))?.is_gone() {
            return Ok(());
        }

        let result = match state.schedule_destruction_days.as_known() {
            Some(days) => {
                let days = u32::try_from(*days).unwrap_or_default();
                ctx.call(self.api().schedule_destruction(&id, days)).await
            }
            None => ctx.call(self.api().delete(&id)).await,
        };
        result.map_err(|e| {
            Diagnostic::error(
                "Delete: API Error",
                format!("failed to delete KMS key[{}]: {}", id, e),
            )
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KmsDataSourceModel {
    pub id: Value<String>,
    pub name: Value<String>,
    pub description: Value<String>,
    pub tags: Value<Vec<String>>,
    pub key_origin: Value<String>,
    pub status: Value<String>,
    pub latest_version: Value<i64>,
}

pub struct KmsDataSource {
    client: ApiClient,
}

impl KmsDataSource {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DataSourceHandler for KmsDataSource {
    type Model = KmsDataSourceModel;

    fn type_suffix(&self) -> &'static str {
        "kms"
    }

    fn schema(&self) -> Schema {
        Schema::new("Get information about an existing KMS key.")
            .attribute(
                "id",
                Attribute::string()
                    .optional()
                    .computed()
                    .validator(Validator::SakuraId)
                    .description("The ID of the KMS key. Either `id` or `name` must be specified"),
            )
            .attribute(
                "name",
                Attribute::string()
                    .optional()
                    .computed()
                    .description("The name of the KMS key. Either `id` or `name` must be specified"),
            )
            .attribute(
                "description",
                schema_data_source_computed("The description of the KMS key".into()),
            )
            .attribute("tags", schema_data_source_tags("KMS key"))
            .attribute(
                "key_origin",
                schema_data_source_computed("The origin of the key material".into()),
            )
            .attribute(
                "status",
                schema_data_source_computed("The status of the KMS key".into()),
            )
            .attribute(
                "latest_version",
                Attribute::int()
                    .computed()
                    .description("The latest version of the key material"),
            )
    }

    async fn read(
        &self,
        ctx: &mut OpContext,
        mut config: KmsDataSourceModel,
    ) -> Result<KmsDataSourceModel, Diagnostic> {
        let api = &self.client.services().kms;
        let key = if let Some(id) = config.id.as_str().filter(|id| !id.is_empty()) {
            ctx.call(api.read(id)).await.map_err(|e| {
                Diagnostic::error("Read Error", format!("could not read KMS key[{}]: {}", id, e))
            })?
        } else if let Some(name) = config.name.as_str().filter(|name| !name.is_empty()) {
            let keys = ctx.call(api.list()).await.map_err(|e| {
                Diagnostic::error("List Error", format!("could not find any KMS resource: {}", e))
            })?;
            filter_by_name(&keys, name, "KMS")
                .map_err(|e| Diagnostic::error("Filter Error", e.to_string()))?
                .clone()
        } else {
            return Err(Diagnostic::error(
                "Missing Attribute",
                "Either 'id' or 'name' must be specified.",
            ));
        };

        config.id = Value::known(key.id.as_str());
        config.name = Value::known(key.name.as_str());
        config.description = Value::known(key.description.as_str());
        config.tags = flatten_tags(&key.tags);
        config.key_origin = Value::known(key.key_origin.as_str());
        config.status = Value::known(key.status.as_str());
        config.latest_version = Value::Known(key.latest_version);
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::test_client;
    use sakura_api::FakeCloud;
    use sakura_framework::Deadline;

    fn ctx(op: Operation) -> OpContext {
        OpContext::new(op, Deadline::unbounded())
    }

    fn plan() -> KmsModel {
        KmsModel {
            name: Value::known("key"),
            key_origin: Value::known("generated"),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_imported_key_requires_plain_key() {
        let fake = FakeCloud::new();
        let resource = KmsResource::new(test_client(&fake));
        let diag = resource
            .create(
                &mut ctx(Operation::Create),
                KmsModel {
                    key_origin: Value::known("imported"),
                    ..plan()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(diag.summary, "Create: Expand Error");
        assert_eq!(fake.call_count("kms.create"), 0);
    }

    #[tokio::test]
    async fn test_create_with_restricted_status() {
        let fake = FakeCloud::new();
        let resource = KmsResource::new(test_client(&fake));
        let created = resource
            .create(
                &mut ctx(Operation::Create),
                KmsModel {
                    status: Value::known("restricted"),
                    ..plan()
                },
            )
            .await
            .unwrap();
        assert_eq!(created.status, Value::known("restricted"));
        assert_eq!(created.latest_version, Value::Known(1));
        assert_eq!(fake.call_count("kms.change_status"), 1);
    }

    #[tokio::test]
    async fn test_rotate_on_version_bump() {
        let fake = FakeCloud::new();
        let resource = KmsResource::new(test_client(&fake));
        let created = resource.create(&mut ctx(Operation::Create), plan()).await.unwrap();

        let planned = KmsModel {
            rotate_version: Value::Known(1),
            ..created.clone()
        };
        let updated = resource
            .update(&mut ctx(Operation::Update), planned, created)
            .await
            .unwrap()
            .present()
            .unwrap();
        assert_eq!(updated.latest_version, Value::Known(2));
    }

    #[tokio::test]
    async fn test_rotate_skipped_with_warning_when_restricted() {
        let fake = FakeCloud::new();
        let resource = KmsResource::new(test_client(&fake));
        let created = resource
            .create(
                &mut ctx(Operation::Create),
                KmsModel {
                    status: Value::known("restricted"),
                    ..plan()
                },
            )
            .await
            .unwrap();

        let planned = KmsModel {
            rotate_version: Value::Known(1),
            ..created.clone()
        };
        let mut ctx = ctx(Operation::Update);
        let updated = resource
            .update(&mut ctx, planned, created)
            .await
            .unwrap()
            .present()
            .unwrap();
        assert_eq!(updated.latest_version, Value::Known(1));
        assert_eq!(fake.call_count("kms.rotate"), 0);
        let warning = ctx.diagnostics().warnings().next().unwrap();
        assert_eq!(
            warning.detail,
            "Can't rotate KMS key[113000000001] when status is not 'active'"
        );
    }

    #[tokio::test]
    async fn test_rotate_follows_status_before_update() {
        let fake = FakeCloud::new();
        let resource = KmsResource::new(test_client(&fake));
        let created = resource.create(&mut ctx(Operation::Create), plan()).await.unwrap();

        let planned = KmsModel {
            status: Value::known("restricted"),
            rotate_version: Value::Known(1),
            ..created.clone()
        };
        let mut ctx = ctx(Operation::Update);
        let updated = resource
            .update(&mut ctx, planned, created)
            .await
            .unwrap()
            .present()
            .unwrap();
        assert_eq!(updated.latest_version, Value::Known(2));
        assert_eq!(updated.status, Value::known("restricted"));
        assert_eq!(ctx.diagnostics().warnings().count(), 0);
    }

    #[tokio::test]
    async fn test_update_of_vanished_key_is_gone() {
        let fake = FakeCloud::new();
        let resource = KmsResource::new(test_client(&fake));
        let created = resource.create(&mut ctx(Operation::Create), plan()).await.unwrap();
        assert!(fake.delete_out_of_band("113000000001"));

        let planned = KmsModel {
            description: Value::known("changed"),
            ..created.clone()
        };
        let observed = resource
            .update(&mut ctx(Operation::Update), planned, created)
            .await
            .unwrap();
        assert!(observed.is_gone());
        assert_eq!(fake.call_count("kms.update"), 0);
    }

    #[tokio::test]
    async fn test_delete_schedules_destruction() {
        let fake = FakeCloud::new();
        let resource = KmsResource::new(test_client(&fake));
        let created = resource.create(&mut ctx(Operation::Create), plan()).await.unwrap();

        let state = KmsModel {
            schedule_destruction_days: Value::Known(30),
            ..created
        };
        resource.delete(&mut ctx(Operation::Delete), state).await.unwrap();
        assert_eq!(fake.call_count("kms.schedule_destruction"), 1);
        assert_eq!(fake.call_count("kms.delete"), 0);
    }

    #[tokio::test]
    async fn test_data_source_lookup() {
        let fake = FakeCloud::new();
        let client = test_client(&fake);
        let resource = KmsResource::new(client.clone());
        resource.create(&mut ctx(Operation::Create), plan()).await.unwrap();
        let data_source = KmsDataSource::new(client);

        let found = data_source
            .read(
                &mut ctx(Operation::Read),
                KmsDataSourceModel {
                    name: Value::known("key"),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(found.id, Value::known("113000000001"));

        let diag = data_source
            .read(
                &mut ctx(Operation::Read),
                KmsDataSourceModel {
                    name: Value::known("missing"),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(diag.summary, "Filter Error");
        assert_eq!(diag.detail, "no result");
    }
}
