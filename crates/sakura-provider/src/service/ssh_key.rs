//! `sakura_ssh_key` resource and data source

use crate::client::ApiClient;
use crate::common::{
    FilterBlock, filter_no_result, find_condition, schema_data_source_computed,
    schema_data_source_id, schema_data_source_name, schema_description, schema_filter, schema_id,
    schema_name, schema_timeouts,
};
use async_trait::async_trait;
use sakura_api::{SshKey, SshKeyApi, SshKeyCreateRequest, SshKeyUpdateRequest};
use sakura_framework::{
    Attribute, DataSourceHandler, Diagnostic, Observed, OpContext, Operation, ResourceHandler,
    ResourceModel, Schema, TIMEOUT_5MIN, Timeouts, Value, observe,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SshKeyModel {
    pub id: Value<String>,
    pub name: Value<String>,
    pub description: Value<String>,
    pub public_key: Value<String>,
    pub fingerprint: Value<String>,
    pub timeouts: Value<Timeouts>,
}

impl ResourceModel for SshKeyModel {
    fn timeouts(&self) -> Option<&Timeouts> {
        self.timeouts.as_known()
    }
}

impl SshKeyModel {
    fn expand_create(&self) -> SshKeyCreateRequest {
        SshKeyCreateRequest {
            name: self.name.value_or_default(),
            description: self.description.value_or_default(),
            public_key: self.public_key.value_or_default(),
        }
    }

    fn expand_update(&self) -> SshKeyUpdateRequest {
        SshKeyUpdateRequest {
            name: self.name.value_or_default(),
            description: self.description.value_or_default(),
        }
    }

    fn flatten(&mut self, key: &SshKey) {
        self.id = Value::known(key.id.as_str());
        self.name = Value::known(key.name.as_str());
        self.description = Value::known(key.description.as_str());
        self.public_key = Value::known(key.public_key.as_str());
        self.fingerprint = Value::known(key.fingerprint.as_str());
    }
}

pub struct SshKeyResource {
    client: ApiClient,
}

impl SshKeyResource {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    fn api(&self) -> &Arc<dyn SshKeyApi> {
        &self.client.services().ssh_key
    }

    /// Re-read after a write so computed fields come from the API
    async fn read_back(
        &self,
        ctx: &OpContext,
        mut model: SshKeyModel,
        id: &str,
    ) -> Result<Observed<SshKeyModel>, Diagnostic> {
        let found = observe(ctx.call(self.api().read(id)).await, || {
            format!("SSHKey[{}]", id)
        })?;
        Ok(found.map(|key| {
            model.flatten(&key);
            model
        }))
    }
}

#[async_trait]
impl ResourceHandler for SshKeyResource {
    type Model = SshKeyModel;

    fn type_suffix(&self) -> &'static str {
        "ssh_key"
    }

    fn schema(&self) -> Schema {
        Schema::new("Manages a SSH Key.")
            .attribute("id", schema_id("SSH Key"))
            .attribute("name", schema_name("SSH Key"))
            .attribute("description", schema_description("SSH Key"))
            .attribute(
                "public_key",
                Attribute::string()
                    .required()
                    .requires_replace()
                    .description("The body of the public key"),
            )
            .attribute(
                "fingerprint",
                Attribute::string()
                    .computed()
                    .description("The fingerprint of the public key"),
            )
            .attribute("timeouts", schema_timeouts())
    }

    fn default_timeout(&self, op: Operation) -> Option<Duration> {
        op.is_mutating().then_some(TIMEOUT_5MIN)
    }

    async fn create(
        &self,
        ctx: &mut OpContext,
        plan: SshKeyModel,
    ) -> Result<SshKeyModel, Diagnostic> {
        let key = ctx
            .call(self.api().create(plan.expand_create()))
            .await
            .map_err(|e| {
                Diagnostic::error("Create Error", format!("creating SSHKey is failed: {}", e))
            })?;

        match self.read_back(ctx, plan, &key.id).await? {
            Observed::Present(model) => Ok(model),
            Observed::Gone => Err(Diagnostic::error(
                "Create Error",
                format!("SSHKey[{}] disappeared right after creation", key.id),
            )),
        }
    }

    async fn read(
        &self,
        ctx: &mut OpContext,
        state: SshKeyModel,
    ) -> Result<Observed<SshKeyModel>, Diagnostic> {
        let id = state.id.value_or_default();
        self.read_back(ctx, state, &id).await
    }

    async fn update(
        &self,
        ctx: &mut OpContext,
        plan: SshKeyModel,
        _prior: SshKeyModel,
    ) -> Result<Observed<SshKeyModel>, Diagnostic> {
        let id = plan.id.value_or_default();
        let key = ctx.call(self.api().read(&id)).await.map_err(|e| {
            Diagnostic::error("Update Error", format!("could not read SSHKey[{}]: {}", id, e))
        })?;
        ctx.call(self.api().update(&key.id, plan.expand_update()))
            .await
            .map_err(|e| {
                Diagnostic::error(
                    "Update Error",
                    format!("updating SSHKey[{}] is failed: {}", id, e),
                )
            })?;
        self.read_back(ctx, plan, &key.id).await
    }

    async fn delete(&self, ctx: &mut OpContext, state: SshKeyModel) -> Result<(), Diagnostic> {
        let id = state.id.value_or_default();
        let found = observe(ctx.call(self.api().read(&id)).await, || {
            format!("SSHKey[{}]", id)
        })?;
        let Observed::Present(key) = found else {
            return Ok(());
        };
        ctx.call(self.api().delete(&key.id)).await.map_err(|e| {
            Diagnostic::error("Delete Error", format!("deleting SSHKey[{}] is failed: {}", id, e))
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SshKeyDataSourceModel {
    pub id: Value<String>,
    pub name: Value<String>,
    pub description: Value<String>,
    pub public_key: Value<String>,
    pub fingerprint: Value<String>,
    pub filter: Value<FilterBlock>,
}

pub struct SshKeyDataSource {
    client: ApiClient,
}

impl SshKeyDataSource {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DataSourceHandler for SshKeyDataSource {
    type Model = SshKeyDataSourceModel;

    fn type_suffix(&self) -> &'static str {
        "ssh_key"
    }

    fn schema(&self) -> Schema {
        Schema::new("Get information about an existing SSH Key.")
            .attribute("id", schema_data_source_id("SSH Key"))
            .attribute("name", schema_data_source_name("SSH Key"))
            .attribute(
                "description",
                schema_data_source_computed("The description of the SSH Key.".into()),
            )
            .attribute(
                "public_key",
                schema_data_source_computed("The body of the public key".into()),
            )
            .attribute(
                "fingerprint",
                schema_data_source_computed("The fingerprint of the public key".into()),
            )
            .attribute("filter", schema_filter())
    }

    async fn read(
        &self,
        ctx: &mut OpContext,
        mut config: SshKeyDataSourceModel,
    ) -> Result<SshKeyDataSourceModel, Diagnostic> {
        let condition = find_condition(&config.filter);
        let found = ctx
            .call(self.client.services().ssh_key.find(&condition))
            .await
            .map_err(|e| {
                Diagnostic::error(
                    "Read Error",
                    format!("could not find SakuraCloud SSHKey resource: {}", e),
                )
            })?;
        let key = found.first().ok_or_else(filter_no_result)?;

        config.id = Value::known(key.id.as_str());
        config.name = Value::known(key.name.as_str());
        config.description = Value::known(key.description.as_str());
        config.public_key = Value::known(key.public_key.as_str());
        config.fingerprint = Value::known(key.fingerprint.as_str());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::test_client;
    use sakura_api::{ApiError, FakeCloud};
    use sakura_framework::Deadline;

    const PUBLIC_KEY: &str = "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIFakeKey user@example";

    fn ctx(op: Operation) -> OpContext {
        OpContext::new(op, Deadline::unbounded())
    }

    fn plan() -> SshKeyModel {
        SshKeyModel {
            id: Value::Unknown,
            name: Value::known("deploy"),
            description: Value::known("deploy key"),
            public_key: Value::known(PUBLIC_KEY),
            fingerprint: Value::Unknown,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_fills_fingerprint() {
        let fake = FakeCloud::new();
        let resource = SshKeyResource::new(test_client(&fake));
        let created = resource.create(&mut ctx(Operation::Create), plan()).await.unwrap();

        assert_eq!(created.public_key, Value::known(PUBLIC_KEY));
        assert!(created.fingerprint.as_str().is_some_and(|f| f.contains(':')));
        assert_eq!(fake.call_count("ssh_key.read"), 1);
    }

    #[tokio::test]
    async fn test_update_reads_first() {
        let fake = FakeCloud::new();
        let resource = SshKeyResource::new(test_client(&fake));
        let created = resource.create(&mut ctx(Operation::Create), plan()).await.unwrap();
        fake.clear_calls();

        let planned = SshKeyModel {
            name: Value::known("deploy-2"),
            ..created.clone()
        };
        let updated = resource
            .update(&mut ctx(Operation::Update), planned, created)
            .await
            .unwrap()
            .present()
            .unwrap();
        assert_eq!(updated.name, Value::known("deploy-2"));

        let calls = fake.calls();
        assert_eq!(calls.first(), Some(&sakura_api::CallEvent::Begin("ssh_key.read".into())));
    }

    #[tokio::test]
    async fn test_update_of_missing_key_is_an_error() {
        let fake = FakeCloud::new();
        let resource = SshKeyResource::new(test_client(&fake));
        let state = SshKeyModel {
            id: Value::known("999"),
            ..plan()
        };
        let diag = resource
            .update(&mut ctx(Operation::Update), state.clone(), state)
            .await
            .unwrap_err();
        assert_eq!(diag.summary, "Update Error");
    }

    #[tokio::test]
    async fn test_delete_of_gone_key_succeeds() {
        let fake = FakeCloud::new();
        let resource = SshKeyResource::new(test_client(&fake));
        let state = SshKeyModel {
            id: Value::known("999"),
            ..plan()
        };
        resource.delete(&mut ctx(Operation::Delete), state).await.unwrap();
        assert_eq!(fake.call_count("ssh_key.delete"), 0);
    }

    #[tokio::test]
    async fn test_data_source_find_error() {
        let fake = FakeCloud::new();
        fake.fail_next("ssh_key.find", ApiError::Unauthorized("token".into()));
        let data_source = SshKeyDataSource::new(test_client(&fake));
        let diag = data_source
            .read(&mut ctx(Operation::Read), SshKeyDataSourceModel::default())
            .await
            .unwrap_err();
        assert_eq!(diag.summary, "Read Error");
    }

    #[test]
    fn test_public_key_forces_replacement() {
        let resource = SshKeyResource::new(test_client(&FakeCloud::new()));
        let schema = resource.schema();
        assert!(schema.replace_triggers().any(|name| name == "public_key"));
        assert_eq!(resource.default_timeout(Operation::Create), Some(TIMEOUT_5MIN));
        assert_eq!(resource.default_timeout(Operation::Read), None);
    }
}
