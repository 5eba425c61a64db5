//! `sakura_cloudhsm_client`

use super::cloudhsm::{hsm_zone, schema_hsm_zone};
use crate::client::ApiClient;
use crate::common::{flatten_time, schema_id, schema_name, schema_timeouts};
use async_trait::async_trait;
use sakura_api::{CloudHsmApi, CloudHsmClient, CloudHsmClientParams};
use sakura_framework::{
    Attribute, Diagnostic, Observed, OpContext, Operation, ResourceHandler, ResourceModel, Schema,
    TIMEOUT_5MIN, Timeouts, Validator, Value, observe,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudHsmClientModel {
    pub id: Value<String>,
    pub name: Value<String>,
    pub zone: Value<String>,
    pub cloudhsm_id: Value<String>,
    pub certificate: Value<String>,
    pub availability: Value<String>,
    pub created_at: Value<String>,
    pub modified_at: Value<String>,
    pub timeouts: Value<Timeouts>,
}

impl ResourceModel for CloudHsmClientModel {
    fn timeouts(&self) -> Option<&Timeouts> {
        self.timeouts.as_known()
    }
}

impl CloudHsmClientModel {
    fn flatten(&mut self, client: &CloudHsmClient, zone: &str) {
        self.id = Value::known(client.id.as_str());
        self.name = Value::known(client.name.as_str());
        self.zone = Value::known(zone);
        self.certificate = Value::known(client.certificate.as_str());
        self.availability = Value::known(client.availability.as_str());
        self.created_at = flatten_time(&client.created_at);
        self.modified_at = flatten_time(&client.modified_at);
    }
}

pub struct CloudHsmClientResource {
    client: ApiClient,
}

impl CloudHsmClientResource {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    fn api(&self) -> &Arc<dyn CloudHsmApi> {
        &self.client.services().cloudhsm
    }
}

#[async_trait]
impl ResourceHandler for CloudHsmClientResource {
    type Model = CloudHsmClientModel;

    fn type_suffix(&self) -> &'static str {
        "cloudhsm_client"
    }

    fn schema(&self) -> Schema {
        Schema::new("Manages a client certificate registered to a CloudHSM.")
            .attribute("id", schema_id("CloudHSM client"))
            .attribute("name", schema_name("CloudHSM client"))
            .attribute("zone", schema_hsm_zone("CloudHSM client"))
            .attribute(
                "cloudhsm_id",
                Attribute::string()
                    .required()
                    .requires_replace()
                    .validator(Validator::SakuraId)
                    .description("The ID of the CloudHSM the client belongs to"),
            )
            .attribute(
                "certificate",
                Attribute::string()
                    .required()
                    .requires_replace()
                    .description("The client certificate in PEM format"),
            )
            .attribute(
                "availability",
                Attribute::string()
                    .computed()
                    .description("The availability of the CloudHSM client"),
            )
            .attribute(
                "created_at",
                Attribute::string()
                    .computed()
                    .description("The creation date of the CloudHSM client"),
            )
            .attribute(
                "modified_at",
                Attribute::string()
                    .computed()
                    .description("The modification date of the CloudHSM client"),
            )
            .attribute("timeouts", schema_timeouts())
    }

    fn default_timeout(&self, op: Operation) -> Option<Duration> {
        op.is_mutating().then_some(TIMEOUT_5MIN)
    }

    async fn create(
        &self,
        ctx: &mut OpContext,
        mut plan: CloudHsmClientModel,
    ) -> Result<CloudHsmClientModel, Diagnostic> {
        let zone = hsm_zone(&self.client, ctx, &plan.zone);
        let hsm_id = plan.cloudhsm_id.value_or_default();
        ctx.call(self.api().read(&zone, &hsm_id)).await.map_err(|e| {
            Diagnostic::error(
                "Create: API Error",
                format!("failed to read CloudHSM[{}]: {}", hsm_id, e),
            )
        })?;

        let params = CloudHsmClientParams {
            name: plan.name.value_or_default(),
            certificate: plan.certificate.value_or_default(),
        };
        let created = ctx
            .call(self.api().create_client(&zone, &hsm_id, params))
            .await
            .map_err(|e| {
                Diagnostic::error(
                    "Create: API Error",
                    format!("failed to create CloudHSM[{}] client: {}", hsm_id, e),
                )
            })?;
        plan.flatten(&created, &zone);
        Ok(plan)
    }

    async fn read(
        &self,
        ctx: &mut OpContext,
        mut state: CloudHsmClientModel,
    ) -> Result<Observed<CloudHsmClientModel>, Diagnostic> {
        let zone = hsm_zone(&self.client, ctx, &state.zone);
        let hsm_id = state.cloudhsm_id.value_or_default();
        let id = state.id.value_or_default();
        let found = observe(
            ctx.call(self.api().read_client(&zone, &hsm_id, &id)).await,
            || format!("CloudHSM[{}] client[{}]", hsm_id, id),
        )?;
        Ok(found.map(|client| {
            state.flatten(&client, &zone);
            state
        }))
    }

    async fn update(
        &self,
        ctx: &mut OpContext,
        mut plan: CloudHsmClientModel,
        _prior: CloudHsmClientModel,
    ) -> Result<Observed<CloudHsmClientModel>, Diagnostic> {
        let zone = hsm_zone(&self.client, ctx, &plan.zone);
        let hsm_id = plan.cloudhsm_id.value_or_default();
        let id = plan.id.value_or_default();
        let name = plan.name.value_or_default();
        let updated = ctx
            .call(self.api().update_client(&zone, &hsm_id, &id, &name))
            .await
            .map_err(|e| {
                Diagnostic::error(
                    "Update: API Error",
                    format!("failed to update CloudHSM[{}] client[{}]: {}", hsm_id, id, e),
                )
            })?;
        plan.flatten(&updated, &zone);
        Ok(Observed::Present(plan))
    }

    async fn delete(
        &self,
        ctx: &mut OpContext,
        state: CloudHsmClientModel,
    ) -> Result<(), Diagnostic> {
        let zone = hsm_zone(&self.client, ctx, &state.zone);
        let hsm_id = state.cloudhsm_id.value_or_default();
        let id = state.id.value_or_default();

        // Deleting the HSM takes its clients with it.
        let hsm = observe(ctx.call(self.api().read(&zone, &hsm_id)).await, || {
            format!("CloudHSM[{}]", hsm_id)
        })?;
        if hsm.is_gone() {
            return Ok(());
        }
        let client = observe(
            ctx.call(self.api().read_client(&zone, &hsm_id, &id)).await,
            || format!("CloudHSM[{}] client[{}]", hsm_id, id),
        )?;
        if client.is_gone() {
            return Ok(());
        }

        ctx.call(self.api().delete_client(&zone, &hsm_id, &id))
            .await
            .map_err(|e| {
                Diagnostic::error(
                    "Delete: API Error",
                    format!("failed to delete CloudHSM[{}] client[{}]: {}", hsm_id, id, e),
                )
            })
    }
}
