//! Data sources

use crate::diag::{Diagnostic, Diagnostics};
use crate::operation::Operation;
use crate::resource::{OpContext, Response};
use crate::schema::Schema;
use crate::timeouts::Deadline;
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as Json;
use std::time::Duration;

/// Typed lookup of an existing remote object
#[async_trait]
pub trait DataSourceHandler: Send + Sync + 'static {
    type Model: Serialize + DeserializeOwned + Send + Sync + 'static;

    fn type_suffix(&self) -> &'static str;

    fn schema(&self) -> Schema;

    /// Budget for the lookup; unbounded by default
    fn timeout(&self) -> Option<Duration> {
        None
    }

    fn validate(&self, _config: &Self::Model, _diags: &mut Diagnostics) {}

    async fn read(
        &self,
        ctx: &mut OpContext,
        config: Self::Model,
    ) -> Result<Self::Model, Diagnostic>;
}

/// Host-facing data source
#[async_trait]
pub trait DataSource: Send + Sync {
    fn type_suffix(&self) -> &'static str;

    fn type_name(&self, provider: &str) -> String {
        format!("{}_{}", provider, self.type_suffix())
    }

    fn schema(&self) -> Schema;

    fn validate_config(&self, config: &Json) -> Diagnostics;

    async fn read(&self, config: Json) -> Response;
}

/// Adapter from [`DataSourceHandler`] to [`DataSource`]
pub struct DataSourceRunner<D> {
    handler: D,
}

impl<D: DataSourceHandler> DataSourceRunner<D> {
    pub fn new(handler: D) -> Self {
        Self { handler }
    }
}

fn decode<M: DeserializeOwned>(config: &Json) -> Result<M, Diagnostic> {
    serde_json::from_value(config.clone()).map_err(|e| {
        Diagnostic::error(
            "Invalid configuration",
            format!("could not decode configuration: {}", e),
        )
    })
}

#[async_trait]
impl<D: DataSourceHandler> DataSource for DataSourceRunner<D> {
    fn type_suffix(&self) -> &'static str {
        self.handler.type_suffix()
    }

    fn schema(&self) -> Schema {
        self.handler.schema()
    }

    fn validate_config(&self, config: &Json) -> Diagnostics {
        let mut diags = self.handler.schema().validate(config);
        if diags.has_error() {
            return diags;
        }
        match decode::<D::Model>(config) {
            Ok(model) => self.handler.validate(&model, &mut diags),
            Err(d) => diags.push(d),
        }
        diags
    }

    async fn read(&self, config: Json) -> Response {
        let mut response = Response::default();
        let model: D::Model = match decode(&config) {
            Ok(m) => m,
            Err(d) => return response.error(d),
        };
        let deadline = Deadline::from_budget(self.handler.timeout());
        let mut ctx = OpContext::new(Operation::Read, deadline);
        match self.handler.read(&mut ctx, model).await {
            Ok(found) => response.write(&found),
            Err(d) => response.diagnostics.push(d),
        }
        response.diagnostics.append(ctx.diagnostics().clone());
        response
    }
}
