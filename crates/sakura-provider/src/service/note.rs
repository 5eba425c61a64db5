//! `sakura_note` and `sakura_script`
//!
//! Both type names manage the same startup script API and differ only in
//! naming.

use crate::client::ApiClient;
use crate::common::{
    FilterBlock, expand_tags, filter_no_result, find_condition, flatten_icon_id, flatten_tags,
    schema_data_source_computed, schema_data_source_id, schema_data_source_name,
    schema_data_source_tags, schema_filter, schema_icon_id, schema_id, schema_name, schema_tags,
    schema_timeouts,
};
use async_trait::async_trait;
use sakura_api::{Note, NoteApi, NoteClass, NoteRequest};
use sakura_framework::{
    Attribute, DataSourceHandler, Diagnostic, Observed, OpContext, Operation, ResourceHandler,
    ResourceModel, Schema, TIMEOUT_5MIN, Timeouts, Validator, Value, observe,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Which type name a handler is registered under
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteKind {
    Note,
    Script,
}

impl NoteKind {
    fn type_suffix(&self) -> &'static str {
        match self {
            NoteKind::Note => "note",
            NoteKind::Script => "script",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            NoteKind::Note => "Note",
            NoteKind::Script => "Script",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoteModel {
    pub id: Value<String>,
    pub name: Value<String>,
    pub tags: Value<Vec<String>>,
    pub icon_id: Value<String>,
    pub class: Value<String>,
    pub content: Value<String>,
    /// Derived by the API from the content
    pub description: Value<String>,
    pub timeouts: Value<Timeouts>,
}

impl ResourceModel for NoteModel {
    fn timeouts(&self) -> Option<&Timeouts> {
        self.timeouts.as_known()
    }
}

impl NoteModel {
    fn expand(&self) -> NoteRequest {
        NoteRequest {
            name: self.name.value_or_default(),
            tags: expand_tags(&self.tags),
            icon_id: self.icon_id.value_or_default(),
            class: self
                .class
                .as_str()
                .and_then(NoteClass::parse)
                .unwrap_or_default(),
            content: self.content.value_or_default(),
        }
    }

    fn flatten(&mut self, note: &Note) {
        self.id = Value::known(note.id.as_str());
        self.name = Value::known(note.name.as_str());
        self.tags = flatten_tags(&note.tags);
        self.icon_id = flatten_icon_id(&note.icon_id);
        self.class = Value::known(note.class.as_str());
        self.content = Value::known(note.content.as_str());
        self.description = Value::known(note.description.as_str());
    }
}

pub struct NoteResource {
    client: ApiClient,
    kind: NoteKind,
}

impl NoteResource {
    pub fn new(client: ApiClient, kind: NoteKind) -> Self {
        Self { client, kind }
    }

    fn api(&self) -> &Arc<dyn NoteApi> {
        &self.client.services().note
    }

    fn what(&self, id: &str) -> String {
        format!("SakuraCloud {}[{}]", self.kind.label(), id)
    }
}

#[async_trait]
impl ResourceHandler for NoteResource {
    type Model = NoteModel;

    fn type_suffix(&self) -> &'static str {
        self.kind.type_suffix()
    }

    fn schema(&self) -> Schema {
        let label = self.kind.label();
        Schema::new(format!("Manages a {}.", label))
            .attribute("id", schema_id(label))
            .attribute("name", schema_name(label))
            .attribute("tags", schema_tags(label))
            .attribute("icon_id", schema_icon_id(label))
            .attribute(
                "description",
                Attribute::string()
                    .computed()
                    .description(format!("The description of the {}", label)),
            )
            .attribute(
                "content",
                Attribute::string()
                    .required()
                    .description(format!("The content of the {}", label)),
            )
            .attribute(
                "class",
                Attribute::string()
                    .optional()
                    .computed()
                    .default_value(NoteClass::Shell.as_str())
                    .validator(Validator::one_of(NoteClass::ALL))
                    .description(format!(
                        "The class of the {}. This must be one of [{}]",
                        label,
                        NoteClass::ALL.join("/")
                    )),
            )
            .attribute("timeouts", schema_timeouts())
    }

    fn default_timeout(&self, op: Operation) -> Option<Duration> {
        op.is_mutating().then_some(TIMEOUT_5MIN)
    }

    async fn create(
        &self,
        ctx: &mut OpContext,
        mut plan: NoteModel,
    ) -> Result<NoteModel, Diagnostic> {
        let note = ctx.call(self.api().create(plan.expand())).await.map_err(|e| {
            Diagnostic::error(
                "Create Error",
                format!("creating SakuraCloud {} is failed: {}", self.kind.label(), e),
            )
        })?;
        plan.flatten(&note);
        Ok(plan)
    }

    async fn read(
        &self,
        ctx: &mut OpContext,
        mut state: NoteModel,
    ) -> Result<Observed<NoteModel>, Diagnostic> {
        let id = state.id.value_or_default();
        let found = observe(ctx.call(self.api().read(&id)).await, || self.what(&id))?;
        Ok(found.map(|note| {
            state.flatten(&note);
            state
        }))
    }

    async fn update(
        &self,
        ctx: &mut OpContext,
        mut plan: NoteModel,
        _prior: NoteModel,
    ) -> Result<Observed<NoteModel>, Diagnostic> {
        let id = plan.id.value_or_default();
        let note = ctx
            .call(self.api().update(&id, plan.expand()))
            .await
            .map_err(|e| {
                Diagnostic::error(
                    "Update Error",
                    format!("updating {} is failed: {}", self.what(&id), e),
                )
            })?;
        plan.flatten(&note);
        Ok(Observed::Present(plan))
    }

    async fn delete(&self, ctx: &mut OpContext, state: NoteModel) -> Result<(), Diagnostic> {
        let id = state.id.value_or_default();
        if observe(ctx.call(self.api().read(&id)).await, || self.what(&id))?.is_gone() {
            return Ok(());
        }
        ctx.call(self.api().delete(&id)).await.map_err(|e| {
            Diagnostic::error(
                "Delete Error",
                format!("could not delete {}: {}", self.what(&id), e),
            )
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoteDataSourceModel {
    pub id: Value<String>,
    pub name: Value<String>,
    pub tags: Value<Vec<String>>,
    pub icon_id: Value<String>,
    pub class: Value<String>,
    pub content: Value<String>,
    pub description: Value<String>,
    pub filter: Value<FilterBlock>,
}

pub struct NoteDataSource {
    client: ApiClient,
    kind: NoteKind,
}

impl NoteDataSource {
    pub fn new(client: ApiClient, kind: NoteKind) -> Self {
        Self { client, kind }
    }
}

#[async_trait]
impl DataSourceHandler for NoteDataSource {
    type Model = NoteDataSourceModel;

    fn type_suffix(&self) -> &'static str {
        self.kind.type_suffix()
    }

    fn schema(&self) -> Schema {
        let label = self.kind.label();
        Schema::new(format!("Get information about an existing {}.", label))
            .attribute("id", schema_data_source_id(label))
            .attribute("name", schema_data_source_name(label))
            .attribute("tags", schema_data_source_tags(label))
            .attribute(
                "icon_id",
                schema_data_source_computed(format!("The icon id attached to the {}", label)),
            )
            .attribute(
                "class",
                schema_data_source_computed(format!("The class of the {}", label)),
            )
            .attribute(
                "content",
                schema_data_source_computed(format!("The content of the {}", label)),
            )
            .attribute(
                "description",
                schema_data_source_computed(format!("The description of the {}", label)),
            )
            .attribute("filter", schema_filter())
    }

    async fn read(
        &self,
        ctx: &mut OpContext,
        mut config: NoteDataSourceModel,
    ) -> Result<NoteDataSourceModel, Diagnostic> {
        let condition = find_condition(&config.filter);
        let found = ctx
            .call(self.client.services().note.find(&condition))
            .await
            .map_err(|e| {
                Diagnostic::error(
                    "Read Error",
                    format!(
                        "could not find SakuraCloud {} resource: {}",
                        self.kind.label(),
                        e
                    ),
                )
            })?;
        let note = found.first().ok_or_else(filter_no_result)?;

        config.id = Value::known(note.id.as_str());
        config.name = Value::known(note.name.as_str());
        config.tags = flatten_tags(&note.tags);
        config.icon_id = flatten_icon_id(&note.icon_id);
        config.class = Value::known(note.class.as_str());
        config.content = Value::known(note.content.as_str());
        config.description = Value::known(note.description.as_str());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::test_client;
    use sakura_api::FakeCloud;
    use sakura_framework::Deadline;
    use serde_json::json;

    const SCRIPT: &str = "#!/bin/bash\n# @sacloud-desc Installs nginx\napt-get install -y nginx\n";

    fn ctx(op: Operation) -> OpContext {
        OpContext::new(op, Deadline::unbounded())
    }

    fn plan() -> NoteModel {
        NoteModel {
            id: Value::Unknown,
            name: Value::known("nginx"),
            tags: Value::Known(vec!["web".into()]),
            content: Value::known(SCRIPT),
            description: Value::Unknown,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_defaults_to_shell_and_derives_description() {
        let fake = FakeCloud::new();
        let resource = NoteResource::new(test_client(&fake), NoteKind::Note);
        let created = resource.create(&mut ctx(Operation::Create), plan()).await.unwrap();

        assert_eq!(created.class, Value::known("shell"));
        assert_eq!(created.description, Value::known("Installs nginx"));
        assert_eq!(created.icon_id, Value::Null);
        assert_eq!(created.tags, Value::Known(vec!["web".to_string()]));
    }

    #[tokio::test]
    async fn test_update_changes_class() {
        let fake = FakeCloud::new();
        let resource = NoteResource::new(test_client(&fake), NoteKind::Script);
        let created = resource.create(&mut ctx(Operation::Create), plan()).await.unwrap();

        let planned = NoteModel {
            class: Value::known("yaml_cloud_config"),
            content: Value::known("#cloud-config\npackages: [nginx]\n"),
            ..created.clone()
        };
        let updated = resource
            .update(&mut ctx(Operation::Update), planned, created)
            .await
            .unwrap()
            .present()
            .unwrap();
        assert_eq!(updated.class, Value::known("yaml_cloud_config"));
        assert_eq!(updated.description, Value::known(""));
    }

    #[test]
    fn test_kinds_share_schema_shape() {
        let client = test_client(&FakeCloud::new());
        let note = NoteResource::new(client.clone(), NoteKind::Note);
        let script = NoteResource::new(client, NoteKind::Script);
        assert_eq!(note.type_suffix(), "note");
        assert_eq!(script.type_suffix(), "script");

        let schema = script.schema();
        assert!(schema.get("description").unwrap().is_read_only());
        let diags = schema.validate(&json!({"name": "s", "content": "x", "class": "powershell"}));
        assert!(diags.has_error());
    }

    #[tokio::test]
    async fn test_data_source_filters_by_tag() {
        let fake = FakeCloud::new();
        let client = test_client(&fake);
        let resource = NoteResource::new(client.clone(), NoteKind::Note);
        resource.create(&mut ctx(Operation::Create), plan()).await.unwrap();
        let other = NoteModel {
            name: Value::known("db"),
            tags: Value::Known(vec!["db".into()]),
            ..plan()
        };
        resource.create(&mut ctx(Operation::Create), other).await.unwrap();

        let data_source = NoteDataSource::new(client, NoteKind::Note);
        let config = NoteDataSourceModel {
            filter: Value::Known(FilterBlock {
                tags: Value::Known(vec!["db".into()]),
                ..Default::default()
            }),
            ..Default::default()
        };
        let found = data_source.read(&mut ctx(Operation::Read), config).await.unwrap();
        assert_eq!(found.name, Value::known("db"));
    }
}
