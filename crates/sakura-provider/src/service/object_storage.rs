//! `sakura_object_storage_bucket` and `sakura_object_storage_object`
//!
//! Buckets go through the control-plane API. Objects are written through an
//! S3-compatible endpoint with credentials carried on the resource itself.

use crate::client::ApiClient;
use crate::common::{flatten_time, schema_id, schema_timeouts};
use async_trait::async_trait;
use sakura_api::{
    Bucket, DEFAULT_CONTENT_TYPE, DEFAULT_S3_ENDPOINT, ObjectInfo, ObjectStorageApi, PutObject,
    S3Api, S3Credentials,
};
use sakura_framework::{
    Attribute, AttributeKind, Diagnostic, Diagnostics, Observed, OpContext, Operation,
    ResourceHandler, ResourceModel, Schema, TIMEOUT_5MIN, Timeouts, Validator, Value, observe,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value as Json, json};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Split a bucket ID of the form `{site_id}_{name}`
fn parse_bucket_id(id: &str) -> Option<(&str, &str)> {
    let mut parts = id.split('_');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(site_id), Some(name), None) if !site_id.is_empty() && !name.is_empty() => {
            Some((site_id, name))
        }
        _ => None,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BucketModel {
    pub id: Value<String>,
    pub site_id: Value<String>,
    pub name: Value<String>,
    pub created_at: Value<String>,
    pub timeouts: Value<Timeouts>,
}

impl ResourceModel for BucketModel {
    fn timeouts(&self) -> Option<&Timeouts> {
        self.timeouts.as_known()
    }
}

impl BucketModel {
    /// Site and bucket name, falling back to the ID after an import
    fn location(&self) -> (String, String) {
        match (self.site_id.as_known(), self.name.as_known()) {
            (Some(site_id), Some(name)) => (site_id.clone(), name.clone()),
            _ => {
                let id = self.id.value_or_default();
                parse_bucket_id(&id)
                    .map(|(site_id, name)| (site_id.to_string(), name.to_string()))
                    .unwrap_or_default()
            }
        }
    }

    fn flatten(&mut self, bucket: &Bucket) {
        self.id = Value::Known(format!("{}_{}", bucket.site_id, bucket.name));
        self.site_id = Value::known(bucket.site_id.as_str());
        self.name = Value::known(bucket.name.as_str());
        self.created_at = flatten_time(&bucket.created_at);
    }
}

pub struct BucketResource {
    client: ApiClient,
}

impl BucketResource {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    fn api(&self) -> &Arc<dyn ObjectStorageApi> {
        &self.client.services().object_storage
    }
}

#[async_trait]
impl ResourceHandler for BucketResource {
    type Model = BucketModel;

    fn type_suffix(&self) -> &'static str {
        "object_storage_bucket"
    }

    fn schema(&self) -> Schema {
        Schema::new("Manages an Object Storage bucket.")
            .attribute(
                "id",
                Attribute::string()
                    .computed()
                    .description("The ID of the bucket in the form `{site_id}_{name}`"),
            )
            .attribute(
                "site_id",
                Attribute::string()
                    .required()
                    .requires_replace()
                    .description("The ID of the Object Storage site"),
            )
            .attribute(
                "name",
                Attribute::string()
                    .required()
                    .requires_replace()
                    .validator(Validator::LengthBetween(3, 63))
                    .description("The name of the bucket"),
            )
            .attribute(
                "created_at",
                Attribute::string()
                    .computed()
                    .description("The creation date of the bucket"),
            )
            .attribute("timeouts", schema_timeouts())
    }

    fn default_timeout(&self, op: Operation) -> Option<Duration> {
        op.is_mutating().then_some(TIMEOUT_5MIN)
    }

    fn import_state(&self, id: &str) -> Result<Json, Diagnostic> {
        let (site_id, name) = parse_bucket_id(id).ok_or_else(|| {
            Diagnostic::error(
                "Import Error",
                format!(
                    "invalid import ID format. Please specify the import ID in the format of {{site_id}}_{{name}}: {}",
                    id
                ),
            )
        })?;
        Ok(json!({ "id": id, "site_id": site_id, "name": name }))
    }

    async fn create(
        &self,
        ctx: &mut OpContext,
        mut plan: BucketModel,
    ) -> Result<BucketModel, Diagnostic> {
        let (site_id, name) = plan.location();
        let bucket = ctx
            .call(self.api().create_bucket(&site_id, &name))
            .await
            .map_err(|e| {
                Diagnostic::error(
                    "Create: API Error",
                    format!("failed to create bucket {}: {}", name, e),
                )
            })?;
        plan.flatten(&bucket);
        Ok(plan)
    }

    async fn read(
        &self,
        ctx: &mut OpContext,
        mut state: BucketModel,
    ) -> Result<Observed<BucketModel>, Diagnostic> {
        let (site_id, name) = state.location();
        let found = observe(
            ctx.call(self.api().read_bucket(&site_id, &name)).await,
            || format!("bucket[{}_{}]", site_id, name),
        )?;
        Ok(found.map(|bucket| {
            state.flatten(&bucket);
            state
        }))
    }

    /// Every argument forces replacement
    async fn update(
        &self,
        _ctx: &mut OpContext,
        plan: BucketModel,
        _prior: BucketModel,
    ) -> Result<Observed<BucketModel>, Diagnostic> {
        Ok(Observed::Present(plan))
    }

    async fn delete(&self, ctx: &mut OpContext, state: BucketModel) -> Result<(), Diagnostic> {
        let (site_id, name) = state.location();
        match ctx.call(self.api().delete_bucket(&site_id, &name)).await {
            Err(e) if !e.is_not_found() => Err(Diagnostic::error(
                "Delete: API Error",
                format!("failed to delete bucket {}: {}", name, e),
            )),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectModel {
    pub id: Value<String>,
    pub endpoint: Value<String>,
    pub access_key: Value<String>,
    pub secret_key: Value<String>,
    pub bucket: Value<String>,
    pub key: Value<String>,
    pub content: Value<String>,
    /// Local file uploaded instead of `content`
    pub source: Value<String>,
    pub content_type: Value<String>,
    pub cache_control: Value<String>,
    pub user_metadata: Value<BTreeMap<String, String>>,
    pub etag: Value<String>,
    pub size: Value<i64>,
    pub last_modified: Value<String>,
    pub version_id: Value<String>,
    pub storage_class: Value<String>,
    pub timeouts: Value<Timeouts>,
}

impl ResourceModel for ObjectModel {
    fn timeouts(&self) -> Option<&Timeouts> {
        self.timeouts.as_known()
    }
}

impl ObjectModel {
    fn credentials(&self) -> S3Credentials {
        S3Credentials {
            endpoint: self
                .endpoint
                .as_known()
                .cloned()
                .unwrap_or_else(|| DEFAULT_S3_ENDPOINT.to_string()),
            access_key: self.access_key.value_or_default(),
            secret_key: self.secret_key.value_or_default(),
        }
    }

    fn what(&self) -> String {
        format!(
            "object[{}/{}]",
            self.bucket.value_or_default(),
            self.key.value_or_default()
        )
    }

    async fn body(&self) -> std::io::Result<Vec<u8>> {
        match self.source.as_known() {
            Some(path) => tokio::fs::read(path).await,
            None => Ok(self.content.value_or_default().into_bytes()),
        }
    }

    fn flatten(&mut self, info: &ObjectInfo) {
        self.id = Value::Known(format!("{}/{}", self.bucket.value_or_default(), info.key));
        self.key = Value::known(info.key.as_str());
        self.content_type = Value::known(info.content_type.as_str());
        self.etag = Value::known(info.etag.as_str());
        self.size = Value::Known(i64::try_from(info.size).unwrap_or(i64::MAX));
        self.last_modified = flatten_time(&info.last_modified);
        self.version_id = Value::string_or_null(&info.version_id);
        self.storage_class = Value::known(info.storage_class.as_str());
        if !self.endpoint.is_known() {
            self.endpoint = Value::known(DEFAULT_S3_ENDPOINT);
        }
    }
}

pub struct ObjectResource {
    client: ApiClient,
}

impl ObjectResource {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    fn connect(&self, model: &ObjectModel, summary: &str) -> Result<Arc<dyn S3Api>, Diagnostic> {
        let credentials = model.credentials();
        self.client.services().s3.connect(&credentials).map_err(|e| {
            Diagnostic::error(
                summary,
                format!("failed to connect to {}: {}", credentials.endpoint, e),
            )
        })
    }

    /// Upload the object and read back its metadata
    async fn put(
        &self,
        ctx: &mut OpContext,
        model: &mut ObjectModel,
        summary: &str,
    ) -> Result<(), Diagnostic> {
        let s3 = self.connect(model, summary)?;
        let body = model.body().await.map_err(|e| {
            Diagnostic::error(
                summary,
                format!(
                    "failed to read file {}: {}",
                    model.source.value_or_default(),
                    e
                ),
            )
        })?;
        let bucket = model.bucket.value_or_default();
        let key = model.key.value_or_default();
        let request = PutObject {
            bucket: bucket.clone(),
            key: key.clone(),
            body,
            content_type: model
                .content_type
                .as_known()
                .cloned()
                .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()),
            cache_control: model.cache_control.as_known().cloned(),
            user_metadata: model.user_metadata.value_or_default(),
        };
        let failed = |e: sakura_api::ApiError| {
            Diagnostic::error(summary, format!("failed to put {}: {}", model.what(), e))
        };
        ctx.call(s3.put_object(request)).await.map_err(failed)?;
        let info = ctx.call(s3.stat_object(&bucket, &key)).await.map_err(failed)?;
        model.flatten(&info);
        Ok(())
    }
}

#[async_trait]
impl ResourceHandler for ObjectResource {
    type Model = ObjectModel;

    fn type_suffix(&self) -> &'static str {
        "object_storage_object"
    }

    fn schema(&self) -> Schema {
        let computed = |text: &str| Attribute::string().computed().description(text);
        Schema::new("Manages an object in an Object Storage bucket.")
            .attribute("id", schema_id("object"))
            .attribute(
                "endpoint",
                Attribute::string()
                    .default_value(DEFAULT_S3_ENDPOINT)
                    .description("The S3-compatible endpoint of the Object Storage site"),
            )
            .attribute(
                "access_key",
                Attribute::string()
                    .required()
                    .sensitive()
                    .description("The access key for the bucket"),
            )
            .attribute(
                "secret_key",
                Attribute::string()
                    .required()
                    .sensitive()
                    .description("The secret key for the bucket"),
            )
            .attribute(
                "bucket",
                Attribute::string()
                    .required()
                    .requires_replace()
                    .description("The name of the bucket"),
            )
            .attribute(
                "key",
                Attribute::string()
                    .required()
                    .requires_replace()
                    .description("The key of the object"),
            )
            .attribute(
                "content",
                Attribute::string()
                    .optional()
                    .description("The literal content of the object. Conflicts with `source`"),
            )
            .attribute(
                "source",
                Attribute::string()
                    .optional()
                    .description("The path of a local file to upload. Conflicts with `content`"),
            )
            .attribute(
                "content_type",
                Attribute::string()
                    .default_value(DEFAULT_CONTENT_TYPE)
                    .description("The content type of the object"),
            )
            .attribute(
                "cache_control",
                Attribute::string()
                    .optional()
                    .description("The Cache-Control header of the object"),
            )
            .attribute(
                "user_metadata",
                Attribute::map_of(AttributeKind::String)
                    .optional()
                    .description("User-defined metadata stored with the object"),
            )
            .attribute("etag", computed("The ETag of the object"))
            .attribute(
                "size",
                Attribute::int()
                    .computed()
                    .description("The size of the object in bytes"),
            )
            .attribute("last_modified", computed("The last modification date of the object"))
            .attribute("version_id", computed("The version ID of the object"))
            .attribute("storage_class", computed("The storage class of the object"))
            .attribute("timeouts", schema_timeouts())
    }

    fn default_timeout(&self, op: Operation) -> Option<Duration> {
        op.is_mutating().then_some(TIMEOUT_5MIN)
    }

    fn validate(&self, model: &ObjectModel, diags: &mut Diagnostics) {
        if !model.content.is_null() && !model.source.is_null() {
            diags.push(
                Diagnostic::error(
                    "Conflicting Attributes",
                    "only one of `content` or `source` can be specified",
                )
                .with_attribute("source"),
            );
        }
    }

    async fn create(
        &self,
        ctx: &mut OpContext,
        mut plan: ObjectModel,
    ) -> Result<ObjectModel, Diagnostic> {
        self.put(ctx, &mut plan, "Create: API Error").await?;
        Ok(plan)
    }

    async fn read(
        &self,
        ctx: &mut OpContext,
        mut state: ObjectModel,
    ) -> Result<Observed<ObjectModel>, Diagnostic> {
        let s3 = self.connect(&state, "Read: API Error")?;
        let bucket = state.bucket.value_or_default();
        let key = state.key.value_or_default();
        let found = observe(ctx.call(s3.stat_object(&bucket, &key)).await, || state.what())?;
        Ok(found.map(|info| {
            state.flatten(&info);
            state
        }))
    }

    async fn update(
        &self,
        ctx: &mut OpContext,
        mut plan: ObjectModel,
        _prior: ObjectModel,
    ) -> Result<Observed<ObjectModel>, Diagnostic> {
        self.put(ctx, &mut plan, "Update: API Error").await?;
        Ok(Observed::Present(plan))
    }

    async fn delete(&self, ctx: &mut OpContext, state: ObjectModel) -> Result<(), Diagnostic> {
        let s3 = self.connect(&state, "Delete: API Error")?;
        let bucket = state.bucket.value_or_default();
        let key = state.key.value_or_default();
        let version_id = state.version_id.as_str().filter(|v| !v.is_empty());
        match ctx.call(s3.delete_object(&bucket, &key, version_id)).await {
            Err(e) if !e.is_not_found() => Err(Diagnostic::error(
                "Delete: API Error",
                format!("failed to delete {}: {}", state.what(), e),
            )),
            _ => Ok(()),
        }
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

    #[test]
    fn test_parse_bucket_id() {
        assert_eq!(parse_bucket_id("isk01_my-bucket"), Some(("isk01", "my-bucket")));
        assert_eq!(parse_bucket_id("isk01"), None);
        assert_eq!(parse_bucket_id("a_b_c"), None);
        assert_eq!(parse_bucket_id("_b"), None);
    }

    #[test]
    fn test_import_rejects_malformed_id() {
        let resource = BucketResource::new(test_client(&FakeCloud::new()));
        let diag = resource.import_state("my-bucket").unwrap_err();
        assert_eq!(diag.summary, "Import Error");
        assert!(diag.detail.ends_with(": my-bucket"));

        let initial = resource.import_state("isk01_my-bucket").unwrap();
        assert_eq!(initial["site_id"], "isk01");
        assert_eq!(initial["name"], "my-bucket");
    }

    #[tokio::test]
    async fn test_bucket_lifecycle() {
        let fake = FakeCloud::new();
        let resource = BucketResource::new(test_client(&fake));
        let plan = BucketModel {
            site_id: Value::known("isk01"),
            name: Value::known("my-bucket"),
            ..Default::default()
        };
        let created = resource.create(&mut ctx(Operation::Create), plan).await.unwrap();
        assert_eq!(created.id, Value::known("isk01_my-bucket"));

        let imported = BucketModel {
            id: Value::known("isk01_my-bucket"),
            ..Default::default()
        };
        let read = resource
            .read(&mut ctx(Operation::Read), imported)
            .await
            .unwrap()
            .present()
            .unwrap();
        assert_eq!(read.name, Value::known("my-bucket"));

        resource.delete(&mut ctx(Operation::Delete), created.clone()).await.unwrap();
        assert!(resource
            .read(&mut ctx(Operation::Read), created)
            .await
            .unwrap()
            .is_gone());
    }

    async fn bucket(fake: &FakeCloud) {
        BucketResource::new(test_client(fake))
            .create(
                &mut ctx(Operation::Create),
                BucketModel {
                    site_id: Value::known("isk01"),
                    name: Value::known("assets"),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
    }

    fn object_plan() -> ObjectModel {
        ObjectModel {
            access_key: Value::known("access"),
            secret_key: Value::known("secret"),
            bucket: Value::known("assets"),
            key: Value::known("index.html"),
            content: Value::known("<html></html>"),
            content_type: Value::known("text/html"),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_object_put_and_stat() {
        let fake = FakeCloud::new();
        bucket(&fake).await;
        let resource = ObjectResource::new(test_client(&fake));

        let created = resource
            .create(&mut ctx(Operation::Create), object_plan())
            .await
            .unwrap();
        assert_eq!(created.id, Value::known("assets/index.html"));
        assert_eq!(created.size, Value::Known(13));
        assert_eq!(created.version_id, Value::Null);
        assert_eq!(created.endpoint, Value::known(DEFAULT_S3_ENDPOINT));
        assert_eq!(
            fake.object_body("assets", "index.html").unwrap(),
            b"<html></html>".to_vec()
        );

        resource.delete(&mut ctx(Operation::Delete), created).await.unwrap();
        assert!(fake.object_body("assets", "index.html").is_none());
    }

    #[tokio::test]
    async fn test_object_from_source_file() {
        let fake = FakeCloud::new();
        bucket(&fake).await;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("robots.txt");
        std::fs::write(&path, "User-agent: *\n").unwrap();

        let plan = ObjectModel {
            content: Value::Null,
            source: Value::Known(path.display().to_string()),
            key: Value::known("robots.txt"),
            ..object_plan()
        };
        let resource = ObjectResource::new(test_client(&fake));
        resource.create(&mut ctx(Operation::Create), plan).await.unwrap();
        assert_eq!(
            fake.object_body("assets", "robots.txt").unwrap(),
            b"User-agent: *\n".to_vec()
        );
    }

    #[tokio::test]
    async fn test_object_requires_credentials() {
        let fake = FakeCloud::new();
        bucket(&fake).await;
        let plan = ObjectModel {
            secret_key: Value::known(""),
            ..object_plan()
        };
        let diag = ObjectResource::new(test_client(&fake))
            .create(&mut ctx(Operation::Create), plan)
            .await
            .unwrap_err();
        assert_eq!(diag.summary, "Create: API Error");
        assert_eq!(fake.call_count("object.put"), 0);
    }

    #[test]
    fn test_content_conflicts_with_source() {
        let resource = ObjectResource::new(test_client(&FakeCloud::new()));
        let mut diags = Diagnostics::new();
        let model = ObjectModel {
            source: Value::known("/tmp/file"),
            ..object_plan()
        };
        resource.validate(&model, &mut diags);
        assert!(diags.has_error());
    }
}
