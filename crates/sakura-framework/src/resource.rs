//! Managed resources and the shared reconcile workflow
//!
//! Resource types implement [`ResourceHandler`] over a typed model. The
//! [`Reconciler`] wraps a handler and turns it into a host-facing
//! [`Resource`]: it decodes plan and state, takes the keyed lock, sets up the
//! deadline, removes vanished objects from state and collects diagnostics.

use crate::diag::{Diagnostic, Diagnostics};
use crate::error::NotFound;
use crate::lock::{KeyGuard, KeyedLock};
use crate::operation::Operation;
use crate::schema::Schema;
use crate::state::State;
use crate::timeouts::{Deadline, DeadlineExceeded, TIMEOUT_20MIN, Timeouts};
use crate::value::UNKNOWN_SENTINEL;
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as Json;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Typed model of one resource instance
///
/// Built fresh for every request, mutated by flatten, then discarded.
pub trait ResourceModel: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// User supplied `timeouts` block
    fn timeouts(&self) -> Option<&Timeouts> {
        None
    }
}

/// Result of looking up a remote object
#[derive(Debug, Clone, PartialEq)]
pub enum Observed<T> {
    Present(T),
    /// The remote object no longer exists
    Gone,
}

impl<T> Observed<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Observed<U> {
        match self {
            Observed::Present(v) => Observed::Present(f(v)),
            Observed::Gone => Observed::Gone,
        }
    }

    pub fn present(self) -> Option<T> {
        match self {
            Observed::Present(v) => Some(v),
            Observed::Gone => None,
        }
    }

    pub fn is_gone(&self) -> bool {
        matches!(self, Observed::Gone)
    }
}

/// Classify a vendor read result
///
/// Not-found becomes [`Observed::Gone`]; any other failure is an
/// "API Read Error" naming `what`.
pub fn observe<T, E>(
    result: Result<T, E>,
    what: impl FnOnce() -> String,
) -> Result<Observed<T>, Diagnostic>
where
    E: NotFound + std::fmt::Display,
{
    match result {
        Ok(v) => Ok(Observed::Present(v)),
        Err(e) if e.is_not_found() => Ok(Observed::Gone),
        Err(e) => Err(Diagnostic::error(
            "API Read Error",
            format!("could not read {}: {}", what(), e),
        )),
    }
}

/// Per-operation context handed to handlers
#[derive(Debug)]
pub struct OpContext {
    operation: Operation,
    deadline: Deadline,
    diagnostics: Diagnostics,
    partial: Option<State>,
}

impl OpContext {
    pub fn new(operation: Operation, deadline: Deadline) -> Self {
        Self {
            operation,
            deadline,
            diagnostics: Diagnostics::new(),
            partial: None,
        }
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn deadline(&self) -> &Deadline {
        &self.deadline
    }

    /// Run a vendor call under the operation deadline
    pub async fn call<F, T, E>(&self, fut: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: From<DeadlineExceeded>,
    {
        self.deadline.run(fut).await
    }

    pub fn warn(&mut self, summary: impl Into<String>, detail: impl Into<String>) {
        self.diagnostics.add_warning(summary, detail);
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Remember a remote object that exists even if later steps fail
    ///
    /// When the handler then returns an error, this model is written to
    /// state so the host can taint and replace it.
    pub fn keep_partial<M: Serialize>(&mut self, model: &M) {
        let mut state = State::empty();
        match state.set_partial(model) {
            Ok(()) => self.partial = Some(state),
            Err(e) => tracing::warn!("Failed to record partial state: {}", e),
        }
    }
}

/// Typed handlers of one resource type
#[async_trait]
pub trait ResourceHandler: Send + Sync + 'static {
    type Model: ResourceModel;

    /// Type name without the provider prefix, e.g. `bridge`
    fn type_suffix(&self) -> &'static str;

    fn schema(&self) -> Schema;

    /// Budget used when the `timeouts` block does not set one
    ///
    /// `None` means unbounded.
    fn default_timeout(&self, op: Operation) -> Option<Duration> {
        op.is_mutating().then_some(TIMEOUT_20MIN)
    }

    /// Key of the remote object to serialize `op` on, if any
    fn lock_key(&self, _op: Operation, _model: &Self::Model) -> Option<String> {
        None
    }

    /// Cross-attribute checks beyond what the schema expresses
    fn validate(&self, _model: &Self::Model, _diags: &mut Diagnostics) {}

    /// Initial state for `import`; Read fills in the rest
    fn import_state(&self, id: &str) -> Result<Json, Diagnostic> {
        Ok(serde_json::json!({ "id": id }))
    }

    async fn create(
        &self,
        ctx: &mut OpContext,
        plan: Self::Model,
    ) -> Result<Self::Model, Diagnostic>;

    async fn read(
        &self,
        ctx: &mut OpContext,
        state: Self::Model,
    ) -> Result<Observed<Self::Model>, Diagnostic>;

    async fn update(
        &self,
        ctx: &mut OpContext,
        plan: Self::Model,
        prior: Self::Model,
    ) -> Result<Observed<Self::Model>, Diagnostic>;

    /// Delete the remote object; already gone counts as success
    async fn delete(&self, ctx: &mut OpContext, state: Self::Model) -> Result<(), Diagnostic>;
}

/// Outcome of one host call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Response {
    pub state: State,
    pub diagnostics: Diagnostics,
}

impl Response {
    fn with_state(state: State) -> Self {
        Self {
            state,
            diagnostics: Diagnostics::new(),
        }
    }

    pub(crate) fn error(mut self, diagnostic: Diagnostic) -> Self {
        self.diagnostics.push(diagnostic);
        self
    }

    pub(crate) fn write<M: Serialize>(&mut self, model: &M) {
        if let Err(e) = self.state.set(model) {
            self.diagnostics
                .add_error("State Write Error", format!("could not store state: {}", e));
        }
    }

    pub fn has_error(&self) -> bool {
        self.diagnostics.has_error()
    }
}

/// Host-facing resource
#[async_trait]
pub trait Resource: Send + Sync {
    /// Type name without the provider prefix
    fn type_suffix(&self) -> &'static str;

    fn type_name(&self, provider: &str) -> String {
        format!("{}_{}", provider, self.type_suffix())
    }

    fn schema(&self) -> Schema;

    /// Plan-time validation of user configuration
    fn validate_config(&self, config: &Json) -> Diagnostics;

    /// Planned state for `config`; `prior` is the current state, if any
    fn plan(&self, config: &Json, prior: Option<&Json>) -> Result<Planned, Diagnostics>;

    async fn create(&self, plan: Json) -> Response;

    async fn read(&self, state: Json) -> Response;

    async fn update(&self, plan: Json, prior: Json) -> Response;

    async fn delete(&self, state: Json) -> Response;

    async fn import_state(&self, id: &str) -> Response;
}

/// Result of planning a change
#[derive(Debug, Clone)]
pub struct Planned {
    pub state: Json,
    /// A replace-triggering attribute differs from the prior state
    pub requires_replace: bool,
    pub diagnostics: Diagnostics,
}

fn decode<M: DeserializeOwned>(value: &Json, what: &str) -> Result<M, Diagnostic> {
    serde_json::from_value(value.clone()).map_err(|e| {
        Diagnostic::error(
            format!("Invalid {}", what),
            format!("could not decode {}: {}", what, e),
        )
    })
}

/// Generic reconcile workflow around a [`ResourceHandler`]
pub struct Reconciler<R> {
    handler: R,
    locks: Arc<dyn KeyedLock>,
}

impl<R: ResourceHandler> Reconciler<R> {
    pub fn new(handler: R, locks: Arc<dyn KeyedLock>) -> Self {
        Self { handler, locks }
    }

    pub fn handler(&self) -> &R {
        &self.handler
    }

    fn context(&self, op: Operation, model: &R::Model) -> OpContext {
        let default = self.handler.default_timeout(op);
        let budget = match model.timeouts() {
            Some(timeouts) => timeouts.resolve(op, default),
            None => default,
        };
        OpContext::new(op, Deadline::from_budget(budget))
    }

    async fn lock(&self, op: Operation, model: &R::Model) -> Option<KeyGuard> {
        let key = self.handler.lock_key(op, model)?;
        Some(self.locks.lock(&key).await)
    }

    fn finish(&self, mut response: Response, ctx: OpContext) -> Response {
        let OpContext {
            diagnostics,
            partial,
            ..
        } = ctx;
        let failed = response.has_error();
        response.diagnostics.append(diagnostics);
        if failed {
            if let Some(partial) = partial {
                response.state = partial;
            }
        }
        response
    }

    fn removed(&self, mut response: Response, op: Operation, prior: &Json) -> Response {
        let id = prior.get("id").and_then(Json::as_str).unwrap_or_default();
        tracing::info!(
            "{} [{}] not found during {}, removing from state",
            self.handler.type_suffix(),
            id,
            op
        );
        response.state.remove_resource();
        response
    }
}

#[async_trait]
impl<R: ResourceHandler> Resource for Reconciler<R> {
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
        match decode::<R::Model>(config, "configuration") {
            Ok(model) => self.handler.validate(&model, &mut diags),
            Err(d) => diags.push(d),
        }
        diags
    }

    fn plan(&self, config: &Json, prior: Option<&Json>) -> Result<Planned, Diagnostics> {
        let diagnostics = self.validate_config(config);
        if diagnostics.has_error() {
            return Err(diagnostics);
        }
        let schema = self.handler.schema();
        let requires_replace = prior.is_some_and(|prior| {
            schema.replace_triggers().any(|name| {
                config
                    .get(name)
                    .filter(|v| !v.is_null() && v.as_str() != Some(UNKNOWN_SENTINEL))
                    .is_some_and(|v| prior.get(name) != Some(v))
            })
        });
        let state = match prior {
            Some(prior) if !requires_replace => schema.plan_update(config, prior)?,
            _ => schema.plan_create(config)?,
        };
        Ok(Planned {
            state,
            requires_replace,
            diagnostics,
        })
    }

    async fn create(&self, plan: Json) -> Response {
        let mut response = Response::default();
        let model: R::Model = match decode(&plan, "plan") {
            Ok(m) => m,
            Err(d) => return response.error(d),
        };
        let mut ctx = self.context(Operation::Create, &model);
        let _guard = self.lock(Operation::Create, &model).await;

        tracing::debug!("Creating {}", self.handler.type_suffix());
        match self.handler.create(&mut ctx, model).await {
            Ok(created) => response.write(&created),
            Err(d) => response.diagnostics.push(d),
        }
        self.finish(response, ctx)
    }

    async fn read(&self, state: Json) -> Response {
        let mut response = Response::with_state(State::from_json(state.clone()));
        let model: R::Model = match decode(&state, "state") {
            Ok(m) => m,
            Err(d) => return response.error(d),
        };
        let mut ctx = self.context(Operation::Read, &model);

        match self.handler.read(&mut ctx, model).await {
            Ok(Observed::Present(current)) => response.write(&current),
            Ok(Observed::Gone) => response = self.removed(response, Operation::Read, &state),
            Err(d) => response.diagnostics.push(d),
        }
        self.finish(response, ctx)
    }

    async fn update(&self, plan: Json, prior: Json) -> Response {
        let mut response = Response::with_state(State::from_json(prior.clone()));
        let planned: R::Model = match decode(&plan, "plan") {
            Ok(m) => m,
            Err(d) => return response.error(d),
        };
        let prior_model: R::Model = match decode(&prior, "state") {
            Ok(m) => m,
            Err(d) => return response.error(d),
        };
        let mut ctx = self.context(Operation::Update, &planned);
        let _guard = self.lock(Operation::Update, &planned).await;

        match self.handler.update(&mut ctx, planned, prior_model).await {
            Ok(Observed::Present(current)) => response.write(&current),
            Ok(Observed::Gone) => response = self.removed(response, Operation::Update, &prior),
            Err(d) => response.diagnostics.push(d),
        }
        self.finish(response, ctx)
    }

    async fn delete(&self, state: Json) -> Response {
        let mut response = Response::with_state(State::from_json(state.clone()));
        let model: R::Model = match decode(&state, "state") {
            Ok(m) => m,
            Err(d) => return response.error(d),
        };
        let mut ctx = self.context(Operation::Delete, &model);
        let _guard = self.lock(Operation::Delete, &model).await;

        match self.handler.delete(&mut ctx, model).await {
            Ok(()) => response.state.remove_resource(),
            Err(d) => response.diagnostics.push(d),
        }
        self.finish(response, ctx)
    }

    async fn import_state(&self, id: &str) -> Response {
        match self.handler.import_state(id) {
            Ok(initial) => self.read(initial).await,
            Err(d) => Response::default().error(d),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lock::MutexKv;
    use crate::schema::Attribute;
    use crate::value::Value;
    use serde::Deserialize;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Debug, thiserror::Error)]
    enum StubError {
        #[error("not found")]
        NotFound,
        #[error("quota exceeded")]
        Quota,
        #[error(transparent)]
        Deadline(#[from] DeadlineExceeded),
    }

    impl NotFound for StubError {
        fn is_not_found(&self) -> bool {
            matches!(self, StubError::NotFound)
        }
    }

    #[derive(Debug, Default, Clone, Serialize, Deserialize)]
    #[serde(default)]
    struct WidgetModel {
        id: Value<String>,
        name: Value<String>,
        timeouts: Value<Timeouts>,
    }

    impl ResourceModel for WidgetModel {
        fn timeouts(&self) -> Option<&Timeouts> {
            self.timeouts.as_known()
        }
    }

    #[derive(Default)]
    struct WidgetHandler {
        remote: Mutex<HashMap<String, String>>,
        fail_read: Mutex<bool>,
        slow: bool,
    }

    impl WidgetHandler {
        async fn fetch(&self, id: &str) -> Result<String, StubError> {
            if self.slow {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            if *self.fail_read.lock().unwrap() {
                return Err(StubError::Quota);
            }
            self.remote
                .lock()
                .unwrap()
                .get(id)
                .cloned()
                .ok_or(StubError::NotFound)
        }
    }

    #[async_trait]
    impl ResourceHandler for WidgetHandler {
        type Model = WidgetModel;

        fn type_suffix(&self) -> &'static str {
            "widget"
        }

        fn schema(&self) -> Schema {
            Schema::new("widget")
                .attribute("id", Attribute::string().computed())
                .attribute("name", Attribute::string().required().requires_replace())
                .attribute("note", Attribute::string().optional())
        }

        async fn create(
            &self,
            _ctx: &mut OpContext,
            mut plan: WidgetModel,
        ) -> Result<WidgetModel, Diagnostic> {
            let id = "100".to_string();
            self.remote
                .lock()
                .unwrap()
                .insert(id.clone(), plan.name.value_or_default());
            plan.id = Value::Known(id);
            Ok(plan)
        }

        async fn read(
            &self,
            ctx: &mut OpContext,
            mut state: WidgetModel,
        ) -> Result<Observed<WidgetModel>, Diagnostic> {
            let id = state.id.value_or_default();
            let found = observe(ctx.call(self.fetch(&id)).await, || format!("widget[{}]", id))?;
            Ok(found.map(|name| {
                state.name = Value::Known(name);
                state
            }))
        }

        async fn update(
            &self,
            ctx: &mut OpContext,
            plan: WidgetModel,
            _prior: WidgetModel,
        ) -> Result<Observed<WidgetModel>, Diagnostic> {
            self.read(ctx, plan).await
        }

        async fn delete(&self, ctx: &mut OpContext, state: WidgetModel) -> Result<(), Diagnostic> {
            let id = state.id.value_or_default();
            if observe(ctx.call(self.fetch(&id)).await, || id.clone())?.is_gone() {
                return Ok(());
            }
            self.remote.lock().unwrap().remove(&id);
            Ok(())
        }
    }

    fn reconciler(handler: WidgetHandler) -> Reconciler<WidgetHandler> {
        Reconciler::new(handler, Arc::new(MutexKv::new()))
    }

    #[tokio::test]
    async fn test_create_writes_state() {
        let r = reconciler(WidgetHandler::default());
        let resp = r.create(json!({"name": "foo", "id": crate::value::UNKNOWN_SENTINEL})).await;
        assert!(!resp.has_error(), "{:?}", resp.diagnostics);
        assert_eq!(resp.state.get_attribute::<String>("id").as_deref(), Some("100"));
        assert_eq!(r.type_name("sakura"), "sakura_widget");
    }

    #[tokio::test]
    async fn test_read_not_found_removes_state() {
        let r = reconciler(WidgetHandler::default());
        let resp = r.read(json!({"id": "404", "name": "gone"})).await;
        assert!(resp.diagnostics.is_empty());
        assert!(resp.state.is_removed());
    }

    #[tokio::test]
    async fn test_read_error_keeps_state() {
        let handler = WidgetHandler::default();
        *handler.fail_read.lock().unwrap() = true;
        let r = reconciler(handler);
        let resp = r.read(json!({"id": "100", "name": "foo"})).await;
        assert!(resp.has_error());
        assert_eq!(resp.diagnostics.iter().next().unwrap().summary, "API Read Error");
        assert!(!resp.state.is_removed());
    }

    #[tokio::test]
    async fn test_delete_of_gone_object_succeeds() {
        let r = reconciler(WidgetHandler::default());
        let resp = r.delete(json!({"id": "404"})).await;
        assert!(resp.diagnostics.is_empty());
        assert!(resp.state.is_removed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_configured_timeout_bounds_read() {
        let r = reconciler(WidgetHandler {
            slow: true,
            ..Default::default()
        });
        let resp = r
            .read(json!({"id": "100", "timeouts": {"read": "1s"}}))
            .await;
        let diag = resp.diagnostics.iter().next().unwrap();
        assert_eq!(diag.summary, "API Read Error");
        assert!(diag.detail.contains("context deadline exceeded"));
    }

    #[tokio::test]
    async fn test_import_passes_id_through() {
        let handler = WidgetHandler::default();
        handler
            .remote
            .lock()
            .unwrap()
            .insert("7".to_string(), "imported".to_string());
        let r = reconciler(handler);
        let resp = r.import_state("7").await;
        assert_eq!(
            resp.state.get_attribute::<String>("name").as_deref(),
            Some("imported")
        );
    }

    #[test]
    fn test_plan_create_marks_computed_unknown() {
        let r = reconciler(WidgetHandler::default());
        let planned = r.plan(&json!({"name": "foo"}), None).unwrap();
        assert_eq!(planned.state["id"], json!(UNKNOWN_SENTINEL));
        assert_eq!(planned.state["name"], json!("foo"));
        assert!(!planned.requires_replace);
    }

    #[test]
    fn test_plan_update_keeps_prior_and_detects_replace() {
        let r = reconciler(WidgetHandler::default());
        let prior = json!({"id": "100", "name": "foo"});

        let planned = r.plan(&json!({"name": "foo", "note": "n"}), Some(&prior)).unwrap();
        assert!(!planned.requires_replace);
        assert_eq!(planned.state["id"], json!("100"));
        assert_eq!(planned.state["note"], json!("n"));

        let planned = r.plan(&json!({"name": "bar"}), Some(&prior)).unwrap();
        assert!(planned.requires_replace);
        assert_eq!(planned.state["id"], json!(UNKNOWN_SENTINEL));
    }

    #[test]
    fn test_plan_rejects_invalid_config() {
        let r = reconciler(WidgetHandler::default());
        let diags = r.plan(&json!({"unexpected": 1}), None).unwrap_err();
        assert!(diags.has_error());
    }

    #[tokio::test]
    async fn test_undecodable_plan_is_reported() {
        let r = reconciler(WidgetHandler::default());
        let resp = r.create(json!({"name": 42})).await;
        assert_eq!(resp.diagnostics.iter().next().unwrap().summary, "Invalid plan");
    }
}
