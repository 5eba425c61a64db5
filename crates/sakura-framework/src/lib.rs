//! Sakura Cloud provider framework
//!
//! Building blocks shared by every resource type of the provider: tri-state
//! attribute values, diagnostics, schemas with plan-time validation, the keyed
//! lock service, operation deadlines and the generic reconcile workflow.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                 Host (plan/apply)                │
//! └─────────────────┬───────────────────────────────┘
//!                   │ JSON plan / state
//! ┌─────────────────▼───────────────────────────────┐
//! │               sakura-framework                   │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │  Reconciler<R: ResourceHandler>           │   │
//! │  │  decode → lock → deadline → handler       │   │
//! │  └──────────────────────────────────────────┘   │
//! │  ┌──────────────┐  ┌──────────────┐            │
//! │  │ Schema/Valid │  │  KeyedLock   │            │
//! │  └──────────────┘  └──────────────┘            │
//! └───────┬─────────────────────────────────────────┘
//!         │ expand / flatten
//! ┌───────▼───────┐
//! │  sakura-api   │
//! │ vendor traits │
//! └───────────────┘
//! ```

pub mod data_source;
pub mod diag;
pub mod error;
pub mod filter;
pub mod lock;
pub mod operation;
pub mod resource;
pub mod schema;
pub mod state;
pub mod timeouts;
pub mod validator;
pub mod value;

// Re-exports
pub use data_source::{DataSource, DataSourceHandler, DataSourceRunner};
pub use diag::{Diagnostic, Diagnostics, Severity};
pub use error::{FrameworkError, NotFound, Result};
pub use filter::{FilterError, Named, filter_by_name};
pub use lock::{KeyGuard, KeyedLock, MutexKv, NoopLock};
pub use operation::Operation;
pub use resource::{
    Observed, OpContext, Planned, Reconciler, Resource, ResourceHandler, ResourceModel, Response,
    observe,
};
pub use schema::{Attribute, AttributeKind, Schema};
pub use state::State;
pub use timeouts::{
    Deadline, DeadlineExceeded, TIMEOUT_5MIN, TIMEOUT_20MIN, TIMEOUT_24HOUR, TIMEOUT_60MIN,
    Timeouts, parse_duration,
};
pub use validator::{IpVersion, Validator};
pub use value::{UNKNOWN_SENTINEL, Value};
