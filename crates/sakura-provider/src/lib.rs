//! Sakura Cloud resource provider
//!
//! Declarative management of Sakura Cloud resources: each resource type maps
//! between a typed model and the vendor API, and is driven through the
//! generic reconcile workflow of `sakura-framework`.
//!
//! # Resources
//!
//! - **Networking**: bridges, local routers, network load balancers, Enhanced
//!   LB ACME settings
//! - **Security**: SSH keys, CloudHSM appliances and clients, KMS keys
//! - **Storage**: object storage buckets and objects
//! - **Misc**: notes / startup scripts
//!
//! # Example
//!
//! ```no_run
//! use sakura_api::FakeCloud;
//! use sakura_provider::{Config, SakuraProvider, Services};
//! use std::sync::Arc;
//!
//! let services = Services::from_backend(Arc::new(FakeCloud::new()));
//! let provider = SakuraProvider::configure(Config::default(), services)?;
//! let bridge = provider.resource("sakura_bridge");
//! # Ok::<(), sakura_provider::ConfigError>(())
//! ```

pub mod client;
pub mod common;
pub mod config;
pub mod error;
pub mod logging;
pub mod provider;
pub mod service;

// Re-exports
pub use client::{ApiClient, Services};
pub use config::Config;
pub use error::{ConfigError, Result};
pub use logging::init_logging;
pub use provider::{PROVIDER_NAME, SakuraProvider};
pub use service::cloudhsm::filter_cloud_hsm_by_name;
