//! Shared API client handle
//!
//! Built once from the provider configuration and shared read-only by every
//! resource.

use crate::config::Config;
use sakura_api::{
    ApiError, BridgeApi, CloudHsmApi, KmsApi, LoadBalancerApi, LocalRouterApi, NoteApi,
    ObjectStorageApi, ProxyLbApi, S3ClientFactory, SshKeyApi,
};
use sakura_framework::{Diagnostic, OpContext, Value};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

pub const DELETION_WAITER_TIMEOUT: Duration = Duration::from_secs(30 * 60);
pub const DELETION_WAITER_POLLING_INTERVAL: Duration = Duration::from_secs(5);

/// One client per vendor service
#[derive(Clone)]
pub struct Services {
    pub bridge: Arc<dyn BridgeApi>,
    pub ssh_key: Arc<dyn SshKeyApi>,
    pub note: Arc<dyn NoteApi>,
    pub local_router: Arc<dyn LocalRouterApi>,
    pub load_balancer: Arc<dyn LoadBalancerApi>,
    pub proxy_lb: Arc<dyn ProxyLbApi>,
    pub cloudhsm: Arc<dyn CloudHsmApi>,
    pub kms: Arc<dyn KmsApi>,
    pub object_storage: Arc<dyn ObjectStorageApi>,
    pub s3: Arc<dyn S3ClientFactory>,
}

impl Services {
    /// Every service backed by the same implementation
    pub fn from_backend<T>(backend: Arc<T>) -> Self
    where
        T: BridgeApi
            + SshKeyApi
            + NoteApi
            + LocalRouterApi
            + LoadBalancerApi
            + ProxyLbApi
            + CloudHsmApi
            + KmsApi
            + ObjectStorageApi
            + S3ClientFactory
            + 'static,
    {
        Self {
            bridge: backend.clone(),
            ssh_key: backend.clone(),
            note: backend.clone(),
            local_router: backend.clone(),
            load_balancer: backend.clone(),
            proxy_lb: backend.clone(),
            cloudhsm: backend.clone(),
            kms: backend.clone(),
            object_storage: backend.clone(),
            s3: backend,
        }
    }
}

/// Configured API client handle
#[derive(Clone)]
pub struct ApiClient {
    services: Services,
    default_zone: String,
    zones: Vec<String>,
    deletion_waiter_timeout: Duration,
    deletion_waiter_polling_interval: Duration,
}

impl ApiClient {
    pub fn new(config: &Config, services: Services) -> Self {
        Self {
            services,
            default_zone: config.zone.clone(),
            zones: config.effective_zones(),
            deletion_waiter_timeout: DELETION_WAITER_TIMEOUT,
            deletion_waiter_polling_interval: DELETION_WAITER_POLLING_INTERVAL,
        }
    }

    /// Override the deletion waiter
    pub fn with_deletion_waiter(mut self, timeout: Duration, interval: Duration) -> Self {
        self.deletion_waiter_timeout = timeout;
        self.deletion_waiter_polling_interval = interval;
        self
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    pub fn default_zone(&self) -> &str {
        &self.default_zone
    }

    pub fn zones(&self) -> &[String] {
        &self.zones
    }

    /// Zone for a resource
    ///
    /// Null or unknown falls back to the default zone.
    pub fn zone(&self, zone: &Value<String>) -> Result<String, Diagnostic> {
        let Some(z) = zone.as_known() else {
            return Ok(self.default_zone.clone());
        };
        if self.zones.iter().any(|allowed| allowed == z) {
            Ok(z.clone())
        } else {
            Err(Diagnostic::error(
                "Get zone error",
                format!("zone: {:?} is not in {:?}", z, self.zones),
            )
            .with_attribute("zone"))
        }
    }

    /// Retry a delete while the object is still referenced
    ///
    /// A conflict means something still points at the object; retry every
    /// polling interval until the waiter timeout.
    pub async fn delete_while_referenced<F, Fut>(
        &self,
        ctx: &OpContext,
        mut delete: F,
    ) -> Result<(), ApiError>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<(), ApiError>> + Send,
    {
        let started = tokio::time::Instant::now();
        loop {
            match ctx.call(delete()).await {
                Err(ApiError::Conflict(reason))
                    if started.elapsed() < self.deletion_waiter_timeout =>
                {
                    tracing::debug!("Still referenced, retrying delete: {}", reason);
                    tokio::time::sleep(self.deletion_waiter_polling_interval).await;
                }
                other => return other,
            }
        }
    }
}
