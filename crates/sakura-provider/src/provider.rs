//! Provider registry
//!
//! Maps full type names such as `sakura_bridge` to their reconcilers. Every
//! resource shares one API client and one lock service.

use crate::client::{ApiClient, Services};
use crate::config::Config;
use crate::error::Result;
use crate::logging::init_logging;
use crate::service::bridge::{BridgeDataSource, BridgeResource};
use crate::service::cloudhsm::{CloudHsmDataSource, CloudHsmResource};
use crate::service::cloudhsm_client::CloudHsmClientResource;
use crate::service::enhanced_lb_acme::EnhancedLbAcmeResource;
use crate::service::kms::{KmsDataSource, KmsResource};
use crate::service::local_router::{LocalRouterDataSource, LocalRouterResource};
use crate::service::nlb::NlbResource;
use crate::service::note::{NoteDataSource, NoteKind, NoteResource};
use crate::service::object_storage::{BucketResource, ObjectResource};
use crate::service::ssh_key::{SshKeyDataSource, SshKeyResource};
use sakura_framework::{
    DataSource, DataSourceHandler, DataSourceRunner, KeyedLock, MutexKv, Reconciler, Resource,
    ResourceHandler,
};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Prefix of every type name
pub const PROVIDER_NAME: &str = "sakura";

pub struct SakuraProvider {
    client: ApiClient,
    resources: BTreeMap<String, Arc<dyn Resource>>,
    data_sources: BTreeMap<String, Arc<dyn DataSource>>,
}

impl SakuraProvider {
    pub fn new(client: ApiClient, locks: Arc<dyn KeyedLock>) -> Self {
        let mut provider = Self {
            client: client.clone(),
            resources: BTreeMap::new(),
            data_sources: BTreeMap::new(),
        };

        provider.register_resource(BridgeResource::new(client.clone()), &locks);
        provider.register_resource(SshKeyResource::new(client.clone()), &locks);
        provider.register_resource(NoteResource::new(client.clone(), NoteKind::Note), &locks);
        provider.register_resource(NoteResource::new(client.clone(), NoteKind::Script), &locks);
        provider.register_resource(LocalRouterResource::new(client.clone()), &locks);
        provider.register_resource(NlbResource::new(client.clone()), &locks);
        provider.register_resource(EnhancedLbAcmeResource::new(client.clone()), &locks);
        provider.register_resource(CloudHsmResource::new(client.clone()), &locks);
        provider.register_resource(CloudHsmClientResource::new(client.clone()), &locks);
        provider.register_resource(KmsResource::new(client.clone()), &locks);
        provider.register_resource(BucketResource::new(client.clone()), &locks);
        provider.register_resource(ObjectResource::new(client.clone()), &locks);

        provider.register_data_source(BridgeDataSource::new(client.clone()));
        provider.register_data_source(SshKeyDataSource::new(client.clone()));
        provider.register_data_source(NoteDataSource::new(client.clone(), NoteKind::Note));
        provider.register_data_source(NoteDataSource::new(client.clone(), NoteKind::Script));
        provider.register_data_source(LocalRouterDataSource::new(client.clone()));
        provider.register_data_source(CloudHsmDataSource::new(client.clone()));
        provider.register_data_source(KmsDataSource::new(client));

        tracing::debug!(
            "Registered {} resources and {} data sources",
            provider.resources.len(),
            provider.data_sources.len()
        );
        provider
    }

    /// Resolve the configuration, start logging and build the provider
    pub fn configure(config: Config, services: Services) -> Result<Self> {
        let config = config.resolve()?;
        init_logging(&config)?;
        tracing::info!(
            "Configured provider (profile: {:?}, zone: {})",
            config.profile,
            config.zone
        );
        let client = ApiClient::new(&config, services);
        Ok(Self::new(client, Arc::new(MutexKv::new())))
    }

    fn register_resource<R: ResourceHandler>(&mut self, handler: R, locks: &Arc<dyn KeyedLock>) {
        let reconciler = Reconciler::new(handler, locks.clone());
        self.resources
            .insert(reconciler.type_name(PROVIDER_NAME), Arc::new(reconciler));
    }

    fn register_data_source<D: DataSourceHandler>(&mut self, handler: D) {
        let runner = DataSourceRunner::new(handler);
        self.data_sources
            .insert(runner.type_name(PROVIDER_NAME), Arc::new(runner));
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    /// Full type names of every resource
    pub fn resources(&self) -> Vec<&str> {
        self.resources.keys().map(String::as_str).collect()
    }

    /// Full type names of every data source
    pub fn data_sources(&self) -> Vec<&str> {
        self.data_sources.keys().map(String::as_str).collect()
    }

    pub fn resource(&self, type_name: &str) -> Option<Arc<dyn Resource>> {
        self.resources.get(type_name).cloned()
    }

    pub fn data_source(&self, type_name: &str) -> Option<Arc<dyn DataSource>> {
        self.data_sources.get(type_name).cloned()
    }
}
