use sakura_api::FakeCloud;
use sakura_framework::{DataSource, MutexKv, Resource, Response};
use sakura_provider::{ApiClient, Config, SakuraProvider, Services};
use serde_json::{Value as Json, json};
use std::sync::Arc;

/// Provider wired to an in-memory cloud
pub struct TestProvider {
    pub fake: FakeCloud,
    pub provider: SakuraProvider,
}

impl TestProvider {
    pub fn new() -> Self {
        Self::with_fake(FakeCloud::new())
    }

    pub fn with_fake(fake: FakeCloud) -> Self {
        let services = Services::from_backend(Arc::new(fake.clone()));
        let client = ApiClient::new(&Config::default(), services);
        let provider = SakuraProvider::new(client, Arc::new(MutexKv::new()));
        Self { fake, provider }
    }

    pub fn resource(&self, type_name: &str) -> Arc<dyn Resource> {
        self.provider.resource(type_name).unwrap()
    }

    #[allow(dead_code)]
    pub fn data_source(&self, type_name: &str) -> Arc<dyn DataSource> {
        self.provider.data_source(type_name).unwrap()
    }

    /// Create and return the stored state, failing on any error
    pub async fn create(&self, type_name: &str, plan: Json) -> Json {
        let response = self.resource(type_name).create(plan).await;
        assert!(!response.has_error(), "{:?}", response.diagnostics);
        state_of(&response)
    }
}

pub fn state_of(response: &Response) -> Json {
    response.state.as_json().cloned().unwrap_or(Json::Null)
}

#[allow(dead_code)]
pub fn local_router_plan() -> Json {
    json!({
        "name": "lr",
        "switch": {"code": "113000000099", "zone": "is1a"},
        "network_interface": {
            "vip": "192.168.11.1",
            "ip_addresses": ["192.168.11.11", "192.168.11.12"],
            "netmask": 24,
            "vrid": 101
        }
    })
}
