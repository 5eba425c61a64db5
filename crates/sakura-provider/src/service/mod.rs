//! Resource and data source handlers, one module per vendor service

pub mod bridge;
pub mod cloudhsm;
pub mod cloudhsm_client;
pub mod enhanced_lb_acme;
pub mod kms;
pub mod local_router;
pub mod nlb;
pub mod note;
pub mod object_storage;
pub mod ssh_key;

#[cfg(test)]
pub(crate) fn test_client(fake: &sakura_api::FakeCloud) -> crate::client::ApiClient {
    use crate::client::{ApiClient, Services};
    use crate::config::Config;
    use std::sync::Arc;

    ApiClient::new(
        &Config::default(),
        Services::from_backend(Arc::new(fake.clone())),
    )
}
