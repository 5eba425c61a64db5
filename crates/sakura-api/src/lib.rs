//! Sakura Cloud API surface
//!
//! Typed records and request structs for the services the provider manages,
//! one async trait per service. The provider only talks to these traits, so
//! any client (HTTP, recorded, in-memory) can back it.
//!
//! # Services
//!
//! - IaaS: bridge, SSH key, note, local router, load balancer, enhanced load balancer
//! - CloudHSM appliances and their client certificates
//! - KMS keys
//! - Object storage buckets and S3-compatible objects
//!
//! Enable the `test-utils` feature for [`FakeCloud`], an in-memory
//! implementation of every trait.

pub mod bridge;
pub mod cloudhsm;
pub mod error;
#[cfg(any(test, feature = "test-utils"))]
pub mod fake;
pub mod kms;
pub mod load_balancer;
pub mod local_router;
pub mod note;
pub mod object_storage;
pub mod proxy_lb;
pub mod search;
pub mod ssh_key;

// Re-exports
pub use bridge::{Bridge, BridgeApi, BridgeCreateRequest, BridgeUpdateRequest};
pub use cloudhsm::{
    CLOUDHSM_DEFAULT_ZONE, CLOUDHSM_ZONES, CloudHsm, CloudHsmApi, CloudHsmClient,
    CloudHsmClientParams, CloudHsmLocalRouter, CloudHsmParams,
};
pub use error::{ApiError, Result};
#[cfg(any(test, feature = "test-utils"))]
pub use fake::{CallEvent, FIRST_FAKE_ID, FakeCloud};
pub use kms::{CreateKey, Key, KeyOrigin, KeyStatus, KmsApi, UpdateKey};
pub use load_balancer::{
    Availability, HealthCheck, HealthCheckProtocol, LoadBalancer, LoadBalancerApi,
    LoadBalancerCreateRequest, LoadBalancerPlan, LoadBalancerServer, LoadBalancerUpdateRequest,
    LoadBalancerVip,
};
pub use local_router::{
    LocalRouter, LocalRouterApi, LocalRouterCreateRequest, LocalRouterInterface, LocalRouterPeer,
    LocalRouterSettings, LocalRouterStaticRoute, LocalRouterSwitch, LocalRouterUpdateRequest,
};
pub use note::{Note, NoteApi, NoteClass, NoteRequest, description_from_content};
pub use object_storage::{
    Bucket, DEFAULT_CONTENT_TYPE, DEFAULT_S3_ENDPOINT, ObjectInfo, ObjectStorageApi, PutObject,
    S3Api, S3ClientFactory, S3Credentials,
};
pub use proxy_lb::{
    ProxyLb, ProxyLbAcmeSetting, ProxyLbAdditionalCert, ProxyLbApi, ProxyLbCertificates,
    ProxyLbPrimaryCert,
};
pub use search::{FindCondition, Searchable};
pub use ssh_key::{SshKey, SshKeyApi, SshKeyCreateRequest, SshKeyUpdateRequest};
