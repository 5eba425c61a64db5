//! Enhanced load balancer (ProxyLB) API (global)
//!
//! Only the parts needed to manage Let's Encrypt certificates are modelled.

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyLbAcmeSetting {
    #[serde(rename = "Enabled")]
    pub enabled: bool,

    #[serde(rename = "CommonName", default)]
    pub common_name: String,

    #[serde(rename = "SubjectAltNames", default)]
    pub subject_alt_names: Vec<String>,
}

impl ProxyLbAcmeSetting {
    pub fn disabled() -> Self {
        Self::default()
    }
}

/// Enhanced load balancer record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyLb {
    #[serde(rename = "ID")]
    pub id: String,

    #[serde(rename = "Name")]
    pub name: String,

    #[serde(rename = "LetsEncrypt", default)]
    pub lets_encrypt: ProxyLbAcmeSetting,

    #[serde(rename = "SettingsHash", default)]
    pub settings_hash: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyLbPrimaryCert {
    #[serde(rename = "ServerCertificate", default)]
    pub server_certificate: String,

    #[serde(rename = "IntermediateCertificate", default)]
    pub intermediate_certificate: String,

    #[serde(rename = "PrivateKey", default)]
    pub private_key: String,

    #[serde(rename = "CertificateEndDate")]
    pub certificate_end_date: Option<DateTime<Utc>>,

    #[serde(rename = "CertificateCommonName", default)]
    pub certificate_common_name: String,

    #[serde(rename = "CertificateAltNames", default)]
    pub certificate_alt_names: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyLbAdditionalCert {
    #[serde(rename = "ServerCertificate", default)]
    pub server_certificate: String,

    #[serde(rename = "IntermediateCertificate", default)]
    pub intermediate_certificate: String,

    #[serde(rename = "PrivateKey", default)]
    pub private_key: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyLbCertificates {
    #[serde(rename = "PrimaryCert")]
    pub primary_cert: Option<ProxyLbPrimaryCert>,

    #[serde(rename = "AdditionalCerts", default)]
    pub additional_certs: Vec<ProxyLbAdditionalCert>,
}

impl ProxyLbCertificates {
    /// A server certificate has been issued
    pub fn is_issued(&self) -> bool {
        self.primary_cert
            .as_ref()
            .is_some_and(|c| !c.server_certificate.is_empty())
    }
}

#[async_trait]
pub trait ProxyLbApi: Send + Sync {
    async fn read(&self, id: &str) -> Result<ProxyLb>;

    /// Replace the ACME settings, keeping everything else as read
    async fn update_acme(
        &self,
        id: &str,
        setting: ProxyLbAcmeSetting,
        settings_hash: &str,
    ) -> Result<ProxyLb>;

    async fn renew_lets_encrypt_cert(&self, id: &str) -> Result<()>;

    async fn get_certificates(&self, id: &str) -> Result<ProxyLbCertificates>;
}
