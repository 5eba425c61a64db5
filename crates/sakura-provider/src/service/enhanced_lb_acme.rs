//! `sakura_enhanced_lb_acme` resource
//!
//! Turns on Let's Encrypt for an existing enhanced load balancer and waits
//! until the first certificate is issued. The resource ID is the load
//! balancer's ID; deleting the resource switches ACME off again.

use crate::client::ApiClient;
use crate::common::schema_timeouts;
use async_trait::async_trait;
use sakura_api::{ApiError, ProxyLb, ProxyLbAcmeSetting, ProxyLbApi, ProxyLbCertificates};
use sakura_framework::{
    Attribute, AttributeKind, DeadlineExceeded, Diagnostic, Observed, OpContext, Operation,
    ResourceHandler, ResourceModel, Schema, TIMEOUT_5MIN, TIMEOUT_20MIN, Timeouts, Validator,
    Value, observe,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_GET_CERTIFICATES_TIMEOUT_SEC: i64 = 120;
const CERTIFICATE_POLLING_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdditionalCertificateModel {
    pub server_cert: Value<String>,
    pub intermediate_cert: Value<String>,
    pub private_key: Value<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CertificateModel {
    pub server_cert: Value<String>,
    pub intermediate_cert: Value<String>,
    pub private_key: Value<String>,
    pub common_name: Value<String>,
    pub subject_alt_names: Value<String>,
    pub additional_certificate: Value<Vec<AdditionalCertificateModel>>,
}

impl CertificateModel {
    fn flatten(certs: &ProxyLbCertificates) -> Value<Self> {
        let Some(primary) = &certs.primary_cert else {
            return Value::Null;
        };
        Value::Known(Self {
            server_cert: Value::known(primary.server_certificate.as_str()),
            intermediate_cert: Value::known(primary.intermediate_certificate.as_str()),
            private_key: Value::known(primary.private_key.as_str()),
            common_name: Value::known(primary.certificate_common_name.as_str()),
            subject_alt_names: Value::known(primary.certificate_alt_names.as_str()),
            additional_certificate: Value::Known(
                certs
                    .additional_certs
                    .iter()
                    .map(|c| AdditionalCertificateModel {
                        server_cert: Value::known(c.server_certificate.as_str()),
                        intermediate_cert: Value::known(c.intermediate_certificate.as_str()),
                        private_key: Value::known(c.private_key.as_str()),
                    })
                    .collect(),
            ),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnhancedLbAcmeModel {
    pub id: Value<String>,
    pub enhanced_lb_id: Value<String>,
    pub accept_tos: Value<bool>,
    pub common_name: Value<String>,
    pub subject_alt_names: Value<Vec<String>>,
    pub update_delay_sec: Value<i64>,
    pub get_certificates_timeout_sec: Value<i64>,
    pub certificate: Value<CertificateModel>,
    pub timeouts: Value<Timeouts>,
}

impl ResourceModel for EnhancedLbAcmeModel {
    fn timeouts(&self) -> Option<&Timeouts> {
        self.timeouts.as_known()
    }
}

impl EnhancedLbAcmeModel {
    /// ACME is only enabled once the terms of service are accepted
    fn expand_setting(&self) -> ProxyLbAcmeSetting {
        if self.accept_tos.as_known().copied().unwrap_or(false) {
            ProxyLbAcmeSetting {
                enabled: true,
                common_name: self.common_name.value_or_default(),
                subject_alt_names: self.subject_alt_names.value_or_default(),
            }
        } else {
            ProxyLbAcmeSetting::disabled()
        }
    }

    fn seconds(value: &Value<i64>, default: i64) -> Duration {
        let secs = value.as_known().copied().unwrap_or(default);
        Duration::from_secs(u64::try_from(secs).unwrap_or_default())
    }
}

pub struct EnhancedLbAcmeResource {
    client: ApiClient,
}

impl EnhancedLbAcmeResource {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    fn api(&self) -> &Arc<dyn ProxyLbApi> {
        &self.client.services().proxy_lb
    }

    async fn read_elb(&self, ctx: &OpContext, id: &str) -> Result<Observed<ProxyLb>, Diagnostic> {
        observe(ctx.call(self.api().read(id)).await, || {
            format!("Enhanced LB[{}]", id)
        })
    }

    /// Poll until a server certificate shows up or `timeout` passes
    async fn wait_for_certificates(
        &self,
        ctx: &OpContext,
        id: &str,
        timeout: Duration,
    ) -> Result<ProxyLbCertificates, ApiError> {
        let poll = async {
            loop {
                let certs = ctx.call(self.api().get_certificates(id)).await?;
                if certs.is_issued() {
                    return Ok(certs);
                }
                tracing::debug!("Certificate of Enhanced LB[{}] not issued yet", id);
                tokio::time::sleep(CERTIFICATE_POLLING_INTERVAL).await;
            }
        };
        match tokio::time::timeout(timeout, poll).await {
            Ok(result) => result,
            Err(_) => Err(DeadlineExceeded { budget: timeout }.into()),
        }
    }
}

#[async_trait]
impl ResourceHandler for EnhancedLbAcmeResource {
    type Model = EnhancedLbAcmeModel;

    fn type_suffix(&self) -> &'static str {
        "enhanced_lb_acme"
    }

    fn schema(&self) -> Schema {
        Schema::new("Manages an Enhanced Load Balancer's ACME")
            .attribute(
                "id",
                Attribute::string()
                    .computed()
                    .description("The ID of the Enhanced Load Balancer"),
            )
            .attribute(
                "enhanced_lb_id",
                Attribute::string()
                    .required()
                    .requires_replace()
                    .validator(Validator::SakuraId)
                    .description("The id of the Enhanced Load Balancer that set ACME settings to"),
            )
            .attribute(
                "accept_tos",
                Attribute::bool()
                    .required()
                    .requires_replace()
                    .description("The flag to accept the current Let's Encrypt terms of service(ToS). This must be set `true` explicitly"),
            )
            .attribute(
                "common_name",
                Attribute::string()
                    .required()
                    .requires_replace()
                    .description("The FQDN used by ACME. This must set resolvable value"),
            )
            .attribute(
                "subject_alt_names",
                Attribute::set_of(AttributeKind::String)
                    .optional()
                    .requires_replace()
                    .description("The Subject alternative names used by ACME"),
            )
            .attribute(
                "update_delay_sec",
                Attribute::int()
                    .optional()
                    .requires_replace()
                    .validator(Validator::IntBetween(0, i64::from(i32::MAX)))
                    .description("The wait time in seconds. This typically used for waiting for a DNS propagation"),
            )
            .attribute(
                "get_certificates_timeout_sec",
                Attribute::int()
                    .default_value(DEFAULT_GET_CERTIFICATES_TIMEOUT_SEC)
                    .requires_replace()
                    .validator(Validator::IntBetween(1, i64::from(i32::MAX)))
                    .description("The timeout in seconds for the certificate acquisition to complete"),
            )
            .attribute(
                "certificate",
                Attribute::object([
                    ("server_cert", Attribute::string().computed()),
                    ("intermediate_cert", Attribute::string().computed()),
                    ("private_key", Attribute::string().computed().sensitive()),
                    ("common_name", Attribute::string().computed()),
                    ("subject_alt_names", Attribute::string().computed()),
                    (
                        "additional_certificate",
                        Attribute::list_nested([
                            ("server_cert", Attribute::string().computed()),
                            ("intermediate_cert", Attribute::string().computed()),
                            ("private_key", Attribute::string().computed().sensitive()),
                        ])
                        .computed(),
                    ),
                ])
                .computed()
                .description("The certificate information"),
            )
            .attribute("timeouts", schema_timeouts())
    }

    fn default_timeout(&self, op: Operation) -> Option<Duration> {
        match op {
            Operation::Create => Some(TIMEOUT_20MIN),
            Operation::Update | Operation::Delete => Some(TIMEOUT_5MIN),
            Operation::Read | Operation::Import => None,
        }
    }

    /// ACME settings are part of the load balancer's settings
    fn lock_key(&self, op: Operation, model: &EnhancedLbAcmeModel) -> Option<String> {
        match op {
            Operation::Create | Operation::Delete => model.enhanced_lb_id.as_known().cloned(),
            _ => None,
        }
    }

    async fn create(
        &self,
        ctx: &mut OpContext,
        mut plan: EnhancedLbAcmeModel,
    ) -> Result<EnhancedLbAcmeModel, Diagnostic> {
        let elb_id = plan.enhanced_lb_id.value_or_default();
        let elb = match self.read_elb(ctx, &elb_id).await? {
            Observed::Present(elb) => elb,
            Observed::Gone => {
                return Err(Diagnostic::error(
                    "Create Error",
                    format!("Enhanced LB[{}] is not found", elb_id),
                ));
            }
        };

        let delay = EnhancedLbAcmeModel::seconds(&plan.update_delay_sec, 0);
        if !delay.is_zero() {
            tracing::debug!("Waiting {:?} before enabling ACME on Enhanced LB[{}]", delay, elb.id);
            tokio::time::sleep(delay).await;
        }

        ctx.call(
            self.api()
                .update_acme(&elb.id, plan.expand_setting(), &elb.settings_hash),
        )
        .await
        .map_err(|e| {
            Diagnostic::error(
                "Create Error",
                format!("setting Enhanced LB[{}] ACME is failed: {}", elb.id, e),
            )
        })?;

        let mut partial = plan.clone();
        partial.id = Value::known(elb.id.as_str());
        partial.certificate = Value::Null;
        ctx.keep_partial(&partial);

        ctx.call(self.api().renew_lets_encrypt_cert(&elb.id))
            .await
            .map_err(|e| {
                Diagnostic::error(
                    "Create Error",
                    format!(
                        "renewing ACME Certificates at Enhanced LB[{}] is failed: {}",
                        elb.id, e
                    ),
                )
            })?;

        let timeout = EnhancedLbAcmeModel::seconds(
            &plan.get_certificates_timeout_sec,
            DEFAULT_GET_CERTIFICATES_TIMEOUT_SEC,
        );
        let certs = self
            .wait_for_certificates(ctx, &elb.id, timeout)
            .await
            .map_err(|e| {
                Diagnostic::error(
                    "Create Error",
                    format!(
                        "waiting for ACME certificate acquisition of Enhanced LB[{}] is failed: {}",
                        elb.id, e
                    ),
                )
            })?;

        plan.id = Value::known(elb.id.as_str());
        plan.certificate = CertificateModel::flatten(&certs);
        Ok(plan)
    }

    async fn read(
        &self,
        ctx: &mut OpContext,
        mut state: EnhancedLbAcmeModel,
    ) -> Result<Observed<EnhancedLbAcmeModel>, Diagnostic> {
        let elb_id = state.enhanced_lb_id.value_or_default();
        let Observed::Present(elb) = self.read_elb(ctx, &elb_id).await? else {
            return Ok(Observed::Gone);
        };
        let certs = ctx
            .call(self.api().get_certificates(&elb.id))
            .await
            .map_err(|e| {
                Diagnostic::error(
                    "Read Error",
                    format!("failed to update state for Enhanced LB[{}] ACME: {}", elb.id, e),
                )
            })?;
        state.id = Value::known(elb.id.as_str());
        state.certificate = CertificateModel::flatten(&certs);
        Ok(Observed::Present(state))
    }

    /// Every configurable attribute forces replacement
    async fn update(
        &self,
        _ctx: &mut OpContext,
        plan: EnhancedLbAcmeModel,
        _prior: EnhancedLbAcmeModel,
    ) -> Result<Observed<EnhancedLbAcmeModel>, Diagnostic> {
        Ok(Observed::Present(plan))
    }

    async fn delete(
        &self,
        ctx: &mut OpContext,
        state: EnhancedLbAcmeModel,
    ) -> Result<(), Diagnostic> {
        let elb_id = state.enhanced_lb_id.value_or_default();
        let Observed::Present(elb) = self.read_elb(ctx, &elb_id).await? else {
            return Ok(());
        };
        ctx.call(
            self.api()
                .update_acme(&elb.id, ProxyLbAcmeSetting::disabled(), &elb.settings_hash),
        )
        .await
        .map(|_| ())
        .map_err(|e| {
            Diagnostic::error(
                "Delete Error",
                format!("clearing ACME Setting of Enhanced LB[{}] is failed: {}", elb.id, e),
            )
        })
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

    fn plan(elb_id: &str) -> EnhancedLbAcmeModel {
        EnhancedLbAcmeModel {
            id: Value::Unknown,
            enhanced_lb_id: Value::known(elb_id),
            accept_tos: Value::Known(true),
            common_name: Value::known("www.example.com"),
            subject_alt_names: Value::Known(vec!["api.example.com".into()]),
            get_certificates_timeout_sec: Value::Known(DEFAULT_GET_CERTIFICATES_TIMEOUT_SEC),
            certificate: Value::Unknown,
            ..Default::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_polls_until_issued() {
        let fake = FakeCloud::new().with_cert_delay(Duration::from_secs(12));
        let elb = fake.seed_proxy_lb("elb");
        let resource = EnhancedLbAcmeResource::new(test_client(&fake));

        let created = resource
            .create(&mut ctx(Operation::Create), plan(&elb.id))
            .await
            .unwrap();

        assert_eq!(created.id, Value::known(elb.id.as_str()));
        // polled at 0s, 5s, 10s and 15s
        assert_eq!(fake.call_count("proxy_lb.get_certificates"), 4);
        let cert = created.certificate.as_known().unwrap();
        assert_eq!(cert.common_name, Value::known("www.example.com"));
        assert_eq!(cert.subject_alt_names, Value::known("api.example.com"));
        assert_eq!(cert.additional_certificate, Value::Known(vec![]));

        let acme = fake.proxy_lb_acme(&elb.id).unwrap();
        assert!(acme.enabled);
        assert_eq!(acme.subject_alt_names, vec!["api.example.com"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_gives_up_after_certificate_timeout() {
        let fake = FakeCloud::new().with_cert_delay(Duration::from_secs(600));
        let elb = fake.seed_proxy_lb("elb");
        let resource = EnhancedLbAcmeResource::new(test_client(&fake));

        let planned = EnhancedLbAcmeModel {
            get_certificates_timeout_sec: Value::Known(20),
            ..plan(&elb.id)
        };
        let diag = resource
            .create(&mut ctx(Operation::Create), planned)
            .await
            .unwrap_err();
        assert_eq!(diag.summary, "Create Error");
        assert!(diag.detail.contains("waiting for ACME certificate acquisition"));
    }

    #[tokio::test]
    async fn test_create_without_tos_fails_to_renew() {
        let fake = FakeCloud::new();
        let elb = fake.seed_proxy_lb("elb");
        let resource = EnhancedLbAcmeResource::new(test_client(&fake));

        let planned = EnhancedLbAcmeModel {
            accept_tos: Value::Known(false),
            ..plan(&elb.id)
        };
        let diag = resource
            .create(&mut ctx(Operation::Create), planned)
            .await
            .unwrap_err();
        assert!(diag.detail.starts_with("renewing ACME Certificates"));
        assert!(!fake.proxy_lb_acme(&elb.id).unwrap().enabled);
    }

    #[tokio::test]
    async fn test_create_on_missing_elb() {
        let fake = FakeCloud::new();
        let resource = EnhancedLbAcmeResource::new(test_client(&fake));
        let diag = resource
            .create(&mut ctx(Operation::Create), plan("113000000404"))
            .await
            .unwrap_err();
        assert_eq!(diag.summary, "Create Error");
        assert_eq!(fake.call_count("proxy_lb.update_acme"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_disables_acme() {
        let fake = FakeCloud::new();
        let elb = fake.seed_proxy_lb("elb");
        let resource = EnhancedLbAcmeResource::new(test_client(&fake));
        let created = resource
            .create(&mut ctx(Operation::Create), plan(&elb.id))
            .await
            .unwrap();

        resource.delete(&mut ctx(Operation::Delete), created).await.unwrap();
        assert_eq!(fake.proxy_lb_acme(&elb.id), Some(ProxyLbAcmeSetting::disabled()));
    }

    #[test]
    fn test_lock_key_is_elb_id() {
        let resource = EnhancedLbAcmeResource::new(test_client(&FakeCloud::new()));
        let model = plan("113000000007");
        assert_eq!(
            resource.lock_key(Operation::Create, &model).as_deref(),
            Some("113000000007")
        );
        assert_eq!(resource.lock_key(Operation::Read, &model), None);
    }
}
