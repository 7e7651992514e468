use crate::kubernetes::ingress::{has_rules_or_default_backend, is_ingress_for_class};
use crate::kubernetes::objects::{ObjectKey, ObjectKeyError, SecretId, ServiceId};
use agic_api::constants::DEFAULT_INGRESS_CLASS;
use agic_api::v1::{
    AzureApplicationGatewayLoadDistributionPolicy, AzureIngressManagedTarget,
    AzureIngressProhibitedTarget,
};
use agic_api::v1beta1::AzureApplicationGatewayRewrite;
use k8s_openapi::api::core::v1::{Endpoints, Pod, Service};
use k8s_openapi::api::networking::v1::Ingress;
use kube::{Resource, ResourceExt};
use std::collections::BTreeMap;

/// Source of the PFX bundles behind TLS secrets.
pub trait CertificateStore {
    fn pfx_certificate(&self, secret: &SecretId) -> Option<&[u8]>;
}

/// A read-only view of the cluster state one build compiles.
pub trait Snapshot: CertificateStore {
    fn service(&self, key: &ServiceId) -> Option<&Service>;

    fn endpoints(&self, key: &ServiceId) -> Option<&Endpoints>;

    /// Pods in `namespace` whose labels carry every pair of `selector`, ordered by name.
    /// An empty selector selects nothing.
    fn pods_by_service_selector(
        &self,
        namespace: &str,
        selector: &BTreeMap<String, String>,
    ) -> Vec<&Pod>;

    fn load_distribution_policy(
        &self,
        key: &ObjectKey,
    ) -> Option<&AzureApplicationGatewayLoadDistributionPolicy>;

    fn rewrite(&self, key: &ObjectKey) -> Option<&AzureApplicationGatewayRewrite>;

    /// Ingresses of the gateway's class that route anything, ordered by namespace and name.
    fn http_ingresses(&self) -> Vec<&Ingress>;

    fn prohibited_targets(&self) -> Vec<&AzureIngressProhibitedTarget>;

    fn managed_targets(&self) -> Vec<&AzureIngressManagedTarget>;
}

#[derive(Debug, Clone, Default)]
pub struct InMemorySnapshot {
    ingress_class: String,
    ingresses: BTreeMap<ObjectKey, Ingress>,
    services: BTreeMap<ObjectKey, Service>,
    endpoints: BTreeMap<ObjectKey, Endpoints>,
    pods: BTreeMap<ObjectKey, Pod>,
    certificates: BTreeMap<SecretId, Vec<u8>>,
    load_distribution_policies: BTreeMap<ObjectKey, AzureApplicationGatewayLoadDistributionPolicy>,
    rewrites: BTreeMap<ObjectKey, AzureApplicationGatewayRewrite>,
    prohibited_targets: BTreeMap<ObjectKey, AzureIngressProhibitedTarget>,
    managed_targets: BTreeMap<ObjectKey, AzureIngressManagedTarget>,
}

impl InMemorySnapshot {
    pub fn builder() -> InMemorySnapshotBuilder {
        InMemorySnapshotBuilder::new()
    }
}

impl CertificateStore for InMemorySnapshot {
    fn pfx_certificate(&self, secret: &SecretId) -> Option<&[u8]> {
        self.certificates.get(secret).map(Vec::as_slice)
    }
}

impl Snapshot for InMemorySnapshot {
    fn service(&self, key: &ServiceId) -> Option<&Service> {
        self.services.get(key)
    }

    fn endpoints(&self, key: &ServiceId) -> Option<&Endpoints> {
        self.endpoints.get(key)
    }

    fn pods_by_service_selector(
        &self,
        namespace: &str,
        selector: &BTreeMap<String, String>,
    ) -> Vec<&Pod> {
        if selector.is_empty() {
            return Vec::new();
        }

        self.pods
            .iter()
            .filter(|(key, _)| key.namespace() == namespace)
            .filter(|(_, pod)| {
                let labels = pod.labels();
                selector
                    .iter()
                    .all(|(label, value)| labels.get(label) == Some(value))
            })
            .map(|(_, pod)| pod)
            .collect()
    }

    fn load_distribution_policy(
        &self,
        key: &ObjectKey,
    ) -> Option<&AzureApplicationGatewayLoadDistributionPolicy> {
        self.load_distribution_policies.get(key)
    }

    fn rewrite(&self, key: &ObjectKey) -> Option<&AzureApplicationGatewayRewrite> {
        self.rewrites.get(key)
    }

    fn http_ingresses(&self) -> Vec<&Ingress> {
        self.ingresses
            .values()
            .filter(|ingress| is_ingress_for_class(ingress, &self.ingress_class))
            .filter(|ingress| has_rules_or_default_backend(ingress))
            .collect()
    }

    fn prohibited_targets(&self) -> Vec<&AzureIngressProhibitedTarget> {
        self.prohibited_targets.values().collect()
    }

    fn managed_targets(&self) -> Vec<&AzureIngressManagedTarget> {
        self.managed_targets.values().collect()
    }
}

pub struct InMemorySnapshotBuilder {
    ingress_class: String,
    ingresses: Vec<Ingress>,
    services: Vec<Service>,
    endpoints: Vec<Endpoints>,
    pods: Vec<Pod>,
    certificates: BTreeMap<SecretId, Vec<u8>>,
    load_distribution_policies: Vec<AzureApplicationGatewayLoadDistributionPolicy>,
    rewrites: Vec<AzureApplicationGatewayRewrite>,
    prohibited_targets: Vec<AzureIngressProhibitedTarget>,
    managed_targets: Vec<AzureIngressManagedTarget>,
}

impl InMemorySnapshotBuilder {
    fn new() -> Self {
        Self {
            ingress_class: DEFAULT_INGRESS_CLASS.to_string(),
            ingresses: Vec::new(),
            services: Vec::new(),
            endpoints: Vec::new(),
            pods: Vec::new(),
            certificates: BTreeMap::new(),
            load_distribution_policies: Vec::new(),
            rewrites: Vec::new(),
            prohibited_targets: Vec::new(),
            managed_targets: Vec::new(),
        }
    }

    #[must_use]
    pub fn ingress_class(mut self, ingress_class: impl Into<String>) -> Self {
        self.ingress_class = ingress_class.into();
        self
    }

    #[must_use]
    pub fn add_ingress(mut self, ingress: Ingress) -> Self {
        self.ingresses.push(ingress);
        self
    }

    #[must_use]
    pub fn add_service(mut self, service: Service) -> Self {
        self.services.push(service);
        self
    }

    #[must_use]
    pub fn add_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints.push(endpoints);
        self
    }

    #[must_use]
    pub fn add_pod(mut self, pod: Pod) -> Self {
        self.pods.push(pod);
        self
    }

    #[must_use]
    pub fn add_pfx_certificate(mut self, secret: SecretId, pfx: impl Into<Vec<u8>>) -> Self {
        self.certificates.insert(secret, pfx.into());
        self
    }

    #[must_use]
    pub fn add_load_distribution_policy(
        mut self,
        policy: AzureApplicationGatewayLoadDistributionPolicy,
    ) -> Self {
        self.load_distribution_policies.push(policy);
        self
    }

    #[must_use]
    pub fn add_rewrite(mut self, rewrite: AzureApplicationGatewayRewrite) -> Self {
        self.rewrites.push(rewrite);
        self
    }

    #[must_use]
    pub fn add_prohibited_target(mut self, target: AzureIngressProhibitedTarget) -> Self {
        self.prohibited_targets.push(target);
        self
    }

    #[must_use]
    pub fn add_managed_target(mut self, target: AzureIngressManagedTarget) -> Self {
        self.managed_targets.push(target);
        self
    }

    pub fn build(self) -> Result<InMemorySnapshot, ObjectKeyError> {
        Ok(InMemorySnapshot {
            ingress_class: self.ingress_class,
            ingresses: index(self.ingresses)?,
            services: index(self.services)?,
            endpoints: index(self.endpoints)?,
            pods: index(self.pods)?,
            certificates: self.certificates,
            load_distribution_policies: index(self.load_distribution_policies)?,
            rewrites: index(self.rewrites)?,
            prohibited_targets: index(self.prohibited_targets)?,
            managed_targets: index(self.managed_targets)?,
        })
    }
}

fn index<K: Resource>(objects: Vec<K>) -> Result<BTreeMap<ObjectKey, K>, ObjectKeyError> {
    objects
        .into_iter()
        .map(|object| ObjectKey::for_object(&object).map(|key| (key, object)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use agic_api::constants::INGRESS_CLASS_ANNOTATION;
    use assertables::{assert_err, assert_ok};
    use k8s_openapi::api::networking::v1::{IngressBackend, IngressServiceBackend, IngressSpec};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn metadata(name: &str, labels: &[(&str, &str)]) -> ObjectMeta {
        ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some("default".to_string()),
            labels: Some(
                labels
                    .iter()
                    .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                    .collect(),
            ),
            ..ObjectMeta::default()
        }
    }

    fn ingress(name: &str, class: Option<&str>) -> Ingress {
        let mut meta = metadata(name, &[]);
        meta.annotations = class.map(|class| {
            BTreeMap::from([(INGRESS_CLASS_ANNOTATION.to_string(), class.to_string())])
        });
        Ingress {
            metadata: meta,
            spec: Some(IngressSpec {
                default_backend: Some(IngressBackend {
                    service: Some(IngressServiceBackend {
                        name: "web".to_string(),
                        port: None,
                    }),
                    resource: None,
                }),
                ..IngressSpec::default()
            }),
            status: None,
        }
    }

    #[test]
    fn test_http_ingresses_filters_by_class_and_sorts() {
        let snapshot = assert_ok!(
            InMemorySnapshot::builder()
                .add_ingress(ingress("zeta", Some(DEFAULT_INGRESS_CLASS)))
                .add_ingress(ingress("alpha", Some(DEFAULT_INGRESS_CLASS)))
                .add_ingress(ingress("nginx", Some("nginx")))
                .add_ingress(ingress("unclassed", None))
                .build()
        );

        let names: Vec<_> = snapshot
            .http_ingresses()
            .into_iter()
            .map(ResourceExt::name_any)
            .collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }

    #[test]
    fn test_pods_by_service_selector() {
        let snapshot = assert_ok!(
            InMemorySnapshot::builder()
                .add_pod(Pod {
                    metadata: metadata("web-1", &[("app", "web"), ("tier", "frontend")]),
                    ..Pod::default()
                })
                .add_pod(Pod {
                    metadata: metadata("api-1", &[("app", "api")]),
                    ..Pod::default()
                })
                .build()
        );

        let selector = BTreeMap::from([("app".to_string(), "web".to_string())]);
        let pods = snapshot.pods_by_service_selector("default", &selector);
        assert_eq!(pods.len(), 1);
        assert_eq!(pods[0].name_any(), "web-1");

        assert!(
            snapshot
                .pods_by_service_selector("default", &BTreeMap::new())
                .is_empty()
        );
        assert!(
            snapshot
                .pods_by_service_selector("other", &selector)
                .is_empty()
        );
    }

    #[test]
    fn test_build_rejects_objects_without_name() {
        let result = InMemorySnapshot::builder()
            .add_service(Service::default())
            .build();

        assert_err!(result);
    }
}
