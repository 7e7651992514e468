use crate::builder::{BuildError, ConfigBuilder};
use crate::events::EventReason;
use crate::kubernetes::ingress::{default_backend, host, http_paths, rules};
use crate::kubernetes::{ObjectKey, ServiceId};
use crate::net::Port;
use agic_api::constants::LOAD_DISTRIBUTION_POLICY_CRD_KIND;
use agic_api::v1::ServiceBackendPort as PolicyServicePort;
use getset::{CopyGetters, Getters};
use itertools::Itertools;
use k8s_openapi::api::core::v1::{Service, ServicePort};
use k8s_openapi::api::networking::v1::{IngressBackend, ServiceBackendPort};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter};
use tracing::{debug, instrument, warn};

/// How an ingress names the port of a service.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ServicePortRef {
    Number(i32),
    Name(String),
}

impl ServicePortRef {
    fn from_parts(number: Option<i32>, name: Option<&str>) -> Option<Self> {
        match (number, name) {
            (Some(number), _) if number != 0 => Some(Self::Number(number)),
            (_, Some(name)) if !name.is_empty() => Some(Self::Name(name.to_string())),
            _ => None,
        }
    }

    pub fn from_ingress(port: Option<&ServiceBackendPort>) -> Option<Self> {
        port.and_then(|port| Self::from_parts(port.number, port.name.as_deref()))
    }

    pub fn from_policy(port: &PolicyServicePort) -> Option<Self> {
        Self::from_parts(port.number, port.name.as_deref())
    }

    /// A service port matches when its number, its name or its target port reads the same as the reference.
    fn matches(&self, port: &ServicePort) -> bool {
        let reference = self.to_string();
        if port.port.to_string() == reference || port.name.as_deref() == Some(reference.as_str()) {
            return true;
        }

        match &port.target_port {
            Some(IntOrString::Int(target)) => target.to_string() == reference,
            Some(IntOrString::String(target)) => *target == reference,
            None => false,
        }
    }
}

impl Display for ServicePortRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(number) => write!(f, "{number}"),
            Self::Name(name) => f.write_str(name),
        }
    }
}

/// Where in an ingress a backend is referenced: the default backend, or one path of one rule.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Getters, CopyGetters)]
pub struct BackendSite {
    #[getset(get = "pub")]
    ingress: ObjectKey,

    #[getset(get_copy = "pub")]
    rule: Option<usize>,

    #[getset(get_copy = "pub")]
    path: Option<usize>,
}

impl BackendSite {
    pub fn default_backend(ingress: ObjectKey) -> Self {
        Self {
            ingress,
            rule: None,
            path: None,
        }
    }

    pub fn at_path(ingress: ObjectKey, rule: usize, path: usize) -> Self {
        Self {
            ingress,
            rule: Some(rule),
            path: Some(path),
        }
    }
}

/// One consumer of a service inside one ingress.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Getters, CopyGetters)]
pub struct BackendId {
    #[getset(get = "pub")]
    site: BackendSite,

    /// Position of the target when the backend came from a load distribution policy.
    #[getset(get_copy = "pub")]
    target: Option<usize>,

    #[getset(get = "pub")]
    service: ServiceId,

    #[getset(get = "pub")]
    port: ServicePortRef,

    /// Host of the rule the backend belongs to, empty for default backends.
    #[getset(get = "pub")]
    host: String,
}

impl BackendId {
    pub fn new(
        site: BackendSite,
        target: Option<usize>,
        service: ServiceId,
        port: ServicePortRef,
        host: impl Into<String>,
    ) -> Self {
        Self {
            site,
            target,
            service,
            port,
            host: host.into(),
        }
    }

    pub fn ingress(&self) -> &ObjectKey {
        &self.site.ingress
    }
}

impl Display for BackendId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} -> {}:{}",
            self.site.ingress, self.service, self.port
        )
    }
}

/// A weighted backend of a load distribution policy.
#[derive(Debug, Clone, PartialEq, Eq, Getters, CopyGetters)]
pub struct PolicyTarget {
    #[getset(get = "pub")]
    backend: BackendId,

    #[getset(get_copy = "pub")]
    weight: i32,
}

/// What a backend site routes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SiteBackend {
    Service(BackendId),
    Policy {
        policy: ObjectKey,
        targets: Vec<PolicyTarget>,
    },
    /// Routes to the default pool and settings.
    Unavailable,
}

impl SiteBackend {
    /// The backend whose pool and settings the site uses.
    pub fn primary(&self) -> Option<&BackendId> {
        match self {
            Self::Service(backend) => Some(backend),
            Self::Policy { targets, .. } => targets.first().map(PolicyTarget::backend),
            Self::Unavailable => None,
        }
    }
}

/// Every backend site of every ingress.
#[derive(Debug, Default)]
pub struct BackendCatalog {
    sites: BTreeMap<BackendSite, SiteBackend>,
}

impl BackendCatalog {
    pub fn site(&self, site: &BackendSite) -> Option<&SiteBackend> {
        self.sites.get(site)
    }

    pub fn sites(&self) -> impl Iterator<Item = (&BackendSite, &SiteBackend)> {
        self.sites.iter()
    }

    /// Every distinct backend, in order.
    pub fn backends(&self) -> impl Iterator<Item = &BackendId> {
        self.sites.values().flat_map(|backend| -> Vec<&BackendId> {
            match backend {
                SiteBackend::Service(backend) => vec![backend],
                SiteBackend::Policy { targets, .. } => {
                    targets.iter().map(PolicyTarget::backend).collect()
                }
                SiteBackend::Unavailable => Vec::new(),
            }
        })
    }
}

/// The service port and the port the pods listen on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, CopyGetters)]
pub struct PortPair {
    #[getset(get_copy = "pub")]
    service: Port,

    #[getset(get_copy = "pub")]
    backend: Port,
}

impl PortPair {
    pub fn new(service: Port, backend: Port) -> Self {
        Self { service, backend }
    }
}

impl Display for PortPair {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.service, self.backend)
    }
}

/// The port pair of every backend.
#[derive(Debug, Default)]
pub struct BackendPorts {
    pairs: BTreeMap<BackendId, PortPair>,
    missing_services: BTreeSet<BackendId>,
}

impl BackendPorts {
    pub fn pair(&self, backend: &BackendId) -> Option<PortPair> {
        self.pairs.get(backend).copied()
    }

    /// Backends whose service is absent; they are served by the default pool and settings.
    pub fn is_missing_service(&self, backend: &BackendId) -> bool {
        self.missing_services.contains(backend)
    }

    /// The pair of a backend whose service exists.
    pub fn resolved(&self, backend: &BackendId) -> Option<PortPair> {
        if self.is_missing_service(backend) {
            None
        } else {
            self.pair(backend)
        }
    }
}

impl ConfigBuilder<'_> {
    pub(super) fn backends(&self) -> &BackendCatalog {
        self.memo.backends.get_or_init(|| self.collect_backends())
    }

    #[instrument(skip_all, level = "debug", name = "ConfigBuilder::collect_backends")]
    fn collect_backends(&self) -> BackendCatalog {
        let mut sites = BTreeMap::new();
        for (key, ingress) in &self.ingresses {
            if let Some(backend) = default_backend(ingress) {
                let site = BackendSite::default_backend(key.clone());
                let resolved = self.site_backend(&site, "", backend);
                sites.insert(site, resolved);
            }

            for (rule_index, rule) in rules(ingress).iter().enumerate() {
                let Some(paths) = http_paths(rule) else {
                    debug!(
                        "Skipping rule #{} of {key} for host '{}'; it has no HTTP paths",
                        rule_index + 1,
                        host(rule)
                    );
                    continue;
                };

                for (path_index, path) in paths.iter().enumerate() {
                    let site = BackendSite::at_path(key.clone(), rule_index, path_index);
                    let resolved = self.site_backend(&site, host(rule), &path.backend);
                    sites.insert(site, resolved);
                }
            }
        }

        BackendCatalog { sites }
    }

    fn site_backend(&self, site: &BackendSite, host: &str, backend: &IngressBackend) -> SiteBackend {
        let ingress = site.ingress();

        if let Some(service) = &backend.service {
            return match ServicePortRef::from_ingress(service.port.as_ref()) {
                Some(port) => SiteBackend::Service(BackendId::new(
                    site.clone(),
                    None,
                    ingress.sibling(&service.name),
                    port,
                    host,
                )),
                None => {
                    warn!(
                        "Ingress {ingress} references service {} without a port",
                        service.name
                    );
                    SiteBackend::Unavailable
                }
            };
        }

        match &backend.resource {
            Some(resource) if resource.kind == LOAD_DISTRIBUTION_POLICY_CRD_KIND => {
                self.policy_backend(site, host, &ingress.sibling(&resource.name))
            }
            Some(resource) => {
                warn!(
                    "Ingress {ingress} references unsupported backend resource {}/{}",
                    resource.kind, resource.name
                );
                SiteBackend::Unavailable
            }
            None => SiteBackend::Unavailable,
        }
    }

    fn policy_backend(&self, site: &BackendSite, host: &str, key: &ObjectKey) -> SiteBackend {
        let ingress = site.ingress();
        let Some(policy) = self.snapshot.load_distribution_policy(key) else {
            self.emit(
                ingress,
                EventReason::LoadDistributionPolicyNotFound,
                format!("Unable to find load distribution policy {key}"),
            );
            return SiteBackend::Unavailable;
        };

        let targets: Vec<_> = policy
            .spec
            .targets
            .iter()
            .enumerate()
            .filter_map(|(index, target)| {
                let Some(port) = ServicePortRef::from_policy(&target.service.port) else {
                    warn!(
                        "Target #{index} of load distribution policy {key} has no service port"
                    );
                    return None;
                };
                Some(PolicyTarget {
                    backend: BackendId::new(
                        site.clone(),
                        Some(index),
                        key.sibling(&target.service.name),
                        port,
                        host,
                    ),
                    weight: target.weight,
                })
            })
            .collect();

        if targets.is_empty() {
            self.emit(
                ingress,
                EventReason::LoadDistributionPolicyNotFound,
                format!("Load distribution policy {key} has no usable targets"),
            );
            return SiteBackend::Unavailable;
        }

        SiteBackend::Policy {
            policy: key.clone(),
            targets,
        }
    }

    pub(super) fn backend_ports(&self) -> Result<&BackendPorts, BuildError> {
        self.memo
            .backend_ports
            .get_or_try_init(|| self.resolve_backend_ports())
    }

    #[instrument(skip_all, level = "debug", name = "ConfigBuilder::resolve_backend_ports")]
    fn resolve_backend_ports(&self) -> Result<BackendPorts, BuildError> {
        let mut ports = BackendPorts::default();

        for backend in self.backends().backends() {
            if ports.pairs.contains_key(backend) || ports.missing_services.contains(backend) {
                continue;
            }

            let Some(service) = self.snapshot.service(backend.service()) else {
                self.emit(
                    backend.ingress(),
                    EventReason::ServiceNotFound,
                    format!("Unable to get the service [{}]", backend.service()),
                );
                if let ServicePortRef::Number(number) = backend.port() {
                    if let Ok(port) = Port::try_from(*number) {
                        ports
                            .pairs
                            .insert(backend.clone(), PortPair::new(port, port));
                    }
                }
                ports.missing_services.insert(backend.clone());
                continue;
            };

            let candidates = self.candidate_port_pairs(backend, service);
            match candidates.as_slice() {
                [] => {
                    return Err(BuildError::ResolveBackendPortForService {
                        backend: backend.to_string(),
                    });
                }
                [pair] => {
                    debug!("Resolved {backend} to port pair {pair}");
                    ports.pairs.insert(backend.clone(), *pair);
                }
                pairs => {
                    return Err(BuildError::MultipleBackendPortBinding {
                        backend: backend.to_string(),
                        pairs: pairs.iter().join(", "),
                    });
                }
            }
        }

        Ok(ports)
    }

    /// Distinct port pairs of the first TCP service port the backend matches.
    fn candidate_port_pairs(&self, backend: &BackendId, service: &Service) -> Vec<PortPair> {
        let service_ports = service
            .spec
            .as_ref()
            .and_then(|spec| spec.ports.as_deref())
            .unwrap_or_default();

        let Some(service_port) = service_ports
            .iter()
            .find(|port| is_tcp(port.protocol.as_deref()) && backend.port().matches(port))
        else {
            return Vec::new();
        };

        self.port_pairs(backend.service(), service_port)
            .into_iter()
            .unique()
            .collect()
    }

    fn port_pairs(&self, service: &ServiceId, service_port: &ServicePort) -> Vec<PortPair> {
        let Ok(port) = Port::try_from(service_port.port) else {
            warn!(
                "Service {service} declares invalid port {}",
                service_port.port
            );
            return Vec::new();
        };

        match &service_port.target_port {
            None | Some(IntOrString::Int(0)) => vec![PortPair::new(port, port)],
            Some(IntOrString::String(name)) if name.is_empty() => vec![PortPair::new(port, port)],
            Some(IntOrString::Int(target)) => Port::try_from(*target)
                .map(|target| vec![PortPair::new(port, target)])
                .unwrap_or_default(),
            Some(IntOrString::String(name)) => {
                let Some(endpoints) = self.snapshot.endpoints(service) else {
                    debug!("No endpoints for {service} to resolve target port {name}");
                    return Vec::new();
                };

                endpoints
                    .subsets
                    .iter()
                    .flatten()
                    .flat_map(|subset| subset.ports.iter().flatten())
                    .filter(|endpoint_port| endpoint_port.name.as_deref() == Some(name.as_str()))
                    .filter_map(|endpoint_port| Port::try_from(endpoint_port.port).ok())
                    .map(|target| PortPair::new(port, target))
                    .collect()
            }
        }
    }
}

pub(super) fn is_tcp(protocol: Option<&str>) -> bool {
    protocol.is_none_or(|protocol| protocol.eq_ignore_ascii_case("TCP"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn service_port(port: i32, name: Option<&str>, target: Option<IntOrString>) -> ServicePort {
        ServicePort {
            port,
            name: name.map(str::to_string),
            target_port: target,
            ..ServicePort::default()
        }
    }

    #[rstest]
    #[case(ServicePortRef::Number(80), service_port(80, None, None), true)]
    #[case(ServicePortRef::Name("http".into()), service_port(80, Some("http"), None), true)]
    #[case(
        ServicePortRef::Number(8080),
        service_port(80, None, Some(IntOrString::Int(8080))),
        true
    )]
    #[case(
        ServicePortRef::Name("web".into()),
        service_port(80, None, Some(IntOrString::String("web".into()))),
        true
    )]
    #[case(ServicePortRef::Number(81), service_port(80, Some("http"), None), false)]
    fn test_service_port_ref_matches(
        #[case] reference: ServicePortRef,
        #[case] port: ServicePort,
        #[case] expected: bool,
    ) {
        assert_eq!(reference.matches(&port), expected);
    }

    #[rstest]
    #[case(Some(80), None, Some(ServicePortRef::Number(80)))]
    #[case(Some(0), Some("http"), Some(ServicePortRef::Name("http".into())))]
    #[case(None, Some(""), None)]
    #[case(None, None, None)]
    fn test_service_port_ref_from_parts(
        #[case] number: Option<i32>,
        #[case] name: Option<&str>,
        #[case] expected: Option<ServicePortRef>,
    ) {
        assert_eq!(ServicePortRef::from_parts(number, name), expected);
    }

    #[rstest]
    #[case(None, true)]
    #[case(Some("TCP"), true)]
    #[case(Some("UDP"), false)]
    fn test_is_tcp(#[case] protocol: Option<&str>, #[case] expected: bool) {
        assert_eq!(is_tcp(protocol), expected);
    }

    #[test]
    fn test_policy_site_uses_first_target() {
        let ingress = ObjectKey::new("ns", "web");
        let site = BackendSite::at_path(ingress.clone(), 0, 0);
        let backend = |index: usize, service: &str| PolicyTarget {
            backend: BackendId::new(
                site.clone(),
                Some(index),
                ingress.sibling(service),
                ServicePortRef::Number(80),
                "",
            ),
            weight: 50,
        };

        let policy = SiteBackend::Policy {
            policy: ingress.sibling("ldp"),
            targets: vec![backend(0, "blue"), backend(1, "green")],
        };

        assert_eq!(
            policy.primary().map(|backend| backend.service().name().as_str()),
            Some("blue")
        );
        assert_eq!(SiteBackend::Unavailable.primary(), None);
    }
}
