use crate::annotations::Annotations;
use crate::appgw::{Probe, ProbeMatch, ProbeProperties, Protocol};
use crate::builder::backends::{BackendId, PortPair};
use crate::builder::names::{default_probe_name, probe_name};
use crate::builder::{BuildError, ConfigBuilder};
use crate::kubernetes::ObjectKey;
use crate::kubernetes::ingress::{http_paths, path, rules};
use k8s_openapi::api::core::v1::{HTTPGetAction, Pod, Service};
use std::collections::BTreeMap;
use tracing::{debug, instrument};

pub const DEFAULT_PROBE_HOST: &str = "localhost";
pub const DEFAULT_PROBE_PATH: &str = "/";
pub const DEFAULT_PROBE_INTERVAL: i32 = 30;
pub const DEFAULT_PROBE_TIMEOUT: i32 = 30;
pub const DEFAULT_PROBE_UNHEALTHY_THRESHOLD: i32 = 3;

/// Health probes and the probe watching each backend.
#[derive(Debug, Default)]
pub struct Probes {
    probes: BTreeMap<String, Probe>,
    by_backend: BTreeMap<BackendId, String>,
}

impl Probes {
    pub fn probes(&self) -> impl Iterator<Item = &Probe> {
        self.probes.values()
    }

    pub fn probe_for(&self, backend: &BackendId) -> Option<&Probe> {
        self.by_backend
            .get(backend)
            .and_then(|name| self.probes.get(name))
    }
}

impl ConfigBuilder<'_> {
    pub(super) fn probes(&self) -> Result<&Probes, BuildError> {
        self.memo.probes.get_or_try_init(|| self.build_probes())
    }

    #[instrument(skip_all, level = "debug", name = "ConfigBuilder::build_probes")]
    fn build_probes(&self) -> Result<Probes, BuildError> {
        let ports = self.backend_ports()?;
        let mut probes = Probes::default();
        for protocol in [Protocol::Http, Protocol::Https] {
            let probe = self.default_probe(protocol);
            probes.probes.insert(probe.name().clone(), probe);
        }

        for backend in self.backends().backends() {
            let Some(pair) = ports.resolved(backend) else {
                continue;
            };
            let Some(service) = self.snapshot.service(backend.service()) else {
                continue;
            };

            let name = probe_name(
                backend.service().name(),
                backend.port(),
                backend.ingress().name(),
            );
            if !probes.probes.contains_key(&name) {
                let properties = self.probe_properties(backend, pair, service);
                debug!("Created probe {name} for {backend}");
                probes.probes.insert(
                    name.clone(),
                    Probe::new(&name, self.identifier.probe_id(&name), properties),
                );
            }
            probes.by_backend.insert(backend.clone(), name);
        }

        Ok(probes)
    }

    fn default_probe(&self, protocol: Protocol) -> Probe {
        let name = default_probe_name(protocol);
        Probe::new(
            &name,
            self.identifier.probe_id(&name),
            ProbeProperties {
                protocol,
                host: Some(DEFAULT_PROBE_HOST.to_string()),
                path: Some(DEFAULT_PROBE_PATH.to_string()),
                interval: DEFAULT_PROBE_INTERVAL,
                timeout: DEFAULT_PROBE_TIMEOUT,
                unhealthy_threshold: DEFAULT_PROBE_UNHEALTHY_THRESHOLD,
                match_: Some(ProbeMatch::default()),
                ..ProbeProperties::default()
            },
        )
    }

    fn probe_properties(&self, backend: &BackendId, pair: PortPair, service: &Service) -> ProbeProperties {
        let key = backend.ingress();
        let ingress = self.ingress(key);
        let annotations = ingress.map(Annotations::of);

        let mut host = if backend.host().is_empty() {
            DEFAULT_PROBE_HOST.to_string()
        } else {
            backend.host().clone()
        };

        let path_prefix = annotations
            .and_then(|annotations| self.annotation(key, annotations.backend_path_prefix()))
            .filter(|prefix| !prefix.is_empty());
        let ingress_path = ingress.and_then(|ingress| {
            let rule = rules(ingress).get(backend.site().rule()?)?;
            let entry = http_paths(rule)?.get(backend.site().path()?)?;
            Some(path(entry)).filter(|path| !path.is_empty())
        });
        let mut probe_path = path_prefix
            .or(ingress_path)
            .unwrap_or(DEFAULT_PROBE_PATH)
            .to_string();

        let mut protocol = annotations
            .and_then(|annotations| self.annotation(key, annotations.backend_protocol()))
            .unwrap_or_default();

        if let Some(action) = self.container_http_get(service, pair) {
            if let Some(pod_host) = action.host.as_deref().filter(|h| !h.is_empty()) {
                host = pod_host.to_string();
            }
            if let Some(pod_path) = action.path.as_deref().filter(|p| !p.is_empty()) {
                probe_path = pod_path.to_string();
            }
            if action
                .scheme
                .as_deref()
                .is_some_and(|scheme| scheme.eq_ignore_ascii_case("HTTPS"))
            {
                protocol = Protocol::Https;
            }
        }

        let mut properties = ProbeProperties {
            protocol,
            host: Some(host),
            path: Some(trim_wildcard(&probe_path)),
            interval: DEFAULT_PROBE_INTERVAL,
            timeout: DEFAULT_PROBE_TIMEOUT,
            unhealthy_threshold: DEFAULT_PROBE_UNHEALTHY_THRESHOLD,
            pick_host_name_from_backend_http_settings: Some(false),
            match_: Some(ProbeMatch::default()),
            ..ProbeProperties::default()
        };

        if let Some(annotations) = annotations {
            self.apply_probe_annotations(key, annotations, &mut properties);
        }

        properties
    }

    fn apply_probe_annotations(
        &self,
        key: &ObjectKey,
        annotations: Annotations<'_>,
        properties: &mut ProbeProperties,
    ) {
        if let Some(host) = self.annotation(key, annotations.health_probe_hostname()) {
            properties.host = Some(host.to_string());
        }
        if let Some(port) = self.annotation(key, annotations.health_probe_port()) {
            properties.port = Some(port);
        }
        if let Some(path) = self.annotation(key, annotations.health_probe_path()) {
            properties.path = Some(path.to_string());
        }
        if let Some(codes) = self.annotation(key, annotations.health_probe_status_codes()) {
            properties.match_ = Some(ProbeMatch {
                status_codes: codes.into_iter().map(str::to_string).collect(),
            });
        }
        if let Some(interval) = self.annotation(key, annotations.health_probe_interval()) {
            properties.interval = interval;
        }
        if let Some(timeout) = self.annotation(key, annotations.health_probe_timeout()) {
            properties.timeout = timeout;
        }
        if let Some(threshold) = self.annotation(key, annotations.health_probe_unhealthy_threshold())
        {
            properties.unhealthy_threshold = threshold;
        }
    }

    /// The HTTP readiness probe, else the HTTP liveness probe, of the first container serving the backend port.
    fn container_http_get(&self, service: &Service, pair: PortPair) -> Option<&HTTPGetAction> {
        let namespace = service.metadata.namespace.as_deref()?;
        let selector = service.spec.as_ref()?.selector.as_ref()?;
        let pods = self.snapshot.pods_by_service_selector(namespace, selector);

        pods.into_iter().find_map(|pod| pod_http_get(pod, pair))
    }
}

fn pod_http_get(pod: &Pod, pair: PortPair) -> Option<&HTTPGetAction> {
    let backend_port = i32::from(pair.backend().value());
    pod.spec
        .as_ref()?
        .containers
        .iter()
        .filter(|container| {
            container
                .ports
                .iter()
                .flatten()
                .any(|port| port.container_port == backend_port)
        })
        .find_map(|container| {
            container
                .readiness_probe
                .as_ref()
                .and_then(|probe| probe.http_get.as_ref())
                .or_else(|| {
                    container
                        .liveness_probe
                        .as_ref()
                        .and_then(|probe| probe.http_get.as_ref())
                })
        })
}

/// Probe paths cannot carry the trailing wildcard of an ingress path.
fn trim_wildcard(path: &str) -> String {
    let trimmed = path.trim_end_matches('*');
    if trimmed.is_empty() {
        DEFAULT_PROBE_PATH.to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::Port;
    use k8s_openapi::api::core::v1::{Container, ContainerPort, PodSpec, Probe as K8sProbe};
    use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
    use rstest::rstest;

    fn http_get(path: &str) -> Option<K8sProbe> {
        Some(K8sProbe {
            http_get: Some(HTTPGetAction {
                path: Some(path.to_string()),
                port: IntOrString::Int(1356),
                ..HTTPGetAction::default()
            }),
            ..K8sProbe::default()
        })
    }

    fn pod(port: i32, readiness: Option<K8sProbe>, liveness: Option<K8sProbe>) -> Pod {
        Pod {
            spec: Some(PodSpec {
                containers: vec![Container {
                    name: "web".to_string(),
                    ports: Some(vec![ContainerPort {
                        container_port: port,
                        ..ContainerPort::default()
                    }]),
                    readiness_probe: readiness,
                    liveness_probe: liveness,
                    ..Container::default()
                }],
                ..PodSpec::default()
            }),
            ..Pod::default()
        }
    }

    #[rstest]
    #[case("/api/*", "/api/")]
    #[case("/*", "/")]
    #[case("*", "/")]
    #[case("/health", "/health")]
    fn test_trim_wildcard(#[case] path: &str, #[case] expected: &str) {
        assert_eq!(trim_wildcard(path), expected);
    }

    #[test]
    fn test_readiness_preferred_over_liveness() {
        let pair = PortPair::new(Port::new(80), Port::new(1356));
        let pod = pod(1356, http_get("/ready"), http_get("/alive"));

        let action = pod_http_get(&pod, pair);
        assert_eq!(action.and_then(|a| a.path.as_deref()), Some("/ready"));
    }

    #[test]
    fn test_liveness_used_without_readiness() {
        let pair = PortPair::new(Port::new(80), Port::new(1356));
        let pod = pod(1356, None, http_get("/alive"));

        let action = pod_http_get(&pod, pair);
        assert_eq!(action.and_then(|a| a.path.as_deref()), Some("/alive"));
    }

    #[test]
    fn test_container_port_must_match_backend_port() {
        let pair = PortPair::new(Port::new(80), Port::new(1356));
        let pod = pod(8080, http_get("/ready"), None);

        assert!(pod_http_get(&pod, pair).is_none());
    }
}
