//! Fixtures shared by the build tests.
#![allow(dead_code)]

use agic_api::constants::{DEFAULT_INGRESS_CLASS, INGRESS_CLASS_ANNOTATION};
use agic_core::appgw::{
    ApplicationGateway, FrontendIpConfiguration, FrontendIpConfigurationProperties, Identifier,
    Resource, SubResource,
};
use agic_core::builder::{BuildContext, FixedClock};
use agic_core::config::{CompilerConfiguration, VersionInfo};
use agic_core::events::{Event, RecordedEvents};
use agic_core::kubernetes::InMemorySnapshot;
use agic_core::{BuildError, build};
use chrono::{TimeZone, Utc};
use k8s_openapi::api::core::v1::{
    EndpointAddress, EndpointPort, EndpointSubset, Endpoints, Service, ServicePort, ServiceSpec,
};
use k8s_openapi::api::networking::v1::{
    HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressBackend, IngressRule,
    IngressServiceBackend, IngressSpec, IngressTLS, ServiceBackendPort,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use std::collections::BTreeMap;

pub const NAMESPACE: &str = "ns";
pub const PUBLIC_IP_NAME: &str = "appgw-public-frontend-ip";

pub fn configuration(brownfield: bool) -> CompilerConfiguration {
    CompilerConfiguration::builder()
        .subscription_id("00000000-0000-0000-0000-000000000000")
        .resource_group("rg-ingress")
        .gateway_name("appgw")
        .cluster_id("/subscriptions/sub/resourceGroups/rg/providers/Microsoft.ContainerService/managedClusters/aks")
        .brownfield_deployment(brownfield)
        .version(
            VersionInfo::builder()
                .version("1.7.0")
                .git_commit("abc1234")
                .build_date("2024-05-01T00:00:00Z")
                .build(),
        )
        .build()
}

pub fn identifier() -> Identifier {
    Identifier::from(&configuration(false))
}

pub fn clock() -> FixedClock {
    FixedClock::new(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap())
}

pub fn metadata(name: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(NAMESPACE.to_string()),
        ..ObjectMeta::default()
    }
}

pub fn backend(service: &str, port: i32) -> IngressBackend {
    IngressBackend {
        service: Some(IngressServiceBackend {
            name: service.to_string(),
            port: Some(ServiceBackendPort {
                number: Some(port),
                ..ServiceBackendPort::default()
            }),
        }),
        ..IngressBackend::default()
    }
}

/// A rule for `host` with one `(path, service, port)` entry per path.
pub fn rule(host: &str, paths: &[(&str, &str, i32)]) -> IngressRule {
    IngressRule {
        host: Some(host.to_string()).filter(|host| !host.is_empty()),
        http: Some(HTTPIngressRuleValue {
            paths: paths
                .iter()
                .map(|(path, service, port)| HTTPIngressPath {
                    path: Some((*path).to_string()),
                    path_type: "Prefix".to_string(),
                    backend: backend(service, *port),
                })
                .collect(),
        }),
    }
}

pub fn ingress(name: &str, annotations: &[(&str, &str)], rules: Vec<IngressRule>) -> Ingress {
    let mut meta = metadata(name);
    let mut values: BTreeMap<String, String> = annotations
        .iter()
        .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
        .collect();
    values.insert(
        INGRESS_CLASS_ANNOTATION.to_string(),
        DEFAULT_INGRESS_CLASS.to_string(),
    );
    meta.annotations = Some(values);

    Ingress {
        metadata: meta,
        spec: Some(IngressSpec {
            rules: Some(rules),
            ..IngressSpec::default()
        }),
        ..Ingress::default()
    }
}

pub fn with_tls(mut ingress: Ingress, secret: &str, hosts: &[&str]) -> Ingress {
    if let Some(spec) = ingress.spec.as_mut() {
        spec.tls.get_or_insert_with(Vec::new).push(IngressTLS {
            secret_name: Some(secret.to_string()),
            hosts: Some(hosts.iter().map(ToString::to_string).collect()),
        });
    }
    ingress
}

pub fn service_port(name: &str, port: i32, target: Option<IntOrString>) -> ServicePort {
    ServicePort {
        name: Some(name.to_string()),
        port,
        target_port: target,
        protocol: Some("TCP".to_string()),
        ..ServicePort::default()
    }
}

pub fn service(name: &str, ports: Vec<ServicePort>) -> Service {
    Service {
        metadata: metadata(name),
        spec: Some(ServiceSpec {
            ports: Some(ports),
            ..ServiceSpec::default()
        }),
        ..Service::default()
    }
}

pub fn endpoints(name: &str, port_name: &str, port: i32, ips: &[&str]) -> Endpoints {
    Endpoints {
        metadata: metadata(name),
        subsets: Some(vec![EndpointSubset {
            addresses: Some(
                ips.iter()
                    .map(|ip| EndpointAddress {
                        ip: (*ip).to_string(),
                        ..EndpointAddress::default()
                    })
                    .collect(),
            ),
            ports: Some(vec![EndpointPort {
                name: Some(port_name.to_string()),
                port,
                protocol: Some("TCP".to_string()),
                ..EndpointPort::default()
            }]),
            ..EndpointSubset::default()
        }]),
    }
}

/// The `hello-world` service: port 80 targeting the named port `http`, served on 1356 by three pods.
pub fn hello_world() -> (Service, Endpoints) {
    (
        service(
            "hello-world",
            vec![service_port(
                "servicePort",
                80,
                Some(IntOrString::String("http".to_string())),
            )],
        ),
        endpoints(
            "hello-world",
            "http",
            1356,
            &["1.1.1.3", "1.1.1.1", "1.1.1.2"],
        ),
    )
}

pub fn public_ip() -> FrontendIpConfiguration {
    Resource::new(
        PUBLIC_IP_NAME,
        identifier().resource_id(
            agic_core::appgw::ResourceKind::FrontendIpConfigurations,
            PUBLIC_IP_NAME,
        ),
        FrontendIpConfigurationProperties {
            public_ip_address: Some(SubResource::new(
                "/subscriptions/sub/resourceGroups/rg/providers/Microsoft.Network/publicIPAddresses/appgw-ip",
            )),
            ..FrontendIpConfigurationProperties::default()
        },
    )
}

/// A deployed gateway that carries nothing but its public frontend IP.
pub fn empty_gateway() -> ApplicationGateway {
    let mut gateway = ApplicationGateway::default();
    gateway.properties.frontend_ip_configurations = vec![public_ip()];
    gateway
}

pub struct Outcome {
    pub gateway: Result<ApplicationGateway, BuildError>,
    pub events: Vec<Event>,
}

pub fn compile(
    configuration: &CompilerConfiguration,
    snapshot: &InMemorySnapshot,
    existing: &ApplicationGateway,
) -> Outcome {
    let clock = clock();
    let recorder = RecordedEvents::new();
    let context = BuildContext::builder()
        .configuration(configuration)
        .snapshot(snapshot)
        .existing(existing)
        .clock(&clock)
        .recorder(&recorder)
        .build();

    let gateway = build(&context);
    Outcome {
        gateway,
        events: recorder.into_events(),
    }
}

pub fn names<P>(resources: &[Resource<P>]) -> Vec<&str> {
    resources.iter().map(|r| r.name().as_str()).collect()
}
